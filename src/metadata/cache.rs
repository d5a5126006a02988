//! Append-only cache of loaded assembly metadata
//!
//! Loaded assemblies are published into the shared project snapshot. A batch
//! either lands completely or not at all: every reference is resolved and
//! loaded first, and only then is a new snapshot derived and swapped in.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};

use crate::metadata::MetadataError;
use crate::metadata::documentation::documentation_for;
use crate::metadata::loader::MetadataLoader;
use crate::metadata::lookup::ReferenceResolver;
use crate::project::{SharedProject, UnresolvedAssembly};

/// Where an assembly's metadata comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblySource {
    File(PathBuf),
    /// Generated at runtime; has no file to read metadata from
    InMemory { name: String },
}

pub struct AssemblyMetadataCache {
    project: Arc<SharedProject>,
    loader: Arc<dyn MetadataLoader>,
    resolver: ReferenceResolver,
    sdk_documentation_dir: Option<PathBuf>,
    default_assemblies: Vec<String>,
}

impl AssemblyMetadataCache {
    pub fn new(project: Arc<SharedProject>, loader: Arc<dyn MetadataLoader>, resolver: ReferenceResolver) -> Self {
        Self {
            project,
            loader,
            resolver,
            sdk_documentation_dir: None,
            default_assemblies: Vec::new(),
        }
    }

    pub fn with_sdk_documentation_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.sdk_documentation_dir = dir;
        self
    }

    /// Baseline assembly references loaded by [`Self::load_defaults`]
    pub fn with_default_assemblies(mut self, references: Vec<String>) -> Self {
        self.default_assemblies = references;
        self
    }

    pub fn project(&self) -> &Arc<SharedProject> {
        &self.project
    }

    /// Loads the baseline runtime assemblies. References that cannot be
    /// resolved are skipped with a warning.
    pub fn load_defaults(&self) -> Result<usize, MetadataError> {
        let sources: Vec<AssemblySource> = self
            .default_assemblies
            .iter()
            .filter_map(|reference| match self.resolver.resolve(reference) {
                Ok(path) => Some(AssemblySource::File(path)),
                Err(e) => {
                    warn!("Skipping default assembly: {}", e);
                    None
                }
            })
            .collect();
        self.load_sources(&sources)
    }

    /// Loads an explicit set of assemblies in parallel. In-memory sources are
    /// dropped and duplicate paths loaded once.
    pub fn load_sources(&self, sources: &[AssemblySource]) -> Result<usize, MetadataError> {
        let mut seen = FxHashSet::default();
        let paths: Vec<&Path> = sources
            .iter()
            .filter_map(|source| match source {
                AssemblySource::File(path) => Some(path.as_path()),
                AssemblySource::InMemory { name } => {
                    debug!("Skipping in-memory assembly {}", name);
                    None
                }
            })
            .filter(|path| seen.insert(*path))
            .collect();
        if paths.is_empty() {
            return Ok(0);
        }

        let start = Instant::now();
        let loaded = paths
            .par_iter()
            .map(|path| self.load_file(path))
            .collect::<Result<Vec<_>, _>>()?;
        info!("Loaded {} assemblies in {:?}", loaded.len(), start.elapsed());
        Ok(self.publish(loaded))
    }

    /// Loads a single assembly from `path`. An empty path is ignored.
    pub fn add_assembly(&self, path: &str) -> Result<(), MetadataError> {
        if path.is_empty() {
            return Ok(());
        }
        let assembly = self.load_file(Path::new(path))?;
        self.publish(vec![assembly]);
        Ok(())
    }

    /// Resolves and loads `references`. Either every reference is published
    /// or, on the first failure, none is.
    pub fn add_references<S>(&self, references: &[S]) -> Result<usize, MetadataError>
    where
        S: AsRef<str> + Sync,
    {
        let start = Instant::now();
        let loaded = match references {
            [] => return Ok(0),
            [single] => vec![self.load_reference(single.as_ref())?],
            many => many
                .par_iter()
                .map(|reference| self.load_reference(reference.as_ref()))
                .collect::<Result<Vec<_>, _>>()?,
        };
        info!("Loaded {} reference(s) in {:?}", loaded.len(), start.elapsed());
        Ok(self.publish(loaded))
    }

    fn load_reference(&self, reference: &str) -> Result<Arc<UnresolvedAssembly>, MetadataError> {
        let path = self.resolver.resolve(reference)?;
        self.load_file(&path)
    }

    fn load_file(&self, path: &Path) -> Result<Arc<UnresolvedAssembly>, MetadataError> {
        let documentation = documentation_for(path, self.sdk_documentation_dir.as_deref());
        let assembly = self.loader.load_assembly_file(path, documentation.as_ref())?;
        Ok(Arc::new(assembly))
    }

    fn publish(&self, loaded: Vec<Arc<UnresolvedAssembly>>) -> usize {
        let count = loaded.len();
        self.project
            .update(|project| project.add_assembly_references(loaded.iter().cloned()));
        count
    }
}
