//! Session configuration, read from TOML
//!
//! ```toml
//! working_dir = "/work/plant"
//! gac_roots = ["C:/Windows/Microsoft.NET/assembly/GAC_MSIL"]
//! references = ["Dynamic.Points"]
//!
//! [[point_callers]]
//! name = "Conveyor1"
//! description = "Infeed conveyor"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::completion::{CallerEntry, CallerTables};
use crate::metadata::documentation::DEFAULT_SDK_DOCUMENTATION_DIR;
use crate::metadata::{
    AssemblyMetadataCache, DirectoryGac, CilMetadataLoader, GlobalAssemblyCache, NoGac, ReferenceResolver,
};
use crate::project::SharedProject;

/// Runtime assemblies loaded when no others are configured
pub const DEFAULT_ASSEMBLIES: [&str; 3] = ["mscorlib", "System", "System.Core"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompletionConfig {
    /// Base of the `bin/` probing paths; the process working directory when unset
    pub working_dir: Option<PathBuf>,
    /// Directory of the host executable; the current executable's when unset
    pub exe_dir: Option<PathBuf>,
    pub sdk_documentation_dir: Option<PathBuf>,
    pub gac_roots: Vec<PathBuf>,
    pub default_assemblies: Vec<String>,
    /// Extra references loaded after the defaults
    pub references: Vec<String>,
    pub point_callers: Option<Vec<CallerEntry>>,
    pub model_callers: Option<Vec<CallerEntry>>,
    pub log_level: Option<String>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            working_dir: None,
            exe_dir: None,
            sdk_documentation_dir: Some(PathBuf::from(DEFAULT_SDK_DOCUMENTATION_DIR)),
            gac_roots: Vec::new(),
            default_assemblies: DEFAULT_ASSEMBLIES.iter().map(|s| s.to_string()).collect(),
            references: Vec::new(),
            point_callers: None,
            model_callers: None,
            log_level: None,
        }
    }
}

impl CompletionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn caller_tables(&self) -> CallerTables {
        CallerTables::from_overrides(self.point_callers.clone(), self.model_callers.clone())
    }

    pub fn working_dir(&self) -> PathBuf {
        self.working_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default()
    }

    pub fn exe_dir(&self) -> PathBuf {
        self.exe_dir
            .clone()
            .or_else(|| {
                std::env::current_exe()
                    .ok()
                    .and_then(|exe| exe.parent().map(Path::to_path_buf))
            })
            .unwrap_or_default()
    }

    pub fn reference_resolver(&self) -> ReferenceResolver {
        let gac: Arc<dyn GlobalAssemblyCache> = if self.gac_roots.is_empty() {
            Arc::new(NoGac)
        } else {
            Arc::new(DirectoryGac::new(self.gac_roots.clone()))
        };
        ReferenceResolver::new(self.working_dir(), self.exe_dir(), gac)
    }

    /// Metadata cache publishing into `project`, with the built-in loader
    pub fn metadata_cache(&self, project: Arc<SharedProject>) -> AssemblyMetadataCache {
        AssemblyMetadataCache::new(project, Arc::new(CilMetadataLoader::new()), self.reference_resolver())
            .with_sdk_documentation_dir(self.sdk_documentation_dir.clone())
            .with_default_assemblies(self.default_assemblies.clone())
    }
}
