//! Copy-on-write project snapshots
//!
//! A [`ProjectContent`] is the aggregate of every loaded assembly and every
//! parsed source file. It is a persistent value: adding an assembly or
//! replacing a file returns a new `ProjectContent` that shares structure with
//! the old one (rpds hash tries), so completion requests holding an older
//! snapshot keep observing it unchanged.
//!
//! [`SharedProject`] holds the "current" snapshot behind an `ArcSwap` so that
//! readers never block and writers publish a fully built value in one swap.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use rpds::HashTrieMapSync;
use tracing::debug;

use crate::parsers::SyntaxTree;
use crate::project::type_system::{TypeDef, UnresolvedAssembly};

/// Type-system view of one parsed source file
#[derive(Debug)]
pub struct UnresolvedFile {
    pub path: String,
    /// Frozen syntax tree this file was derived from
    pub tree: Arc<SyntaxTree>,
    pub types: Vec<Arc<TypeDef>>,
    pub usings: Vec<String>,
}

impl UnresolvedFile {
    pub fn from_tree(tree: Arc<SyntaxTree>) -> Self {
        Self {
            path: tree.path().to_string(),
            types: tree.type_definitions(),
            usings: tree.usings(),
            tree,
        }
    }
}

/// Immutable aggregate of assembly metadata and parsed source files
#[derive(Debug, Clone)]
pub struct ProjectContent {
    assemblies: HashTrieMapSync<PathBuf, Arc<UnresolvedAssembly>>,
    files: HashTrieMapSync<String, Arc<UnresolvedFile>>,
    generation: u64,
}

impl Default for ProjectContent {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectContent {
    pub fn new() -> Self {
        Self {
            assemblies: HashTrieMapSync::new_sync(),
            files: HashTrieMapSync::new_sync(),
            generation: 0,
        }
    }

    /// Returns a new snapshot with the given assemblies added.
    ///
    /// An assembly whose identity is already present replaces the previous
    /// entry in the new snapshot only.
    pub fn add_assembly_references<I>(&self, assemblies: I) -> Self
    where
        I: IntoIterator<Item = Arc<UnresolvedAssembly>>,
    {
        let mut next = self.assemblies.clone();
        for assembly in assemblies {
            next.insert_mut(assembly.identity.path.clone(), assembly);
        }
        Self {
            assemblies: next,
            files: self.files.clone(),
            generation: self.generation + 1,
        }
    }

    /// Returns a new snapshot where `file` is registered under its path,
    /// replacing any previous file with the same path.
    pub fn add_or_update_file(&self, file: Arc<UnresolvedFile>) -> Self {
        Self {
            assemblies: self.assemblies.clone(),
            files: self.files.insert(file.path.clone(), file),
            generation: self.generation + 1,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn assembly_count(&self) -> usize {
        self.assemblies.size()
    }

    pub fn file_count(&self) -> usize {
        self.files.size()
    }

    pub fn assembly(&self, path: &PathBuf) -> Option<&Arc<UnresolvedAssembly>> {
        self.assemblies.get(path)
    }

    pub fn assemblies(&self) -> impl Iterator<Item = &Arc<UnresolvedAssembly>> {
        self.assemblies.values()
    }

    pub fn file(&self, path: &str) -> Option<&Arc<UnresolvedFile>> {
        self.files.get(path)
    }

    pub fn files(&self) -> impl Iterator<Item = &Arc<UnresolvedFile>> {
        self.files.values()
    }

    /// All types from source files first, then from assemblies
    pub fn types(&self) -> impl Iterator<Item = &Arc<TypeDef>> {
        self.files
            .values()
            .flat_map(|f| f.types.iter())
            .chain(self.assemblies.values().flat_map(|a| a.types.iter()))
    }

    /// Finds a type by full name, or by simple name when its namespace is
    /// global or one of `imported_namespaces`.
    pub fn find_type(&self, name: &str, imported_namespaces: &[String]) -> Option<Arc<TypeDef>> {
        if let Some(found) = self.types().find(|t| t.full_name() == name) {
            return Some(found.clone());
        }
        self.types()
            .find(|t| {
                t.name == name
                    && (t.namespace.is_empty() || imported_namespaces.iter().any(|ns| ns == &t.namespace))
            })
            .cloned()
    }

    /// Types declared directly in `namespace`
    pub fn types_in_namespace<'a>(&'a self, namespace: &'a str) -> impl Iterator<Item = &'a Arc<TypeDef>> + 'a {
        self.types().filter(move |t| t.namespace == namespace)
    }

    /// Every namespace known to the snapshot, including all dotted prefixes
    pub fn namespaces(&self) -> BTreeSet<String> {
        let mut namespaces = BTreeSet::new();
        for ty in self.types() {
            let mut prefix = String::new();
            for part in ty.namespace.split('.').filter(|p| !p.is_empty()) {
                if !prefix.is_empty() {
                    prefix.push('.');
                }
                prefix.push_str(part);
                namespaces.insert(prefix.clone());
            }
        }
        namespaces
    }
}

/// Holder of the current project snapshot
///
/// Reads are lock-free (`load_full`); writes publish a new snapshot with
/// `rcu`, so concurrent writers never lose each other's additions.
#[derive(Debug)]
pub struct SharedProject {
    current: ArcSwap<ProjectContent>,
}

impl Default for SharedProject {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedProject {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(ProjectContent::new()),
        }
    }

    /// The current snapshot. Callers keep observing this value even if a
    /// newer snapshot is published afterwards.
    pub fn snapshot(&self) -> Arc<ProjectContent> {
        self.current.load_full()
    }

    /// Derives a new snapshot from the current one and publishes it.
    pub fn update<F>(&self, mut derive: F) -> Arc<ProjectContent>
    where
        F: FnMut(&ProjectContent) -> ProjectContent,
    {
        self.current.rcu(|current| derive(current));
        let snapshot = self.snapshot();
        debug!(
            "Published project snapshot generation {} ({} assemblies, {} files)",
            snapshot.generation(),
            snapshot.assembly_count(),
            snapshot.file_count()
        );
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::type_system::{AssemblyIdentity, TypeKind};

    fn assembly(path: &str, types: &[(&str, &str)]) -> Arc<UnresolvedAssembly> {
        Arc::new(UnresolvedAssembly {
            identity: AssemblyIdentity::from_path(path),
            content_hash: blake3::hash(path.as_bytes()),
            types: types
                .iter()
                .map(|(ns, name)| Arc::new(TypeDef::new(*ns, *name, TypeKind::Class)))
                .collect(),
            documentation_path: None,
        })
    }

    #[test]
    fn test_old_snapshot_unchanged_after_add() {
        let empty = ProjectContent::new();
        let one = empty.add_assembly_references(vec![assembly("/a/One.dll", &[("One", "A")])]);

        assert_eq!(empty.assembly_count(), 0);
        assert_eq!(one.assembly_count(), 1);
        assert_eq!(one.generation(), empty.generation() + 1);
    }

    #[test]
    fn test_find_type_by_simple_and_full_name() {
        let project = ProjectContent::new()
            .add_assembly_references(vec![assembly("/a/Sys.dll", &[("System", "String"), ("", "Global")])]);

        assert!(project.find_type("System.String", &[]).is_some());
        assert!(project.find_type("String", &[]).is_none());
        assert!(project.find_type("String", &["System".to_string()]).is_some());
        assert!(project.find_type("Global", &[]).is_some());
    }

    #[test]
    fn test_namespaces_include_prefixes() {
        let project = ProjectContent::new()
            .add_assembly_references(vec![assembly("/a/Sys.dll", &[("System.Text", "StringBuilder")])]);
        let namespaces = project.namespaces();
        assert!(namespaces.contains("System"));
        assert!(namespaces.contains("System.Text"));
    }

    #[test]
    fn test_shared_project_publishes_new_snapshot() {
        let shared = SharedProject::new();
        let before = shared.snapshot();
        shared.update(|p| p.add_assembly_references(vec![assembly("/a/X.dll", &[])]));
        let after = shared.snapshot();

        assert_eq!(before.assembly_count(), 0);
        assert_eq!(after.assembly_count(), 1);
    }
}
