//! Locating assembly references on disk
//!
//! A reference is either a path, a bare file name, or a (possibly strong)
//! assembly name. Probing tries a fixed list of locations and the first
//! existing file wins.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::trace;
use walkdir::WalkDir;

use crate::metadata::MetadataError;

/// Where a reference was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStrategy {
    ExactPath,
    BinFolder,
    BinFolderDll,
    BinFolderExe,
    RelativeToWorkingDir,
    ExeDirDll,
    ExeDirExe,
    GacExact,
    GacBestMatch,
}

/// Global assembly cache lookup
pub trait GlobalAssemblyCache: Send + Sync {
    /// Finds the assembly matching `reference` exactly (name, and version
    /// and public key token when given)
    fn find_exact(&self, reference: &str) -> Option<PathBuf>;

    /// Finds the highest version of an assembly with the same simple name
    fn find_best_match(&self, reference: &str) -> Option<PathBuf>;
}

/// No GAC available
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGac;

impl GlobalAssemblyCache for NoGac {
    fn find_exact(&self, _reference: &str) -> Option<PathBuf> {
        None
    }

    fn find_best_match(&self, _reference: &str) -> Option<PathBuf> {
        None
    }
}

/// A parsed display name: `System.Xml, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyName {
    pub name: String,
    pub version: Option<String>,
    pub public_key_token: Option<String>,
}

impl AssemblyName {
    pub fn parse(display_name: &str) -> Self {
        let mut parts = display_name.split(',').map(str::trim);
        let name = parts.next().unwrap_or_default().to_string();
        let mut version = None;
        let mut public_key_token = None;
        for part in parts {
            let Some((key, value)) = part.split_once('=') else { continue };
            match key.trim().to_ascii_lowercase().as_str() {
                "version" => version = Some(value.trim().to_string()),
                "publickeytoken" if !value.trim().eq_ignore_ascii_case("null") => {
                    public_key_token = Some(value.trim().to_ascii_lowercase())
                }
                _ => {}
            }
        }
        Self {
            name,
            version,
            public_key_token,
        }
    }
}

/// GAC laid out on disk as `<root>/<Name>/<version>_<culture>_<token>/<Name>.dll`
/// (the .NET 4 `GAC_MSIL` layout uses a `v4.0_` prefix on the version folder).
#[derive(Debug, Clone, Default)]
pub struct DirectoryGac {
    roots: Vec<PathBuf>,
}

struct GacEntry {
    version: Vec<u32>,
    version_text: String,
    token: String,
    file: PathBuf,
}

impl DirectoryGac {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    fn entries(&self, name: &str) -> Vec<GacEntry> {
        let mut entries = Vec::new();
        for root in &self.roots {
            for name_dir in WalkDir::new(root)
                .sort_by_file_name()
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_dir())
                .filter(|e| e.file_name().to_string_lossy().eq_ignore_ascii_case(name))
            {
                for version_dir in WalkDir::new(name_dir.path())
                    .sort_by_file_name()
                    .min_depth(1)
                    .max_depth(1)
                    .into_iter()
                    .filter_map(Result::ok)
                    .filter(|e| e.file_type().is_dir())
                {
                    let file = version_dir.path().join(format!("{}.dll", name_dir.file_name().to_string_lossy()));
                    if !file.is_file() {
                        continue;
                    }
                    let folder = version_dir.file_name().to_string_lossy().into_owned();
                    let mut fields = folder.split('_');
                    let raw_version = fields.next().unwrap_or_default();
                    let raw_version = match raw_version.strip_prefix('v') {
                        // `v4.0_4.0.0.0__token`: the runtime prefix is its own field
                        Some(_) => fields.next().unwrap_or_default(),
                        None => raw_version,
                    };
                    let token = fields.last().unwrap_or_default().to_ascii_lowercase();
                    entries.push(GacEntry {
                        version: parse_version(raw_version),
                        version_text: raw_version.to_string(),
                        token,
                        file,
                    });
                }
            }
        }
        entries
    }
}

fn parse_version(text: &str) -> Vec<u32> {
    text.split('.').map(|p| p.parse().unwrap_or(0)).collect()
}

impl GlobalAssemblyCache for DirectoryGac {
    fn find_exact(&self, reference: &str) -> Option<PathBuf> {
        let wanted = AssemblyName::parse(reference);
        // A bare name is never an exact match; it falls through to the best match
        let Some(version) = wanted.version.as_ref() else {
            return None;
        };
        if wanted.name.is_empty() {
            return None;
        }
        self.entries(&wanted.name)
            .into_iter()
            .find(|entry| {
                *version == entry.version_text && wanted.public_key_token.as_ref().is_none_or(|t| *t == entry.token)
            })
            .map(|entry| entry.file)
    }

    fn find_best_match(&self, reference: &str) -> Option<PathBuf> {
        let wanted = AssemblyName::parse(reference);
        if wanted.name.is_empty() {
            return None;
        }
        self.entries(&wanted.name)
            .into_iter()
            .max_by(|a, b| a.version.cmp(&b.version))
            .map(|entry| entry.file)
    }
}

/// Resolves references against the working directory, the executable
/// directory and the GAC
#[derive(Clone)]
pub struct ReferenceResolver {
    working_dir: PathBuf,
    exe_dir: PathBuf,
    gac: Arc<dyn GlobalAssemblyCache>,
}

impl ReferenceResolver {
    pub fn new(working_dir: PathBuf, exe_dir: PathBuf, gac: Arc<dyn GlobalAssemblyCache>) -> Self {
        Self {
            working_dir,
            exe_dir,
            gac,
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Returns the first existing location for `reference`
    pub fn resolve(&self, reference: &str) -> Result<PathBuf, MetadataError> {
        self.locate(reference)
            .map(|(path, _)| path)
            .ok_or_else(|| MetadataError::ReferenceNotFound {
                reference: reference.to_string(),
            })
    }

    /// Returns the first existing location together with the strategy that found it
    pub fn locate(&self, reference: &str) -> Option<(PathBuf, LookupStrategy)> {
        if reference.is_empty() {
            return None;
        }
        let bin = self.working_dir.join("bin");
        let file_candidates = [
            (PathBuf::from(reference), LookupStrategy::ExactPath),
            (bin.join(reference), LookupStrategy::BinFolder),
            (bin.join(format!("{reference}.dll")), LookupStrategy::BinFolderDll),
            (bin.join(format!("{reference}.exe")), LookupStrategy::BinFolderExe),
            (
                normalize_lexically(&self.working_dir.join(reference)),
                LookupStrategy::RelativeToWorkingDir,
            ),
            (self.exe_dir.join(format!("{reference}.dll")), LookupStrategy::ExeDirDll),
            (self.exe_dir.join(format!("{reference}.exe")), LookupStrategy::ExeDirExe),
        ];

        for (candidate, strategy) in file_candidates {
            if candidate.is_file() {
                trace!("Resolved {} via {:?}: {:?}", reference, strategy, candidate);
                return Some((candidate, strategy));
            }
        }

        if let Some(found) = self.gac.find_exact(reference) {
            return Some((found, LookupStrategy::GacExact));
        }
        self.gac
            .find_best_match(reference)
            .map(|found| (found, LookupStrategy::GacBestMatch))
    }
}

/// Resolves `.` and `..` components without touching the file system
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"MZ").unwrap();
    }

    fn resolver(cwd: &Path, exe: &Path) -> ReferenceResolver {
        ReferenceResolver::new(cwd.to_path_buf(), exe.to_path_buf(), Arc::new(NoGac))
    }

    #[test]
    fn test_assembly_name_parse() {
        let name = AssemblyName::parse("System.Xml, Version=4.0.0.0, Culture=neutral, PublicKeyToken=B77A5C561934E089");
        assert_eq!(name.name, "System.Xml");
        assert_eq!(name.version.as_deref(), Some("4.0.0.0"));
        assert_eq!(name.public_key_token.as_deref(), Some("b77a5c561934e089"));

        let bare = AssemblyName::parse("Plant");
        assert_eq!(bare.version, None);
    }

    #[test]
    fn test_lookup_order() {
        let cwd = tempfile::tempdir().unwrap();
        let exe = tempfile::tempdir().unwrap();
        let r = resolver(cwd.path(), exe.path());

        touch(&exe.path().join("Plant.exe"));
        assert_eq!(r.locate("Plant").unwrap().1, LookupStrategy::ExeDirExe);

        touch(&exe.path().join("Plant.dll"));
        assert_eq!(r.locate("Plant").unwrap().1, LookupStrategy::ExeDirDll);

        touch(&cwd.path().join("bin").join("Plant.exe"));
        assert_eq!(r.locate("Plant").unwrap().1, LookupStrategy::BinFolderExe);

        touch(&cwd.path().join("bin").join("Plant.dll"));
        assert_eq!(r.locate("Plant").unwrap().1, LookupStrategy::BinFolderDll);

        let (path, strategy) = r.locate("Plant.dll").unwrap();
        assert_eq!(strategy, LookupStrategy::BinFolder);
        assert_eq!(path, cwd.path().join("bin").join("Plant.dll"));
    }

    #[test]
    fn test_exact_and_relative_paths() {
        let cwd = tempfile::tempdir().unwrap();
        let exe = tempfile::tempdir().unwrap();
        let r = resolver(cwd.path(), exe.path());

        let absolute = cwd.path().join("lib").join("A.dll");
        touch(&absolute);
        assert_eq!(
            r.locate(absolute.to_str().unwrap()).unwrap().1,
            LookupStrategy::ExactPath
        );

        touch(&cwd.path().join("refs").join("B.dll"));
        let (path, strategy) = r.locate("lib/../refs/B.dll").unwrap();
        assert_eq!(strategy, LookupStrategy::RelativeToWorkingDir);
        assert_eq!(path, cwd.path().join("refs").join("B.dll"));
    }

    #[test]
    fn test_not_found_names_reference() {
        let cwd = tempfile::tempdir().unwrap();
        let r = resolver(cwd.path(), cwd.path());
        let err = r.resolve("Nope").unwrap_err();
        assert_eq!(err.to_string(), "Reference could not be found: Nope");
    }

    #[test]
    fn test_directory_gac() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("Plant").join("1.0.0.0__abc").join("Plant.dll"));
        touch(&root.path().join("Plant").join("v4.0_2.5.0.0__abc").join("Plant.dll"));
        let gac = DirectoryGac::new(vec![root.path().to_path_buf()]);

        let exact = gac.find_exact("Plant, Version=1.0.0.0").unwrap();
        assert!(exact.starts_with(root.path().join("Plant").join("1.0.0.0__abc")));
        assert!(gac.find_exact("Plant, Version=3.0.0.0").is_none());

        let best = gac.find_best_match("Plant, Version=3.0.0.0").unwrap();
        assert!(best.starts_with(root.path().join("Plant").join("v4.0_2.5.0.0__abc")));

        let cwd = tempfile::tempdir().unwrap();
        let r = ReferenceResolver::new(cwd.path().to_path_buf(), cwd.path().to_path_buf(), Arc::new(gac));
        assert_eq!(r.locate("Plant, Version=3.0.0.0").unwrap().1, LookupStrategy::GacBestMatch);
    }

    #[test]
    fn test_bare_name_in_gac_picks_highest_version() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("Plant").join("v4.0_1.0.0.0__abc").join("Plant.dll"));
        touch(&root.path().join("Plant").join("v4.0_2.0.0.0__abc").join("Plant.dll"));
        let gac = DirectoryGac::new(vec![root.path().to_path_buf()]);

        assert!(gac.find_exact("Plant").is_none());
        assert!(gac.find_exact("Plant, PublicKeyToken=abc").is_none());

        let cwd = tempfile::tempdir().unwrap();
        let r = ReferenceResolver::new(cwd.path().to_path_buf(), cwd.path().to_path_buf(), Arc::new(gac));
        let (path, strategy) = r.locate("Plant").unwrap();
        assert_eq!(strategy, LookupStrategy::GacBestMatch);
        assert_eq!(path, root.path().join("Plant").join("v4.0_2.0.0.0__abc").join("Plant.dll"));
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(normalize_lexically(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
    }
}
