//! XML documentation files paired with assemblies
//!
//! Compilers emit `<assembly>.xml` next to the binary; reference assemblies
//! of the .NET Framework keep theirs in a well-known SDK folder. Each
//! `<member name="...">` element is keyed by its documentation ID
//! (`T:System.String`, `M:System.String.Trim`, ...).

use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Well-known SDK folder holding .NET Framework reference documentation
pub const DEFAULT_SDK_DOCUMENTATION_DIR: &str =
    r"C:\Program Files (x86)\Reference Assemblies\Microsoft\Framework\.NETFramework\v4.0";

#[derive(Debug, Error)]
pub enum DocumentationError {
    #[error("Failed to read documentation file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed documentation file {}: {source}", .path.display())]
    Xml {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },
}

/// Documentation of a single member
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocEntry {
    pub summary: Option<String>,
    /// Parameter names in declaration order
    pub params: Vec<String>,
    pub returns: Option<String>,
}

/// Parsed documentation file: documentation ID → entry
#[derive(Debug, Clone, Default)]
pub struct XmlDocumentationProvider {
    path: PathBuf,
    entries: FxHashMap<String, DocEntry>,
    /// IDs in file order, so derived metadata is deterministic
    order: Vec<String>,
}

impl XmlDocumentationProvider {
    pub fn from_file(path: &Path) -> Result<Self, DocumentationError> {
        let text = fs::read_to_string(path).map_err(|source| DocumentationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &text)
    }

    pub fn parse(path: &Path, text: &str) -> Result<Self, DocumentationError> {
        let doc = roxmltree::Document::parse(text).map_err(|source| DocumentationError::Xml {
            path: path.to_path_buf(),
            source,
        })?;

        let mut entries = FxHashMap::default();
        let mut order = Vec::new();
        for member in doc.descendants().filter(|n| n.has_tag_name("member")) {
            let Some(id) = member.attribute("name") else { continue };
            let mut entry = DocEntry::default();
            for child in member.children().filter(|c| c.is_element()) {
                match child.tag_name().name() {
                    "summary" => entry.summary = Some(inner_text(child)).filter(|s| !s.is_empty()),
                    "returns" => entry.returns = Some(inner_text(child)).filter(|s| !s.is_empty()),
                    "param" => {
                        if let Some(name) = child.attribute("name") {
                            entry.params.push(name.to_string());
                        }
                    }
                    _ => {}
                }
            }
            if entries.insert(id.to_string(), entry).is_none() {
                order.push(id.to_string());
            }
        }

        debug!("Loaded {} documentation entries from {:?}", entries.len(), path);
        Ok(Self {
            path: path.to_path_buf(),
            entries,
            order,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, id: &str) -> Option<&DocEntry> {
        self.entries.get(id)
    }

    pub fn summary(&self, id: &str) -> Option<&str> {
        self.entries.get(id).and_then(|e| e.summary.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in file order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DocEntry)> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|e| (id.as_str(), e)))
    }
}

/// Flattens an element's text, rendering `<see cref>` / `<paramref name>`
/// as their target's simple name.
fn inner_text(node: roxmltree::Node) -> String {
    let mut parts = Vec::new();
    for n in node.descendants() {
        if n.is_text() {
            if let Some(t) = n.text() {
                parts.push(t.to_string());
            }
        } else if n.is_element() {
            let reference = n.attribute("cref").or_else(|| n.attribute("name"));
            if matches!(n.tag_name().name(), "see" | "seealso" | "paramref" | "typeparamref") {
                if let Some(target) = reference {
                    let simple = target.rsplit(['.', ':']).next().unwrap_or(target);
                    parts.push(simple.to_string());
                }
            }
        }
    }
    parts.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Finds the documentation file for an assembly: a sibling `<stem>.xml`,
/// else `<sdk_dir>/<stem>.xml`, else none.
pub fn locate_documentation(assembly_path: &Path, sdk_dir: Option<&Path>) -> Option<PathBuf> {
    let stem = assembly_path.file_stem()?;
    let mut file_name = stem.to_os_string();
    file_name.push(".xml");

    let sibling = assembly_path
        .parent()
        .map(|dir| dir.join(&file_name))
        .unwrap_or_else(|| PathBuf::from(&file_name));
    if sibling.is_file() {
        return Some(sibling);
    }

    let sdk = sdk_dir?.join(&file_name);
    sdk.is_file().then_some(sdk)
}

/// Locates and parses the documentation for an assembly. Unreadable or
/// malformed documentation is logged and treated as absent.
pub fn documentation_for(assembly_path: &Path, sdk_dir: Option<&Path>) -> Option<XmlDocumentationProvider> {
    let path = locate_documentation(assembly_path, sdk_dir)?;
    match XmlDocumentationProvider::from_file(&path) {
        Ok(provider) => Some(provider),
        Err(e) => {
            warn!("Ignoring documentation for {:?}: {}", assembly_path, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const DOC: &str = indoc! {r#"
        <?xml version="1.0"?>
        <doc>
            <assembly><name>Demo</name></assembly>
            <members>
                <member name="T:Demo.Greeter">
                    <summary>Says hello to
                        people.</summary>
                </member>
                <member name="M:Demo.Greeter.Greet(System.String,System.Int32)">
                    <summary>Greets <paramref name="who"/> a few times.</summary>
                    <param name="who">Target</param>
                    <param name="times">Repeat count</param>
                    <returns>The greeting, see <see cref="T:System.String"/>.</returns>
                </member>
            </members>
        </doc>
    "#};

    #[test]
    fn test_parse_entries() {
        let provider = XmlDocumentationProvider::parse(Path::new("Demo.xml"), DOC).unwrap();
        assert_eq!(provider.len(), 2);
        assert_eq!(provider.summary("T:Demo.Greeter"), Some("Says hello to people."));

        let greet = provider.get("M:Demo.Greeter.Greet(System.String,System.Int32)").unwrap();
        assert_eq!(greet.params, vec!["who".to_string(), "times".to_string()]);
        assert_eq!(greet.summary.as_deref(), Some("Greets who a few times."));
        assert_eq!(greet.returns.as_deref(), Some("The greeting, see String ."));

        let ids: Vec<&str> = provider.iter().map(|(id, _)| id).collect();
        assert_eq!(ids[0], "T:Demo.Greeter");
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        let result = XmlDocumentationProvider::parse(Path::new("bad.xml"), "<doc><members>");
        assert!(matches!(result, Err(DocumentationError::Xml { .. })));
    }

    #[test]
    fn test_locate_prefers_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let sdk = tempfile::tempdir().unwrap();
        let dll = dir.path().join("Demo.dll");
        fs::write(&dll, b"MZ").unwrap();
        fs::write(sdk.path().join("Demo.xml"), DOC).unwrap();

        assert_eq!(locate_documentation(&dll, Some(sdk.path())), Some(sdk.path().join("Demo.xml")));

        fs::write(dir.path().join("Demo.xml"), DOC).unwrap();
        assert_eq!(locate_documentation(&dll, Some(sdk.path())), Some(dir.path().join("Demo.xml")));
    }

    #[test]
    fn test_locate_none() {
        let dir = tempfile::tempdir().unwrap();
        let dll = dir.path().join("Missing.dll");
        assert_eq!(locate_documentation(&dll, None), None);
    }
}
