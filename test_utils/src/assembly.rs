//! Assemblies on disk: a CLI image declaring the fixture's public surface
//! plus the compiler-style XML documentation file for whatever was given a
//! summary.
//!
//! ```ignore
//! AssemblyFixture::new("Plant").class("Plant.Conveyor", |t| {
//!     t.doc("A belt conveyor")
//!         .property("Speed", "System.Int32")
//!         .method("Start", &[("System.Int32", "speed")], "System.Void")
//!         .doc("Starts the belt")
//! })
//! ```

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::image;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FixtureKind {
    Class,
    Struct,
    Enum,
    Interface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FixtureMemberKind {
    Field,
    Property,
    Method,
    Constructor,
    EnumValue,
}

#[derive(Debug, Clone)]
pub(crate) struct FixtureMember {
    pub kind: FixtureMemberKind,
    pub name: String,
    /// Field or property type, method return type
    pub type_name: String,
    /// `(type, name)` pairs
    pub params: Vec<(String, String)>,
    pub is_static: bool,
    pub summary: Option<String>,
}

/// One public type of an [`AssemblyFixture`]
#[derive(Debug, Clone)]
pub struct TypeFixture {
    pub(crate) namespace: String,
    pub(crate) name: String,
    pub(crate) kind: FixtureKind,
    pub(crate) summary: Option<String>,
    pub(crate) members: Vec<FixtureMember>,
}

impl TypeFixture {
    fn new(full_name: &str, kind: FixtureKind) -> Self {
        let (namespace, name) = full_name.rsplit_once('.').unwrap_or(("", full_name));
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            kind,
            summary: None,
            members: Vec::new(),
        }
    }

    pub(crate) fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    fn push(mut self, kind: FixtureMemberKind, name: &str, type_name: &str, params: &[(&str, &str)], is_static: bool) -> Self {
        self.members.push(FixtureMember {
            kind,
            name: name.to_string(),
            type_name: type_name.to_string(),
            params: params.iter().map(|(t, n)| (t.to_string(), n.to_string())).collect(),
            is_static,
            summary: None,
        });
        self
    }

    /// Summary of the most recently added member, or of the type itself
    pub fn doc(mut self, summary: &str) -> Self {
        match self.members.last_mut() {
            Some(member) => member.summary = Some(summary.to_string()),
            None => self.summary = Some(summary.to_string()),
        }
        self
    }

    pub fn field(self, name: &str, type_name: &str) -> Self {
        self.push(FixtureMemberKind::Field, name, type_name, &[], false)
    }

    pub fn static_field(self, name: &str, type_name: &str) -> Self {
        self.push(FixtureMemberKind::Field, name, type_name, &[], true)
    }

    /// Read-only property backed by a `get_` accessor
    pub fn property(self, name: &str, type_name: &str) -> Self {
        self.push(FixtureMemberKind::Property, name, type_name, &[], false)
    }

    pub fn static_property(self, name: &str, type_name: &str) -> Self {
        self.push(FixtureMemberKind::Property, name, type_name, &[], true)
    }

    /// Instance method; `params` are `(type, name)` pairs
    pub fn method(self, name: &str, params: &[(&str, &str)], returns: &str) -> Self {
        self.push(FixtureMemberKind::Method, name, returns, params, false)
    }

    pub fn static_method(self, name: &str, params: &[(&str, &str)], returns: &str) -> Self {
        self.push(FixtureMemberKind::Method, name, returns, params, true)
    }

    pub fn constructor(self, params: &[(&str, &str)]) -> Self {
        self.push(FixtureMemberKind::Constructor, ".ctor", "System.Void", params, false)
    }

    /// Enum literal; values are numbered in declaration order
    pub fn value(self, name: &str) -> Self {
        self.push(FixtureMemberKind::EnumValue, name, "", &[], true)
    }

    fn doc_id(&self, member: &FixtureMember) -> String {
        let owner = self.full_name();
        match member.kind {
            FixtureMemberKind::Field | FixtureMemberKind::EnumValue => format!("F:{}.{}", owner, member.name),
            FixtureMemberKind::Property => format!("P:{}.{}", owner, member.name),
            FixtureMemberKind::Method | FixtureMemberKind::Constructor => {
                let name = if member.kind == FixtureMemberKind::Constructor {
                    "#ctor"
                } else {
                    member.name.as_str()
                };
                if member.params.is_empty() {
                    format!("M:{}.{}", owner, name)
                } else {
                    let types: Vec<&str> = member.params.iter().map(|(t, _)| t.as_str()).collect();
                    format!("M:{}.{}({})", owner, name, types.join(","))
                }
            }
        }
    }
}

pub struct AssemblyFixture {
    name: String,
    types: Vec<TypeFixture>,
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl AssemblyFixture {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            types: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn with_type(mut self, full_name: &str, kind: FixtureKind, build: impl FnOnce(TypeFixture) -> TypeFixture) -> Self {
        self.types.push(build(TypeFixture::new(full_name, kind)));
        self
    }

    pub fn class(self, full_name: &str, build: impl FnOnce(TypeFixture) -> TypeFixture) -> Self {
        self.with_type(full_name, FixtureKind::Class, build)
    }

    pub fn structure(self, full_name: &str, build: impl FnOnce(TypeFixture) -> TypeFixture) -> Self {
        self.with_type(full_name, FixtureKind::Struct, build)
    }

    pub fn enumeration(self, full_name: &str, build: impl FnOnce(TypeFixture) -> TypeFixture) -> Self {
        self.with_type(full_name, FixtureKind::Enum, build)
    }

    pub fn interface(self, full_name: &str, build: impl FnOnce(TypeFixture) -> TypeFixture) -> Self {
        self.with_type(full_name, FixtureKind::Interface, build)
    }

    /// The PE/CLI image; identical fixtures produce identical bytes
    pub fn image(&self) -> Vec<u8> {
        image::write_image(&self.name, &self.types)
    }

    /// Documentation for every type and member that was given a summary
    pub fn documentation_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\"?>\n<doc>\n");
        let _ = writeln!(xml, "  <assembly><name>{}</name></assembly>", escape(&self.name));
        xml.push_str("  <members>\n");
        for ty in &self.types {
            if let Some(summary) = &ty.summary {
                let _ = writeln!(xml, "    <member name=\"T:{}\">", escape(&ty.full_name()));
                let _ = writeln!(xml, "      <summary>{}</summary>", escape(summary));
                xml.push_str("    </member>\n");
            }
            for member in &ty.members {
                let Some(summary) = &member.summary else { continue };
                let _ = writeln!(xml, "    <member name=\"{}\">", escape(&ty.doc_id(member)));
                let _ = writeln!(xml, "      <summary>{}</summary>", escape(summary));
                for (_, name) in &member.params {
                    let _ = writeln!(xml, "      <param name=\"{}\"></param>", escape(name));
                }
                xml.push_str("    </member>\n");
            }
        }
        xml.push_str("  </members>\n</doc>\n");
        xml
    }

    /// Writes `<name>.dll` and `<name>.xml` into `dir`; returns the dll path
    pub fn write_to(&self, dir: &Path) -> io::Result<PathBuf> {
        let dll = self.write_image_to(dir)?;
        fs::write(dir.join(format!("{}.xml", self.name)), self.documentation_xml())?;
        Ok(dll)
    }

    /// Writes only `<name>.dll`
    pub fn write_image_to(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let dll = dir.join(format!("{}.dll", self.name));
        fs::write(&dll, self.image())?;
        Ok(dll)
    }
}

/// Installs `fixture` into a .NET 4 style GAC under `root`:
/// `<root>/<Name>/v4.0_<version>__<token>/<Name>.dll`
pub fn write_gac_assembly(root: &Path, fixture: &AssemblyFixture, version: &str, token: &str) -> io::Result<PathBuf> {
    let dir = root.join(fixture.name()).join(format!("v4.0_{}__{}", version, token));
    fixture.write_to(&dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plant() -> AssemblyFixture {
        AssemblyFixture::new("Plant").class("Plant.Conveyor", |t| {
            t.doc("A belt conveyor")
                .property("Speed", "System.Int32")
                .method("Start", &[("System.Int32", "speed")], "System.Void")
                .doc("Starts the belt")
                .method("Stop", &[], "System.Void")
                .constructor(&[])
                .doc("New belt")
        })
    }

    #[test]
    fn test_documentation_lists_only_documented_items() {
        let xml = plant().documentation_xml();
        assert!(xml.contains(r#"<member name="T:Plant.Conveyor">"#));
        assert!(xml.contains(r#"<member name="M:Plant.Conveyor.Start(System.Int32)">"#));
        assert!(xml.contains(r#"<param name="speed">"#));
        assert!(xml.contains(r#"<member name="M:Plant.Conveyor.#ctor">"#));
        assert!(!xml.contains("Plant.Conveyor.Stop"));
        assert!(!xml.contains("P:Plant.Conveyor.Speed"));
    }

    #[test]
    fn test_image_is_deterministic_and_named() {
        let a = plant().image();
        assert_eq!(a, plant().image());
        assert_ne!(a, AssemblyFixture::new("Other").image());
        assert_eq!(&a[..2], b"MZ");
    }
}
