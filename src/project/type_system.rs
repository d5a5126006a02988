//! Unresolved type-system entities shared by assemblies and source files.
//!
//! These are the "unresolved" declarations the completion resolver works
//! against: names, kinds, member signatures and documentation. They are built
//! once (by a metadata loader or by the C# parser) and never mutated after
//! they enter a project snapshot.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

/// Kind of a type declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    Enum,
    Delegate,
    Record,
}

impl TypeKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            TypeKind::Class => "class",
            TypeKind::Struct => "struct",
            TypeKind::Interface => "interface",
            TypeKind::Enum => "enum",
            TypeKind::Delegate => "delegate",
            TypeKind::Record => "record",
        }
    }
}

/// Kind of a type member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MemberKind {
    Method,
    Constructor,
    Property,
    Field,
    Event,
    EnumValue,
}

/// A single formal parameter of a method or constructor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterDef {
    pub name: String,
    pub type_name: String,
}

impl fmt::Display for ParameterDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.type_name)
        } else {
            write!(f, "{} {}", self.type_name, self.name)
        }
    }
}

/// A member declared on a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberDef {
    pub name: String,
    pub kind: MemberKind,
    /// Declared type of a field/property/event, or the return type of a method.
    /// `None` for constructors and enum values.
    pub return_type: Option<String>,
    pub parameters: Vec<ParameterDef>,
    pub is_static: bool,
    pub documentation: Option<String>,
}

impl MemberDef {
    pub fn new(name: impl Into<String>, kind: MemberKind) -> Self {
        Self {
            name: name.into(),
            kind,
            return_type: None,
            parameters: Vec::new(),
            is_static: false,
            documentation: None,
        }
    }

    pub fn with_return_type(mut self, type_name: impl Into<String>) -> Self {
        self.return_type = Some(type_name.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<ParameterDef>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    pub fn is_invocable(&self) -> bool {
        matches!(self.kind, MemberKind::Method | MemberKind::Constructor)
    }

    /// Human readable signature, e.g. `string Substring(int startIndex)`
    pub fn signature(&self) -> String {
        let params = self
            .parameters
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        match (self.kind, &self.return_type) {
            (MemberKind::Method, Some(ret)) => format!("{} {}({})", ret, self.name, params),
            (MemberKind::Method, None) => format!("void {}({})", self.name, params),
            (MemberKind::Constructor, _) => format!("{}({})", self.name, params),
            (_, Some(ty)) => format!("{} {}", ty, self.name),
            (_, None) => self.name.clone(),
        }
    }
}

/// A type declaration (class, struct, enum, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeDef {
    /// Dotted namespace; empty for the global namespace
    pub namespace: String,
    pub name: String,
    pub kind: TypeKind,
    pub members: Vec<MemberDef>,
    pub documentation: Option<String>,
}

impl TypeDef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            kind,
            members: Vec::new(),
            documentation: None,
        }
    }

    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    pub fn members_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MemberDef> + 'a {
        self.members.iter().filter(move |m| m.name == name)
    }

    pub fn constructors(&self) -> impl Iterator<Item = &MemberDef> {
        self.members.iter().filter(|m| m.kind == MemberKind::Constructor)
    }
}

/// Identity of a loaded assembly: the resolved file path it was loaded from
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AssemblyIdentity {
    pub path: PathBuf,
    /// Simple name (file stem), e.g. `System.Core`
    pub name: String,
}

impl AssemblyIdentity {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name }
    }
}

/// Immutable metadata snapshot of one assembly
#[derive(Debug, Clone)]
pub struct UnresolvedAssembly {
    pub identity: AssemblyIdentity,
    /// blake3 hash of the binary contents
    pub content_hash: blake3::Hash,
    pub types: Vec<Arc<TypeDef>>,
    /// Path of the documentation file that was paired with this assembly, if any
    pub documentation_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_signature_rendering() {
        let method = MemberDef::new("Substring", MemberKind::Method)
            .with_return_type("string")
            .with_parameters(vec![ParameterDef {
                name: "startIndex".to_string(),
                type_name: "int".to_string(),
            }]);
        assert_eq!(method.signature(), "string Substring(int startIndex)");

        let property = MemberDef::new("Length", MemberKind::Property).with_return_type("int");
        assert_eq!(property.signature(), "int Length");

        let ctor = MemberDef::new("Point", MemberKind::Constructor);
        assert_eq!(ctor.signature(), "Point()");
    }

    #[test]
    fn test_full_name() {
        assert_eq!(TypeDef::new("", "Foo", TypeKind::Class).full_name(), "Foo");
        assert_eq!(
            TypeDef::new("System.Text", "StringBuilder", TypeKind::Class).full_name(),
            "System.Text.StringBuilder"
        );
    }

    #[test]
    fn test_assembly_identity_from_path() {
        let id = AssemblyIdentity::from_path("/opt/ref/System.Core.dll");
        assert_eq!(id.name, "System.Core");
    }
}
