//! Turning assembly files into unresolved type-system snapshots
//!
//! [`MetadataLoader`] is the seam for reading assembly binaries. The default
//! [`CilMetadataLoader`] reads the public surface straight from the image's
//! metadata tables: type kinds come from the TypeDef flags and base type,
//! member kinds, static flags and return types from the Field, MethodDef and
//! Property rows. The paired XML documentation only contributes summaries
//! and, where the image carries no Param rows, parameter names.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::metadata::MetadataError;
use crate::metadata::cil::{
    self, FIELD_RT_SPECIAL_NAME, FIELD_STATIC, ImageMethod, ImageType, TYPE_INTERFACE, strip_arity,
};
use crate::metadata::documentation::XmlDocumentationProvider;
use crate::project::{
    AssemblyIdentity, MemberDef, MemberKind, ParameterDef, TypeDef, TypeKind, UnresolvedAssembly,
};

const VOID: &str = "System.Void";

/// Reads an assembly file into an immutable metadata snapshot
pub trait MetadataLoader: Send + Sync {
    fn load_assembly_file(
        &self,
        path: &Path,
        documentation: Option<&XmlDocumentationProvider>,
    ) -> Result<UnresolvedAssembly, MetadataError>;
}

/// Loader backed by the CLI metadata tables of the image
#[derive(Debug, Default, Clone, Copy)]
pub struct CilMetadataLoader;

impl CilMetadataLoader {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataLoader for CilMetadataLoader {
    fn load_assembly_file(
        &self,
        path: &Path,
        documentation: Option<&XmlDocumentationProvider>,
    ) -> Result<UnresolvedAssembly, MetadataError> {
        let bytes = fs::read(path).map_err(|source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if bytes.is_empty() {
            return Err(MetadataError::Load {
                path: path.to_path_buf(),
                message: "empty assembly image".to_string(),
            });
        }
        let content_hash = blake3::hash(&bytes);
        let size = bytes.len();

        let types = build_types(cil::read_image(path, bytes)?, documentation);
        debug!(
            "Loaded {:?}: {} bytes, {} type(s), hash {}",
            path,
            size,
            types.len(),
            content_hash.to_hex()
        );

        Ok(UnresolvedAssembly {
            identity: AssemblyIdentity::from_path(path),
            content_hash,
            types,
            documentation_path: documentation.map(|d| d.path().to_path_buf()),
        })
    }
}

/// Converts image types into type definitions, attaching documentation by ID
pub(crate) fn build_types(
    types: Vec<ImageType>,
    documentation: Option<&XmlDocumentationProvider>,
) -> Vec<Arc<TypeDef>> {
    types
        .into_iter()
        .map(|image| Arc::new(type_def(&image, documentation)))
        .collect()
}

fn type_kind(image: &ImageType) -> TypeKind {
    if image.flags & TYPE_INTERFACE != 0 {
        return TypeKind::Interface;
    }
    match image.base.as_deref() {
        Some("System.Enum") => TypeKind::Enum,
        Some("System.ValueType") => TypeKind::Struct,
        Some("System.MulticastDelegate") => TypeKind::Delegate,
        _ => TypeKind::Class,
    }
}

fn type_def(image: &ImageType, documentation: Option<&XmlDocumentationProvider>) -> TypeDef {
    let kind = type_kind(image);
    let id = if image.namespace.is_empty() {
        image.name.clone()
    } else {
        format!("{}.{}", image.namespace, image.name)
    };
    let summary = |member_id: String| {
        documentation
            .and_then(|docs| docs.summary(&member_id))
            .map(str::to_string)
    };

    let mut ty = TypeDef::new(image.namespace.clone(), strip_arity(&image.name), kind);
    ty.documentation = summary(format!("T:{}", id));

    for field in &image.fields {
        let member = if kind == TypeKind::Enum {
            // `value__` holds the underlying value
            if field.flags & FIELD_RT_SPECIAL_NAME != 0 {
                continue;
            }
            MemberDef::new(field.name.clone(), MemberKind::EnumValue).with_static(true)
        } else {
            MemberDef::new(field.name.clone(), MemberKind::Field)
                .with_return_type(field.type_name.clone())
                .with_static(field.flags & FIELD_STATIC != 0)
        };
        ty.members.push(MemberDef {
            documentation: summary(format!("F:{}.{}", id, field.name)),
            ..member
        });
    }

    for property in &image.properties {
        let member = MemberDef::new(property.name.clone(), MemberKind::Property)
            .with_return_type(property.type_name.clone())
            .with_static(property.is_static);
        ty.members.push(MemberDef {
            documentation: summary(format!("P:{}.{}", id, property.name)),
            ..member
        });
    }

    for method in image.methods.iter().filter(|m| m.is_public) {
        let (name, member_kind, doc_name) = match method.name.as_str() {
            ".ctor" if !method.is_static => (ty.name.clone(), MemberKind::Constructor, "#ctor".to_string()),
            ".cctor" => continue,
            _ if method.is_special_name => {
                trace!("Skipping accessor {}.{}", id, method.name);
                continue;
            }
            other => (other.to_string(), MemberKind::Method, other.to_string()),
        };
        let member_id = method_doc_id(&id, &doc_name, method);
        let entry = documentation.and_then(|docs| docs.get(&member_id));

        let parameters = method
            .parameters
            .iter()
            .enumerate()
            .map(|(i, (param, type_name))| ParameterDef {
                name: if param.is_empty() {
                    entry.and_then(|e| e.params.get(i)).cloned().unwrap_or_default()
                } else {
                    param.clone()
                },
                type_name: type_name.clone(),
            })
            .collect();
        let mut member = MemberDef::new(name, member_kind)
            .with_parameters(parameters)
            .with_static(method.is_static);
        if member_kind == MemberKind::Method && method.return_type != VOID {
            member.return_type = Some(method.return_type.clone());
        }
        member.documentation = entry.and_then(|e| e.summary.clone());
        ty.members.push(member);
    }

    ty
}

/// `M:Plant.Conveyor.Start(System.Int32)`; generic arguments use `{}`
fn method_doc_id(type_id: &str, name: &str, method: &ImageMethod) -> String {
    if method.parameters.is_empty() {
        return format!("M:{}.{}", type_id, name);
    }
    let params: Vec<String> = method
        .parameters
        .iter()
        .map(|(_, type_name)| type_name.replace('<', "{").replace('>', "}"))
        .collect();
    format!("M:{}.{}({})", type_id, name, params.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::cil::{ImageField, ImageProperty};
    use indoc::indoc;

    const PUBLIC_FIELD: u32 = 0x6;
    const PUBLIC_CLASS: u32 = 0x0010_0001;

    fn method(name: &str, params: &[(&str, &str)], ret: &str) -> ImageMethod {
        ImageMethod {
            name: name.to_string(),
            is_public: true,
            is_static: false,
            is_special_name: name.starts_with('.'),
            return_type: ret.to_string(),
            parameters: params.iter().map(|(n, t)| (n.to_string(), t.to_string())).collect(),
        }
    }

    fn field(name: &str, flags: u32, type_name: &str) -> ImageField {
        ImageField {
            name: name.to_string(),
            flags,
            type_name: type_name.to_string(),
        }
    }

    fn conveyor() -> ImageType {
        ImageType {
            token: 0x0200_0002,
            namespace: "Plant".to_string(),
            name: "Conveyor".to_string(),
            flags: PUBLIC_CLASS,
            base: Some("System.Object".to_string()),
            fields: vec![field("MaxSpeed", PUBLIC_FIELD | FIELD_STATIC, "System.Int32")],
            methods: vec![
                method(".ctor", &[], VOID),
                method("Start", &[("speed", "System.Int32")], VOID),
                method("Describe", &[], "System.String"),
                ImageMethod {
                    is_special_name: true,
                    ..method("get_Speed", &[], "System.Int32")
                },
                ImageMethod {
                    is_public: false,
                    ..method("Calibrate", &[], VOID)
                },
            ],
            properties: vec![ImageProperty {
                name: "Speed".to_string(),
                type_name: "System.Int32".to_string(),
                is_static: false,
            }],
        }
    }

    #[test]
    fn test_members_come_from_tables_without_documentation() {
        let types = build_types(vec![conveyor()], None);
        let ty = &types[0];
        assert_eq!(ty.full_name(), "Plant.Conveyor");
        assert_eq!(ty.kind, TypeKind::Class);
        assert_eq!(ty.documentation, None);

        let names: Vec<&str> = ty.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["MaxSpeed", "Speed", "Conveyor", "Start", "Describe"]);

        let max = ty.members_named("MaxSpeed").next().unwrap();
        assert!(max.is_static);
        assert_eq!(max.return_type.as_deref(), Some("System.Int32"));
        assert!(!ty.members_named("Speed").next().unwrap().is_static);

        assert_eq!(ty.members_named("Start").next().unwrap().signature(), "void Start(System.Int32 speed)");
        assert_eq!(
            ty.members_named("Describe").next().unwrap().return_type.as_deref(),
            Some("System.String")
        );
        assert_eq!(ty.constructors().count(), 1);
    }

    #[test]
    fn test_class_with_only_fields_stays_a_class() {
        let limits = ImageType {
            name: "Limits".to_string(),
            fields: vec![
                field("Low", PUBLIC_FIELD | FIELD_STATIC, "System.Int32"),
                field("High", PUBLIC_FIELD | FIELD_STATIC, "System.Int32"),
            ],
            methods: Vec::new(),
            properties: Vec::new(),
            ..conveyor()
        };
        let ty = &build_types(vec![limits], None)[0];
        assert_eq!(ty.kind, TypeKind::Class);
        assert!(ty.members.iter().all(|m| m.kind == MemberKind::Field && m.is_static));
    }

    #[test]
    fn test_kinds_from_flags_and_base_type() {
        let quality = ImageType {
            name: "Quality".to_string(),
            flags: 0x101,
            base: Some("System.Enum".to_string()),
            fields: vec![
                field("value__", PUBLIC_FIELD | FIELD_RT_SPECIAL_NAME | 0x200, "System.Int32"),
                field("Good", PUBLIC_FIELD | FIELD_STATIC | 0x8040, "Plant.Quality"),
                field("Bad", PUBLIC_FIELD | FIELD_STATIC | 0x8040, "Plant.Quality"),
            ],
            methods: Vec::new(),
            properties: Vec::new(),
            ..conveyor()
        };
        let point = ImageType {
            name: "Point".to_string(),
            base: Some("System.ValueType".to_string()),
            ..conveyor()
        };
        let sensor = ImageType {
            name: "ISensor".to_string(),
            flags: 0xA1,
            base: None,
            ..conveyor()
        };
        let types = build_types(vec![quality, point, sensor], None);

        assert_eq!(types[0].kind, TypeKind::Enum);
        let values: Vec<&str> = types[0].members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(values, vec!["Good", "Bad"]);
        assert!(types[0].members.iter().all(|m| m.kind == MemberKind::EnumValue && m.is_static));
        assert_eq!(types[1].kind, TypeKind::Struct);
        assert_eq!(types[2].kind, TypeKind::Interface);
    }

    #[test]
    fn test_documentation_supplies_summaries_and_missing_parameter_names() {
        const DOC: &str = indoc! {r#"
            <doc>
                <members>
                    <member name="T:Plant.Collections.Bag`1"><summary>A bag.</summary></member>
                    <member name="M:Plant.Collections.Bag`1.#ctor"><summary>Empty bag.</summary></member>
                    <member name="M:Plant.Collections.Bag`1.Merge(System.Collections.Generic.List{System.Int32},System.Boolean)">
                        <summary>Merges items.</summary>
                        <param name="items">Items</param>
                        <param name="dedupe">Remove duplicates</param>
                    </member>
                    <member name="P:Plant.Collections.Bag`1.Count"><summary>Item count.</summary></member>
                    <member name="T:Plant.Collections.Unrelated"><summary>Not in the image.</summary></member>
                </members>
            </doc>
        "#};
        let docs = XmlDocumentationProvider::parse(Path::new("Plant.xml"), DOC).unwrap();
        let bag = ImageType {
            namespace: "Plant.Collections".to_string(),
            name: "Bag`1".to_string(),
            fields: Vec::new(),
            methods: vec![
                method(".ctor", &[], VOID),
                method(
                    "Merge",
                    &[("", "System.Collections.Generic.List<System.Int32>"), ("", "System.Boolean")],
                    VOID,
                ),
            ],
            properties: vec![ImageProperty {
                name: "Count".to_string(),
                type_name: "System.Int32".to_string(),
                is_static: false,
            }],
            ..conveyor()
        };

        let types = build_types(vec![bag], Some(&docs));
        assert_eq!(types.len(), 1);
        let bag = &types[0];
        assert_eq!(bag.name, "Bag");
        assert_eq!(bag.documentation.as_deref(), Some("A bag."));
        assert_eq!(bag.constructors().next().unwrap().documentation.as_deref(), Some("Empty bag."));
        assert_eq!(bag.members_named("Count").next().unwrap().documentation.as_deref(), Some("Item count."));

        let merge = bag.members_named("Merge").next().unwrap();
        assert_eq!(merge.documentation.as_deref(), Some("Merges items."));
        assert_eq!(merge.parameters[0].name, "items");
        assert_eq!(merge.parameters[1].name, "dedupe");
    }

    #[test]
    fn test_static_constructor_and_accessors_are_hidden() {
        let ty = ImageType {
            methods: vec![
                ImageMethod {
                    is_static: true,
                    ..method(".cctor", &[], VOID)
                },
                ImageMethod {
                    is_special_name: true,
                    ..method("set_Speed", &[("value", "System.Int32")], VOID)
                },
                ImageMethod {
                    is_static: true,
                    ..method("Create", &[], "Plant.Conveyor")
                },
            ],
            ..conveyor()
        };
        let ty = &build_types(vec![ty], None)[0];
        let methods: Vec<&MemberDef> = ty.members.iter().filter(|m| m.is_invocable()).collect();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name, "Create");
        assert!(methods[0].is_static);
        assert_eq!(methods[0].return_type.as_deref(), Some("Plant.Conveyor"));
    }

    #[test]
    fn test_non_cli_image_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let dll = dir.path().join("Plant.dll");
        fs::write(&dll, b"MZ-plant").unwrap();
        let result = CilMetadataLoader::new().load_assembly_file(&dll, None);
        assert!(matches!(result, Err(MetadataError::Load { .. })));

        fs::write(&dll, b"").unwrap();
        let result = CilMetadataLoader::new().load_assembly_file(&dll, None);
        assert!(matches!(result, Err(MetadataError::Load { .. })));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = CilMetadataLoader::new().load_assembly_file(Path::new("/nonexistent/X.dll"), None);
        assert!(matches!(result, Err(MetadataError::Io { .. })));
    }
}
