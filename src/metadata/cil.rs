//! Reading CLI metadata tables through `dotscope`
//!
//! The rest of the crate never touches `dotscope` types: [`read_image`]
//! flattens the public TypeDef, Field, MethodDef and Property rows of an
//! image into the plain [`ImageType`] model, with every signature rendered as
//! a CLR type name (`System.Int32`, `System.String[]`,
//! `System.Collections.Generic.List<System.Int32>`).

use std::path::Path;

use dotscope::metadata::method::{MethodAccessFlags, MethodModifiers};
use dotscope::metadata::signatures::TypeSignature;
use dotscope::metadata::token::Token;
use dotscope::metadata::typesystem::{CilTypeRc, TypeRegistry};
use dotscope::{CilObject, ValidationConfig};
use tracing::trace;

use crate::metadata::MetadataError;

const TYPE_DEF_TABLE: u32 = 0x02;
const TYPE_VISIBILITY_MASK: u32 = 0x7;
const TYPE_PUBLIC: u32 = 0x1;
pub(crate) const TYPE_INTERFACE: u32 = 0x20;

const FIELD_ACCESS_MASK: u32 = 0x7;
const FIELD_PUBLIC: u32 = 0x6;
pub(crate) const FIELD_STATIC: u32 = 0x10;
pub(crate) const FIELD_RT_SPECIAL_NAME: u32 = 0x400;

const OBJECT: &str = "System.Object";

/// A public top-level type of an image
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ImageType {
    pub token: u32,
    pub namespace: String,
    /// Metadata name, including any generic arity suffix (``List`1``)
    pub name: String,
    pub flags: u32,
    pub base: Option<String>,
    pub fields: Vec<ImageField>,
    pub methods: Vec<ImageMethod>,
    pub properties: Vec<ImageProperty>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImageField {
    pub name: String,
    pub flags: u32,
    pub type_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ImageMethod {
    pub name: String,
    pub is_public: bool,
    pub is_static: bool,
    pub is_special_name: bool,
    pub return_type: String,
    /// `(name, type)` in declaration order; names are empty when the image has no Param row
    pub parameters: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImageProperty {
    pub name: String,
    pub type_name: String,
    pub is_static: bool,
}

/// Loads `bytes` as a CLI image and returns its public top-level types in
/// TypeDef order
pub(crate) fn read_image(path: &Path, bytes: Vec<u8>) -> Result<Vec<ImageType>, MetadataError> {
    let object = CilObject::from_mem_with_validation(bytes, ValidationConfig::minimal()).map_err(|e| {
        MetadataError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;
    let registry = object.types();

    let mut types: Vec<ImageType> = registry
        .all_types()
        .into_iter()
        .filter(|ty| ty.token.value() >> 24 == TYPE_DEF_TABLE)
        .filter(|ty| ty.flags & TYPE_VISIBILITY_MASK == TYPE_PUBLIC)
        .map(|ty| image_type(&registry, &ty))
        .collect();
    types.sort_by_key(|ty| ty.token);
    trace!("{:?}: {} public type(s) in the TypeDef table", path, types.len());
    Ok(types)
}

fn image_type(registry: &TypeRegistry, ty: &CilTypeRc) -> ImageType {
    let fields = ty
        .fields
        .iter()
        .map(|(_, field)| ImageField {
            name: field.name.clone(),
            flags: field.flags,
            type_name: type_name(registry, &field.signature.base),
        })
        .filter(|field| field.flags & FIELD_ACCESS_MASK == FIELD_PUBLIC)
        .collect();

    let methods = ty
        .methods
        .iter()
        .filter_map(|(_, method)| method.upgrade())
        .map(|method| {
            let mut names: Vec<(u32, String)> = method
                .params
                .iter()
                .filter(|(_, param)| param.sequence > 0)
                .map(|(_, param)| (param.sequence, param.name.clone().unwrap_or_default()))
                .collect();
            names.sort_by_key(|(sequence, _)| *sequence);
            let parameters = method
                .signature
                .params
                .iter()
                .enumerate()
                .map(|(i, param)| {
                    let name = names
                        .iter()
                        .find(|(sequence, _)| *sequence as usize == i + 1)
                        .map(|(_, name)| name.clone())
                        .unwrap_or_default();
                    (name, type_name(registry, &param.base))
                })
                .collect();
            ImageMethod {
                name: method.name.clone(),
                is_public: method.flags_access == MethodAccessFlags::PUBLIC,
                is_static: method.flags_modifiers.contains(MethodModifiers::STATIC),
                is_special_name: method.flags_modifiers.contains(MethodModifiers::SPECIAL_NAME),
                return_type: type_name(registry, &method.signature.return_type.base),
                parameters,
            }
        })
        .collect();

    let properties = ty
        .properties
        .iter()
        .map(|(_, property)| ImageProperty {
            name: property.name.clone(),
            type_name: type_name(registry, &property.signature.base),
            is_static: !property.signature.has_this,
        })
        .collect();

    ImageType {
        token: ty.token.value(),
        namespace: ty.namespace.clone(),
        name: ty.name.clone(),
        flags: ty.flags,
        base: ty.base().map(|base| qualified(&base)),
        fields,
        methods,
        properties,
    }
}

fn qualified(ty: &CilTypeRc) -> String {
    if ty.namespace.is_empty() {
        ty.name.clone()
    } else {
        format!("{}.{}", ty.namespace, ty.name)
    }
}

fn token_name(registry: &TypeRegistry, token: &Token) -> String {
    registry
        .get(token)
        .map(|ty| strip_arity(&qualified(&ty)))
        .unwrap_or_else(|| OBJECT.to_string())
}

/// Renders a signature type as a CLR type name
fn type_name(registry: &TypeRegistry, signature: &TypeSignature) -> String {
    let primitive = match signature {
        TypeSignature::Void => "System.Void",
        TypeSignature::Boolean => "System.Boolean",
        TypeSignature::Char => "System.Char",
        TypeSignature::I1 => "System.SByte",
        TypeSignature::U1 => "System.Byte",
        TypeSignature::I2 => "System.Int16",
        TypeSignature::U2 => "System.UInt16",
        TypeSignature::I4 => "System.Int32",
        TypeSignature::U4 => "System.UInt32",
        TypeSignature::I8 => "System.Int64",
        TypeSignature::U8 => "System.UInt64",
        TypeSignature::R4 => "System.Single",
        TypeSignature::R8 => "System.Double",
        TypeSignature::I => "System.IntPtr",
        TypeSignature::U => "System.UIntPtr",
        TypeSignature::String => "System.String",
        TypeSignature::Object => OBJECT,
        TypeSignature::Class(token) | TypeSignature::ValueType(token) => return token_name(registry, token),
        TypeSignature::SzArray(array) => return format!("{}[]", type_name(registry, &array.base)),
        TypeSignature::GenericInst(generic, arguments) => {
            let arguments: Vec<String> = arguments.iter().map(|a| type_name(registry, a)).collect();
            return format!("{}<{}>", type_name(registry, generic), arguments.join(","));
        }
        _ => OBJECT,
    };
    primitive.to_string()
}

/// Removes generic arity markers: ``List`1`` → `List`
pub(crate) fn strip_arity(name: &str) -> String {
    name.split('.')
        .map(|part| part.split('`').next().unwrap_or(part))
        .collect::<Vec<_>>()
        .join(".")
}
