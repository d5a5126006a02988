//! A minimal PE32 image carrying ECMA-335 metadata for fixture assemblies.
//!
//! One `.text` section holds the CLI header, tiny-format method bodies and
//! the metadata root with its five streams. Every heap stays below 64K, so
//! all heap, table and coded indices are two bytes wide.

use std::collections::{BTreeMap, HashMap};

use crate::assembly::{FixtureKind, FixtureMember, FixtureMemberKind, TypeFixture};

const SECTION_RVA: u32 = 0x2000;
const SECTION_ALIGNMENT: u32 = 0x2000;
const FILE_ALIGNMENT: usize = 0x200;
const CLI_HEADER_SIZE: usize = 72;

const MODULE: u8 = 0x00;
const TYPE_REF: u8 = 0x01;
const TYPE_DEF: u8 = 0x02;
const FIELD: u8 = 0x04;
const METHOD_DEF: u8 = 0x06;
const PARAM: u8 = 0x08;
const CONSTANT: u8 = 0x0B;
const PROPERTY_MAP: u8 = 0x15;
const PROPERTY: u8 = 0x17;
const METHOD_SEMANTICS: u8 = 0x18;
const ASSEMBLY: u8 = 0x20;
const ASSEMBLY_REF: u8 = 0x23;

const SORTED_TABLES: u64 = 0x0000_1600_3301_FA00;
const MSCORLIB_TOKEN: [u8; 8] = [0xB7, 0x7A, 0x5C, 0x56, 0x19, 0x34, 0xE0, 0x89];

const CLASS_FLAGS: u32 = 0x0010_0001;
const STRUCT_FLAGS: u32 = 0x0010_0109;
const ENUM_FLAGS: u32 = 0x0000_0101;
const INTERFACE_FLAGS: u32 = 0x0000_00A1;

const FIELD_PUBLIC: u16 = 0x0006;
const FIELD_STATIC: u16 = 0x0010;
const FIELD_ENUM_VALUE: u16 = 0x0606;
const FIELD_LITERAL: u16 = 0x8056;

const METHOD_PUBLIC: u16 = 0x0086;
const METHOD_STATIC: u16 = 0x0010;
const METHOD_ABSTRACT: u16 = 0x05C0;
const METHOD_SPECIAL_NAME: u16 = 0x0800;
const METHOD_CTOR: u16 = 0x1886;

const ELEMENT_VALUETYPE: u8 = 0x11;
const ELEMENT_CLASS: u8 = 0x12;
const ELEMENT_SZARRAY: u8 = 0x1D;

fn primitive(name: &str) -> Option<u8> {
    Some(match name {
        "System.Void" => 0x01,
        "System.Boolean" => 0x02,
        "System.Char" => 0x03,
        "System.SByte" => 0x04,
        "System.Byte" => 0x05,
        "System.Int16" => 0x06,
        "System.UInt16" => 0x07,
        "System.Int32" => 0x08,
        "System.UInt32" => 0x09,
        "System.Int64" => 0x0A,
        "System.UInt64" => 0x0B,
        "System.Single" => 0x0C,
        "System.Double" => 0x0D,
        "System.String" => 0x0E,
        "System.IntPtr" => 0x18,
        "System.UIntPtr" => 0x19,
        "System.Object" => 0x1C,
        _ => return None,
    })
}

/// ECMA-335 II.23.2 compressed unsigned integer
fn compress(value: u32, out: &mut Vec<u8>) {
    if value < 0x80 {
        out.push(value as u8);
    } else if value < 0x4000 {
        out.extend_from_slice(&(value as u16 | 0x8000).to_be_bytes());
    } else {
        out.extend_from_slice(&(value | 0xC000_0000).to_be_bytes());
    }
}

fn pad4(mut bytes: Vec<u8>) -> Vec<u8> {
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
    bytes
}

#[derive(Default)]
struct Table {
    rows: u16,
    data: Vec<u8>,
}

impl Table {
    /// Starts a new row and returns its 1-based index
    fn row(&mut self) -> u16 {
        self.rows += 1;
        self.rows
    }

    fn u8(&mut self, value: u8) -> &mut Self {
        self.data.push(value);
        self
    }

    fn u16(&mut self, value: u16) -> &mut Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn u32(&mut self, value: u32) -> &mut Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn next(&self) -> u16 {
        self.rows + 1
    }
}

struct Builder {
    strings: Vec<u8>,
    string_index: HashMap<String, u16>,
    blobs: Vec<u8>,
    blob_index: HashMap<Vec<u8>, u16>,
    tables: BTreeMap<u8, Table>,
    /// Full name to `(TypeDef row, is value type)`
    defined: HashMap<String, (u16, bool)>,
    type_refs: HashMap<String, u16>,
    code: Vec<u8>,
}

impl Builder {
    fn new() -> Self {
        Self {
            strings: vec![0],
            string_index: HashMap::new(),
            blobs: vec![0],
            blob_index: HashMap::new(),
            tables: BTreeMap::new(),
            defined: HashMap::new(),
            type_refs: HashMap::new(),
            code: Vec::new(),
        }
    }

    fn table(&mut self, id: u8) -> &mut Table {
        self.tables.entry(id).or_default()
    }

    fn string(&mut self, text: &str) -> u16 {
        if text.is_empty() {
            return 0;
        }
        if let Some(&index) = self.string_index.get(text) {
            return index;
        }
        let index = self.strings.len() as u16;
        self.strings.extend_from_slice(text.as_bytes());
        self.strings.push(0);
        self.string_index.insert(text.to_string(), index);
        index
    }

    fn blob(&mut self, bytes: &[u8]) -> u16 {
        if let Some(&index) = self.blob_index.get(bytes) {
            return index;
        }
        let index = self.blobs.len() as u16;
        compress(bytes.len() as u32, &mut self.blobs);
        self.blobs.extend_from_slice(bytes);
        self.blob_index.insert(bytes.to_vec(), index);
        index
    }

    /// TypeRef row resolved against mscorlib
    fn type_ref(&mut self, full_name: &str) -> u16 {
        if let Some(&row) = self.type_refs.get(full_name) {
            return row;
        }
        let (namespace, name) = full_name.rsplit_once('.').unwrap_or(("", full_name));
        let name = self.string(name);
        let namespace = self.string(namespace);
        let table = self.table(TYPE_REF);
        let row = table.row();
        // ResolutionScope: AssemblyRef row 1
        table.u16((1 << 2) | 2).u16(name).u16(namespace);
        self.type_refs.insert(full_name.to_string(), row);
        row
    }

    fn encode_type(&mut self, name: &str, out: &mut Vec<u8>) {
        if let Some(element) = name.strip_suffix("[]") {
            out.push(ELEMENT_SZARRAY);
            self.encode_type(element, out);
            return;
        }
        if let Some(code) = primitive(name) {
            out.push(code);
            return;
        }
        let (coded, value_type) = match self.defined.get(name).copied() {
            Some((row, value_type)) => (u32::from(row) << 2, value_type),
            None => ((u32::from(self.type_ref(name)) << 2) | 1, false),
        };
        out.push(if value_type { ELEMENT_VALUETYPE } else { ELEMENT_CLASS });
        compress(coded, out);
    }

    fn method_signature(&mut self, is_static: bool, returns: &str, params: &[(String, String)]) -> u16 {
        let mut sig = vec![if is_static { 0x00 } else { 0x20 }];
        compress(params.len() as u32, &mut sig);
        self.encode_type(returns, &mut sig);
        for (type_name, _) in params {
            self.encode_type(type_name, &mut sig);
        }
        self.blob(&sig)
    }

    /// Appends a tiny-format body and returns its RVA
    fn body(&mut self, returns_value: bool) -> u32 {
        while self.code.len() % 4 != 0 {
            self.code.push(0);
        }
        let rva = SECTION_RVA + (CLI_HEADER_SIZE + self.code.len()) as u32;
        let il: &[u8] = if returns_value { &[0x14, 0x2A] } else { &[0x2A] };
        self.code.push(((il.len() as u8) << 2) | 0x2);
        self.code.extend_from_slice(il);
        rva
    }

    fn method(&mut self, name: &str, flags: u16, abstract_: bool, returns: &str, params: &[(String, String)]) -> u16 {
        let is_static = flags & METHOD_STATIC != 0;
        let signature = self.method_signature(is_static, returns, params);
        let rva = if abstract_ { 0 } else { self.body(returns != "System.Void") };
        let name = self.string(name);
        let param_list = self.table(PARAM).next();
        let flags = if abstract_ { flags | METHOD_ABSTRACT } else { flags };
        let table = self.table(METHOD_DEF);
        let row = table.row();
        table.u32(rva).u16(0).u16(flags).u16(name).u16(signature).u16(param_list);

        for (sequence, (_, param)) in params.iter().enumerate() {
            let param = self.string(param);
            let table = self.table(PARAM);
            table.row();
            table.u16(0).u16(sequence as u16 + 1).u16(param);
        }
        row
    }

    fn field(&mut self, name: &str, flags: u16, signature: Vec<u8>) -> u16 {
        let name = self.string(name);
        let signature = self.blob(&signature);
        let table = self.table(FIELD);
        let row = table.row();
        table.u16(flags).u16(name).u16(signature);
        row
    }

    fn type_def(&mut self, ty: &TypeFixture) {
        let full_name = ty.full_name();
        let (flags, extends) = match ty.kind {
            FixtureKind::Class => (CLASS_FLAGS, Some("System.Object")),
            FixtureKind::Struct => (STRUCT_FLAGS, Some("System.ValueType")),
            FixtureKind::Enum => (ENUM_FLAGS, Some("System.Enum")),
            FixtureKind::Interface => (INTERFACE_FLAGS, None),
        };
        let extends = extends.map_or(0, |base| (self.type_ref(base) << 2) | 1);
        let name = self.string(&ty.name);
        let namespace = self.string(&ty.namespace);
        let field_list = self.table(FIELD).next();
        let method_list = self.table(METHOD_DEF).next();
        let table = self.table(TYPE_DEF);
        let type_row = table.row();
        table.u32(flags).u16(name).u16(namespace).u16(extends).u16(field_list).u16(method_list);

        let interface = ty.kind == FixtureKind::Interface;
        let members: Vec<&FixtureMember> = ty.members.iter().collect();

        if ty.kind == FixtureKind::Enum {
            self.field("value__", FIELD_ENUM_VALUE, vec![0x06, 0x08]);
        }
        let mut literal = 0i32;
        for member in members.iter().filter(|m| matches!(m.kind, FixtureMemberKind::Field | FixtureMemberKind::EnumValue)) {
            if member.kind == FixtureMemberKind::EnumValue {
                let mut signature = vec![0x06, ELEMENT_VALUETYPE];
                compress(u32::from(type_row) << 2, &mut signature);
                let row = self.field(&member.name, FIELD_LITERAL, signature);
                let value = self.blob(&literal.to_le_bytes());
                literal += 1;
                self.table(CONSTANT).row();
                // HasConstant: Field 0
                self.table(CONSTANT).u8(0x08).u8(0).u16(row << 2).u16(value);
            } else {
                let mut signature = vec![0x06];
                self.encode_type(&member.type_name, &mut signature);
                let flags = if member.is_static { FIELD_PUBLIC | FIELD_STATIC } else { FIELD_PUBLIC };
                self.field(&member.name, flags, signature);
            }
        }

        for member in &members {
            let flags = if member.is_static { METHOD_PUBLIC | METHOD_STATIC } else { METHOD_PUBLIC };
            match member.kind {
                FixtureMemberKind::Method => {
                    self.method(&member.name, flags, interface, &member.type_name, &member.params);
                }
                FixtureMemberKind::Constructor => {
                    self.method(".ctor", METHOD_CTOR, false, "System.Void", &member.params);
                }
                _ => {}
            }
        }

        let properties: Vec<&&FixtureMember> = members
            .iter()
            .filter(|m| m.kind == FixtureMemberKind::Property)
            .collect();
        if properties.is_empty() {
            return;
        }
        let property_list = self.table(PROPERTY).next();
        self.table(PROPERTY_MAP).row();
        self.table(PROPERTY_MAP).u16(type_row).u16(property_list);
        for member in properties {
            let flags = METHOD_PUBLIC | METHOD_SPECIAL_NAME | if member.is_static { METHOD_STATIC } else { 0 };
            let getter = self.method(&format!("get_{}", member.name), flags, interface, &member.type_name, &[]);

            let mut signature = vec![if member.is_static { 0x08 } else { 0x28 }, 0];
            self.encode_type(&member.type_name, &mut signature);
            let signature = self.blob(&signature);
            let name = self.string(&member.name);
            let table = self.table(PROPERTY);
            let property = table.row();
            table.u16(0).u16(name).u16(signature);

            self.table(METHOD_SEMANTICS).row();
            // Getter; HasSemantics: Property 1
            self.table(METHOD_SEMANTICS).u16(0x0002).u16(getter).u16((property << 1) | 1);
        }
    }

    fn tables_stream(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&[2, 0, 0, 1]);
        let present: Vec<(&u8, &Table)> = self.tables.iter().filter(|(_, t)| t.rows > 0).collect();
        let valid = present.iter().fold(0u64, |mask, (id, _)| mask | (1u64 << **id));
        out.extend_from_slice(&valid.to_le_bytes());
        out.extend_from_slice(&SORTED_TABLES.to_le_bytes());
        for (_, table) in &present {
            out.extend_from_slice(&u32::from(table.rows).to_le_bytes());
        }
        for (_, table) in &present {
            out.extend_from_slice(&table.data);
        }
        pad4(out)
    }
}

fn mvid(name: &str) -> [u8; 16] {
    let mut guid = [0x5Au8; 16];
    for (i, byte) in name.bytes().enumerate() {
        guid[i % 16] = guid[i % 16].rotate_left(3) ^ byte;
    }
    guid
}

fn metadata_root(streams: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut root = Vec::new();
    root.extend_from_slice(&0x424A_5342u32.to_le_bytes());
    root.extend_from_slice(&1u16.to_le_bytes());
    root.extend_from_slice(&1u16.to_le_bytes());
    root.extend_from_slice(&0u32.to_le_bytes());
    let version = pad4(b"v4.0.30319\0".to_vec());
    root.extend_from_slice(&(version.len() as u32).to_le_bytes());
    root.extend_from_slice(&version);
    root.extend_from_slice(&0u16.to_le_bytes());
    root.extend_from_slice(&(streams.len() as u16).to_le_bytes());

    let names: Vec<Vec<u8>> = streams
        .iter()
        .map(|(name, _)| {
            let mut bytes = name.as_bytes().to_vec();
            bytes.push(0);
            pad4(bytes)
        })
        .collect();
    let headers: usize = names.iter().map(|n| 8 + n.len()).sum();
    let mut offset = root.len() + headers;
    for ((_, data), name) in streams.iter().zip(&names) {
        root.extend_from_slice(&(offset as u32).to_le_bytes());
        root.extend_from_slice(&(data.len() as u32).to_le_bytes());
        root.extend_from_slice(name);
        offset += data.len();
    }
    for (_, data) in streams {
        root.extend_from_slice(data);
    }
    root
}

fn align(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

/// Wraps the `.text` section content in DOS, PE and section headers
fn pe_file(section: Vec<u8>) -> Vec<u8> {
    let raw_size = align(section.len(), FILE_ALIGNMENT);
    let image_size = align(SECTION_RVA as usize + section.len(), SECTION_ALIGNMENT as usize);

    let mut out = vec![0u8; 0x80];
    out[0] = b'M';
    out[1] = b'Z';
    out[0x3C..0x40].copy_from_slice(&0x80u32.to_le_bytes());
    out.extend_from_slice(b"PE\0\0");

    let put16 = |out: &mut Vec<u8>, v: u16| out.extend_from_slice(&v.to_le_bytes());
    let put32 = |out: &mut Vec<u8>, v: u32| out.extend_from_slice(&v.to_le_bytes());

    // COFF header
    put16(&mut out, 0x014C);
    put16(&mut out, 1);
    put32(&mut out, 0);
    put32(&mut out, 0);
    put32(&mut out, 0);
    put16(&mut out, 0xE0);
    put16(&mut out, 0x2102);

    // PE32 optional header
    put16(&mut out, 0x010B);
    out.extend_from_slice(&[8, 0]);
    put32(&mut out, raw_size as u32);
    put32(&mut out, 0);
    put32(&mut out, 0);
    put32(&mut out, 0);
    put32(&mut out, SECTION_RVA);
    put32(&mut out, 0);
    put32(&mut out, 0x1000_0000);
    put32(&mut out, SECTION_ALIGNMENT);
    put32(&mut out, FILE_ALIGNMENT as u32);
    for version in [4u16, 0, 0, 0, 4, 0] {
        put16(&mut out, version);
    }
    put32(&mut out, 0);
    put32(&mut out, image_size as u32);
    put32(&mut out, FILE_ALIGNMENT as u32);
    put32(&mut out, 0);
    put16(&mut out, 3);
    put16(&mut out, 0x8540);
    for size in [0x10_0000u32, 0x1000, 0x10_0000, 0x1000] {
        put32(&mut out, size);
    }
    put32(&mut out, 0);
    put32(&mut out, 16);
    for directory in 0..16 {
        if directory == 14 {
            put32(&mut out, SECTION_RVA);
            put32(&mut out, CLI_HEADER_SIZE as u32);
        } else {
            put32(&mut out, 0);
            put32(&mut out, 0);
        }
    }

    // Section table
    out.extend_from_slice(b".text\0\0\0");
    put32(&mut out, section.len() as u32);
    put32(&mut out, SECTION_RVA);
    put32(&mut out, raw_size as u32);
    put32(&mut out, FILE_ALIGNMENT as u32);
    put32(&mut out, 0);
    put32(&mut out, 0);
    put16(&mut out, 0);
    put16(&mut out, 0);
    put32(&mut out, 0x6000_0020);

    out.resize(FILE_ALIGNMENT, 0);
    out.extend_from_slice(&section);
    out.resize(FILE_ALIGNMENT + raw_size, 0);
    out
}

/// Builds the complete image for an assembly named `name` declaring `types`
pub(crate) fn write_image(name: &str, types: &[TypeFixture]) -> Vec<u8> {
    let mut builder = Builder::new();

    let module_name = builder.string(&format!("{}.dll", name));
    builder.table(MODULE).row();
    builder.table(MODULE).u16(0).u16(module_name).u16(1).u16(0).u16(0);

    let corlib_name = builder.string("mscorlib");
    let corlib_token = builder.blob(&MSCORLIB_TOKEN);
    builder.table(ASSEMBLY_REF).row();
    builder
        .table(ASSEMBLY_REF)
        .u16(4)
        .u16(0)
        .u16(0)
        .u16(0)
        .u32(0)
        .u16(corlib_token)
        .u16(corlib_name)
        .u16(0)
        .u16(0);

    let assembly_name = builder.string(name);
    builder.table(ASSEMBLY).row();
    builder
        .table(ASSEMBLY)
        .u32(0x8004)
        .u16(1)
        .u16(0)
        .u16(0)
        .u16(0)
        .u32(0)
        .u16(0)
        .u16(assembly_name)
        .u16(0);

    for base in ["System.Object", "System.ValueType", "System.Enum"] {
        builder.type_ref(base);
    }

    let module_type = builder.string("<Module>");
    builder.table(TYPE_DEF).row();
    builder.table(TYPE_DEF).u32(0).u16(module_type).u16(0).u16(0).u16(1).u16(1);

    for (i, ty) in types.iter().enumerate() {
        let value_type = matches!(ty.kind, FixtureKind::Struct | FixtureKind::Enum);
        builder.defined.insert(ty.full_name(), (i as u16 + 2, value_type));
    }
    for ty in types {
        builder.type_def(ty);
    }

    let tables = builder.tables_stream();
    let strings = pad4(std::mem::take(&mut builder.strings));
    let blobs = pad4(std::mem::take(&mut builder.blobs));
    let root = metadata_root(&[
        ("#~", tables),
        ("#Strings", strings),
        ("#US", vec![0; 4]),
        ("#GUID", mvid(name).to_vec()),
        ("#Blob", blobs),
    ]);

    let code = pad4(std::mem::take(&mut builder.code));
    let metadata_rva = SECTION_RVA + (CLI_HEADER_SIZE + code.len()) as u32;
    let mut section = Vec::with_capacity(CLI_HEADER_SIZE + code.len() + root.len());
    section.extend_from_slice(&(CLI_HEADER_SIZE as u32).to_le_bytes());
    section.extend_from_slice(&2u16.to_le_bytes());
    section.extend_from_slice(&5u16.to_le_bytes());
    section.extend_from_slice(&metadata_rva.to_le_bytes());
    section.extend_from_slice(&(root.len() as u32).to_le_bytes());
    // ILONLY
    section.extend_from_slice(&1u32.to_le_bytes());
    section.resize(CLI_HEADER_SIZE, 0);
    section.extend_from_slice(&code);
    section.extend_from_slice(&root);

    pe_file(section)
}
