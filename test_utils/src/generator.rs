//! quickcheck generators for C#-shaped inputs
//!
//! Identifiers avoid C# keywords so that generated sources parse cleanly.

use quickcheck::{Arbitrary, Gen};

const KEYWORDS: &[&str] = &[
    "as", "do", "if", "in", "is", "for", "int", "new", "out", "ref", "try", "base", "bool", "byte", "case", "char",
    "else", "enum", "goto", "lock", "long", "null", "this", "true", "uint", "void", "break", "catch", "class",
    "const", "event", "false", "fixed", "float", "sbyte", "short", "throw", "ulong", "using", "while", "double",
    "object", "params", "public", "return", "sealed", "sizeof", "static", "string", "struct", "switch", "typeof",
    "unsafe", "ushort", "checked", "decimal", "default", "dynamic", "finally", "foreach", "private", "virtual",
];

/// Generates a random number in the range [min, max] inclusive.
fn gen_range(g: &mut Gen, min: u32, max: u32) -> u32 {
    min + (u32::arbitrary(g) % (max - min + 1))
}

fn gen_identifier(g: &mut Gen, capitalized: bool) -> String {
    let lower: Vec<char> = "abcdefghijklmnopqrstuvwxyz".chars().collect();
    let upper: Vec<char> = "ABCDEFGHIJKLMNOPQRSTUVWXYZ".chars().collect();
    let continuers: Vec<char> = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_"
        .chars()
        .collect();
    let starters = if capitalized { &upper } else { &lower };
    loop {
        let len = gen_range(g, 1, 10);
        let mut name = String::new();
        name.push(g.choose(starters).copied().unwrap_or('A'));
        for _ in 1..len {
            name.push(g.choose(&continuers).copied().unwrap_or('x'));
        }
        if !KEYWORDS.contains(&name.as_str()) {
            return name;
        }
    }
}

/// A C# identifier that is not a keyword
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Identifier(pub String);

impl Arbitrary for Identifier {
    fn arbitrary(g: &mut Gen) -> Self {
        Identifier(gen_identifier(g, false))
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        let name = self.0.clone();
        Box::new((1..name.len()).rev().filter_map(move |len| {
            let candidate = name[..len].to_string();
            (!KEYWORDS.contains(&candidate.as_str())).then_some(Identifier(candidate))
        }))
    }
}

/// 1 to 6 distinct PascalCase assembly names
#[derive(Clone, Debug)]
pub struct AssemblyNames(pub Vec<String>);

impl Arbitrary for AssemblyNames {
    fn arbitrary(g: &mut Gen) -> Self {
        let count = gen_range(g, 1, 6) as usize;
        let mut names: Vec<String> = Vec::with_capacity(count);
        while names.len() < count {
            let name = gen_identifier(g, true);
            if !names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
                names.push(name);
            }
        }
        AssemblyNames(names)
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        let names = self.0.clone();
        Box::new((1..names.len()).rev().map(move |len| AssemblyNames(names[..len].to_vec())))
    }
}
