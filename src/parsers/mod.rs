//! C# parsing: the parser contract, the Tree-Sitter implementation and the
//! per-request parse cache

pub mod csharp;
pub mod parse_cache;
pub mod syntax;

pub use csharp::TreeSitterCSharpParser;
pub use parse_cache::ParseCache;
pub use syntax::{DeclaredType, LocalDecl, SourceOutline, SourceParser, SyntaxTree};
