//! Frozen syntax trees and the parser contract
//!
//! A [`SyntaxTree`] is produced once per parse and never mutated afterwards.
//! Besides the optional concrete tree it carries a [`SourceOutline`]: the
//! declarations the completion engine needs (namespaces, usings, types with
//! their byte spans, and local declarations with their visibility scopes).

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::project::type_system::TypeDef;

/// Contract of the C# parsing collaborator
pub trait SourceParser: Send + Sync {
    /// Parses `text` as a compilation unit registered under `path`.
    ///
    /// Returns `None` when the parser could not produce any tree at all; a
    /// tree with syntax errors is still returned (best effort).
    fn parse(&self, text: &str, path: &str) -> Option<SyntaxTree>;
}

/// A type declaration together with the byte span it occupies
#[derive(Debug, Clone)]
pub struct DeclaredType {
    pub def: Arc<TypeDef>,
    pub span: Range<usize>,
}

/// A local variable or parameter visible inside `scope` after `declared_at`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDecl {
    pub name: String,
    pub type_name: String,
    pub declared_at: usize,
    pub scope: Range<usize>,
}

/// Declarations extracted from a source file
#[derive(Debug, Clone, Default)]
pub struct SourceOutline {
    pub usings: Vec<String>,
    /// Namespace blocks with their spans (file-scoped namespaces span to EOF)
    pub namespaces: Vec<(String, Range<usize>)>,
    pub types: Vec<DeclaredType>,
    pub locals: Vec<LocalDecl>,
}

/// Immutable result of parsing one source text
pub struct SyntaxTree {
    path: String,
    text: Arc<str>,
    tree: Option<tree_sitter::Tree>,
    outline: SourceOutline,
    has_errors: bool,
}

impl fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("path", &self.path)
            .field("len", &self.text.len())
            .field("types", &self.outline.types.len())
            .field("has_errors", &self.has_errors)
            .finish()
    }
}

impl SyntaxTree {
    /// Freezes a parse result. Nothing about the tree can change afterwards.
    pub fn freeze(
        path: impl Into<String>,
        text: impl Into<Arc<str>>,
        tree: Option<tree_sitter::Tree>,
        outline: SourceOutline,
    ) -> Self {
        let has_errors = tree.as_ref().is_some_and(|t| t.root_node().has_error());
        Self {
            path: path.into(),
            text: text.into(),
            tree,
            outline,
            has_errors,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tree(&self) -> Option<&tree_sitter::Tree> {
        self.tree.as_ref()
    }

    pub fn outline(&self) -> &SourceOutline {
        &self.outline
    }

    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    /// Type-system view of the declared types (the "to type system" step)
    pub fn type_definitions(&self) -> Vec<Arc<TypeDef>> {
        self.outline.types.iter().map(|t| t.def.clone()).collect()
    }

    pub fn usings(&self) -> Vec<String> {
        self.outline.usings.clone()
    }

    /// Innermost type whose declaration contains `byte`
    pub fn enclosing_type(&self, byte: usize) -> Option<Arc<TypeDef>> {
        self.outline
            .types
            .iter()
            .filter(|t| t.span.start <= byte && byte <= t.span.end)
            .min_by_key(|t| t.span.end - t.span.start)
            .map(|t| t.def.clone())
    }

    /// Innermost namespace block containing `byte`
    pub fn namespace_at(&self, byte: usize) -> Option<&str> {
        self.outline
            .namespaces
            .iter()
            .filter(|(_, span)| span.start <= byte && byte <= span.end)
            .min_by_key(|(_, span)| span.end - span.start)
            .map(|(name, _)| name.as_str())
    }

    /// Locals and parameters in scope at `byte`, innermost declarations last
    pub fn locals_before(&self, byte: usize) -> Vec<&LocalDecl> {
        let mut visible: Vec<&LocalDecl> = self
            .outline
            .locals
            .iter()
            .filter(|l| l.declared_at < byte && l.scope.start <= byte && byte <= l.scope.end)
            .collect();
        visible.sort_by_key(|l| l.declared_at);
        visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::type_system::TypeKind;

    fn outline() -> SourceOutline {
        SourceOutline {
            usings: vec!["System".to_string()],
            namespaces: vec![("App".to_string(), 0..100)],
            types: vec![
                DeclaredType {
                    def: Arc::new(TypeDef::new("App", "Outer", TypeKind::Class)),
                    span: 10..90,
                },
                DeclaredType {
                    def: Arc::new(TypeDef::new("App", "Inner", TypeKind::Struct)),
                    span: 20..40,
                },
            ],
            locals: vec![LocalDecl {
                name: "count".to_string(),
                type_name: "int".to_string(),
                declared_at: 50,
                scope: 45..80,
            }],
        }
    }

    #[test]
    fn test_enclosing_type_prefers_innermost() {
        let tree = SyntaxTree::freeze("a.cs", "", None, outline());
        assert_eq!(tree.enclosing_type(30).unwrap().name, "Inner");
        assert_eq!(tree.enclosing_type(60).unwrap().name, "Outer");
        assert!(tree.enclosing_type(95).is_none());
    }

    #[test]
    fn test_locals_respect_declaration_point() {
        let tree = SyntaxTree::freeze("a.cs", "", None, outline());
        assert!(tree.locals_before(48).is_empty());
        assert_eq!(tree.locals_before(60).len(), 1);
        assert!(tree.locals_before(85).is_empty());
    }
}
