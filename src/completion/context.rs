//! Per-request completion context
//!
//! A [`CompletionContext`] captures everything one completion request
//! resolves against: the verbatim document text and its fresh parse, the
//! clamped caret offset, the project snapshot current at request time, and an
//! optional scripting scope (usings, variables, namespace) that behaves as if
//! it were written above the document.

use std::sync::Arc;

use tracing::trace;

use crate::document::DocumentSnapshot;
use crate::parsers::csharp::using_target;
use crate::parsers::{ParseCache, SourceOutline, SourceParser, SyntaxTree};
use crate::project::{ProjectContent, TypeDef};

const SCRIPT_VARIABLES_PATH: &str = "<script-variables>";

/// Supplies the scripting scope when the caller does not pass one
pub trait ScriptProvider: Send + Sync {
    /// `using` directives, e.g. `using System; using System.Linq;`
    fn usings(&self) -> Option<String>;
    /// Variable declarations, e.g. `int count; var p = new Point();`
    fn variables(&self) -> Option<String>;
    fn namespace(&self) -> Option<String>;
}

/// Raw scripting scope strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptInputs {
    pub usings: Option<String>,
    pub variables: Option<String>,
    pub namespace: Option<String>,
}

impl ScriptInputs {
    pub fn from_provider(provider: &dyn ScriptProvider) -> Self {
        Self {
            usings: provider.usings(),
            variables: provider.variables(),
            namespace: provider.namespace(),
        }
    }
}

/// A variable visible at the caret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub type_name: String,
}

/// Parsed scripting scope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptScope {
    pub usings: Vec<String>,
    pub variables: Vec<Variable>,
    pub namespace: Option<String>,
}

impl ScriptScope {
    pub fn parse(inputs: &ScriptInputs, parser: &dyn SourceParser) -> Self {
        let usings = inputs
            .usings
            .as_deref()
            .map(|text| {
                text.split(';')
                    .filter_map(using_target)
                    .collect()
            })
            .unwrap_or_default();

        let variables = inputs
            .variables
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .and_then(|text| parser.parse(text, SCRIPT_VARIABLES_PATH))
            .map(|tree| {
                tree.outline()
                    .locals
                    .iter()
                    .map(|l| Variable {
                        name: l.name.clone(),
                        type_name: l.type_name.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let namespace = inputs
            .namespace
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        Self {
            usings,
            variables,
            namespace,
        }
    }
}

/// Everything one completion request resolves against
#[derive(Debug, Clone)]
pub struct CompletionContext {
    document: DocumentSnapshot,
    text: Arc<str>,
    offset: usize,
    byte_offset: usize,
    tree: Arc<SyntaxTree>,
    project: Arc<ProjectContent>,
    scope: ScriptScope,
}

impl CompletionContext {
    /// Builds the context for `document` at `offset`, clamping the offset to
    /// the document. The document is parsed fresh, through `cache`.
    pub fn build(
        document: &DocumentSnapshot,
        offset: usize,
        project: Arc<ProjectContent>,
        parser: &dyn SourceParser,
        cache: &ParseCache,
        inputs: &ScriptInputs,
    ) -> Self {
        let offset = offset.min(document.len_chars());
        let text: Arc<str> = Arc::from(document.to_text());
        let path = document.file_name().unwrap_or_default();

        let tree = match cache.get(path, &text) {
            Some(tree) => tree,
            None => {
                let tree = Arc::new(
                    parser
                        .parse(&text, path)
                        .unwrap_or_else(|| SyntaxTree::freeze(path, text.clone(), None, SourceOutline::default())),
                );
                cache.insert(path, &text, tree.clone());
                tree
            }
        };

        let scope = ScriptScope::parse(inputs, parser);
        trace!(
            "Completion context for {} at {}: {} usings, {} script variables",
            path,
            offset,
            scope.usings.len(),
            scope.variables.len()
        );

        Self {
            byte_offset: document.char_to_byte(offset),
            document: document.clone(),
            text,
            offset,
            tree,
            project,
            scope,
        }
    }

    pub fn document(&self) -> &DocumentSnapshot {
        &self.document
    }

    /// Verbatim document text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Caret offset in characters, clamped to the document
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    pub fn byte_of(&self, offset: usize) -> usize {
        self.document.char_to_byte(offset)
    }

    pub fn tree(&self) -> &Arc<SyntaxTree> {
        &self.tree
    }

    pub fn project(&self) -> &Arc<ProjectContent> {
        &self.project
    }

    pub fn scope(&self) -> &ScriptScope {
        &self.scope
    }

    pub fn enclosing_type(&self) -> Option<Arc<TypeDef>> {
        self.tree.enclosing_type(self.byte_offset)
    }

    /// Namespace the caret is in: the innermost namespace block, else the
    /// scripting namespace
    pub fn current_namespace(&self) -> Option<String> {
        self.tree
            .namespace_at(self.byte_offset)
            .map(str::to_string)
            .or_else(|| self.scope.namespace.clone())
    }

    /// Namespaces whose types are visible by simple name: scripting usings,
    /// document usings, then the current namespace and its parents
    pub fn imported_namespaces(&self) -> Vec<String> {
        let mut namespaces: Vec<String> = Vec::new();
        let mut push = |ns: String| {
            if !ns.is_empty() && !namespaces.contains(&ns) {
                namespaces.push(ns);
            }
        };
        for using in self.scope.usings.iter().chain(self.tree.outline().usings.iter()) {
            push(using.clone());
        }
        if let Some(current) = self.current_namespace() {
            let mut prefix = current.as_str();
            loop {
                push(prefix.to_string());
                match prefix.rsplit_once('.') {
                    Some((parent, _)) => prefix = parent,
                    None => break,
                }
            }
        }
        namespaces
    }

    /// Script variables and the locals declared before the caret. A later
    /// declaration hides an earlier one with the same name.
    pub fn visible_variables(&self) -> Vec<Variable> {
        let mut variables: Vec<Variable> = Vec::new();
        let declared = self.scope.variables.iter().cloned().chain(
            self.tree
                .locals_before(self.byte_offset)
                .into_iter()
                .map(|l| Variable {
                    name: l.name.clone(),
                    type_name: l.type_name.clone(),
                }),
        );
        for variable in declared {
            variables.retain(|v| v.name != variable.name);
            variables.push(variable);
        }
        variables
    }

    pub fn variable(&self, name: &str) -> Option<Variable> {
        self.visible_variables().into_iter().find(|v| v.name == name)
    }
}
