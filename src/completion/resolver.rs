//! Symbol resolution against a project snapshot
//!
//! [`SemanticResolver`] is the seam the engine asks for candidates and
//! parameter data. [`SnapshotResolver`] implements it over the unresolved
//! type system of a [`ProjectContent`] plus the document's own parse:
//!
//! - member access after `.` on namespaces, types (static members) and
//!   typed expressions (instance members);
//! - scope-wide lists: keywords, visible variables, members of the enclosing
//!   type, visible types and root namespaces;
//! - types after `new `;
//! - import suggestions for types whose namespace is not imported;
//! - method and constructor signatures for overload insight.

use std::sync::Arc;

use once_cell::sync::Lazy;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::completion::CompletionError;
use crate::completion::context::CompletionContext;
use crate::completion::item::{CandidateKind, CompletionItem};
use crate::completion::overload::{OverloadProvider, OverloadSignature};
use crate::document::DocumentSnapshot;
use crate::project::{MemberDef, MemberKind, TypeDef, TypeKind};

/// A collaborator result. Only items are rendered; import suggestions have no
/// popup representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedCandidate {
    Item(CompletionItem),
    ImportSuggestion { type_name: String, namespace: String },
}

pub trait SemanticResolver: Send + Sync {
    /// Candidates for a completion anchored at `offset`
    fn completion_data(
        &self,
        context: &CompletionContext,
        offset: usize,
        explicit: bool,
    ) -> Result<Vec<ResolvedCandidate>, CompletionError>;

    /// Overload insight for the call around `offset`, if any
    fn parameter_data(
        &self,
        context: &CompletionContext,
        offset: usize,
        completion_char: Option<char>,
    ) -> Result<Option<OverloadProvider>, CompletionError>;
}

const KEYWORDS: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked", "class", "const",
    "continue", "decimal", "default", "delegate", "do", "double", "else", "enum", "event", "explicit", "extern",
    "false", "finally", "fixed", "float", "for", "foreach", "goto", "if", "implicit", "in", "int", "interface",
    "internal", "is", "lock", "long", "namespace", "new", "null", "object", "operator", "out", "override",
    "params", "private", "protected", "public", "readonly", "ref", "return", "sbyte", "sealed", "short",
    "sizeof", "stackalloc", "static", "string", "struct", "switch", "this", "throw", "true", "try", "typeof",
    "uint", "ulong", "unchecked", "unsafe", "ushort", "using", "var", "virtual", "void", "volatile", "while",
];

static TYPE_ALIASES: Lazy<FxHashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("bool", "System.Boolean"),
        ("byte", "System.Byte"),
        ("char", "System.Char"),
        ("decimal", "System.Decimal"),
        ("double", "System.Double"),
        ("float", "System.Single"),
        ("int", "System.Int32"),
        ("long", "System.Int64"),
        ("object", "System.Object"),
        ("sbyte", "System.SByte"),
        ("short", "System.Int16"),
        ("string", "System.String"),
        ("uint", "System.UInt32"),
        ("ulong", "System.UInt64"),
        ("ushort", "System.UInt16"),
    ]
    .into_iter()
    .collect()
});

/// Syntax node kinds in which completion is never offered
const INERT_NODE_KINDS: &[&str] = &[
    "comment",
    "string_literal",
    "verbatim_string_literal",
    "raw_string_literal",
    "character_literal",
    "interpolated_string_text",
];

/// What an expression before `.` denotes
#[derive(Debug, Clone)]
enum Resolved {
    Namespace(String),
    Type(Arc<TypeDef>),
    Instance(Arc<TypeDef>),
}

/// Default resolver over the project snapshot
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotResolver;

impl SnapshotResolver {
    pub fn new() -> Self {
        Self
    }
}

impl SemanticResolver for SnapshotResolver {
    fn completion_data(
        &self,
        context: &CompletionContext,
        offset: usize,
        explicit: bool,
    ) -> Result<Vec<ResolvedCandidate>, CompletionError> {
        let document = context.document();
        if offset > document.len_chars() {
            return Err(CompletionError::OffsetOutOfRange {
                offset,
                length: document.len_chars(),
            });
        }
        if in_inert_node(context, context.offset()) {
            trace!("Caret is inside a comment or literal");
            return Ok(Vec::new());
        }

        let word_start = identifier_start(document, offset);
        if word_start > 0 && document.char_at(word_start - 1) == Some('.') {
            let Some(target) = resolve_expression(context, word_start - 1) else {
                trace!("Unresolved member access target before {}", word_start);
                return Ok(Vec::new());
            };
            return Ok(member_candidates(context, &target)
                .into_iter()
                .map(ResolvedCandidate::Item)
                .collect());
        }

        if preceded_by_keyword(document, word_start, "new") {
            return Ok(visible_types(context)
                .into_iter()
                .filter(|t| matches!(t.kind, TypeKind::Class | TypeKind::Struct | TypeKind::Record))
                .map(|t| ResolvedCandidate::Item(type_item(&t)))
                .collect());
        }

        let typing_identifier = word_start < context.offset();
        if !explicit && !typing_identifier {
            return Ok(Vec::new());
        }

        let mut candidates: Vec<ResolvedCandidate> = scope_candidates(context)
            .into_iter()
            .map(ResolvedCandidate::Item)
            .collect();
        if explicit {
            let word = document.slice(word_start, context.offset());
            candidates.extend(import_suggestions(context, &word));
        }
        Ok(candidates)
    }

    fn parameter_data(
        &self,
        context: &CompletionContext,
        offset: usize,
        completion_char: Option<char>,
    ) -> Result<Option<OverloadProvider>, CompletionError> {
        if !matches!(completion_char, Some('(') | Some(',')) || in_inert_node(context, offset) {
            return Ok(None);
        }
        let document = context.document();
        let Some(open) = unclosed_paren_before(document, offset) else {
            return Ok(None);
        };

        let signatures = call_signatures(context, open);
        let provider = OverloadProvider::new(open + 1, signatures).map(|mut provider| {
            provider.update(document, offset);
            provider
        });
        Ok(provider)
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn in_inert_node(context: &CompletionContext, offset: usize) -> bool {
    let Some(tree) = context.tree().tree() else { return false };
    if offset == 0 {
        return false;
    }
    let byte = context.byte_of(offset - 1);
    let mut node = tree.root_node().descendant_for_byte_range(byte, byte);
    while let Some(current) = node {
        if INERT_NODE_KINDS.contains(&current.kind()) {
            // The closing quote itself is outside the literal's content
            return !(current.end_byte() == byte + 1 && current.kind() != "comment");
        }
        node = current.parent();
    }
    false
}

/// Start of the identifier ending at `offset`
fn identifier_start(document: &DocumentSnapshot, offset: usize) -> usize {
    let mut start = offset;
    while start > 0 && document.char_at(start - 1).is_some_and(is_identifier_char) {
        start -= 1;
    }
    start
}

/// True if the text before `offset` (ignoring whitespace) ends with `keyword`
/// as a whole word
fn preceded_by_keyword(document: &DocumentSnapshot, offset: usize, keyword: &str) -> bool {
    let before = document.slice(0, offset);
    let trimmed = before.trim_end();
    if trimmed.len() == before.len() {
        return false;
    }
    match trimmed.strip_suffix(keyword) {
        Some(rest) => !rest.chars().next_back().is_some_and(is_identifier_char),
        None => false,
    }
}

/// The member-access expression ending at `end` (exclusive): identifiers,
/// dots and balanced call/index suffixes
fn expression_before(document: &DocumentSnapshot, end: usize) -> (usize, String) {
    let mut start = end;
    let mut depth = 0usize;
    while start > 0 {
        let Some(c) = document.char_at(start - 1) else { break };
        match c {
            ')' | ']' => depth += 1,
            '(' | '[' => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            _ if depth > 0 => {}
            c if is_identifier_char(c) || c == '.' => {}
            _ => break,
        }
        start -= 1;
    }
    (start, document.slice(start, end))
}

/// Splits `a.b(1, 2).c` into `[("a", false), ("b", true), ("c", false)]`.
/// Index suffixes make the segment unresolvable (`None`).
fn segments(expression: &str) -> Option<Vec<(String, bool)>> {
    let mut result = Vec::new();
    let mut name = String::new();
    let mut invoked = false;
    let mut depth = 0usize;
    for c in expression.chars() {
        match c {
            '(' => {
                if depth == 0 {
                    invoked = true;
                }
                depth += 1;
            }
            ')' => depth = depth.saturating_sub(1),
            '[' if depth == 0 => return None,
            _ if depth > 0 => {}
            '.' => {
                result.push((std::mem::take(&mut name), invoked));
                invoked = false;
            }
            c => name.push(c),
        }
    }
    result.push((name, invoked));
    if result.iter().any(|(n, _)| n.is_empty()) {
        return None;
    }
    Some(result)
}

/// Resolves the expression whose trailing `.` is at `dot`
fn resolve_expression(context: &CompletionContext, dot: usize) -> Option<Resolved> {
    let document = context.document();
    let (start, expression) = expression_before(document, dot);
    let parts = segments(&expression)?;

    if preceded_by_keyword(document, start, "new") {
        let type_name = parts.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>().join(".");
        return resolve_type_name(context, &type_name).map(Resolved::Instance);
    }

    let mut iter = parts.into_iter();
    let (first, invoked) = iter.next()?;
    let mut current = resolve_first_segment(context, &first, invoked)?;
    for (name, invoked) in iter {
        current = resolve_segment(context, current, &name, invoked)?;
    }
    Some(current)
}

fn resolve_first_segment(context: &CompletionContext, name: &str, invoked: bool) -> Option<Resolved> {
    if name == "this" {
        return context.enclosing_type().map(Resolved::Instance);
    }
    if let Some(variable) = context.variable(name) {
        return resolve_type_name(context, &variable.type_name).map(Resolved::Instance);
    }
    if let Some(enclosing) = context.enclosing_type() {
        if let Some(member) = enclosing.members_named(name).find(|m| m.kind != MemberKind::Constructor) {
            return member_result(context, member, invoked);
        }
    }
    if let Some(full) = TYPE_ALIASES.get(name) {
        return context.project().find_type(full, &[]).map(Resolved::Type);
    }
    if let Some(ty) = context.project().find_type(name, &lookup_namespaces(context)) {
        return Some(Resolved::Type(ty));
    }
    context
        .project()
        .namespaces()
        .contains(name)
        .then(|| Resolved::Namespace(name.to_string()))
}

fn resolve_segment(context: &CompletionContext, current: Resolved, name: &str, invoked: bool) -> Option<Resolved> {
    match current {
        Resolved::Namespace(ns) => {
            let full = format!("{}.{}", ns, name);
            if let Some(ty) = context.project().find_type(&full, &[]) {
                return Some(Resolved::Type(ty));
            }
            context
                .project()
                .namespaces()
                .contains(&full)
                .then_some(Resolved::Namespace(full))
        }
        Resolved::Type(ty) | Resolved::Instance(ty) => {
            let member = ty
                .members_named(name)
                .find(|m| m.kind != MemberKind::Constructor)?;
            member_result(context, member, invoked)
        }
    }
}

/// The value of accessing `member` (invoking it if it is a method)
fn member_result(context: &CompletionContext, member: &MemberDef, invoked: bool) -> Option<Resolved> {
    if member.kind == MemberKind::Method && !invoked {
        return None;
    }
    let type_name = member.return_type.as_deref()?;
    resolve_type_name(context, type_name).map(Resolved::Instance)
}

/// Namespaces searched for simple type names: the imported ones plus the
/// enclosing type's own namespace
fn lookup_namespaces(context: &CompletionContext) -> Vec<String> {
    let mut namespaces = context.imported_namespaces();
    if let Some(enclosing) = context.enclosing_type() {
        if !enclosing.namespace.is_empty() && !namespaces.contains(&enclosing.namespace) {
            namespaces.push(enclosing.namespace.clone());
        }
    }
    namespaces
}

/// Resolves a declared type name (`string`, `List<int>`, `Point?`, `System.Text.StringBuilder`)
fn resolve_type_name(context: &CompletionContext, type_name: &str) -> Option<Arc<TypeDef>> {
    let name = type_name.trim().trim_end_matches('?');
    if name.is_empty() || name == "var" || name.ends_with(']') {
        return None;
    }
    let name = name.split('<').next().unwrap_or(name).trim();
    if let Some(full) = TYPE_ALIASES.get(name) {
        return context.project().find_type(full, &[]);
    }
    context.project().find_type(name, &lookup_namespaces(context))
}

fn type_item(ty: &TypeDef) -> CompletionItem {
    CompletionItem::new(ty.name.clone(), ty.kind.into())
        .with_description(format!("{} {}", ty.kind.keyword(), ty.full_name()))
        .with_documentation(ty.documentation.clone())
}

/// One item per member name; overloads are summarised in the description
fn member_items<'a>(members: impl Iterator<Item = &'a MemberDef>) -> Vec<CompletionItem> {
    let mut order: Vec<(&str, CandidateKind)> = Vec::new();
    let mut grouped: FxHashMap<(&str, CandidateKind), Vec<&MemberDef>> = FxHashMap::default();
    for member in members {
        let key = (member.name.as_str(), CandidateKind::from(member.kind));
        let group = grouped.entry(key).or_default();
        if group.is_empty() {
            order.push(key);
        }
        group.push(member);
    }

    order
        .into_iter()
        .filter_map(|key| {
            let group = grouped.get(&key)?;
            let first = group.first()?;
            let description = match group.len() {
                1 => first.signature(),
                n => format!("{} (+{} overloads)", first.signature(), n - 1),
            };
            Some(
                CompletionItem::new(first.name.clone(), key.1)
                    .with_description(description)
                    .with_documentation(first.documentation.clone()),
            )
        })
        .collect()
}

fn member_candidates(context: &CompletionContext, target: &Resolved) -> Vec<CompletionItem> {
    match target {
        Resolved::Namespace(ns) => {
            let prefix = format!("{}.", ns);
            let mut items: Vec<CompletionItem> = context
                .project()
                .namespaces()
                .into_iter()
                .filter_map(|candidate| {
                    let child = candidate.strip_prefix(&prefix)?;
                    (!child.contains('.')).then(|| CompletionItem::new(child, CandidateKind::Namespace))
                })
                .collect();
            let mut seen = FxHashSet::default();
            items.extend(
                context
                    .project()
                    .types_in_namespace(ns)
                    .filter(|t| seen.insert(t.name.clone()))
                    .map(|t| type_item(t)),
            );
            items
        }
        Resolved::Type(ty) => member_items(
            ty.members
                .iter()
                .filter(|m| m.kind != MemberKind::Constructor)
                .filter(|m| m.is_static || m.kind == MemberKind::EnumValue),
        ),
        Resolved::Instance(ty) => member_items(
            ty.members
                .iter()
                .filter(|m| !m.is_static && !matches!(m.kind, MemberKind::Constructor | MemberKind::EnumValue)),
        ),
    }
}

/// Types visible by simple name at the caret
fn visible_types(context: &CompletionContext) -> Vec<Arc<TypeDef>> {
    let namespaces = lookup_namespaces(context);
    let mut seen = FxHashSet::default();
    context
        .project()
        .types()
        .chain(context.tree().outline().types.iter().map(|t| &t.def))
        .filter(|t| t.namespace.is_empty() || namespaces.contains(&t.namespace))
        .filter(|t| seen.insert(t.full_name()))
        .cloned()
        .collect()
}

fn scope_candidates(context: &CompletionContext) -> Vec<CompletionItem> {
    let mut items: Vec<CompletionItem> = KEYWORDS
        .iter()
        .map(|k| CompletionItem::new(*k, CandidateKind::Keyword))
        .collect();

    items.extend(context.visible_variables().into_iter().map(|v| {
        let item = CompletionItem::new(v.name.clone(), CandidateKind::Variable);
        if v.type_name.is_empty() {
            item
        } else {
            item.with_description(format!("{} {}", v.type_name, v.name))
        }
    }));

    if let Some(enclosing) = context.enclosing_type() {
        items.extend(member_items(
            enclosing.members.iter().filter(|m| m.kind != MemberKind::Constructor),
        ));
    }

    items.extend(visible_types(context).iter().map(|t| type_item(t)));

    let roots: FxHashSet<String> = context
        .project()
        .namespaces()
        .into_iter()
        .filter_map(|ns| ns.split('.').next().map(str::to_string))
        .collect();
    let mut roots: Vec<String> = roots.into_iter().collect();
    roots.sort();
    items.extend(roots.into_iter().map(|ns| CompletionItem::new(ns, CandidateKind::Namespace)));
    items
}

fn import_suggestions(context: &CompletionContext, word: &str) -> Vec<ResolvedCandidate> {
    if word.is_empty() {
        return Vec::new();
    }
    let visible = lookup_namespaces(context);
    let mut seen = FxHashSet::default();
    context
        .project()
        .types()
        .filter(|t| !t.namespace.is_empty() && !visible.contains(&t.namespace))
        .filter(|t| t.name.starts_with(word))
        .filter(|t| seen.insert(t.full_name()))
        .map(|t| ResolvedCandidate::ImportSuggestion {
            type_name: t.name.clone(),
            namespace: t.namespace.clone(),
        })
        .collect()
}

/// Offset of the innermost `(` before `offset` that is not yet closed
fn unclosed_paren_before(document: &DocumentSnapshot, offset: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = offset;
    while i > 0 {
        i -= 1;
        match document.char_at(i)? {
            ')' => depth += 1,
            '(' => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            ';' | '{' | '}' if depth == 0 => return None,
            _ => {}
        }
    }
    None
}

/// Signatures of the method or constructor invoked by the `(` at `open`
fn call_signatures(context: &CompletionContext, open: usize) -> Vec<OverloadSignature> {
    let document = context.document();
    let (start, expression) = expression_before(document, open);
    let Some(mut parts) = segments(&expression) else { return Vec::new() };

    if preceded_by_keyword(document, start, "new") {
        let type_name = parts.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>().join(".");
        let Some(ty) = resolve_type_name(context, &type_name) else { return Vec::new() };
        let constructors: Vec<OverloadSignature> = ty.constructors().map(OverloadSignature::from).collect();
        if constructors.is_empty() {
            return vec![OverloadSignature::from(&MemberDef::new(ty.name.clone(), MemberKind::Constructor))];
        }
        return constructors;
    }

    let Some((method, _)) = parts.pop() else { return Vec::new() };
    let owner = if parts.is_empty() {
        context.enclosing_type()
    } else {
        let mut iter = parts.into_iter();
        let Some((first, invoked)) = iter.next() else { return Vec::new() };
        let mut current = match resolve_first_segment(context, &first, invoked) {
            Some(resolved) => resolved,
            None => return Vec::new(),
        };
        for (name, invoked) in iter {
            current = match resolve_segment(context, current, &name, invoked) {
                Some(resolved) => resolved,
                None => return Vec::new(),
            };
        }
        match current {
            Resolved::Type(ty) | Resolved::Instance(ty) => Some(ty),
            Resolved::Namespace(_) => None,
        }
    };

    owner
        .map(|ty| {
            ty.members_named(&method)
                .filter(|m| m.kind == MemberKind::Method)
                .map(OverloadSignature::from)
                .collect()
        })
        .unwrap_or_default()
}
