//! Tree-Sitter based C# parser
//!
//! Parses C# source with `tree-sitter-c-sharp` and extracts a
//! [`SourceOutline`]: using directives, namespace blocks, type declarations
//! (with members and parameters) and local declarations with their scopes.
//! Nested types are flattened into the outline with the namespace of their
//! outermost declaration.

use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, trace, warn};
use tree_sitter::{Node, Parser};

use crate::parsers::syntax::{DeclaredType, LocalDecl, SourceOutline, SourceParser, SyntaxTree};
use crate::project::type_system::{MemberDef, MemberKind, ParameterDef, TypeDef, TypeKind};

/// Default [`SourceParser`] backed by tree-sitter-c-sharp
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeSitterCSharpParser;

impl TreeSitterCSharpParser {
    pub fn new() -> Self {
        Self
    }
}

impl SourceParser for TreeSitterCSharpParser {
    fn parse(&self, text: &str, path: &str) -> Option<SyntaxTree> {
        let mut parser = Parser::new();
        if let Err(e) = parser.set_language(&tree_sitter_c_sharp::LANGUAGE.into()) {
            warn!("Failed to set Tree-Sitter C# language: {}", e);
            return None;
        }
        let tree = parser.parse(text, None)?;
        if tree.root_node().has_error() {
            debug!("Parse tree for {} contains errors", path);
        }

        let mut outline = SourceOutline::default();
        let mut extractor = OutlineExtractor {
            src: text.as_bytes(),
            outline: &mut outline,
        };
        extractor.walk_scope(tree.root_node(), "");

        trace!(
            "Parsed {}: {} types, {} usings, {} locals",
            path,
            outline.types.len(),
            outline.usings.len(),
            outline.locals.len()
        );
        Some(SyntaxTree::freeze(path, text, Some(tree), outline))
    }
}

struct OutlineExtractor<'s, 'o> {
    src: &'s [u8],
    outline: &'o mut SourceOutline,
}

fn type_kind_of(kind: &str) -> Option<TypeKind> {
    match kind {
        "class_declaration" => Some(TypeKind::Class),
        "struct_declaration" | "record_struct_declaration" => Some(TypeKind::Struct),
        "interface_declaration" => Some(TypeKind::Interface),
        "enum_declaration" => Some(TypeKind::Enum),
        "record_declaration" => Some(TypeKind::Record),
        "delegate_declaration" => Some(TypeKind::Delegate),
        _ => None,
    }
}

fn join_namespace(outer: &str, inner: &str) -> String {
    if outer.is_empty() {
        inner.to_string()
    } else {
        format!("{}.{}", outer, inner)
    }
}

fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

impl<'s, 'o> OutlineExtractor<'s, 'o> {
    fn text(&self, node: Node) -> String {
        node.utf8_text(self.src).unwrap_or_default().trim().to_string()
    }

    /// Name of a declaration: the `name` field, else its first identifier
    fn name_of(&self, node: Node) -> Option<String> {
        if let Some(name) = node.child_by_field_name("name") {
            return Some(self.text(name));
        }
        named_children(node)
            .into_iter()
            .find(|c| c.kind() == "identifier")
            .map(|c| self.text(c))
    }

    /// Declared type of a member, parameter or variable declaration
    fn type_of(&self, node: Node) -> Option<String> {
        node.child_by_field_name("type")
            .or_else(|| node.child_by_field_name("returns"))
            .map(|t| self.text(t))
    }

    fn is_static(&self, node: Node) -> bool {
        named_children(node)
            .into_iter()
            .any(|c| c.kind() == "modifier" && self.text(c) == "static")
    }

    /// Walks a compilation unit, namespace body or declaration list
    fn walk_scope(&mut self, node: Node, namespace: &str) {
        let mut current_namespace = namespace.to_string();
        for child in named_children(node) {
            match child.kind() {
                "using_directive" => {
                    if let Some(target) = using_target(&self.text(child)) {
                        self.outline.usings.push(target);
                    }
                }
                "namespace_declaration" => {
                    let Some(name) = self.name_of(child) else { continue };
                    let full = join_namespace(&current_namespace, &name);
                    self.outline.namespaces.push((full.clone(), child.byte_range()));
                    if let Some(body) = child.child_by_field_name("body") {
                        self.walk_scope(body, &full);
                    } else {
                        self.walk_scope(child, &full);
                    }
                }
                "file_scoped_namespace_declaration" => {
                    let Some(name) = self.name_of(child) else { continue };
                    let full = join_namespace(namespace, &name);
                    self.outline
                        .namespaces
                        .push((full.clone(), child.start_byte()..self.src.len()));
                    // Depending on grammar version the following declarations
                    // are either children of this node or its siblings.
                    self.walk_scope(child, &full);
                    current_namespace = full;
                }
                "declaration_list" => self.walk_scope(child, &current_namespace),
                "global_statement" => {
                    let scope = child.start_byte()..self.src.len();
                    self.collect_locals(child, &scope);
                }
                kind => {
                    if let Some(type_kind) = type_kind_of(kind) {
                        self.type_declaration(child, &current_namespace, type_kind);
                    }
                }
            }
        }
    }

    fn type_declaration(&mut self, node: Node, namespace: &str, kind: TypeKind) {
        let Some(name) = self.name_of(node) else { return };
        let mut def = TypeDef::new(namespace, name.clone(), kind);

        let body = node.child_by_field_name("body").or_else(|| {
            named_children(node)
                .into_iter()
                .find(|c| matches!(c.kind(), "declaration_list" | "enum_member_declaration_list"))
        });

        if let Some(body) = body {
            for member in named_children(body) {
                if let Some(nested_kind) = type_kind_of(member.kind()) {
                    self.type_declaration(member, namespace, nested_kind);
                    continue;
                }
                self.member_declaration(member, &name, &mut def);
            }
        }

        // Record primary-constructor parameters as a constructor
        if let Some(params) = node.child_by_field_name("parameters") {
            let parameters = self.parameters(params);
            def.members
                .push(MemberDef::new(name.clone(), MemberKind::Constructor).with_parameters(parameters));
        }

        self.outline.types.push(DeclaredType {
            def: Arc::new(def),
            span: node.byte_range(),
        });
    }

    fn member_declaration(&mut self, member: Node, type_name: &str, def: &mut TypeDef) {
        let is_static = self.is_static(member);
        match member.kind() {
            "method_declaration" => {
                let Some(name) = self.name_of(member) else { return };
                let parameters = self.parameter_list_of(member);
                self.record_parameters_as_locals(member, &parameters);
                let mut method = MemberDef::new(name, MemberKind::Method)
                    .with_parameters(parameters)
                    .with_static(is_static);
                method.return_type = self.type_of(member);
                def.members.push(method);
                self.collect_locals(member, &member.byte_range());
            }
            "constructor_declaration" => {
                let parameters = self.parameter_list_of(member);
                self.record_parameters_as_locals(member, &parameters);
                def.members.push(
                    MemberDef::new(type_name, MemberKind::Constructor)
                        .with_parameters(parameters)
                        .with_static(is_static),
                );
                self.collect_locals(member, &member.byte_range());
            }
            "property_declaration" | "event_declaration" => {
                let Some(name) = self.name_of(member) else { return };
                let kind = if member.kind() == "property_declaration" {
                    MemberKind::Property
                } else {
                    MemberKind::Event
                };
                let mut prop = MemberDef::new(name, kind).with_static(is_static);
                prop.return_type = self.type_of(member);
                def.members.push(prop);
            }
            "field_declaration" | "event_field_declaration" => {
                let kind = if member.kind() == "field_declaration" {
                    MemberKind::Field
                } else {
                    MemberKind::Event
                };
                let Some(declaration) = named_children(member)
                    .into_iter()
                    .find(|c| c.kind() == "variable_declaration")
                else {
                    return;
                };
                let type_name = self.type_of(declaration);
                for (name, _) in self.declarators(declaration) {
                    let mut field = MemberDef::new(name, kind).with_static(is_static);
                    field.return_type = type_name.clone();
                    def.members.push(field);
                }
            }
            "enum_member_declaration" => {
                if let Some(name) = self.name_of(member) {
                    def.members.push(MemberDef::new(name, MemberKind::EnumValue).with_static(true));
                }
            }
            _ => {}
        }
    }

    fn parameter_list_of(&self, member: Node) -> Vec<ParameterDef> {
        member
            .child_by_field_name("parameters")
            .or_else(|| {
                named_children(member)
                    .into_iter()
                    .find(|c| c.kind() == "parameter_list")
            })
            .map(|list| self.parameters(list))
            .unwrap_or_default()
    }

    fn parameters(&self, list: Node) -> Vec<ParameterDef> {
        named_children(list)
            .into_iter()
            .filter(|p| p.kind() == "parameter")
            .filter_map(|p| {
                let name = self.name_of(p)?;
                Some(ParameterDef {
                    name,
                    type_name: self.type_of(p).unwrap_or_default(),
                })
            })
            .collect()
    }

    fn record_parameters_as_locals(&mut self, member: Node, parameters: &[ParameterDef]) {
        let scope = member.byte_range();
        for param in parameters {
            self.outline.locals.push(LocalDecl {
                name: param.name.clone(),
                type_name: param.type_name.clone(),
                declared_at: scope.start,
                scope: scope.clone(),
            });
        }
    }

    /// `(name, initializer type)` for each declarator of a variable declaration
    fn declarators(&self, declaration: Node) -> Vec<(String, Option<String>)> {
        named_children(declaration)
            .into_iter()
            .filter(|c| c.kind() == "variable_declarator")
            .filter_map(|d| {
                let name = self.name_of(d)?;
                let created = find_descendant(d, "object_creation_expression")
                    .and_then(|creation| self.type_of(creation));
                Some((name, created))
            })
            .collect()
    }

    /// Collects local declarations below `node`; each is scoped to its
    /// innermost enclosing block, or to `fallback_scope`.
    fn collect_locals(&mut self, node: Node, fallback_scope: &Range<usize>) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if current.kind() == "local_declaration_statement" {
                if let Some(declaration) = named_children(current)
                    .into_iter()
                    .find(|c| c.kind() == "variable_declaration")
                {
                    let declared_type = self.type_of(declaration).unwrap_or_default();
                    let scope = enclosing_block(current)
                        .map(|b| b.byte_range())
                        .unwrap_or_else(|| fallback_scope.clone());
                    for (name, created) in self.declarators(declaration) {
                        let type_name = if declared_type == "var" {
                            created.unwrap_or_else(|| declared_type.clone())
                        } else {
                            declared_type.clone()
                        };
                        self.outline.locals.push(LocalDecl {
                            name,
                            type_name,
                            declared_at: current.start_byte(),
                            scope: scope.clone(),
                        });
                    }
                }
                continue;
            }
            if type_kind_of(current.kind()).is_some() && current.id() != node.id() {
                continue;
            }
            stack.extend(named_children(current));
        }
    }
}

fn enclosing_block(node: Node) -> Option<Node> {
    let mut parent = node.parent();
    while let Some(p) = parent {
        if p.kind() == "block" {
            return Some(p);
        }
        parent = p.parent();
    }
    None
}

fn find_descendant<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == kind {
            return Some(current);
        }
        stack.extend(named_children(current));
    }
    None
}

/// Namespace imported by a using directive; aliases are not imports
pub(crate) fn using_target(directive: &str) -> Option<String> {
    let rest = directive.trim();
    let rest = rest.strip_prefix("global").map(str::trim_start).unwrap_or(rest);
    let rest = rest.strip_prefix("using")?.trim_start();
    let rest = rest.strip_prefix("static ").unwrap_or(rest);
    let target = rest.trim().trim_end_matches(';').trim();
    if target.is_empty() || target.contains('=') {
        return None;
    }
    Some(target.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn parse(code: &str) -> SyntaxTree {
        TreeSitterCSharpParser::new()
            .parse(code, "test.cs")
            .expect("parser should produce a tree")
    }

    #[test]
    fn test_using_target() {
        assert_eq!(using_target("using System;"), Some("System".to_string()));
        assert_eq!(using_target("using static System.Math;"), Some("System.Math".to_string()));
        assert_eq!(using_target("global using System.Linq;"), Some("System.Linq".to_string()));
        assert_eq!(using_target("using IO = System.IO;"), None);
    }

    #[test]
    fn test_extracts_class_with_members() {
        let tree = parse(indoc! {r#"
            using System;
            namespace Demo
            {
                public class Greeter
                {
                    private int count;
                    public string Name { get; set; }
                    public Greeter(string name) { }
                    public static void Greet(string who, int times) { }
                }
            }
        "#});

        assert_eq!(tree.usings(), vec!["System".to_string()]);
        let types = tree.type_definitions();
        assert_eq!(types.len(), 1);
        let greeter = &types[0];
        assert_eq!(greeter.full_name(), "Demo.Greeter");
        assert_eq!(greeter.kind, TypeKind::Class);

        let names: Vec<&str> = greeter.members.iter().map(|m| m.name.as_str()).collect();
        assert!(names.contains(&"count"));
        assert!(names.contains(&"Name"));
        assert!(names.contains(&"Greet"));

        let greet = greeter.members_named("Greet").next().unwrap();
        assert!(greet.is_static);
        assert_eq!(greet.parameters.len(), 2);
        assert_eq!(greet.parameters[1].name, "times");
        assert_eq!(greeter.constructors().count(), 1);
    }

    #[test]
    fn test_extracts_enum_and_struct() {
        let tree = parse("enum Color { Red, Green } struct Point { public int X; }");
        let types = tree.type_definitions();
        let color = types.iter().find(|t| t.name == "Color").unwrap();
        assert_eq!(color.kind, TypeKind::Enum);
        assert_eq!(color.members.len(), 2);
        assert!(types.iter().any(|t| t.name == "Point" && t.kind == TypeKind::Struct));
    }

    #[test]
    fn test_locals_visible_after_declaration() {
        let code = indoc! {r#"
            class Runner
            {
                void Run(int limit)
                {
                    var builder = new StringBuilder();
                    string label = "x";
                    label.Trim();
                }
            }
        "#};
        let tree = parse(code);
        let caret = code.find("label.").unwrap() + "label.".len();
        let locals: Vec<(&str, &str)> = tree
            .locals_before(caret)
            .into_iter()
            .map(|l| (l.name.as_str(), l.type_name.as_str()))
            .collect();
        assert!(locals.contains(&("limit", "int")));
        assert!(locals.contains(&("builder", "StringBuilder")));
        assert!(locals.contains(&("label", "string")));
        assert_eq!(tree.enclosing_type(caret).unwrap().name, "Runner");
    }

    #[test]
    fn test_broken_source_still_yields_tree() {
        let tree = parse("class Broken { void M( { }");
        assert!(tree.has_errors());
        assert_eq!(tree.path(), "test.cs");
    }
}
