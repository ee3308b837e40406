use super::declarations::{
    Declaration, DeclarationHeader, DeclarationTree, EnumDeclaration, EnumMember,
    MemberDeclaration, TypeDeclaration,
};
use crate::error::ChunkingError;
use tree_sitter::{Node, Parser};

/// Turns source text into a [`DeclarationTree`]
pub trait DeclarationExtractor: Send + Sync {
    fn extract(&self, source: &str) -> Result<DeclarationTree, ChunkingError>;
}

/// Declaration extractor backed by the tree-sitter C# grammar
///
/// Syntax errors do not fail extraction: tree-sitter recovers and whatever
/// declarations it could still recognise are returned, with
/// `has_syntax_errors` set.
#[derive(Debug, Default, Clone, Copy)]
pub struct CSharpDeclarationExtractor;

impl CSharpDeclarationExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl DeclarationExtractor for CSharpDeclarationExtractor {
    fn extract(&self, source: &str) -> Result<DeclarationTree, ChunkingError> {
        // A parser holds mutable state, so each call gets its own
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_c_sharp::LANGUAGE.into())
            .map_err(|e| ChunkingError::ParseFailed(format!("Failed to set parser language: {}", e)))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| ChunkingError::ParseFailed("parser returned no tree".to_string()))?;

        let root = tree.root_node();
        let bytes = source.as_bytes();

        let namespace_node = find_namespace(root);
        let mut usings = collect_usings(root, bytes);
        if let Some(ns) = namespace_node {
            let scope = ns.child_by_field_name("body").unwrap_or(ns);
            usings.extend(collect_usings(scope, bytes));
        }

        let mut declarations = Vec::new();
        collect_declarations(root, bytes, &mut declarations);

        Ok(DeclarationTree {
            usings,
            namespace: namespace_node
                .and_then(|ns| ns.child_by_field_name("name"))
                .map(|name| node_text(name, bytes)),
            declarations,
            has_syntax_errors: root.has_error(),
        })
    }
}

fn node_text(node: Node, source: &[u8]) -> String {
    node.utf8_text(source).unwrap_or("").to_string()
}

/// First namespace in document order, block-scoped or file-scoped
fn find_namespace(node: Node) -> Option<Node> {
    if matches!(
        node.kind(),
        "namespace_declaration" | "file_scoped_namespace_declaration"
    ) {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if let Some(found) = find_namespace(child) {
            return Some(found);
        }
    }
    None
}

/// Using directives that are direct children of `node`
fn collect_usings(node: Node, source: &[u8]) -> Vec<String> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() == "using_directive")
        .map(|child| node_text(child, source).trim().to_string())
        .collect()
}

/// Preorder walk so outer types come before the types nested in them
fn collect_declarations(node: Node, source: &[u8], result: &mut Vec<Declaration>) {
    match node.kind() {
        "class_declaration" => result.push(Declaration::Class(type_declaration(node, source))),
        "interface_declaration" => {
            result.push(Declaration::Interface(type_declaration(node, source)))
        }
        "struct_declaration" => result.push(Declaration::Struct(type_declaration(node, source))),
        "enum_declaration" => result.push(Declaration::Enum(enum_declaration(node, source))),
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_declarations(child, source, result);
    }
}

fn declaration_header(node: Node, source: &[u8]) -> DeclarationHeader {
    let mut header = DeclarationHeader {
        name: node
            .child_by_field_name("name")
            .map(|n| node_text(n, source))
            .unwrap_or_default(),
        ..Default::default()
    };

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "modifier" => header.modifiers.push(node_text(child, source)),
            "type_parameter_list" => header.type_parameters = Some(node_text(child, source)),
            "base_list" => header.base_types = base_types(child, source),
            _ => {}
        }
    }

    header
}

fn base_types(base_list: Node, source: &[u8]) -> Vec<String> {
    let mut cursor = base_list.walk();
    base_list
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "argument_list" && child.kind() != "comment")
        .map(|child| {
            let text = node_text(child, source);
            // Primary constructor base calls carry their argument list
            match text.find('(') {
                Some(pos) => text[..pos].trim().to_string(),
                None => text.trim().to_string(),
            }
        })
        .filter(|text| !text.is_empty())
        .collect()
}

fn body_node(node: Node) -> Option<Node> {
    node.child_by_field_name("body").or_else(|| {
        let mut cursor = node.walk();
        node.named_children(&mut cursor).find(|child| {
            matches!(
                child.kind(),
                "declaration_list" | "enum_member_declaration_list"
            )
        })
    })
}

fn type_declaration(node: Node, source: &[u8]) -> TypeDeclaration {
    let header = declaration_header(node, source);
    let mut members = Vec::new();

    if let Some(body) = body_node(node) {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            if !child.kind().ends_with("_declaration") {
                continue;
            }
            let first = leading_comment_start(child);
            members.push(MemberDeclaration {
                kind: child.kind().to_string(),
                name: member_name(child, source),
                text: span_text(first, child, source),
                start_column: first.start_position().column,
            });
        }
    }

    TypeDeclaration { header, members }
}

fn enum_declaration(node: Node, source: &[u8]) -> EnumDeclaration {
    let header = declaration_header(node, source);
    let mut members = Vec::new();

    if let Some(body) = body_node(node) {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            if child.kind() != "enum_member_declaration" {
                continue;
            }
            let first = leading_comment_start(child);
            members.push(EnumMember {
                name: member_name(child, source).unwrap_or_default(),
                text: span_text(first, child, source),
                start_column: first.start_position().column,
            });
        }
    }

    EnumDeclaration { header, members }
}

/// Text from the start of `first` to the end of `last`
fn span_text(first: Node, last: Node, source: &[u8]) -> String {
    let bytes = &source[first.start_byte()..last.end_byte()];
    String::from_utf8_lossy(bytes).into_owned()
}

/// Earliest comment in the run of comments directly above `member`
///
/// A blank line ends the run, and so does a comment that trails the
/// previous member on the same line.
fn leading_comment_start(member: Node) -> Node {
    let mut first = member;
    let mut prev = member.prev_sibling();

    while let Some(sibling) = prev {
        if sibling.kind() != "comment" {
            break;
        }
        if sibling.end_position().row + 1 < first.start_position().row {
            break;
        }
        if let Some(before) = sibling.prev_sibling()
            && before.kind() != "comment"
            && before.end_position().row == sibling.start_position().row
        {
            break;
        }
        first = sibling;
        prev = sibling.prev_sibling();
    }

    first
}

fn member_name(node: Node, source: &[u8]) -> Option<String> {
    if let Some(name) = node.child_by_field_name("name") {
        return Some(node_text(name, source));
    }

    // Fields and events name their variables inside a variable_declaration
    let mut cursor = node.walk();
    let declaration = node
        .named_children(&mut cursor)
        .find(|child| child.kind() == "variable_declaration")?;

    let mut cursor = declaration.walk();
    let declarator = declaration
        .named_children(&mut cursor)
        .find(|child| child.kind() == "variable_declarator")?;

    if let Some(name) = declarator.child_by_field_name("name") {
        return Some(node_text(name, source));
    }
    let mut cursor = declarator.walk();
    declarator
        .named_children(&mut cursor)
        .find(|child| child.kind() == "identifier")
        .map(|ident| node_text(ident, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> DeclarationTree {
        CSharpDeclarationExtractor::new().extract(source).unwrap()
    }

    #[test]
    fn test_usings_and_block_namespace() {
        let source = r#"using System;
using System.Collections.Generic;

namespace Acme.Billing
{
    public class Invoice
    {
        public int Id { get; set; }
    }
}
"#;
        let tree = extract(source);
        assert_eq!(
            tree.usings,
            vec!["using System;", "using System.Collections.Generic;"]
        );
        assert_eq!(tree.namespace.as_deref(), Some("Acme.Billing"));
        assert_eq!(tree.declarations.len(), 1);
        assert!(!tree.has_syntax_errors);
    }

    #[test]
    fn test_file_scoped_namespace() {
        let source = r#"namespace Acme.Core;

public interface IClock
{
    DateTime Now { get; }
}
"#;
        let tree = extract(source);
        assert_eq!(tree.namespace.as_deref(), Some("Acme.Core"));
        assert_eq!(tree.declarations.len(), 1);
        assert_eq!(tree.declarations[0].keyword(), "interface");
        assert_eq!(tree.declarations[0].members().len(), 1);
    }

    #[test]
    fn test_global_namespace() {
        let tree = extract("class Program { static void Main() { } }");
        assert!(tree.namespace.is_none());
        assert_eq!(tree.namespace_name(), "");
        assert_eq!(tree.declarations.len(), 1);
    }

    #[test]
    fn test_class_header_and_members() {
        let source = r#"namespace Shop
{
    public sealed class OrderService : ServiceBase, IOrderService
    {
        private readonly ILogger _logger;

        public OrderService(ILogger logger)
        {
            _logger = logger;
        }

        public void Place(Order order)
        {
            _logger.Info("placed");
        }
    }
}
"#;
        let tree = extract(source);
        let decl = &tree.declarations[0];
        assert_eq!(decl.keyword(), "class");
        assert_eq!(decl.name(), "OrderService");
        assert_eq!(decl.header().modifiers, vec!["public", "sealed"]);
        assert_eq!(decl.header().base_types, vec!["ServiceBase", "IOrderService"]);
        assert_eq!(
            decl.signature(),
            "public sealed class OrderService : ServiceBase, IOrderService"
        );

        let members = decl.members();
        assert_eq!(members.len(), 3);
        assert_eq!(members[0].name(), Some("_logger"));
        assert_eq!(members[1].name(), Some("OrderService"));
        assert_eq!(members[2].name(), Some("Place"));
        assert!(members[2].source_text().starts_with("public void Place"));
        assert!(members[2].source_text().trim_end().ends_with('}'));
        assert_eq!(members[2].start_column(), 8);
    }

    #[test]
    fn test_generic_type_parameters() {
        let tree = extract("public class Repository<T> : IRepository<T> where T : class { }");
        let decl = &tree.declarations[0];
        assert_eq!(decl.header().type_parameters.as_deref(), Some("<T>"));
        assert_eq!(decl.header().base_types, vec!["IRepository<T>"]);
        assert_eq!(decl.signature(), "public class Repository<T> : IRepository<T>");
    }

    #[test]
    fn test_doc_comments_attach_to_member() {
        let source = r#"class Calculator
{
    /// <summary>Adds two numbers.</summary>
    /// <param name="a">left</param>
    public int Add(int a, int b) => a + b;

    // detached comment

    public int Sub(int a, int b) => a - b;
}
"#;
        let tree = extract(source);
        let members = tree.declarations[0].members();
        assert_eq!(members.len(), 2);
        assert!(members[0].source_text().starts_with("/// <summary>Adds two numbers."));
        assert!(members[0].source_text().contains("public int Add"));
        assert!(members[1].source_text().starts_with("public int Sub"));
    }

    #[test]
    fn test_enum_members() {
        let source = r#"public enum Color : byte
{
    Red = 1,
    Green,
    Blue
}
"#;
        let tree = extract(source);
        let decl = &tree.declarations[0];
        assert_eq!(decl.keyword(), "enum");
        assert_eq!(decl.signature(), "public enum Color : byte");
        let members = decl.members();
        let names: Vec<_> = members.iter().filter_map(|m| m.name()).collect();
        assert_eq!(names, vec!["Red", "Green", "Blue"]);
        assert_eq!(members[0].source_text(), "Red = 1");
    }

    #[test]
    fn test_nested_types_are_declarations() {
        let source = r#"public class Outer
{
    public int Value;

    public struct Inner
    {
        public int X;
    }
}
"#;
        let tree = extract(source);
        assert_eq!(tree.declarations.len(), 2);
        assert_eq!(tree.declarations[0].name(), "Outer");
        assert_eq!(tree.declarations[1].name(), "Inner");
        // The nested struct is also a member of the outer class
        assert_eq!(tree.declarations[0].members().len(), 2);
    }

    #[test]
    fn test_empty_interface_has_no_members() {
        let tree = extract("public interface IMarker { }");
        assert_eq!(tree.declarations.len(), 1);
        assert!(tree.declarations[0].members().is_empty());
    }

    #[test]
    fn test_syntax_errors_are_flagged_not_fatal() {
        let source = r#"public class Fine
{
    public void Ok() { }
}
}}
"#;
        let tree = extract(source);
        assert!(tree.has_syntax_errors);
        assert!(!tree.declarations.is_empty());
    }

    #[test]
    fn test_records_are_not_declarations() {
        let tree = extract("public record Person(string Name);");
        assert!(tree.declarations.is_empty());
    }
}
