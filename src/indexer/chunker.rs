use super::declarations::{Declaration, DeclarationTree, SourceMember};
use uuid::Uuid;

/// A self-contained snippet before token bounding and embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateChunk {
    pub document_id: Uuid,
    pub namespace: String,
    pub type_name: String,
    pub method_name: Option<String>,
    pub text: String,
}

/// Builds one candidate chunk per declaration member
///
/// Every chunk repeats the file's using directives, the namespace and the
/// declaration signature around a single member so the snippet reads as
/// valid C# on its own. A declaration without members yields one chunk with
/// an empty body.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChunkBuilder;

impl ChunkBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, tree: &DeclarationTree, document_id: Uuid) -> Vec<CandidateChunk> {
        let mut chunks = Vec::new();

        for declaration in &tree.declarations {
            let members = declaration.members();

            if members.is_empty() {
                chunks.push(self.candidate(tree, declaration, document_id, None));
                continue;
            }

            for member in members {
                chunks.push(self.candidate(tree, declaration, document_id, Some(member)));
            }
        }

        chunks
    }

    fn candidate(
        &self,
        tree: &DeclarationTree,
        declaration: &Declaration,
        document_id: Uuid,
        member: Option<&dyn SourceMember>,
    ) -> CandidateChunk {
        CandidateChunk {
            document_id,
            namespace: tree.namespace_name().to_string(),
            type_name: declaration.name().to_string(),
            method_name: member.and_then(|m| m.name()).map(str::to_string),
            text: render(tree, declaration, member),
        }
    }
}

fn render(
    tree: &DeclarationTree,
    declaration: &Declaration,
    member: Option<&dyn SourceMember>,
) -> String {
    let mut lines: Vec<String> = Vec::new();

    if !tree.usings.is_empty() {
        lines.extend(tree.usings.iter().cloned());
        lines.push(String::new());
    }

    let depth = match &tree.namespace {
        Some(namespace) => {
            lines.push(format!("namespace {}", namespace));
            lines.push("{".to_string());
            1
        }
        None => 0,
    };

    let indent = "\t".repeat(depth);
    lines.push(format!("{}{}", indent, declaration.signature()));
    lines.push(format!("{}{{", indent));
    if let Some(member) = member {
        lines.extend(reindent(member.source_text(), member.start_column(), depth + 1));
    }
    lines.push(format!("{}}}", indent));

    if depth > 0 {
        lines.push("}".to_string());
    }

    lines.join("\n")
}

/// Dedent by the member's starting column and indent `depth` tabs
///
/// The first line of `text` starts at `start_column` already, so only the
/// following lines carry the original indentation. Blank lines stay empty.
fn reindent(text: &str, start_column: usize, depth: usize) -> Vec<String> {
    let indent = "\t".repeat(depth);

    text.lines()
        .enumerate()
        .map(|(i, line)| {
            let line = if i == 0 {
                line
            } else {
                strip_indent(line, start_column)
            };
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{}{}", indent, line.trim_end())
            }
        })
        .collect()
}

/// Remove up to `width` leading whitespace characters
fn strip_indent(line: &str, width: usize) -> &str {
    let mut cut = 0;
    for (count, (idx, ch)) in line.char_indices().enumerate() {
        if count >= width || !(ch == ' ' || ch == '\t') {
            return &line[idx..];
        }
        cut = idx + ch.len_utf8();
    }
    &line[cut..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::ast_parser::{CSharpDeclarationExtractor, DeclarationExtractor};

    fn build(source: &str) -> Vec<CandidateChunk> {
        let tree = CSharpDeclarationExtractor::new().extract(source).unwrap();
        ChunkBuilder::new().build(&tree, Uuid::nil())
    }

    #[test]
    fn test_class_with_three_members_and_empty_interface() {
        let source = r#"using System;

namespace Shop
{
    public class Cart : ICart
    {
        private int _count;

        public void Add()
        {
            _count++;
        }

        public int Count => _count;
    }

    public interface IAudit
    {
    }
}
"#;
        let chunks = build(source);
        assert_eq!(chunks.len(), 4);
        assert!(chunks[..3].iter().all(|c| c.type_name == "Cart"));
        assert_eq!(chunks[3].type_name, "IAudit");
        assert_eq!(chunks[3].method_name, None);
        assert!(chunks.iter().all(|c| c.namespace == "Shop"));
    }

    #[test]
    fn test_member_chunk_layout() {
        let source = r#"using System;
using System.Linq;

namespace Shop
{
    public class Cart : CartBase, ICart
    {
        public void Add(int n)
        {
            var x = n;

            Console.WriteLine(x);
        }
    }
}
"#;
        let chunks = build(source);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].method_name.as_deref(), Some("Add"));

        let expected = [
            "using System;",
            "using System.Linq;",
            "",
            "namespace Shop",
            "{",
            "\tpublic class Cart : CartBase, ICart",
            "\t{",
            "\t\tpublic void Add(int n)",
            "\t\t{",
            "\t\t    var x = n;",
            "",
            "\t\t    Console.WriteLine(x);",
            "\t\t}",
            "\t}",
            "}",
        ]
        .join("\n");
        assert_eq!(chunks[0].text, expected);
    }

    #[test]
    fn test_empty_declaration_shell() {
        let chunks = build("namespace A\n{\n    internal struct Unit { }\n}\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].text,
            "namespace A\n{\n\tinternal struct Unit\n\t{\n\t}\n}"
        );
    }

    #[test]
    fn test_no_namespace_omits_wrapper() {
        let chunks = build("class Program\n{\n    static void Main() { }\n}\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].namespace, "");
        assert_eq!(
            chunks[0].text,
            "class Program\n{\n\tstatic void Main() { }\n}"
        );
    }

    #[test]
    fn test_enum_members_each_get_a_chunk() {
        let chunks = build("namespace A\n{\n    public enum Level { Low, High = 5 }\n}\n");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].method_name.as_deref(), Some("Low"));
        assert!(chunks[1].text.contains("\t\tHigh = 5"));
        assert!(chunks[1].text.contains("\tpublic enum Level\n"));
    }

    #[test]
    fn test_doc_comment_travels_with_member() {
        let source = "class Math\n{\n    /// <summary>Sum</summary>\n    public int Add(int a, int b) => a + b;\n}\n";
        let chunks = build(source);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0]
            .text
            .contains("\t/// <summary>Sum</summary>\n\tpublic int Add(int a, int b) => a + b;"));
    }

    #[test]
    fn test_nested_type_yields_its_own_chunks() {
        let source = "class Outer\n{\n    class Inner\n    {\n        int x;\n    }\n}\n";
        let chunks = build(source);
        // Outer's only member is Inner; Inner's only member is x
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].type_name, "Outer");
        assert_eq!(chunks[0].method_name.as_deref(), Some("Inner"));
        assert_eq!(chunks[1].type_name, "Inner");
        assert_eq!(chunks[1].method_name.as_deref(), Some("x"));
    }

    #[test]
    fn test_strip_indent_stops_at_content() {
        assert_eq!(strip_indent("        body", 4), "    body");
        assert_eq!(strip_indent("  body", 4), "body");
        assert_eq!(strip_indent("\t\tbody", 1), "\tbody");
        assert_eq!(strip_indent("   ", 8), "");
    }
}
