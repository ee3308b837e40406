//! Declaration tree produced by the C# extractor
//!
//! Only the shape needed for chunking is kept: using directives, the file's
//! namespace, and each class/interface/struct/enum with its ordered members.

/// Everything the chunk builder needs from one source file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclarationTree {
    /// Using directives in source order, each exactly as written (`using System;`)
    pub usings: Vec<String>,
    /// First namespace found, block-scoped or file-scoped
    pub namespace: Option<String>,
    /// Type declarations in source order, nested types included
    pub declarations: Vec<Declaration>,
    /// The parser recovered from at least one syntax error
    pub has_syntax_errors: bool,
}

impl DeclarationTree {
    /// Namespace name, empty for the global namespace
    pub fn namespace_name(&self) -> &str {
        self.namespace.as_deref().unwrap_or("")
    }
}

/// A type declaration the chunker understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Class(TypeDeclaration),
    Interface(TypeDeclaration),
    Struct(TypeDeclaration),
    Enum(EnumDeclaration),
}

impl Declaration {
    /// C# keyword for this declaration kind
    pub fn keyword(&self) -> &'static str {
        match self {
            Declaration::Class(_) => "class",
            Declaration::Interface(_) => "interface",
            Declaration::Struct(_) => "struct",
            Declaration::Enum(_) => "enum",
        }
    }

    pub fn header(&self) -> &DeclarationHeader {
        match self {
            Declaration::Class(decl) | Declaration::Interface(decl) | Declaration::Struct(decl) => {
                &decl.header
            }
            Declaration::Enum(decl) => &decl.header,
        }
    }

    pub fn name(&self) -> &str {
        &self.header().name
    }

    /// Members in declaration order
    pub fn members(&self) -> Vec<&dyn SourceMember> {
        match self {
            Declaration::Class(decl) | Declaration::Interface(decl) | Declaration::Struct(decl) => {
                decl.members.iter().map(|m| m as &dyn SourceMember).collect()
            }
            Declaration::Enum(decl) => decl.members.iter().map(|m| m as &dyn SourceMember).collect(),
        }
    }

    /// Signature line: modifiers, keyword, name, type parameters and base list.
    ///
    /// `public sealed class Repository<T> : IRepository<T>, IDisposable`
    pub fn signature(&self) -> String {
        let header = self.header();
        let mut signature = String::new();
        for modifier in &header.modifiers {
            signature.push_str(modifier);
            signature.push(' ');
        }
        signature.push_str(self.keyword());
        signature.push(' ');
        signature.push_str(&header.name);
        if let Some(type_parameters) = &header.type_parameters {
            signature.push_str(type_parameters);
        }
        if !header.base_types.is_empty() {
            signature.push_str(" : ");
            signature.push_str(&header.base_types.join(", "));
        }
        signature
    }
}

/// Name and signature parts shared by every declaration kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclarationHeader {
    pub name: String,
    /// Modifier tokens in source order (`public`, `static`, `partial`, ...)
    pub modifiers: Vec<String>,
    /// Type parameter list including angle brackets, e.g. `<TKey, TValue>`
    pub type_parameters: Option<String>,
    /// Base class and implemented interfaces in declaration order
    pub base_types: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeDeclaration {
    pub header: DeclarationHeader,
    pub members: Vec<MemberDeclaration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumDeclaration {
    pub header: DeclarationHeader,
    pub members: Vec<EnumMember>,
}

/// A member of a class, interface or struct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDeclaration {
    /// Grammar node kind, e.g. `method_declaration`
    pub kind: String,
    pub name: Option<String>,
    /// Verbatim text including attached leading comments
    pub text: String,
    /// Column where `text` starts in the source file
    pub start_column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumMember {
    pub name: String,
    pub text: String,
    pub start_column: usize,
}

/// Uniform view of a member's identifier and verbatim source
pub trait SourceMember {
    fn name(&self) -> Option<&str>;
    fn source_text(&self) -> &str;
    fn start_column(&self) -> usize;
}

impl SourceMember for MemberDeclaration {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn source_text(&self) -> &str {
        &self.text
    }

    fn start_column(&self) -> usize {
        self.start_column
    }
}

impl SourceMember for EnumMember {
    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn source_text(&self) -> &str {
        &self.text
    }

    fn start_column(&self) -> usize {
        self.start_column
    }
}
