//! Source discovery, change detection and chunking
//!
//! Walks a C# source tree, fingerprints files to find what changed, parses
//! declarations and turns them into token-bounded, embedded chunks.

mod ast_parser;
mod change_detector;
mod chunker;
mod code_splitter;
mod declarations;
mod file_info;
mod file_walker;
mod splitter;

pub use ast_parser::{CSharpDeclarationExtractor, DeclarationExtractor};
pub use change_detector::{
    ChangeSet, FileFingerprint, PendingDocument, detect_changes, fingerprint, fingerprint_files,
};
pub use chunker::{CandidateChunk, ChunkBuilder};
pub use code_splitter::CodeSplitter;
pub use declarations::{
    Declaration, DeclarationHeader, DeclarationTree, EnumDeclaration, EnumMember,
    MemberDeclaration, SourceMember, TypeDeclaration,
};
pub use file_info::SourceFile;
pub use file_walker::{FileWalker, normalize_path};
pub use splitter::{LineWindows, RecursiveSplitter, Window};
