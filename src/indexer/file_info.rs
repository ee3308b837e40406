//! Source files discovered under an ingestion root

use std::path::PathBuf;

/// A file selected for ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the root, `/`-separated on every platform
    pub relative_path: String,
    pub size: u64,
}
