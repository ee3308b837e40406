//! File walking functionality for directory traversal

use super::file_info::SourceFile;
use crate::config::SourceConfig;
use crate::error::{IndexingError, ValidationError};
use anyhow::{Context, Result};
use globset::{Glob, GlobMatcher};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct FileWalker {
    pub(crate) root: PathBuf,
    pub(crate) max_file_size: usize,
    pub(crate) include: GlobMatcher,
    pub(crate) exclude_fragments: Vec<String>,
    /// Optional cancellation token checked between entries
    cancel_token: Option<CancellationToken>,
}

/// Normalise platform separators to `/`
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

impl FileWalker {
    pub fn new(
        root: impl AsRef<Path>,
        max_file_size: usize,
        include_pattern: &str,
    ) -> Result<Self, ValidationError> {
        let include = Glob::new(include_pattern)
            .map_err(|e| ValidationError::InvalidPattern(format!("{}: {}", include_pattern, e)))?
            .compile_matcher();

        Ok(Self {
            root: root.as_ref().to_path_buf(),
            max_file_size,
            include,
            exclude_fragments: vec![],
            cancel_token: None,
        })
    }

    pub fn from_config(root: impl AsRef<Path>, config: &SourceConfig) -> Result<Self, ValidationError> {
        Ok(Self::new(root, config.max_file_size, &config.include_pattern)?
            .with_exclusions(config.exclude_fragments.clone()))
    }

    /// Path substrings that exclude a file, matched against its full path
    pub fn with_exclusions(mut self, exclude_fragments: Vec<String>) -> Self {
        self.exclude_fragments = exclude_fragments;
        self
    }

    pub fn with_cancellation(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = Some(cancel_token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_token
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the directory and collect all eligible files, sorted by relative path
    pub fn walk(&self) -> Result<Vec<SourceFile>> {
        if !self.root.exists() {
            return Err(IndexingError::DirectoryNotFound(self.root.display().to_string()).into());
        }
        if !self.root.is_dir() {
            return Err(IndexingError::NotADirectory(self.root.display().to_string()).into());
        }

        let mut files = Vec::new();

        let walker = WalkBuilder::new(&self.root)
            .standard_filters(true) // Respect .gitignore, .ignore, etc.
            .hidden(false)
            .git_ignore(true)
            .git_exclude(true)
            .git_global(true)
            .require_git(false)
            .build();

        for entry in walker {
            if self.is_cancelled() {
                tracing::info!("File walk cancelled after {} files", files.len());
                return Err(IndexingError::Cancelled.into());
            }

            let entry = entry
                .map_err(|e| IndexingError::WalkFailed(e.to_string()))
                .context("Failed to read directory entry")?;
            let path = entry.path();

            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            if path.components().any(|c| c.as_os_str() == ".git") {
                tracing::debug!("Skipping .git directory file: {:?}", path);
                continue;
            }

            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let relative_path = normalize_path(relative);

            if !self.matches_patterns(path, &relative_path) {
                continue;
            }

            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    tracing::warn!("Skipping file without metadata {:?}: {}", path, e);
                    continue;
                }
            };
            if size > self.max_file_size as u64 {
                tracing::debug!("Skipping large file: {:?}", path);
                continue;
            }

            files.push(SourceFile {
                path: path.to_path_buf(),
                relative_path,
                size,
            });
        }

        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        tracing::info!("Found {} source files under {}", files.len(), self.root.display());
        Ok(files)
    }

    /// Include glob on the relative path, exclusions on the full path
    pub(crate) fn matches_patterns(&self, path: &Path, relative_path: &str) -> bool {
        if !self.include.is_match(relative_path) {
            return false;
        }

        let full_path = normalize_path(path);
        if let Some(fragment) = self
            .exclude_fragments
            .iter()
            .find(|fragment| full_path.contains(fragment.as_str()))
        {
            tracing::debug!("Excluding {} (matches '{}')", relative_path, fragment);
            return false;
        }

        true
    }
}
