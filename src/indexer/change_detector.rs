//! Fingerprint-based detection of new, modified and deleted documents

use super::file_info::SourceFile;
use crate::types::{ChangeKind, Document};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Lowercase hex SHA-256 of raw bytes
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// A listed file with its fingerprint, or the reason it could not be read
#[derive(Debug, Clone)]
pub struct FileFingerprint {
    pub file: SourceFile,
    pub content_hash: Result<String, String>,
}

/// Hash every file in parallel
pub fn fingerprint_files(files: Vec<SourceFile>) -> Vec<FileFingerprint> {
    files
        .into_par_iter()
        .map(|file| {
            let content_hash = std::fs::read(&file.path)
                .map(|bytes| fingerprint(&bytes))
                .map_err(|e| e.to_string());
            FileFingerprint { file, content_hash }
        })
        .collect()
}

/// A document that has to be (re)built
#[derive(Debug, Clone)]
pub struct PendingDocument {
    /// Fresh record to persist, with a new id
    pub document: Document,
    pub kind: ChangeKind,
    pub path: PathBuf,
}

/// Difference between the files on disk and the persisted documents
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub new_or_modified: Vec<PendingDocument>,
    /// Persisted documents whose file no longer exists
    pub deleted: Vec<Document>,
    /// Files skipped because their fingerprint matched
    pub unchanged: usize,
    /// Files that exist but could not be read, with the error
    pub unreadable: Vec<(String, String)>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.new_or_modified.is_empty() && self.deleted.is_empty()
    }

    /// Documents the coordinator has to touch
    pub fn work_total(&self) -> usize {
        self.new_or_modified.len() + self.deleted.len()
    }
}

/// Compare the current listing with the persisted snapshot
///
/// Pure: nothing is read or written. An unreadable file is neither rebuilt
/// nor treated as deleted. A path held by more than one persisted document
/// is always reported as modified so it collapses back to one record.
pub fn detect_changes(current: Vec<FileFingerprint>, persisted: &[Document]) -> ChangeSet {
    let mut by_path: HashMap<&str, Vec<&Document>> = HashMap::new();
    for document in persisted {
        by_path
            .entry(document.relative_path.as_str())
            .or_default()
            .push(document);
    }

    let mut changes = ChangeSet::default();
    let mut seen: HashSet<String> = HashSet::with_capacity(current.len());

    for entry in current {
        let relative_path = entry.file.relative_path.clone();
        seen.insert(relative_path.clone());

        let content_hash = match entry.content_hash {
            Ok(hash) => hash,
            Err(reason) => {
                changes.unreadable.push((relative_path, reason));
                continue;
            }
        };

        let kind = match by_path.get(relative_path.as_str()) {
            None => ChangeKind::New,
            Some(existing) if existing.len() == 1 && existing[0].content_hash == content_hash => {
                tracing::debug!("Unchanged: {}", relative_path);
                changes.unchanged += 1;
                continue;
            }
            Some(existing) => {
                if existing.len() > 1 {
                    tracing::warn!(
                        "{} has {} document records, rebuilding",
                        relative_path,
                        existing.len()
                    );
                }
                ChangeKind::Modified
            }
        };

        changes.new_or_modified.push(PendingDocument {
            document: Document::new(relative_path, content_hash),
            kind,
            path: entry.file.path,
        });
    }

    changes.deleted = persisted
        .iter()
        .filter(|document| !seen.contains(&document.relative_path))
        .cloned()
        .collect();

    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listed(relative_path: &str, content: &[u8]) -> FileFingerprint {
        FileFingerprint {
            file: SourceFile {
                path: PathBuf::from("/repo").join(relative_path),
                relative_path: relative_path.to_string(),
                size: content.len() as u64,
            },
            content_hash: Ok(fingerprint(content)),
        }
    }

    fn persisted(relative_path: &str, content: &[u8]) -> Document {
        Document::new(relative_path, fingerprint(content))
    }

    #[test]
    fn test_fingerprint_is_lowercase_sha256_hex() {
        assert_eq!(
            fingerprint(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_fingerprint_sensitivity() {
        assert_eq!(fingerprint(b"class A {}"), fingerprint(b"class A {}"));
        assert_ne!(fingerprint(b"class A {}"), fingerprint(b"class B {}"));
    }

    #[test]
    fn test_new_file() {
        let changes = detect_changes(vec![listed("A.cs", b"a")], &[]);
        assert_eq!(changes.new_or_modified.len(), 1);
        assert_eq!(changes.new_or_modified[0].kind, ChangeKind::New);
        assert_eq!(changes.new_or_modified[0].document.relative_path, "A.cs");
        assert!(changes.deleted.is_empty());
    }

    #[test]
    fn test_unchanged_file_is_skipped() {
        let changes = detect_changes(vec![listed("A.cs", b"a")], &[persisted("A.cs", b"a")]);
        assert!(changes.is_empty());
        assert_eq!(changes.unchanged, 1);
    }

    #[test]
    fn test_modified_file_gets_fresh_id() {
        let old = persisted("A.cs", b"a");
        let changes = detect_changes(vec![listed("A.cs", b"b")], std::slice::from_ref(&old));
        assert_eq!(changes.new_or_modified.len(), 1);
        let pending = &changes.new_or_modified[0];
        assert_eq!(pending.kind, ChangeKind::Modified);
        assert_ne!(pending.document.id, old.id);
        assert_eq!(pending.document.content_hash, fingerprint(b"b"));
    }

    #[test]
    fn test_deleted_file() {
        let gone = persisted("Gone.cs", b"x");
        let changes = detect_changes(
            vec![listed("A.cs", b"a")],
            &[persisted("A.cs", b"a"), gone.clone()],
        );
        assert_eq!(changes.deleted, vec![gone]);
        assert_eq!(changes.work_total(), 1);
    }

    #[test]
    fn test_duplicate_records_force_rebuild() {
        let changes = detect_changes(
            vec![listed("A.cs", b"a")],
            &[persisted("A.cs", b"a"), persisted("A.cs", b"a")],
        );
        assert_eq!(changes.new_or_modified.len(), 1);
        assert_eq!(changes.new_or_modified[0].kind, ChangeKind::Modified);
        assert_eq!(changes.unchanged, 0);
    }

    #[test]
    fn test_unreadable_file_is_not_deleted() {
        let mut entry = listed("Locked.cs", b"");
        entry.content_hash = Err("permission denied".to_string());

        let changes = detect_changes(vec![entry], &[persisted("Locked.cs", b"old")]);
        assert!(changes.is_empty());
        assert_eq!(changes.unreadable.len(), 1);
        assert_eq!(changes.unreadable[0].0, "Locked.cs");
    }

    #[test]
    fn test_fingerprint_files_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A.cs");
        std::fs::write(&path, "class A {}").unwrap();

        let files = vec![
            SourceFile {
                path: path.clone(),
                relative_path: "A.cs".to_string(),
                size: 10,
            },
            SourceFile {
                path: dir.path().join("Missing.cs"),
                relative_path: "Missing.cs".to_string(),
                size: 0,
            },
        ];

        let fingerprints = fingerprint_files(files);
        assert_eq!(
            fingerprints[0].content_hash.as_deref(),
            Ok(fingerprint(b"class A {}").as_str())
        );
        assert!(fingerprints[1].content_hash.is_err());
    }
}
