//! Core data models used throughout Doc Sync.
//!
//! A [`Document`] is what a source file says; a [`Record`] is what the store
//! holds. The sync engine compares the two and issues [`RecordUpdate`]s.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Default status for documents that do not declare one.
pub const STATUS_PUBLISHED: &str = "published";

/// In-store marker for records no file claimed during the current pass.
pub const STATUS_LOST_SYNC: &str = "lost_sync";

/// Category used when neither front matter nor the file name provides one.
pub const DEFAULT_CATEGORY: &str = "uncategorized";

/// Sentinel author list entry.
pub const UNKNOWN_AUTHOR: &str = "unknown-author";

/// Sentinel tag list entry.
pub const DEFAULT_TAG: &str = "uncategorized";

/// Maximum number of characters kept in a derived summary.
pub const SUMMARY_MAX_CHARS: usize = 200;

/// A normalized in-memory view of one source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub title: String,
    pub content: String,
    pub summary: String,
    pub category: String,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
    pub status: String,
    pub created_time: DateTime<Utc>,
    pub updated_time: DateTime<Utc>,
}

impl Document {
    pub fn content_hash(&self) -> String {
        content_hash(&self.content)
    }
}

/// The persisted counterpart of a [`Document`].
///
/// Every store read returns a fully materialized record, including its
/// category, status, authors and tags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: String,
    pub title: String,
    pub content: String,
    pub summary: String,
    pub category: Option<String>,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
    pub status: Option<String>,
    pub hash: String,
    pub created_time: DateTime<Utc>,
    pub updated_time: DateTime<Utc>,
}

impl Record {
    pub fn is_lost_sync(&self) -> bool {
        self.status.as_deref() == Some(STATUS_LOST_SYNC)
    }
}

/// Full overwrite of the mutable fields of a record.
///
/// These are exactly the fields the sync engine sets on an update; the
/// content hash is recomputed by the store from `content`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate {
    pub title: String,
    pub content: String,
    pub summary: String,
    pub category: String,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
    pub status: String,
    pub updated_time: DateTime<Utc>,
}

impl From<&Document> for RecordUpdate {
    fn from(doc: &Document) -> Self {
        Self {
            title: doc.title.clone(),
            content: doc.content.clone(),
            summary: doc.summary.clone(),
            category: doc.category.clone(),
            authors: doc.authors.clone(),
            tags: doc.tags.clone(),
            status: doc.status.clone(),
            updated_time: doc.updated_time,
        }
    }
}

/// The key used to match a document to an existing record across passes.
///
/// Content hashes are not a matching key: a renamed file with
/// unchanged content is reported as a duplicate, never guessed as a rename.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchKey {
    #[default]
    Title,
}

impl MatchKey {
    pub fn key_of<'a>(&self, doc: &'a Document) -> &'a str {
        match self {
            MatchKey::Title => &doc.title,
        }
    }
}

/// SHA-256 hex digest of document content (metadata is not included).
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Summary derived from content: the first 200 characters, with `...`
/// appended only when something was cut.
pub fn derive_summary(content: &str) -> String {
    match content.char_indices().nth(SUMMARY_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

/// Collapse an ordered list into the set used for equality checks.
pub fn as_set(items: &[String]) -> BTreeSet<&str> {
    items.iter().map(String::as_str).collect()
}

/// Outcome counters of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncStats {
    pub total_files: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub orphaned: usize,
    pub orphan_titles: Vec<String>,
    pub failures: Vec<FileFailure>,
    pub dry_run: bool,
}

/// A file that could not be reconciled, kept for the final report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileFailure {
    pub path: String,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Parse,
    DuplicateContent,
    Store,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::Parse => "parse",
            FailureKind::DuplicateContent => "duplicate-content",
            FailureKind::Store => "store",
        };
        f.write_str(s)
    }
}

/// Read-only classification of source files against store records,
/// linked by content hash.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusReport {
    /// File paths whose content hash is not held by any record.
    pub files_only_in_source: Vec<String>,
    /// Titles of records whose content hash matches no file.
    pub records_only_in_store: Vec<String>,
    /// File paths whose content hash is held by a record.
    pub in_both: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(content_hash("hello"), content_hash("hello"));
        assert_eq!(content_hash("hello").len(), 64);
    }

    #[test]
    fn test_hash_changes_with_one_char() {
        assert_ne!(content_hash("hello world"), content_hash("hello worle"));
    }

    #[test]
    fn test_summary_short_content_untouched() {
        assert_eq!(derive_summary("short body"), "short body");
    }

    #[test]
    fn test_summary_exactly_limit_not_truncated() {
        let body = "a".repeat(SUMMARY_MAX_CHARS);
        assert_eq!(derive_summary(&body), body);
    }

    #[test]
    fn test_summary_truncates_by_chars() {
        let body = "é".repeat(SUMMARY_MAX_CHARS + 5);
        let summary = derive_summary(&body);
        assert!(summary.ends_with("..."));
        assert_eq!(summary.chars().count(), SUMMARY_MAX_CHARS + 3);
    }

    #[test]
    fn test_as_set_ignores_order_and_duplicates() {
        let a = vec!["x".to_string(), "y".to_string(), "x".to_string()];
        let b = vec!["y".to_string(), "x".to_string()];
        assert_eq!(as_set(&a), as_set(&b));
    }
}
