//! Source file parsing.
//!
//! Turns the raw bytes of a source file into a normalized [`Document`].
//! Files that open with a `---` front matter block carry YAML metadata;
//! anything else (or front matter that cannot be read) falls back to the
//! legacy layout where the file name encodes `<category>_<title>`.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::models::{
    derive_summary, Document, DEFAULT_CATEGORY, DEFAULT_TAG, STATUS_LOST_SYNC, STATUS_PUBLISHED,
    UNKNOWN_AUTHOR,
};

const FRONT_MATTER_DELIMITER: &str = "---";

/// Formats accepted for `created_time` / `updated_time`, tried in order.
/// The flag marks formats that carry a time of day.
const TIMESTAMP_FORMATS: &[(&str, bool)] = &[
    ("%Y-%m-%dT%H:%M:%SZ", true),
    ("%Y-%m-%d %H:%M:%S", true),
    ("%Y-%m-%d", false),
    ("%Y/%m/%d %H:%M:%S", true),
    ("%Y/%m/%d", false),
];

/// Where a document came from: its path and the modification time used as
/// the fallback for missing timestamps.
#[derive(Debug, Clone)]
pub struct FileIdentity {
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
}

impl FileIdentity {
    pub fn new(path: impl Into<PathBuf>, modified: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            modified,
        }
    }

    /// Read the modification time of `path` from the filesystem.
    pub fn from_path(path: &Path) -> Result<Self> {
        let modified = std::fs::metadata(path)?
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Ok(Self::new(path, modified))
    }

    fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Read and parse a file from disk.
///
/// I/O errors are reported as [`SyncError::Parse`] so the caller can treat
/// an unreadable file like a malformed one.
pub fn parse_file(path: &Path) -> Result<Document> {
    let identity = FileIdentity::from_path(path)
        .map_err(|e| SyncError::parse(path, format!("cannot stat file: {e}")))?;
    let raw =
        std::fs::read(path).map_err(|e| SyncError::parse(path, format!("cannot read file: {e}")))?;
    parse_document(&raw, &identity)
}

/// Parse raw file bytes into a [`Document`].
pub fn parse_document(raw: &[u8], file: &FileIdentity) -> Result<Document> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| SyncError::parse(&file.path, format!("file is not valid UTF-8: {e}")))?;

    let Some((meta, body)) = split_front_matter(text) else {
        tracing::debug!(path = %file.path.display(), "no front matter, using legacy layout");
        return Ok(parse_legacy(text, file));
    };

    match serde_yaml::from_str::<Value>(meta) {
        Ok(Value::Mapping(map)) => {
            let doc = normalize(&map, body, file)
                .map_err(|message| SyncError::parse(&file.path, message))?;
            if doc.status == STATUS_LOST_SYNC {
                return Err(SyncError::ReservedStatus(doc.status).into());
            }
            Ok(doc)
        }
        Ok(_) => {
            tracing::debug!(path = %file.path.display(), "front matter is not a mapping, using legacy layout");
            Ok(parse_legacy(text, file))
        }
        Err(e) => {
            tracing::warn!(path = %file.path.display(), error = %e, "invalid YAML front matter, using legacy layout");
            Ok(parse_legacy(text, file))
        }
    }
}

/// Split `text` into (metadata block, body) when it opens with a front
/// matter delimiter and the split yields all three segments.
fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    if !text.starts_with(FRONT_MATTER_DELIMITER) {
        return None;
    }
    let mut parts = text.splitn(3, FRONT_MATTER_DELIMITER);
    let _leading = parts.next()?;
    let meta = parts.next()?;
    let body = parts.next()?;
    Some((meta.trim(), body.trim()))
}

/// Legacy layout: no usable front matter, metadata comes from the file name.
fn parse_legacy(content: &str, file: &FileIdentity) -> Document {
    let stem = file.stem();
    let (category, title) = match stem.split_once('_') {
        Some((category, title)) => (category.to_string(), title.to_string()),
        None => (DEFAULT_CATEGORY.to_string(), stem),
    };

    Document {
        title,
        content: content.to_string(),
        summary: derive_summary(content),
        category,
        authors: vec![UNKNOWN_AUTHOR.to_string()],
        tags: vec![DEFAULT_TAG.to_string()],
        status: STATUS_PUBLISHED.to_string(),
        created_time: file.modified,
        updated_time: file.modified,
    }
}

fn normalize(
    meta: &Mapping,
    body: &str,
    file: &FileIdentity,
) -> std::result::Result<Document, String> {
    let title = match optional_scalar(meta, "title")? {
        Some(title) => title,
        None => file.stem(),
    };

    let summary = match optional_scalar(meta, "summary")? {
        Some(summary) => summary,
        None => derive_summary(body),
    };

    let category = match get(meta, "categories").or_else(|| get(meta, "category")) {
        Some(Value::Sequence(items)) => match items.first() {
            Some(first) => {
                scalar_to_string(first).ok_or("categories must contain plain strings")?
            }
            None => DEFAULT_CATEGORY.to_string(),
        },
        Some(value) => scalar_to_string(value).ok_or("category must be a string")?,
        None => DEFAULT_CATEGORY.to_string(),
    };

    let status = optional_scalar(meta, "status")?.unwrap_or_else(|| STATUS_PUBLISHED.to_string());

    let created_time = optional_scalar(meta, "created_time")?
        .and_then(|s| parse_datetime(&s))
        .unwrap_or(file.modified);
    let updated_time = optional_scalar(meta, "updated_time")?
        .and_then(|s| parse_datetime(&s))
        .unwrap_or(file.modified);

    Ok(Document {
        title,
        content: body.to_string(),
        summary,
        category,
        authors: string_list(meta, "authors", UNKNOWN_AUTHOR)?,
        tags: string_list(meta, "tags", DEFAULT_TAG)?,
        status,
        created_time,
        updated_time,
    })
}

/// Look up `key`, treating an explicit `null` like a missing key.
fn get<'a>(meta: &'a Mapping, key: &str) -> Option<&'a Value> {
    meta.get(key).filter(|v| !v.is_null())
}

fn optional_scalar(meta: &Mapping, key: &str) -> std::result::Result<Option<String>, String> {
    match get(meta, key) {
        Some(value) => scalar_to_string(value)
            .map(Some)
            .ok_or_else(|| format!("'{key}' must be a scalar value")),
        None => Ok(None),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        _ => None,
    }
}

/// A string or list of strings. Absent, null and empty lists all become the
/// single-element sentinel list, so the result is never empty.
fn string_list(
    meta: &Mapping,
    key: &str,
    sentinel: &str,
) -> std::result::Result<Vec<String>, String> {
    let items = match get(meta, key) {
        None => Vec::new(),
        Some(Value::Sequence(seq)) => seq
            .iter()
            .map(|v| {
                scalar_to_string(v).ok_or_else(|| format!("'{key}' entries must be strings"))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?,
        Some(value) => vec![scalar_to_string(value)
            .ok_or_else(|| format!("'{key}' must be a string or a list of strings"))?],
    };

    if items.is_empty() {
        Ok(vec![sentinel.to_string()])
    } else {
        Ok(items)
    }
}

/// Parse a timestamp, first matching format wins, RFC 3339 last.
/// Naive values are taken as UTC.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    for &(format, has_time) in TIMESTAMP_FORMATS {
        let parsed = if has_time {
            NaiveDateTime::parse_from_str(raw, format).ok()
        } else {
            NaiveDate::parse_from_str(raw, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        };
        if let Some(naive) = parsed {
            return Some(naive.and_utc());
        }
    }

    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn identity(name: &str) -> FileIdentity {
        FileIdentity::new(
            format!("blog/{name}"),
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        )
    }

    fn parse(name: &str, text: &str) -> Document {
        parse_document(text.as_bytes(), &identity(name)).unwrap()
    }

    #[test]
    fn test_legacy_with_category_prefix() {
        let doc = parse("tutorials_intro.md", "Just a body.");
        assert_eq!(doc.category, "tutorials");
        assert_eq!(doc.title, "intro");
        assert_eq!(doc.authors, vec!["unknown-author"]);
        assert_eq!(doc.tags, vec!["uncategorized"]);
        assert_eq!(doc.status, "published");
        assert_eq!(doc.content, "Just a body.");
        assert_eq!(doc.created_time, identity("x").modified);
        assert_eq!(doc.updated_time, identity("x").modified);
    }

    #[test]
    fn test_legacy_splits_on_first_underscore_only() {
        let doc = parse("notes_rust_tips.md", "body");
        assert_eq!(doc.category, "notes");
        assert_eq!(doc.title, "rust_tips");
    }

    #[test]
    fn test_legacy_without_underscore() {
        let doc = parse("readme.md", "body");
        assert_eq!(doc.category, "uncategorized");
        assert_eq!(doc.title, "readme");
    }

    #[test]
    fn test_front_matter_full() {
        let text = "---\ntitle: Hello\ncategories: rust\nauthors:\n  - alice\n  - bob\ntags: intro\nstatus: draft\nsummary: Short\ncreated_time: 2023-01-02 03:04:05\nupdated_time: 2023/02/03\n---\n\n# Body\n";
        let doc = parse("whatever.md", text);
        assert_eq!(doc.title, "Hello");
        assert_eq!(doc.category, "rust");
        assert_eq!(doc.authors, vec!["alice", "bob"]);
        assert_eq!(doc.tags, vec!["intro"]);
        assert_eq!(doc.status, "draft");
        assert_eq!(doc.summary, "Short");
        assert_eq!(doc.content, "# Body");
        assert_eq!(
            doc.created_time,
            Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap()
        );
        assert_eq!(
            doc.updated_time,
            Utc.with_ymd_and_hms(2023, 2, 3, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_front_matter_defaults() {
        let text = "---\nsummary: null\n---\nbody text";
        let doc = parse("my-post.md", text);
        assert_eq!(doc.title, "my-post");
        assert_eq!(doc.category, "uncategorized");
        assert_eq!(doc.authors, vec!["unknown-author"]);
        assert_eq!(doc.tags, vec!["uncategorized"]);
        assert_eq!(doc.status, "published");
        assert_eq!(doc.summary, "body text");
        assert_eq!(doc.created_time, identity("x").modified);
    }

    #[test]
    fn test_category_key_alias() {
        let doc = parse("a.md", "---\ncategory: ops\n---\nbody");
        assert_eq!(doc.category, "ops");
        let doc = parse("a.md", "---\ncategory: ops\ncategories: dev\n---\nbody");
        assert_eq!(doc.category, "dev");
    }

    #[test]
    fn test_empty_author_list_becomes_sentinel() {
        let doc = parse("a.md", "---\ntitle: A\nauthors: []\ntags: null\n---\nbody");
        assert_eq!(doc.authors, vec!["unknown-author"]);
        assert_eq!(doc.tags, vec!["uncategorized"]);
    }

    #[test]
    fn test_mapping_authors_is_parse_failure() {
        let text = "---\ntitle: A\nauthors:\n  name: alice\n---\nbody";
        let err = parse_document(text.as_bytes(), &identity("a.md")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::Parse { .. })
        ));
    }

    #[test]
    fn test_lost_sync_status_rejected() {
        let text = "---\ntitle: A\nstatus: lost_sync\n---\nbody";
        let err = parse_document(text.as_bytes(), &identity("a.md")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::ReservedStatus(status)) if status == "lost_sync"
        ));
    }

    #[test]
    fn test_invalid_yaml_falls_back_to_legacy() {
        let text = "---\ntitle: [unclosed\n---\nbody";
        let doc = parse("guides_setup.md", text);
        assert_eq!(doc.title, "setup");
        assert_eq!(doc.category, "guides");
        assert_eq!(doc.content, text);
    }

    #[test]
    fn test_missing_closing_delimiter_falls_back() {
        let text = "---\ntitle: Hello\nno closing line";
        let doc = parse("misc_note.md", text);
        assert_eq!(doc.title, "note");
        assert_eq!(doc.content, text);
    }

    #[test]
    fn test_non_mapping_front_matter_falls_back() {
        let doc = parse("misc_list.md", "---\n- a\n- b\n---\nbody");
        assert_eq!(doc.title, "list");
    }

    #[test]
    fn test_unparsable_time_uses_mtime() {
        let doc = parse("a.md", "---\ncreated_time: yesterday\n---\nbody");
        assert_eq!(doc.created_time, identity("x").modified);
    }

    #[test]
    fn test_invalid_utf8_is_parse_failure() {
        let err = parse_document(&[0xff, 0xfe, 0x00], &identity("a.md")).unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn test_parse_datetime_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 9, 10, 11, 12).unwrap();
        assert_eq!(parse_datetime("2024-03-09T10:11:12Z"), Some(expected));
        assert_eq!(parse_datetime("2024-03-09 10:11:12"), Some(expected));
        assert_eq!(parse_datetime("2024/03/09 10:11:12"), Some(expected));
        assert_eq!(
            parse_datetime("2024-03-09T12:11:12+02:00"),
            Some(expected)
        );
        let midnight = Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap();
        assert_eq!(parse_datetime("2024-03-09"), Some(midnight));
        assert_eq!(parse_datetime("2024/03/09"), Some(midnight));
        assert_eq!(parse_datetime("03/09/2024"), None);
    }
}
