//! Change detection between a parsed [`Document`] and its stored [`Record`].

use crate::models::{as_set, content_hash, Document, Record};

/// The first field found to differ, in comparison order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    Content,
    Summary,
    Category,
    Authors,
    Tags,
    Status,
}

impl std::fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeReason::Content => "content",
            ChangeReason::Summary => "summary",
            ChangeReason::Category => "category",
            ChangeReason::Authors => "authors",
            ChangeReason::Tags => "tags",
            ChangeReason::Status => "status",
        };
        f.write_str(s)
    }
}

/// Compare `record` against `doc`, stopping at the first difference.
///
/// Authors and tags are compared as sets. A record missing its category
/// or status never matches, so it is treated as changed.
pub fn diff(record: &Record, doc: &Document) -> Option<ChangeReason> {
    if record.hash != content_hash(&doc.content) {
        return Some(ChangeReason::Content);
    }
    if record.summary != doc.summary {
        return Some(ChangeReason::Summary);
    }
    if record.category.as_deref() != Some(doc.category.as_str()) {
        return Some(ChangeReason::Category);
    }
    if as_set(&record.authors) != as_set(&doc.authors) {
        return Some(ChangeReason::Authors);
    }
    if as_set(&record.tags) != as_set(&doc.tags) {
        return Some(ChangeReason::Tags);
    }
    if record.status.as_deref() != Some(doc.status.as_str()) {
        return Some(ChangeReason::Status);
    }
    None
}

pub fn needs_update(record: &Record, doc: &Document) -> bool {
    diff(record, doc).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc() -> Document {
        let now = Utc::now();
        Document {
            title: "T".to_string(),
            content: "body".to_string(),
            summary: "body".to_string(),
            category: "rust".to_string(),
            authors: vec!["alice".to_string(), "bob".to_string()],
            tags: vec!["a".to_string(), "b".to_string()],
            status: "published".to_string(),
            created_time: now,
            updated_time: now,
        }
    }

    fn record_for(doc: &Document) -> Record {
        Record {
            id: "r1".to_string(),
            title: doc.title.clone(),
            content: doc.content.clone(),
            summary: doc.summary.clone(),
            category: Some(doc.category.clone()),
            authors: doc.authors.clone(),
            tags: doc.tags.clone(),
            status: Some(doc.status.clone()),
            hash: content_hash(&doc.content),
            created_time: doc.created_time,
            updated_time: doc.updated_time,
        }
    }

    #[test]
    fn test_identical_is_unchanged() {
        let d = doc();
        assert!(!needs_update(&record_for(&d), &d));
    }

    #[test]
    fn test_reordered_authors_and_tags_unchanged() {
        let d = doc();
        let mut r = record_for(&d);
        r.authors.reverse();
        r.tags = vec!["b".to_string(), "a".to_string(), "a".to_string()];
        assert_eq!(diff(&r, &d), None);
    }

    #[test]
    fn test_content_checked_first() {
        let d = doc();
        let mut r = record_for(&d);
        r.hash = content_hash("other");
        r.summary = "other".to_string();
        assert_eq!(diff(&r, &d), Some(ChangeReason::Content));
    }

    #[test]
    fn test_each_field_detected() {
        let d = doc();

        let mut r = record_for(&d);
        r.summary = "changed".to_string();
        assert_eq!(diff(&r, &d), Some(ChangeReason::Summary));

        let mut r = record_for(&d);
        r.category = None;
        assert_eq!(diff(&r, &d), Some(ChangeReason::Category));

        let mut r = record_for(&d);
        r.authors.pop();
        assert_eq!(diff(&r, &d), Some(ChangeReason::Authors));

        let mut r = record_for(&d);
        r.tags.push("c".to_string());
        assert_eq!(diff(&r, &d), Some(ChangeReason::Tags));

        let mut r = record_for(&d);
        r.status = Some("lost_sync".to_string());
        assert_eq!(diff(&r, &d), Some(ChangeReason::Status));
    }

    #[test]
    fn test_timestamps_ignored() {
        let d = doc();
        let mut r = record_for(&d);
        r.updated_time = d.updated_time + chrono::Duration::days(3);
        assert!(!needs_update(&r, &d));
    }
}
