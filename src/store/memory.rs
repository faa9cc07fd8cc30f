//! In-memory [`Store`] implementation for tests and embedders.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`; each operation holds
//! the lock for its whole duration, which makes every mutation atomic.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::error::SyncError;
use crate::models::{content_hash, Document, Record, RecordUpdate};

use super::Store;

/// In-memory store. Insertion order is preserved.
pub struct InMemoryStore {
    records: RwLock<Vec<Record>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Record>>> {
        self.records
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Record>>> {
        self.records
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn list_where(&self, keep: impl Fn(&Record) -> bool) -> Result<Vec<Record>> {
        Ok(self.read()?.iter().filter(|r| keep(r)).cloned().collect())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn duplicate_of(records: &[Record], hash: &str, except_id: Option<&str>) -> Option<String> {
    records
        .iter()
        .find(|r| r.hash == hash && Some(r.id.as_str()) != except_id)
        .map(|r| r.title.clone())
}

#[async_trait]
impl Store for InMemoryStore {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Record>> {
        Ok(self.read()?.clone())
    }

    async fn list_by_status(&self, status: &str) -> Result<Vec<Record>> {
        self.list_where(|r| r.status.as_deref() == Some(status))
    }

    async fn list_by_category(&self, category: &str) -> Result<Vec<Record>> {
        self.list_where(|r| r.category.as_deref() == Some(category))
    }

    async fn list_by_tag(&self, tag: &str) -> Result<Vec<Record>> {
        self.list_where(|r| r.tags.iter().any(|t| t == tag))
    }

    async fn list_by_author(&self, author: &str) -> Result<Vec<Record>> {
        self.list_where(|r| r.authors.iter().any(|a| a == author))
    }

    async fn get_by_title(&self, title: &str) -> Result<Option<Record>> {
        Ok(self.read()?.iter().find(|r| r.title == title).cloned())
    }

    async fn get_by_hash(&self, hash: &str) -> Result<Option<Record>> {
        Ok(self.read()?.iter().find(|r| r.hash == hash).cloned())
    }

    async fn set_status(&self, id: &str, status: &str) -> Result<()> {
        let mut records = self.write()?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| SyncError::RecordNotFound { id: id.to_string() })?;
        record.status = Some(status.to_string());
        Ok(())
    }

    async fn create(&self, doc: &Document) -> Result<Record> {
        let mut records = self.write()?;
        let hash = content_hash(&doc.content);
        if let Some(existing_title) = duplicate_of(&records, &hash, None) {
            return Err(SyncError::DuplicateContent {
                title: doc.title.clone(),
                existing_title,
                hash,
            }
            .into());
        }

        let record = Record {
            id: Uuid::new_v4().to_string(),
            title: doc.title.clone(),
            content: doc.content.clone(),
            summary: doc.summary.clone(),
            category: Some(doc.category.clone()),
            authors: doc.authors.clone(),
            tags: doc.tags.clone(),
            status: Some(doc.status.clone()),
            hash,
            created_time: doc.created_time,
            updated_time: doc.updated_time,
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, update: &RecordUpdate) -> Result<Record> {
        let mut records = self.write()?;
        let hash = content_hash(&update.content);
        if let Some(existing_title) = duplicate_of(&records, &hash, Some(id)) {
            return Err(SyncError::DuplicateContent {
                title: update.title.clone(),
                existing_title,
                hash,
            }
            .into());
        }

        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| SyncError::RecordNotFound { id: id.to_string() })?;
        record.title = update.title.clone();
        record.content = update.content.clone();
        record.summary = update.summary.clone();
        record.category = Some(update.category.clone());
        record.authors = update.authors.clone();
        record.tags = update.tags.clone();
        record.status = Some(update.status.clone());
        record.hash = hash;
        record.updated_time = update.updated_time;
        Ok(record.clone())
    }

    async fn delete(&self, id: &str) -> Result<Record> {
        let mut records = self.write()?;
        let index = records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| SyncError::RecordNotFound { id: id.to_string() })?;
        Ok(records.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(title: &str, content: &str) -> Document {
        let now = Utc::now();
        Document {
            title: title.to_string(),
            content: content.to_string(),
            summary: content.to_string(),
            category: "general".to_string(),
            authors: vec!["alice".to_string()],
            tags: vec!["t".to_string()],
            status: "published".to_string(),
            created_time: now,
            updated_time: now,
        }
    }

    #[tokio::test]
    async fn test_create_then_find_by_title() {
        let store = InMemoryStore::new();
        let d = doc("T", "body");
        store.create(&d).await.unwrap();
        let found = store.get_by_title("T").await.unwrap().unwrap();
        assert_eq!(found.hash, content_hash("body"));
        assert_eq!(found.category.as_deref(), Some("general"));
    }

    #[tokio::test]
    async fn test_duplicate_content_rejected() {
        let store = InMemoryStore::new();
        store.create(&doc("A", "same")).await.unwrap();
        let err = store.create(&doc("B", "same")).await.unwrap_err();
        match err.downcast_ref::<SyncError>() {
            Some(SyncError::DuplicateContent { existing_title, .. }) => {
                assert_eq!(existing_title, "A")
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_overwrites_and_rehashes() {
        let store = InMemoryStore::new();
        let created = store.create(&doc("A", "v1")).await.unwrap();
        let mut next = RecordUpdate::from(&doc("A", "v2"));
        next.tags = vec!["x".to_string(), "y".to_string()];
        let updated = store.update(&created.id, &next).await.unwrap();
        assert_eq!(updated.hash, content_hash("v2"));
        assert_eq!(updated.tags, vec!["x", "y"]);
        assert_eq!(updated.created_time, created.created_time);
    }

    #[tokio::test]
    async fn test_set_status_and_list_by_status() {
        let store = InMemoryStore::new();
        let a = store.create(&doc("A", "a")).await.unwrap();
        store.create(&doc("B", "b")).await.unwrap();
        store.set_status(&a.id, "lost_sync").await.unwrap();
        let lost = store.list_by_status("lost_sync").await.unwrap();
        assert_eq!(lost.len(), 1);
        assert_eq!(lost[0].title, "A");
    }

    #[tokio::test]
    async fn test_list_by_category_tag_author() {
        let store = InMemoryStore::new();
        let mut other = doc("B", "b");
        other.category = "ops".to_string();
        other.authors = vec!["bob".to_string()];
        other.tags = vec!["deploy".to_string(), "t".to_string()];
        store.create(&doc("A", "a")).await.unwrap();
        store.create(&other).await.unwrap();

        let ops = store.list_by_category("ops").await.unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].title, "B");
        assert_eq!(store.list_by_tag("t").await.unwrap().len(), 2);
        assert_eq!(store.list_by_tag("deploy").await.unwrap()[0].title, "B");
        assert_eq!(store.list_by_author("alice").await.unwrap()[0].title, "A");
        assert!(store.list_by_author("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let store = InMemoryStore::new();
        let a = store.create(&doc("A", "a")).await.unwrap();
        store.create(&doc("B", "b")).await.unwrap();

        let removed = store.delete(&a.id).await.unwrap();
        assert_eq!(removed.title, "A");
        assert!(store.get_by_title("A").await.unwrap().is_none());
        assert_eq!(store.list_all().await.unwrap().len(), 1);

        // The freed hash can be stored again.
        store.create(&doc("C", "a")).await.unwrap();

        let err = store.delete(&a.id).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::RecordNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_status_unknown_id() {
        let store = InMemoryStore::new();
        let err = store.set_status("missing", "draft").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::RecordNotFound { .. })
        ));
    }
}
