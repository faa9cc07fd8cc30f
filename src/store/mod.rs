//! Storage abstraction for Doc Sync.
//!
//! The [`Store`] trait lists every persistence primitive the sync engine
//! consumes. Two backends ship with the crate: [`sqlite::SqliteStore`] for
//! the CLI and [`memory::InMemoryStore`] for tests and embedders.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Document, Record, RecordUpdate};

/// Abstract record store.
///
/// Every read returns fully materialized [`Record`]s (category, status,
/// authors and tags included). Every mutation is its own unit of work:
/// it either applies completely or not at all.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_schema`](Store::ensure_schema) | Create backing tables if missing (idempotent) |
/// | [`list_all`](Store::list_all) | Every record, in insertion order |
/// | [`list_by_status`](Store::list_by_status) | Records currently holding a status |
/// | [`list_by_category`](Store::list_by_category) | Records in a category |
/// | [`list_by_tag`](Store::list_by_tag) | Records carrying a tag |
/// | [`list_by_author`](Store::list_by_author) | Records by an author |
/// | [`get_by_title`](Store::get_by_title) | Match lookup by natural key |
/// | [`get_by_hash`](Store::get_by_hash) | Lookup by content hash |
/// | [`set_status`](Store::set_status) | Change only the status of a record |
/// | [`create`](Store::create) | Insert a record for a document |
/// | [`update`](Store::update) | Full overwrite of a record's mutable fields |
/// | [`delete`](Store::delete) | Remove a record and its author/tag links |
#[async_trait]
pub trait Store: Send + Sync {
    async fn ensure_schema(&self) -> Result<()>;

    async fn list_all(&self) -> Result<Vec<Record>>;

    async fn list_by_status(&self, status: &str) -> Result<Vec<Record>>;

    async fn list_by_category(&self, category: &str) -> Result<Vec<Record>>;

    async fn list_by_tag(&self, tag: &str) -> Result<Vec<Record>>;

    async fn list_by_author(&self, author: &str) -> Result<Vec<Record>>;

    /// First record (in insertion order) with exactly this title.
    async fn get_by_title(&self, title: &str) -> Result<Option<Record>>;

    async fn get_by_hash(&self, hash: &str) -> Result<Option<Record>>;

    /// Fails with [`SyncError::RecordNotFound`](crate::error::SyncError::RecordNotFound)
    /// for an unknown id.
    async fn set_status(&self, id: &str, status: &str) -> Result<()>;

    /// Insert a new record.
    ///
    /// Fails with [`SyncError::DuplicateContent`](crate::error::SyncError::DuplicateContent)
    /// when another record already holds the document's content hash.
    async fn create(&self, doc: &Document) -> Result<Record>;

    /// Overwrite title, content, summary, category, authors, tags, status
    /// and updated time; the content hash is recomputed.
    async fn update(&self, id: &str, update: &RecordUpdate) -> Result<Record>;

    /// Remove a record, returning it as it was. Never called by a sync pass;
    /// orphans are only deleted on request.
    ///
    /// Fails with [`SyncError::RecordNotFound`](crate::error::SyncError::RecordNotFound)
    /// for an unknown id.
    async fn delete(&self, id: &str) -> Result<Record>;
}
