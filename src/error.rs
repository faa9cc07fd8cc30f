//! Typed errors the sync engine needs to tell apart.
//!
//! Most functions in this crate return [`anyhow::Result`]; the variants
//! here are raised inside those results and recovered with
//! `downcast_ref::<SyncError>()` where the distinction matters.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The store schema could not be ensured. Aborts the whole pass.
    #[error("failed to ensure store schema: {message}")]
    Schema { message: String },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// A create was rejected because another record already holds the
    /// same content hash under a different title.
    #[error("content of '{title}' is already stored as '{existing_title}' (hash {hash})")]
    DuplicateContent {
        title: String,
        existing_title: String,
        hash: String,
    },

    #[error("record not found: {id}")]
    RecordNotFound { id: String },

    #[error("status '{0}' is reserved for the store and cannot be set from a file")]
    ReservedStatus(String),
}

impl SyncError {
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        SyncError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}
