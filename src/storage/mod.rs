//! History persistence: record model, store trait, encrypted SQLite backend.

mod encrypted;
mod history;

pub use encrypted::SqliteHistoryStore;
pub use history::{
    now, ApprovalStatus, HistoryFilter, HistoryQuery, HistoryRecord, Page, PageRequest, SortOrder,
    UnknownStatus,
};

use crate::verdict::Label;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("encryption failed")]
    Crypto,

    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("store lock poisoned")]
    Poisoned,
}

pub trait HistoryStore: Send + Sync {
    /// Insert all records or none.
    fn insert_many(&self, records: &[HistoryRecord]) -> Result<(), StorageError>;

    fn get(&self, id: &str) -> Result<Option<HistoryRecord>, StorageError>;

    fn find(&self, query: &HistoryQuery) -> Result<Page<HistoryRecord>, StorageError>;

    /// Persist review fields and `updated_at`. False if no record has this id.
    fn update(&self, record: &HistoryRecord) -> Result<bool, StorageError>;

    fn delete(&self, id: &str) -> Result<bool, StorageError>;

    /// Matching records per label, in label order. Labels with no records are omitted.
    fn label_counts(&self, filter: &HistoryFilter) -> Result<Vec<(Label, u64)>, StorageError>;
}
