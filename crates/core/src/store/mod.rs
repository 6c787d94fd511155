//! Local record store.
//!
//! Holds the last fetched batch of source records so the CLI can pick a
//! routing code and submit its records. A new fetch replaces the whole batch.

mod sqlite;

pub use sqlite::SqliteRecordStore;

use thiserror::Error;

use crate::reading::SourceRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Records sharing one routing code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingGroup {
    pub code: String,
    pub count: usize,
}

/// Trait for record storage backends.
pub trait RecordStore: Send + Sync {
    /// Replace every stored record with `records`.
    ///
    /// Atomic: on failure the previous batch is left untouched.
    fn replace_all(&self, records: &[SourceRecord]) -> Result<(), StoreError>;

    /// Routing codes with their record counts, ordered by code.
    fn routing_groups(&self) -> Result<Vec<RoutingGroup>, StoreError>;

    /// Records with the given routing code, in insertion order.
    fn records_by_routing_code(&self, code: &str) -> Result<Vec<SourceRecord>, StoreError>;

    /// Remove one record. Returns whether it existed.
    fn remove(&self, idpel: &str) -> Result<bool, StoreError>;

    /// Total stored records.
    fn count(&self) -> Result<usize, StoreError>;
}
