//! Storage traits and error types

use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur while reading or writing durable state
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Checkpoint is not valid UTF-8 at line {0}")]
    Corrupt(usize),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable, append-only record of completed original URLs
///
/// `append` returns only once the entry is flushed, so a crash can at worst
/// lose a checkpoint line for a result that was already written (a harmless
/// duplicate on resume), never the reverse.
pub trait CheckpointStore: Send {
    /// Loads every completed URL
    fn load(&self) -> StorageResult<HashSet<String>>;

    /// Records one completed URL
    fn append(&mut self, original_url: &str) -> StorageResult<()>;

    /// Number of entries appended by this process
    fn appended(&self) -> u64;
}
