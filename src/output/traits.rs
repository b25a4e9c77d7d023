//! Result sink trait and error types

use crate::state::UrlResult;
use crate::storage::RunStatus;
use thiserror::Error;

/// Errors raised by a result sink; all of them are fatal for the run
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write result: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Append-only persistence for terminal URL results
///
/// A sink is driven by a single consumer task, so implementations need to be
/// `Send` but not `Sync`. `write` must not return before the record is
/// handed to the OS.
pub trait Sink: Send {
    /// Persists one result
    fn write(&mut self, result: &UrlResult) -> SinkResult<()>;

    /// Cheap probe that the sink can still accept writes
    fn healthy(&mut self) -> bool;

    fn flush(&mut self) -> SinkResult<()>;

    /// Called once when the run ends
    fn finish(&mut self, status: RunStatus) -> SinkResult<()> {
        let _ = status;
        self.flush()
    }

    /// Short human-readable destination, for logs
    fn describe(&self) -> String;
}
