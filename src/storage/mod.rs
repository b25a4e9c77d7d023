//! Durable state
//!
//! - the append-only checkpoint of completed URLs
//! - the SQLite schema used by the database result sink

mod checkpoint;
pub(crate) mod schema;
mod traits;

pub use checkpoint::{load_checkpoint, FileCheckpoint};
pub use traits::{CheckpointStore, StorageError, StorageResult};

/// Status of a run as recorded in the results database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
