//! Result output
//!
//! This module handles:
//! - the bounded result queue and its single consumer
//! - JSONL and SQLite sinks for terminal URL results
//! - progress tracking and the end-of-run summary

mod jsonl;
mod sink;
mod sqlite_output;
pub mod stats;
mod traits;

pub use jsonl::JsonlSink;
pub use sink::{result_channel, ResultSender, ResultSink};
pub use sqlite_output::SqliteSink;
pub use stats::{format_duration, ProgressSnapshot, ProgressTracker};
pub use traits::{Sink, SinkError, SinkResult};

use crate::config::{OutputConfig, OutputFormat};
use std::path::Path;

/// Default database path when `format = "sqlite"` and no results path is set
pub const DEFAULT_SQLITE_PATH: &str = "results.db";

/// Opens the success and failure sinks described by `config`
///
/// Failures always go to a JSONL file. Existing files are appended to
/// unless `fresh` is set.
pub fn open_sinks(
    config: &OutputConfig,
    config_hash: &str,
    fresh: bool,
) -> SinkResult<(Box<dyn Sink>, Box<dyn Sink>)> {
    let successes: Box<dyn Sink> = match (config.format, config.results_path.as_deref()) {
        (OutputFormat::Jsonl, None) => Box::new(JsonlSink::stdout()),
        (OutputFormat::Jsonl, Some(path)) => Box::new(JsonlSink::create(Path::new(path), fresh)?),
        (OutputFormat::Sqlite, path) => {
            let path = Path::new(path.unwrap_or(DEFAULT_SQLITE_PATH));
            if fresh && path.exists() {
                std::fs::remove_file(path)?;
            }
            Box::new(SqliteSink::open(path, config_hash)?)
        }
    };

    let failures = Box::new(JsonlSink::create(Path::new(&config.failures_path), fresh)?);

    Ok((successes, failures))
}
