//! Tagsweep: a resumable, block-aware integration sweep
//!
//! This crate crawls very large URL lists looking for a third-party web
//! integration. The interesting part is the orchestration engine: a bounded
//! worker pool with per-domain politeness, retry/backoff, URL-variation
//! fallback, a durable checkpoint, and a block-detection loop that can pause
//! and resume live traffic without losing work.

pub mod config;
pub mod control;
pub mod crawler;
pub mod detect;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Tagsweep operations
///
/// Everything that reaches this type is fatal for the run. Per-URL problems
/// are folded into outcomes and never surface here.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read input list {path}: {source}")]
    Input {
        path: String,
        source: std::io::Error,
    },

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] storage::StorageError),

    #[error("Result sink error: {0}")]
    Sink(#[from] output::SinkError),

    #[error("Result sink unhealthy: {0}")]
    SinkUnhealthy(String),

    #[error("Result sink stopped accepting results")]
    SinkClosed,

    #[error("Run aborted after block detection: {0}")]
    Aborted(String),

    #[error("Worker failure: {0}")]
    Worker(String),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown preset mode: {0}")]
    UnknownMode(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Tagsweep operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlParseResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{crawl, Crawler, RunSummary};
pub use state::{AttemptOutcome, StatusClass, UrlResult, UrlTask};
pub use url::{extract_domain, normalize_url, variations};
