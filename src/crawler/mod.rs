//! Crawl orchestration
//!
//! This module contains the task pipeline:
//! - the input task source
//! - per-domain concurrency limiting
//! - the retry/backoff policy
//! - the HTTP fetcher
//! - the worker loop and the engine that runs the pool

mod engine;
mod fetcher;
mod limiter;
mod retry;
mod source;
mod worker;

pub use engine::{Crawler, RunSummary};
pub use fetcher::{build_http_client, FetchError, FetchedPage, Fetcher, HttpFetcher};
pub use limiter::{DomainLimiter, DomainPermit};
pub use retry::{RetryDecision, RetryPolicy};
pub use source::{parse_url_list, parse_urls_from_file, TaskSource};
pub use worker::{Pacing, WorkerStats};

use crate::config::Config;
use crate::detect::SignatureDetector;
use crate::output::open_sinks;
use crate::storage::FileCheckpoint;
use crate::{ConfigError, Result};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Run-level options that are not part of the configuration file
#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    /// Discard the checkpoint and previous output before starting
    pub fresh: bool,

    /// Hash of the configuration file, recorded by the SQLite sink
    pub config_hash: String,

    pub shutdown: CancellationToken,
}

/// Builds a crawler with the HTTP fetcher, signature detector, configured
/// sinks, and the checkpoint file
pub fn build_crawler(config: Config, options: &CrawlOptions) -> Result<Crawler> {
    let fetcher = HttpFetcher::new(&config.fetch)?;
    let detector = SignatureDetector::new(&config.detection.signatures)
        .map_err(|e| ConfigError::Validation(e.to_string()))?;
    let (successes, failures) = open_sinks(&config.output, &options.config_hash, options.fresh)?;
    let checkpoint = FileCheckpoint::open(
        Path::new(&config.output.checkpoint_path),
        options.fresh,
        config.output.fsync,
    )?;

    Ok(Crawler::new(
        config,
        Arc::new(fetcher),
        Arc::new(detector),
        successes,
        failures,
        Box::new(checkpoint),
    )
    .with_shutdown(options.shutdown.clone()))
}

/// Runs a complete crawl over `urls`
///
/// This is the main entry point. It will:
/// 1. Open the checkpoint and skip URLs already completed
/// 2. Start the coordinator, the result sink, and the worker pool
/// 3. Process every remaining URL to exactly one result
/// 4. Flush output and return a summary
///
/// # Example
///
/// ```no_run
/// use tagsweep::config::Config;
/// use tagsweep::crawler::{crawl, CrawlOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let urls = vec!["https://example.com".to_string()];
/// let summary = crawl(Config::default(), urls, CrawlOptions::default()).await?;
/// println!("{} succeeded", summary.succeeded());
/// # Ok(())
/// # }
/// ```
pub async fn crawl(config: Config, urls: Vec<String>, options: CrawlOptions) -> Result<RunSummary> {
    build_crawler(config, &options)?.run(urls).await
}
