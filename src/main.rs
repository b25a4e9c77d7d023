//! Tagsweep main entry point
//!
//! This is the command-line interface for the Tagsweep integration sweep.

use clap::Parser;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tagsweep::config::{
    apply_preset, find_preset, load_config_with_hash, validate, validate_headless, BlockAction,
    Config, OutputFormat, ProgressStyle,
};
use tagsweep::control::CoordinatorHandle;
use tagsweep::crawler::{build_crawler, parse_urls_from_file, CrawlOptions, TaskSource};
use tagsweep::output::format_duration;
use tagsweep::storage::load_checkpoint;
use tagsweep::RunSummary;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Tagsweep: a resumable, block-aware integration sweep
///
/// Tagsweep works through very large URL lists with per-domain politeness,
/// retries, URL-variation fallback, and a durable checkpoint. When too many
/// sites start refusing it, it pauses, warns, or aborts.
#[derive(Parser, Debug)]
#[command(name = "tagsweep")]
#[command(version)]
#[command(about = "A resumable, block-aware integration sweep", long_about = None)]
struct Cli {
    /// File with one URL per line (blank lines and # comments are skipped)
    #[arg(short, long, value_name = "FILE", required_unless_present = "url")]
    input: Option<PathBuf>,

    /// URL to check; may be repeated
    #[arg(long, value_name = "URL", conflicts_with = "input")]
    url: Vec<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Preset safety mode (ultra-conservative, conservative, balanced, aggressive)
    #[arg(short, long, value_name = "MODE")]
    mode: Option<String>,

    /// Number of concurrent workers
    #[arg(long)]
    concurrency: Option<usize>,

    /// Maximum in-flight requests per domain
    #[arg(long)]
    max_per_domain: Option<usize>,

    /// Delay before every request, in seconds
    #[arg(long)]
    request_delay: Option<f64>,

    /// Random spread applied to the request delay, in seconds
    #[arg(long)]
    request_jitter: Option<f64>,

    /// Base retry backoff, in seconds
    #[arg(long)]
    base_delay: Option<f64>,

    /// Backoff jitter range in seconds, as MIN,MAX
    #[arg(long, value_name = "MIN,MAX", value_delimiter = ',')]
    jitter_range: Option<Vec<f64>>,

    /// Retries per URL form for transient errors
    #[arg(long)]
    max_retries: Option<u32>,

    /// Try www/scheme/trailing-slash variations before giving up
    #[arg(long)]
    try_variations: bool,

    /// Maximum number of variations per URL
    #[arg(long)]
    max_variations: Option<usize>,

    /// Watch for blocking responses across domains
    #[arg(long)]
    block_detection: bool,

    /// Blocking-signal ratio that triggers the block action
    #[arg(long)]
    block_threshold: Option<f64>,

    /// Number of recent outcomes the block ratio is computed over
    #[arg(long)]
    block_window: Option<usize>,

    /// Blocking signals needed in the window before the block action fires
    #[arg(long, value_name = "N")]
    min_signals: Option<usize>,

    /// What to do when a block is detected: pause, warn, abort
    #[arg(long, value_name = "ACTION")]
    block_action: Option<BlockAction>,

    /// Resume a paused run after this many seconds (0 waits for a command)
    #[arg(long, value_name = "SECS")]
    auto_resume_timeout: Option<u64>,

    /// Re-attempt recently blocked URLs when a pause resolves
    #[arg(long)]
    retry_failed: bool,

    /// Successful results file (stdout when omitted)
    #[arg(short, long, value_name = "FILE")]
    output: Option<String>,

    /// Failed URLs file
    #[arg(long, value_name = "FILE")]
    failures: Option<String>,

    /// Checkpoint file of completed URLs
    #[arg(long, value_name = "FILE")]
    checkpoint: Option<String>,

    /// Output format for successful results: jsonl, sqlite
    #[arg(long, value_name = "FORMAT")]
    format: Option<OutputFormat>,

    /// Log progress every N results
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    progress_interval: Option<u64>,

    /// Progress output: compact, detailed, json
    #[arg(long, value_name = "STYLE")]
    progress_style: Option<ProgressStyle>,

    /// Accept invalid TLS certificates
    #[arg(long)]
    insecure: bool,

    /// Start over, truncating the checkpoint and previous output
    #[arg(long)]
    fresh: bool,

    /// Validate config and show the remaining work without crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = build_config(&cli)?;

    let urls = match &cli.input {
        Some(path) => parse_urls_from_file(path)?,
        None => cli.url.clone(),
    };

    if cli.dry_run {
        handle_dry_run(&config, &urls, cli.fresh)?;
    } else {
        handle_crawl(config, config_hash, urls, cli.fresh, cli.quiet).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr; stdout may carry JSONL results.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tagsweep=info,warn"),
            1 => EnvFilter::new("tagsweep=debug,info"),
            2 => EnvFilter::new("tagsweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file (or defaults), then applies the preset and flags
fn build_config(cli: &Cli) -> Result<(Config, String), Box<dyn std::error::Error>> {
    let (mut config, hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            match load_config_with_hash(path) {
                Ok((cfg, hash)) => {
                    tracing::info!("Configuration loaded successfully (hash: {})", hash);
                    (cfg, hash)
                }
                Err(e) => {
                    tracing::error!("Failed to load configuration: {}", e);
                    return Err(e.into());
                }
            }
        }
        None => (Config::default(), String::new()),
    };

    if let Some(mode) = &cli.mode {
        let preset = find_preset(mode)?;
        tracing::info!("Using preset: {}", preset.description);
        apply_preset(&mut config, preset);
    }

    apply_overrides(&mut config, cli);

    validate(&config)?;
    validate_headless(&config, !cli.quiet)?;

    Ok((config, hash))
}

/// Individual flags win over both the file and the preset
fn apply_overrides(config: &mut Config, cli: &Cli) {
    let crawler = &mut config.crawler;
    if let Some(v) = cli.concurrency {
        crawler.concurrency = v;
    }
    if let Some(v) = cli.max_per_domain {
        crawler.max_per_domain = v;
    }
    if let Some(v) = cli.request_delay {
        crawler.request_delay = v;
    }
    if let Some(v) = cli.request_jitter {
        crawler.request_jitter = v;
    }

    let retry = &mut config.retry;
    if let Some(v) = cli.base_delay {
        retry.base_delay = v;
    }
    if let Some(range) = &cli.jitter_range {
        match range.as_slice() {
            [min, max] => retry.jitter_range = [*min, *max],
            _ => tracing::warn!("--jitter-range expects MIN,MAX; ignoring {:?}", range),
        }
    }
    if let Some(v) = cli.max_retries {
        retry.max_retries = v;
    }

    if cli.try_variations {
        config.variations.enabled = true;
    }
    if let Some(v) = cli.max_variations {
        config.variations.max_variations = v;
    }

    let block = &mut config.block_detection;
    if cli.block_detection {
        block.enabled = true;
    }
    if let Some(v) = cli.block_threshold {
        block.threshold_ratio = v;
    }
    if let Some(v) = cli.block_window {
        block.window_size = v;
        block.min_signals = block.min_signals.min(v);
    }
    if let Some(v) = cli.min_signals {
        block.min_signals = v;
    }
    if let Some(v) = cli.block_action {
        block.action = v;
    }
    if let Some(v) = cli.auto_resume_timeout {
        block.auto_resume_timeout = v;
    }
    if cli.retry_failed {
        block.retry_failed = true;
    }

    let output = &mut config.output;
    if let Some(path) = &cli.output {
        output.results_path = Some(path.clone());
    }
    if let Some(path) = &cli.failures {
        output.failures_path = path.clone();
    }
    if let Some(path) = &cli.checkpoint {
        output.checkpoint_path = path.clone();
    }
    if let Some(format) = cli.format {
        output.format = format;
    }
    if let Some(v) = cli.progress_interval {
        output.progress_interval = v;
    }
    if let Some(style) = cli.progress_style {
        output.progress_style = style;
    }

    if cli.insecure {
        config.fetch.insecure = true;
    }
}

/// Handles the --dry-run mode: prints the effective configuration and the
/// work a real run would do
fn handle_dry_run(
    config: &Config,
    urls: &[String],
    fresh: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Tagsweep Dry Run ===\n");

    println!("Crawler:");
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!("  Max per domain: {}", config.crawler.max_per_domain);
    println!(
        "  Request delay: {}s +/- {}s",
        config.crawler.request_delay, config.crawler.request_jitter
    );

    println!("\nRetry:");
    println!("  Max retries: {}", config.retry.max_retries);
    println!(
        "  Backoff: {}s x {}^n + [{}, {}]s",
        config.retry.base_delay,
        config.retry.multiplier,
        config.retry.jitter_range[0],
        config.retry.jitter_range[1]
    );
    println!("  Rate-limit backoff: {}s", config.retry.rate_limit_backoff);

    println!("\nVariations:");
    println!("  Enabled: {}", config.variations.enabled);
    println!("  Max variations: {}", config.variations.max_variations);

    let block = &config.block_detection;
    println!("\nBlock detection:");
    println!("  Enabled: {}", block.enabled);
    if block.enabled {
        println!(
            "  Threshold: {:.0}% of last {} outcomes (at least {} signals)",
            block.threshold_ratio * 100.0,
            block.window_size,
            block.min_signals
        );
        println!("  Action: {:?}", block.action);
        match block.auto_resume_timeout() {
            Some(timeout) => println!("  Auto-resume: {}", format_duration(timeout)),
            None => println!("  Auto-resume: never"),
        }
    }

    println!("\nOutput:");
    println!(
        "  Results: {} ({:?})",
        config.output.results_path.as_deref().unwrap_or("stdout"),
        config.output.format
    );
    println!("  Failures: {}", config.output.failures_path);
    println!("  Checkpoint: {}", config.output.checkpoint_path);

    let completed = if fresh {
        Default::default()
    } else {
        load_checkpoint(Path::new(&config.output.checkpoint_path))?
    };
    let source = TaskSource::new(urls.iter().cloned(), &completed);

    println!("\nInput:");
    println!("  URLs: {}", source.total_input());
    println!("  Duplicates: {}", source.duplicates());
    println!("  Already checkpointed: {}", source.skipped());

    println!("\n✓ Configuration is valid");
    println!("✓ Would process {} URL(s)", source.remaining());

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: String,
    urls: Vec<String>,
    fresh: bool,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if fresh {
        tracing::info!("Starting fresh run (ignoring previous checkpoint)");
    } else {
        tracing::info!("Starting run (resuming from checkpoint if present)");
    }

    let listen_on_stdin = config.block_detection.enabled
        && config.block_detection.action == BlockAction::Pause
        && !quiet;

    let shutdown = CancellationToken::new();
    let options = CrawlOptions {
        fresh,
        config_hash,
        shutdown: shutdown.clone(),
    };
    let crawler = build_crawler(config, &options)?;

    if listen_on_stdin {
        spawn_command_reader(crawler.handle());
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight work");
            shutdown.cancel();
        }
    });

    match crawler.run(urls).await {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            Err(e.into())
        }
    }
}

/// Forwards `resume`, `retry`, and `abort` lines from stdin to the coordinator
///
/// A plain thread, so a pending read never holds up runtime shutdown.
fn spawn_command_reader(handle: CoordinatorHandle) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let sent = match line.trim().to_ascii_lowercase().as_str() {
                "" => continue,
                "resume" | "r" => handle.resume(),
                "retry" => handle.resume_and_retry(),
                "abort" | "a" => handle.abort(),
                other => {
                    tracing::warn!("Unknown command '{}' (expected resume, retry, abort)", other);
                    continue;
                }
            };
            if !sent {
                break;
            }
        }
    });
}

fn print_summary(summary: &RunSummary) {
    tracing::info!("=== Run Summary ===");
    tracing::info!(
        "Input: {} URL(s), {} duplicate(s), {} skipped from checkpoint",
        summary.total_input,
        summary.duplicates,
        summary.skipped
    );
    tracing::info!(
        "Processed: {} of {} ({} succeeded, {} failed, {} with detections)",
        summary.completed(),
        summary.scheduled,
        summary.succeeded(),
        summary.failed(),
        summary.progress.detected
    );
    tracing::info!(
        "Attempts: {}, pauses: {}, retried after pause: {}, elapsed: {}",
        summary.attempts,
        summary.pauses,
        summary.retried,
        format_duration(summary.elapsed)
    );
    for report in &summary.blocks {
        tracing::info!("Block event: {}", report.summary());
    }
    if summary.interrupted {
        tracing::info!("Re-run the same command to continue where this run stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overridden(args: &[&str]) -> Config {
        let cli = Cli::parse_from(["tagsweep", "--url", "https://a.com"].iter().chain(args));
        let mut config = Config::default();
        apply_overrides(&mut config, &cli);
        config
    }

    #[test]
    fn test_progress_flags_override_config() {
        let config = overridden(&["--progress-interval", "25", "--progress-style", "detailed"]);
        assert_eq!(config.output.progress_interval, 25);
        assert_eq!(config.output.progress_style, ProgressStyle::Detailed);
    }

    #[test]
    fn test_zero_progress_interval_is_rejected() {
        let parsed = Cli::try_parse_from(["tagsweep", "--url", "a.com", "--progress-interval", "0"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_unknown_progress_style_is_rejected() {
        let parsed = Cli::try_parse_from(["tagsweep", "--url", "a.com", "--progress-style", "fancy"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_min_signals_applies_after_window() {
        let config = overridden(&["--block-window", "8", "--min-signals", "3"]);
        assert_eq!(config.block_detection.window_size, 8);
        assert_eq!(config.block_detection.min_signals, 3);
        assert!(validate(&config).is_ok());

        let config = overridden(&["--block-window", "4", "--min-signals", "6"]);
        assert!(validate(&config).is_err());
    }
}
