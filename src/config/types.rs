use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Tagsweep
///
/// Every section is optional in the TOML file; missing keys fall back to the
/// ultra-conservative defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub retry: RetryConfig,
    pub variations: VariationConfig,
    #[serde(rename = "block-detection")]
    pub block_detection: BlockDetectionConfig,
    pub fetch: FetchConfig,
    pub output: OutputConfig,
    pub detection: DetectionConfig,
}

/// Worker pool and politeness configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of concurrent workers (the global concurrency budget)
    pub concurrency: usize,

    /// Maximum in-flight attempts per registrable domain
    pub max_per_domain: usize,

    /// Pause applied before every attempt (seconds)
    pub request_delay: f64,

    /// Random +/- spread applied to `request_delay` (seconds)
    pub request_jitter: f64,

    /// Upper bound on a single wait for a domain permit (seconds)
    pub permit_timeout: f64,

    /// Upper bound on a single wait on the pause signal (seconds)
    pub pause_wait_timeout: f64,

    /// Capacity of the result queue; 0 means twice the concurrency
    pub result_queue_size: usize,

    /// Upper bound on a single enqueue attempt into the result queue (seconds)
    pub enqueue_timeout: f64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            max_per_domain: 1,
            request_delay: 3.0,
            request_jitter: 1.0,
            permit_timeout: 30.0,
            pause_wait_timeout: 60.0,
            result_queue_size: 0,
            enqueue_timeout: 30.0,
        }
    }
}

impl CrawlerConfig {
    pub fn permit_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.permit_timeout)
    }

    pub fn pause_wait_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.pause_wait_timeout)
    }

    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.enqueue_timeout)
    }

    /// Effective result queue capacity
    pub fn queue_capacity(&self) -> usize {
        if self.result_queue_size == 0 {
            (self.concurrency * 2).max(1)
        } else {
            self.result_queue_size
        }
    }
}

/// Retry and backoff configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Retries allowed per URL form for transient errors
    pub max_retries: u32,

    /// Base backoff delay (seconds)
    pub base_delay: f64,

    /// Exponential growth factor applied per attempt
    pub multiplier: f64,

    /// Uniform jitter range added to each backoff, `[min, max]` seconds
    pub jitter_range: [f64; 2],

    /// Single fixed backoff after an HTTP 429 (seconds)
    pub rate_limit_backoff: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: 5.0,
            multiplier: 3.0,
            jitter_range: [0.0, 1.0],
            rate_limit_backoff: 120.0,
        }
    }
}

/// URL variation fallback configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct VariationConfig {
    pub enabled: bool,
    pub max_variations: usize,
}

impl Default for VariationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_variations: 4,
        }
    }
}

/// What the coordinator does once the crawl looks blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockAction {
    Pause,
    Warn,
    Abort,
}

impl std::str::FromStr for BlockAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pause" => Ok(Self::Pause),
            "warn" => Ok(Self::Warn),
            "abort" => Ok(Self::Abort),
            other => Err(format!("unknown block action '{}'", other)),
        }
    }
}

/// Block detection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BlockDetectionConfig {
    pub enabled: bool,

    /// Blocking-signal ratio over the window that triggers an action
    pub threshold_ratio: f64,

    /// Number of most recent outcomes considered
    pub window_size: usize,

    /// Minimum number of blocking signals in the window
    pub min_signals: usize,

    pub action: BlockAction,

    /// Auto-resume after this many seconds when paused; 0 waits for an
    /// external signal only
    pub auto_resume_timeout: u64,

    /// Re-attempt recently blocked URLs when a pause resolves
    pub retry_failed: bool,
}

impl Default for BlockDetectionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold_ratio: 0.60,
            window_size: 20,
            min_signals: 5,
            action: BlockAction::Pause,
            auto_resume_timeout: 300,
            retry_failed: false,
        }
    }
}

impl BlockDetectionConfig {
    pub fn auto_resume_timeout(&self) -> Option<Duration> {
        if self.auto_resume_timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(self.auto_resume_timeout))
        }
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetchConfig {
    pub user_agent: String,

    /// Whole-request timeout (seconds)
    pub timeout: f64,

    /// TCP/TLS connect timeout (seconds)
    pub connect_timeout: f64,

    pub max_redirects: usize,

    /// Accept invalid TLS certificates
    pub insecure: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("Tagsweep/{} (+https://example.org/tagsweep)", env!("CARGO_PKG_VERSION")),
            timeout: 20.0,
            connect_timeout: 10.0,
            max_redirects: 10,
            insecure: false,
        }
    }
}

/// Result serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jsonl,
    Sqlite,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jsonl" => Ok(Self::Jsonl),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

/// How progress lines are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStyle {
    Compact,
    /// Multi-line status with detection and failure breakdowns
    Detailed,
    Json,
}

impl std::str::FromStr for ProgressStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compact" => Ok(Self::Compact),
            "detailed" => Ok(Self::Detailed),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown progress style '{}'", other)),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Successful results; `None` writes JSONL to stdout
    pub results_path: Option<String>,

    /// One structured entry per failed URL
    pub failures_path: String,

    /// One completed original URL per line
    pub checkpoint_path: String,

    pub format: OutputFormat,

    /// Log a progress line every N results
    pub progress_interval: u64,

    pub progress_style: ProgressStyle,

    /// Interval between sink health probes (seconds)
    pub health_check_interval: f64,

    /// fsync the checkpoint after every append
    pub fsync: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_path: None,
            failures_path: "failures.jsonl".to_string(),
            checkpoint_path: "checkpoint.txt".to_string(),
            format: OutputFormat::Jsonl,
            progress_interval: 10,
            progress_style: ProgressStyle::Compact,
            health_check_interval: 5.0,
            fsync: false,
        }
    }
}

impl OutputConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs_f64(self.health_check_interval)
    }
}

/// Signature configuration for the bundled detector
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub signatures: Vec<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            signatures: vec![
                "js.hs-scripts.com".to_string(),
                "js.hs-analytics.net".to_string(),
                "js.hsforms.net".to_string(),
                "js.usemessages.com".to_string(),
                "hubspotutk".to_string(),
                "_hcms".to_string(),
            ],
        }
    }
}
