//! Configuration module for Tagsweep
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, plus the named pacing presets.
//!
//! # Example
//!
//! ```no_run
//! use tagsweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("tagsweep.toml")).unwrap();
//! println!("Crawler will use {} workers", config.crawler.concurrency);
//! ```

mod parser;
mod presets;
mod types;
mod validation;

// Re-export types
pub use types::{
    BlockAction, BlockDetectionConfig, Config, CrawlerConfig, DetectionConfig, FetchConfig,
    OutputConfig, OutputFormat, ProgressStyle, RetryConfig, VariationConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use presets::{apply_preset, find_preset, Preset, PRESETS};
pub use validation::{validate, validate_headless};
