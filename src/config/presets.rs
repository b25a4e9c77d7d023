//! Preset safety modes
//!
//! A preset sets the pacing knobs of `[crawler]` in one go. Individual CLI
//! flags applied afterwards still win.

use crate::config::types::Config;
use crate::ConfigError;

/// Named pacing profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preset {
    pub name: &'static str,
    pub concurrency: usize,
    pub request_delay: f64,
    pub request_jitter: f64,
    pub max_per_domain: usize,
    pub description: &'static str,
}

pub const PRESETS: &[Preset] = &[
    Preset {
        name: "ultra-conservative",
        concurrency: 2,
        request_delay: 3.0,
        request_jitter: 1.0,
        max_per_domain: 1,
        description: "Ultra-conservative (3-5 hrs/10k URLs, virtually zero block risk)",
    },
    Preset {
        name: "conservative",
        concurrency: 5,
        request_delay: 1.0,
        request_jitter: 0.3,
        max_per_domain: 1,
        description: "Conservative (35-40 min/10k URLs, minimal risk)",
    },
    Preset {
        name: "balanced",
        concurrency: 10,
        request_delay: 0.5,
        request_jitter: 0.2,
        max_per_domain: 2,
        description: "Balanced (16-18 min/10k URLs, low-medium risk)",
    },
    Preset {
        name: "aggressive",
        concurrency: 20,
        request_delay: 0.0,
        request_jitter: 0.0,
        max_per_domain: 5,
        description: "Aggressive (8-10 min/10k URLs, high risk)",
    },
];

/// Looks up a preset by name
pub fn find_preset(name: &str) -> Result<&'static Preset, ConfigError> {
    PRESETS
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| ConfigError::UnknownMode(name.to_string()))
}

/// Applies a preset's pacing values to the configuration
pub fn apply_preset(config: &mut Config, preset: &Preset) {
    config.crawler.concurrency = preset.concurrency;
    config.crawler.request_delay = preset.request_delay;
    config.crawler.request_jitter = preset.request_jitter;
    config.crawler.max_per_domain = preset.max_per_domain;
}
