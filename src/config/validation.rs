use crate::config::types::{
    BlockAction, BlockDetectionConfig, Config, CrawlerConfig, FetchConfig, OutputConfig,
    RetryConfig, VariationConfig,
};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_variation_config(&config.variations)?;
    validate_block_detection_config(&config.block_detection)?;
    validate_fetch_config(&config.fetch)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates worker pool and politeness settings
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be >= 1, got {}",
            config.concurrency
        )));
    }

    if config.max_per_domain < 1 {
        return Err(ConfigError::Validation(format!(
            "max_per_domain must be >= 1, got {}",
            config.max_per_domain
        )));
    }

    non_negative("request_delay", config.request_delay)?;
    non_negative("request_jitter", config.request_jitter)?;
    positive("permit_timeout", config.permit_timeout)?;
    positive("pause_wait_timeout", config.pause_wait_timeout)?;
    positive("enqueue_timeout", config.enqueue_timeout)?;

    Ok(())
}

/// Validates retry and backoff settings
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    non_negative("base_delay", config.base_delay)?;
    non_negative("rate_limit_backoff", config.rate_limit_backoff)?;

    if !config.multiplier.is_finite() || config.multiplier < 1.0 {
        return Err(ConfigError::Validation(format!(
            "multiplier must be >= 1.0, got {}",
            config.multiplier
        )));
    }

    let [min, max] = config.jitter_range;
    non_negative("jitter_range minimum", min)?;
    non_negative("jitter_range maximum", max)?;
    if min > max {
        return Err(ConfigError::Validation(format!(
            "jitter_range minimum ({}) exceeds maximum ({})",
            min, max
        )));
    }

    Ok(())
}

fn validate_variation_config(config: &VariationConfig) -> Result<(), ConfigError> {
    if config.enabled && config.max_variations == 0 {
        tracing::warn!("variations enabled with max_variations = 0; no variations will be tried");
    }
    Ok(())
}

/// Validates block detection settings
fn validate_block_detection_config(config: &BlockDetectionConfig) -> Result<(), ConfigError> {
    if !(config.threshold_ratio > 0.0 && config.threshold_ratio <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "threshold_ratio must be in (0, 1], got {}",
            config.threshold_ratio
        )));
    }

    if config.window_size < 1 {
        return Err(ConfigError::Validation(
            "window_size must be >= 1".to_string(),
        ));
    }

    if config.min_signals < 1 {
        return Err(ConfigError::Validation(
            "min_signals must be >= 1".to_string(),
        ));
    }

    if config.min_signals > config.window_size {
        return Err(ConfigError::Validation(format!(
            "min_signals ({}) cannot exceed window_size ({})",
            config.min_signals, config.window_size
        )));
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    positive("timeout", config.timeout)?;
    positive("connect_timeout", config.connect_timeout)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.checkpoint_path.is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint_path cannot be empty".to_string(),
        ));
    }

    if config.failures_path.is_empty() {
        return Err(ConfigError::Validation(
            "failures_path cannot be empty".to_string(),
        ));
    }

    if config.results_path.as_deref() == Some(config.failures_path.as_str()) {
        return Err(ConfigError::Validation(
            "results_path and failures_path must differ".to_string(),
        ));
    }

    if config.progress_interval < 1 {
        return Err(ConfigError::Validation(
            "progress_interval must be >= 1".to_string(),
        ));
    }

    positive("health_check_interval", config.health_check_interval)?;

    Ok(())
}

/// Rejects a pause action that nobody could ever resolve
///
/// Headless runs have no stdin listener, so pausing without an auto-resume
/// timeout would park the workers forever.
pub fn validate_headless(config: &Config, interactive: bool) -> Result<(), ConfigError> {
    let block = &config.block_detection;
    if block.enabled
        && block.action == BlockAction::Pause
        && !interactive
        && block.auto_resume_timeout().is_none()
    {
        return Err(ConfigError::Validation(
            "block action 'pause' without auto-resume needs interactive mode; \
             use 'warn' or 'abort' for quiet runs"
                .to_string(),
        ));
    }
    Ok(())
}

fn non_negative(name: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::Validation(format!(
            "{} must be >= 0, got {}",
            name, value
        )));
    }
    Ok(())
}

fn positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "{} must be > 0, got {}",
            name, value
        )));
    }
    Ok(())
}
