//! Retry and backoff policy
//!
//! | Outcome | Decision |
//! |---------|----------|
//! | Transient error, retries left | Retry after `base * multiplier^attempt + jitter` |
//! | Transient error, retries spent | Give up on this form |
//! | HTTP 429 | One fixed backoff, then the next form |
//! | Anything, `max_retries = 0` | Give up on this form immediately |
//! | HTTP 403 | Give up on this form immediately |
//! | Other 4xx | Give up on this form immediately |
//! | Reset / TLS failure | Treated as transient |

use crate::config::RetryConfig;
use crate::state::{AttemptOutcome, StatusClass};
use rand::Rng;
use std::time::Duration;

/// Upper bound on a single computed backoff (seconds)
pub const MAX_BACKOFF_SECS: f64 = 3600.0;

/// What to do after an unsuccessful attempt against one URL form
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryDecision {
    /// Try the same form again after the delay
    Retry(Duration),

    /// Abandon this form after a single cooldown
    VariationFallback(Duration),

    /// Abandon this form now
    GiveUp,
}

/// Pure retry policy; no I/O, no clock
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: f64,
    multiplier: f64,
    jitter_min: f64,
    jitter_max: f64,
    rate_limit_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.base_delay,
            multiplier: config.multiplier,
            jitter_min: config.jitter_range[0],
            jitter_max: config.jitter_range[1],
            rate_limit_backoff: Duration::from_secs_f64(config.rate_limit_backoff),
        }
    }

    /// Decides what follows `outcome`
    ///
    /// `attempt` is the zero-based index of the attempt that produced
    /// `outcome` on the current URL form.
    pub fn decide(&self, attempt: u32, outcome: &AttemptOutcome) -> RetryDecision {
        match outcome.status_class {
            StatusClass::TransientError | StatusClass::BlockedSignal => {
                if attempt < self.max_retries {
                    RetryDecision::Retry(self.backoff(attempt) + self.jitter())
                } else {
                    RetryDecision::GiveUp
                }
            }
            StatusClass::RateLimited if self.max_retries == 0 => RetryDecision::GiveUp,
            StatusClass::RateLimited => RetryDecision::VariationFallback(self.rate_limit_backoff),
            StatusClass::Forbidden | StatusClass::PermanentError => RetryDecision::GiveUp,
            // A success never reaches the policy; treat it as final
            StatusClass::Success => RetryDecision::GiveUp,
        }
    }

    /// Un-jittered exponential delay for `attempt`, capped at
    /// [`MAX_BACKOFF_SECS`]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base_delay * self.multiplier.powi(exponent);
        if secs.is_nan() {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(secs.clamp(0.0, MAX_BACKOFF_SECS))
    }

    fn jitter(&self) -> Duration {
        if self.jitter_max <= self.jitter_min {
            return Duration::from_secs_f64(self.jitter_min);
        }
        let secs = rand::rng().random_range(self.jitter_min..self.jitter_max);
        Duration::from_secs_f64(secs)
    }
}
