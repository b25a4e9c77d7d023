use crate::crawler::RetryDecision;
use crate::detect::Detection;
use crate::state::{AttemptOutcome, UrlResult};
use crate::url::{extract_domain, normalize_url, variations, VariationKind, Variations};
use chrono::Utc;
use std::time::Duration;

/// What a worker does next after an unsuccessful attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Sleep, then repeat the attempt against the same URL form
    Retry(Duration),

    /// Move on to the next URL variation, optionally after a cooldown
    NextForm { cooldown: Option<Duration> },

    /// Every allowed form has been exhausted; the task is a failure
    Exhausted,
}

/// One input URL being worked through its attempts and variations
///
/// A task is owned by exactly one worker at a time. Its lifecycle is
/// `pending -> attempting(form, n) -> {succeeded | next form | exhausted}`
/// and it always ends in exactly one [`UrlResult`].
#[derive(Debug, Clone)]
pub struct UrlTask {
    /// Input URL, verbatim; identity for dedup, checkpoint, and output
    pub original_url: String,

    /// URL form currently being attempted
    pub normalized_url: String,

    /// Attempts made against the current form
    pub attempt_count: u32,

    /// 0 for the original form, n for the nth variation
    pub variation_index: usize,

    variation_kind: Option<VariationKind>,
    variations: Option<Variations>,
    attempted_urls: Vec<String>,
    total_attempts: u32,
    block_retries: u32,
    last_outcome: Option<AttemptOutcome>,
}

impl UrlTask {
    pub fn new(original_url: impl Into<String>) -> Self {
        let original_url = original_url.into();
        let normalized_url = normalize_url(&original_url);
        Self {
            original_url,
            normalized_url,
            attempt_count: 0,
            variation_index: 0,
            variation_kind: None,
            variations: None,
            attempted_urls: Vec::new(),
            total_attempts: 0,
            block_retries: 0,
            last_outcome: None,
        }
    }

    /// Domain key of the form currently being attempted
    pub fn domain(&self) -> String {
        extract_domain(&self.normalized_url)
    }

    /// Zero-based index of the attempt about to be made on this form
    pub fn current_attempt(&self) -> u32 {
        self.attempt_count
    }

    pub fn total_attempts(&self) -> u32 {
        self.total_attempts
    }

    pub fn block_retries(&self) -> u32 {
        self.block_retries
    }

    pub fn last_outcome(&self) -> Option<&AttemptOutcome> {
        self.last_outcome.as_ref()
    }

    /// Records that an attempt against the current form was made
    pub fn record_attempt(&mut self, outcome: AttemptOutcome) {
        if !self.attempted_urls.contains(&self.normalized_url) {
            self.attempted_urls.push(self.normalized_url.clone());
        }
        self.attempt_count += 1;
        self.total_attempts += 1;
        self.last_outcome = Some(outcome);
    }

    /// Applies a retry decision and returns what to do next
    ///
    /// Variations are generated lazily the first time the original form is
    /// given up on, and only when `max_variations` allows any.
    pub fn advance(
        &mut self,
        decision: RetryDecision,
        variations_enabled: bool,
        max_variations: usize,
    ) -> Step {
        let cooldown = match decision {
            RetryDecision::Retry(delay) => return Step::Retry(delay),
            RetryDecision::VariationFallback(delay) => Some(delay),
            RetryDecision::GiveUp => None,
        };

        if !variations_enabled || max_variations == 0 {
            return Step::Exhausted;
        }

        let base = normalize_url(&self.original_url);
        let pending = self
            .variations
            .get_or_insert_with(|| variations(&base, max_variations));

        match pending.next() {
            Some(next) => {
                self.normalized_url = next.url;
                self.variation_kind = Some(next.kind);
                self.variation_index += 1;
                self.attempt_count = 0;
                Step::NextForm { cooldown }
            }
            None => Step::Exhausted,
        }
    }

    /// Starts the task over from its original form
    ///
    /// Used once per task when a resolved pause asks for recently blocked
    /// URLs to be re-attempted. Attempt history is kept for the result.
    pub fn restart(&mut self) {
        self.normalized_url = normalize_url(&self.original_url);
        self.attempt_count = 0;
        self.variation_index = 0;
        self.variation_kind = None;
        self.variations = None;
        self.block_retries += 1;
    }

    /// Finishes the task successfully
    pub fn into_success(
        self,
        final_url: String,
        http_status: u16,
        detection: Detection,
    ) -> UrlResult {
        let variation_used = (self.variation_index > 0).then(|| self.normalized_url.clone());
        UrlResult {
            original_url: self.original_url,
            final_url: Some(final_url),
            success: true,
            failure_reason: None,
            variation_used,
            variation_kind: self.variation_kind,
            http_status: Some(http_status),
            status_class: None,
            attempts: self.total_attempts,
            attempted_urls: self.attempted_urls,
            detection: Some(detection),
            completed_at: Utc::now(),
        }
    }

    /// Finishes the task as a failure described by its last outcome
    pub fn into_failure(self) -> UrlResult {
        let forms = self.attempted_urls.len();
        let reason = match &self.last_outcome {
            Some(outcome) => format!(
                "{} after {} attempt(s) across {} URL form(s)",
                outcome.describe(),
                self.total_attempts,
                forms
            ),
            None => "no attempt completed".to_string(),
        };

        UrlResult {
            original_url: self.original_url,
            final_url: None,
            success: false,
            failure_reason: Some(reason),
            variation_used: None,
            variation_kind: None,
            http_status: self.last_outcome.as_ref().and_then(|o| o.http_status),
            status_class: self.last_outcome.as_ref().map(|o| o.status_class),
            attempts: self.total_attempts,
            attempted_urls: self.attempted_urls,
            detection: None,
            completed_at: Utc::now(),
        }
    }
}
