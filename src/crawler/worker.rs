//! Worker loop
//!
//! A worker owns one task at a time and walks it through
//! `attempt -> classify -> {success | retry | next form | exhausted}`.
//! Before every network attempt it applies request pacing, waits on the
//! pause gate, and takes a domain permit that is released as soon as the
//! attempt has been classified.
//!
//! A task that exhausts on a blocking signal is held in the parking lot
//! rather than emitted, so a pause that resolves with a retry can still
//! restart it. Restarted tasks are taken ahead of fresh input.

use crate::config::{CrawlerConfig, VariationConfig};
use crate::control::{GateDecision, Idle, ParkingLot, PauseGate, RunMode};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::limiter::DomainLimiter;
use crate::crawler::retry::{RetryDecision, RetryPolicy};
use crate::crawler::source::TaskSource;
use crate::detect::{Detection, Detector};
use crate::output::ResultSender;
use crate::state::{AttemptOutcome, StatusClass, Step, UrlResult, UrlTask};
use crate::Result;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Fallback wake-up for a worker waiting on held tasks
const IDLE_RECHECK: Duration = Duration::from_secs(1);

/// Delay applied before every attempt: `delay ± jitter`, never negative
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    delay: f64,
    jitter: f64,
}

impl Pacing {
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            delay: config.request_delay,
            jitter: config.request_jitter,
        }
    }

    pub fn next_delay(&self) -> Duration {
        let offset = if self.jitter > 0.0 {
            rand::rng().random_range(-self.jitter..=self.jitter)
        } else {
            0.0
        };
        Duration::from_secs_f64((self.delay + offset).max(0.0))
    }
}

/// Everything a worker shares with its siblings
#[derive(Clone)]
pub struct WorkerContext {
    pub source: Arc<TaskSource>,
    pub fetcher: Arc<dyn Fetcher>,
    pub detector: Arc<dyn Detector>,
    pub limiter: Arc<DomainLimiter>,
    pub policy: RetryPolicy,
    pub variations: VariationConfig,
    pub pacing: Pacing,
    pub gate: PauseGate,
    pub parking: Arc<ParkingLot>,
    pub outcomes: mpsc::UnboundedSender<AttemptOutcome>,
    pub results: ResultSender,
    pub shutdown: CancellationToken,
}

/// Per-worker tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub completed: u64,
    pub abandoned: u64,
    pub attempts: u64,
}

enum TaskEnd {
    Done(UrlResult),
    /// Exhausted on a blocking signal; waits for the pause to resolve
    Held(UrlTask),
    Abandoned,
}

pub struct Worker {
    id: usize,
    ctx: WorkerContext,
    stats: WorkerStats,
}

impl Worker {
    pub fn new(id: usize, ctx: WorkerContext) -> Self {
        Self {
            id,
            ctx,
            stats: WorkerStats::default(),
        }
    }

    /// Pulls tasks until the source and the parking lot are drained or the
    /// run shuts down
    pub async fn run(mut self) -> Result<WorkerStats> {
        tracing::debug!(worker = self.id, "Worker started");

        loop {
            if self.ctx.shutdown.is_cancelled() {
                self.ctx.source.close();
                break;
            }
            for task in self.ctx.parking.take_expired() {
                self.emit_failure(task).await?;
            }

            let task = match self.ctx.parking.take_restarted() {
                Some(task) => {
                    tracing::info!(
                        url = %task.original_url,
                        "Re-attempting recently blocked URL after resume"
                    );
                    task
                }
                None => match self.ctx.source.next() {
                    Some(task) => task,
                    None => {
                        if self.wait_for_held().await? {
                            continue;
                        }
                        break;
                    }
                },
            };

            let url = task.original_url.clone();
            match self.process(task).await {
                TaskEnd::Done(result) => {
                    self.ctx.results.submit(result).await?;
                    self.stats.completed += 1;
                }
                TaskEnd::Held(task) => {
                    tracing::debug!(worker = self.id, url = %url, "Holding blocked URL");
                    if let Some(released) = self.ctx.parking.park(task) {
                        self.emit_failure(released).await?;
                    }
                }
                TaskEnd::Abandoned => {
                    // Not checkpointed; picked up again on the next run
                    tracing::debug!(worker = self.id, url = %url, "Task abandoned at shutdown");
                    self.stats.abandoned += 1;
                    self.ctx.source.close();
                    break;
                }
            }
        }

        tracing::debug!(worker = self.id, stats = ?self.stats, "Worker finished");
        Ok(self.stats)
    }

    /// Idles on the parking lot once the source is drained
    ///
    /// Returns true when the worker should look for work again and false
    /// once nothing held can come back to it.
    async fn wait_for_held(&mut self) -> Result<bool> {
        // Held tasks are left for the next run once shutdown starts
        if self.ctx.shutdown.is_cancelled() {
            return Ok(true);
        }
        let parking = self.ctx.parking.clone();
        let notified = parking.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let gate = &self.ctx.gate;
        match parking.on_idle(|| gate.mode() == RunMode::Paused) {
            Idle::Work => Ok(true),
            Idle::Done(released) => {
                for task in released {
                    self.emit_failure(task).await?;
                }
                Ok(false)
            }
            Idle::Wait => {
                tokio::select! {
                    _ = &mut notified => {}
                    _ = self.ctx.shutdown.cancelled() => {}
                    _ = tokio::time::sleep(IDLE_RECHECK) => {}
                }
                parking.leave_idle();
                Ok(true)
            }
        }
    }

    async fn emit_failure(&mut self, task: UrlTask) -> Result<()> {
        log_failure(&task);
        self.ctx.results.submit(task.into_failure()).await?;
        self.stats.completed += 1;
        Ok(())
    }

    async fn process(&mut self, mut task: UrlTask) -> TaskEnd {
        loop {
            if !self.sleep(self.ctx.pacing.next_delay()).await {
                return TaskEnd::Abandoned;
            }
            if self.ctx.gate.wait().await == GateDecision::Shutdown {
                return TaskEnd::Abandoned;
            }

            let attempt = task.current_attempt();
            let Some((outcome, success)) = self.attempt(&task).await else {
                return TaskEnd::Abandoned;
            };

            // The coordinator may be gone after an abort; nothing to do then
            self.ctx.parking.outcome_sent();
            let _ = self.ctx.outcomes.send(outcome.clone());
            task.record_attempt(outcome.clone());
            self.stats.attempts += 1;

            if let Some((final_url, status, detection)) = success {
                if task.variation_index > 0 {
                    tracing::info!(
                        url = %task.original_url,
                        variation = %task.normalized_url,
                        "Succeeded with URL variation"
                    );
                }
                return TaskEnd::Done(task.into_success(final_url, status, detection));
            }

            let decision = self.ctx.policy.decide(attempt, &outcome);
            self.log_decision(&task, &outcome, decision);

            match task.advance(
                decision,
                self.ctx.variations.enabled,
                self.ctx.variations.max_variations,
            ) {
                Step::Retry(delay) => {
                    if !self.sleep(delay).await {
                        return TaskEnd::Abandoned;
                    }
                }
                Step::NextForm { cooldown } => {
                    if let Some(cooldown) = cooldown {
                        if !self.sleep(cooldown).await {
                            return TaskEnd::Abandoned;
                        }
                    }
                    tracing::info!(
                        url = %task.original_url,
                        variation = %task.normalized_url,
                        index = task.variation_index,
                        "Trying URL variation"
                    );
                }
                Step::Exhausted => {
                    if outcome.status_class.is_blocking_signal()
                        && task.block_retries() == 0
                        && self.ctx.parking.is_enabled()
                        && !self.ctx.shutdown.is_cancelled()
                    {
                        return TaskEnd::Held(task);
                    }

                    log_failure(&task);
                    return TaskEnd::Done(task.into_failure());
                }
            }
        }
    }

    /// Makes one network attempt under a domain permit
    ///
    /// Returns `None` only if shutdown arrives while waiting for the permit.
    async fn attempt(
        &self,
        task: &UrlTask,
    ) -> Option<(AttemptOutcome, Option<(String, u16, Detection)>)> {
        let url = task.normalized_url.clone();
        let domain = task.domain();

        let _permit = tokio::select! {
            permit = self.ctx.limiter.acquire(&domain) => permit,
            _ = self.ctx.shutdown.cancelled() => return None,
        };

        let fetched = self.ctx.fetcher.fetch(&url).await;

        let outcome = |class, status, detail| {
            AttemptOutcome::new(&task.original_url, &url, &domain, class, status, detail)
        };

        let result = match fetched {
            Ok(page) => {
                let class = StatusClass::from_http_status(page.status);
                if class != StatusClass::Success {
                    (outcome(class, Some(page.status), None), None)
                } else {
                    match self.ctx.detector.detect(&page) {
                        Ok(detection) => (
                            outcome(class, Some(page.status), None),
                            Some((page.final_url, page.status, detection)),
                        ),
                        Err(e) => (
                            outcome(
                                StatusClass::PermanentError,
                                Some(page.status),
                                Some(format!("detection failed: {}", e)),
                            ),
                            None,
                        ),
                    }
                }
            }
            Err(e) => (outcome(e.status_class(), None, Some(e.to_string())), None),
        };

        Some(result)
    }

    fn log_decision(&self, task: &UrlTask, outcome: &AttemptOutcome, decision: RetryDecision) {
        match (outcome.status_class, decision) {
            (_, RetryDecision::Retry(delay)) => tracing::debug!(
                url = %task.normalized_url,
                attempt = task.current_attempt(),
                outcome = %outcome.describe(),
                "Retrying in {:?}",
                delay
            ),
            (StatusClass::RateLimited, RetryDecision::VariationFallback(delay)) => {
                tracing::warn!(
                    url = %task.normalized_url,
                    domain = %outcome.domain,
                    "Rate limited; backing off {:?} before moving on",
                    delay
                )
            }
            (StatusClass::Forbidden, _) => tracing::info!(
                url = %task.normalized_url,
                "Forbidden; giving up on this URL form"
            ),
            (_, _) => tracing::debug!(
                url = %task.normalized_url,
                outcome = %outcome.describe(),
                "Giving up on this URL form"
            ),
        }
    }

    /// Sleeps unless shutdown arrives first; returns false on shutdown
    async fn sleep(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.ctx.shutdown.is_cancelled();
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.ctx.shutdown.cancelled() => false,
        }
    }
}

fn log_failure(task: &UrlTask) {
    let reason = task
        .last_outcome()
        .map(|outcome| outcome.describe())
        .unwrap_or_default();
    tracing::info!(
        url = %task.original_url,
        reason = %reason,
        attempts = task.total_attempts(),
        "URL failed"
    );
}
