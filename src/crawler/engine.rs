//! Crawl engine
//!
//! Wires the task source, worker pool, coordinator, and result sink
//! together and runs them to completion:
//!
//! ```text
//! TaskSource -> Worker x N -> ResultSender -> ResultSink -> {sinks, checkpoint}
//!                   |
//!                   +-> outcomes -> Coordinator -> pause signal -> Workers
//!                   |                      |
//!                   +-> held tasks ---> ParkingLot -> restarted tasks -> Workers
//! ```

use crate::config::{BlockAction, Config};
use crate::control::{
    command_channel, BlockReport, ControlCommand, Coordinator, CoordinatorHandle,
    CoordinatorReport, ParkingLot, RETRY_CANDIDATES,
};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::limiter::DomainLimiter;
use crate::crawler::retry::RetryPolicy;
use crate::crawler::source::TaskSource;
use crate::crawler::worker::{Pacing, Worker, WorkerContext, WorkerStats};
use crate::detect::Detector;
use crate::output::{result_channel, ProgressSnapshot, ProgressTracker, ResultSink, Sink};
use crate::storage::CheckpointStore;
use crate::{CrawlError, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// What happened during one run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Lines in the input, before dedup
    pub total_input: usize,
    pub duplicates: usize,
    /// Already in the checkpoint
    pub skipped: usize,
    /// Tasks this run set out to process
    pub scheduled: usize,
    /// Results persisted this run
    pub progress: ProgressSnapshot,
    /// Network attempts made across all workers
    pub attempts: u64,
    /// Tasks dropped mid-flight or still held at shutdown
    pub abandoned: u64,
    /// Blocked tasks restarted after a pause
    pub retried: usize,
    /// Tasks never started
    pub remaining: usize,
    /// True if the run stopped before draining its input
    pub interrupted: bool,
    pub blocks: Vec<BlockReport>,
    pub pauses: u32,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn succeeded(&self) -> u64 {
        self.progress.succeeded
    }

    pub fn failed(&self) -> u64 {
        self.progress.failed
    }

    pub fn completed(&self) -> u64 {
        self.progress.completed
    }
}

/// A configured crawl, ready to run once
pub struct Crawler {
    config: Config,
    fetcher: Arc<dyn Fetcher>,
    detector: Arc<dyn Detector>,
    successes: Box<dyn Sink>,
    failures: Box<dyn Sink>,
    checkpoint: Box<dyn CheckpointStore>,
    shutdown: CancellationToken,
    handle: CoordinatorHandle,
    commands: mpsc::UnboundedReceiver<ControlCommand>,
}

impl Crawler {
    pub fn new(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        detector: Arc<dyn Detector>,
        successes: Box<dyn Sink>,
        failures: Box<dyn Sink>,
        checkpoint: Box<dyn CheckpointStore>,
    ) -> Self {
        let (handle, commands) = command_channel();
        Self {
            config,
            fetcher,
            detector,
            successes,
            failures,
            checkpoint,
            shutdown: CancellationToken::new(),
            handle,
            commands,
        }
    }

    /// Uses `token` as the run's shutdown signal
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Handle for resolving pauses from outside the run
    pub fn handle(&self) -> CoordinatorHandle {
        self.handle.clone()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Processes `urls` minus the checkpoint until done or stopped
    ///
    /// # Arguments
    ///
    /// * `urls` - Input URLs in order; duplicates and checkpointed entries
    ///   are skipped
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - The run drained its input or was interrupted;
    ///   see [`RunSummary::interrupted`]
    /// * `Err(CrawlError)` - A fatal condition: checkpoint or sink failure,
    ///   an abort on block detection, or a crashed worker
    pub async fn run(self, urls: Vec<String>) -> Result<RunSummary> {
        let started = Instant::now();
        let Self {
            config,
            fetcher,
            detector,
            successes,
            failures,
            checkpoint,
            shutdown,
            handle,
            commands,
        } = self;
        // Only handles given out before the run can resolve a pause
        drop(handle);

        let completed = checkpoint.load()?;
        let source = Arc::new(TaskSource::new(urls, &completed));
        let scheduled = source.remaining();

        tracing::info!(
            "Input: {} URL(s), {} duplicate(s), {} already checkpointed, {} to process",
            source.total_input(),
            source.duplicates(),
            source.skipped(),
            scheduled
        );

        let pool_size = config.crawler.concurrency.min(scheduled).max(1);
        let parking = Arc::new(
            if config.block_detection.enabled && config.block_detection.action == BlockAction::Pause
            {
                ParkingLot::new(RETRY_CANDIDATES, pool_size)
            } else {
                ParkingLot::disabled()
            },
        );

        let (coordinator, plane) = Coordinator::new(
            config.block_detection.clone(),
            config.crawler.pause_wait_timeout(),
            parking.clone(),
            commands,
            shutdown.clone(),
        );
        let coordinator_task = tokio::spawn(coordinator.run());

        let (results, results_rx) = result_channel(
            config.crawler.queue_capacity(),
            config.crawler.enqueue_timeout(),
        );
        let sink = ResultSink::new(
            results_rx,
            successes,
            failures,
            checkpoint,
            ProgressTracker::new(
                scheduled as u64,
                config.output.progress_interval,
                config.output.progress_style,
            ),
            config.output.health_check_interval(),
            shutdown.clone(),
        );
        let sink_task = tokio::spawn(sink.run());

        let ctx = WorkerContext {
            source: source.clone(),
            fetcher,
            detector,
            limiter: Arc::new(DomainLimiter::new(
                config.crawler.max_per_domain,
                config.crawler.permit_timeout(),
            )),
            policy: RetryPolicy::new(&config.retry),
            variations: config.variations.clone(),
            pacing: Pacing::new(&config.crawler),
            gate: plane.gate,
            parking: parking.clone(),
            outcomes: plane.outcomes,
            results,
            shutdown: shutdown.clone(),
        };

        tracing::info!("Starting {} worker(s)", pool_size);

        let mut workers = JoinSet::new();
        for id in 0..pool_size {
            workers.spawn(Worker::new(id, ctx.clone()).run());
        }
        // Workers hold the only remaining senders
        drop(ctx);

        let mut totals = WorkerStats::default();
        let mut worker_error = None;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(stats)) => {
                    totals.completed += stats.completed;
                    totals.abandoned += stats.abandoned;
                    totals.attempts += stats.attempts;
                }
                Ok(Err(e)) => {
                    if !matches!(e, CrawlError::SinkClosed) {
                        tracing::error!("Worker stopped: {}", e);
                    }
                    shutdown.cancel();
                    worker_error.get_or_insert(e);
                }
                Err(e) => {
                    tracing::error!("Worker crashed: {}", e);
                    shutdown.cancel();
                    worker_error.get_or_insert(CrawlError::Worker(e.to_string()));
                }
            }
        }

        let sink_result = sink_task
            .await
            .map_err(|e| CrawlError::Worker(format!("result sink crashed: {}", e)))?;
        let coordinator_report = match coordinator_task.await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Coordinator crashed: {}", e);
                worker_error.get_or_insert(CrawlError::Worker(e.to_string()));
                CoordinatorReport::default()
            }
        };
        let progress = sink_result?;
        if let Some(reason) = coordinator_report.aborted {
            return Err(CrawlError::Aborted(reason));
        }
        if let Some(e) = worker_error {
            return Err(e);
        }

        let summary = RunSummary {
            total_input: source.total_input(),
            duplicates: source.duplicates(),
            skipped: source.skipped(),
            scheduled,
            progress,
            attempts: totals.attempts,
            abandoned: totals.abandoned + parking.held() as u64,
            retried: coordinator_report.retried,
            remaining: source.remaining(),
            interrupted: shutdown.is_cancelled(),
            blocks: coordinator_report.blocks,
            pauses: coordinator_report.pauses,
            elapsed: started.elapsed(),
        };

        if summary.interrupted {
            tracing::warn!(
                "Run interrupted: {} result(s) saved, {} URL(s) left for the next run",
                summary.completed(),
                summary.remaining + summary.abandoned as usize
            );
        }

        Ok(summary)
    }
}
