//! Bounded result queue and its single consumer
//!
//! Workers submit terminal results through a [`ResultSender`]. One
//! [`ResultSink`] task drains the queue regardless of the pause signal, so a
//! paused crawl can never leave workers blocked on a full queue. For every
//! result it writes the record to the success or failure sink, then appends
//! the checkpoint. Any write failure or failed health probe stops the run.

use crate::output::stats::{ProgressSnapshot, ProgressTracker};
use crate::output::traits::Sink;
use crate::state::UrlResult;
use crate::storage::{CheckpointStore, RunStatus};
use crate::{CrawlError, Result};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio_util::sync::CancellationToken;

/// Worker-side handle to the result queue
#[derive(Debug, Clone)]
pub struct ResultSender {
    tx: mpsc::Sender<UrlResult>,
    enqueue_timeout: Duration,
}

impl ResultSender {
    /// Enqueues a result
    ///
    /// Each wait is bounded by the enqueue timeout; a slow consumer is logged
    /// and waited on again. Fails only once the consumer has stopped.
    pub async fn submit(&self, result: UrlResult) -> Result<()> {
        let mut pending = result;
        loop {
            match self.tx.send_timeout(pending, self.enqueue_timeout).await {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(back)) => {
                    tracing::warn!(
                        "Result queue full for {:?} (url = {}); still waiting",
                        self.enqueue_timeout,
                        back.original_url
                    );
                    pending = back;
                }
                Err(SendTimeoutError::Closed(_)) => return Err(CrawlError::SinkClosed),
            }
        }
    }
}

/// Creates the bounded queue
pub fn result_channel(
    capacity: usize,
    enqueue_timeout: Duration,
) -> (ResultSender, mpsc::Receiver<UrlResult>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        ResultSender {
            tx,
            enqueue_timeout,
        },
        rx,
    )
}

/// Single consumer of the result queue
pub struct ResultSink {
    rx: mpsc::Receiver<UrlResult>,
    successes: Box<dyn Sink>,
    failures: Box<dyn Sink>,
    checkpoint: Box<dyn CheckpointStore>,
    progress: ProgressTracker,
    health_interval: Duration,
    shutdown: CancellationToken,
}

impl ResultSink {
    pub fn new(
        rx: mpsc::Receiver<UrlResult>,
        successes: Box<dyn Sink>,
        failures: Box<dyn Sink>,
        checkpoint: Box<dyn CheckpointStore>,
        progress: ProgressTracker,
        health_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            rx,
            successes,
            failures,
            checkpoint,
            progress,
            health_interval,
            shutdown,
        }
    }

    /// Drains the queue until every sender is gone
    ///
    /// On a fatal error the shutdown token is cancelled and the queue closed,
    /// which stops task admission and fails pending submits.
    pub async fn run(mut self) -> Result<ProgressSnapshot> {
        tracing::debug!(
            "Writing successes to {}, failures to {}",
            self.successes.describe(),
            self.failures.describe()
        );

        let mut health = tokio::time::interval(self.health_interval);
        health.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        health.tick().await;

        loop {
            tokio::select! {
                biased;
                received = self.rx.recv() => match received {
                    Some(result) => {
                        if let Err(e) = self.persist(&result) {
                            return Err(self.fail(e));
                        }
                    }
                    None => break,
                },
                _ = health.tick() => {
                    if let Err(e) = self.check_health() {
                        return Err(self.fail(e));
                    }
                }
            }
        }

        let status = if self.shutdown.is_cancelled() {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };
        self.successes.finish(status)?;
        self.failures.finish(status)?;

        self.progress.log();
        Ok(self.progress.snapshot())
    }

    /// Record first, checkpoint second
    fn persist(&mut self, result: &UrlResult) -> Result<()> {
        let sink = if result.success {
            &mut self.successes
        } else {
            &mut self.failures
        };
        sink.write(result)?;
        self.checkpoint.append(&result.original_url)?;
        self.progress.record(result);
        Ok(())
    }

    fn check_health(&mut self) -> Result<()> {
        if !self.successes.healthy() {
            return Err(CrawlError::SinkUnhealthy(self.successes.describe()));
        }
        if !self.failures.healthy() {
            return Err(CrawlError::SinkUnhealthy(self.failures.describe()));
        }
        Ok(())
    }

    fn fail(&mut self, error: CrawlError) -> CrawlError {
        tracing::error!("Result sink failed, stopping the run: {}", error);
        self.shutdown.cancel();
        self.rx.close();

        // Best effort; the original error is what gets reported
        let _ = self.successes.finish(RunStatus::Failed);
        let _ = self.failures.finish(RunStatus::Failed);
        error
    }
}
