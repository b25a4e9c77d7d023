//! Block-detection coordinator
//!
//! The coordinator is the single consumer of attempt outcomes and the only
//! party that changes the pause signal. It reacts to a detected block by
//! pausing, warning, or aborting, depending on configuration. Resolving a
//! pause settles the tasks held in the [`ParkingLot`].

use crate::config::{BlockAction, BlockDetectionConfig};
use crate::control::block_detector::{BlockDetector, BlockReport};
use crate::control::parking::ParkingLot;
use crate::control::pause::{PauseController, PauseGate};
use crate::state::AttemptOutcome;
use std::collections::HashSet;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// External decisions that resolve a pause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Resume,
    /// Resume and give recently blocked URLs one fresh attempt
    ResumeAndRetry,
    Abort,
}

/// Cloneable sender for [`ControlCommand`]s
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<ControlCommand>,
}

impl CoordinatorHandle {
    /// Sends a command; returns false once the coordinator is gone
    pub fn send(&self, command: ControlCommand) -> bool {
        self.tx.send(command).is_ok()
    }

    pub fn resume(&self) -> bool {
        self.send(ControlCommand::Resume)
    }

    pub fn resume_and_retry(&self) -> bool {
        self.send(ControlCommand::ResumeAndRetry)
    }

    pub fn abort(&self) -> bool {
        self.send(ControlCommand::Abort)
    }
}

/// Creates the command channel ahead of the coordinator
pub fn command_channel() -> (CoordinatorHandle, mpsc::UnboundedReceiver<ControlCommand>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CoordinatorHandle { tx }, rx)
}

/// What the coordinator saw during the run
#[derive(Debug, Clone, Default)]
pub struct CoordinatorReport {
    pub outcomes: u64,
    pub blocks: Vec<BlockReport>,
    pub pauses: u32,
    pub auto_resumes: u32,
    /// Held tasks restarted after a pause
    pub retried: usize,
    /// Set when the run was aborted on block detection
    pub aborted: Option<String>,
}

enum Flow {
    Continue,
    Stop,
}

pub struct Coordinator {
    config: BlockDetectionConfig,
    detector: BlockDetector,
    controller: PauseController,
    parking: Arc<ParkingLot>,
    outcomes: mpsc::UnboundedReceiver<AttemptOutcome>,
    commands: mpsc::UnboundedReceiver<ControlCommand>,
    commands_open: bool,
    shutdown: CancellationToken,
    report: CoordinatorReport,
}

/// Worker-facing ends of the control plane
pub struct ControlPlane {
    pub outcomes: mpsc::UnboundedSender<AttemptOutcome>,
    pub gate: PauseGate,
}

impl Coordinator {
    pub fn new(
        config: BlockDetectionConfig,
        pause_wait_timeout: Duration,
        parking: Arc<ParkingLot>,
        commands: mpsc::UnboundedReceiver<ControlCommand>,
        shutdown: CancellationToken,
    ) -> (Self, ControlPlane) {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let controller = PauseController::new(pause_wait_timeout);
        let gate = controller.gate();

        let coordinator = Self {
            detector: BlockDetector::new(&config),
            config,
            controller,
            parking,
            outcomes: outcome_rx,
            commands,
            commands_open: true,
            shutdown,
            report: CoordinatorReport::default(),
        };

        (
            coordinator,
            ControlPlane {
                outcomes: outcome_tx,
                gate,
            },
        )
    }

    /// Runs until every outcome sender is gone or the run is shut down
    pub async fn run(mut self) -> CoordinatorReport {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    self.controller.shut_down();
                    break;
                }
                outcome = self.outcomes.recv() => match outcome {
                    Some(outcome) => {
                        if let Flow::Stop = self.ingest(outcome).await {
                            break;
                        }
                    }
                    None => break,
                },
                command = self.commands.recv(), if self.commands_open => match command {
                    Some(ControlCommand::Abort) => {
                        self.abort("abort requested".to_string());
                        break;
                    }
                    Some(other) => tracing::debug!("Ignoring {:?}; the crawl is not paused", other),
                    None => self.commands_open = false,
                },
            }
        }

        tracing::debug!(
            "Coordinator finished after {} outcome(s), {} pause(s)",
            self.report.outcomes,
            self.report.pauses
        );
        self.report
        // controller drops here; a lingering pause is released
    }

    async fn ingest(&mut self, outcome: AttemptOutcome) -> Flow {
        self.report.outcomes += 1;
        if !self.config.enabled {
            self.parking.outcome_seen();
            return Flow::Continue;
        }

        self.detector.record(&outcome);
        if !self.detector.should_pause() {
            self.parking.outcome_seen();
            return Flow::Continue;
        }

        let block = self.detector.report();
        self.report.blocks.push(block.clone());

        match self.config.action {
            BlockAction::Warn => {
                tracing::warn!("Possible blocking detected: {}; continuing", block.summary());
                self.detector.reset();
                self.parking.outcome_seen();
                Flow::Continue
            }
            BlockAction::Abort => {
                tracing::error!("Blocking detected: {}; aborting run", block.summary());
                self.abort(block.summary());
                self.parking.outcome_seen();
                Flow::Stop
            }
            BlockAction::Pause => self.pause(block).await,
        }
    }

    fn abort(&mut self, reason: String) {
        self.report.aborted = Some(reason);
        self.controller.shut_down();
        self.shutdown.cancel();
    }

    /// Holds the pause until a command, the auto-resume timeout, or shutdown
    async fn pause(&mut self, block: BlockReport) -> Flow {
        self.controller.pause();
        self.parking.outcome_seen();
        self.report.pauses += 1;

        tracing::warn!("Blocking detected: {}", block.summary());
        for domain in &block.affected_domains {
            tracing::warn!(
                "  {}: {}/{} blocked",
                domain.domain,
                domain.blocking,
                domain.total
            );
        }

        let auto_resume = self.config.auto_resume_timeout();
        match auto_resume {
            Some(timeout) => tracing::warn!(
                "Workers paused. Type 'resume', 'retry' ({} candidate(s)) or 'abort'; \
                 auto-resuming in {:?}",
                block.retry_candidates,
                timeout
            ),
            None => tracing::warn!(
                "Workers paused. Type 'resume', 'retry' ({} candidate(s)) or 'abort'",
                block.retry_candidates
            ),
        }

        let deadline = auto_resume.map(|timeout| Instant::now() + timeout);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    self.controller.shut_down();
                    return Flow::Stop;
                }
                command = self.commands.recv(), if self.commands_open => match command {
                    Some(ControlCommand::Resume) => {
                        self.resume(false);
                        return Flow::Continue;
                    }
                    Some(ControlCommand::ResumeAndRetry) => {
                        self.resume(true);
                        return Flow::Continue;
                    }
                    Some(ControlCommand::Abort) => {
                        tracing::error!("Abort requested while paused");
                        self.abort(block.summary());
                        return Flow::Stop;
                    }
                    None => {
                        self.commands_open = false;
                        if deadline.is_none() {
                            tracing::warn!("No resume signal can arrive anymore; resuming");
                            self.resume(self.config.retry_failed);
                            return Flow::Continue;
                        }
                    }
                },
                _ = wait_until(deadline) => {
                    tracing::warn!(
                        "No decision within {:?}; auto-resuming",
                        auto_resume.unwrap_or_default()
                    );
                    self.report.auto_resumes += 1;
                    self.resume(self.config.retry_failed);
                    return Flow::Continue;
                }
                outcome = self.outcomes.recv() => match outcome {
                    // In-flight attempts still report while paused
                    Some(outcome) => {
                        self.report.outcomes += 1;
                        self.detector.record(&outcome);
                        self.parking.outcome_seen();
                    }
                    None => return Flow::Stop,
                },
            }
        }
    }

    fn resume(&mut self, retry: bool) {
        let candidates: HashSet<String> = if retry {
            let candidates = self.detector.retry_candidates().into_iter().collect();
            self.detector.clear_retry_candidates();
            candidates
        } else {
            HashSet::new()
        };

        self.detector.reset();
        let held = self.parking.parked();
        let restarted = self.parking.resolve(&candidates);
        self.report.retried += restarted;
        if retry {
            tracing::info!(
                "Resuming; {} of {} held URL(s) get a fresh attempt",
                restarted,
                held
            );
        } else {
            tracing::info!("Resuming; {} held URL(s) recorded as failed", held);
        }
        self.controller.resume();
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}
