//! Process-wide pause signal
//!
//! A tri-state published on a `watch` channel. The [`PauseController`] is the
//! only writer and lives inside the coordinator; workers hold read-only
//! [`PauseGate`]s and consult them before every network attempt.

use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Running,
    Paused,
    ShuttingDown,
}

/// Value carried by the signal
#[derive(Debug, Clone)]
pub struct ControlState {
    pub mode: RunMode,

    /// Incremented on every transition
    pub generation: u64,
}

/// What a worker may do after consulting the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    Shutdown,
}

/// Sole writer of the pause signal
///
/// Dropping the controller while paused flips the signal back to running,
/// so workers are never left parked by a coordinator that went away.
#[derive(Debug)]
pub struct PauseController {
    tx: watch::Sender<ControlState>,
    wait_timeout: Duration,
}

impl PauseController {
    /// Creates a controller in the running state
    ///
    /// `wait_timeout` bounds each individual wait a gate performs.
    pub fn new(wait_timeout: Duration) -> Self {
        let (tx, _rx) = watch::channel(ControlState {
            mode: RunMode::Running,
            generation: 0,
        });
        Self { tx, wait_timeout }
    }

    pub fn gate(&self) -> PauseGate {
        PauseGate {
            rx: self.tx.subscribe(),
            wait_timeout: self.wait_timeout,
        }
    }

    pub fn mode(&self) -> RunMode {
        self.tx.borrow().mode
    }

    pub fn pause(&self) {
        self.transition(RunMode::Paused);
    }

    pub fn resume(&self) {
        self.transition(RunMode::Running);
    }

    pub fn shut_down(&self) {
        self.transition(RunMode::ShuttingDown);
    }

    fn transition(&self, mode: RunMode) {
        self.tx.send_modify(|state| {
            // Shutdown is terminal
            if state.mode == RunMode::ShuttingDown {
                return;
            }
            state.mode = mode;
            state.generation += 1;
        });
    }
}

impl Drop for PauseController {
    fn drop(&mut self) {
        if self.mode() == RunMode::Paused {
            tracing::warn!("Coordinator exited while paused; releasing workers");
            self.resume();
        }
    }
}

/// Read-only view of the pause signal held by a worker
#[derive(Debug, Clone)]
pub struct PauseGate {
    rx: watch::Receiver<ControlState>,
    wait_timeout: Duration,
}

impl PauseGate {
    pub fn mode(&self) -> RunMode {
        self.rx.borrow().mode
    }

    /// Waits until the signal allows a new network attempt
    ///
    /// Each wait is bounded; on timeout the worker logs and checks again. It
    /// never resumes the system itself.
    pub async fn wait(&mut self) -> GateDecision {
        loop {
            let mode = self.rx.borrow_and_update().mode;
            match mode {
                RunMode::Running => return GateDecision::Proceed,
                RunMode::ShuttingDown => return GateDecision::Shutdown,
                RunMode::Paused => {}
            }

            match tokio::time::timeout(self.wait_timeout, self.rx.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) => {
                    // Writer is gone; its last word is final
                    return match self.rx.borrow().mode {
                        RunMode::Running => GateDecision::Proceed,
                        _ => GateDecision::Shutdown,
                    };
                }
                Err(_) => {
                    tracing::warn!(
                        "Still paused after waiting {:?}; checking again",
                        self.wait_timeout
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_running_gate_proceeds() {
        let controller = PauseController::new(Duration::from_secs(1));
        let mut gate = controller.gate();
        assert_eq!(gate.wait().await, GateDecision::Proceed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_gate_waits_for_resume() {
        let controller = PauseController::new(Duration::from_secs(1));
        controller.pause();
        let mut gate = controller.gate();

        let waiter = tokio::spawn(async move { gate.wait().await });

        // Several wait timeouts elapse without the worker resuming itself
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!waiter.is_finished());
        assert_eq!(controller.mode(), RunMode::Paused);

        controller.resume();
        assert_eq!(waiter.await.unwrap(), GateDecision::Proceed);
    }

    #[tokio::test]
    async fn test_shutdown_is_terminal() {
        let controller = PauseController::new(Duration::from_secs(1));
        controller.shut_down();
        controller.resume();

        assert_eq!(controller.mode(), RunMode::ShuttingDown);
        assert_eq!(controller.gate().wait().await, GateDecision::Shutdown);
    }

    #[tokio::test]
    async fn test_drop_while_paused_releases_workers() {
        let controller = PauseController::new(Duration::from_secs(60));
        controller.pause();
        let mut gate = controller.gate();

        let waiter = tokio::spawn(async move { gate.wait().await });
        drop(controller);

        assert_eq!(waiter.await.unwrap(), GateDecision::Proceed);
    }

    #[test]
    fn test_each_transition_bumps_generation() {
        let controller = PauseController::new(Duration::from_secs(1));
        controller.pause();
        controller.resume();
        assert_eq!(controller.tx.borrow().generation, 2);

        controller.shut_down();
        controller.pause();
        assert_eq!(controller.tx.borrow().generation, 3);
    }
}
