//! Blocked failures held back until a pause can resolve them
//!
//! While block detection may pause the run, a task that exhausts every URL
//! form on a blocking signal is parked here instead of being emitted. When a
//! pause resolves, parked tasks whose URL is a retry candidate are restarted
//! and handed back to the workers; the rest become ready to emit as
//! failures. Nothing parked has been written or checkpointed yet, so every
//! task still ends in exactly one result.
//!
//! Parked tasks are also released when the lot overflows (oldest first) and
//! when every worker has run out of input with no pause in progress. The
//! last check only counts once the coordinator has seen every outcome sent,
//! so a pause that is about to start cannot be missed.

use crate::state::UrlTask;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::futures::Notified;
use tokio::sync::Notify;

/// What an idle worker should do next
#[derive(Debug)]
pub enum Idle {
    /// Restarted or expired tasks are waiting
    Work,

    /// Wait for a pause to resolve or other workers to go idle
    Wait,

    /// Nothing can come back; emit these as failures and stop
    Done(Vec<UrlTask>),
}

#[derive(Debug, Default)]
struct LotState {
    parked: VecDeque<UrlTask>,
    restarted: VecDeque<UrlTask>,
    expired: Vec<UrlTask>,
    idle: usize,
    active: usize,
}

#[derive(Debug)]
pub struct ParkingLot {
    capacity: usize,
    state: Mutex<LotState>,
    notify: Notify,
    sent: AtomicU64,
    seen: AtomicU64,
}

impl ParkingLot {
    /// Creates a lot holding up to `capacity` tasks for a pool of `workers`
    pub fn new(capacity: usize, workers: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(LotState {
                active: workers.max(1),
                ..LotState::default()
            }),
            notify: Notify::new(),
            sent: AtomicU64::new(0),
            seen: AtomicU64::new(0),
        }
    }

    /// A lot that never holds anything
    pub fn disabled() -> Self {
        Self::new(0, 1)
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    /// Holds `task` back; returns a task that must be emitted now
    ///
    /// That is the oldest parked task on overflow, or `task` itself when
    /// the lot is disabled.
    pub fn park(&self, task: UrlTask) -> Option<UrlTask> {
        if !self.is_enabled() {
            return Some(task);
        }
        let mut state = self.lock();
        state.parked.push_back(task);
        if state.parked.len() > self.capacity {
            state.parked.pop_front()
        } else {
            None
        }
    }

    pub fn parked(&self) -> usize {
        self.lock().parked.len()
    }

    /// Settles every parked task once a pause resolves
    ///
    /// Tasks whose original URL is in `retry` are restarted from their
    /// original form; the others expire. Returns the number restarted.
    pub fn resolve(&self, retry: &HashSet<String>) -> usize {
        let mut state = self.lock();
        let parked = std::mem::take(&mut state.parked);
        let mut restarted = 0;

        for mut task in parked {
            if retry.contains(&task.original_url) {
                task.restart();
                state.restarted.push_back(task);
                restarted += 1;
            } else {
                state.expired.push(task);
            }
        }

        drop(state);
        self.notify.notify_waiters();
        restarted
    }

    /// Next restarted task, ahead of fresh input
    pub fn take_restarted(&self) -> Option<UrlTask> {
        self.lock().restarted.pop_front()
    }

    /// Tasks that expired at the last resolution
    pub fn take_expired(&self) -> Vec<UrlTask> {
        std::mem::take(&mut self.lock().expired)
    }

    /// Tasks still held in any state; they re-run on the next run
    pub fn held(&self) -> usize {
        let state = self.lock();
        state.parked.len() + state.restarted.len() + state.expired.len()
    }

    /// Counts an outcome a worker is about to hand to the coordinator
    pub fn outcome_sent(&self) {
        self.sent.fetch_add(1, Ordering::SeqCst);
    }

    /// Counts an outcome the coordinator has acted on
    ///
    /// Call after publishing any pause the outcome caused.
    pub fn outcome_seen(&self) {
        let seen = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
        if seen >= self.sent.load(Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    fn settled(&self) -> bool {
        self.seen.load(Ordering::SeqCst) >= self.sent.load(Ordering::SeqCst)
    }

    /// Registers for the next wake-up; enable it before calling [`on_idle`]
    ///
    /// [`on_idle`]: ParkingLot::on_idle
    pub fn notified(&self) -> Notified<'_> {
        self.notify.notified()
    }

    /// Called by a worker that found the input drained
    ///
    /// The last active worker to go idle releases whatever is still parked,
    /// unless `is_paused` reports a pause that may still restart it. A
    /// `Wait` must be paired with [`leave_idle`](ParkingLot::leave_idle);
    /// after `Done` the worker no longer counts as active.
    pub fn on_idle(&self, is_paused: impl FnOnce() -> bool) -> Idle {
        let mut state = self.lock();
        if !state.restarted.is_empty() || !state.expired.is_empty() {
            return Idle::Work;
        }
        if state.parked.is_empty() {
            state.active = state.active.saturating_sub(1);
            return Idle::Done(Vec::new());
        }
        if state.idle + 1 >= state.active && self.settled() && !is_paused() {
            let released: Vec<UrlTask> = state.parked.drain(..).collect();
            state.active = state.active.saturating_sub(1);
            drop(state);
            self.notify.notify_waiters();
            return Idle::Done(released);
        }
        state.idle += 1;
        Idle::Wait
    }

    pub fn leave_idle(&self) {
        let mut state = self.lock();
        state.idle = state.idle.saturating_sub(1);
    }

    fn lock(&self) -> MutexGuard<'_, LotState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
