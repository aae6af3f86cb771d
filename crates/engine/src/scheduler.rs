// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time-ordered activity queue with a single dispatch loop.
//!
//! The dispatch loop pops due activities in (due, insertion) order and hands
//! each to a worker task. It never awaits a script: an activity whose agent
//! is busy is dropped, and its periodic successor is re-armed from the time
//! of the skipped firing.

use crate::activity::Activity;
use ag_core::InstanceId;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("scheduler is shut down")]
    ShutDown,
    #[error("scheduler is already started")]
    AlreadyStarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Running,
    Paused,
    Shutdown,
}

ag_core::simple_display! {
    SchedulerState {
        Running => "running",
        Paused => "paused",
        Shutdown => "shutdown",
    }
}

/// What happened when a handler performed an activity.
#[derive(Debug)]
pub enum Outcome {
    /// The activity ran; `next` is its periodic successor, if any
    Ran { next: Option<Activity> },
    /// The activity was stale or its agent disabled
    NoOp,
}

/// Runs activities on behalf of the scheduler.
#[async_trait]
pub trait ActivityHandler: Send + Sync + 'static {
    async fn perform(&self, activity: &Activity) -> Outcome;

    /// Called instead of `perform` when the agent was busy at dispatch.
    fn skipped(&self, activity: &Activity) -> Option<Activity>;
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Upper bound on activities running at once
    pub max_workers: usize,
    /// Completed activities kept for inspection
    pub completed_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_workers: 16, completed_capacity: 1024 }
    }
}

/// An activity that ran to completion.
#[derive(Debug, Clone)]
pub struct CompletedActivity {
    pub instance: InstanceId,
    pub description: String,
    pub due: Instant,
    pub started: Instant,
    pub finished: Instant,
}

struct Queued {
    seq: u64,
    activity: Activity,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so the max-heap yields the earliest due, then the earliest added.
impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        other.activity.due.cmp(&self.activity.due).then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Shared {
    queue: Mutex<BinaryHeap<Queued>>,
    completed: Mutex<VecDeque<CompletedActivity>>,
    completed_total: AtomicU64,
    skipped_total: AtomicU64,
    next_seq: AtomicU64,
    /// Popped from the queue and not yet finished
    in_flight: AtomicUsize,
    /// Queue changed
    wakeup: Notify,
    /// An activity finished
    progress: Notify,
    state: watch::Sender<SchedulerState>,
    workers: TaskTracker,
    permits: Arc<Semaphore>,
    config: SchedulerConfig,
}

impl Shared {
    fn push(&self, activity: Activity) -> Result<(), SchedulerError> {
        if *self.state.borrow() == SchedulerState::Shutdown {
            return Err(SchedulerError::ShutDown);
        }
        let seq = self.next_seq.fetch_add(1, AtomicOrdering::Relaxed);
        self.queue.lock().push(Queued { seq, activity });
        self.wakeup.notify_one();
        Ok(())
    }

    /// Pop the earliest activity if it is due, counting it as in flight.
    fn pop_due(&self, now: Instant) -> Option<Activity> {
        let mut queue = self.queue.lock();
        if queue.peek().is_some_and(|q| q.activity.due <= now) {
            self.in_flight.fetch_add(1, AtomicOrdering::SeqCst);
            queue.pop().map(|q| q.activity)
        } else {
            None
        }
    }

    fn next_due(&self) -> Option<Instant> {
        self.queue.lock().peek().map(|q| q.activity.due)
    }

    fn is_idle(&self) -> bool {
        let queue = self.queue.lock();
        queue.is_empty() && self.in_flight.load(AtomicOrdering::SeqCst) == 0
    }

    fn requeue(&self, next: Option<Activity>) {
        if let Some(next) = next {
            if self.push(next).is_err() {
                tracing::debug!("scheduler shut down, not re-arming");
            }
        }
    }

    fn finish(&self) {
        self.in_flight.fetch_sub(1, AtomicOrdering::SeqCst);
        self.progress.notify_waiters();
    }

    fn record_completed(&self, entry: CompletedActivity) {
        self.completed_total.fetch_add(1, AtomicOrdering::SeqCst);
        let mut completed = self.completed.lock();
        completed.push_back(entry);
        while completed.len() > self.config.completed_capacity {
            completed.pop_front();
        }
    }
}

/// Handle to the scheduler. Clones share one queue.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
    dispatcher: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let (state, _) = watch::channel(SchedulerState::Running);
        let permits = Arc::new(Semaphore::new(config.max_workers.max(1)));
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(BinaryHeap::new()),
                completed: Mutex::new(VecDeque::new()),
                completed_total: AtomicU64::new(0),
                skipped_total: AtomicU64::new(0),
                next_seq: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
                wakeup: Notify::new(),
                progress: Notify::new(),
                state,
                workers: TaskTracker::new(),
                permits,
                config,
            }),
            dispatcher: Arc::new(Mutex::new(None)),
        }
    }

    /// Spawn the dispatch loop. Activities added earlier start running now.
    pub fn start(&self, handler: Arc<dyn ActivityHandler>) -> Result<(), SchedulerError> {
        if self.state() == SchedulerState::Shutdown {
            return Err(SchedulerError::ShutDown);
        }
        let mut dispatcher = self.dispatcher.lock();
        if dispatcher.is_some() {
            return Err(SchedulerError::AlreadyStarted);
        }
        *dispatcher = Some(tokio::spawn(dispatch_loop(Arc::clone(&self.shared), handler)));
        tracing::info!(max_workers = self.shared.config.max_workers, "scheduler started");
        Ok(())
    }

    /// Queue an activity. Fails once the scheduler is shut down.
    pub fn add(&self, activity: Activity) -> Result<(), SchedulerError> {
        tracing::trace!(activity = %activity.description(), "activity queued");
        self.shared.push(activity)
    }

    /// Stop dispatching. Queued and newly added activities wait for `resume`.
    pub fn pause(&self) {
        let changed = self.shared.state.send_if_modified(|state| {
            let running = *state == SchedulerState::Running;
            if running {
                *state = SchedulerState::Paused;
            }
            running
        });
        if changed {
            tracing::info!("scheduler paused");
        }
    }

    pub fn resume(&self) {
        let changed = self.shared.state.send_if_modified(|state| {
            let paused = *state == SchedulerState::Paused;
            if paused {
                *state = SchedulerState::Running;
            }
            paused
        });
        if changed {
            tracing::info!("scheduler resumed");
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.shared.state.borrow()
    }

    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Descriptions of queued activities, earliest first.
    pub fn pending_descriptions(&self) -> Vec<String> {
        let mut queued: Vec<(Instant, u64, String)> = self
            .shared
            .queue
            .lock()
            .iter()
            .map(|q| (q.activity.due, q.seq, q.activity.description()))
            .collect();
        queued.sort();
        queued.into_iter().map(|(_, _, d)| d).collect()
    }

    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(AtomicOrdering::SeqCst)
    }

    /// Activities run to completion since start.
    pub fn completed_count(&self) -> u64 {
        self.shared.completed_total.load(AtomicOrdering::SeqCst)
    }

    /// Most recent completed activities, oldest first.
    pub fn completed(&self) -> Vec<CompletedActivity> {
        self.shared.completed.lock().iter().cloned().collect()
    }

    /// Activities dropped because their agent was busy.
    pub fn skipped_count(&self) -> u64 {
        self.shared.skipped_total.load(AtomicOrdering::SeqCst)
    }

    /// Wait until nothing is queued or running. Returns false on timeout.
    pub async fn wait_until_done(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let progress = self.shared.progress.notified();
            tokio::pin!(progress);
            progress.as_mut().enable();
            if self.shared.is_idle() {
                return true;
            }
            if tokio::time::timeout_at(deadline, progress).await.is_err() {
                return self.shared.is_idle();
            }
        }
    }

    /// Stop the dispatch loop, then wait up to `timeout` for running activities.
    ///
    /// Queued activities are discarded. Returns false if workers were still
    /// running at the deadline; their results are not awaited.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.shared.state.send_replace(SchedulerState::Shutdown);
        self.shared.wakeup.notify_one();
        let dispatcher = self.dispatcher.lock().take();
        if let Some(handle) = dispatcher {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "dispatch loop failed");
            }
        }
        self.shared.workers.close();
        let drained = tokio::time::timeout(timeout, self.shared.workers.wait()).await.is_ok();
        let discarded = {
            let mut queue = self.shared.queue.lock();
            let n = queue.len();
            queue.clear();
            n
        };
        if drained {
            tracing::info!(discarded, "scheduler shut down");
        } else {
            tracing::warn!(
                discarded,
                in_flight = self.in_flight(),
                "scheduler shut down with activities still running",
            );
        }
        self.shared.progress.notify_waiters();
        drained
    }
}

async fn dispatch_loop(shared: Arc<Shared>, handler: Arc<dyn ActivityHandler>) {
    let mut state_rx = shared.state.subscribe();
    loop {
        let state = *state_rx.borrow_and_update();
        match state {
            SchedulerState::Shutdown => break,
            SchedulerState::Paused => {
                if state_rx.changed().await.is_err() {
                    break;
                }
                continue;
            }
            SchedulerState::Running => {}
        }

        if let Some(activity) = shared.pop_due(Instant::now()) {
            dispatch(&shared, &handler, activity);
            continue;
        }

        match shared.next_due() {
            Some(due) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(due) => {}
                    _ = shared.wakeup.notified() => {}
                    changed = state_rx.changed() => if changed.is_err() { break },
                }
            }
            None => {
                tokio::select! {
                    _ = shared.wakeup.notified() => {}
                    changed = state_rx.changed() => if changed.is_err() { break },
                }
            }
        }
    }
    tracing::debug!("dispatch loop stopped");
}

fn dispatch(shared: &Arc<Shared>, handler: &Arc<dyn ActivityHandler>, activity: Activity) {
    let Some(guard) = activity.instance.try_claim() else {
        tracing::debug!(activity = %activity.description(), "skipping activity due to busy agent");
        shared.skipped_total.fetch_add(1, AtomicOrdering::SeqCst);
        shared.requeue(handler.skipped(&activity));
        shared.finish();
        return;
    };

    let shared = Arc::clone(shared);
    let handler = Arc::clone(handler);
    let workers = shared.workers.clone();
    workers.spawn(async move {
        let _permit = Arc::clone(&shared.permits).acquire_owned().await.ok();
        let started = Instant::now();
        tracing::debug!(activity = %activity.description(), "activity started");
        let outcome = handler.perform(&activity).await;
        drop(guard);
        let finished = Instant::now();
        if let Outcome::Ran { next } = outcome {
            shared.record_completed(CompletedActivity {
                instance: activity.instance.id().clone(),
                description: activity.description(),
                due: activity.due,
                started,
                finished,
            });
            shared.requeue(next);
        }
        shared.finish();
    });
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
