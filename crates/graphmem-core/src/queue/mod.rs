//! Per-group sequential episode queue.
//!
//! Every `group_id` gets its own FIFO and at most one worker draining it.
//! Operations for the same group run strictly one after another in
//! submission order; different groups progress independently. Submission
//! never blocks on execution and never reports the outcome of the
//! operation: failures go to the configured [`FailurePolicy`].
//!
//! Workers are created lazily on first submission. By default an idle
//! worker stays parked for the life of the queue. With an idle timeout
//! configured, a worker whose queue stays empty that long retires and its
//! group entry is dropped, so the tables only hold groups with recent work.

mod policy;
mod worker;

pub use policy::{FailurePolicy, LogAndContinue};

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::error::{GraphMemError, GraphMemResult};

/// A deferred unit of work. Built at submission, run by the group's worker.
pub type Operation = Box<dyn FnOnce() -> BoxFuture<'static, GraphMemResult<()>> + Send>;

/// Episode queue settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Retire a worker after its queue has been empty this long.
    /// `None` keeps workers alive until shutdown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout_secs: Option<u64>,
}

impl QueueConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Lifecycle of a group's worker.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkerState {
    /// No worker exists for the group.
    Idle,
    /// A worker is executing or waiting for operations.
    Running,
    /// An idle worker retiring. The group entry is removed in the same step,
    /// so this state shows up in logs rather than in [`EpisodeQueue::status`].
    Draining,
    /// The worker ended (cancelled or aborted). The next submission replaces it.
    Stopped,
}

impl WorkerState {
    /// Whether a live worker owns the group's queue.
    pub fn is_active(self) -> bool {
        matches!(self, WorkerState::Running | WorkerState::Draining)
    }
}

/// Returned by [`EpisodeQueue::submit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueAck {
    pub group_id: String,
    /// Operations waiting for the group, including this one and excluding
    /// the one currently executing.
    pub position: usize,
}

/// Snapshot of one group's queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStatus {
    pub group_id: String,
    pub state: WorkerState,
    /// Operations not yet started.
    pub queued: usize,
    /// Operations submitted and not yet finished, including the running one.
    pub pending: usize,
}

pub(crate) struct Job {
    pub(crate) label: String,
    pub(crate) op: Operation,
}

pub(crate) struct GroupSlot {
    tx: mpsc::UnboundedSender<Job>,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Job>>>,
    queued: usize,
    pending: usize,
    state: WorkerState,
    /// Identifies the worker currently owning the slot. Unique per queue.
    generation: u64,
    settled: Arc<Notify>,
}

impl GroupSlot {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
            queued: 0,
            pending: 0,
            state: WorkerState::Idle,
            generation: 0,
            settled: Arc::new(Notify::new()),
        }
    }

    fn status(&self, group_id: &str) -> GroupStatus {
        GroupStatus {
            group_id: group_id.to_string(),
            state: self.state,
            queued: self.queued,
            pending: self.pending,
        }
    }
}

pub(crate) struct Shared {
    groups: Mutex<HashMap<String, GroupSlot>>,
    idle_timeout: Option<Duration>,
    policy: Arc<dyn FailurePolicy>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    next_generation: AtomicU64,
}

impl Shared {
    /// The table lock is never held across an await, so a poisoned lock
    /// still guards consistent data.
    pub(crate) fn groups(&self) -> MutexGuard<'_, HashMap<String, GroupSlot>> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn mark_started(&self, group_id: &str) {
        if let Some(slot) = self.groups().get_mut(group_id) {
            slot.queued = slot.queued.saturating_sub(1);
        }
    }

    pub(crate) fn mark_finished(&self, group_id: &str) {
        let mut groups = self.groups();
        if let Some(slot) = groups.get_mut(group_id) {
            slot.pending = slot.pending.saturating_sub(1);
            if slot.pending == 0 {
                slot.settled.notify_waiters();
            }
        }
    }

    /// Retire an idle worker. Succeeds only if the worker is still the
    /// group's current one and nothing arrived in the meantime; the group
    /// entry is removed under the same lock submissions take.
    pub(crate) fn try_retire(&self, group_id: &str, generation: u64) -> bool {
        let mut groups = self.groups();
        let Some(slot) = groups.get_mut(group_id) else {
            return true;
        };
        if slot.generation != generation || slot.pending > 0 {
            return false;
        }
        // Running -> Draining -> Stopped happens under this one lock, so the
        // draining step is only visible in the log.
        info!(group_id = %group_id, from = %slot.state, "Episode queue worker idle, draining");
        if let Some(slot) = groups.remove(group_id) {
            slot.settled.notify_waiters();
        }
        true
    }

    /// Called when a worker ends for any reason.
    pub(crate) fn worker_exited(&self, group_id: &str, generation: u64) {
        let mut groups = self.groups();
        if let Some(slot) = groups.get_mut(group_id) {
            if slot.generation == generation {
                slot.state = WorkerState::Stopped;
                slot.settled.notify_waiters();
            }
        }
    }

    pub(crate) fn policy(&self) -> &dyn FailurePolicy {
        self.policy.as_ref()
    }

    pub(crate) fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Registry of per-group FIFO queues and their workers.
///
/// Cheap to clone; clones share the same tables.
#[derive(Clone)]
pub struct EpisodeQueue {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for EpisodeQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpisodeQueue")
            .field("groups", &self.shared.groups().len())
            .field("idle_timeout", &self.shared.idle_timeout)
            .field("cancelled", &self.shared.cancel.is_cancelled())
            .finish()
    }
}

impl Default for EpisodeQueue {
    fn default() -> Self {
        Self::new(&QueueConfig::default())
    }
}

impl EpisodeQueue {
    /// Create a queue that logs failures and carries on.
    pub fn new(config: &QueueConfig) -> Self {
        Self::with_options(config.idle_timeout(), Arc::new(LogAndContinue))
    }

    /// Create a queue with an explicit idle timeout and failure policy.
    pub fn with_options(idle_timeout: Option<Duration>, policy: Arc<dyn FailurePolicy>) -> Self {
        Self {
            shared: Arc::new(Shared {
                groups: Mutex::new(HashMap::new()),
                idle_timeout,
                policy,
                cancel: CancellationToken::new(),
                tracker: TaskTracker::new(),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Enqueue `op` for `group_id` and return immediately.
    ///
    /// Starts a worker for the group if none is active. The check and the
    /// spawn happen under the table lock, so two concurrent first
    /// submissions cannot both start one. After [`shutdown`](Self::shutdown)
    /// the operation is not enqueued and the failure policy receives a
    /// `QUE_001` error instead. Must be called from within a Tokio runtime.
    pub fn submit<F, Fut>(
        &self,
        group_id: impl Into<String>,
        label: impl Into<String>,
        op: F,
    ) -> QueueAck
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = GraphMemResult<()>> + Send + 'static,
    {
        let group_id = group_id.into();
        let label = label.into();

        if self.shared.cancel.is_cancelled() {
            warn!(group_id = %group_id, label = %label, "Episode queue is shut down, operation rejected");
            self.shared.policy().on_failure(
                &group_id,
                &label,
                &GraphMemError::queue("Episode queue is shut down"),
            );
            let position = self.queued(&group_id);
            return QueueAck { group_id, position };
        }

        let job = Job {
            label,
            op: Box::new(move || Box::pin(op())),
        };

        let mut groups = self.shared.groups();
        let slot = groups.entry(group_id.clone()).or_insert_with(GroupSlot::new);

        // The slot owns the receiver, so the channel cannot be closed here.
        if let Err(mpsc::error::SendError(job)) = slot.tx.send(job) {
            let position = slot.queued;
            drop(groups);
            warn!(group_id = %group_id, "Episode queue channel closed, operation dropped");
            self.shared.policy().on_failure(
                &group_id,
                &job.label,
                &GraphMemError::internal("Episode queue channel closed"),
            );
            return QueueAck { group_id, position };
        }
        slot.queued += 1;
        slot.pending += 1;
        let position = slot.queued;

        if !slot.state.is_active() && !self.shared.cancel.is_cancelled() {
            slot.generation = self.shared.next_generation.fetch_add(1, Ordering::Relaxed);
            slot.state = WorkerState::Running;
            let generation = slot.generation;
            let rx = Arc::clone(&slot.rx);
            let shared = Arc::clone(&self.shared);
            let worker_group = group_id.clone();
            self.shared.tracker.spawn(async move {
                worker::run(shared, worker_group, generation, rx).await;
            });
        }

        QueueAck { group_id, position }
    }

    /// Operations waiting (not started) for `group_id`.
    pub fn queued(&self, group_id: &str) -> usize {
        self.shared
            .groups()
            .get(group_id)
            .map(|slot| slot.queued)
            .unwrap_or(0)
    }

    /// Operations not yet finished for `group_id`.
    pub fn pending(&self, group_id: &str) -> usize {
        self.shared
            .groups()
            .get(group_id)
            .map(|slot| slot.pending)
            .unwrap_or(0)
    }

    /// Worker state for `group_id`. Unknown groups are `Idle`.
    pub fn worker_state(&self, group_id: &str) -> WorkerState {
        self.shared
            .groups()
            .get(group_id)
            .map(|slot| slot.state)
            .unwrap_or(WorkerState::Idle)
    }

    pub fn status(&self, group_id: &str) -> Option<GroupStatus> {
        self.shared
            .groups()
            .get(group_id)
            .map(|slot| slot.status(group_id))
    }

    /// Snapshot of every known group, sorted by id.
    pub fn groups(&self) -> Vec<GroupStatus> {
        let mut all: Vec<GroupStatus> = self
            .shared
            .groups()
            .iter()
            .map(|(id, slot)| slot.status(id))
            .collect();
        all.sort_by(|a, b| a.group_id.cmp(&b.group_id));
        all
    }

    /// Number of groups with a live worker.
    pub fn active_workers(&self) -> usize {
        self.shared
            .groups()
            .values()
            .filter(|slot| slot.state.is_active())
            .count()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Wait until every operation submitted for `group_id` so far has
    /// finished, or its worker has ended.
    pub async fn join(&self, group_id: &str) {
        loop {
            let settled = {
                let groups = self.shared.groups();
                match groups.get(group_id) {
                    Some(slot) if slot.pending > 0 && slot.state.is_active() => {
                        Arc::clone(&slot.settled)
                    }
                    _ => return,
                }
            };

            let notified = settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let still_pending = self
                .shared
                .groups()
                .get(group_id)
                .map(|slot| slot.pending > 0 && slot.state.is_active())
                .unwrap_or(false);
            if !still_pending {
                return;
            }
            notified.await;
        }
    }

    /// Wait until every group's queue is empty and idle.
    pub async fn drain(&self) {
        loop {
            let busy: Vec<String> = self
                .shared
                .groups()
                .iter()
                .filter(|(_, slot)| slot.pending > 0 && slot.state.is_active())
                .map(|(id, _)| id.clone())
                .collect();
            if busy.is_empty() {
                return;
            }
            for group_id in busy {
                self.join(&group_id).await;
            }
        }
    }

    /// Cancel every worker and wait for them to end. Operations still
    /// queued are discarded; an operation in flight is interrupted at its
    /// next await point.
    pub async fn shutdown(&self) {
        let pending: usize = self.shared.groups().values().map(|s| s.pending).sum();
        info!(pending, "Shutting down episode queue");
        self.shared.cancel.cancel();
        self.shared.tracker.close();
        self.shared.tracker.wait().await;
        info!("Episode queue stopped");
    }
}
