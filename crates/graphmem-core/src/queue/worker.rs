//! The loop that drains one group's queue.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

use super::{Job, Shared};
use crate::error::GraphMemError;

enum Next {
    Job(Job),
    Idle,
    Closed,
}

/// Clears the group's active flag however the worker ends, so a later
/// submission can start a replacement. A job that was running when the
/// worker died is settled so joiners are not left waiting on it.
struct ExitGuard {
    shared: Arc<Shared>,
    group_id: String,
    generation: u64,
    in_flight: bool,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if self.in_flight {
            self.shared.mark_finished(&self.group_id);
        }
        self.shared.worker_exited(&self.group_id, self.generation);
        info!(group_id = %self.group_id, "Episode queue worker stopped");
    }
}

pub(crate) async fn run(
    shared: Arc<Shared>,
    group_id: String,
    generation: u64,
    rx: Arc<tokio::sync::Mutex<UnboundedReceiver<Job>>>,
) {
    let mut guard = ExitGuard {
        shared: Arc::clone(&shared),
        group_id: group_id.clone(),
        generation,
        in_flight: false,
    };
    let cancel = shared.cancel_token().clone();

    // A replaced worker may still hold the receiver for a moment.
    let mut rx = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        rx = rx.lock() => rx,
    };
    info!(group_id = %group_id, "Starting episode queue worker");

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(group_id = %group_id, "Episode queue worker cancelled");
                return;
            }
            next = next_job(&mut rx, &shared) => next,
        };

        let job = match next {
            Next::Job(job) => job,
            Next::Idle => {
                if shared.try_retire(&group_id, generation) {
                    return;
                }
                continue;
            }
            Next::Closed => return,
        };

        shared.mark_started(&group_id);
        guard.in_flight = true;
        let Job { label, op } = job;
        debug!(group_id = %group_id, label = %label, "Processing queued episode");

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(group_id = %group_id, label = %label, "Queued episode interrupted by shutdown");
                return;
            }
            // op() runs inside the guarded future so a panic while building
            // the future is caught too.
            outcome = AssertUnwindSafe(async move { op().await }).catch_unwind() => outcome,
        };

        match outcome {
            Ok(Ok(())) => shared.policy().on_success(&group_id, &label),
            Ok(Err(e)) => shared.policy().on_failure(&group_id, &label, &e),
            Err(panic) => {
                let err = GraphMemError::operation_panicked(format!(
                    "operation '{}' panicked: {}",
                    label,
                    panic_message(panic.as_ref())
                ));
                shared.policy().on_failure(&group_id, &label, &err);
            }
        }
        shared.mark_finished(&group_id);
        guard.in_flight = false;
    }
}

async fn next_job(rx: &mut UnboundedReceiver<Job>, shared: &Shared) -> Next {
    match shared.idle_timeout() {
        None => rx.recv().await.map_or(Next::Closed, Next::Job),
        Some(timeout) => match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(job)) => Next::Job(job),
            Ok(None) => Next::Closed,
            Err(_) => Next::Idle,
        },
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
