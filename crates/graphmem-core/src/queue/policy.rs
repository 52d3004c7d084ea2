//! What happens when a queued operation fails.
//!
//! Submitters never see the outcome of their operation; the policy is the
//! only observer. The worker always moves on to the next operation
//! afterwards, whatever the policy does.

use tracing::{debug, error};

use crate::error::GraphMemError;

/// Observer for the outcome of queued operations.
pub trait FailurePolicy: Send + Sync {
    /// Called once for every operation that returned an error or panicked.
    fn on_failure(&self, group_id: &str, label: &str, error: &GraphMemError);

    /// Called once for every operation that completed successfully.
    fn on_success(&self, _group_id: &str, _label: &str) {}
}

/// Log the failure and carry on.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAndContinue;

impl FailurePolicy for LogAndContinue {
    fn on_failure(&self, group_id: &str, label: &str, error: &GraphMemError) {
        error!(
            group_id = %group_id,
            label = %label,
            code = error.code().as_str(),
            "Error processing queued episode: {}",
            error
        );
    }

    fn on_success(&self, group_id: &str, label: &str) {
        debug!(group_id = %group_id, label = %label, "Queued episode processed");
    }
}
