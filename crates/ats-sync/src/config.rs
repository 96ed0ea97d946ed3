//! Tunables for a reconciliation session.

use std::time::Duration;

/// Soft caps and cancellation timeout for one `Peer::reconcile` call.
#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    /// How long a single session may run before it's treated as cancelled.
    pub timeout: Duration,
    /// Max group-keys requested in one `need` message; excess truncated.
    pub max_need_groups: usize,
    /// Max attestations sent in one `attestations` message; excess truncated.
    pub max_attestations_per_message: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_need_groups: 256,
            max_attestations_per_message: 512,
        }
    }
}
