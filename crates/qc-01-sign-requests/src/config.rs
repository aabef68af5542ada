//! Registry configuration.

use std::time::Duration;

/// Default time a waiter blocks before the request is forced to time out.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration for [`PendingRequests`](crate::PendingRequests).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequestsConfig {
    /// Used by `wait` when the caller passes no explicit timeout.
    pub default_wait_timeout: Duration,
}

impl Default for PendingRequestsConfig {
    fn default() -> Self {
        Self {
            default_wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}
