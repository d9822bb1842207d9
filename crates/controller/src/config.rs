//! Controller configuration.

use std::time::Duration;

/// Settings fixed at controller construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferConfig {
    /// Upper bound on a single chunk send. `None` waits indefinitely.
    pub send_timeout: Option<Duration>,
}

impl TransferConfig {
    pub fn with_send_timeout(timeout: Duration) -> Self {
        Self {
            send_timeout: Some(timeout),
        }
    }
}
