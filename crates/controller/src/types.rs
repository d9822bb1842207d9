//! Events, states and outcomes reported by the controller.

use chunkup_transfer::ProgressEvent;

use crate::error::ControllerError;
use crate::session::SessionStatus;

/// Lifecycle state of the controller's current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// No transfer has been started yet.
    Idle,
    Transferring,
    Completed,
    Cancelled,
    Failed,
}

impl From<SessionStatus> for TransferState {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::Transferring => Self::Transferring,
            SessionStatus::Completed => Self::Completed,
            SessionStatus::Cancelled | SessionStatus::Superseded => Self::Cancelled,
            SessionStatus::Failed => Self::Failed,
        }
    }
}

/// Event pushed to the subscriber returned by
/// [`TransferController::take_events`](crate::TransferController::take_events).
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    Started {
        session_id: u64,
        name: String,
        size: u64,
    },
    /// A chunk was acknowledged.
    Progress(ProgressEvent),
    Completed {
        session_id: u64,
        name: String,
    },
    /// The user cancelled the transfer.
    Cancelled { session_id: u64 },
    /// A read or send failure aborted the transfer.
    Failed { session_id: u64, error: String },
}

/// How a session's chunk loop ended.
#[derive(Debug)]
pub enum TransferOutcome {
    /// Every byte was acknowledged.
    Completed { bytes: u64 },
    /// `cancel()` was called.
    Cancelled,
    /// A newer `start` replaced this session.
    Superseded,
    Failed(ControllerError),
}

impl TransferOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}
