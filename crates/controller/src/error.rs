//! Controller error types.

use std::time::Duration;

/// Errors produced while sending a chunk.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk rejected: {0}")]
    Rejected(String),

    #[error("send timed out after {0:?}")]
    TimedOut(Duration),
}

/// Errors produced by the transfer controller.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("read error: {0}")]
    Read(#[from] chunkup_transfer::TransferError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
