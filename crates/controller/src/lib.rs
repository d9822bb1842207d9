//! Client-side chunked transfer controller.
//!
//! [`TransferController`] drives a [`chunkup_transfer::ChunkReader`] one
//! chunk at a time, hands each chunk to a pluggable [`ChunkSink`], and
//! reports progress through the collaborators bound in
//! [`ControllerBindings`]. It has no UI or network dependencies of its own.
//!
//! # Lifecycle
//!
//! `Idle -> Transferring -> {Completed, Cancelled, Failed}`. Terminal states
//! belong to one session; the next `start` creates a fresh one.

pub mod bindings;
pub mod config;
pub mod controller;
pub mod error;
pub mod session;
pub mod sink;
pub mod types;

pub use bindings::{ControllerBindings, LabelSink, ProgressSink, SelectionSink};
pub use config::TransferConfig;
pub use controller::{CancelTrigger, TransferController, TransferHandle};
pub use error::{ControllerError, TransportError};
pub use session::{SessionStatus, TransferSession};
pub use sink::{ChunkSink, SendFuture, SimulatedSink};
pub use types::{TransferEvent, TransferOutcome, TransferState};
