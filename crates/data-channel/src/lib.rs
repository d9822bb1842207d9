//! TCP data channel for chunked file transfers.
//!
//! The sender opens one connection per file, announces the file, then sends
//! chunk frames one at a time. The receiver acknowledges every frame before
//! the sender moves on, so chunk `i + 1` never leaves before chunk `i` is on
//! disk.
//!
//! # Wire format
//!
//! See the [`wire`] module for the frame layout.

pub mod client;
pub mod error;
pub mod server;
pub mod wire;

pub use client::TcpChunkClient;
pub use error::DataChannelError;
pub use server::{ReceivedFile, TcpChunkReceiver};
pub use wire::{FileHeader, Frame};

use std::time::Duration;

/// TCP read/write buffer size (256 KB).
pub const TCP_BUFFER_SIZE: usize = 256 * 1024;

/// Timeout for the TCP connection attempt.
pub const TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the file header exchange.
pub const TCP_HEADER_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest chunk payload a receiver will accept (64 MiB).
pub const MAX_CHUNK_LEN: u32 = 64 * 1024 * 1024;
