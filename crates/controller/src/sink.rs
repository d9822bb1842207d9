//! Transport boundary.
//!
//! `ChunkSink` is implemented by the embedding application to deliver chunk
//! bytes. Using a trait keeps the chunk loop decoupled from transport and
//! testable with mocks.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chunkup_transfer::Chunk;

use crate::error::TransportError;

/// Boxed future returned by [`ChunkSink::send_chunk`].
pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

/// Delivers one chunk and resolves once the receiver has acknowledged it.
///
/// The controller never calls `send_chunk` again until the previous future
/// has resolved, so implementations may assume strict ordering.
pub trait ChunkSink: Send + Sync {
    fn send_chunk<'a>(&'a self, chunk: &'a Chunk) -> SendFuture<'a>;
}

/// Stand-in transport: waits a fixed delay, then reports success.
#[derive(Debug, Clone)]
pub struct SimulatedSink {
    delay: Duration,
}

impl SimulatedSink {
    /// Default artificial latency per chunk.
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for SimulatedSink {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY)
    }
}

impl ChunkSink for SimulatedSink {
    fn send_chunk<'a>(&'a self, _chunk: &'a Chunk) -> SendFuture<'a> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            Ok(())
        })
    }
}
