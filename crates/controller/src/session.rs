//! Per-file transfer session.

use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use chunkup_transfer::{FileHandle, ProgressEvent};

/// Status of a [`TransferSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Transferring,
    Completed,
    Cancelled,
    /// Replaced by a newer session before finishing.
    Superseded,
    Failed,
}

/// Mutable state of one in-flight transfer (thread-safe).
///
/// A session starts active. The first call to [`deactivate`](Self::deactivate)
/// wins; after it, [`advance`](Self::advance) never moves the offset again.
pub struct TransferSession {
    id: u64,
    file: FileHandle,
    chunk_size: usize,
    inner: RwLock<SessionInner>,
}

struct SessionInner {
    status: SessionStatus,
    offset: u64,
    error: String,
    started_at: Instant,
    finished_at: Option<Instant>,
}

impl TransferSession {
    /// Creates an active session at offset 0.
    pub fn new(id: u64, file: FileHandle, chunk_size: usize) -> Self {
        Self {
            id,
            file,
            chunk_size,
            inner: RwLock::new(SessionInner {
                status: SessionStatus::Transferring,
                offset: 0,
                error: String::new(),
                started_at: Instant::now(),
                finished_at: None,
            }),
        }
    }

    /// Records an acknowledged chunk of `len` bytes.
    ///
    /// Returns the new offset, or `None` if the session is no longer active.
    pub fn advance(&self, len: u64) -> Option<u64> {
        let mut s = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if s.status != SessionStatus::Transferring {
            return None;
        }
        s.offset = (s.offset + len).min(self.file.size());
        Some(s.offset)
    }

    /// Moves the session into a terminal `status`.
    ///
    /// Returns `false` if it was already inactive. Every terminal status other
    /// than `Completed` resets the offset to 0.
    pub fn deactivate(&self, status: SessionStatus) -> bool {
        if status == SessionStatus::Transferring {
            return false;
        }
        let mut s = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if s.status != SessionStatus::Transferring {
            return false;
        }
        s.status = status;
        if status != SessionStatus::Completed {
            s.offset = 0;
        }
        s.finished_at = Some(Instant::now());
        true
    }

    /// Marks the session failed with an error message.
    pub fn fail(&self, err: &str) -> bool {
        if !self.deactivate(SessionStatus::Failed) {
            return false;
        }
        let mut s = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        s.error = err.to_string();
        true
    }

    /// Returns `true` while chunks may still be sent.
    pub fn is_active(&self) -> bool {
        let s = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        s.status == SessionStatus::Transferring
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn file(&self) -> &FileHandle {
        &self.file
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn status(&self) -> SessionStatus {
        let s = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        s.status
    }

    /// Bytes acknowledged so far.
    pub fn offset(&self) -> u64 {
        let s = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        s.offset
    }

    /// Failure message (empty unless failed).
    pub fn error(&self) -> String {
        let s = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        s.error.clone()
    }

    /// Time since start, frozen once the session finishes.
    pub fn elapsed(&self) -> Duration {
        let s = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        s.finished_at
            .unwrap_or_else(Instant::now)
            .duration_since(s.started_at)
    }

    /// Current progress snapshot.
    pub fn progress(&self) -> ProgressEvent {
        ProgressEvent::new(self.id, self.offset(), self.file.size())
    }
}
