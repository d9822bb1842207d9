//! The chunk-by-chunk transfer state machine.
//!
//! One chunk is in flight at a time: chunk `i + 1` is not read until the sink
//! has acknowledged chunk `i` and progress has been published. Cancellation is
//! cooperative. `cancel()` deactivates the session immediately; a send already
//! in flight is allowed to finish, but its acknowledgement finds the session
//! inactive and changes nothing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chunkup_transfer::{Chunk, ChunkReader, FileHandle, ProgressEvent, next_range};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bindings::ControllerBindings;
use crate::config::TransferConfig;
use crate::error::{ControllerError, TransportError};
use crate::session::{SessionStatus, TransferSession};
use crate::sink::ChunkSink;
use crate::types::{TransferEvent, TransferOutcome, TransferState};

/// Drives sequential chunk transfers of the selected file.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct TransferController {
    inner: Arc<Inner>,
}

struct Inner {
    bindings: ControllerBindings,
    sink: Arc<dyn ChunkSink>,
    config: TransferConfig,
    next_session_id: AtomicU64,
    state: Mutex<ControllerState>,
}

#[derive(Default)]
struct ControllerState {
    selection: Option<FileHandle>,
    session: Option<Arc<TransferSession>>,
    events_tx: Option<mpsc::UnboundedSender<TransferEvent>>,
}

impl ControllerState {
    fn emit(&self, event: TransferEvent) {
        if let Some(tx) = &self.events_tx {
            let _ = tx.send(event);
        }
    }
}

impl TransferController {
    /// Creates a controller bound to its UI collaborators and transport.
    pub fn new(
        bindings: ControllerBindings,
        sink: Arc<dyn ChunkSink>,
        config: TransferConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                bindings,
                sink,
                config,
                next_session_id: AtomicU64::new(1),
                state: Mutex::new(ControllerState::default()),
            }),
        }
    }

    /// Subscribes to transfer events. Can only be called once.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransferEvent>> {
        let mut state = self.inner.lock_state();
        if state.events_tx.is_some() {
            return None;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.events_tx = Some(tx);
        Some(rx)
    }

    /// Records `file` as the current selection.
    pub fn select(&self, file: FileHandle) {
        self.inner.lock_state().selection = Some(file);
    }

    /// The current selection, if any.
    pub fn selection(&self) -> Option<FileHandle> {
        self.inner.lock_state().selection.clone()
    }

    /// Selects `file` and starts transferring it.
    pub fn start(
        &self,
        file: FileHandle,
        chunk_size: usize,
    ) -> Result<TransferHandle, ControllerError> {
        self.select(file);
        self.start_selected(chunk_size)
    }

    /// Starts transferring the current selection in `chunk_size` chunks.
    ///
    /// Any session still in progress is superseded: its loop stops at the
    /// next checkpoint without emitting further signals. Must be called from
    /// within a tokio runtime.
    pub fn start_selected(&self, chunk_size: usize) -> Result<TransferHandle, ControllerError> {
        if chunk_size == 0 {
            return Err(ControllerError::InvalidArgument(
                "chunk size must be positive".into(),
            ));
        }

        let mut state = self.inner.lock_state();
        let file = state
            .selection
            .clone()
            .ok_or_else(|| ControllerError::InvalidArgument("no file selected".into()))?;

        if let Some(previous) = state.session.take()
            && previous.deactivate(SessionStatus::Superseded)
        {
            debug!(session = previous.id(), "session superseded");
        }

        let session_id = self.inner.next_session_id.fetch_add(1, Ordering::Relaxed);
        let session = Arc::new(TransferSession::new(session_id, file, chunk_size));
        state.session = Some(Arc::clone(&session));

        let bindings = &self.inner.bindings;
        bindings.progress.set_percent(0.0);
        bindings.progress.show();
        bindings.label.set_label("");
        state.emit(TransferEvent::Started {
            session_id,
            name: session.file().name().to_string(),
            size: session.file().size(),
        });
        drop(state);

        info!(
            session = session_id,
            file = %session.file().name(),
            size = session.file().size(),
            chunk_size,
            "transfer started"
        );

        let task = tokio::spawn(run_session(Arc::clone(&self.inner), session));
        Ok(TransferHandle { session_id, task })
    }

    /// Cancels the active transfer.
    ///
    /// Returns `false` (and does nothing) if no transfer is active.
    pub fn cancel(&self) -> bool {
        let mut state = self.inner.lock_state();
        let Some(session) = state.session.clone() else {
            return false;
        };
        if !session.deactivate(SessionStatus::Cancelled) {
            return false;
        }

        state.selection = None;
        self.inner.bindings.reset();
        state.emit(TransferEvent::Cancelled {
            session_id: session.id(),
        });
        drop(state);

        info!(session = session.id(), "transfer cancelled");
        true
    }

    /// Returns a handle an external control can fire to cancel.
    pub fn cancel_trigger(&self) -> CancelTrigger {
        CancelTrigger {
            controller: self.clone(),
        }
    }

    /// State of the most recent session.
    pub fn state(&self) -> TransferState {
        self.inner
            .lock_state()
            .session
            .as_ref()
            .map_or(TransferState::Idle, |s| s.status().into())
    }

    /// The most recent session, if any.
    pub fn session(&self) -> Option<Arc<TransferSession>> {
        self.inner.lock_state().session.clone()
    }
}

/// Cancels the controller's active transfer when fired.
#[derive(Clone)]
pub struct CancelTrigger {
    controller: TransferController,
}

impl CancelTrigger {
    /// Returns `true` if a transfer was cancelled.
    pub fn fire(&self) -> bool {
        self.controller.cancel()
    }
}

/// Handle to a running session's chunk loop.
pub struct TransferHandle {
    session_id: u64,
    task: JoinHandle<TransferOutcome>,
}

impl TransferHandle {
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Waits for the chunk loop to finish.
    pub async fn wait(self) -> TransferOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => TransferOutcome::Cancelled,
        }
    }
}

// ---------------------------------------------------------------------------
// Chunk loop
// ---------------------------------------------------------------------------

async fn run_session(inner: Arc<Inner>, session: Arc<TransferSession>) -> TransferOutcome {
    let file = session.file().clone();
    let mut reader = ChunkReader::new(&file, session.chunk_size());

    loop {
        // Cancellation checkpoint.
        if !session.is_active() {
            return inactive_outcome(&session);
        }

        let Some(range) = next_range(file.size(), session.offset(), session.chunk_size()) else {
            return inner.complete(&session);
        };

        let chunk = match reader.read_range(range).await {
            Ok(chunk) => chunk,
            Err(e) => return inner.fail(&session, e.into()),
        };

        // The read suspended; a cancel may have landed meanwhile.
        if !session.is_active() {
            return inactive_outcome(&session);
        }

        if let Err(e) = inner.send(&chunk).await {
            return inner.fail(&session, e.into());
        }

        inner.acknowledge(&session, &chunk);
    }
}

fn inactive_outcome(session: &TransferSession) -> TransferOutcome {
    match session.status() {
        SessionStatus::Superseded => TransferOutcome::Superseded,
        SessionStatus::Completed => TransferOutcome::Completed {
            bytes: session.offset(),
        },
        _ => TransferOutcome::Cancelled,
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn send(&self, chunk: &Chunk) -> Result<(), TransportError> {
        let send = self.sink.send_chunk(chunk);
        match self.config.send_timeout {
            Some(limit) => tokio::time::timeout(limit, send)
                .await
                .map_err(|_| TransportError::TimedOut(limit))?,
            None => send.await,
        }
    }

    /// Advances the offset for an acknowledged chunk and publishes progress.
    fn acknowledge(&self, session: &TransferSession, chunk: &Chunk) {
        let state = self.lock_state();
        let Some(offset) = session.advance(chunk.len() as u64) else {
            debug!(
                session = session.id(),
                offset = chunk.offset,
                "late acknowledgement ignored"
            );
            return;
        };

        let progress = ProgressEvent::new(session.id(), offset, session.file().size());
        self.bindings.progress.set_percent(progress.percent);
        state.emit(TransferEvent::Progress(progress));
        debug!(
            session = session.id(),
            offset,
            percent = progress.percent,
            "chunk acknowledged"
        );
    }

    fn complete(&self, session: &TransferSession) -> TransferOutcome {
        let state = self.lock_state();
        if !session.deactivate(SessionStatus::Completed) {
            return inactive_outcome(session);
        }

        let file = session.file();
        if file.size() == 0 {
            let progress = ProgressEvent::new(session.id(), 0, 0);
            self.bindings.progress.set_percent(progress.percent);
            state.emit(TransferEvent::Progress(progress));
        }
        self.bindings.progress.hide();
        self.bindings.label.set_label(file.name());
        state.emit(TransferEvent::Completed {
            session_id: session.id(),
            name: file.name().to_string(),
        });
        drop(state);

        info!(
            session = session.id(),
            file = %file.name(),
            bytes = file.size(),
            elapsed_ms = session.elapsed().as_millis() as u64,
            "transfer completed"
        );
        TransferOutcome::Completed { bytes: file.size() }
    }

    fn fail(&self, session: &TransferSession, err: ControllerError) -> TransferOutcome {
        let mut state = self.lock_state();
        let message = err.to_string();
        if !session.fail(&message) {
            debug!(session = session.id(), error = %message, "error after session ended");
            return inactive_outcome(session);
        }

        state.selection = None;
        self.bindings.reset();
        state.emit(TransferEvent::Failed {
            session_id: session.id(),
            error: message.clone(),
        });
        drop(state);

        warn!(session = session.id(), error = %message, "transfer failed");
        TransferOutcome::Failed(err)
    }
}
