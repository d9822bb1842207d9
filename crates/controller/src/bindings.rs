//! Collaborators the controller reports to.
//!
//! The controller calls these while holding its state lock, so signals from
//! `cancel()` and the chunk loop never interleave. Implementations must not
//! call back into the controller.

use std::sync::Arc;

/// Visual progress indicator.
pub trait ProgressSink: Send + Sync {
    fn show(&self);
    fn hide(&self);
    /// Percentage in `0.0..=100.0`.
    fn set_percent(&self, percent: f64);
}

/// Display-name field next to the indicator.
pub trait LabelSink: Send + Sync {
    fn set_label(&self, text: &str);
}

/// The file-picker control whose selection is cleared on cancel or failure.
pub trait SelectionSink: Send + Sync {
    fn clear_selection(&self);
}

/// Collaborators bound once at controller construction.
#[derive(Clone)]
pub struct ControllerBindings {
    pub progress: Arc<dyn ProgressSink>,
    pub label: Arc<dyn LabelSink>,
    pub selection: Arc<dyn SelectionSink>,
}

impl ControllerBindings {
    pub fn new(
        progress: Arc<dyn ProgressSink>,
        label: Arc<dyn LabelSink>,
        selection: Arc<dyn SelectionSink>,
    ) -> Self {
        Self {
            progress,
            label,
            selection,
        }
    }

    /// Bindings that discard every signal, for headless use where only the
    /// event stream matters.
    pub fn detached() -> Self {
        let null = Arc::new(Detached);
        Self::new(null.clone(), null.clone(), null)
    }

    pub(crate) fn reset(&self) {
        self.progress.set_percent(0.0);
        self.progress.hide();
        self.label.set_label("");
        self.selection.clear_selection();
    }
}

struct Detached;

impl ProgressSink for Detached {
    fn show(&self) {}
    fn hide(&self) {}
    fn set_percent(&self, _percent: f64) {}
}

impl LabelSink for Detached {
    fn set_label(&self, _text: &str) {}
}

impl SelectionSink for Detached {
    fn clear_selection(&self) {}
}
