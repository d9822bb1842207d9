//! Terminal rendering of the controller's progress, label and selection.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chunkup_controller::{LabelSink, ProgressSink, SelectionSink};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Bar length; percent is stored in hundredths.
const BAR_SCALE: u64 = 10_000;

/// Progress bar on stderr plus a completion line.
pub struct TerminalUi {
    title: String,
    draw: bool,
    state: Mutex<UiState>,
}

#[derive(Default)]
struct UiState {
    bar: Option<ProgressBar>,
    percent: f64,
    detail: String,
    label: String,
}

impl TerminalUi {
    /// Draws to stderr.
    pub fn stderr(title: impl Into<String>) -> Self {
        Self::new(title, true)
    }

    /// Tracks state without drawing anything.
    pub fn hidden(title: impl Into<String>) -> Self {
        Self::new(title, false)
    }

    fn new(title: impl Into<String>, draw: bool) -> Self {
        Self {
            title: title.into(),
            draw,
            state: Mutex::new(UiState::default()),
        }
    }

    /// Text shown after the bar (throughput, ETA).
    pub fn set_detail(&self, detail: String) {
        let mut state = self.lock();
        if let Some(bar) = &state.bar {
            bar.set_message(detail.clone());
        }
        state.detail = detail;
    }

    fn lock(&self) -> MutexGuard<'_, UiState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{prefix:.bold} [{bar:40.cyan/blue}] {percent:>3}% {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
    }

    fn new_bar(&self) -> ProgressBar {
        let target = if self.draw {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let bar = ProgressBar::with_draw_target(Some(BAR_SCALE), target);
        bar.set_style(Self::style());
        bar.set_prefix(self.title.clone());
        bar
    }
}

fn scaled(percent: f64) -> u64 {
    ((percent.clamp(0.0, 100.0) / 100.0) * BAR_SCALE as f64).round() as u64
}

impl ProgressSink for TerminalUi {
    fn show(&self) {
        let mut state = self.lock();
        let bar = state.bar.take().unwrap_or_else(|| self.new_bar());
        bar.set_position(scaled(state.percent));
        bar.set_message(state.detail.clone());
        state.bar = Some(bar);
    }

    fn hide(&self) {
        let mut state = self.lock();
        if let Some(bar) = state.bar.take() {
            bar.finish_and_clear();
        }
        state.detail.clear();
    }

    fn set_percent(&self, percent: f64) {
        let mut state = self.lock();
        state.percent = percent;
        if let Some(bar) = &state.bar {
            bar.set_position(scaled(percent));
        }
    }
}

impl LabelSink for TerminalUi {
    fn set_label(&self, text: &str) {
        let mut state = self.lock();
        state.label = text.to_string();
        if self.draw && !text.is_empty() {
            eprintln!("{text}");
        }
    }
}

impl SelectionSink for TerminalUi {
    fn clear_selection(&self) {
        tracing::debug!(file = %self.title, "selection cleared");
    }
}
