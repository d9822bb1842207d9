use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Returns `min(offset / size * 100, 100)`, treating an empty file as done.
pub fn percent(offset: u64, size: u64) -> f64 {
    if size == 0 {
        return 100.0;
    }
    (offset as f64 * 100.0 / size as f64).min(100.0)
}

/// Progress snapshot emitted after each acknowledged chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    pub session_id: u64,
    /// Bytes acknowledged so far.
    pub offset: u64,
    /// Total file size.
    pub size: u64,
    /// Percentage in `0.0..=100.0`.
    pub percent: f64,
}

impl ProgressEvent {
    pub fn new(session_id: u64, offset: u64, size: u64) -> Self {
        Self {
            session_id,
            offset,
            size,
            percent: percent(offset, size),
        }
    }

    /// Returns `true` once every byte has been acknowledged.
    pub fn is_complete(&self) -> bool {
        self.offset >= self.size
    }
}

/// Throughput over a sliding time window of cumulative byte counts.
pub struct SpeedCalculator {
    window: Duration,
    points: Mutex<VecDeque<(Instant, u64)>>,
}

const MAX_POINTS: usize = 100;

impl Default for SpeedCalculator {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl SpeedCalculator {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            points: Mutex::new(VecDeque::new()),
        }
    }

    /// Records `total` bytes acknowledged so far.
    pub fn record(&self, total: u64) {
        self.record_at(total, Instant::now());
    }

    pub fn record_at(&self, total: u64, at: Instant) {
        let mut points = self.points.lock().unwrap_or_else(PoisonError::into_inner);
        points.push_back((at, total));
        while points.len() > MAX_POINTS
            || points
                .front()
                .is_some_and(|(t, _)| at.saturating_duration_since(*t) > self.window)
        {
            points.pop_front();
        }
    }

    /// Bytes per second across the window; 0.0 until two points span time.
    pub fn bytes_per_second(&self) -> f64 {
        let points = self.points.lock().unwrap_or_else(PoisonError::into_inner);
        let (Some(&(t0, b0)), Some(&(t1, b1))) = (points.front(), points.back()) else {
            return 0.0;
        };
        let elapsed = t1.saturating_duration_since(t0);
        if elapsed.is_zero() {
            return 0.0;
        }
        b1.saturating_sub(b0) as f64 / elapsed.as_secs_f64()
    }

    /// Time left for `remaining` bytes at the current rate.
    pub fn eta(&self, remaining: u64) -> Option<Duration> {
        let rate = self.bytes_per_second();
        (rate > 0.0).then(|| Duration::from_secs_f64(remaining as f64 / rate))
    }

    pub fn reset(&self) {
        self.points
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
