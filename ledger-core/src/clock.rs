//! Time sources for event timestamps

use std::sync::atomic::{AtomicI64, Ordering};

/// Milliseconds since the Unix epoch
pub type TimestampMs = i64;

/// Source of event timestamps
pub trait Clock: Send + Sync {
    /// Current time in milliseconds
    fn now_ms(&self) -> TimestampMs;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> TimestampMs {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually driven clock
///
/// Each read returns the current value and then advances it by `step`
/// (zero by default).
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
    step: i64,
}

impl ManualClock {
    /// Clock frozen at `start`
    pub fn new(start: TimestampMs) -> Self {
        Self { now: AtomicI64::new(start), step: 0 }
    }

    /// Clock that advances by `step` after every read
    pub fn ticking(start: TimestampMs, step: i64) -> Self {
        Self { now: AtomicI64::new(start), step }
    }

    /// Jump to `now`
    pub fn set(&self, now: TimestampMs) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move forward (or backward, for negative `delta`)
    pub fn advance(&self, delta: i64) {
        self.now.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> TimestampMs {
        self.now.fetch_add(self.step, Ordering::SeqCst)
    }
}
