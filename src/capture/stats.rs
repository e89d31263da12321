//! Counters the callback bumps so degradations are visible without logs.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free session counters, shared between the callback and observers.
#[derive(Debug, Default)]
pub struct CaptureStats {
    frames: AtomicU64,
    overruns: AtomicU64,
    skipped_publishes: AtomicU64,
    stream_failures: AtomicU64,
}

/// Point-in-time copy of [`CaptureStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Frames processed and published.
    pub frames: u64,
    /// Frames whose processing outlasted the buffer period.
    pub overruns: u64,
    /// Frames processed but not published because the reader held the lock.
    pub skipped_publishes: u64,
    /// Streams that stopped delivering buffers without being asked to.
    pub stream_failures: u64,
}

impl StatsSnapshot {
    /// Counts accumulated since `earlier`.
    pub fn since(&self, earlier: &StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            frames: self.frames.saturating_sub(earlier.frames),
            overruns: self.overruns.saturating_sub(earlier.overruns),
            skipped_publishes: self
                .skipped_publishes
                .saturating_sub(earlier.skipped_publishes),
            stream_failures: self.stream_failures.saturating_sub(earlier.stream_failures),
        }
    }
}

impl CaptureStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_overrun(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped_publish(&self) {
        self.skipped_publishes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stream_failure(&self) {
        self.stream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            skipped_publishes: self.skipped_publishes.load(Ordering::Relaxed),
            stream_failures: self.stream_failures.load(Ordering::Relaxed),
        }
    }
}
