//! Tick sources for rolling windows.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use super::window::NANOS_PER_TICK;

/// A monotonic source of the current tick.
pub trait TickSource: Send + Sync {
    /// Get the current tick.
    fn now_ticks(&self) -> i64;
}

/// Ticks since January 1st 1970 UTC, read from the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTicks;

impl TickSource for SystemTicks {
    fn now_ticks(&self) -> i64 {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        i64::try_from(nanos / NANOS_PER_TICK as u128).unwrap_or(i64::MAX)
    }
}

/// A tick source that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualTicks {
    tick: AtomicI64,
}

impl ManualTicks {
    /// Create a source starting at the given tick.
    pub fn new(start: i64) -> Self {
        Self {
            tick: AtomicI64::new(start),
        }
    }

    /// Set the current tick.
    pub fn set(&self, tick: i64) {
        self.tick.store(tick, Ordering::SeqCst);
    }

    /// Move the current tick forward.
    pub fn advance(&self, ticks: i64) {
        self.tick.fetch_add(ticks, Ordering::SeqCst);
    }
}

impl TickSource for ManualTicks {
    fn now_ticks(&self) -> i64 {
        self.tick.load(Ordering::SeqCst)
    }
}
