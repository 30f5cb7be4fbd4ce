//! Rolling time windows for expiring quotas.
//!
//! A window counts the units allocated during each tick of the trailing
//! `window_ticks` ticks. Allocations older than that roll out and no longer
//! count against capacity. This gives exact accounting at tick granularity,
//! at the cost of one slot per tick that saw an allocation.

use std::collections::VecDeque;
use std::time::Duration;

/// Number of ticks per second.
pub const TICKS_PER_SECOND: i64 = 10;

/// Nanoseconds per tick.
pub const NANOS_PER_TICK: i64 = 1_000_000_000 / TICKS_PER_SECOND;

/// Get the window length in ticks for an expiration, rounded up.
pub fn window_ticks(expiration: Duration) -> i64 {
    let per_tick = NANOS_PER_TICK as u128;
    let ticks = (expiration.as_nanos() + per_tick - 1) / per_tick;
    i64::try_from(ticks).unwrap_or(i64::MAX).max(1)
}

/// Units allocated during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    tick: i64,
    amount: i64,
}

/// A sliding-window allocation counter for one key.
#[derive(Debug)]
pub struct RollingWindow {
    /// Maximum units in use within the window
    capacity: i64,
    /// Length of the window in ticks
    window_ticks: i64,
    /// Allocation slots in ascending tick order
    slots: VecDeque<Slot>,
    /// Sum of all slot amounts
    in_window: i64,
}

impl RollingWindow {
    /// Create an empty window.
    pub fn new(capacity: i64, window_ticks: i64) -> Self {
        Self {
            capacity,
            window_ticks: window_ticks.max(1),
            slots: VecDeque::new(),
            in_window: 0,
        }
    }

    /// Get the capacity of this window.
    pub fn capacity(&self) -> i64 {
        self.capacity
    }

    /// Get the window length in ticks.
    pub fn window_ticks(&self) -> i64 {
        self.window_ticks
    }

    /// Get the units still available at the given tick.
    pub fn available(&mut self, tick: i64) -> i64 {
        self.purge(tick);
        (self.capacity - self.in_window).max(0)
    }

    /// Get the units counted within the window at the given tick.
    pub fn in_use(&mut self, tick: i64) -> i64 {
        self.purge(tick);
        self.in_window
    }

    /// Allocate up to `amount` units at the given tick.
    ///
    /// Strict requests get all or nothing; best-effort requests get whatever
    /// is available. Returns the number of units granted.
    pub fn alloc(&mut self, amount: i64, tick: i64, best_effort: bool) -> i64 {
        let available = self.available(tick);

        let granted = if amount <= available {
            amount
        } else if best_effort {
            available
        } else {
            0
        };

        if granted > 0 {
            self.record(granted, tick);
        }
        granted
    }

    /// Release up to `amount` units, oldest allocations first.
    ///
    /// Returns the number of units actually released.
    pub fn release(&mut self, amount: i64, tick: i64) -> i64 {
        self.purge(tick);

        let released = amount.min(self.in_window).max(0);
        let mut remaining = released;

        while remaining > 0 {
            let Some(front) = self.slots.front_mut() else {
                break;
            };

            if front.amount <= remaining {
                remaining -= front.amount;
                self.slots.pop_front();
            } else {
                front.amount -= remaining;
                remaining = 0;
            }
        }

        self.in_window -= released;
        released
    }

    fn record(&mut self, amount: i64, tick: i64) {
        self.in_window += amount;

        // A tick source that steps backwards folds into the newest slot so
        // slots stay ordered.
        if let Some(back) = self.slots.back_mut() {
            if back.tick >= tick {
                back.amount += amount;
                return;
            }
        }
        self.slots.push_back(Slot { tick, amount });
    }

    /// Drop slots that have rolled out of the window.
    fn purge(&mut self, tick: i64) {
        let horizon = tick.saturating_sub(self.window_ticks);

        while let Some(front) = self.slots.front() {
            if front.tick > horizon {
                break;
            }
            self.in_window -= front.amount;
            self.slots.pop_front();
        }
    }
}
