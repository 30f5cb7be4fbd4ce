//! In-use counters for non-expiring quotas.

use std::collections::HashMap;

/// Flat map from key to the number of units currently in use.
///
/// A cell only exists while its in-use amount is positive.
#[derive(Debug, Default)]
pub struct CellStore {
    cells: HashMap<String, i64>,
}

impl CellStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate up to `amount` units against `max` for the given key.
    ///
    /// Returns the number of units granted.
    pub fn alloc(&mut self, key: &str, max: i64, amount: i64, best_effort: bool) -> i64 {
        let in_use = self.in_use(key);
        let mut granted = amount;

        if granted > max - in_use {
            if !best_effort {
                return 0;
            }

            // grab as much as we can
            granted = (max - in_use).max(0);
        }

        if granted > 0 {
            self.cells.insert(key.to_string(), in_use + granted);
        }
        granted
    }

    /// Release up to `amount` units for the given key.
    ///
    /// Returns the number of units actually released.
    pub fn release(&mut self, key: &str, amount: i64) -> i64 {
        let Some(in_use) = self.cells.get_mut(key) else {
            return 0;
        };

        if amount >= *in_use {
            let released = *in_use;
            self.cells.remove(key);
            return released;
        }

        *in_use -= amount;
        amount
    }

    /// Get the in-use amount for a key.
    pub fn in_use(&self, key: &str) -> i64 {
        self.cells.get(key).copied().unwrap_or(0)
    }

    /// Get the number of live cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no cell is live.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
