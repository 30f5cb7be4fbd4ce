//! Two-generation deduplication cache.
//!
//! Results are recorded into the "recent" generation. Each reclamation drops
//! the "old" generation and demotes "recent" to "old", so an id is remembered
//! for at least one and at most two reclamation intervals.

use std::collections::HashMap;

/// Maps deduplication ids to the amount previously returned for them.
#[derive(Debug, Default)]
pub struct DedupCache {
    /// The two generations; `recent` indexes the one receiving new records
    generations: [HashMap<String, i64>; 2],
    recent: usize,
}

impl DedupCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a previously recorded result, checking the recent generation first.
    pub fn lookup(&self, dedup_id: &str) -> Option<i64> {
        self.generations[self.recent]
            .get(dedup_id)
            .or_else(|| self.generations[self.old()].get(dedup_id))
            .copied()
    }

    /// Record a result in the recent generation.
    pub fn record(&mut self, dedup_id: &str, amount: i64) {
        self.generations[self.recent].insert(dedup_id.to_string(), amount);
    }

    /// Discard the old generation and demote the recent one.
    ///
    /// The discarded map is cleared in place and reused as the new recent
    /// generation.
    pub fn reclaim(&mut self) {
        self.recent = self.old();
        self.generations[self.recent].clear();
    }

    /// Get the number of remembered ids across both generations.
    pub fn len(&self) -> usize {
        self.generations[0].len() + self.generations[1].len()
    }

    /// Whether no id is remembered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn old(&self) -> usize {
        self.recent ^ 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_lookup() {
        let mut cache = DedupCache::new();

        assert_eq!(cache.lookup("a"), None);
        cache.record("a", 3);
        assert_eq!(cache.lookup("a"), Some(3));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_results_are_remembered() {
        let mut cache = DedupCache::new();

        cache.record("denied", 0);
        assert_eq!(cache.lookup("denied"), Some(0));
    }

    #[test]
    fn test_survives_one_reclaim() {
        let mut cache = DedupCache::new();

        cache.record("a", 3);
        cache.reclaim();
        assert_eq!(cache.lookup("a"), Some(3));
    }

    #[test]
    fn test_forgotten_after_two_reclaims() {
        let mut cache = DedupCache::new();

        cache.record("a", 3);
        cache.reclaim();
        cache.reclaim();
        assert_eq!(cache.lookup("a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_recent_generation_wins() {
        let mut cache = DedupCache::new();

        cache.record("a", 1);
        cache.reclaim();
        cache.record("a", 2);
        assert_eq!(cache.lookup("a"), Some(2));
    }

    #[test]
    fn test_reclaim_only_drops_old_generation() {
        let mut cache = DedupCache::new();

        cache.record("first", 1);
        cache.reclaim();
        cache.record("second", 2);
        cache.reclaim();

        assert_eq!(cache.lookup("first"), None);
        assert_eq!(cache.lookup("second"), Some(2));
        assert_eq!(cache.len(), 1);
    }
}
