//! # Event Deduplication Module
//!
//! Tracks which chat event identifiers have already been acted upon during the
//! process lifetime. The chat transport re-delivers events across polls, so
//! every event is checked here before it reaches the reply pipeline.
//!
//! Memory is bounded by a full reset: once more than `threshold` identifiers
//! are stored, the whole set is cleared. After a reset a re-delivered event can
//! be processed again. Replies stay single-shot because the reply dispatcher
//! keeps its own per-chat guard, but media attachments of such an event may be
//! downloaded and uploaded a second time. This is a known limitation.

use std::collections::HashSet;
use tracing::debug;

/// Default number of identifiers kept before the set is cleared
pub const DEFAULT_DEDUP_THRESHOLD: usize = 1000;

/// In-memory event deduplication store
#[derive(Debug)]
pub struct EventDeduplicator {
    /// Identifiers marked since the last reset
    seen_ids: HashSet<String>,
    /// Size above which the set is cleared
    threshold: usize,
    /// Number of full resets performed
    resets: u64,
    /// Number of `seen` checks that hit a stored identifier
    duplicates: u64,
}

impl EventDeduplicator {
    /// Create a new deduplicator with the given reset threshold
    pub fn new(threshold: usize) -> Self {
        Self {
            seen_ids: HashSet::new(),
            threshold,
            resets: 0,
            duplicates: 0,
        }
    }

    /// Check whether an event was already marked.
    ///
    /// Returns true if the event should be skipped.
    pub fn seen(&mut self, event_id: &str) -> bool {
        let hit = self.seen_ids.contains(event_id);
        if hit {
            self.duplicates += 1;
        }
        hit
    }

    /// Mark an event as processed, clearing the whole set when it grows past the threshold
    pub fn mark(&mut self, event_id: &str) {
        self.seen_ids.insert(event_id.to_string());

        if self.seen_ids.len() > self.threshold {
            debug!(
                stored = self.seen_ids.len(),
                threshold = self.threshold,
                "Event id set exceeded threshold, clearing"
            );
            self.seen_ids.clear();
            self.resets += 1;
            crate::observability::record_dedup_reset();
        }
    }

    /// Get statistics about the deduplicator
    pub fn stats(&self) -> DeduplicationStats {
        DeduplicationStats {
            stored_ids: self.seen_ids.len(),
            threshold: self.threshold,
            resets: self.resets,
            duplicates: self.duplicates,
        }
    }
}

/// Statistics about the deduplication system
#[derive(Debug, Clone, PartialEq)]
pub struct DeduplicationStats {
    /// Identifiers currently stored
    pub stored_ids: usize,
    /// Size above which the set is cleared
    pub threshold: usize,
    /// Number of full resets performed
    pub resets: u64,
    /// Number of duplicate events detected
    pub duplicates: u64,
}

impl Default for EventDeduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deduplication_basic() {
        let mut deduplicator = EventDeduplicator::default();

        assert!(!deduplicator.seen("e1"));
        deduplicator.mark("e1");
        assert!(deduplicator.seen("e1"));

        // Different id is still new
        assert!(!deduplicator.seen("e2"));
    }

    #[test]
    fn test_reset_after_threshold_exceeded() {
        let mut deduplicator = EventDeduplicator::default();

        for i in 0..1000 {
            deduplicator.mark(&format!("event-{i}"));
        }
        // Exactly at the threshold nothing is cleared
        assert!(deduplicator.seen("event-0"));
        assert_eq!(deduplicator.stats().stored_ids, 1000);

        deduplicator.mark("event-1000");

        for i in 0..1000 {
            assert!(!deduplicator.seen(&format!("event-{i}")));
        }
        let stats = deduplicator.stats();
        assert_eq!(stats.stored_ids, 0);
        assert_eq!(stats.resets, 1);
    }

    #[test]
    fn test_small_threshold() {
        let mut deduplicator = EventDeduplicator::new(2);
        deduplicator.mark("a");
        deduplicator.mark("b");
        assert!(deduplicator.seen("a"));

        deduplicator.mark("c");
        assert!(!deduplicator.seen("a"));
        assert!(!deduplicator.seen("c"));
    }

    #[test]
    fn test_statistics() {
        let mut deduplicator = EventDeduplicator::new(10);
        assert_eq!(deduplicator.stats().duplicates, 0);

        deduplicator.mark("e1");
        assert!(deduplicator.seen("e1"));
        assert!(deduplicator.seen("e1"));

        let stats = deduplicator.stats();
        assert_eq!(stats.stored_ids, 1);
        assert_eq!(stats.duplicates, 2);
        assert_eq!(stats.threshold, 10);
    }
}
