//! Scheduled-event bookkeeping.
//!
//! Windows are recomputed on every sixteenth tick, so the same bar is
//! offered for scheduling many times before its window closes. The registry
//! remembers which trigger ids are already registered and retires stale
//! entries as the playhead moves on.

use std::collections::HashMap;

/// Owned by the scheduler; entries live from registration until purged.
#[derive(Debug, Default)]
pub struct EventRegistry {
    /// Trigger id -> scheduling bar it belongs to.
    pending: HashMap<String, u32>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the id was newly registered; false means it is
    /// already pending and the caller must skip re-scheduling it.
    pub fn try_register(&mut self, id: &str, bar: u32) -> bool {
        if self.pending.contains_key(id) {
            return false;
        }
        self.pending.insert(id.to_string(), bar);
        true
    }

    /// Drop entries whose bar is strictly below `cutoff_bar - 1`, keeping
    /// the current and immediately preceding bar's bookkeeping.
    pub fn purge_before(&mut self, cutoff_bar: u32) {
        let keep_from = cutoff_bar.saturating_sub(1);
        self.pending.retain(|_, bar| *bar >= keep_from);
    }

    /// Drop everything; used on stop.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_ids_are_rejected_while_pending() {
        let mut registry = EventRegistry::new();
        assert!(registry.try_register("track-1-0-0", 0));
        assert!(!registry.try_register("track-1-0-0", 0));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn purge_keeps_current_and_previous_bar() {
        let mut registry = EventRegistry::new();
        registry.try_register("t-0-0", 0);
        registry.try_register("t-3-0", 3);
        registry.try_register("t-4-0", 4);
        registry.try_register("t-5-0", 5);

        registry.purge_before(5);

        assert!(!registry.try_register("t-4-0", 4), "bar 4 must survive");
        assert!(!registry.try_register("t-5-0", 5), "bar 5 must survive");
        assert!(registry.try_register("t-0-0", 0), "bar 0 was purged");
        assert!(registry.try_register("t-3-0", 3), "bar 3 was purged");
    }

    #[test]
    fn purge_at_bar_zero_does_not_underflow() {
        let mut registry = EventRegistry::new();
        registry.try_register("t-0-0", 0);
        registry.purge_before(0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn clear_drops_everything() {
        let mut registry = EventRegistry::new();
        registry.try_register("a", 0);
        registry.try_register("b", 9);
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.try_register("a", 0));
    }
}
