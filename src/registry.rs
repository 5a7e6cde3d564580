use crate::tracker::AllowanceTracker;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Thread-safe identifier -> tracker map with create-on-first-use semantics.
///
/// Lookups for existing identifiers take the sharded read path only; the
/// shard write lock is held just for the brief moment a brand-new tracker is
/// inserted. Each entry carries its own mutex so admission decisions for
/// different identifiers never contend.
#[derive(Debug, Default)]
pub struct AllowanceTrackerRegistry {
    trackers: DashMap<String, Arc<Mutex<AllowanceTracker>>>,
}

impl AllowanceTrackerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the tracker for `identifier`, creating it with `init` exactly
    /// once even when many threads race on first use.
    pub fn tracker_for<F>(&self, identifier: &str, init: F) -> Arc<Mutex<AllowanceTracker>>
    where
        F: FnOnce() -> AllowanceTracker,
    {
        if let Some(existing) = self.trackers.get(identifier) {
            return existing.value().clone();
        }
        self.trackers
            .entry(identifier.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(init())))
            .value()
            .clone()
    }

    /// Read-only lookup that never creates a tracker.
    pub fn peek(&self, identifier: &str) -> Option<Arc<Mutex<AllowanceTracker>>> {
        self.trackers.get(identifier).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::{WindowDefinitionSet, WindowKind};
    use std::thread;

    fn windows() -> WindowDefinitionSet {
        let mut set = WindowDefinitionSet::new("test", "requests");
        set.add_definition(WindowKind::Burst, 10.0).unwrap();
        set
    }

    #[test]
    fn test_same_tracker_for_same_identifier() {
        let registry = AllowanceTrackerRegistry::new();
        let set = windows();
        let a = registry.tracker_for("user-1", || AllowanceTracker::new("user-1", &set, 0));
        let b = registry.tracker_for("user-1", || AllowanceTracker::new("user-1", &set, 0));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_peek_does_not_create() {
        let registry = AllowanceTrackerRegistry::new();
        assert!(registry.peek("nobody").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_first_use_creates_exactly_once() {
        let registry = Arc::new(AllowanceTrackerRegistry::new());
        let set = Arc::new(windows());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let set = Arc::clone(&set);
                thread::spawn(move || {
                    let tracker =
                        registry.tracker_for("shared", || AllowanceTracker::new("shared", &set, 0));
                    Arc::as_ptr(&tracker) as usize
                })
            })
            .collect();

        let pointers: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(pointers.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(registry.len(), 1);
    }
}
