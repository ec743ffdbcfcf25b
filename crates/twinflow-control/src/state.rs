//! [`ConditionState`] – the shared per-feed condition map.
//!
//! Each feed's entry has exactly one writer (its watcher task); the control
//! loop reads concurrently.  One lock guards the whole map with short hold
//! times and no `.await` while held, so a reader never observes a
//! half-updated entry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use twinflow_types::{Condition, FeedHandle};

/// Cheaply clonable handle to the shared condition map.  All clones share
/// the same underlying storage.
#[derive(Clone, Debug, Default)]
pub struct ConditionState {
    inner: Arc<RwLock<HashMap<FeedHandle, Condition>>>,
}

impl ConditionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `condition` for `feed`, returning `true` if the stored value
    /// changed.  A feed with no entry counts as [`Condition::Absent`].
    pub fn set(&self, feed: &FeedHandle, condition: Condition) -> bool {
        let mut map = self.inner.write().expect("condition map lock poisoned");
        let previous = map.insert(feed.clone(), condition).unwrap_or(Condition::Absent);
        previous != condition
    }

    /// Current condition for `feed`; [`Condition::Absent`] when no reading
    /// has been evaluated yet.
    pub fn get(&self, feed: &FeedHandle) -> Condition {
        self.inner
            .read()
            .expect("condition map lock poisoned")
            .get(feed)
            .copied()
            .unwrap_or(Condition::Absent)
    }

    /// Consistent copy of the whole map, taken under the lock as a unit.
    pub fn snapshot(&self) -> HashMap<FeedHandle, Condition> {
        self.inner
            .read()
            .expect("condition map lock poisoned")
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(id: &str) -> FeedHandle {
        FeedHandle::new(format!("did:twin:{id}"), "", id)
    }

    #[test]
    fn missing_entry_reads_as_absent() {
        let state = ConditionState::new();
        assert_eq!(state.get(&feed("a")), Condition::Absent);
    }

    #[test]
    fn set_reports_change() {
        let state = ConditionState::new();
        // Absent -> Clear is a change.
        assert!(state.set(&feed("a"), Condition::Clear));
        // Clear -> Clear is not.
        assert!(!state.set(&feed("a"), Condition::Clear));
        // Clear -> Holds is.
        assert!(state.set(&feed("a"), Condition::Holds));
        assert_eq!(state.get(&feed("a")), Condition::Holds);
    }

    #[test]
    fn stored_condition_reflects_latest_write_only() {
        let state = ConditionState::new();
        state.set(&feed("a"), Condition::Clear);
        state.set(&feed("a"), Condition::Holds);
        state.set(&feed("a"), Condition::Clear);
        assert_eq!(state.get(&feed("a")), Condition::Clear);
    }

    #[test]
    fn snapshot_copies_all_entries() {
        let state = ConditionState::new();
        state.set(&feed("a"), Condition::Holds);
        state.set(&feed("b"), Condition::Clear);

        let snap = state.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[&feed("a")], Condition::Holds);
        assert_eq!(snap[&feed("b")], Condition::Clear);

        // Later writes do not alter an already-taken snapshot.
        state.set(&feed("a"), Condition::Clear);
        assert_eq!(snap[&feed("a")], Condition::Holds);
    }

    #[test]
    fn clones_share_storage() {
        let state = ConditionState::new();
        let alias = state.clone();
        alias.set(&feed("a"), Condition::Holds);
        assert_eq!(state.get(&feed("a")), Condition::Holds);
    }
}
