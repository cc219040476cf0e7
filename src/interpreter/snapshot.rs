//! Change-counted snapshots.

use crate::core::StateValue;
use crate::effects::{merge, Deferred};
use crate::interpreter::node::Node;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Immutable view of a machine at one value of its change counter.
///
/// Snapshots are cached: while the counter stays put, the machine hands out
/// the same `Rc<Snapshot>`, so observers can compare with `Rc::ptr_eq`.
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    /// Change counter when the snapshot was taken
    pub change: u64,
    /// Shape of the active path
    pub state: StateValue,
    /// Names of the entry effects run by the active path, outermost first
    pub pending_entry_actions: Vec<String>,
    /// Tags exposed by the active path
    pub tags: BTreeSet<String>,
    /// Combined effect results of the active path
    #[serde(skip)]
    pub results: Option<Deferred>,
}

impl Snapshot {
    pub(crate) fn capture(root: &Node, change: u64) -> Self {
        let path = root.active_path();
        let pending_entry_actions = path
            .iter()
            .flat_map(|node| node.registry().entry_names().iter().cloned())
            .collect();
        let tags = path
            .iter()
            .flat_map(|node| node.registry().tags().iter().cloned())
            .collect();
        let results: Vec<Deferred> = path.iter().filter_map(|node| node.result().cloned()).collect();

        Self {
            change,
            state: root.inner_value(),
            pending_entry_actions,
            tags,
            results: if results.is_empty() {
                None
            } else {
                Some(merge(results))
            },
        }
    }

    /// Snapshot of a machine with nothing but a root name.
    pub(crate) fn bare(root: &str, change: u64) -> Self {
        Self {
            change,
            state: StateValue::state(root),
            pending_entry_actions: Vec::new(),
            tags: BTreeSet::new(),
            results: None,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// True when the active path passes through `state`.
    pub fn is_in(&self, state: &str) -> bool {
        self.state.is_in(state)
    }
}

/// Last snapshot built, reused until the change counter moves.
#[derive(Default)]
pub(crate) struct SnapshotCache {
    last: RefCell<Option<Rc<Snapshot>>>,
}

impl SnapshotCache {
    /// Cached snapshot if it was taken at `change`.
    pub(crate) fn fresh(&self, change: u64) -> Option<Rc<Snapshot>> {
        self.last
            .borrow()
            .as_ref()
            .filter(|snapshot| snapshot.change == change)
            .cloned()
    }

    pub(crate) fn store(&self, snapshot: Snapshot) -> Rc<Snapshot> {
        let snapshot = Rc::new(snapshot);
        *self.last.borrow_mut() = Some(snapshot.clone());
        snapshot
    }

    pub(crate) fn last(&self) -> Option<Rc<Snapshot>> {
        self.last.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_is_reused_until_change_moves() {
        let cache = SnapshotCache::default();
        assert!(cache.fresh(0).is_none());

        let first = cache.store(Snapshot::bare("Off", 0));
        let again = cache.fresh(0).unwrap();
        assert!(Rc::ptr_eq(&first, &again));
        assert!(cache.fresh(1).is_none());
        assert!(Rc::ptr_eq(&cache.last().unwrap(), &first));
    }

    #[test]
    fn snapshot_serializes_without_results() {
        let mut snapshot = Snapshot::bare("Off", 3);
        snapshot.tags.insert("idle".to_string());
        snapshot.results = Some(Deferred::resolved(1));

        assert_eq!(
            serde_json::to_value(&snapshot).unwrap(),
            serde_json::json!({
                "change": 3,
                "state": "Off",
                "pending_entry_actions": [],
                "tags": ["idle"]
            })
        );
        assert!(snapshot.has_tag("idle"));
        assert!(snapshot.is_in("Off"));
    }
}
