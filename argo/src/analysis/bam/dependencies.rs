use crate::analysis::arg::StateId;
use crate::analysis::bam::cache::ReachedSetId;
use std::collections::{BTreeMap, BTreeSet};

/// Which reached sets wait for which sub-analyses.
///
/// A parent waits at one state (the call it could not complete) for one child; a child may be
/// awaited by any number of parents. Both directions are stored and kept mirror images of each
/// other.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    waiting_on: BTreeMap<(ReachedSetId, StateId), ReachedSetId>,
    dependents: BTreeMap<ReachedSetId, BTreeSet<(ReachedSetId, StateId)>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `parent` cannot go on at `state` before `child` is finished.
    pub fn add(&mut self, parent: ReachedSetId, state: StateId, child: ReachedSetId) {
        let previous = self.waiting_on.insert((parent, state), child);
        assert!(
            previous.is_none_or(|p| p == child),
            "{parent} at {state} already waits on another reached set"
        );
        self.dependents
            .entry(child)
            .or_default()
            .insert((parent, state));
        self.assert_consistent();
    }

    /// Forget everything waiting on `child`, returning who was waiting.
    pub fn remove_child(&mut self, child: ReachedSetId) -> BTreeSet<(ReachedSetId, StateId)> {
        let waiting = self.dependents.remove(&child).unwrap_or_default();
        for key in &waiting {
            let removed = self.waiting_on.remove(key);
            assert_eq!(removed, Some(child), "dependency maps out of sync");
        }
        self.assert_consistent();
        waiting
    }

    pub fn is_waiting(&self, parent: ReachedSetId) -> bool {
        self.waiting_on.keys().any(|(p, _)| *p == parent)
    }

    pub fn dependents_of(&self, child: ReachedSetId) -> impl Iterator<Item = (ReachedSetId, StateId)> + '_ {
        self.dependents.get(&child).into_iter().flatten().copied()
    }

    /// Every reached set that transitively waits on `id`.
    pub fn ancestors(&self, id: ReachedSetId) -> BTreeSet<ReachedSetId> {
        let mut seen = BTreeSet::new();
        let mut todo = vec![id];
        while let Some(current) = todo.pop() {
            for (parent, _) in self.dependents_of(current) {
                if seen.insert(parent) {
                    todo.push(parent);
                }
            }
        }
        seen
    }

    pub fn len(&self) -> usize {
        self.waiting_on.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting_on.is_empty()
    }

    fn assert_consistent(&self) {
        debug_assert_eq!(
            self.waiting_on.len(),
            self.dependents.values().map(BTreeSet::len).sum::<usize>(),
            "dependency maps out of sync"
        );
    }
}
