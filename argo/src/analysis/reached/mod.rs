//! The reached set: explored states, their precisions, and the waitlist of states still to
//! explore.
//!
//! Every reached state is a node of the reachability graph owned by the reached set. The graph
//! may hold more nodes than the reached set: successors that were covered on arrival stay in the
//! graph (so paths through them can be reported) but are never explored.

mod listener;
pub mod waitlist;

pub use listener::{AggregatedReachedSets, AggregatingListener, ReachedSetUpdateListener};

use crate::analysis::arg::{Arg, ArgError, StateId};
use crate::analysis::cpa::state::{AbstractState, Precision};
use crate::analysis::reached::waitlist::{SimpleWaitlist, Waitlist};
use crate::config::TraversalOrder;
use argo_cfa::{Cfa, CfaEdgeId, CfaNodeId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// Counts describing a reached set, cheap to copy around and publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ReachedSummary {
    pub states: usize,
    pub waiting: usize,
    pub targets: usize,
    pub covered: usize,
}

#[derive(Debug)]
pub struct ReachedSet<S, P> {
    arg: Arg<S>,
    precisions: BTreeMap<StateId, P>,
    by_location: BTreeMap<Option<CfaNodeId>, BTreeSet<StateId>>,
    waitlist: Box<dyn Waitlist<S>>,
    /// Properties violated by states that are not targets on their own
    violations: BTreeMap<StateId, String>,
    first: Option<StateId>,
    last: Option<StateId>,
}

impl<S: AbstractState, P: Precision> Default for ReachedSet<S, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: AbstractState, P: Precision> ReachedSet<S, P> {
    /// An empty reached set exploring in breadth-first order.
    pub fn new() -> Self {
        Self::with_waitlist(Box::new(SimpleWaitlist::breadth_first()))
    }

    pub fn with_waitlist(waitlist: Box<dyn Waitlist<S>>) -> Self {
        Self {
            arg: Arg::new(),
            precisions: BTreeMap::new(),
            by_location: BTreeMap::new(),
            waitlist,
            violations: BTreeMap::new(),
            first: None,
            last: None,
        }
    }

    pub fn with_order(order: TraversalOrder, cfa: Arc<Cfa>) -> Self {
        Self::with_waitlist(waitlist::for_order(order, cfa))
    }

    /// Add a root state. The first root added becomes [`first_state`](Self::first_state).
    pub fn add_initial(&mut self, state: S, precision: P) -> StateId {
        let id = self.arg.add_root(state);
        self.first.get_or_insert(id);
        self.track(id, precision);
        id
    }

    /// Add `state` as a successor of `parent`, reached over `edge`, and queue it.
    pub fn add(
        &mut self,
        state: S,
        precision: P,
        parent: StateId,
        edge: Option<CfaEdgeId>,
    ) -> Result<StateId, ArgError> {
        let id = self.arg.add_child(parent, state, edge)?;
        self.track(id, precision);
        Ok(id)
    }

    /// Record `state` as a successor of `parent` that is covered by the reached state `by`. The
    /// new node is part of the graph only; it is neither reached nor waiting.
    pub fn cover(
        &mut self,
        parent: StateId,
        state: S,
        edge: Option<CfaEdgeId>,
        by: StateId,
    ) -> Result<StateId, ArgError> {
        if !self.contains(by) {
            return Err(ArgError::NotReached(by));
        }
        let id = self.arg.add_child(parent, state, edge)?;
        self.arg.set_covered(id, by)?;
        Ok(id)
    }

    /// Record that `child` is also reachable from `parent` over `edge`.
    pub fn add_edge(
        &mut self,
        parent: StateId,
        child: StateId,
        edge: Option<CfaEdgeId>,
    ) -> Result<(), ArgError> {
        self.arg.add_edge(parent, child, edge)
    }

    /// Replace the reached state `old` by `state` (the result of a merge). The new state takes
    /// over the graph relations of `old` and is queued for exploration.
    pub fn replace(&mut self, old: StateId, state: S, precision: P) -> Result<StateId, ArgError> {
        if !self.contains(old) {
            return Err(ArgError::NotReached(old));
        }
        let was_first = self.first == Some(old);
        let new = self.arg.replace(old, state)?;
        self.forget(old);
        if was_first {
            self.first = Some(new);
        }
        self.track(new, precision);
        Ok(new)
    }

    fn track(&mut self, id: StateId, precision: P) {
        if let Some(state) = self.arg.state(id) {
            self.by_location
                .entry(state.location())
                .or_default()
                .insert(id);
            self.waitlist.push(id, state);
        }
        self.precisions.insert(id, precision);
        self.last = Some(id);
    }

    fn forget(&mut self, id: StateId) -> Option<P> {
        self.waitlist.remove(id);
        self.violations.remove(&id);
        self.by_location.retain(|_, ids| {
            ids.remove(&id);
            !ids.is_empty()
        });
        if self.first == Some(id) {
            self.first = None;
        }
        if self.last == Some(id) {
            self.last = None;
        }
        self.precisions.remove(&id)
    }

    /// Remove a leaf of the reachability graph. Parents of states it covered are explored again.
    pub fn remove(&mut self, id: StateId) -> Result<(), ArgError> {
        let node = self.arg.node(id).ok_or(ArgError::UnknownState(id))?;
        if node.children().next().is_some() {
            return Err(ArgError::NotALeaf(id));
        }
        self.remove_below(id, false).map(|_| ())
    }

    /// Remove `root` and everything below it, then queue the parents of `root` so that the
    /// removed part is explored again (under whatever precision they now carry).
    ///
    /// States that were covered by a removed state are removed too, and their parents queued.
    /// The first state is only removed when it is `root` itself. Returns the removed ids.
    pub fn remove_subtree(&mut self, root: StateId) -> Result<BTreeSet<StateId>, ArgError> {
        self.remove_below(root, true)
    }

    /// Like [`remove_subtree`](Self::remove_subtree), without re-exploring the parents of
    /// `root`. Used to cut off a path for good.
    pub fn prune(&mut self, root: StateId) -> Result<BTreeSet<StateId>, ArgError> {
        self.remove_below(root, false)
    }

    fn remove_below(
        &mut self,
        root: StateId,
        requeue_parents: bool,
    ) -> Result<BTreeSet<StateId>, ArgError> {
        if !self.arg.contains(root) {
            return Err(ArgError::UnknownState(root));
        }
        let stop = self.first.filter(|f| *f != root);
        let mut doomed = self.arg.subtree(root, stop);
        let uncovered: BTreeSet<StateId> = doomed
            .iter()
            .filter_map(|id| self.arg.node(*id))
            .flat_map(|n| n.covering())
            .filter(|c| !doomed.contains(c))
            .collect();
        for covered in &uncovered {
            doomed.extend(self.arg.subtree(*covered, stop));
        }

        let mut requeue = BTreeSet::new();
        for id in uncovered.iter().chain(requeue_parents.then_some(&root)) {
            if let Some(node) = self.arg.node(*id) {
                requeue.extend(node.parents().filter(|p| !doomed.contains(p)));
            }
        }

        self.arg.remove_all(&doomed)?;
        for id in &doomed {
            self.forget(*id);
        }
        for id in requeue {
            if self.contains(id) {
                self.re_add_to_waitlist(id)?;
            }
        }
        debug!(
            root = %root,
            removed = doomed.len(),
            uncovered = uncovered.len(),
            "removed subtree"
        );
        Ok(doomed)
    }

    /// Drop everything and start over from a single initial state.
    pub fn restart(&mut self, state: S, precision: P) -> StateId {
        self.arg.clear();
        self.precisions.clear();
        self.by_location.clear();
        self.waitlist.clear();
        self.violations.clear();
        self.first = None;
        self.last = None;
        self.add_initial(state, precision)
    }

    pub fn pop_from_waitlist(&mut self) -> Option<StateId> {
        self.waitlist.pop()
    }

    pub fn re_add_to_waitlist(&mut self, id: StateId) -> Result<(), ArgError> {
        if !self.contains(id) {
            return Err(ArgError::NotReached(id));
        }
        let state = self.arg.state(id).ok_or(ArgError::UnknownState(id))?;
        self.waitlist.push(id, state);
        Ok(())
    }

    /// Take `id` off the waitlist. It stays reached, and is only explored again when re-added.
    pub fn remove_from_waitlist(&mut self, id: StateId) -> bool {
        self.waitlist.remove(id)
    }

    pub fn clear_waitlist(&mut self) {
        self.waitlist.clear();
    }

    pub fn has_waiting_state(&self) -> bool {
        !self.waitlist.is_empty()
    }

    pub fn is_waiting(&self, id: StateId) -> bool {
        self.waitlist.contains(id)
    }

    /// Waiting states in the order they would be popped.
    pub fn waiting(&self) -> Vec<StateId> {
        self.waitlist.ids()
    }

    pub fn contains(&self, id: StateId) -> bool {
        self.precisions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.precisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.precisions.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = StateId> + '_ {
        self.precisions.keys().copied()
    }

    /// Reached states with their precisions, in id order.
    pub fn iter(&self) -> impl Iterator<Item = (StateId, &S, &P)> + '_ {
        self.precisions
            .iter()
            .filter_map(|(id, p)| self.arg.state(*id).map(|s| (*id, s.as_ref(), p)))
    }

    /// The state of any graph node, reached or covered.
    pub fn state(&self, id: StateId) -> Option<&S> {
        self.arg.state(id).map(|s| s.as_ref())
    }

    pub fn state_arc(&self, id: StateId) -> Option<Arc<S>> {
        self.arg.state(id).cloned()
    }

    pub fn precision(&self, id: StateId) -> Option<&P> {
        self.precisions.get(&id)
    }

    pub fn set_precision(&mut self, id: StateId, precision: P) -> Result<(), ArgError> {
        match self.precisions.get_mut(&id) {
            Some(p) => {
                *p = precision;
                Ok(())
            }
            None => Err(ArgError::NotReached(id)),
        }
    }

    /// Reached states at `location`, in id order.
    pub fn states_at(&self, location: Option<CfaNodeId>) -> Vec<StateId> {
        self.by_location
            .get(&location)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn first_state(&self) -> Option<StateId> {
        self.first
    }

    /// The state added most recently, if it is still reached.
    pub fn last_state(&self) -> Option<StateId> {
        self.last
    }

    pub fn arg(&self) -> &Arg<S> {
        &self.arg
    }

    /// Record that computing the successors of `id` violated `property`.
    pub fn mark_violation<T: Into<String>>(
        &mut self,
        id: StateId,
        property: T,
    ) -> Result<(), ArgError> {
        if !self.contains(id) {
            return Err(ArgError::NotReached(id));
        }
        self.violations.insert(id, property.into());
        Ok(())
    }

    pub fn is_target(&self, id: StateId) -> bool {
        self.violations.contains_key(&id) || self.state(id).is_some_and(|s| s.is_target())
    }

    pub fn violated_properties(&self, id: StateId) -> Vec<String> {
        let mut properties = self.state(id).map(|s| s.violated_properties()).unwrap_or_default();
        properties.extend(self.violations.get(&id).cloned());
        properties
    }

    pub fn target_states(&self) -> Vec<StateId> {
        self.ids().filter(|id| self.is_target(*id)).collect()
    }

    pub fn has_target_state(&self) -> bool {
        self.ids().any(|id| self.is_target(id))
    }

    pub fn summary(&self) -> ReachedSummary {
        ReachedSummary {
            states: self.len(),
            waiting: self.waitlist.len(),
            targets: self.target_states().len(),
            covered: self
                .arg
                .ids()
                .filter(|id| self.arg.node(*id).is_some_and(|n| n.is_covered()))
                .count(),
        }
    }
}

#[cfg(test)]
mod tests;
