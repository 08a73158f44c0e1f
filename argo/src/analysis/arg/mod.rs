//! The abstract reachability graph.
//!
//! States live in an arena keyed by [`StateId`]. Ids are handed out in increasing order and are
//! never reused, so an id names one state for the lifetime of the graph. Parent, child and
//! covering relations are stored as id sets on both ends and are always updated together.

mod path;

pub use path::ArgPath;

use argo_cfa::CfaEdgeId;
use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StateId(pub u32);

impl Display for StateId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArgError {
    #[error("state {0} is not part of the reachability graph")]
    UnknownState(StateId),
    #[error("state {0} is not in the reached set")]
    NotReached(StateId),
    #[error("state {0} still has children and cannot be removed")]
    NotALeaf(StateId),
    #[error("state {0} is already covered by {1}")]
    AlreadyCovered(StateId, StateId),
    #[error("state {0} has several parents, the path to it is ambiguous")]
    AmbiguousPath(StateId),
    #[error("no path from a root leads to state {0}")]
    Unreachable(StateId),
}

#[derive(Debug, Clone)]
pub struct ArgNode<S> {
    state: Arc<S>,
    parents: BTreeMap<StateId, Option<CfaEdgeId>>,
    children: BTreeSet<StateId>,
    covered_by: Option<StateId>,
    covering: BTreeSet<StateId>,
}

impl<S> ArgNode<S> {
    fn new(state: Arc<S>) -> Self {
        Self {
            state,
            parents: BTreeMap::new(),
            children: BTreeSet::new(),
            covered_by: None,
            covering: BTreeSet::new(),
        }
    }

    pub fn state(&self) -> &Arc<S> {
        &self.state
    }

    pub fn parents(&self) -> impl Iterator<Item = StateId> + '_ {
        self.parents.keys().copied()
    }

    /// The CFA edge taken from `parent` to this state.
    pub fn edge_from(&self, parent: StateId) -> Option<CfaEdgeId> {
        self.parents.get(&parent).copied().flatten()
    }

    pub fn children(&self) -> impl Iterator<Item = StateId> + '_ {
        self.children.iter().copied()
    }

    pub fn covered_by(&self) -> Option<StateId> {
        self.covered_by
    }

    /// States this state covers.
    pub fn covering(&self) -> impl Iterator<Item = StateId> + '_ {
        self.covering.iter().copied()
    }

    pub fn is_covered(&self) -> bool {
        self.covered_by.is_some()
    }
}

/// What [`Arg::remove_from_graph`] detached.
#[derive(Debug, Clone)]
pub struct RemovedState<S> {
    pub state: Arc<S>,
    pub parents: Vec<StateId>,
    /// States that were covered by the removed state and now are not
    pub uncovered: Vec<StateId>,
}

#[derive(Debug, Clone)]
pub struct Arg<S> {
    nodes: BTreeMap<StateId, ArgNode<S>>,
    next_id: u32,
}

impl<S> Default for Arg<S> {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            next_id: 0,
        }
    }
}

impl<S> Arg<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: StateId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = StateId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn node(&self, id: StateId) -> Option<&ArgNode<S>> {
        self.nodes.get(&id)
    }

    pub fn state(&self, id: StateId) -> Option<&Arc<S>> {
        self.nodes.get(&id).map(|n| &n.state)
    }

    fn node_mut(&mut self, id: StateId) -> Result<&mut ArgNode<S>, ArgError> {
        self.nodes.get_mut(&id).ok_or(ArgError::UnknownState(id))
    }

    fn fresh(&mut self, state: Arc<S>) -> StateId {
        let id = StateId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, ArgNode::new(state));
        id
    }

    /// Drop every state. Ids keep counting up from where they were.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn add_root(&mut self, state: S) -> StateId {
        self.fresh(Arc::new(state))
    }

    pub fn add_child(
        &mut self,
        parent: StateId,
        state: S,
        edge: Option<CfaEdgeId>,
    ) -> Result<StateId, ArgError> {
        if !self.contains(parent) {
            return Err(ArgError::UnknownState(parent));
        }
        let id = self.fresh(Arc::new(state));
        self.add_edge(parent, id, edge)?;
        Ok(id)
    }

    /// Record that `child` is also a successor of `parent`.
    pub fn add_edge(
        &mut self,
        parent: StateId,
        child: StateId,
        edge: Option<CfaEdgeId>,
    ) -> Result<(), ArgError> {
        if !self.contains(child) {
            return Err(ArgError::UnknownState(child));
        }
        self.node_mut(parent)?.children.insert(child);
        self.node_mut(child)?.parents.insert(parent, edge);
        Ok(())
    }

    /// Mark `covered` as subsumed by `by`. A state has at most one covering state.
    pub fn set_covered(&mut self, covered: StateId, by: StateId) -> Result<(), ArgError> {
        if !self.contains(by) {
            return Err(ArgError::UnknownState(by));
        }
        let node = self.node_mut(covered)?;
        if let Some(existing) = node.covered_by {
            return Err(ArgError::AlreadyCovered(covered, existing));
        }
        node.covered_by = Some(by);
        self.node_mut(by)?.covering.insert(covered);
        Ok(())
    }

    pub fn uncover(&mut self, covered: StateId) -> Result<Option<StateId>, ArgError> {
        let by = self.node_mut(covered)?.covered_by.take();
        if let Some(by) = by {
            self.node_mut(by)?.covering.remove(&covered);
        }
        Ok(by)
    }

    /// Remove a leaf, detaching it from its parents and from both sides of the covering
    /// relation in one step.
    pub fn remove_from_graph(&mut self, id: StateId) -> Result<RemovedState<S>, ArgError> {
        let node = self.node(id).ok_or(ArgError::UnknownState(id))?;
        if !node.children.is_empty() {
            return Err(ArgError::NotALeaf(id));
        }
        let parents = node.parents().collect();
        let uncovered = node.covering().collect();
        let mut removed = self.remove_all(&BTreeSet::from([id]))?;
        let state = removed
            .pop()
            .map(|n| n.state)
            .ok_or(ArgError::UnknownState(id))?;
        Ok(RemovedState {
            state,
            parents,
            uncovered,
        })
    }

    /// Remove a set of states at once. Relations between members are dropped together with the
    /// members; relations to the rest of the graph are unlinked on the surviving side.
    pub(crate) fn remove_all(
        &mut self,
        ids: &BTreeSet<StateId>,
    ) -> Result<Vec<ArgNode<S>>, ArgError> {
        if let Some(missing) = ids.iter().find(|id| !self.contains(**id)) {
            return Err(ArgError::UnknownState(*missing));
        }
        let removed: Vec<(StateId, ArgNode<S>)> = ids
            .iter()
            .filter_map(|id| self.nodes.remove(id).map(|n| (*id, n)))
            .collect();
        for (id, node) in &removed {
            for parent in node.parents.keys() {
                if let Some(p) = self.nodes.get_mut(parent) {
                    p.children.remove(id);
                }
            }
            for child in &node.children {
                if let Some(c) = self.nodes.get_mut(child) {
                    c.parents.remove(id);
                }
            }
            if let Some(by) = node.covered_by
                && let Some(b) = self.nodes.get_mut(&by)
            {
                b.covering.remove(id);
            }
            for covered in &node.covering {
                if let Some(c) = self.nodes.get_mut(covered) {
                    c.covered_by = None;
                }
            }
        }
        Ok(removed.into_iter().map(|(_, n)| n).collect())
    }

    /// Put `state` in the place of `old`: the new state takes over every parent, child and
    /// covering relation and `old` is removed.
    pub fn replace(&mut self, old: StateId, state: S) -> Result<StateId, ArgError> {
        let old_node = self.nodes.remove(&old).ok_or(ArgError::UnknownState(old))?;
        let state = Arc::new(state);
        let new = self.fresh(state.clone());
        let rename = |id: StateId| if id == old { new } else { id };

        let mut node = ArgNode::new(state);
        for (parent, edge) in &old_node.parents {
            node.parents.insert(rename(*parent), *edge);
        }
        node.children = old_node.children.iter().map(|c| rename(*c)).collect();
        node.covered_by = old_node.covered_by.map(rename);
        node.covering = old_node.covering.iter().map(|c| rename(*c)).collect();

        for parent in old_node.parents.keys().filter(|p| **p != old) {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.children.remove(&old);
                p.children.insert(new);
            }
        }
        for child in old_node.children.iter().filter(|c| **c != old) {
            if let Some(c) = self.nodes.get_mut(child)
                && let Some(edge) = c.parents.remove(&old)
            {
                c.parents.insert(new, edge);
            }
        }
        if let Some(by) = old_node.covered_by.filter(|b| *b != old)
            && let Some(b) = self.nodes.get_mut(&by)
        {
            b.covering.remove(&old);
            b.covering.insert(new);
        }
        for covered in old_node.covering.iter().filter(|c| **c != old) {
            if let Some(c) = self.nodes.get_mut(covered) {
                c.covered_by = Some(new);
            }
        }
        self.nodes.insert(new, node);
        Ok(new)
    }

    /// `root` and everything reachable from it through child edges, not entering `stop`.
    pub fn subtree(&self, root: StateId, stop: Option<StateId>) -> BTreeSet<StateId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if (id != root && Some(id) == stop) || !seen.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.iter().copied());
            }
        }
        seen.retain(|id| self.contains(*id));
        seen
    }

    /// A shortest path from a root to `id`. Where a state has several parents, parents with
    /// smaller ids are preferred.
    pub fn path_to(&self, id: StateId) -> Result<ArgPath, ArgError> {
        if !self.contains(id) {
            return Err(ArgError::UnknownState(id));
        }
        let mut towards: BTreeMap<StateId, StateId> = BTreeMap::new();
        let mut queue = VecDeque::from([id]);
        let mut visited = BTreeSet::from([id]);
        while let Some(current) = queue.pop_front() {
            let node = &self.nodes[&current];
            if node.parents.is_empty() {
                let mut states = vec![current];
                let mut edges = vec![];
                let mut at = current;
                while let Some(next) = towards.get(&at) {
                    edges.push(self.nodes[next].edge_from(at));
                    states.push(*next);
                    at = *next;
                }
                return Ok(ArgPath::new(states, edges));
            }
            for parent in node.parents() {
                if self.contains(parent) && visited.insert(parent) {
                    towards.insert(parent, current);
                    queue.push_back(parent);
                }
            }
        }
        Err(ArgError::Unreachable(id))
    }

    /// The path from the root to `id`, requiring every state on it to have a single parent.
    pub fn unique_path_to(&self, id: StateId) -> Result<ArgPath, ArgError> {
        let mut states = vec![id];
        let mut edges = vec![];
        let mut current = id;
        loop {
            let node = self.node(current).ok_or(ArgError::UnknownState(current))?;
            let mut parents = node.parents.iter();
            let Some((parent, edge)) = parents.next() else {
                break;
            };
            if parents.next().is_some() {
                return Err(ArgError::AmbiguousPath(current));
            }
            if states.contains(parent) {
                return Err(ArgError::Unreachable(id));
            }
            states.push(*parent);
            edges.push(*edge);
            current = *parent;
        }
        states.reverse();
        edges.reverse();
        Ok(ArgPath::new(states, edges))
    }

    /// Every state that `id` depends on: its ancestors through parent edges and through the
    /// states covering them.
    pub fn transitive_parents(&self, id: StateId) -> BTreeSet<StateId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            for next in node.parents().chain(node.covered_by) {
                if next != id && seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        seen
    }

    pub fn roots(&self) -> impl Iterator<Item = StateId> + '_ {
        self.nodes
            .iter()
            .filter(|(_, n)| n.parents.is_empty())
            .map(|(id, _)| *id)
    }

    /// Render the graph in graphviz format. Child edges are solid, covering edges dashed.
    pub fn to_dot(&self) -> String
    where
        S: Debug,
    {
        let mut graph: DiGraph<String, String> = DiGraph::new();
        let mut index: BTreeMap<StateId, NodeIndex> = BTreeMap::new();
        for (id, node) in &self.nodes {
            index.insert(*id, graph.add_node(format!("{id}: {:?}", node.state)));
        }
        for (id, node) in &self.nodes {
            for (parent, edge) in &node.parents {
                let label = edge.map(|e| e.to_string()).unwrap_or_default();
                graph.add_edge(index[parent], index[id], label);
            }
            if let Some(by) = node.covered_by {
                graph.add_edge(index[id], index[&by], "covered".to_string());
            }
        }
        format!("{:?}", Dot::new(&graph))
    }
}
