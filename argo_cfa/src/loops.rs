use crate::{CfaEdge, CfaEdgeId, CfaNode, CfaNodeId};
use petgraph::Direction;
use petgraph::prelude::DiGraph;
use petgraph::visit::{DfsEvent, EdgeFiltered, depth_first_search};
use std::collections::{BTreeMap, BTreeSet};

/// A natural loop of a single function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loop {
    pub head: CfaNodeId,
    /// Every location of the loop body, including the head
    pub nodes: BTreeSet<CfaNodeId>,
    /// Edges from the body back to the head
    pub back_edges: Vec<CfaEdgeId>,
    /// Edges entering the head from outside the loop
    pub incoming_edges: Vec<CfaEdgeId>,
    /// Edges leaving the body
    pub outgoing_edges: Vec<CfaEdgeId>,
}

impl Loop {
    pub fn contains(&self, node: CfaNodeId) -> bool {
        self.nodes.contains(&node)
    }
}

/// The loops of a [`Cfa`](crate::Cfa), found from the back edges of a depth-first traversal of
/// each function. Call and return edges never close a loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStructure {
    loops: Vec<Loop>,
    back_edges: BTreeSet<CfaEdgeId>,
}

impl LoopStructure {
    pub(crate) fn compute(graph: &DiGraph<CfaNode, CfaEdge>, entries: &[CfaNodeId]) -> Self {
        let local = EdgeFiltered::from_fn(graph, |e| !e.weight().kind.is_interprocedural());
        let starts = entries
            .iter()
            .map(|e| e.index())
            .chain(graph.node_indices());
        let mut back_edges = BTreeSet::new();
        depth_first_search(&local, starts, |event| {
            if let DfsEvent::BackEdge(u, v) = event {
                for e in graph.edges_connecting(u, v) {
                    if !e.weight().kind.is_interprocedural() {
                        back_edges.insert(e.weight().id);
                    }
                }
            }
        });

        let mut by_head: BTreeMap<CfaNodeId, Vec<&CfaEdge>> = BTreeMap::new();
        for id in &back_edges {
            if let Some(edge) = graph.edge_weight(id.index()) {
                by_head.entry(edge.target).or_default().push(edge);
            }
        }

        let loops = by_head
            .into_iter()
            .map(|(head, back)| natural_loop(graph, head, &back))
            .collect();
        Self { loops, back_edges }
    }

    pub fn loops(&self) -> &[Loop] {
        &self.loops
    }

    pub fn heads(&self) -> impl Iterator<Item = CfaNodeId> + '_ {
        self.loops.iter().map(|l| l.head)
    }

    pub fn is_back_edge(&self, edge: CfaEdgeId) -> bool {
        self.back_edges.contains(&edge)
    }

    pub fn is_loop_head(&self, node: CfaNodeId) -> bool {
        self.loops.iter().any(|l| l.head == node)
    }

    pub fn loop_at(&self, head: CfaNodeId) -> Option<&Loop> {
        self.loops.iter().find(|l| l.head == head)
    }
}

fn natural_loop(graph: &DiGraph<CfaNode, CfaEdge>, head: CfaNodeId, back: &[&CfaEdge]) -> Loop {
    let mut nodes = BTreeSet::from([head]);
    let mut stack: Vec<CfaNodeId> = back.iter().map(|e| e.source).collect();
    while let Some(n) = stack.pop() {
        if !nodes.insert(n) {
            continue;
        }
        for e in graph.edges_directed(n.index(), Direction::Incoming) {
            if !e.weight().kind.is_interprocedural() {
                stack.push(e.weight().source);
            }
        }
    }

    let incoming_edges = graph
        .edges_directed(head.index(), Direction::Incoming)
        .map(|e| e.weight())
        .filter(|e| !nodes.contains(&e.source))
        .map(|e| e.id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let outgoing_edges = nodes
        .iter()
        .flat_map(|n| graph.edges_directed(n.index(), Direction::Outgoing))
        .map(|e| e.weight())
        .filter(|e| !e.kind.is_interprocedural() && !nodes.contains(&e.target))
        .map(|e| e.id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    Loop {
        head,
        back_edges: back.iter().map(|e| e.id).collect(),
        nodes,
        incoming_edges,
        outgoing_edges,
    }
}
