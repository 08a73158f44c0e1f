use crate::loops::LoopStructure;
use crate::{Expr, Identifier};
use petgraph::Direction;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::prelude::DiGraph;
use petgraph::visit::DfsPostOrder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Index of a location in a [`Cfa`]. Ids are dense and stable for the lifetime of the automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CfaNodeId(pub u32);

impl CfaNodeId {
    pub(crate) fn index(self) -> NodeIndex {
        NodeIndex::new(self.0 as usize)
    }
}

impl Display for CfaNodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// Index of an edge in a [`Cfa`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CfaEdgeId(pub u32);

impl CfaEdgeId {
    pub(crate) fn index(self) -> EdgeIndex {
        EdgeIndex::new(self.0 as usize)
    }
}

impl Display for CfaEdgeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "E{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfaNode {
    pub id: CfaNodeId,
    /// The function this location belongs to
    pub function: Identifier,
    /// Reaching this location violates the checked property
    pub is_error: bool,
}

/// The operation performed when control moves along an edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Blank,
    Assign {
        var: Identifier,
        expr: Expr,
    },
    /// Control passes only if `expr` evaluates to `truth`
    Assume {
        expr: Expr,
        truth: bool,
    },
    /// Edge from a call site into the callee's entry. `return_site` is where the caller resumes.
    FunctionCall {
        callee: Identifier,
        return_site: CfaNodeId,
    },
    /// Edge from the callee's exit back to one of its return sites.
    FunctionReturn {
        callee: Identifier,
    },
}

impl EdgeKind {
    pub fn is_interprocedural(&self) -> bool {
        matches!(
            self,
            EdgeKind::FunctionCall { .. } | EdgeKind::FunctionReturn { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CfaEdge {
    pub id: CfaEdgeId,
    pub source: CfaNodeId,
    pub target: CfaNodeId,
    pub kind: EdgeKind,
}

impl Display for CfaEdge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            EdgeKind::Blank => write!(f, "{} -> {}", self.source, self.target),
            EdgeKind::Assign { var, expr } => {
                write!(f, "{} -[{} = {}]-> {}", self.source, var.as_str(), expr, self.target)
            }
            EdgeKind::Assume { expr, truth } => {
                let neg = if *truth { "" } else { "!" };
                write!(f, "{} -[{neg}{expr}]-> {}", self.source, self.target)
            }
            EdgeKind::FunctionCall { callee, .. } => {
                write!(f, "{} -[call {}]-> {}", self.source, callee.as_str(), self.target)
            }
            EdgeKind::FunctionReturn { callee } => {
                write!(f, "{} -[return {}]-> {}", self.source, callee.as_str(), self.target)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionInfo {
    pub name: Identifier,
    pub entry: CfaNodeId,
    pub exit: CfaNodeId,
}

/// A control-flow automaton: locations connected by labelled edges, grouped into functions.
///
/// Built with [`CfaBuilder`](crate::CfaBuilder). Once built, the automaton is immutable and can
/// be shared freely between analyses running on different threads.
#[derive(Debug, Clone)]
pub struct Cfa {
    graph: DiGraph<CfaNode, CfaEdge>,
    functions: BTreeMap<Identifier, FunctionInfo>,
    main: Identifier,
    reverse_postorder: Vec<u32>,
    loops: LoopStructure,
}

impl Cfa {
    pub(crate) fn new(
        graph: DiGraph<CfaNode, CfaEdge>,
        functions: BTreeMap<Identifier, FunctionInfo>,
        main: Identifier,
    ) -> Self {
        let entries: Vec<CfaNodeId> = std::iter::once(functions[&main].entry)
            .chain(functions.values().map(|f| f.entry))
            .collect();
        let reverse_postorder = compute_reverse_postorder(&graph, &entries);
        let loops = LoopStructure::compute(&graph, &entries);
        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            loops = loops.loops().len(),
            "built cfa"
        );
        Self {
            graph,
            functions,
            main,
            reverse_postorder,
            loops,
        }
    }

    /// Entry location of the main function.
    pub fn entry(&self) -> CfaNodeId {
        self.main_function().entry
    }

    pub fn main_function(&self) -> &FunctionInfo {
        &self.functions[&self.main]
    }

    pub fn function(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.values().find(|f| f.name.as_str() == name)
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionInfo> {
        self.functions.values()
    }

    pub fn node(&self, id: CfaNodeId) -> Option<&CfaNode> {
        self.graph.node_weight(id.index())
    }

    pub fn edge(&self, id: CfaEdgeId) -> Option<&CfaEdge> {
        self.graph.edge_weight(id.index())
    }

    pub fn nodes(&self) -> impl Iterator<Item = &CfaNode> {
        self.graph.node_weights()
    }

    pub fn edges(&self) -> impl Iterator<Item = &CfaEdge> {
        self.graph.edge_weights()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_error(&self, id: CfaNodeId) -> bool {
        self.node(id).is_some_and(|n| n.is_error)
    }

    /// Edges leaving `id`, in insertion order.
    pub fn leaving_edges(&self, id: CfaNodeId) -> Vec<&CfaEdge> {
        self.edges_directed(id, Direction::Outgoing)
    }

    /// Edges entering `id`, in insertion order.
    pub fn entering_edges(&self, id: CfaNodeId) -> Vec<&CfaEdge> {
        self.edges_directed(id, Direction::Incoming)
    }

    fn edges_directed(&self, id: CfaNodeId, dir: Direction) -> Vec<&CfaEdge> {
        if self.node(id).is_none() {
            return vec![];
        }
        let mut edges: Vec<&CfaEdge> = self
            .graph
            .edges_directed(id.index(), dir)
            .map(|e| e.weight())
            .collect();
        edges.sort_by_key(|e| e.id);
        edges
    }

    /// Position of `id` in a reverse postorder of the automaton. Smaller numbers come first in
    /// a topological traversal; loop heads precede their bodies.
    pub fn reverse_postorder(&self, id: CfaNodeId) -> u32 {
        self.reverse_postorder
            .get(id.0 as usize)
            .copied()
            .unwrap_or(u32::MAX)
    }

    pub fn loop_structure(&self) -> &LoopStructure {
        &self.loops
    }
}

fn compute_reverse_postorder(graph: &DiGraph<CfaNode, CfaEdge>, entries: &[CfaNodeId]) -> Vec<u32> {
    let mut postorder = Vec::with_capacity(graph.node_count());
    let mut dfs = DfsPostOrder::empty(graph);
    let starts = entries
        .iter()
        .map(|e| e.index())
        .chain(graph.node_indices());
    for start in starts {
        if dfs.discovered.contains(start.index()) {
            continue;
        }
        dfs.move_to(start);
        while let Some(n) = dfs.next(graph) {
            postorder.push(n);
        }
    }
    let mut order = vec![0u32; graph.node_count()];
    let len = postorder.len();
    for (pos, n) in postorder.into_iter().enumerate() {
        order[n.index()] = (len - 1 - pos) as u32;
    }
    order
}
