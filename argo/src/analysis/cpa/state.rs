use argo_cfa::{BlockId, CfaEdge, CfaEdgeId, CfaNodeId, Identifier};
use std::fmt::Debug;

/// Core trait for abstract states used by the CPA.
///
/// States are values: the engine never mutates a state after handing it to the reached set, it
/// only replaces it (see [`MergeOutcome`]).
pub trait AbstractState: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// The program location this state belongs to, if the domain tracks one.
    fn location(&self) -> Option<CfaNodeId>;

    /// Whether this state represents a property violation.
    fn is_target(&self) -> bool {
        false
    }

    fn violated_properties(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Marker for precisions. Every cloneable, comparable, thread-safe type qualifies.
pub trait Precision: Clone + Debug + PartialEq + Send + Sync + 'static {}

impl<T: Clone + Debug + PartialEq + Send + Sync + 'static> Precision for T {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome<S> {
    NoOp,
    /// The reached state should be replaced by this one. The new state MUST be at least as
    /// abstract as the reached state it replaces.
    Merged(S),
}

impl<S> MergeOutcome<S> {
    pub fn merged(&self) -> bool {
        matches!(self, MergeOutcome::Merged(_))
    }
}

/// A successor state together with the CFA edge that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Successor<S> {
    pub state: S,
    pub edge: Option<CfaEdgeId>,
}

impl<S> Successor<S> {
    pub fn new(state: S, edge: Option<CfaEdgeId>) -> Self {
        Self { state, edge }
    }

    pub fn map<T, F: FnOnce(S) -> T>(self, f: F) -> Successor<T> {
        Successor {
            state: f(self.state),
            edge: self.edge,
        }
    }
}

/// Information about a block whose summary is needed before a transfer can complete.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockRequest<S, P> {
    pub block: BlockId,
    pub function: Identifier,
    /// The (reduced) state at the block entry
    pub entry: S,
    pub precision: P,
}

/// Result of applying a transfer relation.
///
/// Besides plain successors, a transfer may signal that a block summary is missing or that a
/// property was violated while computing successors. Neither is an error: the engine stops and
/// hands the signal to its caller, leaving the reached set ready to resume.
#[derive(Debug, Clone, PartialEq)]
pub enum Transfer<S, P> {
    Successors(Vec<Successor<S>>),
    MissingBlock(BlockRequest<S, P>),
    PropertyViolation(String),
}

impl<S, P> Transfer<S, P> {
    pub fn none() -> Self {
        Transfer::Successors(Vec::new())
    }

    /// Successors all produced by `edge`.
    pub fn along<I: IntoIterator<Item = S>>(edge: &CfaEdge, states: I) -> Self {
        Transfer::Successors(
            states
                .into_iter()
                .map(|s| Successor::new(s, Some(edge.id)))
                .collect(),
        )
    }

    /// Map plain successors, passing signals through unchanged.
    pub fn map_successors<T, F: FnMut(S) -> T>(self, mut f: F) -> Transfer<T, P> {
        match self {
            Transfer::Successors(s) => {
                Transfer::Successors(s.into_iter().map(|s| s.map(&mut f)).collect())
            }
            Transfer::MissingBlock(req) => Transfer::MissingBlock(BlockRequest {
                block: req.block,
                function: req.function,
                entry: f(req.entry),
                precision: req.precision,
            }),
            Transfer::PropertyViolation(p) => Transfer::PropertyViolation(p),
        }
    }

    pub fn successors(&self) -> Option<&[Successor<S>]> {
        match self {
            Transfer::Successors(s) => Some(s),
            _ => None,
        }
    }
}
