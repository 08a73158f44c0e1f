use crate::{CfaEdgeId, CfaNodeId};
use thiserror::Error;

/// An error raised while assembling or querying a [`Cfa`](crate::Cfa).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CfaError {
    /// A call or lookup referenced a function that was never declared
    #[error("function `{0}` is not defined")]
    UnknownFunction(String),
    /// The same function name was declared twice
    #[error("function `{0}` is defined more than once")]
    DuplicateFunction(String),
    /// A node id that does not belong to this automaton
    #[error("node {0} does not exist")]
    UnknownNode(CfaNodeId),
    /// An edge id that does not belong to this automaton
    #[error("edge {0} does not exist")]
    UnknownEdge(CfaEdgeId),
    /// A textual description named a node its function does not declare
    #[error("node `{node}` is not declared in function `{function}`")]
    UnknownNodeName { function: String, node: String },
    /// An edge connects nodes of two different functions without being a call or return
    #[error("edge {from} -> {to} crosses a function boundary")]
    CrossFunctionEdge { from: CfaNodeId, to: CfaNodeId },
    /// An edge was added leaving a function's exit node
    #[error("node {0} is a function exit and cannot have intraprocedural successors")]
    EdgeFromExit(CfaNodeId),
}
