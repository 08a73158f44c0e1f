use crate::analysis::arg::{ArgError, ArgPath, StateId};
use argo_cfa::{CfaEdgeId, CfaError};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Why a refiner could not rule out a counterexample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Reason {
    InterpolationFailed,
    RepeatedCounterexample,
    InfeasibleCounterexample,
}

impl Display for Reason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Reason::InterpolationFailed => write!(f, "interpolation failed"),
            Reason::RepeatedCounterexample => write!(f, "counterexample repeated"),
            Reason::InfeasibleCounterexample => {
                write!(f, "infeasible counterexample could not be eliminated")
            }
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("refinement failed ({reason}) on path {path}")]
pub struct RefinementFailure {
    pub reason: Reason,
    pub path: ArgPath,
}

impl RefinementFailure {
    pub fn new(reason: Reason, path: ArgPath) -> Self {
        Self { reason, path }
    }
}

#[derive(Debug, Error)]
pub enum CpaError {
    #[error(transparent)]
    RefinementFailed(#[from] RefinementFailure),
    #[error("Unsupported code on edge {edge}: {message}")]
    UnsupportedCode {
        message: String,
        edge: CfaEdgeId,
        /// The state whose successors could not be computed, once known to the engine
        state: Option<StateId>,
    },
    #[error("Analysis was interrupted")]
    Interrupted,
    #[error("Resource limit exhausted: {0}")]
    ResourceExhausted(String),
    #[error("Recursive call to `{0}` cannot be summarized")]
    Recursion(String),
    #[error("Solver failure: {0}")]
    Solver(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Reachability graph misuse")]
    Arg(#[from] ArgError),
    #[error("Malformed control-flow automaton")]
    Cfa(#[from] CfaError),
}

impl CpaError {
    /// Failures that end one analysis without saying anything about the program. Parallel
    /// orchestration logs and ignores these instead of cancelling the other analyses.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            CpaError::Interrupted | CpaError::ResourceExhausted(_) | CpaError::Recursion(_)
        )
    }

    pub(crate) fn at_state(self, id: StateId) -> Self {
        match self {
            CpaError::UnsupportedCode {
                message,
                edge,
                state: None,
            } => CpaError::UnsupportedCode {
                message,
                edge,
                state: Some(id),
            },
            e => e,
        }
    }
}
