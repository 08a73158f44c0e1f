use crate::analysis::cpa::state::AbstractState;
use argo_cfa::CfaNodeId;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// How the location analysis treats function call edges
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CallBehavior {
    /// Follow the call into the callee, and every return edge out of it
    #[default]
    Branch,
    /// Continue at the return site as if the call did nothing
    StepOver,
    /// Terminate this path
    Terminate,
}

/// A program location. Two locations are either equal or incomparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocationState {
    node: CfaNodeId,
    error: bool,
}

impl LocationState {
    pub(crate) fn new(node: CfaNodeId, error: bool) -> Self {
        Self { node, error }
    }

    pub fn node(&self) -> CfaNodeId {
        self.node
    }
}

impl Display for LocationState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.node)?;
        if self.error {
            write!(f, " (error)")?;
        }
        Ok(())
    }
}

impl PartialOrd for LocationState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        (self == other).then_some(Ordering::Equal)
    }
}

impl AbstractState for LocationState {
    fn location(&self) -> Option<CfaNodeId> {
        Some(self.node)
    }

    fn is_target(&self) -> bool {
        self.error
    }

    fn violated_properties(&self) -> Vec<String> {
        if self.error {
            vec![format!("error location {} reachable", self.node)]
        } else {
            Vec::new()
        }
    }
}
