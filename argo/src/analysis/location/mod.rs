use crate::CpaError;
use crate::analysis::cpa::operators::{MergeSep, StopSep};
use crate::analysis::cpa::state::Transfer;
use crate::analysis::cpa::{ConfigurableProgramAnalysis, MergeOperator, StopOperator, TransferRelation};
use crate::analysis::location::state::{CallBehavior, LocationState};
use argo_cfa::{Cfa, CfaEdge, CfaNodeId, EdgeKind};
use std::sync::Arc;

pub mod state;


/// Tracks the program location only. Reaching an error location is a property violation.
#[derive(Debug, Clone)]
pub struct LocationCpa {
    cfa: Arc<Cfa>,
    call_behavior: CallBehavior,
}

impl LocationCpa {
    pub fn new(cfa: Arc<Cfa>) -> Self {
        Self {
            cfa,
            call_behavior: CallBehavior::default(),
        }
    }

    pub fn call_behavior(&self) -> CallBehavior {
        self.call_behavior
    }

    pub fn set_call_behavior(&mut self, behavior: CallBehavior) {
        self.call_behavior = behavior;
    }

    pub fn with_call_behavior(mut self, behavior: CallBehavior) -> Self {
        self.call_behavior = behavior;
        self
    }

    pub fn state_at(&self, node: CfaNodeId) -> LocationState {
        LocationState::new(node, self.cfa.is_error(node))
    }
}

impl TransferRelation<LocationState, ()> for LocationCpa {
    fn successors_for_edge(
        &self,
        state: &LocationState,
        _: &(),
        edge: &CfaEdge,
    ) -> Result<Transfer<LocationState, ()>, CpaError> {
        if edge.source != state.node() {
            return Ok(Transfer::none());
        }
        let next = match (&edge.kind, self.call_behavior) {
            (EdgeKind::FunctionCall { .. }, CallBehavior::Terminate) => None,
            (EdgeKind::FunctionCall { return_site, .. }, CallBehavior::StepOver) => {
                Some(*return_site)
            }
            // Stepping over calls never enters a callee, so returns are only seen when the
            // analysis started inside one.
            (EdgeKind::FunctionReturn { .. }, CallBehavior::StepOver | CallBehavior::Terminate) => {
                None
            }
            _ => Some(edge.target),
        };
        Ok(Transfer::along(edge, next.map(|n| self.state_at(n))))
    }
}

impl ConfigurableProgramAnalysis for LocationCpa {
    type State = LocationState;
    type Precision = ();

    fn transfer_relation(&self) -> &dyn TransferRelation<LocationState, ()> {
        self
    }

    fn merge_operator(&self) -> &dyn MergeOperator<LocationState, ()> {
        &MergeSep
    }

    fn stop_operator(&self) -> &dyn StopOperator<LocationState, ()> {
        &StopSep
    }

    fn initial_state(&self, node: CfaNodeId) -> LocationState {
        self.state_at(node)
    }

    fn initial_precision(&self, _: CfaNodeId) {}
}
