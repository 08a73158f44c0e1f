//! Explicit-value analysis: tracks the concrete value of each variable selected by the
//! precision, and nothing about the others.

use crate::CpaError;
use crate::analysis::cpa::operators::{MergeJoin, MergeSep, StopSep};
use crate::analysis::cpa::state::Transfer;
use crate::analysis::cpa::{ConfigurableProgramAnalysis, MergeOperator, StopOperator, TransferRelation};
use argo_cfa::{CfaEdge, CfaNodeId, EdgeKind};

pub mod precision;
pub mod refiner;
pub mod state;


pub use precision::{VariablePrecision, WithVariablePrecision};
pub use refiner::ValueRefiner;
pub use state::ValueState;

/// How states reaching the same location are combined.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
pub enum MergeBehavior {
    /// Keep them apart (path-sensitive).
    #[default]
    Sep,
    /// Keep only the values they agree on.
    Join,
}

#[derive(Debug, Clone, Default)]
pub struct ValueCpa {
    merge_behavior: MergeBehavior,
    precision: VariablePrecision,
}

impl ValueCpa {
    /// Starts out tracking no variable at all; refinement adds variables as needed.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_merge_behavior(mut self, behavior: MergeBehavior) -> Self {
        self.merge_behavior = behavior;
        self
    }

    pub fn with_precision(mut self, precision: VariablePrecision) -> Self {
        self.precision = precision;
        self
    }

    /// The successor along `edge`, or `None` if the edge is infeasible.
    pub fn step(
        state: &ValueState,
        precision: &VariablePrecision,
        edge: &CfaEdge,
    ) -> Option<ValueState> {
        match &edge.kind {
            EdgeKind::Assign { var, expr } => Some(state.assign(*var, expr, precision)),
            EdgeKind::Assume { expr, truth } => state.assume(expr, *truth, precision),
            EdgeKind::Blank | EdgeKind::FunctionCall { .. } | EdgeKind::FunctionReturn { .. } => {
                Some(state.clone())
            }
        }
    }
}

impl TransferRelation<ValueState, VariablePrecision> for ValueCpa {
    fn successors_for_edge(
        &self,
        state: &ValueState,
        precision: &VariablePrecision,
        edge: &CfaEdge,
    ) -> Result<Transfer<ValueState, VariablePrecision>, CpaError> {
        Ok(Transfer::along(edge, Self::step(state, precision, edge)))
    }
}

impl ConfigurableProgramAnalysis for ValueCpa {
    type State = ValueState;
    type Precision = VariablePrecision;

    fn transfer_relation(&self) -> &dyn TransferRelation<ValueState, VariablePrecision> {
        self
    }

    fn merge_operator(&self) -> &dyn MergeOperator<ValueState, VariablePrecision> {
        match self.merge_behavior {
            MergeBehavior::Sep => &MergeSep,
            MergeBehavior::Join => &MergeJoin,
        }
    }

    fn stop_operator(&self) -> &dyn StopOperator<ValueState, VariablePrecision> {
        &StopSep
    }

    fn initial_state(&self, _: CfaNodeId) -> ValueState {
        ValueState::new()
    }

    fn initial_precision(&self, _: CfaNodeId) -> VariablePrecision {
        self.precision.clone()
    }
}
