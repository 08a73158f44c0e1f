//! Stock merge, stop and precision-adjustment operators.

use crate::CpaError;
use crate::analysis::cpa::lattice::JoinSemiLattice;
use crate::analysis::cpa::state::{AbstractState, MergeOutcome, Precision};
use crate::analysis::cpa::{MergeOperator, PrecisionAdjustment, StopOperator};
use crate::analysis::reached::ReachedSet;
use std::cmp::Ordering;

/// Never merge: every successor is kept separately.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeSep;

impl<S, P> MergeOperator<S, P> for MergeSep {
    fn merge(&self, _: &S, _: &S, _: &P) -> MergeOutcome<S> {
        MergeOutcome::NoOp
    }

    fn is_sep(&self) -> bool {
        true
    }
}

/// Replace the reached state by the join of both states.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeJoin;

impl<S: JoinSemiLattice + Clone, P> MergeOperator<S, P> for MergeJoin {
    fn merge(&self, successor: &S, reached: &S, _: &P) -> MergeOutcome<S> {
        if successor <= reached {
            MergeOutcome::NoOp
        } else {
            MergeOutcome::Merged(reached.joined(successor))
        }
    }
}

/// Covered iff some reached state is at least as abstract, by the state's partial order.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopSep;

impl<S: PartialOrd, P> StopOperator<S, P> for StopSep {
    fn covered_by(&self, state: &S, reached: &[&S], _: &P) -> Option<usize> {
        reached.iter().position(|r| {
            matches!(
                PartialOrd::partial_cmp(state, *r),
                Some(Ordering::Less) | Some(Ordering::Equal)
            )
        })
    }
}

/// Never covered. Only terminates on acyclic state spaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopNever;

impl<S, P> StopOperator<S, P> for StopNever {
    fn covered_by(&self, _: &S, _: &[&S], _: &P) -> Option<usize> {
        None
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Action {
    #[default]
    Continue,
    /// Stop exploring now; the engine re-queues the current state and the new successor.
    Break,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Adjusted<S, P> {
    pub state: S,
    pub precision: P,
    pub action: Action,
}

impl<S, P> Adjusted<S, P> {
    pub fn unchanged(state: S, precision: P) -> Self {
        Self {
            state,
            precision,
            action: Action::Continue,
        }
    }
}

/// Keeps state and precision as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPrecisionAdjustment;

impl<S: AbstractState, P: Precision> PrecisionAdjustment<S, P> for StaticPrecisionAdjustment {
    fn adjust(
        &self,
        state: S,
        precision: P,
        _: &ReachedSet<S, P>,
    ) -> Result<Adjusted<S, P>, CpaError> {
        Ok(Adjusted::unchanged(state, precision))
    }
}
