pub mod algorithm;
pub mod lattice;
pub mod observer;
pub mod operators;
pub mod state;

use crate::CpaError;
use crate::analysis::cpa::operators::{Adjusted, StaticPrecisionAdjustment};
use crate::analysis::cpa::state::{AbstractState, MergeOutcome, Precision, Transfer};
use crate::analysis::reached::ReachedSet;
use argo_cfa::{Cfa, CfaEdge, CfaNodeId};

/// Computes abstract successors.
pub trait TransferRelation<S: AbstractState, P>: Send + Sync {
    /// Successors of `state` along one CFA edge. Edges that do not leave the location of
    /// `state` have no successors.
    fn successors_for_edge(
        &self,
        state: &S,
        precision: &P,
        edge: &CfaEdge,
    ) -> Result<Transfer<S, P>, CpaError>;

    /// Successors of `state` along every edge leaving its location. The first signal raised by
    /// any edge ends the computation.
    fn successors(&self, state: &S, precision: &P, cfa: &Cfa) -> Result<Transfer<S, P>, CpaError> {
        let Some(location) = state.location() else {
            return Ok(Transfer::none());
        };
        let mut all = Vec::new();
        for edge in cfa.leaving_edges(location) {
            match self.successors_for_edge(state, precision, edge)? {
                Transfer::Successors(s) => all.extend(s),
                signal => return Ok(signal),
            }
        }
        Ok(Transfer::Successors(all))
    }
}

/// Decides whether a new successor is combined with a state that is already reached.
pub trait MergeOperator<S, P>: Send + Sync {
    /// Combine `successor` into `reached`. Returning `reached` itself (or `NoOp`) leaves the
    /// reached set untouched.
    fn merge(&self, successor: &S, reached: &S, precision: &P) -> MergeOutcome<S>;

    /// Whether [`merge`](Self::merge) never changes anything. The engine skips the merge step
    /// altogether for such operators.
    fn is_sep(&self) -> bool {
        false
    }
}

/// Decides whether a new successor is already covered by reached states.
pub trait StopOperator<S, P>: Send + Sync {
    /// Index into `reached` of a state covering `state`.
    fn covered_by(&self, state: &S, reached: &[&S], precision: &P) -> Option<usize>;

    fn stop(&self, state: &S, reached: &[&S], precision: &P) -> bool {
        self.covered_by(state, reached, precision).is_some()
    }
}

/// Runs on each new successor before merge and stop, and may change its state and precision or
/// end the current exploration.
pub trait PrecisionAdjustment<S: AbstractState, P: Precision>: Send + Sync {
    fn adjust(
        &self,
        state: S,
        precision: P,
        reached: &ReachedSet<S, P>,
    ) -> Result<Adjusted<S, P>, CpaError>;
}

/**
A Configurable Program Analysis: an abstract domain together with the operators the exploration
engine needs to compute a fixpoint over it.

This follows the presentation of CPA in Chapter 16 of
[The Handbook of Model Checking](https://link.springer.com/book/10.1007/978-3-319-10575-8).
The engine only ever talks to the analysis through the four operators; it never looks at
concrete states beyond [`AbstractState`]. A CPA usually implements the transfer relation itself
and returns `self` from [`transfer_relation`](Self::transfer_relation), picking stock merge and
stop operators from [`operators`].
*/
pub trait ConfigurableProgramAnalysis: Send + Sync {
    type State: AbstractState;
    type Precision: Precision;

    fn transfer_relation(&self) -> &dyn TransferRelation<Self::State, Self::Precision>;

    fn merge_operator(&self) -> &dyn MergeOperator<Self::State, Self::Precision>;

    fn stop_operator(&self) -> &dyn StopOperator<Self::State, Self::Precision>;

    fn precision_adjustment(&self) -> &dyn PrecisionAdjustment<Self::State, Self::Precision> {
        &StaticPrecisionAdjustment
    }

    fn initial_state(&self, node: CfaNodeId) -> Self::State;

    fn initial_precision(&self, node: CfaNodeId) -> Self::Precision;
}

impl<C: ConfigurableProgramAnalysis + ?Sized> ConfigurableProgramAnalysis for std::sync::Arc<C> {
    type State = C::State;
    type Precision = C::Precision;

    fn transfer_relation(&self) -> &dyn TransferRelation<Self::State, Self::Precision> {
        (**self).transfer_relation()
    }

    fn merge_operator(&self) -> &dyn MergeOperator<Self::State, Self::Precision> {
        (**self).merge_operator()
    }

    fn stop_operator(&self) -> &dyn StopOperator<Self::State, Self::Precision> {
        (**self).stop_operator()
    }

    fn precision_adjustment(&self) -> &dyn PrecisionAdjustment<Self::State, Self::Precision> {
        (**self).precision_adjustment()
    }

    fn initial_state(&self, node: CfaNodeId) -> Self::State {
        (**self).initial_state(node)
    }

    fn initial_precision(&self, node: CfaNodeId) -> Self::Precision {
        (**self).initial_precision(node)
    }
}

/// Seed `reached` with the initial state and precision of `cpa` at `node`.
pub fn initialize<C: ConfigurableProgramAnalysis>(
    cpa: &C,
    reached: &mut ReachedSet<C::State, C::Precision>,
    node: CfaNodeId,
) -> crate::analysis::arg::StateId {
    reached.add_initial(cpa.initial_state(node), cpa.initial_precision(node))
}
