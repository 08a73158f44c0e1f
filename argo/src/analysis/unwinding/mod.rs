//! Bounding the number of loop iterations along a path.

use crate::CpaError;
use crate::analysis::cpa::operators::{Action, Adjusted};
use crate::analysis::cpa::state::{AbstractState, MergeOutcome, Transfer};
use crate::analysis::cpa::{
    ConfigurableProgramAnalysis, MergeOperator, PrecisionAdjustment, StopOperator,
    TransferRelation,
};
use crate::analysis::reached::ReachedSet;
use argo_cfa::{Cfa, CfaEdge, CfaNodeId};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// What happens to a path entering loop heads more often than the bound allows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BoundMode {
    /// Stop the exploration. The offending state is left waiting, so the result is incomplete.
    #[default]
    Break,
    /// Keep the offending state as a dead end marked with
    /// [`bound_reached`](LoopBoundState::bound_reached).
    Cut,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoopBoundState<S> {
    inner: S,
    /// Loop-head locations entered along the path so far
    iterations: u32,
    bound_reached: bool,
}

impl<S> LoopBoundState<S> {
    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn bound_reached(&self) -> bool {
        self.bound_reached
    }
}

impl<S: Display> Display for LoopBoundState<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @{}", self.inner, self.iterations)?;
        if self.bound_reached {
            write!(f, " (bound)")?;
        }
        Ok(())
    }
}

impl<S: AbstractState> AbstractState for LoopBoundState<S> {
    fn location(&self) -> Option<CfaNodeId> {
        self.inner.location()
    }

    fn is_target(&self) -> bool {
        self.inner.is_target()
    }

    fn violated_properties(&self) -> Vec<String> {
        self.inner.violated_properties()
    }
}

/// Wraps an analysis and counts how often each path enters a loop head.
///
/// The precision adjustment of the wrapped analysis is not applied.
pub struct LoopBoundCpa<C> {
    inner: C,
    cfa: Arc<Cfa>,
    bound: u32,
    mode: BoundMode,
    exact_coverage: bool,
}

impl<C: ConfigurableProgramAnalysis> LoopBoundCpa<C> {
    pub fn new(inner: C, cfa: Arc<Cfa>, bound: u32) -> Self {
        Self {
            inner,
            cfa,
            bound,
            mode: BoundMode::default(),
            exact_coverage: false,
        }
    }

    pub fn with_mode(mut self, mode: BoundMode) -> Self {
        self.mode = mode;
        self
    }

    /// Only let a state be covered by one with the same iteration count. Without this a state
    /// deep in the loop may be covered by an earlier one, and its iteration count is lost.
    pub fn with_exact_coverage(mut self) -> Self {
        self.exact_coverage = true;
        self
    }

    pub fn bound(&self) -> u32 {
        self.bound
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// A state of the wrapped analysis that has already taken `iterations` loop iterations.
    pub fn wrap(&self, inner: C::State, iterations: u32) -> LoopBoundState<C::State> {
        LoopBoundState {
            inner,
            iterations,
            bound_reached: self.mode == BoundMode::Cut && iterations > self.bound,
        }
    }

    fn step(&self, from: &LoopBoundState<C::State>, inner: C::State) -> LoopBoundState<C::State> {
        let entered = inner
            .location()
            .is_some_and(|l| self.cfa.loop_structure().is_loop_head(l));
        self.wrap(inner, from.iterations + u32::from(entered))
    }
}

impl<C: ConfigurableProgramAnalysis> TransferRelation<LoopBoundState<C::State>, C::Precision>
    for LoopBoundCpa<C>
{
    fn successors_for_edge(
        &self,
        state: &LoopBoundState<C::State>,
        precision: &C::Precision,
        edge: &CfaEdge,
    ) -> Result<Transfer<LoopBoundState<C::State>, C::Precision>, CpaError> {
        if state.bound_reached {
            return Ok(Transfer::none());
        }
        Ok(self
            .inner
            .transfer_relation()
            .successors_for_edge(&state.inner, precision, edge)?
            .map_successors(|s| self.step(state, s)))
    }
}

impl<C: ConfigurableProgramAnalysis> MergeOperator<LoopBoundState<C::State>, C::Precision>
    for LoopBoundCpa<C>
{
    fn merge(
        &self,
        successor: &LoopBoundState<C::State>,
        reached: &LoopBoundState<C::State>,
        precision: &C::Precision,
    ) -> MergeOutcome<LoopBoundState<C::State>> {
        if successor.iterations != reached.iterations
            || successor.bound_reached != reached.bound_reached
        {
            return MergeOutcome::NoOp;
        }
        match self
            .inner
            .merge_operator()
            .merge(&successor.inner, &reached.inner, precision)
        {
            MergeOutcome::Merged(inner) => MergeOutcome::Merged(LoopBoundState {
                inner,
                ..reached.clone()
            }),
            MergeOutcome::NoOp => MergeOutcome::NoOp,
        }
    }

    fn is_sep(&self) -> bool {
        self.inner.merge_operator().is_sep()
    }
}

/// A state is covered by one that took at most as many iterations and covers it in the wrapped
/// analysis.
impl<C: ConfigurableProgramAnalysis> StopOperator<LoopBoundState<C::State>, C::Precision>
    for LoopBoundCpa<C>
{
    fn covered_by(
        &self,
        state: &LoopBoundState<C::State>,
        reached: &[&LoopBoundState<C::State>],
        precision: &C::Precision,
    ) -> Option<usize> {
        reached.iter().position(|r| {
            (r.iterations == state.iterations
                || !self.exact_coverage && r.iterations < state.iterations)
                && r.bound_reached == state.bound_reached
                && self
                    .inner
                    .stop_operator()
                    .stop(&state.inner, &[&r.inner], precision)
        })
    }
}

impl<C: ConfigurableProgramAnalysis> PrecisionAdjustment<LoopBoundState<C::State>, C::Precision>
    for LoopBoundCpa<C>
{
    fn adjust(
        &self,
        state: LoopBoundState<C::State>,
        precision: C::Precision,
        _: &ReachedSet<LoopBoundState<C::State>, C::Precision>,
    ) -> Result<Adjusted<LoopBoundState<C::State>, C::Precision>, CpaError> {
        let action = if self.mode == BoundMode::Break && state.iterations > self.bound {
            Action::Break
        } else {
            Action::Continue
        };
        Ok(Adjusted {
            state,
            precision,
            action,
        })
    }
}

impl<C: ConfigurableProgramAnalysis> ConfigurableProgramAnalysis for LoopBoundCpa<C> {
    type State = LoopBoundState<C::State>;
    type Precision = C::Precision;

    fn transfer_relation(&self) -> &dyn TransferRelation<Self::State, Self::Precision> {
        self
    }

    fn merge_operator(&self) -> &dyn MergeOperator<Self::State, Self::Precision> {
        self
    }

    fn stop_operator(&self) -> &dyn StopOperator<Self::State, Self::Precision> {
        self
    }

    fn precision_adjustment(&self) -> &dyn PrecisionAdjustment<Self::State, Self::Precision> {
        self
    }

    fn initial_state(&self, node: CfaNodeId) -> Self::State {
        let inner = self.inner.initial_state(node);
        let at_head = self.cfa.loop_structure().is_loop_head(node);
        self.wrap(inner, u32::from(at_head))
    }

    fn initial_precision(&self, node: CfaNodeId) -> Self::Precision {
        self.inner.initial_precision(node)
    }
}
