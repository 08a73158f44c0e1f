//! The product of two analyses.

use crate::CpaError;
pub use crate::analysis::compound::state::{CompoundState, Strengthening};
use crate::analysis::cpa::state::{MergeOutcome, Successor, Transfer};
use crate::analysis::cpa::{ConfigurableProgramAnalysis, MergeOperator, StopOperator, TransferRelation};
use argo_cfa::{CfaEdge, CfaNodeId};

pub mod state;

type State<A, B> = CompoundState<
    <A as ConfigurableProgramAnalysis>::State,
    <B as ConfigurableProgramAnalysis>::State,
>;
type Prec<A, B> = (
    <A as ConfigurableProgramAnalysis>::Precision,
    <B as ConfigurableProgramAnalysis>::Precision,
);

/// Runs two analyses in lockstep. Successors are the cartesian product of the component
/// successors, optionally strengthened. Merging only happens where the first component agrees,
/// and a state is covered only by a state covering it in both components.
///
/// Precision adjustment of the components is not forwarded: wrap the composite instead.
pub struct CompositeCpa<A: ConfigurableProgramAnalysis, B: ConfigurableProgramAnalysis> {
    pub first: A,
    pub second: B,
    strengthening: Option<Strengthening<A::State, B::State>>,
}

impl<A: ConfigurableProgramAnalysis, B: ConfigurableProgramAnalysis> CompositeCpa<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            strengthening: None,
        }
    }

    pub fn with_strengthening(mut self, strengthening: Strengthening<A::State, B::State>) -> Self {
        self.strengthening = Some(strengthening);
        self
    }
}

impl<A: ConfigurableProgramAnalysis, B: ConfigurableProgramAnalysis> From<(A, B)>
    for CompositeCpa<A, B>
{
    fn from((first, second): (A, B)) -> Self {
        Self::new(first, second)
    }
}

fn component_successors<S, P>(
    transfer: Transfer<S, P>,
) -> Result<Result<Vec<Successor<S>>, String>, CpaError> {
    match transfer {
        Transfer::Successors(s) => Ok(Ok(s)),
        Transfer::PropertyViolation(p) => Ok(Err(p)),
        Transfer::MissingBlock(request) => Err(CpaError::InvalidConfiguration(format!(
            "block {} was requested by a component of a composite analysis",
            request.block
        ))),
    }
}

impl<A: ConfigurableProgramAnalysis, B: ConfigurableProgramAnalysis>
    TransferRelation<State<A, B>, Prec<A, B>> for CompositeCpa<A, B>
{
    fn successors_for_edge(
        &self,
        state: &State<A, B>,
        precision: &Prec<A, B>,
        edge: &CfaEdge,
    ) -> Result<Transfer<State<A, B>, Prec<A, B>>, CpaError> {
        let left = match component_successors(
            self.first
                .transfer_relation()
                .successors_for_edge(&state.0, &precision.0, edge)?,
        )? {
            Ok(s) if s.is_empty() => return Ok(Transfer::none()),
            Ok(s) => s,
            Err(property) => return Ok(Transfer::PropertyViolation(property)),
        };
        let right = match component_successors(
            self.second
                .transfer_relation()
                .successors_for_edge(&state.1, &precision.1, edge)?,
        )? {
            Ok(s) => s,
            Err(property) => return Ok(Transfer::PropertyViolation(property)),
        };

        let mut successors = Vec::with_capacity(left.len() * right.len());
        for l in &left {
            for r in &right {
                let mut next = CompoundState(l.state.clone(), r.state.clone());
                if let Some(strengthen) = self.strengthening
                    && !strengthen(&mut next.0, &mut next.1)
                {
                    continue;
                }
                successors.push(Successor::new(next, l.edge.or(r.edge)));
            }
        }
        Ok(Transfer::Successors(successors))
    }
}

impl<A: ConfigurableProgramAnalysis, B: ConfigurableProgramAnalysis>
    MergeOperator<State<A, B>, Prec<A, B>> for CompositeCpa<A, B>
{
    fn merge(
        &self,
        successor: &State<A, B>,
        reached: &State<A, B>,
        precision: &Prec<A, B>,
    ) -> MergeOutcome<State<A, B>> {
        let first = match self
            .first
            .merge_operator()
            .merge(&successor.0, &reached.0, &precision.0)
        {
            MergeOutcome::Merged(m) => m,
            MergeOutcome::NoOp if successor.0 == reached.0 => reached.0.clone(),
            MergeOutcome::NoOp => return MergeOutcome::NoOp,
        };
        match self
            .second
            .merge_operator()
            .merge(&successor.1, &reached.1, &precision.1)
        {
            MergeOutcome::Merged(second) => MergeOutcome::Merged(CompoundState(first, second)),
            MergeOutcome::NoOp if first != reached.0 => {
                MergeOutcome::Merged(CompoundState(first, reached.1.clone()))
            }
            MergeOutcome::NoOp => MergeOutcome::NoOp,
        }
    }

    fn is_sep(&self) -> bool {
        self.first.merge_operator().is_sep() && self.second.merge_operator().is_sep()
    }
}

impl<A: ConfigurableProgramAnalysis, B: ConfigurableProgramAnalysis>
    StopOperator<State<A, B>, Prec<A, B>> for CompositeCpa<A, B>
{
    fn covered_by(
        &self,
        state: &State<A, B>,
        reached: &[&State<A, B>],
        precision: &Prec<A, B>,
    ) -> Option<usize> {
        reached.iter().position(|r| {
            self.first
                .stop_operator()
                .stop(&state.0, &[&r.0], &precision.0)
                && self
                    .second
                    .stop_operator()
                    .stop(&state.1, &[&r.1], &precision.1)
        })
    }
}

impl<A: ConfigurableProgramAnalysis, B: ConfigurableProgramAnalysis> ConfigurableProgramAnalysis
    for CompositeCpa<A, B>
{
    type State = State<A, B>;
    type Precision = Prec<A, B>;

    fn transfer_relation(&self) -> &dyn TransferRelation<Self::State, Self::Precision> {
        self
    }

    fn merge_operator(&self) -> &dyn MergeOperator<Self::State, Self::Precision> {
        self
    }

    fn stop_operator(&self) -> &dyn StopOperator<Self::State, Self::Precision> {
        self
    }

    fn initial_state(&self, node: CfaNodeId) -> Self::State {
        CompoundState(self.first.initial_state(node), self.second.initial_state(node))
    }

    fn initial_precision(&self, node: CfaNodeId) -> Self::Precision {
        (
            self.first.initial_precision(node),
            self.second.initial_precision(node),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::cpa::state::AbstractState;
    use crate::analysis::location::LocationCpa;
    use crate::analysis::location::state::LocationState;
    use crate::analysis::valuation::{MergeBehavior, ValueCpa, ValueState, VariablePrecision};
    use argo_cfa::{CfaBuilder, Expr, ident};
    use std::sync::Arc;

    fn program() -> Arc<argo_cfa::Cfa> {
        // x = 1 or x = 2, then join
        let mut b = CfaBuilder::new();
        let main = b.add_function("main").unwrap();
        let join = b.add_node("main").unwrap();
        b.assign(main.entry, join, "x", Expr::constant(1)).unwrap();
        b.assign(main.entry, join, "x", Expr::constant(2)).unwrap();
        b.blank(join, main.exit).unwrap();
        Arc::new(b.build("main").unwrap())
    }

    fn composite(behavior: MergeBehavior) -> (Arc<argo_cfa::Cfa>, CompositeCpa<LocationCpa, ValueCpa>) {
        let cfa = program();
        let cpa = CompositeCpa::new(
            LocationCpa::new(cfa.clone()),
            ValueCpa::new()
                .with_merge_behavior(behavior)
                .with_precision(VariablePrecision::All),
        );
        (cfa, cpa)
    }

    #[test]
    fn successors_are_products() {
        let (cfa, cpa) = composite(MergeBehavior::Sep);
        let init = cpa.initial_state(cfa.entry());
        assert_eq!(init.location(), Some(cfa.entry()));
        let t = cpa.successors(&init, &cpa.initial_precision(cfa.entry()), &cfa).unwrap();
        let values: Vec<_> = t
            .successors()
            .unwrap()
            .iter()
            .map(|s| s.state.1.value(&ident("x")))
            .collect();
        assert_eq!(values, vec![Some(1), Some(2)]);
    }

    #[test]
    fn merge_agree_only_merges_at_the_same_location() {
        let (cfa, cpa) = composite(MergeBehavior::Join);
        let prec = cpa.initial_precision(cfa.entry());
        let at = |node, x: Option<i64>| {
            let mut v = ValueState::new();
            if let Some(x) = x {
                v.set(ident("x"), x.into());
            }
            CompoundState(cpa.first.state_at(node), v)
        };
        let exit = cfa.main_function().exit;
        let a = at(exit, Some(1));
        let b = at(exit, Some(2));
        let elsewhere = at(cfa.entry(), Some(2));
        assert!(!cpa.is_sep());
        assert_eq!(
            cpa.merge(&a, &b, &prec),
            MergeOutcome::Merged(at(exit, None))
        );
        assert_eq!(cpa.merge(&a, &elsewhere, &prec), MergeOutcome::NoOp);
        assert_eq!(cpa.merge(&a, &at(exit, None), &prec), MergeOutcome::NoOp);
    }

    #[test]
    fn stop_needs_both_components() {
        let (cfa, cpa) = composite(MergeBehavior::Sep);
        let prec = cpa.initial_precision(cfa.entry());
        let loc: LocationState = cpa.first.state_at(cfa.entry());
        let mut known = ValueState::new();
        known.set(ident("x"), 1.into());
        let precise = CompoundState(loc, known);
        let coarse = CompoundState(loc, ValueState::new());
        assert_eq!(cpa.covered_by(&precise, &[&coarse], &prec), Some(0));
        assert_eq!(cpa.covered_by(&coarse, &[&precise], &prec), None);
        assert!(precise < coarse);
    }

    #[test]
    fn strengthening_can_drop_successors() {
        let (cfa, cpa) = composite(MergeBehavior::Sep);
        let cpa = cpa.with_strengthening(|_, v| v.value(&ident("x")) != Some(2));
        let init = cpa.initial_state(cfa.entry());
        let t = cpa.successors(&init, &cpa.initial_precision(cfa.entry()), &cfa).unwrap();
        assert_eq!(t.successors().map(|s| s.len()), Some(1));
    }
}
