//! Tolerating failures of a nested algorithm.

use crate::analysis::arg::StateId;
use crate::analysis::reached::ReachedSet;
use crate::analysis::statistics::{StatisticsProvider, StatisticsReport};
use crate::analysis::{Algorithm, AlgorithmOutcome, AlgorithmStatus};
use crate::config::ExceptionHandlingOptions;
use crate::{CpaError, RefinementFailure};
use tracing::warn;

/// Runs a nested algorithm and, where configured, survives its failures by giving up on the
/// part of the state space that caused them. Every tolerated failure makes the result unsound.
///
/// * A failed refinement removes the target of the failing path and takes the states along the
///   path off the waitlist.
/// * Unsupported code takes the state whose successors could not be computed off the
///   waitlist.
///
/// Everything else is passed on.
pub struct ExceptionHandlingAlgorithm<A> {
    algorithm: A,
    options: ExceptionHandlingOptions,
    refinement_failures: usize,
    unsupported: usize,
}

impl<A: Algorithm> ExceptionHandlingAlgorithm<A> {
    pub fn new(algorithm: A, options: ExceptionHandlingOptions) -> Self {
        Self {
            algorithm,
            options,
            refinement_failures: 0,
            unsupported: 0,
        }
    }

    pub fn inner(&self) -> &A {
        &self.algorithm
    }

    /// Returns whether anything changed; if not, retrying would fail the same way.
    fn drop_failing_path(
        reached: &mut ReachedSet<A::State, A::Precision>,
        failure: &RefinementFailure,
    ) -> Result<bool, CpaError> {
        let mut progress = false;
        for id in failure.path.states() {
            progress |= reached.remove_from_waitlist(*id);
        }
        if let Some(target) = failure.path.last()
            && reached.contains(target)
        {
            reached.prune(target)?;
            progress = true;
        }
        Ok(progress)
    }

    fn skip_state(reached: &mut ReachedSet<A::State, A::Precision>, state: Option<StateId>) -> bool {
        state.is_some_and(|id| reached.remove_from_waitlist(id))
    }
}

impl<A: Algorithm> Algorithm for ExceptionHandlingAlgorithm<A> {
    type State = A::State;
    type Precision = A::Precision;

    fn run(
        &mut self,
        reached: &mut ReachedSet<A::State, A::Precision>,
    ) -> Result<AlgorithmOutcome<A::State, A::Precision>, CpaError> {
        let mut status = AlgorithmStatus::SOUND_AND_PRECISE;
        loop {
            match self.algorithm.run(reached) {
                Ok(outcome) => return Ok(outcome.map_status(|s| s.update(status))),
                Err(CpaError::RefinementFailed(failure))
                    if self.options.continue_after_refinement_failure =>
                {
                    warn!(reason = %failure.reason, path = %failure.path, "ignoring failed refinement");
                    if !Self::drop_failing_path(reached, &failure)? {
                        return Err(failure.into());
                    }
                    self.refinement_failures += 1;
                }
                Err(CpaError::UnsupportedCode {
                    message,
                    edge,
                    state,
                }) if self.options.continue_after_unsupported_code => {
                    warn!(%edge, state = ?state, message, "skipping unsupported code");
                    if !Self::skip_state(reached, state) {
                        return Err(CpaError::UnsupportedCode {
                            message,
                            edge,
                            state,
                        });
                    }
                    self.unsupported += 1;
                }
                Err(e) => return Err(e),
            }
            status = status.with_sound(false);
        }
    }
}

impl<A: Algorithm + StatisticsProvider> StatisticsProvider for ExceptionHandlingAlgorithm<A> {
    fn statistics(&self) -> StatisticsReport {
        StatisticsReport::new("exception handling")
            .count("refinement failures", self.refinement_failures)
            .count("unsupported code", self.unsupported)
            .child(self.algorithm.statistics())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AnalysisContext;
    use crate::analysis::cegar::{CegarAlgorithm, Refiner, counterexample};
    use crate::analysis::cpa::algorithm::CpaAlgorithm;
    use crate::analysis::cpa::operators::{MergeSep, StopSep};
    use crate::analysis::cpa::state::{AbstractState, Precision, Transfer};
    use crate::analysis::cpa::{
        ConfigurableProgramAnalysis, MergeOperator, StopOperator, TransferRelation, initialize,
    };
    use crate::analysis::location::LocationCpa;
    use crate::analysis::location::state::LocationState;
    use crate::analysis::{Verdict, verify};
    use crate::config::{AnalysisConfig, CegarOptions};
    use crate::Reason;
    use argo_cfa::{Cfa, CfaBuilder, CfaEdge, CfaEdgeId, CfaNodeId, Expr};
    use std::sync::Arc;

    struct Forgetful;

    impl<S: AbstractState, P: Precision> Refiner<S, P> for Forgetful {
        fn perform_refinement(&mut self, reached: &mut ReachedSet<S, P>) -> Result<bool, CpaError> {
            if let Some(target) = counterexample(reached) {
                reached.remove_subtree(target)?;
            }
            Ok(true)
        }
    }

    fn error_behind_branch() -> Cfa {
        let mut b = CfaBuilder::new();
        let main = b.add_function("main").unwrap();
        let error = b.add_node("main").unwrap();
        b.mark_error(error).unwrap();
        b.assume(main.entry, error, Expr::var("c").equals(Expr::constant(0)), true)
            .unwrap();
        b.assume(main.entry, main.exit, Expr::var("c").equals(Expr::constant(0)), false)
            .unwrap();
        b.build("main").unwrap()
    }

    fn forgetful_cegar(
        options: ExceptionHandlingOptions,
    ) -> (
        ExceptionHandlingAlgorithm<CegarAlgorithm<CpaAlgorithm<LocationCpa>, Forgetful>>,
        ReachedSet<LocationState, ()>,
    ) {
        let context = AnalysisContext::new(error_behind_branch(), AnalysisConfig::default());
        let cpa = Arc::new(LocationCpa::new(context.cfa.clone()));
        let mut reached = ReachedSet::new();
        initialize(&cpa, &mut reached, context.cfa.entry());
        let cegar = CegarAlgorithm::new(
            CpaAlgorithm::new(cpa, &context),
            Forgetful,
            CegarOptions::default(),
        );
        (ExceptionHandlingAlgorithm::new(cegar, options), reached)
    }

    #[test]
    fn refinement_failures_propagate_by_default() {
        let (mut algorithm, mut reached) = forgetful_cegar(ExceptionHandlingOptions::default());
        match algorithm.run(&mut reached) {
            Err(CpaError::RefinementFailed(f)) => {
                assert_eq!(f.reason, Reason::RepeatedCounterexample)
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn tolerated_refinement_failures_make_the_result_unsound() {
        let options = ExceptionHandlingOptions {
            continue_after_refinement_failure: true,
            ..Default::default()
        };
        let (mut algorithm, mut reached) = forgetful_cegar(options);
        let (verdict, status) = verify(&mut algorithm, &mut reached).unwrap();
        assert!(!status.is_sound());
        assert_eq!(verdict, Verdict::Unknown);
        assert!(!reached.has_target_state());
        assert_eq!(algorithm.refinement_failures, 1);
    }

    /// The location analysis, refusing to handle one edge.
    struct Picky {
        location: LocationCpa,
        unsupported: CfaEdgeId,
    }

    impl TransferRelation<LocationState, ()> for Picky {
        fn successors_for_edge(
            &self,
            state: &LocationState,
            precision: &(),
            edge: &CfaEdge,
        ) -> Result<Transfer<LocationState, ()>, CpaError> {
            if edge.id == self.unsupported && edge.source == state.node() {
                return Err(CpaError::UnsupportedCode {
                    message: "no".to_string(),
                    edge: edge.id,
                    state: None,
                });
            }
            self.location.successors_for_edge(state, precision, edge)
        }
    }

    impl ConfigurableProgramAnalysis for Picky {
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
            self.location.initial_state(node)
        }

        fn initial_precision(&self, _: CfaNodeId) {}
    }

    #[test]
    fn unsupported_code_skips_the_failing_state() {
        let mut b = CfaBuilder::new();
        let main = b.add_function("main").unwrap();
        let left = b.add_node("main").unwrap();
        let right = b.add_node("main").unwrap();
        b.blank(main.entry, left).unwrap();
        b.blank(main.entry, right).unwrap();
        let bad = b.blank(left, main.exit).unwrap();
        b.blank(right, main.exit).unwrap();
        let context = AnalysisContext::new(b.build("main").unwrap(), AnalysisConfig::default());
        let cpa = Arc::new(Picky {
            location: LocationCpa::new(context.cfa.clone()),
            unsupported: bad,
        });

        let mut reached = ReachedSet::new();
        initialize(&cpa, &mut reached, context.cfa.entry());
        let mut strict = ExceptionHandlingAlgorithm::new(
            CpaAlgorithm::new(cpa.clone(), &context),
            ExceptionHandlingOptions::default(),
        );
        match strict.run(&mut reached) {
            Err(CpaError::UnsupportedCode { state, edge, .. }) => {
                assert_eq!(edge, bad);
                assert!(state.is_some_and(|s| reached.is_waiting(s)));
            }
            other => panic!("unexpected result {other:?}"),
        }

        let mut tolerant = ExceptionHandlingAlgorithm::new(
            CpaAlgorithm::new(cpa, &context),
            ExceptionHandlingOptions {
                continue_after_unsupported_code: true,
                ..Default::default()
            },
        );
        let (verdict, status) = verify(&mut tolerant, &mut reached).unwrap();
        assert_eq!(verdict, Verdict::Unknown);
        assert!(!status.is_sound());
        assert!(!reached.states_at(Some(context.cfa.main_function().exit)).is_empty());
    }
}
