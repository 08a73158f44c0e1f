use super::*;
use crate::analysis::compound::CompositeCpa;
use crate::analysis::cpa::algorithm::CpaAlgorithm;
use crate::analysis::cpa::initialize;
use crate::analysis::location::LocationCpa;
use crate::analysis::location::state::LocationState;
use crate::analysis::reached::AggregatedReachedSets;
use crate::analysis::statistics::StatValue;
use crate::analysis::valuation::{ValueCpa, ValueRefiner};
use crate::analysis::{Verdict, verify};
use crate::config::AnalysisConfig;
use crate::AnalysisContext;
use argo_cfa::{Cfa, CfaBuilder, Expr};
use std::sync::Arc;

/// `x = init; if (x == 1) error;`
fn guarded_error(init: i64) -> Cfa {
    let mut b = CfaBuilder::new();
    let main = b.add_function("main").unwrap();
    let check = b.add_node("main").unwrap();
    let error = b.add_node("main").unwrap();
    b.mark_error(error).unwrap();
    b.assign(main.entry, check, "x", Expr::constant(init)).unwrap();
    let cond = Expr::var("x").equals(Expr::constant(1));
    b.assume(check, error, cond.clone(), true).unwrap();
    b.assume(check, main.exit, cond, false).unwrap();
    b.build("main").unwrap()
}

type ValueAnalysis = CompositeCpa<LocationCpa, ValueCpa>;

fn value_cegar(
    init: i64,
    options: CegarOptions,
) -> (
    CegarAlgorithm<CpaAlgorithm<ValueAnalysis>, ValueRefiner>,
    ReachedSet<
        <ValueAnalysis as crate::analysis::cpa::ConfigurableProgramAnalysis>::State,
        <ValueAnalysis as crate::analysis::cpa::ConfigurableProgramAnalysis>::Precision,
    >,
) {
    let context = AnalysisContext::new(guarded_error(init), AnalysisConfig::default());
    let cpa = Arc::new(CompositeCpa::new(
        LocationCpa::new(context.cfa.clone()),
        ValueCpa::new(),
    ));
    let mut reached = ReachedSet::new();
    initialize(&cpa, &mut reached, context.cfa.entry());
    let algorithm = CpaAlgorithm::new(cpa, &context);
    let refiner = ValueRefiner::new(context.cfa.clone());
    (CegarAlgorithm::new(algorithm, refiner, options), reached)
}

#[test]
fn spurious_counterexamples_are_refined_away() {
    let (mut cegar, mut reached) = value_cegar(0, CegarOptions::default());
    let (verdict, status) = verify(&mut cegar, &mut reached).unwrap();
    assert_eq!(verdict, Verdict::Safe);
    assert_eq!(status, AlgorithmStatus::SOUND_AND_PRECISE);
    assert_eq!(cegar.refinements(), 1);
    let report = cegar.statistics();
    assert_eq!(report.children.len(), 2);
}

#[test]
fn feasible_counterexamples_end_the_loop() {
    let (mut cegar, mut reached) = value_cegar(1, CegarOptions::default());
    let (verdict, status) = verify(&mut cegar, &mut reached).unwrap();
    assert_eq!(verdict, Verdict::Unsafe);
    assert!(status.is_precise());
    assert_eq!(cegar.refinements(), 0);
}

#[test]
fn the_refinement_limit_makes_the_result_imprecise() {
    let options = CegarOptions {
        max_iterations: Some(0),
        ..CegarOptions::default()
    };
    let (mut cegar, mut reached) = value_cegar(0, options);
    let (verdict, status) = verify(&mut cegar, &mut reached).unwrap();
    assert_eq!(verdict, Verdict::Unknown);
    assert!(!status.is_precise());
}

/// Removes the counterexample without learning anything from it.
struct Forgetful;

impl<S: AbstractState, P: Precision> Refiner<S, P> for Forgetful {
    fn perform_refinement(&mut self, reached: &mut ReachedSet<S, P>) -> Result<bool, CpaError> {
        if let Some(target) = counterexample(reached) {
            reached.remove_subtree(target)?;
        }
        Ok(true)
    }
}

#[test]
fn repeated_counterexamples_fail_the_refinement() {
    let context = AnalysisContext::new(guarded_error(1), AnalysisConfig::default());
    let cpa = Arc::new(LocationCpa::new(context.cfa.clone()));
    let mut reached = ReachedSet::new();
    initialize(&cpa, &mut reached, context.cfa.entry());
    let mut cegar = CegarAlgorithm::new(
        CpaAlgorithm::new(cpa, &context),
        Forgetful,
        CegarOptions::default(),
    );
    let failure = match cegar.run(&mut reached) {
        Err(CpaError::RefinementFailed(failure)) => failure,
        other => panic!("unexpected result {other:?}"),
    };
    assert_eq!(failure.reason, Reason::RepeatedCounterexample);
    assert_eq!(failure.path.len(), 2);
    assert_eq!(cegar.refinements(), 1);
}

/// Claims progress without touching the reached set.
struct Idle;

impl<S: AbstractState, P: Precision> Refiner<S, P> for Idle {
    fn perform_refinement(&mut self, _reached: &mut ReachedSet<S, P>) -> Result<bool, CpaError> {
        Ok(true)
    }
}

fn idle_cegar(
    options: CegarOptions,
) -> (
    CegarAlgorithm<CpaAlgorithm<LocationCpa>, Idle>,
    ReachedSet<LocationState, ()>,
) {
    let context = AnalysisContext::new(guarded_error(1), AnalysisConfig::default());
    let cpa = Arc::new(LocationCpa::new(context.cfa.clone()));
    let mut reached = ReachedSet::new();
    initialize(&cpa, &mut reached, context.cfa.entry());
    (
        CegarAlgorithm::new(CpaAlgorithm::new(cpa, &context), Idle, options),
        reached,
    )
}

#[test]
fn surviving_targets_are_refined_again() {
    let (mut cegar, mut reached) = idle_cegar(CegarOptions::default());
    let failure = match verify(&mut cegar, &mut reached) {
        Err(CpaError::RefinementFailed(failure)) => failure,
        other => panic!("unexpected result {other:?}"),
    };
    assert_eq!(failure.reason, Reason::RepeatedCounterexample);
    assert_eq!(cegar.refinements(), 1);
}

#[test]
fn surviving_targets_are_never_reported_precisely() {
    let options = CegarOptions {
        detect_repeated_counterexamples: false,
        ..CegarOptions::default()
    };
    let (mut cegar, mut reached) = idle_cegar(options);
    let (verdict, status) = verify(&mut cegar, &mut reached).unwrap();
    assert!(reached.has_target_state());
    assert!(!status.is_precise());
    assert_eq!(verdict, Verdict::Unknown);
}

#[test]
fn global_refinement_looks_at_every_target() {
    let options = CegarOptions {
        global_refinement: true,
        ..CegarOptions::default()
    };
    let (mut cegar, mut reached) = value_cegar(0, options);
    let (verdict, status) = verify(&mut cegar, &mut reached).unwrap();
    assert_eq!(verdict, Verdict::Safe);
    assert_eq!(status, AlgorithmStatus::SOUND_AND_PRECISE);
    assert_eq!(cegar.refinements(), 1);

    let options = CegarOptions {
        global_refinement: true,
        ..CegarOptions::default()
    };
    let (mut cegar, mut reached) = value_cegar(1, options);
    let (verdict, _) = verify(&mut cegar, &mut reached).unwrap();
    assert_eq!(verdict, Verdict::Unsafe);
    assert_eq!(cegar.refinements(), 0);
}

/// A refiner whose results have to be checked from scratch.
struct Unsound<R>(R);

impl<S, P, R: Refiner<S, P>> Refiner<S, P> for Unsound<R> {
    fn perform_refinement(&mut self, reached: &mut ReachedSet<S, P>) -> Result<bool, CpaError> {
        self.0.perform_refinement(reached)
    }

    fn is_sound(&self) -> bool {
        false
    }
}

fn unsound_cegar(
    interval: usize,
) -> (
    CegarAlgorithm<CpaAlgorithm<ValueAnalysis>, Unsound<ValueRefiner>>,
    ReachedSet<
        <ValueAnalysis as crate::analysis::cpa::ConfigurableProgramAnalysis>::State,
        <ValueAnalysis as crate::analysis::cpa::ConfigurableProgramAnalysis>::Precision,
    >,
) {
    let options = CegarOptions {
        unsound_restart_interval: interval,
        ..CegarOptions::default()
    };
    let (cegar, reached) = value_cegar(0, options);
    let CegarAlgorithm {
        algorithm,
        refiner,
        options,
        ..
    } = cegar;
    (CegarAlgorithm::new(algorithm, Unsound(refiner), options), reached)
}

fn restarts<A: Algorithm, R>(cegar: &CegarAlgorithm<A, R>) -> Option<StatValue> {
    cegar.own_statistics().get("restarts").cloned()
}

#[test]
fn unsound_refiners_restart_after_each_interval() {
    let (mut cegar, mut reached) = unsound_cegar(1);
    let (verdict, status) = verify(&mut cegar, &mut reached).unwrap();
    assert_eq!(verdict, Verdict::Safe);
    assert!(status.is_sound());
    assert_eq!(cegar.refinements(), 1);
    assert_eq!(restarts(&cegar), Some(StatValue::Count(1)));
    // The restarted run keeps the refined precision of the initial state.
    assert_eq!(cegar.own_statistics().get("iterations").cloned(), Some(StatValue::Count(2)));
    assert!(!reached.has_target_state());
}

#[test]
fn unsound_proofs_are_revalidated_from_the_start() {
    let (mut cegar, mut reached) = unsound_cegar(5);
    let (verdict, _) = verify(&mut cegar, &mut reached).unwrap();
    assert_eq!(verdict, Verdict::Safe);
    assert_eq!(cegar.refinements(), 1);
    // One refinement is below the interval, so the proof itself triggers the restart.
    assert_eq!(restarts(&cegar), Some(StatValue::Count(1)));
    assert_eq!(cegar.own_statistics().get("iterations").cloned(), Some(StatValue::Count(3)));
}

#[test]
fn listeners_see_every_iteration() {
    let sets = AggregatedReachedSets::new();
    let (cegar, mut reached) = value_cegar(0, CegarOptions::default());
    let mut cegar = cegar.with_listener(Box::new(sets.listener("values")));
    cegar.run(&mut reached).unwrap();
    let (summary, status) = sets.get("values").unwrap();
    assert_eq!(summary, reached.summary());
    assert_eq!(summary.targets, 0);
    assert!(status.is_sound());
}
