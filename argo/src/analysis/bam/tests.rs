use super::*;
use crate::analysis::compound::{CompositeCpa, CompoundState};
use crate::analysis::cpa::algorithm::CpaAlgorithm;
use crate::analysis::cpa::initialize;
use crate::analysis::location::LocationCpa;
use crate::analysis::location::state::LocationState;
use crate::analysis::reached::ReachedSet;
use crate::analysis::statistics::StatisticsProvider;
use crate::analysis::valuation::{ValueCpa, ValueState, VariablePrecision};
use crate::analysis::{Algorithm, AlgorithmOutcome, Verdict, verify};
use crate::config::AnalysisConfig;
use crate::AnalysisContext;
use argo_cfa::{BlockId, CfaBuilder, Expr};
use std::sync::Barrier;

type Values = CompositeCpa<LocationCpa, ValueCpa>;
type Bam = BamCpa<Values, (IdentityReducer, ValueReducer)>;
type Reached = ReachedSet<CompoundState<LocationState, ValueState>, ((), VariablePrecision)>;
type Coordinator = BamAlgorithm<Values, (IdentityReducer, ValueReducer)>;

/// `x = 1; f(); f(); if (x == threshold) error;` where `f` increments `x`.
fn increments(threshold: i64) -> Cfa {
    let mut b = CfaBuilder::new();
    let main = b.add_function("main").unwrap();
    let f = b.add_function("f").unwrap();
    let first = b.add_node("main").unwrap();
    let second = b.add_node("main").unwrap();
    let check = b.add_node("main").unwrap();
    let error = b.add_node("main").unwrap();
    b.mark_error(error).unwrap();
    b.assign(main.entry, first, "x", Expr::constant(1)).unwrap();
    b.call(first, second, "f").unwrap();
    b.call(second, check, "f").unwrap();
    let cond = Expr::var("x").equals(Expr::constant(threshold));
    b.assume(check, error, cond.clone(), true).unwrap();
    b.assume(check, main.exit, cond, false).unwrap();
    b.assign(f.entry, f.exit, "x", Expr::var("x").plus(Expr::constant(1)))
        .unwrap();
    b.build("main").unwrap()
}

/// `p = init; check(); q = 1; check();` where `check` fails if `p == 3`.
fn repeated_check(init: i64) -> Cfa {
    let mut b = CfaBuilder::new();
    let main = b.add_function("main").unwrap();
    let check = b.add_function("check").unwrap();
    let first = b.add_node("main").unwrap();
    let between = b.add_node("main").unwrap();
    let second = b.add_node("main").unwrap();
    b.assign(main.entry, first, "p", Expr::constant(init)).unwrap();
    b.call(first, between, "check").unwrap();
    b.assign(between, second, "q", Expr::constant(1)).unwrap();
    b.call(second, main.exit, "check").unwrap();
    let error = b.add_node("check").unwrap();
    b.mark_error(error).unwrap();
    let cond = Expr::var("p").equals(Expr::constant(3));
    b.assume(check.entry, error, cond.clone(), true).unwrap();
    b.assume(check.entry, check.exit, cond, false).unwrap();
    b.build("main").unwrap()
}

fn setup(cfa: Cfa, deterministic: bool) -> (AnalysisContext, Arc<Bam>, Reached) {
    let mut config = AnalysisConfig::default();
    config.bam.deterministic = deterministic;
    config.bam.threads = 2;
    let context = AnalysisContext::new(cfa, config);
    let inner = CompositeCpa::new(
        LocationCpa::new(context.cfa.clone()),
        ValueCpa::new().with_precision(VariablePrecision::All),
    );
    let reducer = (IdentityReducer, ValueReducer::new(&context.cfa));
    let cpa = Arc::new(BamCpa::new(inner, reducer, context.cfa.clone()));
    let mut reached = ReachedSet::new();
    initialize(&cpa, &mut reached, context.cfa.entry());
    (context, cpa, reached)
}

fn check(cfa: Cfa, deterministic: bool) -> (Verdict, Coordinator, Reached) {
    let (context, cpa, mut reached) = setup(cfa, deterministic);
    let mut bam = BamAlgorithm::new(cpa, &context).unwrap();
    let (verdict, status) = verify(&mut bam, &mut reached).unwrap();
    assert!(status.is_sound() && status.is_precise());
    (verdict, bam, reached)
}

#[test]
fn the_engine_alone_stops_at_the_first_call() {
    let (context, cpa, mut reached) = setup(increments(3), true);
    let mut engine = CpaAlgorithm::new(cpa, &context);
    match engine.run(&mut reached).unwrap() {
        AlgorithmOutcome::MissingBlock { state, request, .. } => {
            assert!(reached.is_waiting(state));
            assert_eq!(request.block, BlockId(0));
            assert_eq!(request.function.as_str(), "f");
            assert_eq!(request.entry.1.value(&argo_cfa::ident("x")), Some(1));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn summaries_are_applied_at_each_call() {
    for deterministic in [true, false] {
        let (verdict, bam, reached) = check(increments(3), deterministic);
        assert_eq!(verdict, Verdict::Unsafe);
        // Entered with x = 1 and with x = 2.
        assert_eq!(bam.sub_analyses(), 2);
        let target = reached.target_states()[0];
        assert_eq!(
            reached.state(target).unwrap().1.value(&argo_cfa::ident("x")),
            Some(3)
        );

        let (verdict, _, reached) = check(increments(4), deterministic);
        assert_eq!(verdict, Verdict::Safe);
        assert!(!reached.has_waiting_state());
    }
}

#[test]
fn equal_reduced_entries_share_a_summary() {
    let (verdict, bam, _) = check(repeated_check(2), true);
    assert_eq!(verdict, Verdict::Safe);
    assert_eq!(bam.sub_analyses(), 1);
    assert_eq!(bam.cpa().cache().len(), 1);
    assert!(bam.cpa().cache().hits() >= 2);
    assert_eq!(
        bam.statistics().get("sub-analyses"),
        Some(&crate::analysis::statistics::StatValue::Count(1))
    );
}

#[test]
fn targets_inside_blocks_reach_the_root() {
    for deterministic in [true, false] {
        let (verdict, _, reached) = check(repeated_check(3), deterministic);
        assert_eq!(verdict, Verdict::Unsafe);
        let target = reached.target_states()[0];
        assert_eq!(
            reached.violated_properties(target),
            vec!["violation inside `check`".to_string()]
        );
    }
}

#[test]
fn recursion_is_reported() {
    let mut b = CfaBuilder::new();
    let main = b.add_function("main").unwrap();
    let f = b.add_function("f").unwrap();
    let back = b.add_node("f").unwrap();
    b.call(main.entry, main.exit, "f").unwrap();
    b.call(f.entry, back, "f").unwrap();
    b.blank(back, f.exit).unwrap();
    let (context, cpa, mut reached) = setup(b.build("main").unwrap(), true);
    let mut bam = BamAlgorithm::new(cpa.clone(), &context).unwrap();
    match bam.run(&mut reached) {
        Err(CpaError::Recursion(function)) => assert_eq!(function, "f"),
        other => panic!("unexpected result {other:?}"),
    }
    // The root comes back and no half-finished summary stays behind.
    assert_eq!(reached.len(), 1);
    assert!(cpa.cache().is_empty());
}

#[test]
fn concurrent_registrations_have_one_winner() {
    let cache: BamCache<u32, ()> = BamCache::new();
    let barrier = Barrier::new(2);
    let lookups: Vec<CacheLookup<u32>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    cache.register_or_get(BlockId(0), 7, ())
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    let new: Vec<_> = lookups
        .iter()
        .filter(|l| matches!(l, CacheLookup::New(_)))
        .collect();
    assert_eq!(new.len(), 1);
    assert!(lookups.contains(&CacheLookup::Pending(ReachedSetId(1))));
    assert_eq!(cache.len(), 1);
}
