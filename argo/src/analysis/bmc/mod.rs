//! Bounded model checking with k-induction.
//!
//! Each round unrolls the program up to a loop bound with [`LoopBoundCpa`] in cut mode, encodes
//! the executions of the unrolling as a propositional formula and asks a [`FormulaManager`] two
//! questions: can a target be reached (the program is unsafe), and can the bound be hit at all
//! (if not, the unrolling covers every execution). When neither settles it, k-induction tries to
//! show that no k safe iterations of the loop can be followed by an unsafe one. Otherwise the
//! bound grows.

mod encoding;
mod formula;

pub use encoding::{UnrollingEncoding, Witness};
pub use formula::{BddFormulaManager, FormulaManager};

use crate::analysis::arg::{ArgPath, StateId};
use crate::analysis::cpa::ConfigurableProgramAnalysis;
use crate::analysis::cpa::algorithm::CpaAlgorithm;
use crate::analysis::cpa::initialize;
use crate::analysis::reached::ReachedSet;
use crate::analysis::statistics::{StatisticsProvider, StatisticsReport};
use crate::analysis::unwinding::{BoundMode, LoopBoundCpa, LoopBoundState};
use crate::analysis::{Algorithm, AlgorithmOutcome, AlgorithmStatus};
use crate::config::BmcOptions;
use crate::{AnalysisContext, CpaError};
use argo_cfa::{CfaNodeId, EdgeKind};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

type Unrolling<C> = LoopBoundCpa<Arc<C>>;
type UnrolledReached<C> = ReachedSet<
    LoopBoundState<<C as ConfigurableProgramAnalysis>::State>,
    <C as ConfigurableProgramAnalysis>::Precision,
>;

/// Result of an induction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Induction {
    /// No execution of k safe loop iterations continues into a violation.
    Proven,
    /// The step case found a violation after k safe iterations. It may be unreachable.
    NotProven,
    /// The program has more than one loop, or its loop is entered in more than one way.
    Inapplicable,
}

/// What the solver says about the targets of an unrolling.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Violation {
    /// No execution within the bound reaches a target.
    Refuted,
    /// Some execution follows this path into a target.
    Feasible(ArgPath),
    /// The formula reaches a target only through approximated transitions.
    Unconfirmed(ArgPath),
}

#[derive(Debug, Clone, Copy, Default)]
struct BmcStatistics {
    rounds: usize,
    solver_queries: usize,
    refuted_targets: usize,
    induction_attempts: usize,
    induction_cut_points: usize,
    induction_proofs: usize,
    last_bound: u32,
}

/// Bounded model checking on top of an analysis of loop-free program fragments.
///
/// The reached set handed to [`run`](Algorithm::run) is replaced by the unrolling of the last
/// round. A property violation leaves its target state in it; targets the solver refutes are
/// pruned, and a proof leaves a reached set with nothing waiting.
pub struct BmcAlgorithm<C, M> {
    inner: Arc<C>,
    manager: M,
    context: AnalysisContext,
    options: BmcOptions,
    counterexample: Option<ArgPath>,
    stats: BmcStatistics,
}

impl<C, M> BmcAlgorithm<C, M>
where
    C: ConfigurableProgramAnalysis + 'static,
    M: FormulaManager,
{
    pub fn new(inner: Arc<C>, manager: M, context: &AnalysisContext) -> Self {
        Self {
            inner,
            manager,
            options: context.config.bmc.clone(),
            context: context.clone(),
            counterexample: None,
            stats: BmcStatistics::default(),
        }
    }

    /// The path to the violation found by the last run, as picked from the solver's model.
    pub fn counterexample(&self) -> Option<&ArgPath> {
        self.counterexample.as_ref()
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    fn unroll(
        &self,
        cpa: Unrolling<C>,
        start: CfaNodeId,
    ) -> Result<(AlgorithmStatus, UnrolledReached<C>), CpaError> {
        let cpa = Arc::new(cpa);
        let mut reached =
            ReachedSet::with_order(self.context.config.traversal, self.context.cfa.clone());
        initialize(&cpa, &mut reached, start);
        // Targets are only candidates until the solver has seen them.
        let mut algorithm = CpaAlgorithm::new(cpa, &self.context).continue_after_target();
        match algorithm.run(&mut reached)? {
            AlgorithmOutcome::Done(status) => Ok((status, reached)),
            AlgorithmOutcome::MissingBlock { request, .. } => {
                Err(CpaError::InvalidConfiguration(format!(
                    "bounded model checking cannot compute the summary of block {}",
                    request.block
                )))
            }
        }
    }

    fn satisfiable(&mut self, formula: &M::Formula) -> Result<bool, CpaError> {
        self.stats.solver_queries += 1;
        self.manager.is_satisfiable(formula)
    }

    /// Ask for an execution reaching a target of the unrolling.
    fn find_violation(
        &mut self,
        reached: &UnrolledReached<C>,
        encoding: &UnrollingEncoding<M::Formula>,
    ) -> Result<Violation, CpaError> {
        let targets = reached.target_states();
        if targets.is_empty() {
            return Ok(Violation::Refuted);
        }
        let error = encoding.any_of(&mut self.manager, targets.iter().copied());
        let query = self.manager.and(encoding.constraints(), &error);
        self.stats.solver_queries += 1;
        let Some(model) = self.manager.model(&query)? else {
            return Ok(Violation::Refuted);
        };
        let witness = encoding
            .reached_in(&model)
            .into_iter()
            .filter(|s| targets.contains(s))
            .find_map(|target| encoding.witness(&model, target));
        Ok(match witness {
            Some(witness) if witness.exact => Violation::Feasible(witness.path),
            Some(witness) => Violation::Unconfirmed(witness.path),
            None => {
                let target = targets[0];
                Violation::Unconfirmed(reached.arg().path_to(target)?)
            }
        })
    }

    /// Remove targets no execution reaches.
    fn prune_refuted(&mut self, reached: &mut UnrolledReached<C>) -> Result<(), CpaError> {
        for target in reached.target_states() {
            if reached.contains(target) {
                reached.prune(target)?;
                self.stats.refuted_targets += 1;
            }
        }
        Ok(())
    }

    /// Try to prove by induction over the iterations of the only loop that no violation
    /// follows `k` safe iterations.
    ///
    /// The step case starts at the loop head from arbitrary values and unrolls `k + 1`
    /// iterations. Each cut point, an edge of the unrolling that enters iteration `k + 1`,
    /// gets its own claim `(A ∧ B) ⇒ C`: if the first `k` iterations reach no target (A) and the
    /// execution passes the cut point (B), then no target of iteration `k + 1` is reached (C).
    /// Together with a base case of `k` iterations from the program entry, all claims holding
    /// covers every execution.
    pub fn induction(&mut self, k: u32) -> Result<Induction, CpaError> {
        let head = {
            let cfa = &self.context.cfa;
            let loops = cfa.loop_structure().loops();
            let single = match loops {
                [] => return Ok(Induction::Proven),
                [single] => single,
                _ => return Ok(Induction::Inapplicable),
            };
            let entries = single
                .incoming_edges
                .iter()
                .filter_map(|e| cfa.edge(*e))
                .filter(|e| !matches!(e.kind, EdgeKind::FunctionReturn { .. }))
                .count();
            if entries > 1 {
                debug!(head = %single.head, entries, "loop entered in more than one way");
                return Ok(Induction::Inapplicable);
            }
            single.head
        };
        self.stats.induction_attempts += 1;
        let step = LoopBoundCpa::new(self.inner.clone(), self.context.cfa.clone(), k + 1)
            .with_mode(BoundMode::Cut)
            .with_exact_coverage();
        let (_, reached) = self.unroll(step, head)?;

        let encoding = UnrollingEncoding::encode(
            &mut self.manager,
            &reached,
            &self.context.cfa,
            &format!("k{k}_"),
        );
        let iterations = |id: StateId| reached.state(id).map(LoopBoundState::iterations);
        let (early, late): (Vec<_>, Vec<_>) = reached
            .target_states()
            .into_iter()
            .partition(|t| iterations(*t).is_some_and(|i| i <= k));
        let cut_points: Vec<(StateId, StateId)> = reached
            .ids()
            .filter(|id| iterations(*id) == Some(k + 1))
            .flat_map(|id| {
                let parents: Vec<StateId> = reached
                    .arg()
                    .node(id)
                    .map(|n| n.parents().collect())
                    .unwrap_or_default();
                parents
                    .into_iter()
                    .filter(|p| iterations(*p) == Some(k))
                    .map(move |p| (p, id))
            })
            .collect();

        let early = encoding.any_of(&mut self.manager, early);
        let assumption = self.manager.not(&early);
        let late = encoding.any_of(&mut self.manager, late);
        let conclusion = self.manager.not(&late);
        let premise = self.manager.and(&assumption, encoding.constraints());
        let mut proven = true;
        for (from, to) in &cut_points {
            let Some(passes) = encoding.transition(*from, *to).cloned() else {
                continue;
            };
            self.stats.induction_cut_points += 1;
            let premise = self.manager.and(&premise, &passes);
            let claim = self.manager.implies(&premise, &conclusion);
            self.stats.solver_queries += 1;
            if !self.manager.is_tautology(&claim)? {
                debug!(k, from = %from, to = %to, "induction fails at cut point");
                proven = false;
                break;
            }
        }
        if cut_points.is_empty() {
            // Nothing enters iteration k + 1 through an edge, only through coverage.
            let claim = self.manager.implies(&premise, &conclusion);
            self.stats.solver_queries += 1;
            proven = self.manager.is_tautology(&claim)?;
        }
        debug!(
            k,
            states = reached.len(),
            cut_points = cut_points.len(),
            proven,
            "induction step"
        );
        if proven {
            self.stats.induction_proofs += 1;
            Ok(Induction::Proven)
        } else {
            Ok(Induction::NotProven)
        }
    }
}

impl<C, M> Algorithm for BmcAlgorithm<C, M>
where
    C: ConfigurableProgramAnalysis + 'static,
    M: FormulaManager,
{
    type State = LoopBoundState<C::State>;
    type Precision = C::Precision;

    #[instrument(skip_all, name = "bmc")]
    fn run(
        &mut self,
        reached: &mut ReachedSet<Self::State, Self::Precision>,
    ) -> Result<AlgorithmOutcome<Self::State, Self::Precision>, CpaError> {
        self.counterexample = None;
        let max_bound = self.options.max_bound.max(1);
        let mut bound = self.options.initial_bound.clamp(1, max_bound);
        loop {
            self.context.shutdown.check()?;
            self.stats.rounds += 1;
            self.stats.last_bound = bound;
            let unrolling = LoopBoundCpa::new(self.inner.clone(), self.context.cfa.clone(), bound)
                .with_mode(BoundMode::Cut);
            let (status, unrolled) = self.unroll(unrolling, self.context.cfa.entry())?;
            *reached = unrolled;

            let encoding = UnrollingEncoding::encode(
                &mut self.manager,
                &*reached,
                &self.context.cfa,
                &format!("b{bound}_"),
            );
            match self.find_violation(reached, &encoding)? {
                Violation::Feasible(path) => {
                    info!(bound, path = %path, "property violation within bound");
                    self.counterexample = Some(path);
                    return Ok(AlgorithmOutcome::Done(status));
                }
                Violation::Unconfirmed(path) => {
                    warn!(
                        bound,
                        path = %path,
                        approximations = encoding.approximations(),
                        "violation depends on approximated guards"
                    );
                    self.counterexample = Some(path);
                    return Ok(AlgorithmOutcome::Done(status.with_precise(false)));
                }
                Violation::Refuted => self.prune_refuted(reached)?,
            }

            let cut: Vec<_> = reached
                .iter()
                .filter(|(_, s, _)| s.bound_reached())
                .map(|(id, _, _)| id)
                .collect();
            let hits_bound = encoding.any_of(&mut self.manager, cut);
            let query = self.manager.and(encoding.constraints(), &hits_bound);
            if !self.satisfiable(&query)? {
                info!(bound, "unrolling is complete");
                return Ok(AlgorithmOutcome::Done(status));
            }

            if self.options.induction && self.induction(bound)? == Induction::Proven {
                info!(k = bound, "property proven by induction");
                return Ok(AlgorithmOutcome::Done(status));
            }

            if bound >= max_bound {
                info!(bound, "bound exhausted");
                return Ok(AlgorithmOutcome::Done(status.with_sound(false)));
            }
            bound = bound.saturating_add(self.options.bound_step.max(1)).min(max_bound);
            debug!(bound, "increasing bound");
        }
    }
}

impl<C, M> StatisticsProvider for BmcAlgorithm<C, M> {
    fn statistics(&self) -> StatisticsReport {
        StatisticsReport::new("bounded model checking")
            .count("rounds", self.stats.rounds)
            .count("last bound", self.stats.last_bound as usize)
            .count("solver queries", self.stats.solver_queries)
            .count("refuted targets", self.stats.refuted_targets)
            .count("induction attempts", self.stats.induction_attempts)
            .count("induction cut points", self.stats.induction_cut_points)
            .count("induction proofs", self.stats.induction_proofs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::compound::CompositeCpa;
    use crate::analysis::location::LocationCpa;
    use crate::analysis::statistics::StatValue;
    use crate::analysis::valuation::{ValueCpa, VariablePrecision};
    use crate::analysis::{Verdict, verify};
    use crate::config::AnalysisConfig;
    use argo_cfa::{Cfa, CfaBuilder, Expr};

    type Values = CompositeCpa<LocationCpa, ValueCpa>;

    /// `i = 0; while (i < 10) { i = i + 1; if (i == 3) error; }`
    fn counting_loop() -> Cfa {
        let mut b = CfaBuilder::new();
        let main = b.add_function("main").unwrap();
        let head = b.add_node("main").unwrap();
        let body = b.add_node("main").unwrap();
        let check = b.add_node("main").unwrap();
        let error = b.add_node("main").unwrap();
        b.mark_error(error).unwrap();
        let i = Expr::var("i");
        let guard = i.clone().less_than(Expr::constant(10));
        b.assign(main.entry, head, "i", Expr::constant(0)).unwrap();
        b.assume(head, body, guard.clone(), true).unwrap();
        b.assume(head, main.exit, guard, false).unwrap();
        b.assign(body, check, "i", i.clone().plus(Expr::constant(1)))
            .unwrap();
        let hit = i.equals(Expr::constant(3));
        b.assume(check, error, hit.clone(), true).unwrap();
        b.assume(check, head, hit, false).unwrap();
        b.build("main").unwrap()
    }

    /// `x = 0; i = 0; while (c == 0) { i = i + 1; x = 0; if (x != 0) error; }`
    fn inductive_loop() -> Cfa {
        let mut b = CfaBuilder::new();
        let main = b.add_function("main").unwrap();
        let init = b.add_node("main").unwrap();
        let head = b.add_node("main").unwrap();
        let body = b.add_node("main").unwrap();
        let reset = b.add_node("main").unwrap();
        let check = b.add_node("main").unwrap();
        let error = b.add_node("main").unwrap();
        b.mark_error(error).unwrap();
        b.assign(main.entry, init, "x", Expr::constant(0)).unwrap();
        b.assign(init, head, "i", Expr::constant(0)).unwrap();
        let guard = Expr::var("c").equals(Expr::constant(0));
        b.assume(head, body, guard.clone(), true).unwrap();
        b.assume(head, main.exit, guard, false).unwrap();
        b.assign(body, reset, "i", Expr::var("i").plus(Expr::constant(1)))
            .unwrap();
        b.assign(reset, check, "x", Expr::constant(0)).unwrap();
        let zero = Expr::var("x").equals(Expr::constant(0));
        b.assume(check, error, zero.clone(), false).unwrap();
        b.assume(check, head, zero, true).unwrap();
        b.build("main").unwrap()
    }

    /// `x = 1; if (x == 2) error;`
    fn straight_line() -> Cfa {
        let mut b = CfaBuilder::new();
        let main = b.add_function("main").unwrap();
        let check = b.add_node("main").unwrap();
        let error = b.add_node("main").unwrap();
        b.mark_error(error).unwrap();
        b.assign(main.entry, check, "x", Expr::constant(1)).unwrap();
        let cond = Expr::var("x").equals(Expr::constant(2));
        b.assume(check, error, cond.clone(), true).unwrap();
        b.assume(check, main.exit, cond, false).unwrap();
        b.build("main").unwrap()
    }

    fn check(
        cfa: Cfa,
        config: AnalysisConfig,
    ) -> (Verdict, AlgorithmStatus, BmcAlgorithm<Values, BddFormulaManager>) {
        let context = AnalysisContext::new(cfa, config);
        let inner = Arc::new(CompositeCpa::new(
            LocationCpa::new(context.cfa.clone()),
            ValueCpa::new().with_precision(VariablePrecision::All),
        ));
        let mut bmc = BmcAlgorithm::new(inner, BddFormulaManager::new(), &context);
        let mut reached = ReachedSet::new();
        let (verdict, status) = verify(&mut bmc, &mut reached).unwrap();
        (verdict, status, bmc)
    }

    fn stat<C>(bmc: &BmcAlgorithm<C, BddFormulaManager>, key: &str) -> Option<StatValue> {
        bmc.statistics().get(key).cloned()
    }

    /// Bounded model checking over control flow alone, leaving every value to the solver.
    fn locations(cfa: Cfa, config: AnalysisConfig) -> BmcAlgorithm<LocationCpa, BddFormulaManager> {
        let context = AnalysisContext::new(cfa, config);
        let inner = Arc::new(LocationCpa::new(context.cfa.clone()));
        BmcAlgorithm::new(inner, BddFormulaManager::new(), &context)
    }

    /// `if (y < 5) { if (10 < y) error; }`
    fn ordered_guards() -> Cfa {
        let mut b = CfaBuilder::new();
        let main = b.add_function("main").unwrap();
        let inner = b.add_node("main").unwrap();
        let error = b.add_node("main").unwrap();
        b.mark_error(error).unwrap();
        let small = Expr::var("y").less_than(Expr::constant(5));
        b.assume(main.entry, inner, small.clone(), true).unwrap();
        b.assume(main.entry, main.exit, small, false).unwrap();
        let large = Expr::constant(10).less_than(Expr::var("y"));
        b.assume(inner, error, large.clone(), true).unwrap();
        b.assume(inner, main.exit, large, false).unwrap();
        b.build("main").unwrap()
    }

    /// `if (c == 0) i = 1; else i = 2; while (i < 10) { if (i == 0) error; i = i + 1; }`
    fn two_entry_loop() -> Cfa {
        let mut b = CfaBuilder::new();
        let main = b.add_function("main").unwrap();
        let then = b.add_node("main").unwrap();
        let other = b.add_node("main").unwrap();
        let head = b.add_node("main").unwrap();
        let body = b.add_node("main").unwrap();
        let step = b.add_node("main").unwrap();
        let error = b.add_node("main").unwrap();
        b.mark_error(error).unwrap();
        let zero = Expr::var("c").equals(Expr::constant(0));
        b.assume(main.entry, then, zero.clone(), true).unwrap();
        b.assume(main.entry, other, zero, false).unwrap();
        b.assign(then, head, "i", Expr::constant(1)).unwrap();
        b.assign(other, head, "i", Expr::constant(2)).unwrap();
        let guard = Expr::var("i").less_than(Expr::constant(10));
        b.assume(head, body, guard.clone(), true).unwrap();
        b.assume(head, main.exit, guard, false).unwrap();
        let hit = Expr::var("i").equals(Expr::constant(0));
        b.assume(body, error, hit.clone(), true).unwrap();
        b.assume(body, step, hit, false).unwrap();
        b.assign(step, head, "i", Expr::var("i").plus(Expr::constant(1)))
            .unwrap();
        b.build("main").unwrap()
    }

    #[test]
    fn finds_the_violation_at_the_third_iteration() {
        let (verdict, _, bmc) = check(counting_loop(), AnalysisConfig::default());
        assert_eq!(verdict, Verdict::Unsafe);
        assert_eq!(stat(&bmc, "last bound"), Some(StatValue::Count(3)));
        assert_eq!(stat(&bmc, "induction proofs"), Some(StatValue::Count(0)));
        let path = bmc.counterexample().unwrap();
        // i = 0, then three rounds of guard, increment and check.
        assert_eq!(path.len(), 1 + 3 * 3);
    }

    #[test]
    fn loop_free_programs_need_one_round() {
        let (verdict, status, bmc) = check(straight_line(), AnalysisConfig::default());
        assert_eq!(verdict, Verdict::Safe);
        assert!(status.is_sound());
        assert_eq!(stat(&bmc, "rounds"), Some(StatValue::Count(1)));
        assert_eq!(stat(&bmc, "induction attempts"), Some(StatValue::Count(0)));
        assert!(bmc.counterexample().is_none());
    }

    #[test]
    fn induction_proves_unbounded_loops() {
        let (verdict, status, bmc) = check(inductive_loop(), AnalysisConfig::default());
        assert_eq!(verdict, Verdict::Safe);
        assert!(status.is_sound() && status.is_precise());
        assert_eq!(stat(&bmc, "last bound"), Some(StatValue::Count(1)));
        assert_eq!(stat(&bmc, "induction proofs"), Some(StatValue::Count(1)));
    }

    #[test]
    fn the_step_case_rejects_late_violations() {
        let context = AnalysisContext::new(counting_loop(), AnalysisConfig::default());
        let inner = Arc::new(CompositeCpa::new(
            LocationCpa::new(context.cfa.clone()),
            ValueCpa::new().with_precision(VariablePrecision::All),
        ));
        let mut bmc = BmcAlgorithm::new(inner, BddFormulaManager::new(), &context);
        // From an arbitrary `i` the check can fail in any iteration.
        assert_eq!(bmc.induction(1).unwrap(), Induction::NotProven);
        assert_eq!(bmc.induction(4).unwrap(), Induction::NotProven);
    }

    #[test]
    fn an_exhausted_bound_is_inconclusive() {
        let mut config = AnalysisConfig::default();
        config.bmc.induction = false;
        config.bmc.max_bound = 3;
        let (verdict, status, bmc) = check(inductive_loop(), config);
        assert_eq!(verdict, Verdict::Unknown);
        assert!(!status.is_sound());
        assert_eq!(stat(&bmc, "rounds"), Some(StatValue::Count(3)));
        assert_eq!(stat(&bmc, "last bound"), Some(StatValue::Count(3)));
    }

    #[test]
    fn shutdown_interrupts_between_rounds() {
        let context = AnalysisContext::new(inductive_loop(), AnalysisConfig::default());
        let inner = Arc::new(CompositeCpa::new(
            LocationCpa::new(context.cfa.clone()),
            ValueCpa::new(),
        ));
        let mut bmc = BmcAlgorithm::new(inner, BddFormulaManager::new(), &context);
        context.shutdown.request_shutdown("test");
        let mut reached = ReachedSet::new();
        assert!(matches!(bmc.run(&mut reached), Err(CpaError::Interrupted)));
    }

    #[test]
    fn refuted_targets_are_pruned() {
        let mut bmc = locations(straight_line(), AnalysisConfig::default());
        let mut reached = ReachedSet::new();
        let (verdict, status) = verify(&mut bmc, &mut reached).unwrap();
        // Control flow alone reaches the error location, the assignment rules it out.
        assert_eq!(verdict, Verdict::Safe);
        assert!(status.is_precise());
        assert!(!reached.has_target_state());
        assert_eq!(stat(&bmc, "refuted targets"), Some(StatValue::Count(1)));
        assert!(bmc.counterexample().is_none());
    }

    #[test]
    fn induction_consults_the_solver_at_each_cut_point() {
        let mut bmc = locations(inductive_loop(), AnalysisConfig::default());
        // Every iteration of the step case holds an error state, none of them reachable.
        assert_eq!(bmc.induction(1).unwrap(), Induction::Proven);
        assert!(matches!(
            stat(&bmc, "induction cut points"),
            Some(StatValue::Count(n)) if n >= 1
        ));

        let mut bmc = locations(inductive_loop(), AnalysisConfig::default());
        let mut reached = ReachedSet::new();
        let (verdict, _) = verify(&mut bmc, &mut reached).unwrap();
        assert_eq!(verdict, Verdict::Safe);
        assert_eq!(stat(&bmc, "induction proofs"), Some(StatValue::Count(1)));
    }

    #[test]
    fn approximated_violations_are_not_reported_precisely() {
        let mut bmc = locations(ordered_guards(), AnalysisConfig::default());
        let mut reached = ReachedSet::new();
        let (verdict, status) = verify(&mut bmc, &mut reached).unwrap();
        assert_eq!(verdict, Verdict::Unknown);
        assert!(!status.is_precise());
        let path = bmc.counterexample().unwrap();
        assert_eq!(path.last(), reached.target_states().first().copied());
    }

    #[test]
    fn induction_needs_a_single_loop_entry() {
        let mut bmc = locations(two_entry_loop(), AnalysisConfig::default());
        assert_eq!(bmc.induction(1).unwrap(), Induction::Inapplicable);
        assert_eq!(stat(&bmc, "induction attempts"), Some(StatValue::Count(0)));
    }
}
