use crate::analysis::arg::{ArgError, StateId};
use crate::analysis::cpa::ConfigurableProgramAnalysis;
use crate::analysis::cpa::observer::{ExplorationObserver, ExplorationStatistics};
use crate::analysis::cpa::operators::{Action, Adjusted};
use crate::analysis::cpa::state::{AbstractState, MergeOutcome, Transfer};
use crate::analysis::reached::ReachedSet;
use crate::analysis::statistics::{StatisticsProvider, StatisticsReport};
use crate::analysis::{Algorithm, AlgorithmOutcome, AlgorithmStatus};
use crate::shutdown::ShutdownNotifier;
use crate::{AnalysisContext, CpaError};
use argo_cfa::Cfa;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, trace};

type Outcome<C> = AlgorithmOutcome<
    <C as ConfigurableProgramAnalysis>::State,
    <C as ConfigurableProgramAnalysis>::Precision,
>;

enum Step<C: ConfigurableProgramAnalysis> {
    Continue,
    Return(Outcome<C>),
}

/// The exploration engine: computes the reachable abstract states of a CPA, starting from the
/// waiting states of a reached set.
///
/// Each iteration pops one waiting state, computes its successors and, for every successor,
/// adjusts its precision, merges it into reached states at the same location and adds it unless
/// it is covered. The run ends when nothing is waiting, when a target state was added (unless
/// configured to continue past targets), when precision adjustment asks for a break, or when
/// the transfer relation signals a missing block summary or a property violation. In every
/// case the reached set is left so that running again resumes the exploration.
pub struct CpaAlgorithm<C: ConfigurableProgramAnalysis> {
    cpa: Arc<C>,
    cfa: Arc<Cfa>,
    shutdown: ShutdownNotifier,
    stats: ExplorationStatistics,
    observers: Vec<Box<dyn ExplorationObserver<C::State>>>,
    stop_at_target: bool,
}

impl<C: ConfigurableProgramAnalysis> CpaAlgorithm<C> {
    pub fn new(cpa: Arc<C>, context: &AnalysisContext) -> Self {
        Self {
            cpa,
            cfa: context.cfa.clone(),
            shutdown: context.shutdown.clone(),
            stats: ExplorationStatistics::default(),
            observers: Vec::new(),
            stop_at_target: true,
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn ExplorationObserver<C::State>>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Keep exploring after a target state was found.
    pub fn continue_after_target(mut self) -> Self {
        self.stop_at_target = false;
        self
    }

    pub fn cpa(&self) -> &Arc<C> {
        &self.cpa
    }

    pub fn exploration_statistics(&self) -> ExplorationStatistics {
        self.stats
    }

    fn observe<F: FnMut(&mut dyn ExplorationObserver<C::State>)>(&mut self, mut f: F) {
        f(&mut self.stats);
        for observer in &mut self.observers {
            f(observer.as_mut());
        }
    }

    fn explore(
        &mut self,
        reached: &mut ReachedSet<C::State, C::Precision>,
        mut current: StateId,
        status: AlgorithmStatus,
    ) -> Result<Step<C>, CpaError> {
        let state = reached
            .state_arc(current)
            .ok_or(ArgError::UnknownState(current))?;
        let precision = reached
            .precision(current)
            .cloned()
            .ok_or(ArgError::NotReached(current))?;

        let successors =
            match self
                .cpa
                .transfer_relation()
                .successors(&state, &precision, &self.cfa)?
            {
                Transfer::Successors(s) => s,
                Transfer::MissingBlock(request) => {
                    debug!(state = %current, block = %request.block, "block summary missing");
                    reached.re_add_to_waitlist(current)?;
                    return Ok(Step::Return(AlgorithmOutcome::MissingBlock {
                        status,
                        state: current,
                        request,
                    }));
                }
                Transfer::PropertyViolation(property) => {
                    info!(state = %current, property, "property violated");
                    reached.mark_violation(current, property)?;
                    return Ok(if self.stop_at_target {
                        Step::Return(AlgorithmOutcome::Done(status))
                    } else {
                        Step::Continue
                    });
                }
            };
        trace!(state = %current, successors = successors.len(), "computed successors");

        let mut successors = successors.into_iter().peekable();
        while let Some(successor) = successors.next() {
            let edge = successor.edge;
            self.observe(|o| o.transition(current, &successor.state, edge));

            let Adjusted {
                state: successor,
                precision: successor_precision,
                action,
            } = self
                .cpa
                .precision_adjustment()
                .adjust(successor.state, precision.clone(), reached)?;

            if action == Action::Break {
                let id = reached.add(successor, successor_precision, current, edge)?;
                reached.re_add_to_waitlist(current)?;
                self.observe(|o| o.broke(id));
                debug!(state = %current, successor = %id, "precision adjustment requested break");
                return Ok(Step::Return(AlgorithmOutcome::Done(status)));
            }

            let location = successor.location();
            let mut merged_into = BTreeSet::new();
            if !self.cpa.merge_operator().is_sep() {
                for other in reached.states_at(location) {
                    let Some(other_state) = reached.state_arc(other) else {
                        continue;
                    };
                    let outcome = self.cpa.merge_operator().merge(
                        &successor,
                        &other_state,
                        &successor_precision,
                    );
                    if let MergeOutcome::Merged(merged) = outcome
                        && merged != *other_state
                    {
                        let new = reached.replace(other, merged, successor_precision.clone())?;
                        if other == current {
                            current = new;
                        }
                        reached.add_edge(current, new, edge)?;
                        merged_into.insert(new);
                        self.observe(|o| o.merged(other, new));
                        trace!(reached = %other, merged = %new, "merged");
                    }
                }
            }

            let candidates: Vec<_> = reached
                .states_at(location)
                .into_iter()
                .filter_map(|id| reached.state_arc(id).map(|s| (id, s)))
                .collect();
            let states: Vec<&C::State> = candidates.iter().map(|(_, s)| s.as_ref()).collect();
            if let Some(index) =
                self.cpa
                    .stop_operator()
                    .covered_by(&successor, &states, &successor_precision)
            {
                let by = candidates[index].0;
                self.observe(|o| o.covered(&successor, by));
                trace!(parent = %current, by = %by, "successor covered");
                // A successor absorbed by a merge is already represented by the merged state.
                if !merged_into.contains(&by) {
                    reached.cover(current, successor, edge, by)?;
                }
                continue;
            }

            let id = reached.add(successor, successor_precision, current, edge)?;
            self.stats.added += 1;
            trace!(parent = %current, state = %id, "added");
            if reached.is_target(id) {
                info!(state = %id, properties = ?reached.violated_properties(id), "target state reached");
                if self.stop_at_target {
                    if successors.peek().is_some() {
                        reached.re_add_to_waitlist(current)?;
                    }
                    return Ok(Step::Return(AlgorithmOutcome::Done(status)));
                }
            }
        }
        Ok(Step::Continue)
    }
}

impl<C: ConfigurableProgramAnalysis> Algorithm for CpaAlgorithm<C> {
    type State = C::State;
    type Precision = C::Precision;

    fn run(
        &mut self,
        reached: &mut ReachedSet<C::State, C::Precision>,
    ) -> Result<Outcome<C>, CpaError> {
        let status = AlgorithmStatus::SOUND_AND_PRECISE;
        debug!(
            states = reached.len(),
            waiting = reached.summary().waiting,
            "exploration started"
        );
        loop {
            if self.shutdown.should_shutdown() {
                debug!(reason = ?self.shutdown.reason(), "exploration interrupted");
                return Err(CpaError::Interrupted);
            }
            let Some(current) = reached.pop_from_waitlist() else {
                break;
            };
            self.stats.iterations += 1;
            match self.explore(reached, current, status) {
                Ok(Step::Continue) => {}
                Ok(Step::Return(outcome)) => return Ok(outcome),
                Err(e) => {
                    // Leave the state waiting so that a retry recomputes its successors.
                    if reached.contains(current) {
                        reached.re_add_to_waitlist(current)?;
                    }
                    return Err(e.at_state(current));
                }
            }
        }
        debug!(states = reached.len(), "exploration finished");
        Ok(AlgorithmOutcome::Done(status))
    }
}

impl<C: ConfigurableProgramAnalysis> StatisticsProvider for CpaAlgorithm<C> {
    fn statistics(&self) -> StatisticsReport {
        self.stats.statistics()
    }
}
