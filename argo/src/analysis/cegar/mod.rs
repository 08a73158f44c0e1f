//! Counterexample-guided abstraction refinement.

use crate::analysis::arg::{ArgError, StateId};
use crate::analysis::cpa::state::{AbstractState, Precision};
use crate::analysis::reached::{ReachedSet, ReachedSetUpdateListener};
use crate::analysis::statistics::{StatisticsProvider, StatisticsReport};
use crate::analysis::{Algorithm, AlgorithmOutcome, AlgorithmStatus};
use crate::config::CegarOptions;
use crate::{CpaError, Reason, RefinementFailure};
use argo_cfa::CfaEdgeId;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

#[cfg(test)]
mod tests;

/// Eliminates spurious counterexamples from a reached set.
pub trait Refiner<S, P>: Send {
    /// Analyse the counterexample in `reached`.
    ///
    /// Returns `true` after strengthening the precision and removing the parts of the reached
    /// set that have to be explored again, and `false` if the counterexample is real (or cannot
    /// be handled by this refiner, in which case the reached set is left untouched).
    fn perform_refinement(&mut self, reached: &mut ReachedSet<S, P>) -> Result<bool, CpaError>;

    /// Whether refinements only ever make the abstraction more precise. Unsound refiners get
    /// their results re-validated by restarting from the initial state.
    fn is_sound(&self) -> bool {
        true
    }
}

impl<S, P, R: Refiner<S, P> + ?Sized> Refiner<S, P> for Box<R> {
    fn perform_refinement(&mut self, reached: &mut ReachedSet<S, P>) -> Result<bool, CpaError> {
        (**self).perform_refinement(reached)
    }

    fn is_sound(&self) -> bool {
        (**self).is_sound()
    }
}

/// The target state a refiner should look at: the last state if it is a target, otherwise the
/// oldest target.
pub fn counterexample<S: AbstractState, P: Precision>(reached: &ReachedSet<S, P>) -> Option<StateId> {
    reached
        .last_state()
        .filter(|l| reached.is_target(*l))
        .or_else(|| reached.target_states().first().copied())
}

#[derive(Debug, Clone, Copy, Default)]
struct CegarStatistics {
    iterations: usize,
    refinements: usize,
    restarts: usize,
}

/// Alternates between exploring with the wrapped algorithm and refining the counterexamples it
/// finds, until a run ends without a counterexample to refine or the refiner confirms one.
pub struct CegarAlgorithm<A: Algorithm, R> {
    algorithm: A,
    refiner: R,
    options: CegarOptions,
    listeners: Vec<Box<dyn ReachedSetUpdateListener<A::State, A::Precision>>>,
    seen: HashSet<Vec<Option<CfaEdgeId>>>,
    stats: CegarStatistics,
}

impl<A: Algorithm, R: Refiner<A::State, A::Precision>> CegarAlgorithm<A, R> {
    pub fn new(algorithm: A, refiner: R, options: CegarOptions) -> Self {
        Self {
            algorithm,
            refiner,
            options,
            listeners: Vec::new(),
            seen: HashSet::new(),
            stats: CegarStatistics::default(),
        }
    }

    pub fn with_listener(
        mut self,
        listener: Box<dyn ReachedSetUpdateListener<A::State, A::Precision>>,
    ) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn refiner(&self) -> &R {
        &self.refiner
    }

    pub fn inner(&self) -> &A {
        &self.algorithm
    }

    pub fn refinements(&self) -> usize {
        self.stats.refinements
    }

    fn should_refine(
        &self,
        reached: &ReachedSet<A::State, A::Precision>,
        previous_last: Option<StateId>,
    ) -> bool {
        if self.options.global_refinement {
            return reached.has_target_state();
        }
        // A run that added nothing leaves the same last state behind; refining it again would
        // not make progress.
        reached
            .last_state()
            .is_some_and(|last| Some(last) != previous_last && reached.is_target(last))
    }

    fn check_repeated(&mut self, reached: &ReachedSet<A::State, A::Precision>) -> Result<(), CpaError> {
        if !self.options.detect_repeated_counterexamples {
            return Ok(());
        }
        let Some(target) = counterexample(reached) else {
            return Ok(());
        };
        let path = reached.arg().path_to(target)?;
        if !self.seen.insert(path.edges().to_vec()) {
            warn!(path = %path, "counterexample found again after refinement");
            return Err(RefinementFailure::new(Reason::RepeatedCounterexample, path).into());
        }
        Ok(())
    }

    fn restart(&mut self, reached: &mut ReachedSet<A::State, A::Precision>) -> Result<(), CpaError> {
        let first = reached.first_state().ok_or_else(|| {
            CpaError::InvalidConfiguration("cannot restart without an initial state".to_string())
        })?;
        let state = reached
            .state(first)
            .cloned()
            .ok_or(ArgError::UnknownState(first))?;
        let precision = reached
            .precision(first)
            .cloned()
            .ok_or(ArgError::NotReached(first))?;
        reached.restart(state, precision);
        self.stats.restarts += 1;
        info!(restarts = self.stats.restarts, "restarted from the initial state");
        Ok(())
    }

    fn notify(&mut self, reached: &ReachedSet<A::State, A::Precision>, status: AlgorithmStatus) {
        for listener in &mut self.listeners {
            listener.updated(reached, status);
        }
    }
}

impl<A: Algorithm, R: Refiner<A::State, A::Precision>> Algorithm for CegarAlgorithm<A, R> {
    type State = A::State;
    type Precision = A::Precision;

    #[instrument(skip_all, name = "cegar")]
    fn run(
        &mut self,
        reached: &mut ReachedSet<A::State, A::Precision>,
    ) -> Result<AlgorithmOutcome<A::State, A::Precision>, CpaError> {
        let mut previous_last = None;
        let mut since_restart = 0;
        loop {
            self.stats.iterations += 1;
            let outcome = self.algorithm.run(reached)?;
            let status = outcome.status();
            if matches!(outcome, AlgorithmOutcome::MissingBlock { .. }) {
                return Ok(outcome);
            }
            self.notify(reached, status);

            if !self.should_refine(reached, previous_last) {
                if !reached.has_target_state() {
                    let revalidate = !self.refiner.is_sound()
                        && self.options.unsound_restart_interval > 0
                        && since_restart > 0;
                    if revalidate {
                        since_restart = 0;
                        previous_last = None;
                        self.restart(reached)?;
                        continue;
                    }
                    debug!(iterations = self.stats.iterations, "nothing left to refine");
                    return Ok(outcome);
                }
                // A target survived the last refinement or was found before the last state.
                // It is not a confirmed counterexample until the refiner has seen it.
                let stale = previous_last.is_some() && reached.last_state() == previous_last;
                if stale && !self.options.detect_repeated_counterexamples {
                    warn!(
                        refinements = self.stats.refinements,
                        "refinement left its counterexample behind"
                    );
                    return Ok(AlgorithmOutcome::Done(status.with_precise(false)));
                }
            }

            if let Some(max) = self.options.max_iterations
                && self.stats.refinements >= max
            {
                info!(max, "refinement limit reached");
                return Ok(AlgorithmOutcome::Done(status.with_precise(false)));
            }

            previous_last = reached.last_state();
            self.check_repeated(reached)?;
            debug!(refinement = self.stats.refinements + 1, "refining");
            if !self.refiner.perform_refinement(reached)? {
                info!(refinements = self.stats.refinements, "counterexample confirmed");
                return Ok(outcome);
            }
            self.stats.refinements += 1;
            since_restart += 1;

            if !self.refiner.is_sound()
                && self.options.unsound_restart_interval > 0
                && since_restart >= self.options.unsound_restart_interval
            {
                since_restart = 0;
                previous_last = None;
                self.restart(reached)?;
            }
        }
    }
}

impl<A, R> CegarAlgorithm<A, R>
where
    A: Algorithm,
{
    fn own_statistics(&self) -> StatisticsReport {
        StatisticsReport::new("cegar")
            .count("iterations", self.stats.iterations)
            .count("refinements", self.stats.refinements)
            .count("restarts", self.stats.restarts)
            .count("distinct counterexamples", self.seen.len())
    }
}

impl<A, R> StatisticsProvider for CegarAlgorithm<A, R>
where
    A: Algorithm + StatisticsProvider,
    R: StatisticsProvider,
{
    fn statistics(&self) -> StatisticsReport {
        self.own_statistics()
            .child(self.algorithm.statistics())
            .child(self.refiner.statistics())
    }
}
