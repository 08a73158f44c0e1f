use crate::analysis::arg::ArgPath;
use crate::analysis::cpa::state::{AbstractState, Precision};
use crate::analysis::reached::{ReachedSet, ReachedSummary};
use crate::analysis::{Algorithm, AlgorithmOutcome, AlgorithmStatus, Verdict};
use crate::{AnalysisContext, CpaError};
use std::any::Any;
use std::fmt::{Debug, Formatter};

/// A reached set left behind by a portfolio member, whatever states and precisions it holds.
pub trait FinishedAnalysis: Debug + Send {
    fn summary(&self) -> ReachedSummary;

    fn has_target_state(&self) -> bool;

    fn has_waiting_state(&self) -> bool;

    /// Path from the root to the oldest target state.
    fn counterexample(&self) -> Option<ArgPath>;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<S: AbstractState, P: Precision> FinishedAnalysis for ReachedSet<S, P> {
    fn summary(&self) -> ReachedSummary {
        ReachedSet::summary(self)
    }

    fn has_target_state(&self) -> bool {
        ReachedSet::has_target_state(self)
    }

    fn has_waiting_state(&self) -> bool {
        ReachedSet::has_waiting_state(self)
    }

    fn counterexample(&self) -> Option<ArgPath> {
        let target = self.target_states().first().copied()?;
        self.arg().path_to(target).ok()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// What a finished portfolio member hands back.
#[derive(Debug)]
pub struct TaskResult {
    pub status: AlgorithmStatus,
    pub reached: Box<dyn FinishedAnalysis>,
}

impl TaskResult {
    pub fn new<S: AbstractState, P: Precision>(
        status: AlgorithmStatus,
        reached: ReachedSet<S, P>,
    ) -> Self {
        Self {
            status,
            reached: Box::new(reached),
        }
    }

    /// Whether the result settles the verification question: a precise counterexample, or a
    /// sound and complete exploration without one.
    pub fn is_conclusive(&self) -> bool {
        self.status.was_property_checked()
            && self.status.is_sound()
            && self.status.is_precise()
            && (self.reached.has_target_state() || !self.reached.has_waiting_state())
    }

    pub fn verdict(&self) -> Verdict {
        Verdict::from_run(
            self.status,
            self.reached.has_target_state(),
            self.reached.has_waiting_state(),
        )
    }

    /// The member's reached set, if it holds `S` states with `P` precisions.
    pub fn into_reached<S: AbstractState, P: Precision>(self) -> Option<ReachedSet<S, P>> {
        self.reached
            .into_any()
            .downcast::<ReachedSet<S, P>>()
            .ok()
            .map(|reached| *reached)
    }
}

type Job = Box<dyn FnOnce(AnalysisContext) -> Result<TaskResult, CpaError> + Send>;

/// One member of a portfolio. The job receives a context of its own, whose shutdown notifier
/// fires when another member wins.
pub struct AnalysisTask {
    pub(crate) name: String,
    pub(crate) job: Job,
}

impl AnalysisTask {
    pub fn new<N, F>(name: N, job: F) -> Self
    where
        N: Into<String>,
        F: FnOnce(AnalysisContext) -> Result<TaskResult, CpaError> + Send + 'static,
    {
        Self {
            name: name.into(),
            job: Box::new(job),
        }
    }

    /// A task building its algorithm and initial reached set from the context it is given, then
    /// running the algorithm to completion.
    pub fn from_algorithm<N, F, A>(name: N, setup: F) -> Self
    where
        N: Into<String>,
        F: FnOnce(&AnalysisContext) -> (A, ReachedSet<A::State, A::Precision>) + Send + 'static,
        A: Algorithm,
    {
        Self::new(name, move |context: AnalysisContext| {
            let (mut algorithm, mut reached) = setup(&context);
            let status = match algorithm.run(&mut reached)? {
                AlgorithmOutcome::Done(status) => status,
                AlgorithmOutcome::MissingBlock { status, .. } => status.with_sound(false),
            };
            Ok(TaskResult::new(status, reached))
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Debug for AnalysisTask {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisTask")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
