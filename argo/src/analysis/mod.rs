use crate::CpaError;
use crate::analysis::arg::StateId;
use crate::analysis::cpa::state::{AbstractState, BlockRequest, Precision};
use crate::analysis::reached::ReachedSet;

pub mod arg;
pub mod bam;
pub mod bmc;
pub mod cegar;
pub mod compound;
pub mod cpa;
pub mod exception;
pub mod location;
pub mod parallel;
pub mod reached;
pub mod statistics;
mod status;
pub mod unwinding;
pub mod valuation;

pub use status::{AlgorithmStatus, Verdict};

/// How an algorithm run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum AlgorithmOutcome<S, P> {
    /// The run ended on its own: fixpoint reached, a target found, or exploration cut short.
    Done(AlgorithmStatus),
    /// Exploring `state` needs the summary of a block first. `state` is back on the waitlist,
    /// so running again after the summary is available resumes where this run stopped.
    MissingBlock {
        status: AlgorithmStatus,
        state: StateId,
        request: BlockRequest<S, P>,
    },
}

impl<S, P> AlgorithmOutcome<S, P> {
    pub fn status(&self) -> AlgorithmStatus {
        match self {
            AlgorithmOutcome::Done(status) => *status,
            AlgorithmOutcome::MissingBlock { status, .. } => *status,
        }
    }

    pub fn map_status<F: FnOnce(AlgorithmStatus) -> AlgorithmStatus>(self, f: F) -> Self {
        match self {
            AlgorithmOutcome::Done(status) => AlgorithmOutcome::Done(f(status)),
            AlgorithmOutcome::MissingBlock {
                status,
                state,
                request,
            } => AlgorithmOutcome::MissingBlock {
                status: f(status),
                state,
                request,
            },
        }
    }
}

/// A verification algorithm working on a reached set. Algorithms nest: CEGAR wraps the
/// exploration engine, exception handling wraps CEGAR, and so on.
pub trait Algorithm: Send {
    type State: AbstractState;
    type Precision: Precision;

    fn run(
        &mut self,
        reached: &mut ReachedSet<Self::State, Self::Precision>,
    ) -> Result<AlgorithmOutcome<Self::State, Self::Precision>, CpaError>;
}

impl<A: Algorithm + ?Sized> Algorithm for Box<A> {
    type State = A::State;
    type Precision = A::Precision;

    fn run(
        &mut self,
        reached: &mut ReachedSet<Self::State, Self::Precision>,
    ) -> Result<AlgorithmOutcome<Self::State, Self::Precision>, CpaError> {
        (**self).run(reached)
    }
}

/// Run `algorithm` and report the verdict it supports for `reached`.
pub fn verify<A: Algorithm>(
    algorithm: &mut A,
    reached: &mut ReachedSet<A::State, A::Precision>,
) -> Result<(Verdict, AlgorithmStatus), CpaError> {
    let status = match algorithm.run(reached)? {
        AlgorithmOutcome::Done(status) => status,
        // Nobody is there to compute the summary, so the exploration is incomplete.
        AlgorithmOutcome::MissingBlock { status, .. } => status.with_sound(false),
    };
    let verdict = Verdict::from_run(
        status,
        reached.has_target_state(),
        reached.has_waiting_state(),
    );
    Ok((verdict, status))
}
