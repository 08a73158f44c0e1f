use crate::analysis::arg::StateId;
use crate::analysis::statistics::{StatisticsProvider, StatisticsReport};
use argo_cfa::CfaEdgeId;
use serde::Serialize;

/// Hooks into the exploration engine.
///
/// Observers see every transition the engine takes without influencing it. This is the place
/// to accumulate information about a program that does not belong in any single abstract state.
pub trait ExplorationObserver<S>: Send {
    /// Called for every computed successor, before precision adjustment and merging.
    fn transition(&mut self, _from: StateId, _state: &S, _edge: Option<CfaEdgeId>) {}

    /// `reached` was replaced by `merged` after merging in a new successor.
    fn merged(&mut self, _reached: StateId, _merged: StateId) {}

    /// A new successor was found covered by `by` and not added.
    fn covered(&mut self, _state: &S, _by: StateId) {}

    /// Precision adjustment ended the exploration at `at`.
    fn broke(&mut self, _at: StateId) {}
}

/// Counters kept by every engine run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExplorationStatistics {
    pub iterations: usize,
    pub successors: usize,
    pub merges: usize,
    pub covered: usize,
    pub breaks: usize,
    pub added: usize,
}

impl<S> ExplorationObserver<S> for ExplorationStatistics {
    fn transition(&mut self, _: StateId, _: &S, _: Option<CfaEdgeId>) {
        self.successors += 1;
    }

    fn merged(&mut self, _: StateId, _: StateId) {
        self.merges += 1;
    }

    fn covered(&mut self, _: &S, _: StateId) {
        self.covered += 1;
    }

    fn broke(&mut self, _: StateId) {
        self.breaks += 1;
    }
}

impl StatisticsProvider for ExplorationStatistics {
    fn statistics(&self) -> StatisticsReport {
        StatisticsReport::new("cpa")
            .count("iterations", self.iterations)
            .count("successors", self.successors)
            .count("merges", self.merges)
            .count("covered", self.covered)
            .count("breaks", self.breaks)
            .count("added", self.added)
    }
}
