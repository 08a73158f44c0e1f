use crate::analysis::cpa::state::{AbstractState, Precision};
use crate::analysis::reached::{ReachedSet, ReachedSummary};
use crate::analysis::status::AlgorithmStatus;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Notified by an algorithm whenever it has brought its reached set into a consistent state
/// worth publishing (e.g. after every CEGAR iteration).
pub trait ReachedSetUpdateListener<S, P>: Send {
    fn updated(&mut self, reached: &ReachedSet<S, P>, status: AlgorithmStatus);
}

/// A thread-safe view of the reached sets of several analyses running side by side.
#[derive(Debug, Clone, Default)]
pub struct AggregatedReachedSets {
    inner: Arc<Mutex<BTreeMap<String, (ReachedSummary, AlgorithmStatus)>>>,
}

impl AggregatedReachedSets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish<N: Into<String>>(&self, name: N, summary: ReachedSummary, status: AlgorithmStatus) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), (summary, status));
    }

    pub fn get(&self, name: &str) -> Option<(ReachedSummary, AlgorithmStatus)> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
    }

    pub fn snapshot(&self) -> BTreeMap<String, (ReachedSummary, AlgorithmStatus)> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// A listener publishing under `name`.
    pub fn listener<N: Into<String>>(&self, name: N) -> AggregatingListener {
        AggregatingListener {
            name: name.into(),
            sink: self.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggregatingListener {
    name: String,
    sink: AggregatedReachedSets,
}

impl<S: AbstractState, P: Precision> ReachedSetUpdateListener<S, P> for AggregatingListener {
    fn updated(&mut self, reached: &ReachedSet<S, P>, status: AlgorithmStatus) {
        self.sink.publish(self.name.clone(), reached.summary(), status);
    }
}
