use crate::CpaError;
use crate::analysis::arg::StateId;
use crate::analysis::cpa::ConfigurableProgramAnalysis;
use crate::analysis::cpa::state::Transfer;
use argo_cfa::{Cfa, CfaEdge, CfaEdgeId, CfaError};
use std::fmt::{Display, Formatter};

/// A path through the reachability graph, from a root to some state.
///
/// `edges[i]` is the CFA edge taken from `states[i]` to `states[i + 1]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ArgPath {
    states: Vec<StateId>,
    edges: Vec<Option<CfaEdgeId>>,
}

impl ArgPath {
    pub(crate) fn new(states: Vec<StateId>, edges: Vec<Option<CfaEdgeId>>) -> Self {
        debug_assert_eq!(states.len(), edges.len() + 1);
        Self { states, edges }
    }

    pub fn states(&self) -> &[StateId] {
        &self.states
    }

    pub fn edges(&self) -> &[Option<CfaEdgeId>] {
        &self.edges
    }

    pub fn first(&self) -> Option<StateId> {
        self.states.first().copied()
    }

    pub fn last(&self) -> Option<StateId> {
        self.states.last().copied()
    }

    /// Number of transitions.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// The CFA edges of this path, skipping transitions without one.
    pub fn cfa_edges(&self) -> Vec<CfaEdgeId> {
        self.edges.iter().flatten().copied().collect()
    }

    /// Resolve the path's edges against `cfa`.
    pub fn resolve<'a>(&self, cfa: &'a Cfa) -> Result<Vec<&'a CfaEdge>, CfaError> {
        self.cfa_edges()
            .into_iter()
            .map(|id| cfa.edge(id).ok_or(CfaError::UnknownEdge(id)))
            .collect()
    }

    /// Re-run the transfer relation of `cpa` along this path, starting at `initial`.
    ///
    /// Returns the state reached at the end of the path, or `None` if some transition has no
    /// successor (the path is infeasible in the domain of `cpa`). Where a transition has several
    /// successors, the first one is followed.
    pub fn replay<C: ConfigurableProgramAnalysis>(
        &self,
        cpa: &C,
        cfa: &Cfa,
        initial: C::State,
        precision: &C::Precision,
    ) -> Result<Option<C::State>, CpaError> {
        let mut state = initial;
        for edge in self.resolve(cfa)? {
            match cpa
                .transfer_relation()
                .successors_for_edge(&state, precision, edge)?
            {
                Transfer::Successors(successors) => match successors.into_iter().next() {
                    Some(next) => state = next.state,
                    None => return Ok(None),
                },
                Transfer::MissingBlock(_) | Transfer::PropertyViolation(_) => return Ok(None),
            }
        }
        Ok(Some(state))
    }
}

impl Display for ArgPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut states = self.states.iter();
        if let Some(first) = states.next() {
            write!(f, "{first}")?;
        }
        for (state, edge) in states.zip(&self.edges) {
            match edge {
                Some(e) => write!(f, " -{e}-> {state}")?,
                None => write!(f, " -> {state}")?,
            }
        }
        Ok(())
    }
}
