use crate::analysis::arg::{ArgError, StateId};
use crate::analysis::cegar::{Refiner, counterexample};
use crate::analysis::cpa::state::AbstractState;
use crate::analysis::reached::ReachedSet;
use crate::analysis::statistics::{StatisticsProvider, StatisticsReport};
use crate::analysis::valuation::precision::{VariablePrecision, WithVariablePrecision};
use crate::analysis::valuation::{ValueCpa, ValueState};
use crate::{CpaError, Reason, RefinementFailure};
use argo_cfa::{Cfa, CfaEdge, EdgeKind, Identifier};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Checks counterexamples by replaying them with every variable tracked. Spurious ones are
/// eliminated by tracking the variables their conditions depend on, from the root on.
#[derive(Debug, Clone)]
pub struct ValueRefiner {
    cfa: Arc<Cfa>,
    refinements: usize,
    feasible: usize,
}

impl ValueRefiner {
    pub fn new(cfa: Arc<Cfa>) -> Self {
        Self {
            cfa,
            refinements: 0,
            feasible: 0,
        }
    }

    /// Whether the edges can be executed in sequence from an unconstrained start.
    pub fn is_feasible(edges: &[&CfaEdge]) -> bool {
        let mut state = ValueState::new();
        for edge in edges {
            match ValueCpa::step(&state, &VariablePrecision::All, edge) {
                Some(next) => state = next,
                None => return false,
            }
        }
        true
    }

    /// Variables the conditions along `edges` depend on, directly or through assignments.
    pub fn relevant_variables(edges: &[&CfaEdge]) -> BTreeSet<Identifier> {
        let mut vars: BTreeSet<Identifier> = edges
            .iter()
            .filter_map(|e| match &e.kind {
                EdgeKind::Assume { expr, .. } => Some(expr.variables()),
                _ => None,
            })
            .flatten()
            .collect();
        loop {
            let before = vars.len();
            for edge in edges {
                if let EdgeKind::Assign { var, expr } = &edge.kind
                    && vars.contains(var)
                {
                    vars.extend(expr.variables());
                }
            }
            if vars.len() == before {
                return vars;
            }
        }
    }
}

impl<S: AbstractState, P: WithVariablePrecision> Refiner<S, P> for ValueRefiner {
    fn perform_refinement(&mut self, reached: &mut ReachedSet<S, P>) -> Result<bool, CpaError> {
        let Some(target) = counterexample(reached) else {
            return Ok(false);
        };
        let path = reached.arg().path_to(target)?;
        let edges = path.resolve(&self.cfa)?;
        if Self::is_feasible(&edges) {
            self.feasible += 1;
            info!(target = %target, length = path.len(), "counterexample is feasible");
            return Ok(false);
        }

        let root = path.first().ok_or(ArgError::Unreachable(target))?;
        let precision = reached
            .precision(root)
            .cloned()
            .ok_or(ArgError::NotReached(root))?;
        let current = precision.variable_precision();
        let refined = current.with(Self::relevant_variables(&edges));
        if refined == *current {
            return Err(RefinementFailure::new(Reason::InfeasibleCounterexample, path).into());
        }
        debug!(from = %current, to = %refined, "refined precision");

        let children: Vec<StateId> = reached
            .arg()
            .node(root)
            .map(|n| n.children().collect())
            .unwrap_or_default();
        for child in children {
            if reached.arg().contains(child) {
                reached.remove_subtree(child)?;
            }
        }
        reached.set_precision(root, precision.with_variable_precision(refined))?;
        reached.re_add_to_waitlist(root)?;
        self.refinements += 1;
        Ok(true)
    }
}

impl StatisticsProvider for ValueRefiner {
    fn statistics(&self) -> StatisticsReport {
        StatisticsReport::new("value refiner")
            .count("refinements", self.refinements)
            .count("feasible counterexamples", self.feasible)
    }
}
