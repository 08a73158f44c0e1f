use crate::analysis::cpa::lattice::JoinSemiLattice;
use crate::analysis::cpa::state::AbstractState;
use argo_cfa::CfaNodeId;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompoundState<S1, S2>(pub S1, pub S2);

/// Product order: below iff both components are below.
impl<S1: PartialOrd, S2: PartialOrd> PartialOrd for CompoundState<S1, S2> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.0.partial_cmp(&other.0)?, self.1.partial_cmp(&other.1)?) {
            (Ordering::Equal, ord) | (ord, Ordering::Equal) => Some(ord),
            (a, b) if a == b => Some(a),
            _ => None,
        }
    }
}

impl<S1: JoinSemiLattice, S2: JoinSemiLattice> JoinSemiLattice for CompoundState<S1, S2> {
    fn join(&mut self, other: &Self) {
        self.0.join(&other.0);
        self.1.join(&other.1);
    }
}

impl<S1: Display, S2: Display> Display for CompoundState<S1, S2> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

impl<S1: AbstractState, S2: AbstractState> AbstractState for CompoundState<S1, S2> {
    fn location(&self) -> Option<CfaNodeId> {
        self.0.location().or_else(|| self.1.location())
    }

    fn is_target(&self) -> bool {
        self.0.is_target() || self.1.is_target()
    }

    fn violated_properties(&self) -> Vec<String> {
        let mut properties = self.0.violated_properties();
        properties.extend(self.1.violated_properties());
        properties
    }
}

/// Strengthens the components of a freshly computed compound successor with each other.
/// Returns `false` when the combination is contradictory and the successor must be dropped.
pub type Strengthening<S1, S2> = fn(&mut S1, &mut S2) -> bool;
