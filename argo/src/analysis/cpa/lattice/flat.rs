use crate::analysis::cpa::lattice::JoinSemiLattice;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// A single known value, or "any value".
#[derive(PartialEq, Eq, Copy, Clone, Hash, Debug)]
pub enum FlatLattice<C> {
    Value(C),
    Top,
}

impl<C> From<C> for FlatLattice<C> {
    fn from(value: C) -> Self {
        FlatLattice::Value(value)
    }
}

impl<C: Display> Display for FlatLattice<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FlatLattice::Value(a) => write!(f, "{a}"),
            FlatLattice::Top => write!(f, "⊤"),
        }
    }
}

impl<C> FlatLattice<C> {
    pub fn is_top(&self) -> bool {
        matches!(self, FlatLattice::Top)
    }

    pub fn value(&self) -> Option<&C> {
        match self {
            FlatLattice::Value(c) => Some(c),
            FlatLattice::Top => None,
        }
    }
}

impl<C: PartialEq> PartialOrd for FlatLattice<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Top, Self::Top) => Some(Ordering::Equal),
            (Self::Top, Self::Value(_)) => Some(Ordering::Greater),
            (Self::Value(_), Self::Top) => Some(Ordering::Less),
            (Self::Value(a), Self::Value(b)) => (a == b).then_some(Ordering::Equal),
        }
    }
}

impl<C: Eq> JoinSemiLattice for FlatLattice<C> {
    fn join(&mut self, other: &Self) {
        if let (Self::Value(a), Self::Value(b)) = (&*self, other)
            && a == b
        {
            return;
        }
        *self = Self::Top;
    }
}
