use crate::analysis::cpa::state::Precision;
use argo_cfa::Identifier;
use itertools::Itertools;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Which variables the value analysis keeps values for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VariablePrecision {
    All,
    Tracked(BTreeSet<Identifier>),
}

impl Default for VariablePrecision {
    fn default() -> Self {
        VariablePrecision::Tracked(BTreeSet::new())
    }
}

impl VariablePrecision {
    pub fn tracks(&self, var: &Identifier) -> bool {
        match self {
            VariablePrecision::All => true,
            VariablePrecision::Tracked(vars) => vars.contains(var),
        }
    }

    /// This precision extended by `vars`.
    pub fn with<I: IntoIterator<Item = Identifier>>(&self, vars: I) -> Self {
        match self {
            VariablePrecision::All => VariablePrecision::All,
            VariablePrecision::Tracked(tracked) => {
                let mut tracked = tracked.clone();
                tracked.extend(vars);
                VariablePrecision::Tracked(tracked)
            }
        }
    }

    /// Restricted to `vars`.
    pub fn restricted_to(&self, vars: &BTreeSet<Identifier>) -> Self {
        match self {
            VariablePrecision::All => VariablePrecision::Tracked(vars.clone()),
            VariablePrecision::Tracked(tracked) => {
                VariablePrecision::Tracked(tracked.intersection(vars).copied().collect())
            }
        }
    }
}

impl Display for VariablePrecision {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VariablePrecision::All => write!(f, "all"),
            VariablePrecision::Tracked(vars) => {
                write!(f, "[{}]", vars.iter().map(|v| v.as_str()).join(", "))
            }
        }
    }
}

/// Precisions that contain a [`VariablePrecision`], so that a value refiner can strengthen
/// them whatever analysis they belong to.
pub trait WithVariablePrecision: Precision {
    fn variable_precision(&self) -> &VariablePrecision;

    fn with_variable_precision(&self, precision: VariablePrecision) -> Self;
}

impl WithVariablePrecision for VariablePrecision {
    fn variable_precision(&self) -> &VariablePrecision {
        self
    }

    fn with_variable_precision(&self, precision: VariablePrecision) -> Self {
        precision
    }
}

impl<A: Precision> WithVariablePrecision for (A, VariablePrecision) {
    fn variable_precision(&self) -> &VariablePrecision {
        &self.1
    }

    fn with_variable_precision(&self, precision: VariablePrecision) -> Self {
        (self.0.clone(), precision)
    }
}
