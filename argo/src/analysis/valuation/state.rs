use crate::analysis::cpa::lattice::JoinSemiLattice;
use crate::analysis::cpa::lattice::flat::FlatLattice;
use crate::analysis::cpa::state::AbstractState;
use crate::analysis::valuation::precision::VariablePrecision;
use argo_cfa::{BinaryOp, CfaNodeId, Expr, Identifier};
use itertools::Itertools;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Known values of program variables. A variable without an entry may hold any value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ValueState {
    values: BTreeMap<Identifier, i64>,
}

impl ValueState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, var: &Identifier) -> FlatLattice<i64> {
        self.values
            .get(var)
            .map_or(FlatLattice::Top, |v| FlatLattice::Value(*v))
    }

    pub fn value(&self, var: &Identifier) -> Option<i64> {
        self.values.get(var).copied()
    }

    pub fn set(&mut self, var: Identifier, value: FlatLattice<i64>) {
        match value {
            FlatLattice::Value(v) => {
                self.values.insert(var, v);
            }
            FlatLattice::Top => {
                self.values.remove(&var);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &i64)> {
        self.values.iter()
    }

    pub fn eval(&self, expr: &Expr) -> Option<i64> {
        expr.eval(&|v| self.value(v))
    }

    /// The state after `var = expr`, forgetting `var` when it is not tracked.
    pub fn assign(&self, var: Identifier, expr: &Expr, precision: &VariablePrecision) -> Self {
        let mut next = self.clone();
        let value = match self.eval(expr) {
            Some(v) if precision.tracks(&var) => FlatLattice::Value(v),
            _ => FlatLattice::Top,
        };
        next.set(var, value);
        next
    }

    /// The state after assuming `expr` evaluates to `truth`, or `None` when it cannot.
    ///
    /// Unknown conditions pass; an equality with a constant then pins the tracked variable.
    pub fn assume(&self, expr: &Expr, truth: bool, precision: &VariablePrecision) -> Option<Self> {
        if let Some(v) = self.eval(expr) {
            return ((v != 0) == truth).then(|| self.clone());
        }
        let mut next = self.clone();
        let pinned = match (expr, truth) {
            (Expr::Binary(BinaryOp::Eq, l, r), true) | (Expr::Binary(BinaryOp::Ne, l, r), false) => {
                match (l.as_ref(), r.as_ref()) {
                    (Expr::Var(var), c) | (c, Expr::Var(var)) => {
                        self.eval(c).map(|value| (*var, value))
                    }
                    _ => None,
                }
            }
            _ => None,
        };
        if let Some((var, value)) = pinned
            && precision.tracks(&var)
        {
            next.set(var, FlatLattice::Value(value));
        }
        Some(next)
    }

    /// Forget every variable not tracked by `precision`.
    pub fn abstracted(&self, precision: &VariablePrecision) -> Self {
        Self {
            values: self
                .values
                .iter()
                .filter(|(var, _)| precision.tracks(var))
                .map(|(var, value)| (*var, *value))
                .collect(),
        }
    }
}

impl Display for ValueState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let values = self
            .values
            .iter()
            .map(|(var, value)| format!("{} = {value}", var.as_str()))
            .join(", ");
        write!(f, "{{{values}}}")
    }
}

/// `a <= b` iff `a` knows at least everything `b` knows.
impl PartialOrd for ValueState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let covers = |a: &Self, b: &Self| b.values.iter().all(|(k, v)| a.values.get(k) == Some(v));
        match (covers(self, other), covers(other, self)) {
            (true, true) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) => None,
        }
    }
}

impl JoinSemiLattice for ValueState {
    fn join(&mut self, other: &Self) {
        self.values.retain(|k, v| other.values.get(k) == Some(v));
    }
}

/// Values alone say nothing about locations; combine with a location analysis.
impl AbstractState for ValueState {
    fn location(&self) -> Option<CfaNodeId> {
        None
    }
}
