use crate::CpaError;
use boolean_expression::{BDD, BDDFunc};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Builds propositional formulas and decides them.
///
/// Bounded model checking and k-induction only talk to the solver through this trait, so any
/// backend able to decide propositional satisfiability can be plugged in.
pub trait FormulaManager: Send {
    type Formula: Clone + Debug;

    fn constant(&mut self, value: bool) -> Self::Formula;

    /// The variable called `name`. Asking twice for the same name gives the same variable.
    fn variable(&mut self, name: &str) -> Self::Formula;

    fn not(&mut self, f: &Self::Formula) -> Self::Formula;

    fn and(&mut self, a: &Self::Formula, b: &Self::Formula) -> Self::Formula;

    fn or(&mut self, a: &Self::Formula, b: &Self::Formula) -> Self::Formula;

    fn implies(&mut self, a: &Self::Formula, b: &Self::Formula) -> Self::Formula {
        let not_a = self.not(a);
        self.or(&not_a, b)
    }

    fn and_all<'a, I>(&mut self, formulas: I) -> Self::Formula
    where
        I: IntoIterator<Item = &'a Self::Formula>,
        Self::Formula: 'a,
    {
        let mut result = self.constant(true);
        for f in formulas {
            result = self.and(&result, f);
        }
        result
    }

    fn or_all<'a, I>(&mut self, formulas: I) -> Self::Formula
    where
        I: IntoIterator<Item = &'a Self::Formula>,
        Self::Formula: 'a,
    {
        let mut result = self.constant(false);
        for f in formulas {
            result = self.or(&result, f);
        }
        result
    }

    fn is_satisfiable(&mut self, f: &Self::Formula) -> Result<bool, CpaError>;

    /// A satisfying assignment of the variables `f` depends on, if there is one.
    fn model(&mut self, f: &Self::Formula) -> Result<Option<BTreeMap<String, bool>>, CpaError>;

    /// Whether `f` holds under every assignment, decided as unsatisfiability of its negation.
    fn is_tautology(&mut self, f: &Self::Formula) -> Result<bool, CpaError> {
        let negated = self.not(f);
        Ok(!self.is_satisfiable(&negated)?)
    }
}

/// Decides formulas with a reduced ordered binary decision diagram. Variables are ordered by
/// first use.
#[derive(Debug, Clone)]
pub struct BddFormulaManager {
    bdd: BDD<String>,
    queries: usize,
}

impl Default for BddFormulaManager {
    fn default() -> Self {
        Self {
            bdd: BDD::new(),
            queries: 0,
        }
    }
}

impl BddFormulaManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Satisfiability checks answered so far.
    pub fn queries(&self) -> usize {
        self.queries
    }
}

impl FormulaManager for BddFormulaManager {
    type Formula = BDDFunc;

    fn constant(&mut self, value: bool) -> BDDFunc {
        self.bdd.constant(value)
    }

    fn variable(&mut self, name: &str) -> BDDFunc {
        self.bdd.terminal(name.to_string())
    }

    fn not(&mut self, f: &BDDFunc) -> BDDFunc {
        self.bdd.not(*f)
    }

    fn and(&mut self, a: &BDDFunc, b: &BDDFunc) -> BDDFunc {
        self.bdd.and(*a, *b)
    }

    fn or(&mut self, a: &BDDFunc, b: &BDDFunc) -> BDDFunc {
        self.bdd.or(*a, *b)
    }

    fn implies(&mut self, a: &BDDFunc, b: &BDDFunc) -> BDDFunc {
        self.bdd.implies(*a, *b)
    }

    fn is_satisfiable(&mut self, f: &BDDFunc) -> Result<bool, CpaError> {
        self.queries += 1;
        Ok(self.bdd.sat(*f))
    }

    fn model(&mut self, f: &BDDFunc) -> Result<Option<BTreeMap<String, bool>>, CpaError> {
        self.queries += 1;
        Ok(self.bdd.sat_one(*f).map(|m| m.into_iter().collect()))
    }
}
