use crate::{Identifier, ident};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// Whether this operator yields a truth value (encoded as `0`/`1`).
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::And
                | BinaryOp::Or
        )
    }

    fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// Integer expressions labelling CFA edges. Truth values are integers: zero is false,
/// anything else is true.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Const(i64),
    Var(Identifier),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn constant(value: i64) -> Self {
        Expr::Const(value)
    }

    pub fn var<S: AsRef<str>>(name: S) -> Self {
        Expr::Var(ident(name))
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn negate(self) -> Self {
        Expr::Unary(UnaryOp::Not, Box::new(self))
    }

    pub fn plus(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Add, self, rhs)
    }

    pub fn minus(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Sub, self, rhs)
    }

    pub fn times(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Mul, self, rhs)
    }

    pub fn equals(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Eq, self, rhs)
    }

    pub fn not_equals(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Ne, self, rhs)
    }

    pub fn less_than(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Lt, self, rhs)
    }

    pub fn less_equal(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Le, self, rhs)
    }

    pub fn and(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::And, self, rhs)
    }

    pub fn or(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Or, self, rhs)
    }

    /// Evaluate under a partial environment. Returns `None` when the value depends on an
    /// unknown variable, or on a division by zero.
    ///
    /// Boolean connectives short-circuit, so `false && x` is known even if `x` is not.
    pub fn eval<F>(&self, env: &F) -> Option<i64>
    where
        F: Fn(&Identifier) -> Option<i64>,
    {
        match self {
            Expr::Const(c) => Some(*c),
            Expr::Var(v) => env(v),
            Expr::Unary(UnaryOp::Neg, e) => e.eval(env).map(i64::wrapping_neg),
            Expr::Unary(UnaryOp::Not, e) => e.eval(env).map(|v| (v == 0) as i64),
            Expr::Binary(BinaryOp::And, l, r) => match (l.eval(env), r.eval(env)) {
                (Some(0), _) | (_, Some(0)) => Some(0),
                (Some(_), Some(_)) => Some(1),
                _ => None,
            },
            Expr::Binary(BinaryOp::Or, l, r) => match (l.eval(env), r.eval(env)) {
                (Some(a), _) if a != 0 => Some(1),
                (_, Some(b)) if b != 0 => Some(1),
                (Some(_), Some(_)) => Some(0),
                _ => None,
            },
            Expr::Binary(op, l, r) => {
                let a = l.eval(env)?;
                let b = r.eval(env)?;
                match op {
                    BinaryOp::Add => Some(a.wrapping_add(b)),
                    BinaryOp::Sub => Some(a.wrapping_sub(b)),
                    BinaryOp::Mul => Some(a.wrapping_mul(b)),
                    BinaryOp::Div => a.checked_div(b),
                    BinaryOp::Rem => a.checked_rem(b),
                    BinaryOp::Eq => Some((a == b) as i64),
                    BinaryOp::Ne => Some((a != b) as i64),
                    BinaryOp::Lt => Some((a < b) as i64),
                    BinaryOp::Le => Some((a <= b) as i64),
                    BinaryOp::Gt => Some((a > b) as i64),
                    BinaryOp::Ge => Some((a >= b) as i64),
                    BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
                }
            }
        }
    }

    /// All variables mentioned by this expression.
    pub fn variables(&self) -> BTreeSet<Identifier> {
        let mut out = BTreeSet::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut BTreeSet<Identifier>) {
        match self {
            Expr::Const(_) => {}
            Expr::Var(v) => {
                out.insert(*v);
            }
            Expr::Unary(_, e) => e.collect_variables(out),
            Expr::Binary(_, l, r) => {
                l.collect_variables(out);
                r.collect_variables(out);
            }
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Const(c) => write!(f, "{c}"),
            Expr::Var(v) => write!(f, "{}", v.as_str()),
            Expr::Unary(UnaryOp::Neg, e) => write!(f, "-({e})"),
            Expr::Unary(UnaryOp::Not, e) => write!(f, "!({e})"),
            Expr::Binary(op, l, r) => write!(f, "({l} {} {r})", op.symbol()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, i64)]) -> impl Fn(&Identifier) -> Option<i64> {
        let map: HashMap<Identifier, i64> = pairs.iter().map(|(k, v)| (ident(k), *v)).collect();
        move |v| map.get(v).copied()
    }

    #[test]
    fn evaluates_arithmetic_and_comparisons() {
        let e = Expr::var("x").plus(Expr::constant(2)).less_than(Expr::constant(5));
        assert_eq!(e.eval(&env(&[("x", 2)])), Some(1));
        assert_eq!(e.eval(&env(&[("x", 3)])), Some(0));
        assert_eq!(e.eval(&env(&[])), None);
    }

    #[test]
    fn connectives_short_circuit_on_unknowns() {
        let unknown = Expr::var("y").equals(Expr::constant(1));
        let falsy = Expr::var("x").equals(Expr::constant(1));
        let e = falsy.clone().and(unknown.clone());
        assert_eq!(e.eval(&env(&[("x", 0)])), Some(0));
        let e = falsy.negate().or(unknown);
        assert_eq!(e.eval(&env(&[("x", 0)])), Some(1));
    }

    #[test]
    fn division_by_zero_is_unknown() {
        let e = Expr::constant(4).times(Expr::constant(2));
        assert_eq!(e.eval(&env(&[])), Some(8));
        let e = Expr::binary(BinaryOp::Div, Expr::constant(1), Expr::var("z"));
        assert_eq!(e.eval(&env(&[("z", 0)])), None);
    }

    #[test]
    fn collects_variables() {
        let e = Expr::var("a").plus(Expr::var("b")).equals(Expr::var("a"));
        let vars: Vec<_> = e.variables().into_iter().map(|v| v.to_string()).collect();
        assert_eq!(vars, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(e.to_string(), "((a + b) == a)");
    }
}
