use crate::analysis::arg::{ArgPath, StateId};
use crate::analysis::bmc::formula::FormulaManager;
use crate::analysis::cpa::state::{AbstractState, Precision};
use crate::analysis::reached::ReachedSet;
use argo_cfa::{BinaryOp, Cfa, CfaEdge, CfaEdgeId, EdgeKind, Expr, Identifier, UnaryOp};
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Value of a variable at one state of an unrolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Term {
    Known(i64),
    /// A value only constrained by the atoms mentioning this version
    Version(u32),
}

/// Variable values at one state. A variable without a term has the version its epoch gives it:
/// epoch 0 holds the values the unrolling starts from, every later epoch a havocked store.
#[derive(Debug, Clone, PartialEq)]
struct Store {
    terms: BTreeMap<Identifier, Term>,
    epoch: u32,
}

impl Store {
    fn initial() -> Self {
        Self {
            terms: BTreeMap::new(),
            epoch: 0,
        }
    }

    fn known(&self, var: &Identifier) -> Option<i64> {
        match self.terms.get(var) {
            Some(Term::Known(value)) => Some(*value),
            _ => None,
        }
    }
}

/// A guard as a formula, and whether the formula says exactly what the guard says.
#[derive(Debug, Clone)]
struct Guard<F> {
    formula: F,
    exact: bool,
}

/// One way into a state: an edge of the reachability graph, or a covered state standing in for
/// its coverer.
#[derive(Debug, Clone)]
struct Transition<F> {
    from: StateId,
    name: String,
    var: F,
    edge: Option<CfaEdgeId>,
    exact: bool,
}

/// A path picked from a model of an [`UnrollingEncoding`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Witness {
    pub path: ArgPath,
    /// Every transition on the path is encoded without approximation, so some execution of the
    /// program follows it.
    pub exact: bool,
}

/// The executions of an unrolled program as a propositional formula.
///
/// Every state gets a reach variable and every edge of the reachability graph a transition
/// variable. A state is reached through one of its transitions, and a transition is taken only
/// from a reached state whose values satisfy the guard of its CFA edge. Values are tracked per
/// version: constant assignments are evaluated, and comparisons of a version with a constant
/// become atoms, at most one of which holds per version. Whatever is beyond that (arithmetic on
/// unknown values, orderings, joins of differing stores) turns into free atoms, which keeps the
/// formula an over-approximation and marks the transitions involved as inexact.
#[derive(Debug, Clone)]
pub struct UnrollingEncoding<F> {
    reach: BTreeMap<StateId, (String, F)>,
    incoming: BTreeMap<StateId, Vec<Transition<F>>>,
    constraints: F,
    approximations: usize,
}

struct Encoder<'m, M: FormulaManager> {
    manager: &'m mut M,
    prefix: String,
    next_version: u32,
    epochs: u32,
    epoch_versions: BTreeMap<(u32, Identifier), u32>,
    /// Versions whose value no atom relates to the start of the unrolling
    opaque: BTreeSet<u32>,
    equalities: BTreeMap<u32, BTreeMap<i64, M::Formula>>,
}

impl<M: FormulaManager> Encoder<'_, M> {
    fn version(&mut self, opaque: bool) -> u32 {
        let version = self.next_version;
        self.next_version += 1;
        if opaque {
            self.opaque.insert(version);
        }
        version
    }

    fn havoc(&mut self) -> Store {
        self.epochs += 1;
        Store {
            terms: BTreeMap::new(),
            epoch: self.epochs,
        }
    }

    fn term(&mut self, store: &Store, var: Identifier) -> Term {
        if let Some(term) = store.terms.get(&var) {
            return *term;
        }
        let key = (store.epoch, var);
        let version = match self.epoch_versions.get(&key) {
            Some(version) => *version,
            None => {
                let version = self.version(store.epoch > 0);
                self.epoch_versions.insert(key, version);
                version
            }
        };
        Term::Version(version)
    }

    fn value(&mut self, store: &Store, expr: &Expr) -> Option<Term> {
        match expr {
            Expr::Var(var) => Some(self.term(store, *var)),
            _ => expr.eval(&|v| store.known(v)).map(Term::Known),
        }
    }

    fn constant(&mut self, value: bool) -> Guard<M::Formula> {
        Guard {
            formula: self.manager.constant(value),
            exact: true,
        }
    }

    fn atom(&mut self, name: String, exact: bool) -> Guard<M::Formula> {
        Guard {
            formula: self.manager.variable(&format!("{}{name}", self.prefix)),
            exact,
        }
    }

    fn negate(&mut self, guard: Guard<M::Formula>) -> Guard<M::Formula> {
        Guard {
            formula: self.manager.not(&guard.formula),
            exact: guard.exact,
        }
    }

    fn render(&mut self, store: &Store, expr: &Expr) -> String {
        match expr {
            Expr::Const(c) => c.to_string(),
            Expr::Var(var) => match self.term(store, *var) {
                Term::Known(c) => c.to_string(),
                Term::Version(v) => format!("v{v}"),
            },
            Expr::Unary(op, e) => format!("{op:?}({})", self.render(store, e)),
            Expr::Binary(op, l, r) => {
                let l = self.render(store, l);
                let r = self.render(store, r);
                format!("{op:?}({l},{r})")
            }
        }
    }

    fn equality(&mut self, store: &Store, l: &Expr, r: &Expr) -> Guard<M::Formula> {
        match (self.value(store, l), self.value(store, r)) {
            (Some(Term::Known(a)), Some(Term::Known(b))) => self.constant(a == b),
            (Some(Term::Version(v)), Some(Term::Known(c)))
            | (Some(Term::Known(c)), Some(Term::Version(v))) => {
                let exact = !self.opaque.contains(&v);
                let guard = self.atom(format!("v{v}={c}"), exact);
                self.equalities
                    .entry(v)
                    .or_default()
                    .insert(c, guard.formula.clone());
                guard
            }
            (Some(Term::Version(a)), Some(Term::Version(b))) if a == b => self.constant(true),
            (Some(Term::Version(a)), Some(Term::Version(b))) => {
                self.atom(format!("v{}=v{}", a.min(b), a.max(b)), false)
            }
            _ => {
                let key = format!("{}={}", self.render(store, l), self.render(store, r));
                self.atom(key, false)
            }
        }
    }

    fn guard(&mut self, store: &Store, expr: &Expr) -> Guard<M::Formula> {
        if let Some(value) = expr.eval(&|v| store.known(v)) {
            return self.constant(value != 0);
        }
        match expr {
            Expr::Unary(UnaryOp::Not, e) => {
                let inner = self.guard(store, e);
                self.negate(inner)
            }
            Expr::Binary(op @ (BinaryOp::And | BinaryOp::Or), l, r) => {
                let l = self.guard(store, l);
                let r = self.guard(store, r);
                let formula = if *op == BinaryOp::And {
                    self.manager.and(&l.formula, &r.formula)
                } else {
                    self.manager.or(&l.formula, &r.formula)
                };
                Guard {
                    formula,
                    exact: l.exact && r.exact,
                }
            }
            Expr::Binary(BinaryOp::Eq, l, r) => self.equality(store, l, r),
            Expr::Binary(BinaryOp::Ne, l, r) => {
                let equal = self.equality(store, l, r);
                self.negate(equal)
            }
            Expr::Var(_) => {
                let zero = self.equality(store, expr, &Expr::Const(0));
                self.negate(zero)
            }
            _ => {
                let key = format!("<{}>", self.render(store, expr));
                self.atom(key, false)
            }
        }
    }

    /// The store after `edge` and the guard of taking it.
    fn transfer(&mut self, store: &Store, edge: Option<&CfaEdge>) -> (Store, Guard<M::Formula>) {
        let Some(edge) = edge else {
            let guard = self.constant(true);
            return (store.clone(), Guard { exact: false, ..guard });
        };
        match &edge.kind {
            EdgeKind::Assign { var, expr } => {
                let term = match self.value(store, expr) {
                    Some(term) => term,
                    None => Term::Version(self.version(true)),
                };
                let mut next = store.clone();
                next.terms.insert(*var, term);
                (next, self.constant(true))
            }
            EdgeKind::Assume { expr, truth } => {
                let guard = self.guard(store, expr);
                let guard = if *truth { guard } else { self.negate(guard) };
                (store.clone(), guard)
            }
            EdgeKind::Blank | EdgeKind::FunctionCall { .. } | EdgeKind::FunctionReturn { .. } => {
                (store.clone(), self.constant(true))
            }
        }
    }

    /// Where stores disagree on a variable it gets a fresh version.
    fn join(&mut self, stores: Vec<Store>) -> Store {
        let mut stores = stores.into_iter();
        let Some(first) = stores.next() else {
            return Store::initial();
        };
        let rest: Vec<Store> = stores.collect();
        if rest.iter().all(|s| *s == first) {
            return first;
        }
        if rest.iter().any(|s| s.epoch != first.epoch) {
            return self.havoc();
        }
        let vars: BTreeSet<Identifier> = first
            .terms
            .keys()
            .chain(rest.iter().flat_map(|s| s.terms.keys()))
            .copied()
            .collect();
        let mut joined = Store {
            terms: BTreeMap::new(),
            epoch: first.epoch,
        };
        for var in vars {
            let term = self.term(&first, var);
            let agree = rest.iter().all(|s| self.term(s, var) == term);
            let term = if agree {
                term
            } else {
                Term::Version(self.version(true))
            };
            joined.terms.insert(var, term);
        }
        joined
    }
}

/// Parents before children. States on a cycle of the graph come last, by id.
fn topological_order<S, P>(reached: &ReachedSet<S, P>) -> Vec<StateId>
where
    S: AbstractState,
    P: Precision,
{
    let ids: BTreeSet<StateId> = reached.ids().collect();
    let arg = reached.arg();
    let mut pending: BTreeMap<StateId, usize> = ids
        .iter()
        .map(|id| {
            let parents = arg
                .node(*id)
                .map_or(0, |n| n.parents().filter(|p| ids.contains(p)).count());
            (*id, parents)
        })
        .collect();
    let mut ready: VecDeque<StateId> = pending
        .iter()
        .filter(|(_, n)| **n == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(ids.len());
    while let Some(id) = ready.pop_front() {
        order.push(id);
        pending.remove(&id);
        for child in arg.node(id).into_iter().flat_map(|n| n.children()) {
            if let Some(n) = pending.get_mut(&child) {
                *n = n.saturating_sub(1);
                if *n == 0 {
                    ready.push_back(child);
                }
            }
        }
    }
    order.extend(pending.keys().copied());
    order
}

impl<F: Clone> UnrollingEncoding<F> {
    /// `prefix` keeps the variables of different unrollings apart within one manager.
    pub fn encode<S, P, M>(
        manager: &mut M,
        reached: &ReachedSet<S, P>,
        cfa: &Cfa,
        prefix: &str,
    ) -> Self
    where
        S: AbstractState,
        P: Precision,
        M: FormulaManager<Formula = F>,
    {
        let reach: BTreeMap<StateId, (String, F)> = reached
            .ids()
            .map(|id| {
                let name = format!("{prefix}r{}", id.0);
                let var = manager.variable(&name);
                (id, (name, var))
            })
            .collect();
        let mut encoder = Encoder {
            manager,
            prefix: prefix.to_string(),
            next_version: 0,
            epochs: 0,
            epoch_versions: BTreeMap::new(),
            opaque: BTreeSet::new(),
            equalities: BTreeMap::new(),
        };
        let mut constraints = encoder.manager.constant(true);
        let mut stores: BTreeMap<StateId, Store> = BTreeMap::new();
        let mut incoming: BTreeMap<StateId, Vec<Transition<F>>> = BTreeMap::new();
        let arg = reached.arg();

        for id in topological_order(reached) {
            let (Some(node), Some((_, reached_var))) = (arg.node(id), reach.get(&id)) else {
                continue;
            };
            let mut transitions = Vec::new();
            let mut candidates = Vec::new();
            for parent in node.parents() {
                let Some((_, parent_var)) = reach.get(&parent) else {
                    continue;
                };
                let edge = node.edge_from(parent);
                let (store, known) = match stores.get(&parent) {
                    Some(store) => (store.clone(), true),
                    None => (encoder.havoc(), false),
                };
                let (store, guard) = encoder.transfer(&store, edge.and_then(|e| cfa.edge(e)));
                let name = format!("{prefix}t{}>{}", parent.0, id.0);
                let var = encoder.manager.variable(&name);
                let enabled = encoder.manager.and(parent_var, &guard.formula);
                let taken = encoder.manager.implies(&var, &enabled);
                constraints = encoder.manager.and(&constraints, &taken);
                transitions.push(Transition {
                    from: parent,
                    name,
                    var,
                    edge,
                    exact: guard.exact && known,
                });
                candidates.push(store);
            }
            // A covered state continues wherever its coverer does.
            for covered in node.covering() {
                let Some((_, covered_var)) = reach.get(&covered) else {
                    continue;
                };
                let name = format!("{prefix}c{}>{}", covered.0, id.0);
                let var = encoder.manager.variable(&name);
                let taken = encoder.manager.implies(&var, covered_var);
                constraints = encoder.manager.and(&constraints, &taken);
                transitions.push(Transition {
                    from: covered,
                    name,
                    var,
                    edge: None,
                    exact: false,
                });
                candidates.push(encoder.havoc());
            }

            let constraint = if transitions.is_empty() {
                stores.insert(id, Store::initial());
                reached_var.clone()
            } else {
                let store = encoder.join(candidates);
                stores.insert(id, store);
                let vars: Vec<F> = transitions.iter().map(|t| t.var.clone()).collect();
                let through = encoder.manager.or_all(&vars);
                encoder.manager.implies(reached_var, &through)
            };
            constraints = encoder.manager.and(&constraints, &constraint);
            incoming.insert(id, transitions);
        }

        // A version equals at most one of the constants it is compared with.
        let equalities = std::mem::take(&mut encoder.equalities);
        for atoms in equalities.values() {
            for (a, b) in atoms.values().tuple_combinations() {
                let both = encoder.manager.and(a, b);
                let never = encoder.manager.not(&both);
                constraints = encoder.manager.and(&constraints, &never);
            }
        }

        let approximations = incoming.values().flatten().filter(|t| !t.exact).count();
        Self {
            reach,
            incoming,
            constraints,
            approximations,
        }
    }

    /// Reached states are reached through a transition whose guard holds.
    pub fn constraints(&self) -> &F {
        &self.constraints
    }

    pub fn reach(&self, id: StateId) -> Option<&F> {
        self.reach.get(&id).map(|(_, var)| var)
    }

    /// The variable of the transition from `from` into `to`.
    pub fn transition(&self, from: StateId, to: StateId) -> Option<&F> {
        self.incoming
            .get(&to)?
            .iter()
            .find(|t| t.from == from)
            .map(|t| &t.var)
    }

    /// How many transitions are over-approximated.
    pub fn approximations(&self) -> usize {
        self.approximations
    }

    /// The disjunction of the reach variables of `states`.
    pub fn any_of<M, I>(&self, manager: &mut M, states: I) -> F
    where
        M: FormulaManager<Formula = F>,
        I: IntoIterator<Item = StateId>,
    {
        let vars: Vec<F> = states
            .into_iter()
            .filter_map(|s| self.reach(s).cloned())
            .collect();
        manager.or_all(&vars)
    }

    /// The states a model of the formula reaches. Variables the model leaves out are false.
    pub fn reached_in(&self, model: &BTreeMap<String, bool>) -> Vec<StateId> {
        self.reach
            .iter()
            .filter(|(_, (name, _))| model.get(name) == Some(&true))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Follow the transitions a model takes back from `target` to a root.
    ///
    /// `None` if the model does not reach `target` along a path from a root.
    pub fn witness(&self, model: &BTreeMap<String, bool>, target: StateId) -> Option<Witness> {
        let holds = |name: &str| model.get(name) == Some(&true);
        if !holds(&self.reach.get(&target)?.0) {
            return None;
        }
        let mut states = vec![target];
        let mut edges = vec![];
        let mut exact = true;
        let mut seen = BTreeSet::from([target]);
        let mut current = target;
        loop {
            let incoming = self.incoming.get(&current).map(Vec::as_slice).unwrap_or_default();
            if incoming.is_empty() {
                break;
            }
            let taken = incoming.iter().find(|t| holds(&t.name))?;
            if !seen.insert(taken.from) {
                return None;
            }
            exact &= taken.exact;
            states.push(taken.from);
            edges.push(taken.edge);
            current = taken.from;
        }
        states.reverse();
        edges.reverse();
        Some(Witness {
            path: ArgPath::new(states, edges),
            exact,
        })
    }
}
