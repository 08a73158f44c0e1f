use crate::analysis::compound::CompoundState;
use crate::analysis::valuation::{ValueState, VariablePrecision};
use argo_cfa::{Block, Cfa, EdgeKind, Identifier};
use std::collections::{BTreeMap, BTreeSet};

/// Strips a state down to what a block can observe before the block is analyzed, and puts the
/// stripped parts back into the states leaving the block.
///
/// Entry states that reduce to the same value share one summary, so the coarser the
/// reduction, the more summaries are reused.
pub trait Reducer<S, P: Clone>: Send + Sync {
    fn reduce(&self, state: &S, block: &Block) -> S;

    /// Combine `exit`, a reduced state at the block exit, with the parts of `root` that
    /// [`reduce`](Self::reduce) removed. `root` is the unreduced state at the block entry.
    fn expand(&self, root: &S, block: &Block, exit: S) -> S;

    fn reduce_precision(&self, precision: &P, _block: &Block) -> P {
        precision.clone()
    }
}

/// Keeps states unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityReducer;

impl<S: Clone, P: Clone> Reducer<S, P> for IdentityReducer {
    fn reduce(&self, state: &S, _: &Block) -> S {
        state.clone()
    }

    fn expand(&self, _: &S, _: &Block, exit: S) -> S {
        exit
    }
}

/// Projects value states onto the variables a function, or anything it calls, mentions.
#[derive(Debug, Clone, Default)]
pub struct ValueReducer {
    variables: BTreeMap<Identifier, BTreeSet<Identifier>>,
}

impl ValueReducer {
    pub fn new(cfa: &Cfa) -> Self {
        let mut variables: BTreeMap<Identifier, BTreeSet<Identifier>> = BTreeMap::new();
        let mut callees: BTreeMap<Identifier, BTreeSet<Identifier>> = BTreeMap::new();
        for edge in cfa.edges() {
            let Some(function) = cfa.node(edge.source).map(|n| n.function) else {
                continue;
            };
            let vars = variables.entry(function).or_default();
            match &edge.kind {
                EdgeKind::Assign { var, expr } => {
                    vars.insert(*var);
                    vars.extend(expr.variables());
                }
                EdgeKind::Assume { expr, .. } => vars.extend(expr.variables()),
                EdgeKind::FunctionCall { callee, .. } => {
                    callees.entry(function).or_default().insert(*callee);
                }
                EdgeKind::Blank | EdgeKind::FunctionReturn { .. } => {}
            }
        }
        // Close over calls until nothing changes.
        let mut changed = true;
        while changed {
            changed = false;
            for (caller, called) in &callees {
                let inherited: BTreeSet<Identifier> = called
                    .iter()
                    .filter_map(|c| variables.get(c))
                    .flatten()
                    .copied()
                    .collect();
                let own = variables.entry(*caller).or_default();
                let before = own.len();
                own.extend(inherited);
                changed |= own.len() != before;
            }
        }
        Self { variables }
    }

    pub fn variables(&self, function: &Identifier) -> Option<&BTreeSet<Identifier>> {
        self.variables.get(function)
    }

    fn relevant(&self, block: &Block) -> BTreeSet<Identifier> {
        self.variables
            .get(&block.function)
            .cloned()
            .unwrap_or_default()
    }
}

impl Reducer<ValueState, VariablePrecision> for ValueReducer {
    fn reduce(&self, state: &ValueState, block: &Block) -> ValueState {
        let relevant = self.relevant(block);
        let mut reduced = ValueState::new();
        for (var, value) in state.iter().filter(|(v, _)| relevant.contains(*v)) {
            reduced.set(*var, (*value).into());
        }
        reduced
    }

    fn expand(&self, root: &ValueState, block: &Block, exit: ValueState) -> ValueState {
        let relevant = self.relevant(block);
        let mut expanded = exit;
        for (var, value) in root.iter().filter(|(v, _)| !relevant.contains(*v)) {
            expanded.set(*var, (*value).into());
        }
        expanded
    }

    fn reduce_precision(&self, precision: &VariablePrecision, block: &Block) -> VariablePrecision {
        precision.restricted_to(&self.relevant(block))
    }
}

/// Reduces each component of a pair of states with its own reducer.
impl<S1, S2, P1, P2, R1, R2> Reducer<CompoundState<S1, S2>, (P1, P2)> for (R1, R2)
where
    P1: Clone,
    P2: Clone,
    R1: Reducer<S1, P1>,
    R2: Reducer<S2, P2>,
{
    fn reduce(&self, state: &CompoundState<S1, S2>, block: &Block) -> CompoundState<S1, S2> {
        CompoundState(self.0.reduce(&state.0, block), self.1.reduce(&state.1, block))
    }

    fn expand(
        &self,
        root: &CompoundState<S1, S2>,
        block: &Block,
        exit: CompoundState<S1, S2>,
    ) -> CompoundState<S1, S2> {
        let CompoundState(first, second) = exit;
        CompoundState(
            self.0.expand(&root.0, block, first),
            self.1.expand(&root.1, block, second),
        )
    }

    fn reduce_precision(&self, precision: &(P1, P2), block: &Block) -> (P1, P2) {
        (
            self.0.reduce_precision(&precision.0, block),
            self.1.reduce_precision(&precision.1, block),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argo_cfa::{BlockPartitioning, CfaBuilder, Expr, ident};

    /// `main` sets `a` and `b` and calls `f`, which increments `a` by calling `g`.
    fn nested_calls() -> Cfa {
        let mut b = CfaBuilder::new();
        let main = b.add_function("main").unwrap();
        let f = b.add_function("f").unwrap();
        let g = b.add_function("g").unwrap();
        let set_b = b.add_node("main").unwrap();
        let call = b.add_node("main").unwrap();
        b.assign(main.entry, set_b, "a", Expr::constant(1)).unwrap();
        b.assign(set_b, call, "b", Expr::constant(2)).unwrap();
        b.call(call, main.exit, "f").unwrap();
        b.call(f.entry, f.exit, "g").unwrap();
        b.assign(g.entry, g.exit, "a", Expr::var("a").plus(Expr::constant(1)))
            .unwrap();
        b.build("main").unwrap()
    }

    #[test]
    fn callers_inherit_the_variables_of_callees() {
        let cfa = nested_calls();
        let reducer = ValueReducer::new(&cfa);
        assert_eq!(
            reducer.variables(&ident("f")),
            Some(&BTreeSet::from([ident("a")]))
        );
        assert_eq!(
            reducer.variables(&ident("main")),
            Some(&BTreeSet::from([ident("a"), ident("b")]))
        );
    }

    #[test]
    fn reduction_hides_what_the_block_cannot_see() {
        let cfa = nested_calls();
        let blocks = BlockPartitioning::by_function(&cfa);
        let block = blocks.block_at_entry(cfa.function("f").unwrap().entry).unwrap();
        let reducer = ValueReducer::new(&cfa);

        let mut root = ValueState::new();
        root.set(ident("a"), 1.into());
        root.set(ident("b"), 2.into());
        let reduced = reducer.reduce(&root, block);
        assert_eq!(reduced.value(&ident("a")), Some(1));
        assert_eq!(reduced.value(&ident("b")), None);

        let mut exit = reduced;
        exit.set(ident("a"), 2.into());
        let expanded = reducer.expand(&root, block, exit);
        assert_eq!(expanded.value(&ident("a")), Some(2));
        assert_eq!(expanded.value(&ident("b")), Some(2));

        assert_eq!(
            reducer.reduce_precision(&VariablePrecision::All, block),
            VariablePrecision::Tracked(BTreeSet::from([ident("a")]))
        );
    }
}
