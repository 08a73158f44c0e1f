use crate::analysis::arg::StateId;
use crate::analysis::cpa::state::AbstractState;
use crate::config::TraversalOrder;
use argo_cfa::Cfa;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::Debug;
use std::sync::Arc;

/// The states of a reached set that still have to be explored, and the order in which that
/// happens.
pub trait Waitlist<S>: Debug + Send {
    /// Queue `id`. Queuing a state that is already waiting does nothing.
    fn push(&mut self, id: StateId, state: &S);

    fn pop(&mut self) -> Option<StateId>;

    fn remove(&mut self, id: StateId) -> bool;

    fn contains(&self, id: StateId) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ids(&self) -> Vec<StateId>;

    fn clear(&mut self);
}

/// FIFO or LIFO order.
#[derive(Debug, Clone, Default)]
pub struct SimpleWaitlist {
    depth_first: bool,
    queue: VecDeque<StateId>,
    members: BTreeSet<StateId>,
}

impl SimpleWaitlist {
    pub fn breadth_first() -> Self {
        Self::default()
    }

    pub fn depth_first() -> Self {
        Self {
            depth_first: true,
            ..Self::default()
        }
    }
}

impl<S> Waitlist<S> for SimpleWaitlist {
    fn push(&mut self, id: StateId, _state: &S) {
        if self.members.insert(id) {
            self.queue.push_back(id);
        }
    }

    fn pop(&mut self) -> Option<StateId> {
        let id = if self.depth_first {
            self.queue.pop_back()
        } else {
            self.queue.pop_front()
        }?;
        self.members.remove(&id);
        Some(id)
    }

    fn remove(&mut self, id: StateId) -> bool {
        if self.members.remove(&id) {
            self.queue.retain(|q| *q != id);
            true
        } else {
            false
        }
    }

    fn contains(&self, id: StateId) -> bool {
        self.members.contains(&id)
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn ids(&self) -> Vec<StateId> {
        self.queue.iter().copied().collect()
    }

    fn clear(&mut self) {
        self.queue.clear();
        self.members.clear();
    }
}

/// Explores states in reverse postorder of their location, so that all predecessors of a
/// location are handled before the location itself (loop heads aside). Ties go to the older
/// state.
#[derive(Debug, Clone)]
pub struct ReversePostorderWaitlist {
    cfa: Arc<Cfa>,
    queue: BTreeSet<(u32, StateId)>,
    keys: BTreeMap<StateId, u32>,
}

impl ReversePostorderWaitlist {
    pub fn new(cfa: Arc<Cfa>) -> Self {
        Self {
            cfa,
            queue: BTreeSet::new(),
            keys: BTreeMap::new(),
        }
    }
}

impl<S: AbstractState> Waitlist<S> for ReversePostorderWaitlist {
    fn push(&mut self, id: StateId, state: &S) {
        if self.keys.contains_key(&id) {
            return;
        }
        let key = state
            .location()
            .map(|l| self.cfa.reverse_postorder(l))
            .unwrap_or(u32::MAX);
        self.keys.insert(id, key);
        self.queue.insert((key, id));
    }

    fn pop(&mut self) -> Option<StateId> {
        let (_, id) = self.queue.pop_first()?;
        self.keys.remove(&id);
        Some(id)
    }

    fn remove(&mut self, id: StateId) -> bool {
        match self.keys.remove(&id) {
            Some(key) => self.queue.remove(&(key, id)),
            None => false,
        }
    }

    fn contains(&self, id: StateId) -> bool {
        self.keys.contains_key(&id)
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn ids(&self) -> Vec<StateId> {
        self.queue.iter().map(|(_, id)| *id).collect()
    }

    fn clear(&mut self) {
        self.queue.clear();
        self.keys.clear();
    }
}

/// The waitlist for a configured traversal order.
pub fn for_order<S: AbstractState>(order: TraversalOrder, cfa: Arc<Cfa>) -> Box<dyn Waitlist<S>> {
    match order {
        TraversalOrder::Bfs => Box::new(SimpleWaitlist::breadth_first()),
        TraversalOrder::Dfs => Box::new(SimpleWaitlist::depth_first()),
        TraversalOrder::ReversePostorder => Box::new(ReversePostorderWaitlist::new(cfa)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::location::state::LocationState;
    use argo_cfa::{CfaBuilder, Expr};

    fn ids(n: &[u32]) -> Vec<StateId> {
        n.iter().map(|i| StateId(*i)).collect()
    }

    #[test]
    fn bfs_and_dfs_orders() {
        let mut bfs = SimpleWaitlist::breadth_first();
        let mut dfs = SimpleWaitlist::depth_first();
        for i in 0..3 {
            Waitlist::<()>::push(&mut bfs, StateId(i), &());
            Waitlist::<()>::push(&mut dfs, StateId(i), &());
        }
        Waitlist::<()>::push(&mut bfs, StateId(0), &());
        assert_eq!(Waitlist::<()>::len(&bfs), 3);
        assert_eq!(Waitlist::<()>::pop(&mut bfs), Some(StateId(0)));
        assert_eq!(Waitlist::<()>::pop(&mut dfs), Some(StateId(2)));
        assert!(Waitlist::<()>::remove(&mut bfs, StateId(2)));
        assert!(!Waitlist::<()>::remove(&mut bfs, StateId(2)));
        assert_eq!(Waitlist::<()>::ids(&bfs), ids(&[1]));
    }

    #[test]
    fn reverse_postorder_follows_the_control_flow() {
        // `x = 0; while (x < 3) x = x + 1;`
        let mut b = CfaBuilder::new();
        let main = b.add_function("main").unwrap();
        let head = b.add_node("main").unwrap();
        let body = b.add_node("main").unwrap();
        let guard = Expr::var("x").less_than(Expr::constant(3));
        b.assign(main.entry, head, "x", Expr::constant(0)).unwrap();
        b.assume(head, body, guard.clone(), true).unwrap();
        b.assume(head, main.exit, guard, false).unwrap();
        b.assign(body, head, "x", Expr::var("x").plus(Expr::constant(1)))
            .unwrap();
        let cfa = Arc::new(b.build("main").unwrap());
        let at = |node| LocationState::new(node, false);

        let mut waitlist = ReversePostorderWaitlist::new(cfa);
        waitlist.push(StateId(0), &at(main.exit));
        waitlist.push(StateId(1), &at(body));
        waitlist.push(StateId(2), &at(head));
        waitlist.push(StateId(3), &at(main.entry));
        waitlist.push(StateId(4), &at(head));
        waitlist.push(StateId(2), &at(main.exit));
        assert_eq!(Waitlist::<LocationState>::len(&waitlist), 5);
        assert!(Waitlist::<LocationState>::remove(&mut waitlist, StateId(0)));

        let order: Vec<_> =
            std::iter::from_fn(|| Waitlist::<LocationState>::pop(&mut waitlist)).collect();
        // The loop head comes before its body, equal locations in order of age.
        assert_eq!(order, ids(&[3, 2, 4, 1]));
    }
}
