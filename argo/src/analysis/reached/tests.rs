use super::*;
use crate::analysis::reached::waitlist::SimpleWaitlist;

#[derive(Debug, Clone, PartialEq)]
struct At(u32);

impl AbstractState for At {
    fn location(&self) -> Option<CfaNodeId> {
        Some(CfaNodeId(self.0))
    }

    fn is_target(&self) -> bool {
        self.0 == 99
    }
}

#[test]
fn adding_queues_and_indexes() {
    let mut reached: ReachedSet<At, ()> = ReachedSet::new();
    assert!(reached.is_empty());
    let r = reached.add_initial(At(0), ());
    let a = reached.add(At(1), (), r, Some(CfaEdgeId(0))).unwrap();
    let b = reached.add(At(1), (), r, Some(CfaEdgeId(1))).unwrap();
    assert_eq!(reached.len(), 3);
    assert_eq!(reached.first_state(), Some(r));
    assert_eq!(reached.last_state(), Some(b));
    assert_eq!(reached.states_at(Some(CfaNodeId(1))), vec![a, b]);
    assert!(reached.states_at(Some(CfaNodeId(7))).is_empty());
    assert_eq!(reached.waiting(), vec![r, a, b]);
    assert_eq!(reached.pop_from_waitlist(), Some(r));
    assert!(!reached.is_waiting(r));
    assert!(reached.contains(r));
    assert_eq!(
        reached.add(At(2), (), StateId(42), None),
        Err(ArgError::UnknownState(StateId(42)))
    );
}

#[test]
fn depth_first_pops_the_newest() {
    let mut reached: ReachedSet<At, ()> =
        ReachedSet::with_waitlist(Box::new(SimpleWaitlist::depth_first()));
    let r = reached.add_initial(At(0), ());
    let a = reached.add(At(1), (), r, None).unwrap();
    assert_eq!(reached.pop_from_waitlist(), Some(a));
    assert_eq!(reached.pop_from_waitlist(), Some(r));
    assert_eq!(reached.pop_from_waitlist(), None);
}

#[test]
fn covered_states_are_not_reached() {
    let mut reached: ReachedSet<At, ()> = ReachedSet::new();
    let r = reached.add_initial(At(0), ());
    let a = reached.add(At(1), (), r, None).unwrap();
    let covered = reached.cover(a, At(1), None, a).unwrap();
    assert!(!reached.contains(covered));
    assert!(!reached.is_waiting(covered));
    assert_eq!(reached.state(covered), Some(&At(1)));
    assert_eq!(reached.arg().node(covered).unwrap().covered_by(), Some(a));
    assert_eq!(reached.summary().covered, 1);
    assert_eq!(
        reached.cover(a, At(1), None, covered),
        Err(ArgError::NotReached(covered))
    );
}

#[test]
fn remove_only_takes_leaves() {
    let mut reached: ReachedSet<At, ()> = ReachedSet::new();
    let r = reached.add_initial(At(0), ());
    let a = reached.add(At(1), (), r, None).unwrap();
    assert_eq!(reached.remove(r), Err(ArgError::NotALeaf(r)));
    reached.remove(a).unwrap();
    assert!(!reached.contains(a));
    assert!(!reached.is_waiting(a));
    assert!(reached.states_at(Some(CfaNodeId(1))).is_empty());
    assert_eq!(reached.last_state(), None);
}

/// ```text
///        r
///       / \
///      a   b
///      |   | \
///      c <-d  e      (d covered by c)
/// ```
fn covered_below() -> (ReachedSet<At, ()>, [StateId; 6]) {
    let mut reached = ReachedSet::new();
    let r = reached.add_initial(At(0), ());
    let a = reached.add(At(1), (), r, None).unwrap();
    let b = reached.add(At(2), (), r, None).unwrap();
    let c = reached.add(At(3), (), a, None).unwrap();
    let d = reached.cover(b, At(3), None, c).unwrap();
    let e = reached.add(At(4), (), b, None).unwrap();
    reached.clear_waitlist();
    (reached, [r, a, b, c, d, e])
}

#[test]
fn removing_a_subtree_uncovers_and_requeues() {
    let (mut reached, [r, a, b, c, d, e]) = covered_below();
    let removed = reached.remove_subtree(a).unwrap();
    assert_eq!(removed, BTreeSet::from([a, c, d]));
    assert!(!reached.arg().contains(d));
    assert!(reached.contains(e));
    // b lost a successor, r lost a
    assert_eq!(reached.waiting(), vec![r, b]);
    assert_eq!(reached.len(), 3);
}

#[test]
fn pruning_does_not_requeue_the_parents() {
    let (mut reached, [_, a, b, c, _, _]) = covered_below();
    let removed = reached.prune(c).unwrap();
    assert_eq!(removed.len(), 2);
    assert!(reached.contains(a));
    assert_eq!(reached.waiting(), vec![b]);
}

#[test]
fn the_first_state_survives_unless_removed_itself() {
    let mut reached: ReachedSet<At, ()> = ReachedSet::new();
    let r = reached.add_initial(At(0), ());
    let a = reached.add(At(1), (), r, None).unwrap();
    reached.add_edge(a, r, None).unwrap();
    let removed = reached.remove_subtree(a).unwrap();
    assert_eq!(removed, BTreeSet::from([a]));
    assert_eq!(reached.first_state(), Some(r));

    let removed = reached.remove_subtree(r).unwrap();
    assert_eq!(removed, BTreeSet::from([r]));
    assert!(reached.is_empty());
    assert_eq!(reached.first_state(), None);
}

#[test]
fn replacing_keeps_the_graph_and_the_first_state() {
    let mut reached: ReachedSet<At, u8> = ReachedSet::new();
    let r = reached.add_initial(At(0), 0);
    let a = reached.add(At(1), 0, r, Some(CfaEdgeId(4))).unwrap();
    reached.clear_waitlist();

    let r2 = reached.replace(r, At(5), 1).unwrap();
    assert_eq!(reached.first_state(), Some(r2));
    assert_eq!(reached.precision(r2), Some(&1));
    assert!(reached.is_waiting(r2));
    assert_eq!(reached.states_at(Some(CfaNodeId(0))), Vec::<StateId>::new());
    assert_eq!(reached.states_at(Some(CfaNodeId(5))), vec![r2]);
    assert_eq!(reached.arg().node(a).unwrap().edge_from(r2), Some(CfaEdgeId(4)));
    assert_eq!(
        reached.replace(r, At(6), 2),
        Err(ArgError::NotReached(r))
    );
}

#[test]
fn targets_come_from_states_and_violations() {
    let mut reached: ReachedSet<At, ()> = ReachedSet::new();
    let r = reached.add_initial(At(0), ());
    let t = reached.add(At(99), (), r, None).unwrap();
    assert_eq!(reached.target_states(), vec![t]);
    reached.mark_violation(r, "overflow").unwrap();
    assert!(reached.is_target(r));
    assert_eq!(reached.violated_properties(r), vec!["overflow".to_string()]);
    assert_eq!(reached.summary().targets, 2);
    reached.remove_subtree(r).unwrap();
    assert!(!reached.has_target_state());
}

#[test]
fn restart_forgets_everything() {
    let mut reached: ReachedSet<At, ()> = ReachedSet::new();
    let r = reached.add_initial(At(0), ());
    reached.add(At(99), (), r, None).unwrap();
    let fresh = reached.restart(At(0), ());
    assert!(fresh > r);
    assert_eq!(reached.len(), 1);
    assert_eq!(reached.first_state(), Some(fresh));
    assert_eq!(reached.waiting(), vec![fresh]);
    assert!(!reached.has_target_state());
}

#[test]
fn precisions_can_only_be_set_for_reached_states() {
    let mut reached: ReachedSet<At, u8> = ReachedSet::new();
    let r = reached.add_initial(At(0), 0);
    reached.set_precision(r, 3).unwrap();
    assert_eq!(reached.precision(r), Some(&3));
    assert_eq!(
        reached.set_precision(StateId(9), 1),
        Err(ArgError::NotReached(StateId(9)))
    );
    assert_eq!(
        reached.re_add_to_waitlist(StateId(9)),
        Err(ArgError::NotReached(StateId(9)))
    );
}
