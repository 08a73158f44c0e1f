pub mod flat;

/// A partial order with a least upper bound for every pair of elements.
pub trait JoinSemiLattice: Eq + PartialOrd {
    fn join(&mut self, other: &Self);

    fn joined(&self, other: &Self) -> Self
    where
        Self: Clone,
    {
        let mut j = self.clone();
        j.join(other);
        j
    }
}
