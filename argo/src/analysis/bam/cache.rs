use argo_cfa::BlockId;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Names one reached set of a block-abstraction run. The root reached set is
/// [`ReachedSetId::ROOT`]; the cache hands out every other id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReachedSetId(pub u32);

impl ReachedSetId {
    pub const ROOT: ReachedSetId = ReachedSetId(0);
}

impl Display for ReachedSetId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// What a finished sub-analysis tells its callers about a block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockSummary<S> {
    /// Reduced states reaching the block exit
    pub exits: Vec<S>,
    /// A target state was reached inside the block
    pub has_target: bool,
}

/// Result of [`BamCache::register_or_get`].
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<S> {
    /// The caller registered the key and must run the sub-analysis with this id.
    New(ReachedSetId),
    /// Another caller registered the key; its sub-analysis has not finished yet.
    Pending(ReachedSetId),
    Finished(Arc<BlockSummary<S>>),
}

#[derive(Debug)]
enum Entry<S> {
    Pending(ReachedSetId),
    Finished(ReachedSetId, Arc<BlockSummary<S>>),
}

impl<S> Entry<S> {
    fn id(&self) -> ReachedSetId {
        match self {
            Entry::Pending(id) | Entry::Finished(id, _) => *id,
        }
    }
}

#[derive(Debug)]
struct Slot<S, P> {
    entry_state: S,
    precision: P,
    entry: Entry<S>,
}

#[derive(Debug)]
struct Inner<S, P> {
    slots: BTreeMap<BlockId, Vec<Slot<S, P>>>,
    next_id: u32,
    hits: usize,
}

/// Block summaries keyed by block, reduced entry state and reduced precision.
///
/// Every key is registered exactly once and finished exactly once, by whoever registered it.
/// Lookups from transfer relations running on worker threads and registrations from the
/// coordinator go through the same lock.
#[derive(Debug)]
pub struct BamCache<S, P> {
    inner: Mutex<Inner<S, P>>,
}

impl<S, P> Default for BamCache<S, P> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: BTreeMap::new(),
                next_id: 1,
                hits: 0,
            }),
        }
    }
}

impl<S: Clone + PartialEq, P: PartialEq> BamCache<S, P> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner<S, P>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The finished summary for a key, if there is one.
    pub fn finished(&self, block: BlockId, entry: &S, precision: &P) -> Option<Arc<BlockSummary<S>>> {
        let mut inner = self.lock();
        let summary = inner.slots.get(&block).and_then(|slots| {
            slots
                .iter()
                .find(|s| s.entry_state == *entry && s.precision == *precision)
                .and_then(|s| match &s.entry {
                    Entry::Finished(_, summary) => Some(summary.clone()),
                    Entry::Pending(_) => None,
                })
        });
        if summary.is_some() {
            inner.hits += 1;
        }
        summary
    }

    /// Look a key up and register it as pending if it is unknown. Of any number of concurrent
    /// callers with the same key, exactly one gets [`CacheLookup::New`].
    pub fn register_or_get(&self, block: BlockId, entry: S, precision: P) -> CacheLookup<S> {
        let mut inner = self.lock();
        let existing = inner.slots.get(&block).and_then(|slots| {
            slots
                .iter()
                .find(|s| s.entry_state == entry && s.precision == precision)
                .map(|s| match &s.entry {
                    Entry::Pending(id) => CacheLookup::Pending(*id),
                    Entry::Finished(_, summary) => CacheLookup::Finished(summary.clone()),
                })
        });
        if let Some(lookup) = existing {
            return lookup;
        }
        let id = ReachedSetId(inner.next_id);
        inner.next_id += 1;
        inner.slots.entry(block).or_default().push(Slot {
            entry_state: entry,
            precision,
            entry: Entry::Pending(id),
        });
        CacheLookup::New(id)
    }

    /// Record the summary computed by the sub-analysis registered as `id`.
    ///
    /// # Panics
    ///
    /// If `id` was never registered or was already finished.
    pub fn finish(&self, id: ReachedSetId, summary: BlockSummary<S>) {
        let mut inner = self.lock();
        let slot = inner
            .slots
            .values_mut()
            .flat_map(|slots| slots.iter_mut())
            .find(|s| s.entry.id() == id);
        match slot {
            Some(slot) => {
                assert!(
                    matches!(slot.entry, Entry::Pending(_)),
                    "summary of {id} written twice"
                );
                slot.entry = Entry::Finished(id, Arc::new(summary));
            }
            None => panic!("summary of {id} written without registration"),
        }
    }

    /// Forget every key whose sub-analysis never finished, so that a later run registers it
    /// again.
    pub fn discard_pending(&self) -> usize {
        let mut inner = self.lock();
        let mut discarded = 0;
        for slots in inner.slots.values_mut() {
            let before = slots.len();
            slots.retain(|s| matches!(s.entry, Entry::Finished(..)));
            discarded += before - slots.len();
        }
        discarded
    }

    pub fn len(&self) -> usize {
        self.lock().slots.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many lookups found a finished summary.
    pub fn hits(&self) -> usize {
        self.lock().hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_registered_once() {
        let cache: BamCache<i32, ()> = BamCache::new();
        assert_eq!(cache.register_or_get(BlockId(0), 1, ()), CacheLookup::New(ReachedSetId(1)));
        assert_eq!(
            cache.register_or_get(BlockId(0), 1, ()),
            CacheLookup::Pending(ReachedSetId(1))
        );
        assert_eq!(cache.register_or_get(BlockId(1), 1, ()), CacheLookup::New(ReachedSetId(2)));
        assert_eq!(cache.finished(BlockId(0), &1, &()), None);

        cache.finish(
            ReachedSetId(1),
            BlockSummary {
                exits: vec![5],
                has_target: false,
            },
        );
        let summary = cache.finished(BlockId(0), &1, &()).unwrap();
        assert_eq!(summary.exits, vec![5]);
        assert_eq!(cache.hits(), 1);
        assert!(matches!(
            cache.register_or_get(BlockId(0), 1, ()),
            CacheLookup::Finished(_)
        ));
        assert_eq!(cache.discard_pending(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    #[should_panic(expected = "written twice")]
    fn summaries_have_a_single_writer() {
        let cache: BamCache<i32, ()> = BamCache::new();
        let CacheLookup::New(id) = cache.register_or_get(BlockId(0), 1, ()) else {
            panic!("fresh key not new");
        };
        let summary = BlockSummary {
            exits: vec![],
            has_target: false,
        };
        cache.finish(id, summary.clone());
        cache.finish(id, summary);
    }
}
