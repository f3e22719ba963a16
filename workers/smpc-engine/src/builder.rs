//! The delta builder reconstructs plaintext deltas from quorum fragments
//!
//! Fragments accumulate in a per-id cache until `k` distinct indices are
//! present, at which point the delta is interpolated, the cache entry is
//! evicted, and the id enters a bounded completion set so late or duplicate
//! fragments become no-ops.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use common::types::smpc::{Delta, DeltaFragment, DeltaId};

use crate::completion_log::CompletionLog;
use crate::error::SmpcEngineError;

// ------------------
// | Completion Set |
// ------------------

/// A FIFO-bounded set of completed delta ids
struct CompletionSet {
    /// The maximum number of remembered ids
    cap: usize,
    /// The membership set
    set: HashSet<DeltaId>,
    /// Insertion order, oldest first, for eviction
    order: VecDeque<DeltaId>,
}

impl CompletionSet {
    /// Create an empty set with the given capacity
    fn new(cap: usize) -> Self {
        Self { cap, set: HashSet::new(), order: VecDeque::new() }
    }

    /// Whether the id has completed recently
    fn contains(&self, id: &DeltaId) -> bool {
        self.set.contains(id)
    }

    /// Record a completed id, evicting the oldest entry past capacity
    fn insert(&mut self, id: DeltaId) {
        if !self.set.insert(id) {
            return;
        }
        self.order.push_back(id);
        if self.order.len() > self.cap {
            if let Some(evicted) = self.order.pop_front() {
                self.set.remove(&evicted);
            }
        }
    }
}

// -----------
// | Builder |
// -----------

/// The mutable state of the builder
struct BuilderInner {
    /// Accumulating fragments, keyed by delta id then share index
    by_id: HashMap<DeltaId, HashMap<u64, DeltaFragment>>,
    /// Recently completed ids
    completed: CompletionSet,
}

/// Reconstructs deltas from `k` of the pool's `n` delta fragments
///
/// Insertion is serialized behind a single mutex; interpolation is CPU-bound
/// and never I/Os beyond the optional completion-log append.
pub struct DeltaBuilder {
    /// The reconstruction threshold
    k: usize,
    /// The pool size; fragment indices outside `[1..n]` are rejected
    n: usize,
    /// The builder state
    inner: Mutex<BuilderInner>,
    /// The completion log, when persistence is enabled
    log: Option<Arc<CompletionLog>>,
}

impl DeltaBuilder {
    /// Create a builder for a pool of `n` members with threshold `k`,
    /// remembering at most `cache_entries` completed ids
    ///
    /// When a completion log is supplied, its retained ids seed the
    /// completion set so reconstruction does not repeat across restarts
    pub fn new(
        k: usize,
        n: usize,
        cache_entries: usize,
        log: Option<Arc<CompletionLog>>,
    ) -> Self {
        let mut completed = CompletionSet::new(cache_entries);
        if let Some(log) = &log {
            for id in log.recent() {
                completed.insert(id);
            }
        }

        Self {
            k,
            n,
            inner: Mutex::new(BuilderInner { by_id: HashMap::new(), completed }),
            log,
        }
    }

    /// Insert a delta fragment
    ///
    /// Returns the reconstructed delta once `k` fragments of a common id
    /// have been seen; duplicates and fragments of completed deltas return
    /// nothing
    pub fn insert(
        &self,
        fragment: DeltaFragment,
    ) -> Result<Option<Delta>, SmpcEngineError> {
        if fragment.index == 0 || fragment.index > self.n as u64 {
            return Err(SmpcEngineError::InvalidFragmentIndex(format!(
                "fragment index {} outside pool range [1..{}]",
                fragment.index, self.n,
            )));
        }

        let mut inner = self.inner.lock().expect("builder lock poisoned");
        if inner.completed.contains(&fragment.id) {
            return Ok(None);
        }

        let id = fragment.id;
        let entry = inner.by_id.entry(id).or_default();
        if entry.contains_key(&fragment.index) {
            // A repeated index is a duplicate or a cross-pool collision;
            // either way it is not combinable
            return Ok(None);
        }
        entry.insert(fragment.index, fragment);

        if entry.len() < self.k {
            return Ok(None);
        }

        let fragments: Vec<DeltaFragment> = entry.values().cloned().collect();
        let delta = Delta::reconstruct_from(&fragments)?;

        inner.by_id.remove(&id);
        inner.completed.insert(id);
        drop(inner);

        if let Some(log) = &self.log {
            log.append(&id)
                .map_err(|e| SmpcEngineError::Persistence(e.to_string()))?;
        }

        Ok(Some(delta))
    }

    /// The number of delta ids currently accumulating fragments
    pub fn num_pending(&self) -> usize {
        self.inner.lock().expect("builder lock poisoned").by_id.len()
    }
}

#[cfg(test)]
mod tests {
    use common::types::epoch::EpochHash;
    use common::types::order::{Order, OrderId, OrderKind, OrderSide, TokenPair};
    use darknode_crypto::fields::random_field_element;
    use num_traits::Zero;
    use rand::thread_rng;

    use super::*;

    /// Produce the five delta fragments of a crossing (buy, sell) pair
    fn crossing_delta_fragments() -> Vec<DeltaFragment> {
        let mut order = Order {
            id: OrderId([1u8; 32]),
            side: OrderSide::Buy,
            kind: OrderKind::Limit,
            expiry: 2_000_000_000,
            tokens: TokenPair::new(1, 2),
            price: 100,
            volume: 10,
            min_volume: 10,
            nonce: 0,
        };
        let mut rng = thread_rng();
        let epoch = EpochHash([0u8; 32]);
        let buys = order.fragment(epoch, 4, 5, &mut rng).unwrap();

        order.id = OrderId([2u8; 32]);
        order.side = OrderSide::Sell;
        let sells = order.fragment(epoch, 4, 5, &mut rng).unwrap();

        buys.iter()
            .zip(sells.iter())
            .map(|(b, s)| DeltaFragment::from_order_fragments(b, s))
            .collect()
    }

    /// The k-th fragment of an id completes the delta; earlier ones return
    /// nothing
    #[test]
    fn test_reconstruction_at_threshold() {
        let builder = DeltaBuilder::new(4, 5, 16, None);
        let fragments = crossing_delta_fragments();

        for fragment in fragments.iter().take(3) {
            assert!(builder.insert(fragment.clone()).unwrap().is_none());
        }
        let delta = builder.insert(fragments[3].clone()).unwrap().unwrap();
        assert!(delta.price.is_zero());
        assert!(delta.is_match());
        assert_eq!(builder.num_pending(), 0);
    }

    /// Fragments arriving after completion are absorbed by the completion
    /// set, including corrupted ones from a Byzantine peer
    #[test]
    fn test_late_fragments_discarded() {
        let builder = DeltaBuilder::new(4, 5, 16, None);
        let fragments = crossing_delta_fragments();

        for fragment in fragments.iter().take(4) {
            builder.insert(fragment.clone()).unwrap();
        }

        // The straggler index-5 fragment, with its shares corrupted
        let mut rng = thread_rng();
        let mut corrupt = fragments[4].clone();
        corrupt.price.value = random_field_element(&mut rng);
        corrupt.volume.value = random_field_element(&mut rng);

        assert!(builder.insert(corrupt).unwrap().is_none());
        assert_eq!(builder.num_pending(), 0);
    }

    /// A duplicate index within an accumulating id is not combinable and is
    /// discarded
    #[test]
    fn test_duplicate_index_discarded() {
        let builder = DeltaBuilder::new(4, 5, 16, None);
        let fragments = crossing_delta_fragments();

        builder.insert(fragments[0].clone()).unwrap();
        assert!(builder.insert(fragments[0].clone()).unwrap().is_none());
        assert_eq!(builder.num_pending(), 1);
    }

    /// Indices outside the pool range are protocol violations
    #[test]
    fn test_out_of_range_index_rejected() {
        let builder = DeltaBuilder::new(4, 5, 16, None);
        let mut fragment = crossing_delta_fragments().remove(0);
        fragment.index = 9;
        fragment.price.index = 9;

        let err = builder.insert(fragment).unwrap_err();
        assert!(matches!(err, SmpcEngineError::InvalidFragmentIndex(_)));
    }

    /// The completion set forgets its oldest entries past capacity
    #[test]
    fn test_completion_set_fifo_eviction() {
        let mut set = CompletionSet::new(2);
        let ids: Vec<DeltaId> = (0u8..3).map(|i| DeltaId([i; 32])).collect();

        set.insert(ids[0]);
        set.insert(ids[1]);
        assert!(set.contains(&ids[0]));

        set.insert(ids[2]);
        assert!(!set.contains(&ids[0]));
        assert!(set.contains(&ids[1]));
        assert!(set.contains(&ids[2]));
    }

    /// A persisted completion log seeds a fresh builder's completion set
    #[test]
    fn test_rehydration_from_log() {
        let mut path = std::env::temp_dir();
        path.push(format!("builder-rehydrate-{}", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let fragments = crossing_delta_fragments();
        {
            let log = Arc::new(CompletionLog::open(&path, 16).unwrap());
            let builder = DeltaBuilder::new(4, 5, 16, Some(log));
            for fragment in fragments.iter().take(4) {
                builder.insert(fragment.clone()).unwrap();
            }
        }

        // A rebuilt builder remembers the completion and ignores stragglers
        let log = Arc::new(CompletionLog::open(&path, 16).unwrap());
        let builder = DeltaBuilder::new(4, 5, 16, Some(log));
        assert!(builder.insert(fragments[4].clone()).unwrap().is_none());
        assert_eq!(builder.num_pending(), 0);

        let _ = std::fs::remove_file(&path);
    }
}
