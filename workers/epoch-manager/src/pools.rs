//! Deterministic pool assignment from a registry snapshot and an epoch seed
//!
//! Every honest node observing the same registered set and blockhash derives
//! the identical partition: a ChaCha20 generator seeded with the blockhash
//! drives a Fisher–Yates shuffle of the node set, which is then chunked into
//! pools of the configured target size.

use common::types::epoch::{EpochHash, Pool};
use common::types::identity::NodeId;
use constants::MAX_POOL_SIZE;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// Partition the registered node set into pools for the given epoch
pub fn pool_assignment(
    nodes: &[NodeId],
    blockhash: &EpochHash,
    pool_size_target: usize,
) -> Vec<Pool> {
    if nodes.is_empty() {
        return Vec::new();
    }

    let mut shuffled = nodes.to_vec();
    let mut rng = ChaCha20Rng::from_seed(blockhash.0);
    shuffled.shuffle(&mut rng);

    let target = pool_size_target.clamp(1, MAX_POOL_SIZE);
    shuffled
        .chunks(target)
        .map(|chunk| Pool { epoch: *blockhash, nodes: chunk.to_vec() })
        .collect()
}

/// Find the pool containing the given node, if it was assigned one
pub fn find_pool(pools: &[Pool], node: &NodeId) -> Option<Pool> {
    pools.iter().find(|pool| pool.contains(node)).cloned()
}
