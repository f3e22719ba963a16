//! Epochs and the per-epoch pool partition of the registered node set

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use super::identity::NodeId;

/// The block hash anchoring an epoch, used to seed the pool shuffle and to
/// tag fragments with the epoch they belong to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpochHash(pub [u8; 32]);

impl Display for EpochHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

/// An interval between successive on-chain shuffles of the node-to-pool
/// assignment; totally ordered by block number
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epoch {
    /// The hash of the block that opened the epoch
    pub blockhash: EpochHash,
    /// The number of the block that opened the epoch
    pub blocknumber: u64,
    /// The expected number of blocks between epoch transitions
    pub epoch_interval: u64,
}

/// A quorum of nodes jointly executing the SMPC for one epoch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    /// The epoch the pool was shuffled for
    pub epoch: EpochHash,
    /// The ordered members of the pool; a node's one-based position is its
    /// Shamir share index for the epoch
    pub nodes: Vec<NodeId>,
}

impl Pool {
    /// The pool size `n`
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// The Byzantine reconstruction threshold `k = ⌊2(n + 1) / 3⌋`
    pub fn quorum(&self) -> usize {
        2 * (self.size() + 1) / 3
    }

    /// Whether the given node is a member of the pool
    pub fn contains(&self, node: &NodeId) -> bool {
        self.nodes.contains(node)
    }

    /// The one-based share index of the given member, if present
    pub fn index_of(&self, node: &NodeId) -> Option<u64> {
        self.nodes.iter().position(|n| n == node).map(|p| (p + 1) as u64)
    }

    /// Iterate the pool members other than the given node
    pub fn peers<'a>(&'a self, local: &'a NodeId) -> impl Iterator<Item = &'a NodeId> {
        self.nodes.iter().filter(move |n| *n != local)
    }
}
