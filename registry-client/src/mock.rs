//! In-memory contract implementations backing tests and devnet mode

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::types::epoch::{Epoch, EpochHash};
use common::types::identity::NodeId;
use sha2::{Digest, Sha256};

use crate::{DarknodeRegistry, HyperdriveContract, RegistryError, Tx, TxHash};

/// The epoch interval reported by the mock registry, in blocks
const MOCK_EPOCH_INTERVAL: u64 = 50;

// -----------------
// | Mock Registry |
// -----------------

/// The mutable state behind a mock registry
#[derive(Debug)]
struct MockRegistryInner {
    /// The ordered registered node set
    nodes: Vec<NodeId>,
    /// The epoch currently reported
    epoch: Epoch,
    /// The minimum registration bond
    minimum_bond: u64,
}

/// An in-memory registry; epochs advance only when the test or devnet driver
/// asks them to
#[derive(Clone, Debug)]
pub struct MockRegistry {
    /// The shared registry state
    inner: Arc<RwLock<MockRegistryInner>>,
}

impl MockRegistry {
    /// Create a mock registry over the given node set at epoch zero
    pub fn new(nodes: Vec<NodeId>) -> Self {
        let epoch = Epoch {
            blockhash: derive_blockhash(0),
            blocknumber: 0,
            epoch_interval: MOCK_EPOCH_INTERVAL,
        };
        Self {
            inner: Arc::new(RwLock::new(MockRegistryInner {
                nodes,
                epoch,
                minimum_bond: 100_000,
            })),
        }
    }

    /// Replace the registered node set
    pub fn set_nodes(&self, nodes: Vec<NodeId>) {
        self.inner.write().expect("registry lock poisoned").nodes = nodes;
    }

    /// Advance the reported epoch by one interval, returning the new epoch
    pub fn advance_epoch(&self) -> Epoch {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let blocknumber = inner.epoch.blocknumber + inner.epoch.epoch_interval;
        inner.epoch = Epoch {
            blockhash: derive_blockhash(blocknumber),
            blocknumber,
            epoch_interval: inner.epoch.epoch_interval,
        };
        inner.epoch
    }
}

#[async_trait]
impl DarknodeRegistry for MockRegistry {
    async fn list_nodes(&self) -> Result<Vec<NodeId>, RegistryError> {
        Ok(self.inner.read().expect("registry lock poisoned").nodes.clone())
    }

    async fn minimum_bond(&self) -> Result<u64, RegistryError> {
        Ok(self.inner.read().expect("registry lock poisoned").minimum_bond)
    }

    async fn is_registered(&self, node: &NodeId) -> Result<bool, RegistryError> {
        Ok(self.inner.read().expect("registry lock poisoned").nodes.contains(node))
    }

    async fn current_epoch(&self) -> Result<Epoch, RegistryError> {
        Ok(self.inner.read().expect("registry lock poisoned").epoch)
    }

    async fn register(&self, node: NodeId, _bond: u64) -> Result<TxHash, RegistryError> {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if !inner.nodes.contains(&node) {
            inner.nodes.push(node);
        }
        Ok(TxHash(node.0))
    }

    async fn deregister(&self, node: NodeId) -> Result<TxHash, RegistryError> {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.nodes.retain(|n| *n != node);
        Ok(TxHash(node.0))
    }
}

/// Derive a deterministic blockhash for a mock block number
fn derive_blockhash(blocknumber: u64) -> EpochHash {
    let mut hasher = Sha256::new();
    hasher.update(blocknumber.to_be_bytes());
    EpochHash(hasher.finalize().into())
}

// -------------------
// | Mock Hyperdrive |
// -------------------

/// The mutable state behind a mock hyperdrive contract
#[derive(Debug, Default)]
struct MockHyperdriveInner {
    /// Every transaction submitted, in order
    txs: Vec<Tx>,
    /// The block number each nonce was confirmed at
    confirmations: HashMap<Vec<u8>, u64>,
    /// The block counter advanced on each submission
    block_number: u64,
}

/// An in-memory hyperdrive contract recording submissions
#[derive(Clone, Debug, Default)]
pub struct MockHyperdrive {
    /// The shared contract state
    inner: Arc<RwLock<MockHyperdriveInner>>,
}

impl MockHyperdrive {
    /// Create an empty mock hyperdrive contract
    pub fn new() -> Self {
        Self::default()
    }

    /// The transactions submitted so far
    pub fn submitted_txs(&self) -> Vec<Tx> {
        self.inner.read().expect("hyperdrive lock poisoned").txs.clone()
    }
}

#[async_trait]
impl HyperdriveContract for MockHyperdrive {
    async fn send_tx(&self, tx: Tx) -> Result<TxHash, RegistryError> {
        let mut inner = self.inner.write().expect("hyperdrive lock poisoned");
        inner.block_number += 1;
        let block_number = inner.block_number;

        let mut hasher = Sha256::new();
        for nonce in &tx.nonces {
            hasher.update(nonce);
        }
        let hash = TxHash(hasher.finalize().into());

        for nonce in &tx.nonces {
            inner.confirmations.insert(nonce.clone(), block_number);
        }
        inner.txs.push(tx);

        Ok(hash)
    }

    async fn check_orders(&self, nonce: &[u8]) -> Result<u64, RegistryError> {
        let inner = self.inner.read().expect("hyperdrive lock poisoned");
        Ok(inner.confirmations.get(nonce).copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Registration and deregistration mutate the reported node set
    #[tokio::test]
    async fn test_mock_registry_membership() {
        let node = NodeId([1u8; 32]);
        let registry = MockRegistry::new(vec![]);
        assert!(!registry.is_registered(&node).await.unwrap());

        registry.register(node, 100_000).await.unwrap();
        assert!(registry.is_registered(&node).await.unwrap());
        assert_eq!(registry.list_nodes().await.unwrap(), vec![node]);

        registry.deregister(node).await.unwrap();
        assert!(!registry.is_registered(&node).await.unwrap());
    }

    /// Epoch advancement is monotone in block number with fresh blockhashes
    #[tokio::test]
    async fn test_mock_registry_epochs() {
        let registry = MockRegistry::new(vec![]);
        let e0 = registry.current_epoch().await.unwrap();
        let e1 = registry.advance_epoch();

        assert!(e1.blocknumber > e0.blocknumber);
        assert_ne!(e1.blockhash, e0.blockhash);
        assert_eq!(registry.current_epoch().await.unwrap(), e1);
    }

    /// Submitted nonces report their confirmation block; others report zero
    #[tokio::test]
    async fn test_mock_hyperdrive_confirmations() {
        let hyperdrive = MockHyperdrive::new();
        let tx = Tx { nonces: vec![vec![1, 2, 3]] };
        hyperdrive.send_tx(tx).await.unwrap();

        assert_eq!(hyperdrive.check_orders(&[1, 2, 3]).await.unwrap(), 1);
        assert_eq!(hyperdrive.check_orders(&[9]).await.unwrap(), 0);
        assert_eq!(hyperdrive.submitted_txs().len(), 1);
    }
}
