//! Interfaces to the on-chain contracts the darknode consumes
//!
//! The Ethereum client bindings live outside the core; the node interacts
//! with the registry and the hyperdrive contract exclusively through the
//! traits defined here. In-memory implementations back tests and devnet
//! mode.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

use async_trait::async_trait;
use common::types::epoch::Epoch;
use common::types::identity::NodeId;

pub mod error;
pub mod mock;

pub use error::RegistryError;

/// A transaction hash returned by a contract write
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TxHash(pub [u8; 32]);

/// A hyperdrive transaction confirming a set of matched-order nonces
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tx {
    /// The matched-order nonces, domain-separated per pool
    pub nonces: Vec<Vec<u8>>,
}

/// The read and thin-write interface to the darknode registry contract
#[async_trait]
pub trait DarknodeRegistry: Send + Sync + 'static {
    /// The ordered list of registered node ids
    async fn list_nodes(&self) -> Result<Vec<NodeId>, RegistryError>;

    /// The minimum bond required to register
    async fn minimum_bond(&self) -> Result<u64, RegistryError>;

    /// Whether the given node is currently registered
    async fn is_registered(&self, node: &NodeId) -> Result<bool, RegistryError>;

    /// The epoch the registry currently reports
    async fn current_epoch(&self) -> Result<Epoch, RegistryError>;

    /// Register the given node with a bond; a thin passthrough to the chain
    async fn register(&self, node: NodeId, bond: u64) -> Result<TxHash, RegistryError>;

    /// Deregister the given node; a thin passthrough to the chain
    async fn deregister(&self, node: NodeId) -> Result<TxHash, RegistryError>;
}

/// The interface to the hyperdrive contract ordering confirmed matches
#[async_trait]
pub trait HyperdriveContract: Send + Sync + 'static {
    /// Submit a transaction of matched-order nonces
    async fn send_tx(&self, tx: Tx) -> Result<TxHash, RegistryError>;

    /// The block number at which the given nonce was confirmed; zero when
    /// the nonce has not been submitted
    async fn check_orders(&self, nonce: &[u8]) -> Result<u64, RegistryError>;
}
