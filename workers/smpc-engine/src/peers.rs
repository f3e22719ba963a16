//! Outbound delta-fragment channels to pool peers
//!
//! The stream transport itself lives outside the core; the engine asks a
//! connector for one channel per pool peer each epoch. Connection direction
//! is broken asymmetrically per `ConnectionRole`: the node with the
//! numerically smaller id accepts the stream and the other dials it.

use common::types::epoch::Pool;
use common::types::identity::{ConnectionRole, NodeId};
use job_types::smpc_engine::DeltaFragmentQueue;
use tracing::debug;

/// An outbound channel to one pool peer
#[derive(Clone, Debug)]
pub struct PeerChannel {
    /// The peer the channel reaches
    pub node_id: NodeId,
    /// The sender feeding the peer's compute stream
    pub sender: DeltaFragmentQueue,
}

/// Opens outbound delta-fragment channels to the peers of a pool
///
/// Implementations own the task-per-peer transport plumbing; each returned
/// channel is backed by a peer task holding a shutdown token, dialing or
/// accepting according to its `ConnectionRole` against the peer
pub trait PeerConnector: Send + Sync + 'static {
    /// Open a channel to every pool member other than the local node
    fn connect(&self, pool: &Pool, local: &NodeId) -> Vec<PeerChannel>;
}

/// A connector for single-node deployments and tests
///
/// No transport is linked, so pools yield no remote channels and every
/// broadcast round-trips only through the local builder; the direction each
/// stream would take is still decided and recorded
#[derive(Clone, Copy, Debug, Default)]
pub struct LoopbackConnector;

impl PeerConnector for LoopbackConnector {
    fn connect(&self, pool: &Pool, local: &NodeId) -> Vec<PeerChannel> {
        for peer in pool.peers(local) {
            let role = ConnectionRole::for_peer(local, peer);
            debug!("no transport linked for pool peer {peer}; local role {role:?}");
        }

        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use common::types::epoch::EpochHash;

    use super::*;

    /// The loopback connector decides roles but opens no remote channels
    #[test]
    fn test_loopback_yields_no_peers() {
        let local = NodeId([1u8; 32]);
        let pool = Pool {
            epoch: EpochHash([0u8; 32]),
            nodes: (1..=5u8).map(|i| NodeId([i; 32])).collect(),
        };

        assert!(LoopbackConnector.connect(&pool, &local).is_empty());
    }
}
