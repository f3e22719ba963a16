//! Node identity types and the peer connection-direction rule

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The unique identifier of a darknode, derived from its keypair
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(pub [u8; 32]);

impl NodeId {
    /// Derive a node id from public key material
    pub fn from_pubkey(pubkey: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(pubkey);
        Self(hasher.finalize().into())
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Abbreviate to the first eight bytes for log readability
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

/// The role the local node takes when opening a compute stream to a peer
///
/// The direction is broken asymmetrically so exactly one side dials: the node
/// with the numerically smaller id accepts and the other dials
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionRole {
    /// The local node dials the peer
    Dialer,
    /// The local node accepts the peer's connection
    Listener,
}

impl ConnectionRole {
    /// Decide the local node's role against the given peer
    pub fn for_peer(local: &NodeId, peer: &NodeId) -> Self {
        if local < peer {
            ConnectionRole::Listener
        } else {
            ConnectionRole::Dialer
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The connection direction rule is asymmetric between any two peers
    #[test]
    fn test_connection_role_asymmetry() {
        let low = NodeId([1u8; 32]);
        let high = NodeId([2u8; 32]);

        assert_eq!(ConnectionRole::for_peer(&low, &high), ConnectionRole::Listener);
        assert_eq!(ConnectionRole::for_peer(&high, &low), ConnectionRole::Dialer);
    }
}
