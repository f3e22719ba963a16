//! Messages exchanged by the hyperdrive consensus layer
//!
//! The node routes these by height; their semantics belong to the consensus
//! engine itself, which deduplicates by `(signer, view, kind)`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::identity::NodeId;

/// A block-number-like monotonic counter in the hyperdrive consensus
pub type Height = u64;

/// The view number within a height, advanced on leader faults
pub type View = u64;

/// The identifier of a proposed block
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub [u8; 32]);

/// A signature over a consensus message; verification is performed by the
/// signing layer the node consumes
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

/// A block of matched-order nonces proposed for total ordering
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// The height the block extends the chain to
    pub height: Height,
    /// The id of the parent block
    pub parent: BlockId,
    /// The matched-order nonces the block confirms, domain-separated per pool
    pub nonces: Vec<Vec<u8>>,
}

impl Block {
    /// The content-derived id of the block
    pub fn id(&self) -> BlockId {
        let mut hasher = Sha256::new();
        hasher.update(self.height.to_be_bytes());
        hasher.update(self.parent.0);
        for nonce in &self.nonces {
            hasher.update(nonce);
        }
        BlockId(hasher.finalize().into())
    }
}

/// A proposal for the block at a height
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// The height the proposal targets
    pub height: Height,
    /// The view the proposal was made in
    pub view: View,
    /// The proposed block
    pub block: Block,
    /// The proposing node
    pub signer: NodeId,
    /// The proposer's signature
    pub signature: Signature,
}

/// A prepare vote for a proposed block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prepare {
    /// The height the vote targets
    pub height: Height,
    /// The view the vote was cast in
    pub view: View,
    /// The id of the block being prepared
    pub block_id: BlockId,
    /// The voting node
    pub signer: NodeId,
    /// The voter's signature
    pub signature: Signature,
}

/// A commit vote for a prepared block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// The height the vote targets
    pub height: Height,
    /// The view the vote was cast in
    pub view: View,
    /// The id of the block being committed
    pub block_id: BlockId,
    /// The voting node
    pub signer: NodeId,
    /// The voter's signature
    pub signature: Signature,
}

/// An accusation that the leader of a view failed to make progress
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    /// The height the fault was observed at
    pub height: Height,
    /// The view being accused
    pub view: View,
    /// The accusing node
    pub signer: NodeId,
    /// The accuser's signature
    pub signature: Signature,
}

/// The phase a consensus message belongs to, used for sub-channel routing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsensusPhase {
    /// A block proposal
    Proposal,
    /// A prepare vote
    Prepare,
    /// A commit vote
    Commit,
    /// A leader-fault accusation
    Fault,
}

/// A message in the hyperdrive consensus protocol
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusMessage {
    /// A block proposal
    Proposal(Proposal),
    /// A prepare vote
    Prepare(Prepare),
    /// A commit vote
    Commit(Commit),
    /// A leader-fault accusation
    Fault(Fault),
}

impl ConsensusMessage {
    /// The height the message targets
    pub fn height(&self) -> Height {
        match self {
            ConsensusMessage::Proposal(m) => m.height,
            ConsensusMessage::Prepare(m) => m.height,
            ConsensusMessage::Commit(m) => m.height,
            ConsensusMessage::Fault(m) => m.height,
        }
    }

    /// The phase the message belongs to
    pub fn phase(&self) -> ConsensusPhase {
        match self {
            ConsensusMessage::Proposal(_) => ConsensusPhase::Proposal,
            ConsensusMessage::Prepare(_) => ConsensusPhase::Prepare,
            ConsensusMessage::Commit(_) => ConsensusPhase::Commit,
            ConsensusMessage::Fault(_) => ConsensusPhase::Fault,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Block ids commit to height, parent, and nonces
    #[test]
    fn test_block_id_content_addressing() {
        let block = Block {
            height: 5,
            parent: BlockId([1u8; 32]),
            nonces: vec![vec![1, 2, 3]],
        };
        let mut modified = block.clone();
        modified.nonces.push(vec![4]);

        assert_eq!(block.id(), block.id());
        assert_ne!(block.id(), modified.id());
    }

    /// Messages report the height and phase they carry
    #[test]
    fn test_message_accessors() {
        let message = ConsensusMessage::Prepare(Prepare {
            height: 7,
            view: 0,
            block_id: BlockId::default(),
            signer: NodeId::default(),
            signature: Signature::default(),
        });

        assert_eq!(message.height(), 7);
        assert_eq!(message.phase(), ConsensusPhase::Prepare);
    }
}
