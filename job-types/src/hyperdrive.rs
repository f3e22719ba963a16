//! Queues feeding the hyperdrive buffer and submitter

use common::types::consensus::ConsensusMessage;
use common::types::epoch::EpochHash;
use common::types::smpc::Delta;
use tokio::sync::mpsc::{
    channel, unbounded_channel, Receiver as BoundedReceiver, Sender as BoundedSender,
    UnboundedReceiver as TokioReceiver, UnboundedSender as TokioSender,
};

/// The sender side of the inbound consensus message queue
///
/// Bounded so that a stalled buffer applies backpressure to the network
/// layer rather than growing without limit
pub type ConsensusMessageQueue = BoundedSender<ConsensusMessage>;
/// The receiver side of the inbound consensus message queue
pub type ConsensusMessageReceiver = BoundedReceiver<ConsensusMessage>;

/// Create a new inbound consensus message queue with the given capacity
pub fn new_consensus_message_queue(
    capacity: usize,
) -> (ConsensusMessageQueue, ConsensusMessageReceiver) {
    channel(capacity)
}

/// A matched delta together with the epoch whose pool detected it, used to
/// domain-separate the on-chain nonce
#[derive(Clone, Debug)]
pub struct MatchedDelta {
    /// The epoch of the detecting pool
    pub epoch: EpochHash,
    /// The reconstructed matching delta
    pub delta: Delta,
}

/// The sender side of the matched delta queue
pub type MatchQueue = TokioSender<MatchedDelta>;
/// The receiver side of the matched delta queue
pub type MatchReceiver = TokioReceiver<MatchedDelta>;

/// Create a new matched delta queue and receiver
pub fn new_match_queue() -> (MatchQueue, MatchReceiver) {
    unbounded_channel()
}
