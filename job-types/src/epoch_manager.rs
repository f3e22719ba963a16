//! Queues carrying epoch transitions and the per-epoch fragment routes

use common::types::epoch::{Epoch, EpochHash, Pool};
use tokio::sync::mpsc::{
    unbounded_channel, UnboundedReceiver as TokioReceiver, UnboundedSender as TokioSender,
};

use crate::smpc_engine::{DeltaFragmentQueue, OrderFragmentQueue};

/// An epoch transition observed by the watcher, together with the pool the
/// local node was shuffled into
#[derive(Clone, Debug)]
pub struct EpochEvent {
    /// The epoch that opened
    pub epoch: Epoch,
    /// The local node's pool for the epoch
    pub pool: Pool,
}

/// The sender side of the epoch event queue
pub type EpochEventQueue = TokioSender<EpochEvent>;
/// The receiver side of the epoch event queue
pub type EpochEventReceiver = TokioReceiver<EpochEvent>;

/// Create a new epoch event queue and receiver
pub fn new_epoch_event_queue() -> (EpochEventQueue, EpochEventReceiver) {
    unbounded_channel()
}

/// The fragment sinks of one epoch's coordinator session, handed to the
/// epoch switch when the session opens
#[derive(Clone, Debug)]
pub struct EpochRoute {
    /// The epoch the route serves
    pub epoch: EpochHash,
    /// The session's inbound order fragment sink
    pub order_fragments: OrderFragmentQueue,
    /// The session's inbound delta fragment sink
    pub delta_fragments: DeltaFragmentQueue,
}

/// The sender side of the epoch route queue
pub type EpochRouteQueue = TokioSender<EpochRoute>;
/// The receiver side of the epoch route queue
pub type EpochRouteReceiver = TokioReceiver<EpochRoute>;

/// Create a new epoch route queue and receiver
pub fn new_epoch_route_queue() -> (EpochRouteQueue, EpochRouteReceiver) {
    unbounded_channel()
}
