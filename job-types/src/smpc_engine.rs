//! Queues feeding the SMPC engine's per-epoch coordinators

use common::types::order::OrderFragment;
use common::types::smpc::DeltaFragment;
use tokio::sync::mpsc::{
    unbounded_channel, UnboundedReceiver as TokioReceiver, UnboundedSender as TokioSender,
};

/// The sender side of an order fragment queue
pub type OrderFragmentQueue = TokioSender<OrderFragment>;
/// The receiver side of an order fragment queue
pub type OrderFragmentReceiver = TokioReceiver<OrderFragment>;

/// Create a new order fragment queue and receiver
pub fn new_order_fragment_queue() -> (OrderFragmentQueue, OrderFragmentReceiver) {
    unbounded_channel()
}

/// The sender side of a delta fragment queue
pub type DeltaFragmentQueue = TokioSender<DeltaFragment>;
/// The receiver side of a delta fragment queue
pub type DeltaFragmentReceiver = TokioReceiver<DeltaFragment>;

/// Create a new delta fragment queue and receiver
pub fn new_delta_fragment_queue() -> (DeltaFragmentQueue, DeltaFragmentReceiver) {
    unbounded_channel()
}
