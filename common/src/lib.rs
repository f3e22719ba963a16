//! Defines common types, traits, and functionality useful throughout the
//! workspace

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(clippy::needless_pass_by_value)]

use std::sync::{Arc, RwLock};

use tokio::sync::watch::{self, Receiver as WatchReceiver, Sender as WatchSender};
use tokio::sync::RwLock as TokioRwLock;

pub mod types;
pub mod worker;

/// A type alias for a shared, concurrency safe, mutable pointer
pub type Shared<T> = Arc<RwLock<T>>;

/// A type alias for a shared, concurrency safe, mutable pointer in an
/// async context
pub type AsyncShared<T> = Arc<TokioRwLock<T>>;

/// Wrap an abstract value in a shared lock
pub fn new_shared<T>(wrapped: T) -> Shared<T> {
    Arc::new(RwLock::new(wrapped))
}

/// Wrap an abstract value in an async shared lock
pub fn new_async_shared<T>(wrapped: T) -> AsyncShared<T> {
    Arc::new(TokioRwLock::new(wrapped))
}

/// A type alias for an empty channel used to signal cancellation to workers
pub type CancelChannel = WatchReceiver<()>;

/// Create a new cancel channel; the sender side is held by the coordinator
/// and the receiver side cloned into each task the signal reaches
pub fn new_cancel_channel() -> (WatchSender<()>, CancelChannel) {
    watch::channel(())
}
