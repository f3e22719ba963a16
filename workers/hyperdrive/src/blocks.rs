//! The shared block store tracking the consensus chain head
//!
//! Block bodies live with the consensus engine; the buffer only needs the
//! current height, published on a watch channel so the consumer observes
//! every advance.

use std::sync::Arc;

use common::types::consensus::Height;
use tokio::sync::watch::{self, Receiver as WatchReceiver, Sender as WatchSender};

/// The chain-head view shared between the consensus engine and the buffer
#[derive(Clone, Debug)]
pub struct SharedBlocks {
    /// The watch channel publishing the current height
    height: Arc<WatchSender<Height>>,
}

impl SharedBlocks {
    /// Create a store at the given initial height
    pub fn new(initial_height: Height) -> Self {
        let (sender, _receiver) = watch::channel(initial_height);
        Self { height: Arc::new(sender) }
    }

    /// The current height
    pub fn height(&self) -> Height {
        *self.height.borrow()
    }

    /// Advance the head to the given height; regressions are ignored
    ///
    /// Returns whether the head moved
    pub fn advance_to(&self, height: Height) -> bool {
        let mut advanced = false;
        self.height.send_if_modified(|current| {
            if height > *current {
                *current = height;
                advanced = true;
            }
            advanced
        });
        advanced
    }

    /// Subscribe to height advances
    pub fn subscribe(&self) -> WatchReceiver<Height> {
        self.height.subscribe()
    }
}

impl Default for SharedBlocks {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Advances move the head forward and regressions are ignored
    #[test]
    fn test_monotone_advance() {
        let blocks = SharedBlocks::new(5);
        assert!(blocks.advance_to(7));
        assert_eq!(blocks.height(), 7);

        assert!(!blocks.advance_to(6));
        assert_eq!(blocks.height(), 7);
    }

    /// Subscribers observe the advance
    #[tokio::test]
    async fn test_subscription() {
        let blocks = SharedBlocks::new(0);
        let mut heights = blocks.subscribe();

        blocks.advance_to(3);
        heights.changed().await.unwrap();
        assert_eq!(*heights.borrow(), 3);
    }
}
