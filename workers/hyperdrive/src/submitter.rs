//! The submitter converts matched deltas into hyperdrive transactions
//!
//! Each match becomes one transaction whose nonce is domain-separated by the
//! detecting pool's epoch. Submission failures are transient peer errors:
//! retried with backoff, logged, and never fatal.

use std::sync::Arc;
use std::time::Duration;

use common::CancelChannel;
use job_types::hyperdrive::{MatchReceiver, MatchedDelta};
use registry_client::{HyperdriveContract, Tx};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::error::HyperdriveError;

/// The number of times a submission is attempted before it is abandoned
const SUBMIT_ATTEMPTS: usize = 3;

/// The executor draining matched deltas into the hyperdrive contract
pub struct HyperdriveSubmitterExecutor {
    /// The hyperdrive contract interface
    contract: Arc<dyn HyperdriveContract>,
    /// The matched deltas emitted by pool coordinators
    matches: MatchReceiver,
    /// Whether submission is enabled; matches are logged and dropped
    /// otherwise
    enabled: bool,
    /// The per-call timeout
    rpc_timeout: Duration,
    /// The backoff between retries
    rpc_backoff: Duration,
    /// The worker's cancel signal
    cancel: CancelChannel,
}

impl HyperdriveSubmitterExecutor {
    /// Create a new submitter executor
    pub fn new(
        contract: Arc<dyn HyperdriveContract>,
        matches: MatchReceiver,
        enabled: bool,
        rpc_timeout: Duration,
        rpc_backoff: Duration,
        cancel: CancelChannel,
    ) -> Self {
        Self { contract, matches, enabled, rpc_timeout, rpc_backoff, cancel }
    }

    /// The main execution loop for the submitter
    pub async fn execute(mut self) -> Result<(), HyperdriveError> {
        loop {
            tokio::select! {
                _ = self.cancel.changed() => return Ok(()),
                matched = self.matches.recv() => match matched {
                    Some(matched) => self.handle_match(matched).await,
                    None => return Err(HyperdriveError::StreamEnded),
                },
            }
        }
    }

    /// Submit one matched delta
    async fn handle_match(&self, matched: MatchedDelta) {
        if !self.enabled {
            debug!("hyperdrive disabled; dropping match {}", matched.delta.id);
            return;
        }

        let tx = Tx { nonces: vec![match_nonce(&matched)] };
        for attempt in 1..=SUBMIT_ATTEMPTS {
            match timeout(self.rpc_timeout, self.contract.send_tx(tx.clone())).await {
                Ok(Ok(hash)) => {
                    info!(
                        "submitted match {} to hyperdrive in tx {}",
                        matched.delta.id,
                        hex::encode(&hash.0[..8]),
                    );
                    return;
                },
                Ok(Err(e)) => {
                    warn!("hyperdrive submission attempt {attempt} failed: {e}")
                },
                Err(_) => warn!("hyperdrive submission attempt {attempt} timed out"),
            }
            sleep(self.rpc_backoff).await;
        }

        warn!("giving up on submitting match {}", matched.delta.id);
    }
}

/// The on-chain nonce of a match: the detecting pool's epoch hash followed
/// by the delta id
fn match_nonce(matched: &MatchedDelta) -> Vec<u8> {
    let mut nonce = Vec::with_capacity(64);
    nonce.extend_from_slice(&matched.epoch.0);
    nonce.extend_from_slice(&matched.delta.id.0);
    nonce
}

#[cfg(test)]
mod tests {
    use common::new_cancel_channel;
    use common::types::epoch::EpochHash;
    use common::types::order::OrderId;
    use common::types::smpc::{Delta, DeltaId};
    use job_types::hyperdrive::new_match_queue;
    use num_bigint::BigInt;
    use num_traits::Zero;
    use registry_client::mock::MockHyperdrive;

    use super::*;

    /// A matched delta over dummy order ids
    fn test_match() -> MatchedDelta {
        let buy = OrderId([1u8; 32]);
        let sell = OrderId([2u8; 32]);
        MatchedDelta {
            epoch: EpochHash([7u8; 32]),
            delta: Delta {
                id: DeltaId::new(&buy, &sell),
                buy_order_id: buy,
                sell_order_id: sell,
                tokens: BigInt::zero(),
                price: BigInt::zero(),
                volume: BigInt::zero(),
                min_volume: BigInt::zero(),
            },
        }
    }

    /// A matched delta lands on-chain with its domain-separated nonce
    #[tokio::test]
    async fn test_match_submitted() {
        let contract = MockHyperdrive::new();
        let (match_sender, match_receiver) = new_match_queue();
        let (_cancel_sender, cancel) = new_cancel_channel();

        let submitter = HyperdriveSubmitterExecutor::new(
            Arc::new(contract.clone()),
            match_receiver,
            true,
            Duration::from_secs(1),
            Duration::from_millis(10),
            cancel,
        );

        let matched = test_match();
        let expected_nonce = match_nonce(&matched);
        match_sender.send(matched).unwrap();
        drop(match_sender);

        // The queue closing ends the executor after the match drains
        let result = submitter.execute().await;
        assert_eq!(result, Err(HyperdriveError::StreamEnded));

        let txs = contract.submitted_txs();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].nonces, vec![expected_nonce.clone()]);
        assert!(contract.check_orders(&expected_nonce).await.unwrap() > 0);
    }

    /// Disabled submission drops matches without touching the contract
    #[tokio::test]
    async fn test_disabled_submission() {
        let contract = MockHyperdrive::new();
        let (match_sender, match_receiver) = new_match_queue();
        let (_cancel_sender, cancel) = new_cancel_channel();

        let submitter = HyperdriveSubmitterExecutor::new(
            Arc::new(contract.clone()),
            match_receiver,
            false,
            Duration::from_secs(1),
            Duration::from_millis(10),
            cancel,
        );

        match_sender.send(test_match()).unwrap();
        drop(match_sender);
        let _ = submitter.execute().await;

        assert!(contract.submitted_txs().is_empty());
    }
}
