//! The ocean watcher polls the registry for epoch transitions
//!
//! On every transition the watcher reads the registered node set, computes
//! the deterministic pool partition, and emits an epoch event carrying the
//! local node's pool. Events are totally ordered by block number. Registry
//! outages back off exponentially and surface as fatal past the configured
//! horizon.

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::types::epoch::Pool;
use common::types::identity::NodeId;
use common::CancelChannel;
use job_types::epoch_manager::{EpochEvent, EpochEventQueue};
use registry_client::{DarknodeRegistry, RegistryError};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::EpochManagerError;
use crate::pools::{find_pool, pool_assignment};

/// The cap applied to the exponential outage backoff
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// The executor polling the registry for epoch transitions
pub struct OceanWatcherExecutor {
    /// The registry read interface
    registry: Arc<dyn DarknodeRegistry>,
    /// The local node's id
    local_node_id: NodeId,
    /// The number of pool members targeted per shuffle
    pool_size_target: usize,
    /// The interval between registry polls
    poll_interval: Duration,
    /// How long an outage may last before it is surfaced as fatal
    outage_timeout: Duration,
    /// The queue on which epoch events are emitted
    epoch_queue: EpochEventQueue,
    /// The worker's cancel signal
    cancel: CancelChannel,
    /// The block number of the last emitted epoch
    last_blocknumber: Option<u64>,
}

impl OceanWatcherExecutor {
    /// Create a new watcher executor
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<dyn DarknodeRegistry>,
        local_node_id: NodeId,
        pool_size_target: usize,
        poll_interval: Duration,
        outage_timeout: Duration,
        epoch_queue: EpochEventQueue,
        cancel: CancelChannel,
    ) -> Self {
        Self {
            registry,
            local_node_id,
            pool_size_target,
            poll_interval,
            outage_timeout,
            epoch_queue,
            cancel,
            last_blocknumber: None,
        }
    }

    /// The main execution loop for the watcher
    pub async fn execute(mut self) -> Result<(), EpochManagerError> {
        let mut backoff = self.poll_interval;
        let mut outage_start: Option<Instant> = None;

        loop {
            match self.poll_once().await {
                Ok(()) => {
                    backoff = self.poll_interval;
                    outage_start = None;
                },
                Err(e) => {
                    warn!("registry poll failed: {e}");
                    let start = outage_start.get_or_insert_with(Instant::now);
                    if start.elapsed() >= self.outage_timeout {
                        return Err(EpochManagerError::RegistryUnreachable(e.to_string()));
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                },
            }

            tokio::select! {
                _ = self.cancel.changed() => return Ok(()),
                _ = sleep(backoff) => {},
            }
        }
    }

    /// Read the registry once and emit an event if the epoch advanced
    ///
    /// Epochs are totally ordered by block number; an older epoch observed
    /// after a newer one is never re-emitted
    async fn poll_once(&mut self) -> Result<(), RegistryError> {
        let epoch = self.registry.current_epoch().await?;
        let advanced = self.last_blocknumber.map_or(true, |last| epoch.blocknumber > last);
        if !advanced {
            return Ok(());
        }

        let nodes = self.registry.list_nodes().await?;
        let pools = pool_assignment(&nodes, &epoch.blockhash, self.pool_size_target);
        let pool = find_pool(&pools, &self.local_node_id).unwrap_or_else(|| {
            // The local node was not shuffled into a pool this epoch; the
            // event still rotates the engine's sessions
            Pool { epoch: epoch.blockhash, nodes: Vec::new() }
        });

        info!(
            "epoch {} at block {}: {} registered nodes across {} pools",
            epoch.blockhash,
            epoch.blocknumber,
            nodes.len(),
            pools.len(),
        );

        if self.epoch_queue.send(EpochEvent { epoch, pool }).is_err() {
            warn!("cannot emit epoch event; engine queue closed");
        }
        self.last_blocknumber = Some(epoch.blocknumber);

        Ok(())
    }
}
