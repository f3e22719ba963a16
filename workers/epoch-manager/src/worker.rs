//! The worker implementation for the epoch manager
//!
//! The manager runs two executors: the ocean watcher observing the registry
//! and the epoch switch routing fragments. Each runs on its own named thread
//! and is watched independently.

use std::sync::Arc;
use std::thread::{Builder, JoinHandle};
use std::time::Duration;

use common::types::identity::NodeId;
use common::worker::Worker;
use common::CancelChannel;
use job_types::epoch_manager::{EpochEventQueue, EpochRouteReceiver};
use job_types::smpc_engine::{DeltaFragmentReceiver, OrderFragmentReceiver};
use registry_client::DarknodeRegistry;
use tokio::runtime::Builder as RuntimeBuilder;
use tracing::error;

use crate::error::EpochManagerError;
use crate::switch::EpochSwitchExecutor;
use crate::watcher::OceanWatcherExecutor;

/// The configuration passed to the epoch manager upon startup
pub struct EpochManagerConfig {
    /// The registry read interface
    pub registry: Arc<dyn DarknodeRegistry>,
    /// The local node's id
    pub local_node_id: NodeId,
    /// The number of pool members targeted per epoch shuffle
    pub pool_size_target: usize,
    /// The interval between registry polls, in milliseconds
    pub poll_interval_ms: u64,
    /// The fatal horizon for registry outages, in milliseconds
    pub outage_timeout_ms: u64,
    /// The queue on which epoch events are emitted to the engine
    pub epoch_queue: EpochEventQueue,
    /// New epoch routes arriving from the engine
    pub route_receiver: Option<EpochRouteReceiver>,
    /// Inbound order fragments from the relay layer
    pub order_fragments: Option<OrderFragmentReceiver>,
    /// Inbound delta fragments from the network layer
    pub delta_fragments: Option<DeltaFragmentReceiver>,
    /// The channel on which the coordinator may send a cancel signal
    pub cancel_channel: CancelChannel,
}

/// The worker hosting the watcher and switch executors
pub struct EpochManager {
    /// The watcher executor, taken at startup
    watcher: Option<OceanWatcherExecutor>,
    /// The switch executor, taken at startup
    switch: Option<EpochSwitchExecutor>,
    /// The thread handle of the watcher
    watcher_handle: Option<JoinHandle<EpochManagerError>>,
    /// The thread handle of the switch
    switch_handle: Option<JoinHandle<EpochManagerError>>,
}

impl Worker for EpochManager {
    type WorkerConfig = EpochManagerConfig;
    type Error = EpochManagerError;

    fn new(mut config: Self::WorkerConfig) -> Result<Self, Self::Error>
    where
        Self: Sized,
    {
        let missing_queue =
            || EpochManagerError::SetupError("epoch manager started without queues".to_string());

        let watcher = OceanWatcherExecutor::new(
            config.registry.clone(),
            config.local_node_id,
            config.pool_size_target,
            Duration::from_millis(config.poll_interval_ms),
            Duration::from_millis(config.outage_timeout_ms),
            config.epoch_queue.clone(),
            config.cancel_channel.clone(),
        );
        let switch = EpochSwitchExecutor::new(
            config.route_receiver.take().ok_or_else(missing_queue)?,
            config.order_fragments.take().ok_or_else(missing_queue)?,
            config.delta_fragments.take().ok_or_else(missing_queue)?,
            config.cancel_channel.clone(),
        );

        Ok(Self {
            watcher: Some(watcher),
            switch: Some(switch),
            watcher_handle: None,
            switch_handle: None,
        })
    }

    fn name(&self) -> String {
        "epoch-manager".to_string()
    }

    fn join(&mut self) -> Vec<JoinHandle<Self::Error>> {
        vec![self.watcher_handle.take().unwrap(), self.switch_handle.take().unwrap()]
    }

    fn start(&mut self) -> Result<(), Self::Error> {
        // Spawn the watcher loop in a separate thread
        let watcher = self.watcher.take().unwrap();
        let watcher_handle = Builder::new()
            .name("ocean-watcher-executor".to_string())
            .spawn(move || {
                let runtime = RuntimeBuilder::new_current_thread()
                    .enable_all()
                    .thread_name("ocean-watcher-runtime")
                    .build()
                    .map_err(|err| EpochManagerError::SetupError(err.to_string()));
                let runtime = match runtime {
                    Ok(runtime) => runtime,
                    Err(e) => return e,
                };

                runtime.block_on(async {
                    match watcher.execute().await {
                        Ok(()) => EpochManagerError::Cancelled("watcher cancelled".to_string()),
                        Err(e) => {
                            error!("ocean watcher crashed with error: {e}");
                            e
                        },
                    }
                })
            })
            .map_err(|err| EpochManagerError::SetupError(err.to_string()))?;
        self.watcher_handle = Some(watcher_handle);

        // Spawn the switch loop in a separate thread
        let switch = self.switch.take().unwrap();
        let switch_handle = Builder::new()
            .name("epoch-switch-executor".to_string())
            .spawn(move || {
                let runtime = RuntimeBuilder::new_current_thread()
                    .enable_all()
                    .thread_name("epoch-switch-runtime")
                    .build()
                    .map_err(|err| EpochManagerError::SetupError(err.to_string()));
                let runtime = match runtime {
                    Ok(runtime) => runtime,
                    Err(e) => return e,
                };

                runtime.block_on(async {
                    match switch.execute().await {
                        Ok(()) => EpochManagerError::Cancelled("switch cancelled".to_string()),
                        Err(e) => {
                            error!("epoch switch crashed with error: {e}");
                            e
                        },
                    }
                })
            })
            .map_err(|err| EpochManagerError::SetupError(err.to_string()))?;
        self.switch_handle = Some(switch_handle);

        Ok(())
    }
}
