//! The worker implementation for the hyperdrive module
//!
//! The producer, consumer, and submitter executors run concurrently on one
//! named thread; the first to fail brings the worker down for the
//! coordinator to observe.

use std::sync::Arc;
use std::thread::{Builder, JoinHandle};
use std::time::Duration;

use common::worker::Worker;
use common::CancelChannel;
use job_types::hyperdrive::{ConsensusMessageReceiver, MatchReceiver};
use registry_client::HyperdriveContract;
use tokio::runtime::Builder as RuntimeBuilder;
use tracing::error;

use crate::blocks::SharedBlocks;
use crate::buffer::{BufferConsumer, BufferProducer, ChannelSet, MessageBuffer};
use crate::error::HyperdriveError;
use crate::submitter::HyperdriveSubmitterExecutor;

/// The configuration passed to the hyperdrive worker upon startup
pub struct HyperdriveConfig {
    /// The per-phase capacity of each height's channel set
    pub consensus_threshold: usize,
    /// The inbound consensus message stream from the network layer
    pub inbound: Option<ConsensusMessageReceiver>,
    /// The outbound channel set consumed by the consensus engine
    pub outbound: Option<ChannelSet>,
    /// The chain-head view shared with the consensus engine
    pub blocks: SharedBlocks,
    /// The hyperdrive contract interface
    pub contract: Arc<dyn HyperdriveContract>,
    /// The matched deltas emitted by pool coordinators
    pub matches: Option<MatchReceiver>,
    /// Whether match submission is enabled
    pub hyperdrive_enabled: bool,
    /// The per-call RPC timeout, in milliseconds
    pub rpc_timeout_ms: u32,
    /// The backoff between RPC retries, in milliseconds
    pub rpc_backoff_ms: u32,
    /// The channel on which the coordinator may send a cancel signal
    pub cancel_channel: CancelChannel,
}

/// The worker hosting the buffer and submitter executors
pub struct Hyperdrive {
    /// The producer executor, taken at startup
    producer: Option<BufferProducer>,
    /// The consumer executor, taken at startup
    consumer: Option<BufferConsumer>,
    /// The submitter executor, taken at startup
    submitter: Option<HyperdriveSubmitterExecutor>,
    /// The thread handle of the executors
    executor_handle: Option<JoinHandle<HyperdriveError>>,
}

impl Worker for Hyperdrive {
    type WorkerConfig = HyperdriveConfig;
    type Error = HyperdriveError;

    fn new(mut config: Self::WorkerConfig) -> Result<Self, Self::Error>
    where
        Self: Sized,
    {
        let missing_queue =
            || HyperdriveError::SetupError("hyperdrive started without queues".to_string());

        let buffer = MessageBuffer::new(config.consensus_threshold);
        let producer = BufferProducer::new(
            buffer.clone(),
            config.inbound.take().ok_or_else(missing_queue)?,
            config.blocks.clone(),
            config.cancel_channel.clone(),
        );
        let consumer = BufferConsumer::new(
            buffer,
            config.blocks.clone(),
            config.outbound.take().ok_or_else(missing_queue)?,
            config.cancel_channel.clone(),
        );
        let submitter = HyperdriveSubmitterExecutor::new(
            config.contract.clone(),
            config.matches.take().ok_or_else(missing_queue)?,
            config.hyperdrive_enabled,
            Duration::from_millis(config.rpc_timeout_ms as u64),
            Duration::from_millis(config.rpc_backoff_ms as u64),
            config.cancel_channel.clone(),
        );

        Ok(Self {
            producer: Some(producer),
            consumer: Some(consumer),
            submitter: Some(submitter),
            executor_handle: None,
        })
    }

    fn name(&self) -> String {
        "hyperdrive".to_string()
    }

    fn join(&mut self) -> Vec<JoinHandle<Self::Error>> {
        vec![self.executor_handle.take().unwrap()]
    }

    fn start(&mut self) -> Result<(), Self::Error> {
        let producer = self.producer.take().unwrap();
        let consumer = self.consumer.take().unwrap();
        let submitter = self.submitter.take().unwrap();

        let join_handle = Builder::new()
            .name("hyperdrive-executor".to_string())
            .spawn(move || {
                let runtime = RuntimeBuilder::new_current_thread()
                    .enable_all()
                    .thread_name("hyperdrive-runtime")
                    .build()
                    .map_err(|err| HyperdriveError::SetupError(err.to_string()));
                let runtime = match runtime {
                    Ok(runtime) => runtime,
                    Err(e) => return e,
                };

                runtime.block_on(async {
                    let result = tokio::select! {
                        result = producer.execute() => result,
                        result = consumer.execute() => result,
                        result = submitter.execute() => result,
                    };

                    match result {
                        Ok(()) => HyperdriveError::Cancelled("hyperdrive cancelled".to_string()),
                        Err(e) => {
                            error!("hyperdrive worker crashed with error: {e}");
                            e
                        },
                    }
                })
            })
            .map_err(|err| HyperdriveError::SetupError(err.to_string()))?;

        self.executor_handle = Some(join_handle);
        Ok(())
    }
}
