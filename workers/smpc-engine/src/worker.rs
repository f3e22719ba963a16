//! The worker implementation for the SMPC engine
//!
//! The engine executor consumes epoch events, rotating one coordinator
//! session per epoch: the newly opened epoch runs, the just-closed epoch
//! drains, and the epoch before that is torn down.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{Builder, JoinHandle};

use common::types::epoch::EpochHash;
use common::types::identity::NodeId;
use common::worker::Worker;
use common::{new_cancel_channel, CancelChannel};
use job_types::epoch_manager::{EpochEvent, EpochEventReceiver, EpochRoute, EpochRouteQueue};
use job_types::hyperdrive::MatchQueue;
use job_types::smpc_engine::{new_delta_fragment_queue, new_order_fragment_queue};
use tokio::runtime::Builder as RuntimeBuilder;
use tokio::sync::watch::Sender as WatchSender;
use tokio::task::JoinHandle as TokioJoinHandle;
use tracing::{error, info};

use crate::builder::DeltaBuilder;
use crate::completion_log::CompletionLog;
use crate::coordinator::PoolCoordinator;
use crate::error::SmpcEngineError;
use crate::matrix::DeltaFragmentMatrix;
use crate::peers::{PeerChannel, PeerConnector};

// ----------
// | Worker |
// ----------

/// The configuration passed to the engine upon startup
pub struct SmpcEngineConfig {
    /// The local node's id
    pub local_node_id: NodeId,
    /// The quorum fraction `(num, den)` deriving `k` from a pool size `n`
    pub k_fraction: (u32, u32),
    /// The completion set capacity of each epoch's builder
    pub completion_cache_entries: usize,
    /// The path of the completion log, when persistence is enabled
    pub completion_log: Option<PathBuf>,
    /// The epoch events emitted by the watcher
    pub epoch_events: Option<EpochEventReceiver>,
    /// The queue on which new epoch routes are handed to the epoch switch
    pub route_queue: EpochRouteQueue,
    /// The matched-delta output queue consumed by the hyperdrive submitter
    pub match_queue: MatchQueue,
    /// The connector opening per-epoch peer channels
    pub connector: Arc<dyn PeerConnector>,
    /// The channel on which the coordinator may send a cancel signal
    pub cancel_channel: CancelChannel,
}

/// The worker hosting one coordinator session per (pool, epoch)
pub struct SmpcEngine {
    /// The executor run in a separate thread
    executor: Option<SmpcEngineExecutor>,
    /// The thread handle of the executor
    executor_handle: Option<JoinHandle<SmpcEngineError>>,
}

impl Worker for SmpcEngine {
    type WorkerConfig = SmpcEngineConfig;
    type Error = SmpcEngineError;

    fn new(config: Self::WorkerConfig) -> Result<Self, Self::Error>
    where
        Self: Sized,
    {
        let executor = SmpcEngineExecutor::new(config)?;
        Ok(Self { executor: Some(executor), executor_handle: None })
    }

    fn name(&self) -> String {
        "smpc-engine".to_string()
    }

    fn join(&mut self) -> Vec<JoinHandle<Self::Error>> {
        vec![self.executor_handle.take().unwrap()]
    }

    fn start(&mut self) -> Result<(), Self::Error> {
        let executor = self.executor.take().unwrap();
        let join_handle = Builder::new()
            .name("smpc-engine-executor".to_string())
            .spawn(move || {
                let runtime = RuntimeBuilder::new_current_thread()
                    .enable_all()
                    .thread_name("smpc-engine-runtime")
                    .build()
                    .map_err(|err| SmpcEngineError::SetupError(err.to_string()));
                let runtime = match runtime {
                    Ok(runtime) => runtime,
                    Err(e) => return e,
                };

                runtime.block_on(async {
                    match executor.execute().await {
                        Ok(()) => SmpcEngineError::Cancelled("engine cancelled".to_string()),
                        Err(e) => {
                            error!("smpc engine crashed with error: {e}");
                            e
                        },
                    }
                })
            })
            .map_err(|err| SmpcEngineError::SetupError(err.to_string()))?;

        self.executor_handle = Some(join_handle);
        Ok(())
    }
}

// ------------
// | Executor |
// ------------

/// A running coordinator session and the handles controlling it
struct SessionHandle {
    /// The epoch the session serves
    epoch: EpochHash,
    /// The sender half of the session's cancel channel
    cancel: WatchSender<()>,
    /// The session task
    task: TokioJoinHandle<()>,
}

/// The executor that rotates coordinator sessions as epochs transition
pub struct SmpcEngineExecutor {
    /// The local node's id
    local_node_id: NodeId,
    /// The quorum fraction deriving `k` from `n`
    k_fraction: (u32, u32),
    /// The completion set capacity of each epoch's builder
    completion_cache_entries: usize,
    /// The completion log shared by every epoch's builder
    completion_log: Option<Arc<CompletionLog>>,
    /// The epoch events emitted by the watcher
    epoch_events: EpochEventReceiver,
    /// The queue on which new epoch routes are handed to the epoch switch
    route_queue: EpochRouteQueue,
    /// The matched-delta output queue
    match_queue: MatchQueue,
    /// The connector opening per-epoch peer channels
    connector: Arc<dyn PeerConnector>,
    /// The coordinator's cancel signal
    cancel: CancelChannel,
    /// The session of the just-closed epoch, still draining
    previous_session: Option<SessionHandle>,
    /// The session of the current epoch
    current_session: Option<SessionHandle>,
}

impl SmpcEngineExecutor {
    /// Create a new executor, opening the completion log when configured
    pub fn new(mut config: SmpcEngineConfig) -> Result<Self, SmpcEngineError> {
        let completion_log = config
            .completion_log
            .as_deref()
            .map(|path| CompletionLog::open(path, config.completion_cache_entries))
            .transpose()
            .map_err(|e| SmpcEngineError::Persistence(e.to_string()))?
            .map(Arc::new);

        let epoch_events = config.epoch_events.take().ok_or_else(|| {
            SmpcEngineError::SetupError("engine started without an epoch event queue".to_string())
        })?;

        Ok(Self {
            local_node_id: config.local_node_id,
            k_fraction: config.k_fraction,
            completion_cache_entries: config.completion_cache_entries,
            completion_log,
            epoch_events,
            route_queue: config.route_queue,
            match_queue: config.match_queue,
            connector: config.connector,
            cancel: config.cancel_channel,
            previous_session: None,
            current_session: None,
        })
    }

    /// The main execution loop for the executor
    pub async fn execute(mut self) -> Result<(), SmpcEngineError> {
        loop {
            tokio::select! {
                _ = self.cancel.changed() => {
                    self.shutdown_sessions();
                    return Ok(());
                },
                event = self.epoch_events.recv() => match event {
                    Some(event) => self.handle_epoch(event)?,
                    None => {
                        self.shutdown_sessions();
                        return Err(SmpcEngineError::StreamEnded);
                    },
                },
            }
        }
    }

    /// Rotate sessions for a new epoch
    ///
    /// The session two epochs back is torn down, the current session enters
    /// drain mode, and a fresh session opens for the new epoch when the
    /// local node was shuffled into a pool
    fn handle_epoch(&mut self, event: EpochEvent) -> Result<(), SmpcEngineError> {
        info!(
            "epoch transition to {} at block {}",
            event.epoch.blockhash, event.epoch.blocknumber,
        );

        if let Some(old) = self.previous_session.take() {
            // The session received its cancel an epoch ago; anything still
            // running at this point is abandoned
            old.task.abort();
        }
        if let Some(current) = self.current_session.take() {
            let _ = current.cancel.send(());
            self.previous_session = Some(current);
        }

        let Some(index) = event.pool.index_of(&self.local_node_id) else {
            info!("local node not assigned to a pool for epoch {}", event.epoch.blockhash);
            return Ok(());
        };

        let n = event.pool.size();
        let k = self.threshold(n);
        let (order_sender, order_receiver) = new_order_fragment_queue();
        let (delta_sender, delta_receiver) = new_delta_fragment_queue();

        // Every broadcast includes the local node so its own fragments
        // round-trip through the builder
        let mut peers = self.connector.connect(&event.pool, &self.local_node_id);
        peers.push(PeerChannel { node_id: self.local_node_id, sender: delta_sender.clone() });

        let matrix = DeltaFragmentMatrix::new(index);
        let builder =
            DeltaBuilder::new(k, n, self.completion_cache_entries, self.completion_log.clone());

        let (cancel_sender, cancel_receiver) = new_cancel_channel();
        let coordinator = PoolCoordinator::new(
            event.epoch,
            event.pool,
            matrix,
            builder,
            order_receiver,
            delta_receiver,
            peers,
            self.match_queue.clone(),
            cancel_receiver,
        );
        let task = tokio::spawn(coordinator.run());

        self.route_queue
            .send(EpochRoute {
                epoch: event.epoch.blockhash,
                order_fragments: order_sender,
                delta_fragments: delta_sender,
            })
            .map_err(|e| SmpcEngineError::SendMessage(e.to_string()))?;

        self.current_session =
            Some(SessionHandle { epoch: event.epoch.blockhash, cancel: cancel_sender, task });
        Ok(())
    }

    /// Signal every live session to drain and exit
    fn shutdown_sessions(&mut self) {
        for session in
            self.previous_session.take().into_iter().chain(self.current_session.take())
        {
            info!("cancelling coordinator session for epoch {}", session.epoch);
            let _ = session.cancel.send(());
        }
    }

    /// The reconstruction threshold for a pool of size `n`
    fn threshold(&self, n: usize) -> usize {
        let (num, den) = self.k_fraction;
        (num as usize * (n + 1)) / den as usize
    }
}
