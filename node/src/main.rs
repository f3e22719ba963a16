//! The entrypoint to the darknode, starts the coordinator thread which
//! manages all other worker threads

#![deny(unsafe_code)]
#![deny(clippy::missing_docs_in_private_items)]

mod error;
mod setup;

use std::process::exit;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::new_cancel_channel;
use common::worker::{new_worker_failure_channel, watch_worker, Worker};
use config::parse_command_line_args;
use constants::VERSION;
use epoch_manager::worker::{EpochManager, EpochManagerConfig};
use hyperdrive::blocks::SharedBlocks;
use hyperdrive::buffer::new_channel_set;
use hyperdrive::worker::{Hyperdrive, HyperdriveConfig};
use job_types::epoch_manager::{new_epoch_event_queue, new_epoch_route_queue};
use job_types::hyperdrive::{new_consensus_message_queue, new_match_queue};
use job_types::smpc_engine::{new_delta_fragment_queue, new_order_fragment_queue};
use registry_client::mock::MockHyperdrive;
use smpc_engine::peers::LoopbackConnector;
use smpc_engine::worker::{SmpcEngine, SmpcEngineConfig};
use tokio::select;
use tracing::{error, info};

use crate::error::CoordinatorError;

/// The amount of time to wait between sending teardown signals and
/// terminating execution
const TERMINATION_TIMEOUT_MS: u64 = 10_000; // 10 seconds

// --------------
// | Entrypoint |
// --------------

/// The entrypoint to the darknode's execution
///
/// At a high level, this method begins a coordinator thread that:
///     1. Allocates resources and starts up workers
///     2. Watches worker threads for panics and errors
///     3. Tears the process down when a worker faults beyond recovery
///
/// The general flow for allocating a worker's resources is:
///     1. Allocate any communication primitives the worker needs access to
///        (job queues, shared block store, etc)
///     2. Build a cancel channel that the coordinator can use to cancel
///        worker execution
///     3. Allocate and start the worker's execution
///     4. Allocate a thread to monitor the worker for faults
#[tokio::main]
async fn main() {
    // ---------------------
    // | Environment Setup |
    // ---------------------

    // Parse command line arguments
    let args = match parse_command_line_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error parsing command line args: {e}");
            exit(1);
        },
    };

    // Configure telemetry before all else so we don't lose any data
    util::telemetry::configure_telemetry(args.verbose);
    info!(
        "darknode running with\n\t version: {}\n\t port: {}\n\t pool size target: {}",
        VERSION, args.port, args.pool_size_target,
    );

    // Load the node's identity
    let local_node_id = match setup::load_node_id(&args) {
        Ok(id) => id,
        Err(e) => {
            error!("cannot load node identity: {e}");
            exit(e.exit_code());
        },
    };
    info!("local node id: {local_node_id}");

    // Verify the RPC address binds before spinning up workers
    if let Err(e) = setup::check_bind(&args) {
        error!("{e}");
        exit(e.exit_code());
    }

    // Construct the registry client
    let registry = match setup::build_registry(&args, local_node_id) {
        Ok(registry) => registry,
        Err(e) => {
            error!("cannot construct registry client: {e}");
            exit(e.exit_code());
        },
    };

    // Build communication primitives
    let (epoch_event_sender, epoch_event_receiver) = new_epoch_event_queue();
    let (route_sender, route_receiver) = new_epoch_route_queue();
    let (match_sender, match_receiver) = new_match_queue();
    let (consensus_sender, consensus_receiver) =
        new_consensus_message_queue(args.consensus_threshold);
    let (consensus_out_senders, consensus_out_receivers) =
        new_channel_set(args.consensus_threshold);
    let blocks = SharedBlocks::new(0);

    // The relay and compute stream surfaces are served by the external RPC
    // layer; their inbound queues are allocated here and handed to it
    let (order_fragment_sender, order_fragment_receiver) = new_order_fragment_queue();
    let (delta_fragment_sender, delta_fragment_receiver) = new_delta_fragment_queue();

    // ----------------
    // | Worker Setup |
    // ----------------

    // Every watcher reports on one failure channel; the report names the
    // worker so the coordinator can map the fault to an exit code
    let (failure_sender, mut failure_receiver) = new_worker_failure_channel();

    // Start the epoch manager
    let (epoch_manager_cancel_sender, epoch_manager_cancel_receiver) = new_cancel_channel();
    let mut epoch_manager = EpochManager::new(EpochManagerConfig {
        registry: registry.clone(),
        local_node_id,
        pool_size_target: args.pool_size_target as usize,
        poll_interval_ms: args.registry_poll_interval_ms,
        outage_timeout_ms: args.registry_outage_timeout_ms,
        epoch_queue: epoch_event_sender,
        route_receiver: Some(route_receiver),
        order_fragments: Some(order_fragment_receiver),
        delta_fragments: Some(delta_fragment_receiver),
        cancel_channel: epoch_manager_cancel_receiver,
    })
    .expect("failed to build epoch manager");
    epoch_manager.start().expect("failed to start epoch manager");
    watch_worker::<EpochManager>(&mut epoch_manager, &failure_sender);

    // Start the SMPC engine
    let (engine_cancel_sender, engine_cancel_receiver) = new_cancel_channel();
    let mut smpc_engine = SmpcEngine::new(SmpcEngineConfig {
        local_node_id,
        k_fraction: (args.smpc_k_fraction.num, args.smpc_k_fraction.den),
        completion_cache_entries: args.completion_cache_entries as usize,
        completion_log: args.completion_log.clone(),
        epoch_events: Some(epoch_event_receiver),
        route_queue: route_sender,
        match_queue: match_sender,
        connector: Arc::new(LoopbackConnector),
        cancel_channel: engine_cancel_receiver,
    })
    .expect("failed to build smpc engine");
    smpc_engine.start().expect("failed to start smpc engine");
    watch_worker::<SmpcEngine>(&mut smpc_engine, &failure_sender);

    // Start the hyperdrive worker
    let (hyperdrive_cancel_sender, hyperdrive_cancel_receiver) = new_cancel_channel();
    let mut hyperdrive_worker = Hyperdrive::new(HyperdriveConfig {
        consensus_threshold: args.consensus_threshold,
        inbound: Some(consensus_receiver),
        outbound: Some(consensus_out_senders),
        blocks: blocks.clone(),
        contract: Arc::new(MockHyperdrive::new()),
        matches: Some(match_receiver),
        hyperdrive_enabled: args.hyperdrive_enabled,
        rpc_timeout_ms: args.rpc_timeout_ms,
        rpc_backoff_ms: args.rpc_backoff_ms,
        cancel_channel: hyperdrive_cancel_receiver,
    })
    .expect("failed to build hyperdrive worker");
    hyperdrive_worker.start().expect("failed to start hyperdrive worker");
    watch_worker::<Hyperdrive>(&mut hyperdrive_worker, &failure_sender);

    // Await a worker fault or an interrupt, and tear down in response; a
    // fault in the epoch manager is a registry-class failure, everything
    // else maps to the generic fatal code
    let recovery_result: Result<(), CoordinatorError> = select! {
        failure = failure_receiver.recv() => match failure {
            Some(failure) if failure.worker == epoch_manager.name() => {
                Err(CoordinatorError::Registry(format!("{}: {}", failure.worker, failure.error)))
            },
            Some(failure) => {
                Err(CoordinatorError::Setup(format!("{}: {}", failure.worker, failure.error)))
            },
            None => Err(CoordinatorError::Setup("worker failure channel closed".to_string())),
        },
        _ = tokio::signal::ctrl_c() => Ok(()),
    };

    // Send cancel signals to all workers
    for cancel_channel in [
        &epoch_manager_cancel_sender,
        &engine_cancel_sender,
        &hyperdrive_cancel_sender,
    ] {
        let _ = cancel_channel.send(());
    }

    // The external RPC surface owns these in a full deployment; dropping
    // them here closes the worker inbound streams during teardown
    drop(order_fragment_sender);
    drop(delta_fragment_sender);
    drop(consensus_sender);
    drop(consensus_out_receivers);

    // Give workers time to teardown execution then terminate
    info!("Tearing down workers...");
    thread::sleep(Duration::from_millis(TERMINATION_TIMEOUT_MS));
    info!("Terminating...");

    match recovery_result {
        Ok(()) => exit(0),
        Err(e) => {
            error!("error in coordinator thread: {e}");
            exit(e.exit_code());
        },
    }
}
