//! Defines the `Worker` trait run by the node's coordinator
//!
//! The node hosts a small, fixed set of workers: the epoch manager, the
//! SMPC engine, and the hyperdrive module. None of them recovers in
//! isolation; each owns channel endpoints whose other halves live with its
//! peers, so the coordinator's response to any fault is a full teardown.
//! The trait therefore covers allocation, startup, and join handles, and
//! the watcher reports which worker failed with what error so the
//! coordinator can map the fault to an exit code.

use std::fmt::{Debug, Display};
use std::thread::{Builder, JoinHandle};

use tokio::sync::mpsc::{channel, Receiver as TokioReceiver, Sender as TokioSender};
use tracing::error;

/// The capacity of the coordinator's failure channel; one buffered report
/// per worker thread is enough, the first fault tears the node down
const FAILURE_CHANNEL_CAPACITY: usize = 8;

/// A fault report from a watched worker thread
#[derive(Clone, Debug)]
pub struct WorkerFailure {
    /// The name of the worker that exited
    pub worker: String,
    /// The rendered error the worker exited with
    pub error: String,
}

/// The sender half of the coordinator's failure channel
pub type WorkerFailureSender = TokioSender<WorkerFailure>;
/// The receiver half of the coordinator's failure channel
pub type WorkerFailureReceiver = TokioReceiver<WorkerFailure>;

/// Create the failure channel shared by every worker watcher
pub fn new_worker_failure_channel() -> (WorkerFailureSender, WorkerFailureReceiver) {
    channel(FAILURE_CHANNEL_CAPACITY)
}

/// The interface a worker exposes to the coordinator
pub trait Worker {
    /// The configuration needed to allocate the implementing worker
    type WorkerConfig;
    /// The error type the worker's threads exit with
    type Error: 'static + Send + Debug + Display;

    /// Allocate the worker from its config without starting execution
    fn new(config: Self::WorkerConfig) -> Result<Self, Self::Error>
    where
        Self: Sized;

    /// Begin execution on the worker's own named threads
    fn start(&mut self) -> Result<(), Self::Error>;

    /// The name the worker reports faults under
    fn name(&self) -> String;

    /// Take the join handles of every thread the worker spawned
    fn join(&mut self) -> Vec<JoinHandle<Self::Error>>;
}

/// Watch a worker's threads, reporting each exit on the failure channel
///
/// A worker may hold more than one join handle (the epoch manager runs its
/// registry watcher and its switch separately); each is watched by a
/// dedicated thread so one stalled executor cannot mask another's fault
pub fn watch_worker<W: Worker>(worker: &mut W, failure_channel: &WorkerFailureSender) {
    let worker_name = worker.name();
    for join_handle in worker.join() {
        let channel = failure_channel.clone();
        let name = worker_name.clone();

        Builder::new()
            .name(format!("{worker_name}-watcher"))
            .spawn(move || {
                let error = match join_handle.join() {
                    Ok(err) => err.to_string(),
                    Err(_) => "worker thread panicked".to_string(),
                };
                error!("{name} exited: {error}");

                // The coordinator may already be tearing down, in which
                // case the report is dropped
                let _ = channel.blocking_send(WorkerFailure { worker: name, error });
            })
            .expect("error spawning worker watcher thread");
    }
}
