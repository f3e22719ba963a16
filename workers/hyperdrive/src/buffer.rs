//! The height-indexed consensus message buffer
//!
//! The producer lazily creates a bounded channel set per height and fans
//! inbound messages into it, dropping anything below the chain head. The
//! consumer owns the height map's lifecycle: on every head advance it stops
//! the active copy context, starts exactly one context for the new height,
//! and deletes every buffered height left behind. A copy context's
//! cancellation is acknowledged before the next starts, so no sends on the
//! outbound channel set outlive it.

use std::collections::HashMap;

use common::types::consensus::{Commit, ConsensusMessage, Fault, Height, Prepare, Proposal};
use common::{new_async_shared, new_cancel_channel, AsyncShared, CancelChannel};
use job_types::hyperdrive::ConsensusMessageReceiver;
use tokio::sync::mpsc::error::{SendError, TrySendError};
use tokio::sync::mpsc::{channel, Receiver as BoundedReceiver, Sender as BoundedSender};
use tokio::sync::watch::Sender as WatchSender;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::blocks::SharedBlocks;
use crate::error::HyperdriveError;

// ---------------
// | Channel Set |
// ---------------

/// The sender halves of one height's per-phase channels
#[derive(Clone, Debug)]
pub struct ChannelSet {
    /// The proposal sub-channel
    proposals: BoundedSender<Proposal>,
    /// The prepare sub-channel
    prepares: BoundedSender<Prepare>,
    /// The commit sub-channel
    commits: BoundedSender<Commit>,
    /// The fault sub-channel
    faults: BoundedSender<Fault>,
}

/// The receiver halves of one height's per-phase channels
#[derive(Debug)]
pub struct ChannelSetReceiver {
    /// The proposal sub-channel
    proposals: BoundedReceiver<Proposal>,
    /// The prepare sub-channel
    prepares: BoundedReceiver<Prepare>,
    /// The commit sub-channel
    commits: BoundedReceiver<Commit>,
    /// The fault sub-channel
    faults: BoundedReceiver<Fault>,
}

/// Create a channel set with the given per-phase capacity
pub fn new_channel_set(capacity: usize) -> (ChannelSet, ChannelSetReceiver) {
    let (proposals_sender, proposals_receiver) = channel(capacity);
    let (prepares_sender, prepares_receiver) = channel(capacity);
    let (commits_sender, commits_receiver) = channel(capacity);
    let (faults_sender, faults_receiver) = channel(capacity);

    (
        ChannelSet {
            proposals: proposals_sender,
            prepares: prepares_sender,
            commits: commits_sender,
            faults: faults_sender,
        },
        ChannelSetReceiver {
            proposals: proposals_receiver,
            prepares: prepares_receiver,
            commits: commits_receiver,
            faults: faults_receiver,
        },
    )
}

impl ChannelSet {
    /// Send a message to its phase's sub-channel without blocking
    pub fn try_send(
        &self,
        message: ConsensusMessage,
    ) -> Result<(), TrySendError<ConsensusMessage>> {
        match message {
            ConsensusMessage::Proposal(m) => {
                self.proposals.try_send(m).map_err(|e| wrap_try_send(e, ConsensusMessage::Proposal))
            },
            ConsensusMessage::Prepare(m) => {
                self.prepares.try_send(m).map_err(|e| wrap_try_send(e, ConsensusMessage::Prepare))
            },
            ConsensusMessage::Commit(m) => {
                self.commits.try_send(m).map_err(|e| wrap_try_send(e, ConsensusMessage::Commit))
            },
            ConsensusMessage::Fault(m) => {
                self.faults.try_send(m).map_err(|e| wrap_try_send(e, ConsensusMessage::Fault))
            },
        }
    }

    /// Send a message to its phase's sub-channel, awaiting capacity
    pub async fn send(
        &self,
        message: ConsensusMessage,
    ) -> Result<(), SendError<ConsensusMessage>> {
        match message {
            ConsensusMessage::Proposal(m) => self
                .proposals
                .send(m)
                .await
                .map_err(|SendError(m)| SendError(ConsensusMessage::Proposal(m))),
            ConsensusMessage::Prepare(m) => self
                .prepares
                .send(m)
                .await
                .map_err(|SendError(m)| SendError(ConsensusMessage::Prepare(m))),
            ConsensusMessage::Commit(m) => self
                .commits
                .send(m)
                .await
                .map_err(|SendError(m)| SendError(ConsensusMessage::Commit(m))),
            ConsensusMessage::Fault(m) => self
                .faults
                .send(m)
                .await
                .map_err(|SendError(m)| SendError(ConsensusMessage::Fault(m))),
        }
    }
}

/// Rewrap a typed try-send error as a tagged-union error
fn wrap_try_send<T>(
    err: TrySendError<T>,
    wrap: fn(T) -> ConsensusMessage,
) -> TrySendError<ConsensusMessage> {
    match err {
        TrySendError::Full(m) => TrySendError::Full(wrap(m)),
        TrySendError::Closed(m) => TrySendError::Closed(wrap(m)),
    }
}

impl ChannelSetReceiver {
    /// Receive the next message from any sub-channel
    ///
    /// Returns `None` once every sender has been dropped
    pub async fn recv(&mut self) -> Option<ConsensusMessage> {
        tokio::select! {
            Some(m) = self.proposals.recv() => Some(ConsensusMessage::Proposal(m)),
            Some(m) = self.prepares.recv() => Some(ConsensusMessage::Prepare(m)),
            Some(m) = self.commits.recv() => Some(ConsensusMessage::Commit(m)),
            Some(m) = self.faults.recv() => Some(ConsensusMessage::Fault(m)),
            else => None,
        }
    }
}

// ----------
// | Buffer |
// ----------

/// One buffered height: the producer's senders and the receiver the copy
/// context takes ownership of
struct HeightEntry {
    /// The sender halves the producer fans into
    senders: ChannelSet,
    /// The receiver halves, present until a copy context claims them
    receivers: Option<ChannelSetReceiver>,
}

/// The height-indexed message buffer
///
/// The height map is the only mutable state shared between the producer and
/// consumer; it sits behind a single reader-writer lock
#[derive(Clone)]
pub struct MessageBuffer {
    /// The per-phase capacity of each height's channel set
    threshold: usize,
    /// The buffered heights
    heights: AsyncShared<HashMap<Height, HeightEntry>>,
}

impl MessageBuffer {
    /// Create an empty buffer whose channel sets hold `threshold` messages
    /// per phase
    pub fn new(threshold: usize) -> Self {
        Self { threshold, heights: new_async_shared(HashMap::new()) }
    }

    /// The senders for a height, creating its entry lazily
    async fn senders_for(&self, height: Height) -> ChannelSet {
        let mut heights = self.heights.write().await;
        heights
            .entry(height)
            .or_insert_with(|| {
                let (senders, receivers) = new_channel_set(self.threshold);
                HeightEntry { senders, receivers: Some(receivers) }
            })
            .senders
            .clone()
    }

    /// Claim the receivers for a height, creating its entry lazily
    ///
    /// Exactly one copy context runs per height, so the receivers are taken
    /// at most once
    async fn take_receivers(&self, height: Height) -> Option<ChannelSetReceiver> {
        let mut heights = self.heights.write().await;
        heights
            .entry(height)
            .or_insert_with(|| {
                let (senders, receivers) = new_channel_set(self.threshold);
                HeightEntry { senders, receivers: Some(receivers) }
            })
            .receivers
            .take()
    }

    /// Delete every buffered height below the given bound
    async fn delete_below(&self, bound: Height) {
        let mut heights = self.heights.write().await;
        heights.retain(|height, _| *height >= bound);
    }

    /// The number of buffered heights
    pub async fn len(&self) -> usize {
        self.heights.read().await.len()
    }

    /// Whether no heights are buffered
    pub async fn is_empty(&self) -> bool {
        self.heights.read().await.is_empty()
    }
}

// ------------
// | Producer |
// ------------

/// The executor fanning inbound messages into their height's channel set
pub struct BufferProducer {
    /// The shared buffer
    buffer: MessageBuffer,
    /// The inbound message stream from the network layer
    inbound: ConsensusMessageReceiver,
    /// The chain-head view
    blocks: SharedBlocks,
    /// The worker's cancel signal
    cancel: CancelChannel,
}

impl BufferProducer {
    /// Create a new producer
    pub fn new(
        buffer: MessageBuffer,
        inbound: ConsensusMessageReceiver,
        blocks: SharedBlocks,
        cancel: CancelChannel,
    ) -> Self {
        Self { buffer, inbound, blocks, cancel }
    }

    /// The main execution loop for the producer
    pub async fn execute(mut self) -> Result<(), HyperdriveError> {
        loop {
            tokio::select! {
                _ = self.cancel.changed() => return Ok(()),
                message = self.inbound.recv() => match message {
                    Some(message) => self.handle_message(message).await,
                    None => return Err(HyperdriveError::StreamEnded),
                },
            }
        }
    }

    /// Buffer one inbound message
    async fn handle_message(&self, message: ConsensusMessage) {
        let height = message.height();
        if height < self.blocks.height() {
            debug!("dropping consensus message below chain head at height {height}");
            return;
        }

        let senders = self.buffer.senders_for(height).await;
        match senders.try_send(message) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) => {
                if cfg!(debug_assertions) {
                    panic!("consensus channel full at height {height}");
                }
                warn!("dropping consensus message at height {height}; channel full");
            },
            Err(TrySendError::Closed(_)) => {
                warn!("dropping consensus message at height {height}; channel closed");
            },
        }
    }
}

// ------------
// | Consumer |
// ------------

/// A running copy context and the handles controlling it
struct CopyContext {
    /// The height the context streams
    height: Height,
    /// The sender half of the context's cancel channel
    cancel: WatchSender<()>,
    /// The copy task
    task: JoinHandle<()>,
}

impl CopyContext {
    /// Stop the context, awaiting its task so no further sends occur on the
    /// outbound channel set
    async fn stop(self) {
        let _ = self.cancel.send(());
        let _ = self.task.await;
        debug!("stopped copying height {}", self.height);
    }
}

/// The executor streaming the current height's buffer into the consensus
/// engine
pub struct BufferConsumer {
    /// The shared buffer
    buffer: MessageBuffer,
    /// The chain-head view
    blocks: SharedBlocks,
    /// The outbound channel set consumed by the consensus engine
    outbound: ChannelSet,
    /// The worker's cancel signal
    cancel: CancelChannel,
}

impl BufferConsumer {
    /// Create a new consumer
    pub fn new(
        buffer: MessageBuffer,
        blocks: SharedBlocks,
        outbound: ChannelSet,
        cancel: CancelChannel,
    ) -> Self {
        Self { buffer, blocks, outbound, cancel }
    }

    /// The main execution loop for the consumer
    pub async fn execute(mut self) -> Result<(), HyperdriveError> {
        let mut heights = self.blocks.subscribe();
        let mut current = *heights.borrow();
        let mut context = self.start_copy(current).await;

        loop {
            tokio::select! {
                _ = self.cancel.changed() => {
                    context.stop().await;
                    return Ok(());
                },
                changed = heights.changed() => {
                    if changed.is_err() {
                        context.stop().await;
                        return Err(HyperdriveError::StreamEnded);
                    }

                    let advanced = *heights.borrow();
                    if advanced <= current {
                        continue;
                    }

                    // The old context acknowledges cancellation before the
                    // next starts; exactly one is ever active
                    context.stop().await;
                    context = self.start_copy(advanced).await;
                    self.buffer.delete_below(advanced).await;
                    current = advanced;
                },
            }
        }
    }

    /// Start the copy context for a height
    async fn start_copy(&self, height: Height) -> CopyContext {
        info!("start copying height {height}");
        let receivers = self.buffer.take_receivers(height).await;
        let outbound = self.outbound.clone();
        let (cancel_sender, cancel_receiver) = new_cancel_channel();

        let task = tokio::spawn(async move {
            let Some(receivers) = receivers else {
                // The height's receivers were already claimed; nothing to do
                return;
            };
            copy_height(receivers, outbound, cancel_receiver).await;
        });

        CopyContext { height, cancel: cancel_sender, task }
    }
}

/// Stream one height's buffered messages into the outbound channel set until
/// cancelled or the height's senders are dropped
async fn copy_height(
    mut receivers: ChannelSetReceiver,
    outbound: ChannelSet,
    mut cancel: CancelChannel,
) {
    loop {
        let message = tokio::select! {
            _ = cancel.changed() => return,
            message = receivers.recv() => match message {
                Some(message) => message,
                None => return,
            },
        };

        // The outbound set is bounded; a stalled engine applies backpressure
        // here, and cancellation interrupts the blocked send
        tokio::select! {
            _ = cancel.changed() => return,
            sent = outbound.send(message) => {
                if sent.is_err() {
                    return;
                }
            },
        }
    }
}
