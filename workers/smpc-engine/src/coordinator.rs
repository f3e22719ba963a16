//! The coordinator session hosting one pool's SMPC for one epoch
//!
//! The session consumes order fragments routed to its epoch and delta
//! fragments received from pool peers. Every delta fragment the matrix
//! produces is broadcast to every pool member, the local node included, so
//! the local builder sees the same stream as the rest of the quorum.

use common::types::epoch::{Epoch, Pool};
use common::types::smpc::{Delta, DeltaFragment};
use common::types::order::OrderFragment;
use common::CancelChannel;
use job_types::hyperdrive::{MatchQueue, MatchedDelta};
use job_types::smpc_engine::{DeltaFragmentReceiver, OrderFragmentReceiver};
use tracing::{info, warn};
use util::get_current_time_seconds;

use crate::builder::DeltaBuilder;
use crate::matrix::DeltaFragmentMatrix;
use crate::peers::PeerChannel;

/// A per-(pool, epoch) coordinator session
pub struct PoolCoordinator {
    /// The epoch the session serves
    epoch: Epoch,
    /// The pool the local node was shuffled into
    pool: Pool,
    /// The session's order fragment store
    matrix: DeltaFragmentMatrix,
    /// The session's delta reconstructor
    builder: DeltaBuilder,
    /// Inbound order fragments, routed by the epoch switch
    order_fragments: OrderFragmentReceiver,
    /// Inbound delta fragments from pool peers, the local node included
    delta_fragments: DeltaFragmentReceiver,
    /// Outbound channels, one per pool member including the local loopback
    peers: Vec<PeerChannel>,
    /// The matched-delta output queue
    matches: MatchQueue,
    /// The engine's cancel signal for the session
    cancel: CancelChannel,
}

impl PoolCoordinator {
    /// Create a session over the given channels
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        epoch: Epoch,
        pool: Pool,
        matrix: DeltaFragmentMatrix,
        builder: DeltaBuilder,
        order_fragments: OrderFragmentReceiver,
        delta_fragments: DeltaFragmentReceiver,
        peers: Vec<PeerChannel>,
        matches: MatchQueue,
        cancel: CancelChannel,
    ) -> Self {
        Self {
            epoch,
            pool,
            matrix,
            builder,
            order_fragments,
            delta_fragments,
            peers,
            matches,
            cancel,
        }
    }

    /// Run the session until the epoch ends
    ///
    /// On cancellation the inbound channels are closed, outstanding
    /// fragments drain, and the session releases its matrix and builder by
    /// returning
    pub async fn run(mut self) {
        info!(
            "starting pool coordinator for epoch {} with {} members",
            self.epoch.blockhash,
            self.pool.size(),
        );

        loop {
            tokio::select! {
                _ = self.cancel.changed() => break,
                fragment = self.order_fragments.recv() => match fragment {
                    Some(fragment) => self.handle_order_fragment(fragment),
                    None => break,
                },
                fragment = self.delta_fragments.recv() => match fragment {
                    Some(fragment) => self.handle_delta_fragment(fragment),
                    None => break,
                },
            }
        }

        self.drain();
        info!("pool coordinator for epoch {} exited", self.epoch.blockhash);
    }

    /// Close the inbound channels and process what remains buffered
    ///
    /// Closing first means the switch observes failed sends for anything
    /// arriving after cancellation, rather than the session dropping work it
    /// already accepted
    fn drain(&mut self) {
        self.order_fragments.close();
        self.delta_fragments.close();

        while let Ok(fragment) = self.order_fragments.try_recv() {
            self.handle_order_fragment(fragment);
        }
        while let Ok(fragment) = self.delta_fragments.try_recv() {
            self.handle_delta_fragment(fragment);
        }
    }

    /// Store an order fragment and broadcast the delta fragments it produces
    fn handle_order_fragment(&mut self, fragment: OrderFragment) {
        if fragment.epoch != self.pool.epoch {
            warn!(
                "discarding order fragment {} tagged for foreign epoch {}",
                fragment.order_id, fragment.epoch,
            );
            return;
        }
        if fragment.expiry <= get_current_time_seconds() {
            warn!("discarding expired order fragment {}", fragment.order_id);
            return;
        }

        match self.matrix.insert(&fragment) {
            Ok(delta_fragments) => {
                for delta_fragment in delta_fragments {
                    self.broadcast(delta_fragment);
                }
            },
            Err(e) => warn!("cannot insert order fragment {}: {e}", fragment.order_id),
        }
    }

    /// Send a delta fragment to every pool member
    ///
    /// A pool of `n` tolerates up to `n - k` unreachable peers before match
    /// liveness is lost, so send failures are logged and tolerated
    fn broadcast(&self, fragment: DeltaFragment) {
        for peer in &self.peers {
            if peer.sender.send(fragment.clone()).is_err() {
                warn!("cannot send delta fragment {} to peer {}", fragment.id, peer.node_id);
            }
        }
    }

    /// Feed a peer's delta fragment to the builder and act on a completed
    /// reconstruction
    fn handle_delta_fragment(&mut self, fragment: DeltaFragment) {
        match self.builder.insert(fragment) {
            Ok(Some(delta)) => self.handle_delta(delta),
            Ok(None) => {},
            Err(e) => warn!("discarding delta fragment: {e}"),
        }
    }

    /// Apply the match predicate to a reconstructed delta
    ///
    /// Non-matches are dropped; they reveal nothing beyond their sign bits
    fn handle_delta(&mut self, delta: Delta) {
        if !delta.is_match() {
            return;
        }

        self.matrix.remove(&delta.buy_order_id);
        self.matrix.remove(&delta.sell_order_id);
        info!(
            "order match {}: buy {} sell {}",
            delta.id, delta.buy_order_id, delta.sell_order_id,
        );

        let matched = MatchedDelta { epoch: self.pool.epoch, delta };
        if self.matches.send(matched).is_err() {
            warn!("cannot emit matched delta; match queue closed");
        }
    }
}
