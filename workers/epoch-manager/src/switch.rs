//! The epoch switch routes fragments to the session of their tagged epoch
//!
//! At most two routes are live at once: the current epoch's session and the
//! just-closed previous epoch's session, which may still be draining. When a
//! third route arrives the oldest is closed by dropping its sinks. Fragments
//! tagged with an unknown or stale epoch are dropped with a counter
//! increment.

use common::types::order::OrderFragment;
use common::types::smpc::DeltaFragment;
use common::CancelChannel;
use job_types::epoch_manager::{EpochRoute, EpochRouteReceiver};
use job_types::smpc_engine::{DeltaFragmentReceiver, OrderFragmentReceiver};
use tracing::{debug, info, warn};

use crate::error::EpochManagerError;

/// The executor multiplexing inbound fragments across epoch routes
pub struct EpochSwitchExecutor {
    /// The route of the current epoch
    current: Option<EpochRoute>,
    /// The route of the just-closed previous epoch, still draining
    previous: Option<EpochRoute>,
    /// New routes arriving from the engine as epochs open
    routes: EpochRouteReceiver,
    /// Inbound order fragments from the relay layer
    order_fragments: OrderFragmentReceiver,
    /// Inbound delta fragments from the network layer
    delta_fragments: DeltaFragmentReceiver,
    /// The worker's cancel signal
    cancel: CancelChannel,
    /// The number of order fragments dropped as unroutable
    dropped_order_fragments: u64,
    /// The number of delta fragments dropped as unroutable
    dropped_delta_fragments: u64,
}

impl EpochSwitchExecutor {
    /// Create a new switch executor over the given inbound streams
    pub fn new(
        routes: EpochRouteReceiver,
        order_fragments: OrderFragmentReceiver,
        delta_fragments: DeltaFragmentReceiver,
        cancel: CancelChannel,
    ) -> Self {
        Self {
            current: None,
            previous: None,
            routes,
            order_fragments,
            delta_fragments,
            cancel,
            dropped_order_fragments: 0,
            dropped_delta_fragments: 0,
        }
    }

    /// The main execution loop for the switch
    pub async fn execute(mut self) -> Result<(), EpochManagerError> {
        loop {
            tokio::select! {
                _ = self.cancel.changed() => return Ok(()),
                route = self.routes.recv() => match route {
                    Some(route) => self.handle_route(route),
                    None => return Err(EpochManagerError::StreamEnded),
                },
                fragment = self.order_fragments.recv() => match fragment {
                    Some(fragment) => self.handle_order_fragment(fragment),
                    None => return Err(EpochManagerError::StreamEnded),
                },
                fragment = self.delta_fragments.recv() => match fragment {
                    Some(fragment) => self.handle_delta_fragment(fragment),
                    None => return Err(EpochManagerError::StreamEnded),
                },
            }
        }
    }

    /// Install the route of a newly opened epoch
    ///
    /// The previous-previous route, if any, is closed by dropping its sinks
    fn handle_route(&mut self, route: EpochRoute) {
        info!("switching to epoch {}", route.epoch);
        self.previous = self.current.take();
        self.current = Some(route);
    }

    /// Route an order fragment by its epoch tag
    fn handle_order_fragment(&mut self, fragment: OrderFragment) {
        let Some(route) = self.route_for(fragment.epoch) else {
            self.dropped_order_fragments += 1;
            debug!(
                "dropping order fragment {} for unknown epoch {} ({} dropped)",
                fragment.order_id, fragment.epoch, self.dropped_order_fragments,
            );
            return;
        };

        let order_id = fragment.order_id;
        if route.order_fragments.send(fragment).is_err() {
            // The session drained after cancellation; the tag is stale
            self.dropped_order_fragments += 1;
            warn!(
                "dropping order fragment {order_id} for stale epoch ({} dropped)",
                self.dropped_order_fragments,
            );
        }
    }

    /// Route a delta fragment by its producing session's epoch
    ///
    /// Delta fragments carry no epoch tag of their own; they are valid for
    /// whichever live session accepts their id, preferring the current epoch
    fn handle_delta_fragment(&mut self, fragment: DeltaFragment) {
        let Some(route) = self.current.as_ref().or(self.previous.as_ref()) else {
            self.dropped_delta_fragments += 1;
            debug!(
                "dropping delta fragment {} with no live epoch ({} dropped)",
                fragment.id, self.dropped_delta_fragments,
            );
            return;
        };

        let id = fragment.id;
        if route.delta_fragments.send(fragment).is_err() {
            self.dropped_delta_fragments += 1;
            warn!(
                "dropping delta fragment {id} for stale epoch ({} dropped)",
                self.dropped_delta_fragments,
            );
        }
    }

    /// The live route serving the given epoch, if any
    fn route_for(&self, epoch: common::types::epoch::EpochHash) -> Option<&EpochRoute> {
        self.current
            .as_ref()
            .filter(|route| route.epoch == epoch)
            .or_else(|| self.previous.as_ref().filter(|route| route.epoch == epoch))
    }
}

#[cfg(test)]
mod tests {
    use common::new_cancel_channel;
    use common::types::epoch::EpochHash;
    use common::types::order::{Order, OrderId, OrderKind, OrderSide, TokenPair};
    use job_types::epoch_manager::new_epoch_route_queue;
    use job_types::smpc_engine::{new_delta_fragment_queue, new_order_fragment_queue};
    use rand::thread_rng;

    use super::*;

    /// Build a switch with no live routes, returning it alongside unused
    /// inbound senders kept alive by the caller
    fn test_switch() -> EpochSwitchExecutor {
        let (_route_sender, route_receiver) = new_epoch_route_queue();
        let (_order_sender, order_receiver) = new_order_fragment_queue();
        let (_delta_sender, delta_receiver) = new_delta_fragment_queue();
        let (_cancel_sender, cancel) = new_cancel_channel();
        // The inbound senders are dropped; tests drive the handlers directly
        EpochSwitchExecutor::new(route_receiver, order_receiver, delta_receiver, cancel)
    }

    /// Build a route for the given epoch and hand back its receivers
    fn test_route(
        epoch: EpochHash,
    ) -> (EpochRoute, OrderFragmentReceiver, DeltaFragmentReceiver) {
        let (order_sender, order_receiver) = new_order_fragment_queue();
        let (delta_sender, delta_receiver) = new_delta_fragment_queue();
        let route =
            EpochRoute { epoch, order_fragments: order_sender, delta_fragments: delta_sender };
        (route, order_receiver, delta_receiver)
    }

    /// An order fragment tagged with the given epoch
    fn order_fragment(epoch: EpochHash) -> OrderFragment {
        let order = Order {
            id: OrderId([1u8; 32]),
            side: OrderSide::Buy,
            kind: OrderKind::Limit,
            expiry: 2_000_000_000,
            tokens: TokenPair::new(1, 2),
            price: 100,
            volume: 10,
            min_volume: 10,
            nonce: 0,
        };
        let mut rng = thread_rng();
        order.fragment(epoch, 4, 5, &mut rng).unwrap().remove(0)
    }

    /// Fragments tagged with the current epoch reach its session
    #[test]
    fn test_routes_to_current_epoch() {
        let mut switch = test_switch();
        let epoch = EpochHash([1u8; 32]);
        let (route, mut order_receiver, _delta_receiver) = test_route(epoch);

        switch.handle_route(route);
        switch.handle_order_fragment(order_fragment(epoch));

        assert!(order_receiver.try_recv().is_ok());
        assert_eq!(switch.dropped_order_fragments, 0);
    }

    /// A draining previous epoch still receives its fragments until its
    /// session closes, after which they are dropped as stale
    #[test]
    fn test_previous_epoch_drains_then_drops() {
        let mut switch = test_switch();
        let e0 = EpochHash([1u8; 32]);
        let e1 = EpochHash([2u8; 32]);
        let (route0, mut order_receiver0, _delta0) = test_route(e0);
        let (route1, _order_receiver1, _delta1) = test_route(e1);

        switch.handle_route(route0);
        switch.handle_route(route1);

        // Still draining: the in-flight fragment completes
        switch.handle_order_fragment(order_fragment(e0));
        assert!(order_receiver0.try_recv().is_ok());

        // The session finishes draining and closes its inbound channel
        order_receiver0.close();
        switch.handle_order_fragment(order_fragment(e0));
        assert_eq!(switch.dropped_order_fragments, 1);
    }

    /// A third route evicts the oldest; its epoch tag becomes unknown
    #[test]
    fn test_third_route_closes_oldest() {
        let mut switch = test_switch();
        let e0 = EpochHash([1u8; 32]);
        let e1 = EpochHash([2u8; 32]);
        let e2 = EpochHash([3u8; 32]);
        let (route0, mut order_receiver0, _delta0) = test_route(e0);
        let (route1, _order_receiver1, _delta1) = test_route(e1);
        let (route2, _order_receiver2, _delta2) = test_route(e2);

        switch.handle_route(route0);
        switch.handle_route(route1);
        switch.handle_route(route2);

        switch.handle_order_fragment(order_fragment(e0));
        assert_eq!(switch.dropped_order_fragments, 1);
        // The evicted route's sink was dropped, closing the channel
        assert!(order_receiver0.try_recv().is_err());
    }

    /// Fragments for an epoch that never had a route are dropped
    #[test]
    fn test_unknown_epoch_dropped() {
        let mut switch = test_switch();
        let (route, _order_receiver, _delta_receiver) = test_route(EpochHash([1u8; 32]));
        switch.handle_route(route);

        switch.handle_order_fragment(order_fragment(EpochHash([9u8; 32])));
        assert_eq!(switch.dropped_order_fragments, 1);
    }

    /// Delta fragments prefer the current epoch's session
    #[test]
    fn test_delta_fragments_to_current() {
        let mut switch = test_switch();
        let e0 = EpochHash([1u8; 32]);
        let e1 = EpochHash([2u8; 32]);
        let (route0, _order0, _delta_receiver0) = test_route(e0);
        let (route1, _order1, mut delta_receiver1) = test_route(e1);

        switch.handle_route(route0);
        switch.handle_route(route1);

        let fragment = order_fragment(e1);
        let delta = common::types::smpc::DeltaFragment::from_order_fragments(&fragment, &{
            let mut sell = order_fragment(e1);
            sell.side = OrderSide::Sell;
            sell
        });
        switch.handle_delta_fragment(delta);

        assert!(delta_receiver1.try_recv().is_ok());
    }
}
