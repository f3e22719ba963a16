//! Epoch rotation with in-flight fragments, across the engine and switch
//!
//! A single-node pool keeps the quorum at one so each session matches
//! locally; the interesting behavior is the rotation itself: fragments
//! tagged with a live epoch route and complete, fragments tagged with a
//! drained epoch are dropped, and fragments for the new epoch flow as soon
//! as its route installs.

use std::sync::Arc;
use std::time::Duration;

use common::new_cancel_channel;
use common::types::epoch::{Epoch, EpochHash, Pool};
use common::types::identity::NodeId;
use common::types::order::{Order, OrderId, OrderKind, OrderSide, TokenPair};
use epoch_manager::switch::EpochSwitchExecutor;
use job_types::epoch_manager::{new_epoch_event_queue, new_epoch_route_queue, EpochEvent};
use job_types::hyperdrive::new_match_queue;
use job_types::smpc_engine::{new_delta_fragment_queue, new_order_fragment_queue};
use rand::thread_rng;
use smpc_engine::peers::LoopbackConnector;
use smpc_engine::worker::{SmpcEngineConfig, SmpcEngineExecutor};
use tokio::time::{sleep, timeout};

/// The single pool member used throughout
const LOCAL: NodeId = NodeId([1u8; 32]);

/// An epoch event placing the local node in a pool of one
fn epoch_event(hash_byte: u8, blocknumber: u64) -> EpochEvent {
    let blockhash = EpochHash([hash_byte; 32]);
    EpochEvent {
        epoch: Epoch { blockhash, blocknumber, epoch_interval: 50 },
        pool: Pool { epoch: blockhash, nodes: vec![LOCAL] },
    }
}

/// Shard an order for a pool of one and tag it with the given epoch
fn order_fragment(
    epoch: EpochHash,
    side: OrderSide,
    id_byte: u8,
) -> common::types::order::OrderFragment {
    let order = Order {
        id: OrderId([id_byte; 32]),
        side,
        kind: OrderKind::Limit,
        expiry: 2_000_000_000,
        tokens: TokenPair::new(1, 2),
        price: 100,
        volume: 10,
        min_volume: 10,
        nonce: 0,
    };
    let mut rng = thread_rng();
    order.fragment(epoch, 1, 1, &mut rng).unwrap().remove(0)
}

/// Orders tagged with a live epoch match; after the epoch drains its tag is
/// stale and subsequent fragments are dropped, while the new epoch's
/// fragments flow
#[tokio::test]
async fn test_epoch_transition_with_in_flight_order() {
    let (epoch_event_sender, epoch_event_receiver) = new_epoch_event_queue();
    let (route_sender, route_receiver) = new_epoch_route_queue();
    let (match_sender, mut match_receiver) = new_match_queue();
    let (order_sender, order_receiver) = new_order_fragment_queue();
    let (delta_sender, delta_receiver) = new_delta_fragment_queue();
    let (_engine_cancel, engine_cancel_receiver) = new_cancel_channel();
    let (_switch_cancel, switch_cancel_receiver) = new_cancel_channel();

    let engine = SmpcEngineExecutor::new(SmpcEngineConfig {
        local_node_id: LOCAL,
        k_fraction: (2, 3),
        completion_cache_entries: 1024,
        completion_log: None,
        epoch_events: Some(epoch_event_receiver),
        route_queue: route_sender,
        match_queue: match_sender,
        connector: Arc::new(LoopbackConnector),
        cancel_channel: engine_cancel_receiver,
    })
    .unwrap();
    tokio::spawn(async move {
        let _ = engine.execute().await;
    });

    let switch = EpochSwitchExecutor::new(
        route_receiver,
        order_receiver,
        delta_receiver,
        switch_cancel_receiver,
    );
    tokio::spawn(async move {
        let _ = switch.execute().await;
    });
    // The network inbound stays open for the duration of the test
    let _delta_sender = delta_sender;

    // Open epoch E0 and match a pair through it
    let e0 = EpochHash([10u8; 32]);
    epoch_event_sender.send(epoch_event(10, 100)).unwrap();
    sleep(Duration::from_millis(50)).await;

    order_sender.send(order_fragment(e0, OrderSide::Buy, 1)).unwrap();
    order_sender.send(order_fragment(e0, OrderSide::Sell, 2)).unwrap();
    let matched = timeout(Duration::from_secs(5), match_receiver.recv())
        .await
        .expect("no match in epoch E0")
        .expect("match queue closed");
    assert_eq!(matched.epoch, e0);

    // Transition to E1; the E0 session drains and closes
    let e1 = EpochHash([11u8; 32]);
    epoch_event_sender.send(epoch_event(11, 150)).unwrap();
    sleep(Duration::from_millis(100)).await;

    // A late pair tagged E0 no longer produces a match
    order_sender.send(order_fragment(e0, OrderSide::Buy, 3)).unwrap();
    order_sender.send(order_fragment(e0, OrderSide::Sell, 4)).unwrap();
    assert!(
        timeout(Duration::from_millis(300), match_receiver.recv()).await.is_err(),
        "stale-epoch fragments were matched",
    );

    // Fragments tagged E1 route to the new session and match
    order_sender.send(order_fragment(e1, OrderSide::Buy, 5)).unwrap();
    order_sender.send(order_fragment(e1, OrderSide::Sell, 6)).unwrap();
    let matched = timeout(Duration::from_secs(5), match_receiver.recv())
        .await
        .expect("no match in epoch E1")
        .expect("match queue closed");
    assert_eq!(matched.epoch, e1);
    assert_eq!(matched.delta.buy_order_id, OrderId([5u8; 32]));
}
