//! End-to-end matching flows over an in-memory five-node pool
//!
//! Each node runs a real coordinator session; the peer channels are
//! cross-wired directly so every broadcast reaches every builder, exactly as
//! the compute streams would deliver them.

use std::time::Duration;

use common::new_cancel_channel;
use common::types::epoch::{Epoch, EpochHash, Pool};
use common::types::identity::NodeId;
use common::types::order::{Order, OrderId, OrderKind, OrderSide, TokenPair};
use job_types::hyperdrive::{new_match_queue, MatchReceiver};
use job_types::smpc_engine::{new_delta_fragment_queue, new_order_fragment_queue, OrderFragmentQueue};
use num_traits::Zero;
use rand::thread_rng;
use smpc_engine::builder::DeltaBuilder;
use smpc_engine::coordinator::PoolCoordinator;
use smpc_engine::matrix::DeltaFragmentMatrix;
use smpc_engine::peers::PeerChannel;
use tokio::sync::watch::Sender as WatchSender;
use tokio::time::timeout;

/// The pool size used throughout
const N: usize = 5;
/// The reconstruction threshold for a five-member pool
const K: usize = 4;

/// The handles of a running in-memory pool
struct TestPool {
    /// The per-node order fragment sinks
    order_queues: Vec<OrderFragmentQueue>,
    /// The per-node matched-delta outputs
    match_receivers: Vec<MatchReceiver>,
    /// The per-node cancel senders, held so the sessions stay alive
    _cancels: Vec<WatchSender<()>>,
    /// The epoch the pool serves
    epoch: Epoch,
}

/// Spawn a five-node pool with fully cross-wired peer channels
fn spawn_pool() -> TestPool {
    let epoch = Epoch {
        blockhash: EpochHash([7u8; 32]),
        blocknumber: 100,
        epoch_interval: 50,
    };
    let pool = Pool {
        epoch: epoch.blockhash,
        nodes: (1..=N as u8).map(|i| NodeId([i; 32])).collect(),
    };

    let mut order_queues = Vec::with_capacity(N);
    let mut delta_queues = Vec::with_capacity(N);
    let mut delta_receivers = Vec::with_capacity(N);
    for _ in 0..N {
        let (order_sender, order_receiver) = new_order_fragment_queue();
        let (delta_sender, delta_receiver) = new_delta_fragment_queue();
        order_queues.push((order_sender, order_receiver));
        delta_queues.push(delta_sender);
        delta_receivers.push(delta_receiver);
    }

    let mut match_receivers = Vec::with_capacity(N);
    let mut cancels = Vec::with_capacity(N);
    let mut order_senders = Vec::with_capacity(N);
    for (i, ((order_sender, order_receiver), delta_receiver)) in
        order_queues.into_iter().zip(delta_receivers).enumerate()
    {
        let index = (i + 1) as u64;
        let peers: Vec<PeerChannel> = pool
            .nodes
            .iter()
            .zip(delta_queues.iter())
            .map(|(node_id, sender)| PeerChannel { node_id: *node_id, sender: sender.clone() })
            .collect();

        let (match_sender, match_receiver) = new_match_queue();
        let (cancel_sender, cancel_receiver) = new_cancel_channel();
        let coordinator = PoolCoordinator::new(
            epoch,
            pool.clone(),
            DeltaFragmentMatrix::new(index),
            DeltaBuilder::new(K, N, 1024, None),
            order_receiver,
            delta_receiver,
            peers,
            match_sender,
            cancel_receiver,
        );
        tokio::spawn(coordinator.run());

        order_senders.push(order_sender);
        match_receivers.push(match_receiver);
        cancels.push(cancel_sender);
    }

    TestPool { order_queues: order_senders, match_receivers, _cancels: cancels, epoch }
}

/// A plaintext order over the test token pair
fn test_order(side: OrderSide, id_byte: u8, price: u64) -> Order {
    Order {
        id: OrderId([id_byte; 32]),
        side,
        kind: OrderKind::Limit,
        expiry: 2_000_000_000,
        tokens: TokenPair::new(1, 2),
        price,
        volume: 10,
        min_volume: 10,
        nonce: 42,
    }
}

/// Shard an order and deliver fragment `i` to node `i`
fn submit_order(pool: &TestPool, order: &Order) {
    let mut rng = thread_rng();
    let fragments = order.fragment(pool.epoch.blockhash, K, N, &mut rng).unwrap();
    for (queue, fragment) in pool.order_queues.iter().zip(fragments) {
        queue.send(fragment).unwrap();
    }
}

/// Two crossing orders are detected as a match by every pool member, with
/// the reconstructed delta revealing only zeros
#[tokio::test]
async fn test_basic_match() {
    let mut pool = spawn_pool();
    submit_order(&pool, &test_order(OrderSide::Buy, 1, 100));
    submit_order(&pool, &test_order(OrderSide::Sell, 2, 100));

    for receiver in pool.match_receivers.iter_mut() {
        let matched = timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("no match detected")
            .expect("match queue closed");

        assert_eq!(matched.epoch, pool.epoch.blockhash);
        assert_eq!(matched.delta.buy_order_id, OrderId([1u8; 32]));
        assert_eq!(matched.delta.sell_order_id, OrderId([2u8; 32]));
        assert!(matched.delta.tokens.is_zero());
        assert!(matched.delta.price.is_zero());
        assert!(matched.delta.volume.is_zero());
        assert!(matched.delta.min_volume.is_zero());
    }
}

/// A sell priced above the buy produces no match on any node
#[tokio::test]
async fn test_price_mismatch_no_match() {
    let mut pool = spawn_pool();
    submit_order(&pool, &test_order(OrderSide::Buy, 1, 100));
    submit_order(&pool, &test_order(OrderSide::Sell, 2, 101));

    for receiver in pool.match_receivers.iter_mut() {
        let result = timeout(Duration::from_millis(500), receiver.recv()).await;
        assert!(result.is_err(), "non-match leaked through the detector");
    }
}

/// A second crossing sell still matches after the first pair was removed
/// from the matrix
#[tokio::test]
async fn test_sequential_matches() {
    let mut pool = spawn_pool();
    submit_order(&pool, &test_order(OrderSide::Buy, 1, 100));
    submit_order(&pool, &test_order(OrderSide::Sell, 2, 100));

    // Every node must observe the first match, and so remove the first
    // pair from its matrix, before the second pair is submitted
    for receiver in pool.match_receivers.iter_mut() {
        let first = timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("no match detected")
            .expect("match queue closed");
        assert_eq!(first.delta.sell_order_id, OrderId([2u8; 32]));
    }

    submit_order(&pool, &test_order(OrderSide::Buy, 3, 100));
    submit_order(&pool, &test_order(OrderSide::Sell, 4, 100));

    let second = timeout(Duration::from_secs(5), pool.match_receivers[0].recv())
        .await
        .expect("no match detected")
        .expect("match queue closed");
    assert_eq!(second.delta.buy_order_id, OrderId([3u8; 32]));
    assert_eq!(second.delta.sell_order_id, OrderId([4u8; 32]));
}
