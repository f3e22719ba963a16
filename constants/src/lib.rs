//! Defines system-wide constants for darknode execution

#![deny(unsafe_code)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(missing_docs)]

// -------------------------
// | System-Wide Constants |
// -------------------------

/// The version of the node software
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The largest pool size the SMPC engine supports; registry snapshots
/// implying a larger pool are chunked below this bound
pub const MAX_POOL_SIZE: usize = 128;

/// The numerator of the Byzantine quorum fraction; a pool of `n` members
/// reconstructs with `k = 2 * (n + 1) / 3` shares
pub const QUORUM_NUMERATOR: u32 = 2;

/// The denominator of the Byzantine quorum fraction
pub const QUORUM_DENOMINATOR: u32 = 3;

// ---------------------
// | Default Capacities |
// ---------------------

/// The default number of pool members targeted per epoch shuffle
pub const DEFAULT_POOL_SIZE_TARGET: u32 = 8;

/// The default number of completed delta ids the builder remembers before
/// evicting in FIFO order
pub const DEFAULT_COMPLETION_CACHE_ENTRIES: u32 = 65_536;

/// The default capacity of each per-height consensus sub-channel, and of the
/// outbound channel set consumed by the consensus engine
pub const DEFAULT_CONSENSUS_THRESHOLD: usize = 256;

/// The default timeout applied to each peer RPC call, in milliseconds
pub const DEFAULT_RPC_TIMEOUT_MS: u32 = 5_000;

/// The default backoff between peer RPC retries, in milliseconds
pub const DEFAULT_RPC_BACKOFF_MS: u32 = 3_000;

// ----------------------
// | Pubsub Topic Names |
// ----------------------

/// The topic published to when a pool detects an order match
pub const ORDER_MATCH_TOPIC: &str = "order-matches";

/// The topic published to when the watcher observes an epoch transition
pub const EPOCH_TRANSITION_TOPIC: &str = "epochs";
