//! The darknode command line interface and parsed config definitions

use std::fmt::{self, Display};
use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use constants::{
    DEFAULT_COMPLETION_CACHE_ENTRIES, DEFAULT_CONSENSUS_THRESHOLD, DEFAULT_POOL_SIZE_TARGET,
    DEFAULT_RPC_BACKOFF_MS, DEFAULT_RPC_TIMEOUT_MS,
};
use serde::{Deserialize, Serialize};

// -------
// | CLI |
// -------

/// Defines the darknode command line interface
#[derive(Clone, Debug, Parser, Serialize, Deserialize)]
#[clap(author, about, long_about = None)]
pub struct Cli {
    // ---------------
    // | Config File |
    // ---------------
    /// A config file to read arguments from; command line arguments take
    /// precedence over file entries
    #[clap(long, value_parser)]
    pub config_file: Option<String>,

    // --------------------
    // | SMPC Engine |
    // --------------------
    /// The number of pool members targeted per epoch shuffle
    #[clap(long, value_parser, default_value_t = DEFAULT_POOL_SIZE_TARGET)]
    pub pool_size_target: u32,
    /// The quorum fraction used to derive the reconstruction threshold `k`
    /// from a pool size `n`, as `k = num * (n + 1) / den`
    #[clap(long, value_parser, default_value = "2/3")]
    pub smpc_k_fraction: KFraction,
    /// The number of completed delta ids remembered before FIFO eviction
    #[clap(long, value_parser, default_value_t = DEFAULT_COMPLETION_CACHE_ENTRIES)]
    pub completion_cache_entries: u32,
    /// The path of the append-only completion log used to rehydrate the
    /// delta builder across restarts; disabled when unset
    #[clap(long, value_parser)]
    pub completion_log: Option<PathBuf>,

    // --------------
    // | Networking |
    // --------------
    /// The address to bind the RPC listener to
    #[clap(long, value_parser, default_value = "0.0.0.0")]
    pub bind_addr: String,
    /// The port to bind the RPC listener to
    #[clap(long, value_parser, default_value = "18514", env = "DARKNODE_PORT")]
    pub port: u16,
    /// The timeout applied to each peer RPC call, in milliseconds
    #[clap(long, value_parser, default_value_t = DEFAULT_RPC_TIMEOUT_MS)]
    pub rpc_timeout_ms: u32,
    /// The backoff between peer RPC retries, in milliseconds
    #[clap(long, value_parser, default_value_t = DEFAULT_RPC_BACKOFF_MS)]
    pub rpc_backoff_ms: u32,

    // ------------
    // | Registry |
    // ------------
    /// The URL of the chain endpoint backing the darknode registry; when
    /// unset the node runs against an in-process devnet registry
    #[clap(long, value_parser, env = "DARKNODE_REGISTRY_URL")]
    pub registry_url: Option<String>,
    /// The interval between registry epoch polls, in milliseconds
    #[clap(long, value_parser, default_value = "5000")]
    pub registry_poll_interval_ms: u64,
    /// How long a registry outage may last before it is surfaced as fatal,
    /// in milliseconds
    #[clap(long, value_parser, default_value = "300000")]
    pub registry_outage_timeout_ms: u64,

    // --------------
    // | Hyperdrive |
    // --------------
    /// Whether matched deltas are submitted to the hyperdrive contract
    #[clap(long, value_parser, default_value = "true")]
    pub hyperdrive_enabled: bool,
    /// The capacity of each per-height consensus sub-channel
    #[clap(long, value_parser, default_value_t = DEFAULT_CONSENSUS_THRESHOLD)]
    pub consensus_threshold: usize,

    // ------------
    // | Identity |
    // ------------
    /// The path of the file holding the node's hex-encoded key material;
    /// when unset the node generates an ephemeral identity
    #[clap(long, value_parser, env = "DARKNODE_KEY_FILE")]
    pub key_file: Option<PathBuf>,

    // -------------
    // | Telemetry |
    // -------------
    /// Lower the default log level to debug
    #[clap(long, value_parser, default_value = "false")]
    pub verbose: bool,
}

// -----------------
// | Parsed Config |
// -----------------

/// The quorum fraction `num / den` used to derive `k` from `n`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KFraction {
    /// The numerator of the fraction
    pub num: u32,
    /// The denominator of the fraction
    pub den: u32,
}

impl KFraction {
    /// The reconstruction threshold for a pool of size `n`
    pub fn threshold(&self, n: usize) -> usize {
        (self.num as usize * (n + 1)) / self.den as usize
    }
}

impl FromStr for KFraction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (num, den) = s
            .split_once('/')
            .ok_or_else(|| format!("expected a fraction of the form num/den, got {s}"))?;
        let num: u32 = num.trim().parse().map_err(|_| format!("invalid numerator: {num}"))?;
        let den: u32 = den.trim().parse().map_err(|_| format!("invalid denominator: {den}"))?;

        if den == 0 {
            return Err("fraction denominator may not be zero".to_string());
        }
        if num == 0 || num >= den {
            return Err(format!("quorum fraction must lie in (0, 1), got {num}/{den}"));
        }

        Ok(KFraction { num, den })
    }
}

impl Display for KFraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// The fully parsed node config handed to the coordinator
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// The number of pool members targeted per epoch shuffle
    pub pool_size_target: u32,
    /// The quorum fraction deriving `k` from `n`
    pub smpc_k_fraction: KFraction,
    /// The number of completed delta ids remembered before FIFO eviction
    pub completion_cache_entries: u32,
    /// The path of the builder's completion log, when persistence is enabled
    pub completion_log: Option<PathBuf>,
    /// The address to bind the RPC listener to
    pub bind_addr: String,
    /// The port to bind the RPC listener to
    pub port: u16,
    /// The timeout applied to each peer RPC call, in milliseconds
    pub rpc_timeout_ms: u32,
    /// The backoff between peer RPC retries, in milliseconds
    pub rpc_backoff_ms: u32,
    /// The registry endpoint; `None` selects the in-process devnet registry
    pub registry_url: Option<String>,
    /// The interval between registry epoch polls, in milliseconds
    pub registry_poll_interval_ms: u64,
    /// The fatal horizon for registry outages, in milliseconds
    pub registry_outage_timeout_ms: u64,
    /// Whether matched deltas are submitted to the hyperdrive contract
    pub hyperdrive_enabled: bool,
    /// The capacity of each per-height consensus sub-channel
    pub consensus_threshold: usize,
    /// The path of the node's key file, when one was configured
    pub key_file: Option<PathBuf>,
    /// Whether debug logging was requested
    pub verbose: bool,
}

impl From<Cli> for NodeConfig {
    fn from(cli: Cli) -> Self {
        NodeConfig {
            pool_size_target: cli.pool_size_target,
            smpc_k_fraction: cli.smpc_k_fraction,
            completion_cache_entries: cli.completion_cache_entries,
            completion_log: cli.completion_log,
            bind_addr: cli.bind_addr,
            port: cli.port,
            rpc_timeout_ms: cli.rpc_timeout_ms,
            rpc_backoff_ms: cli.rpc_backoff_ms,
            registry_url: cli.registry_url,
            registry_poll_interval_ms: cli.registry_poll_interval_ms,
            registry_outage_timeout_ms: cli.registry_outage_timeout_ms,
            hyperdrive_enabled: cli.hyperdrive_enabled,
            consensus_threshold: cli.consensus_threshold,
            key_file: cli.key_file,
            verbose: cli.verbose,
        }
    }
}
