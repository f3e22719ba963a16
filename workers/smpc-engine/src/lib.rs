//! The SMPC engine computes order matches over secret-shared fragments
//!
//! One coordinator session runs per (pool, epoch). The session's matrix
//! cross-combines stored order fragments into delta fragments, its builder
//! reconstructs deltas from the quorum's fragments, and matching deltas are
//! emitted downstream for on-chain confirmation.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod builder;
pub mod completion_log;
pub mod coordinator;
pub mod error;
pub mod matrix;
pub mod peers;
pub mod worker;
