//! The hyperdrive worker feeds per-height consensus messages to the
//! consensus engine and converts confirmed matches into on-chain
//! transactions
//!
//! Messages buffer in height-indexed channel sets; exactly one copy context
//! streams the current height's buffer into the engine, and buffered heights
//! below the chain head are garbage-collected as the head advances.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod blocks;
pub mod buffer;
pub mod error;
pub mod submitter;
pub mod worker;
