//! Cryptographic primitives consumed by the darknode: arithmetic over the
//! fixed prime field and (k, n) Shamir secret sharing with Lagrange
//! reconstruction

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(clippy::needless_pass_by_value)]

pub mod fields;
pub mod shamir;
