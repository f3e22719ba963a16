//! Groups error types originating from the hyperdrive worker

use std::fmt::Display;

/// The core error type for the hyperdrive worker
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HyperdriveError {
    /// Error resulting from a cancellation signal
    Cancelled(String),
    /// Error sending a message to the consensus engine
    SendMessage(String),
    /// Error while setting up the worker
    SetupError(String),
    /// An inbound stream closed unexpectedly
    StreamEnded,
    /// An error submitting a transaction to the hyperdrive contract
    Submission(String),
}

impl Display for HyperdriveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
