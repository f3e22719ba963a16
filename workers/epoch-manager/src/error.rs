//! Groups error types originating from the epoch manager

use std::fmt::Display;

/// The core error type for the epoch manager
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EpochManagerError {
    /// Error resulting from a cancellation signal
    Cancelled(String),
    /// The registry stayed unreachable past the configured outage horizon
    RegistryUnreachable(String),
    /// Error sending a message to another worker
    SendMessage(String),
    /// Error while setting up the epoch manager
    SetupError(String),
    /// An inbound stream closed unexpectedly
    StreamEnded,
}

impl Display for EpochManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
