//! Groups error types originating from the SMPC engine

use std::fmt::Display;

use darknode_crypto::shamir::SharingError;

/// The core error type for the SMPC engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SmpcEngineError {
    /// Error resulting from a cancellation signal
    Cancelled(String),
    /// An order fragment was inserted twice into a matrix
    DuplicateOrderFragment(String),
    /// A fragment arrived at an index other than the node's pool index
    IndexMismatch(String),
    /// A delta fragment carried an index outside the pool's `[1..n]` range
    InvalidFragmentIndex(String),
    /// An error reconstructing a delta from its fragments
    Sharing(String),
    /// An error reading or writing the completion log
    Persistence(String),
    /// Error sending a message to another worker
    SendMessage(String),
    /// Error while setting up the engine
    SetupError(String),
    /// The epoch event stream closed unexpectedly
    StreamEnded,
}

impl Display for SmpcEngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl From<SharingError> for SmpcEngineError {
    fn from(value: SharingError) -> Self {
        SmpcEngineError::Sharing(value.to_string())
    }
}
