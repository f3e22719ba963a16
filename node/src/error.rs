//! Groups top-level errors useful for the coordinator

use std::fmt::Display;

/// An error type at the coordinator level
#[derive(Clone, Debug)]
pub enum CoordinatorError {
    /// Failure to bind the RPC listener
    Bind(String),
    /// Failure to load the node's key material
    KeyLoad(String),
    /// An unrecoverable failure reaching the darknode registry
    Registry(String),
    /// An error setting up the node or a fatal worker fault
    Setup(String),
}

impl CoordinatorError {
    /// The process exit code the error maps to
    pub fn exit_code(&self) -> i32 {
        match self {
            CoordinatorError::Registry(_) => 1,
            CoordinatorError::KeyLoad(_) => 2,
            CoordinatorError::Bind(_) => 3,
            _ => 1,
        }
    }
}

impl Display for CoordinatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
