//! Possible errors thrown by the registry and hyperdrive interfaces

use std::error::Error;
use std::fmt::Display;

/// The error type returned by the contract interfaces
#[derive(Clone, Debug)]
pub enum RegistryError {
    /// Error thrown when the underlying chain connection fails
    Connection(String),
    /// Error thrown when a contract call fails
    ContractInteraction(String),
    /// Error thrown when the registry returns malformed data
    MalformedResponse(String),
    /// Error thrown when a write is attempted against a read-only client
    ReadOnly,
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
impl Error for RegistryError {}
