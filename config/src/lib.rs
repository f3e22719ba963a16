//! The darknode CLI and config definitions

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

mod cli;
mod parsing;

pub use cli::{Cli, KFraction, NodeConfig};
pub use parsing::parse_command_line_args;
