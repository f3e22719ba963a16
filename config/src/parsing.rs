//! Parsing logic for the config

use std::{env, fs};

use clap::Parser;
use serde_json::Value;

use crate::cli::{Cli, NodeConfig};

/// The CLI argument name for the config file
const CONFIG_FILE_ARG: &str = "--config-file";

/// Parses command line args into the node config
///
/// Configuration options may come from both a config file and overrides on
/// the command line directly. Config file entries are prepended to the cli
/// args so that command line arguments, which come after them, take
/// precedence.
pub fn parse_command_line_args() -> Result<NodeConfig, String> {
    let mut command_line_args: Vec<String> = env::args().collect();
    let config_file_args = config_file_args(&command_line_args)?;

    let mut full_args = vec![command_line_args.remove(0)];
    full_args.extend(config_file_args);
    full_args.extend(command_line_args);

    let cli = Cli::try_parse_from(full_args).map_err(|e| e.to_string())?;
    Ok(NodeConfig::from(cli))
}

/// Read the config file named on the command line, if any, and flatten its
/// entries into `--key value` argument pairs
fn config_file_args(cli_args: &[String]) -> Result<Vec<String>, String> {
    let Some(path) = find_config_file(cli_args) else {
        return Ok(vec![]);
    };

    let contents =
        fs::read_to_string(&path).map_err(|e| format!("cannot read config file {path}: {e}"))?;
    let parsed: Value =
        serde_json::from_str(&contents).map_err(|e| format!("malformed config file: {e}"))?;
    let entries = parsed
        .as_object()
        .ok_or_else(|| "config file must hold a top-level object".to_string())?;

    let mut args = Vec::with_capacity(2 * entries.len());
    for (key, value) in entries {
        args.push(format!("--{}", key.replace('_', "-")));
        match value {
            Value::String(s) => args.push(s.clone()),
            Value::Number(n) => args.push(n.to_string()),
            Value::Bool(b) => args.push(b.to_string()),
            _ => return Err(format!("unsupported config value for key {key}")),
        }
    }

    Ok(args)
}

/// Find the config file path among the raw command line arguments
fn find_config_file(cli_args: &[String]) -> Option<String> {
    let mut args = cli_args.iter();
    while let Some(arg) = args.next() {
        if arg == CONFIG_FILE_ARG {
            return args.next().cloned();
        }
        if let Some(path) = arg.strip_prefix(&format!("{CONFIG_FILE_ARG}=")) {
            return Some(path.to_string());
        }
    }

    None
}
