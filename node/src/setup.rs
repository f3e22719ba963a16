//! Node setup: identity loading, bind checks, and registry construction

use std::fs;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use common::types::identity::NodeId;
use config::NodeConfig;
use rand::RngCore;
use registry_client::mock::MockRegistry;
use registry_client::DarknodeRegistry;
use tracing::{info, warn};
use util::err_str;

use crate::error::CoordinatorError;

/// The interval at which the devnet registry advances epochs
const DEVNET_EPOCH_INTERVAL: Duration = Duration::from_secs(30);

/// Load the node's identity from its key file, or generate an ephemeral one
pub fn load_node_id(config: &NodeConfig) -> Result<NodeId, CoordinatorError> {
    let Some(path) = &config.key_file else {
        warn!("no key file configured; generating an ephemeral identity");
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        return Ok(NodeId::from_pubkey(&seed));
    };

    let contents = fs::read_to_string(path)
        .map_err(|e| CoordinatorError::KeyLoad(format!("cannot read {}: {e}", path.display())))?;
    let bytes = hex::decode(contents.trim()).map_err(err_str!(CoordinatorError::KeyLoad))?;
    if bytes.len() != 32 {
        return Err(CoordinatorError::KeyLoad(format!(
            "expected 32 bytes of key material, got {}",
            bytes.len(),
        )));
    }

    Ok(NodeId::from_pubkey(&bytes))
}

/// Check that the configured RPC address is bindable
///
/// The listener itself is owned by the external RPC surface; the check
/// surfaces bind failures at startup rather than after workers have spun up
pub fn check_bind(config: &NodeConfig) -> Result<(), CoordinatorError> {
    TcpListener::bind((config.bind_addr.as_str(), config.port)).map_err(|e| {
        CoordinatorError::Bind(format!(
            "cannot bind {}:{}: {e}",
            config.bind_addr, config.port,
        ))
    })?;

    Ok(())
}

/// Construct the registry client
///
/// The chain bindings are provided by the host deployment; this build links
/// only the in-process devnet registry, selected when no registry URL is
/// configured
pub fn build_registry(
    config: &NodeConfig,
    local_node_id: NodeId,
) -> Result<Arc<dyn DarknodeRegistry>, CoordinatorError> {
    if let Some(url) = &config.registry_url {
        return Err(CoordinatorError::Registry(format!(
            "cannot reach registry at {url}: no chain bindings are linked into this build",
        )));
    }

    info!("running against the in-process devnet registry");
    let registry = MockRegistry::new(vec![local_node_id]);
    spawn_devnet_driver(registry.clone());

    Ok(Arc::new(registry))
}

/// Advance the devnet registry's epochs on a fixed interval
fn spawn_devnet_driver(registry: MockRegistry) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(DEVNET_EPOCH_INTERVAL);
        // The immediate first tick would re-emit the genesis epoch
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let epoch = registry.advance_epoch();
            info!("devnet epoch advanced to block {}", epoch.blocknumber);
        }
    });
}
