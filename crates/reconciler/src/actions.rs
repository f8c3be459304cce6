//! Operator-invoked actions that run outside the reconciliation loop.

use serde::Serialize;
use warden_common::{ConfigurationError, WardenError};
use warden_migrate::{migrate_node_key, DataMigrator, KeyMigrationOutcome, MigrationOutcome};
use warden_rpc::{NodeRpc, UNSAFE_RPC_MARKER};
use warden_workload::Workload;

/// Rotate the node's session keys, returning the new public key blob for
/// the operator to register on chain.
pub async fn get_session_key(rpc: &NodeRpc) -> Result<String, WardenError> {
    Ok(rpc.rotate_session_keys().await?)
}

/// Whether the node currently holds the given session key blob.
pub async fn has_session_key(rpc: &NodeRpc, key: &str) -> Result<bool, WardenError> {
    if !key.starts_with("0x") {
        return Err(
            ConfigurationError::Invalid("Session key must start with '0x'".to_string()).into()
        );
    }
    Ok(rpc.has_session_key(key).await?)
}

/// Insert a keystore key from a mnemonic and its public address.
pub async fn insert_key(rpc: &NodeRpc, mnemonic: &str, address: &str) -> Result<(), WardenError> {
    if !address.starts_with("0x") {
        return Err(
            ConfigurationError::Invalid("Address must start with '0x'".to_string()).into()
        );
    }
    Ok(rpc.insert_key(mnemonic, address).await?)
}

pub async fn restart_node(workload: &dyn Workload) -> Result<(), WardenError> {
    workload.restart_service().await
}

/// Replace the node identity key with an operator-supplied one. The service
/// is stopped for the swap so the running process never observes a partial
/// key file.
pub async fn set_node_key(workload: &dyn Workload, key: &str) -> Result<(), WardenError> {
    workload.stop_service().await?;
    workload.write_node_key_file(key)?;
    workload.start_service().await
}

/// Diagnostic snapshot of the managed node.
#[derive(Debug, Serialize)]
pub struct NodeInfo {
    pub version: String,
    pub binary_md5sum: String,
    pub binary_last_changed: String,
    pub wasm_info: String,
    pub chain_disk_usage: String,
    pub relay_disk_usage: String,
    pub proc_cmdline: String,
    /// Arguments as stored at the mechanism's canonical location.
    pub service_args: Option<String>,
    /// Relay network a parachain connects to; absent for relay-chain nodes.
    pub relay_chain: Option<String>,
    /// Best block height, absent while the node is unreachable.
    pub best_block: Option<u64>,
    pub connected_peers: Option<String>,
}

pub async fn get_node_info(workload: &dyn Workload, rpc: &NodeRpc) -> NodeInfo {
    let relay_chain = if workload.is_parachain_node().await {
        Some(workload.get_relay_for_parachain().await)
    } else {
        None
    };
    // The running client reports its version over RPC; fall back to the
    // on-disk binary when the node is unreachable.
    let version = match rpc.version().await {
        Ok(version) => version,
        Err(_) => workload.get_binary_version().await,
    };
    let connected_peers = match rpc.system_peers().await {
        Ok(peers) => Some(peers.len().to_string()),
        Err(e) if e.to_string().contains(UNSAFE_RPC_MARKER) => {
            Some("Enable '--rpc-methods unsafe' to see peer info".to_string())
        }
        Err(_) => None,
    };
    NodeInfo {
        version,
        binary_md5sum: workload.get_binary_md5sum(),
        binary_last_changed: workload.get_binary_last_changed(),
        wasm_info: workload.get_wasm_info(),
        chain_disk_usage: workload.get_chain_disk_usage(),
        relay_disk_usage: workload.get_relay_disk_usage(),
        proc_cmdline: workload.get_proc_cmdline(),
        service_args: workload.get_service_args().await.ok(),
        relay_chain,
        best_block: rpc.block_height().await.ok(),
        connected_peers,
    }
}

/// Migrate the chain database between the legacy and snap layouts.
pub fn migrate_data(dry_run: bool, reverse: bool) -> Result<MigrationOutcome, WardenError> {
    Ok(DataMigrator::new(None, None, reverse).move_data(dry_run)?)
}

/// Migrate the node identity key between the legacy and snap locations.
pub fn migrate_key(dry_run: bool, reverse: bool) -> Result<KeyMigrationOutcome, WardenError> {
    Ok(migrate_node_key(None, None, dry_run, reverse)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_key_must_be_hex_prefixed() {
        let rpc = NodeRpc::new(9944);
        let err = has_session_key(&rpc, "deadbeef").await.unwrap_err();
        assert!(err.to_string().contains("0x"));
    }

    #[tokio::test]
    async fn insert_key_rejects_bare_address() {
        let rpc = NodeRpc::new(9944);
        let err = insert_key(&rpc, "word word word", "deadbeef").await.unwrap_err();
        assert!(err.to_string().contains("0x"));
    }
}
