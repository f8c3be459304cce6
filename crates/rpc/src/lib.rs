//! JSON-RPC client for the managed node's control interface. Used for
//! read-only health and version queries during status updates, and for the
//! session-key actions. All failures are `RpcError`, which the controller
//! treats as a transient condition.

mod session_keys;

pub use session_keys::{name_session_keys, split_session_key};

use serde_json::{json, Value};
use std::time::Duration;
use warden_common::RpcError;

/// Error message substring returned when a method needs
/// `--rpc-methods unsafe`.
pub const UNSAFE_RPC_MARKER: &str = "RPC call is unsafe";

pub struct NodeRpc {
    url: String,
    client: reqwest::Client,
}

impl NodeRpc {
    pub fn new(rpc_port: u16) -> Self {
        Self {
            url: format!("http://localhost:{rpc_port}"),
            client: reqwest::Client::new(),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });
        let response = self
            .client
            .post(&self.url)
            .timeout(Duration::from_secs(10))
            .json(&payload)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| RpcError::Protocol(e.to_string()))?;
        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(RpcError::Server(message.to_string()));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| RpcError::Protocol("missing result field".to_string()))
    }

    /// Rotate session keys, returning the concatenated public key blob.
    pub async fn rotate_session_keys(&self) -> Result<String, RpcError> {
        let result = self.call("author_rotateKeys", json!([])).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RpcError::Protocol("author_rotateKeys returned non-string".to_string()))
    }

    /// Whether the node currently holds the given session key blob.
    pub async fn has_session_key(&self, session_key: &str) -> Result<bool, RpcError> {
        let result = self.call("author_hasSessionKeys", json!([session_key])).await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    /// Insert a key into the node keystore.
    pub async fn insert_key(&self, mnemonic: &str, address: &str) -> Result<(), RpcError> {
        self.call("author_insertKey", json!(["aura", mnemonic, address])).await?;
        Ok(())
    }

    /// Whether the node is still syncing; false means ready for validator
    /// duty.
    pub async fn is_syncing(&self) -> Result<bool, RpcError> {
        let result = self.call("system_health", json!([])).await?;
        result
            .get("isSyncing")
            .and_then(Value::as_bool)
            .ok_or_else(|| RpcError::Protocol("system_health missing isSyncing".to_string()))
    }

    /// Whether the node runs with the Authority role.
    pub async fn is_validating(&self) -> Result<bool, RpcError> {
        let result = self.call("system_nodeRoles", json!([])).await?;
        Ok(result
            .as_array()
            .and_then(|roles| roles.first())
            .and_then(Value::as_str)
            == Some("Authority"))
    }

    /// Client version as reported over RPC, reduced to the numeric part.
    pub async fn version(&self) -> Result<String, RpcError> {
        let result = self.call("system_version", json!([])).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| RpcError::Protocol("system_version returned non-string".to_string()))?;
        warden_common::sys::extract_version(raw)
            .ok_or_else(|| RpcError::Protocol(format!("unparseable version: {raw}")))
    }

    /// Current best block height.
    pub async fn block_height(&self) -> Result<u64, RpcError> {
        let result = self.call("chain_getHeader", json!([])).await?;
        let number = result
            .get("number")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::Protocol("chain_getHeader missing number".to_string()))?;
        u64::from_str_radix(number.trim_start_matches("0x"), 16)
            .map_err(|e| RpcError::Protocol(format!("bad block number {number}: {e}")))
    }

    /// Connected peer list. Requires `--rpc-methods unsafe` on the node;
    /// without it the server error carries [`UNSAFE_RPC_MARKER`].
    pub async fn system_peers(&self) -> Result<Vec<Value>, RpcError> {
        let result = self.call("system_peers", json!([])).await?;
        result
            .as_array()
            .cloned()
            .ok_or_else(|| RpcError::Protocol("system_peers returned non-array".to_string()))
    }
}
