//! Uniform lifecycle contract over the two supported deployment mechanisms:
//! a direct binary supervised by a systemd unit, or a sandboxed snap
//! package. The reconciliation controller is written entirely against the
//! [`Workload`] trait and never branches on mechanism type.

mod binary;
mod cmd;
mod snap;
mod systemd;

pub use binary::BinaryWorkload;
pub use snap::SnapWorkload;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use warden_common::{chains, WardenError};

/// Seconds slept between service status polls, compensating for supervisor
/// propagation delay.
pub const POLL_INTERVAL_SECS: u64 = 5;

/// The active deployment mechanism, persisted in stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadKind {
    Binary,
    Snap,
}

impl std::fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkloadKind::Binary => write!(f, "binary"),
            WorkloadKind::Snap => write!(f, "snap"),
        }
    }
}

impl std::str::FromStr for WorkloadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" => Ok(WorkloadKind::Binary),
            "snap" => Ok(WorkloadKind::Snap),
            other => Err(format!("Unknown workload type: {other}")),
        }
    }
}

/// Mechanism-specific settings collected from the desired configuration.
/// Each implementation validates the fields it needs at construction.
#[derive(Debug, Clone, Default)]
pub struct WorkloadParams {
    pub chain_name: String,
    pub binary_url: Option<String>,
    pub binary_sha256_url: Option<String>,
    pub docker_tag: Option<String>,
    pub snap_name: Option<String>,
    pub snap_channel: Option<String>,
    pub snap_revision: Option<String>,
    pub snap_hold: bool,
    pub snap_endure: bool,
}

/// Construct and configure the workload handle for a mechanism.
pub fn configure_workload(
    kind: WorkloadKind,
    params: &WorkloadParams,
) -> Result<Box<dyn Workload>, WardenError> {
    match kind {
        WorkloadKind::Binary => Ok(Box::new(BinaryWorkload::configure(params)?)),
        WorkloadKind::Snap => Ok(Box::new(SnapWorkload::configure(params)?)),
    }
}

/// Lifecycle contract implemented by both deployment mechanisms.
///
/// `install` always leaves the service stopped regardless of mechanism so
/// the controller's start ordering is uniform; `uninstall` on an absent
/// workload is a no-op.
#[async_trait]
pub trait Workload: Send + Sync {
    fn kind(&self) -> WorkloadKind;

    /// Fetch/ensure the artifact and service registration. The service is
    /// stopped during installation and stays stopped; the caller starts it.
    async fn install(&self) -> Result<(), WardenError>;

    /// Stop if running, then remove the artifact and service registration.
    /// Idempotent.
    async fn uninstall(&self) -> Result<(), WardenError>;

    async fn start_service(&self) -> Result<(), WardenError>;
    async fn stop_service(&self) -> Result<(), WardenError>;
    async fn restart_service(&self) -> Result<(), WardenError>;

    async fn is_service_installed(&self) -> bool;

    /// Poll the supervisor up to `iterations` times, sleeping
    /// [`POLL_INTERVAL_SECS`] between attempts.
    async fn is_service_running(&self, iterations: u32) -> bool;

    /// Read the argument string from the mechanism's canonical storage.
    async fn get_service_args(&self) -> Result<String, WardenError>;

    /// Persist the argument string to the mechanism's canonical storage.
    async fn set_service_args(&self, args: &str) -> Result<(), WardenError>;

    /// Whether `candidate` differs from what is stored on disk, after
    /// applying the same normalization `set_service_args` would.
    async fn service_args_differ_from_disk(&self, candidate: &str) -> bool;

    /// Generate the node identity key via the client's key subcommand,
    /// written with 0600 permissions and mechanism ownership.
    async fn generate_node_key(&self) -> Result<(), WardenError>;

    /// Write an operator-supplied node key verbatim.
    fn write_node_key_file(&self, key: &str) -> Result<(), WardenError>;

    async fn get_binary_version(&self) -> String;
    fn get_binary_md5sum(&self) -> String;
    fn get_binary_last_changed(&self) -> String;
    fn get_wasm_info(&self) -> String;
    async fn download_wasm_runtime(&self, url: &str) -> Result<(), WardenError>;
    fn get_chain_disk_usage(&self) -> String;
    fn get_relay_disk_usage(&self) -> String;
    async fn get_help_output(&self) -> String;
    fn get_proc_cmdline(&self) -> String;

    /// Heuristic: a chain db and a relay db both on disk, or a client
    /// advertising a collator flag. Kept behind this single method so an
    /// explicit chain-type declaration can replace it per mechanism.
    async fn is_parachain_node(&self) -> bool;

    async fn is_relay_chain_node(&self) -> bool {
        !self.is_parachain_node().await
    }

    async fn get_relay_for_parachain(&self) -> String;

    /// Hold back automatic package refreshes. No-op for mechanisms without
    /// the concept.
    async fn set_hold(&self, _value: bool) -> Result<(), WardenError> {
        Ok(())
    }

    /// Keep the service running across package refreshes. No-op for
    /// mechanisms without the concept.
    async fn set_endure(&self, _value: bool) -> Result<(), WardenError> {
        Ok(())
    }

    /// Path the node identity key lives at for this mechanism.
    fn node_key_file(&self) -> &Path;

    /// Directory chain-spec files are persisted under.
    fn spec_dir(&self) -> &Path;

    /// Directory wasm runtime overrides live under.
    fn wasm_dir(&self) -> &Path;

    /// Owner of files written for this mechanism.
    fn owner(&self) -> &str;
}

/// Classify the relay chain a parachain connects to by inspecting the
/// single subdirectory of the relay database.
pub(crate) fn relay_for_parachain(relay_db_dir: &Path) -> String {
    let chains_dir = relay_db_dir.join("chains");
    let subdirs: Vec<PathBuf> = match std::fs::read_dir(&chains_dir) {
        Ok(entries) => entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect(),
        Err(_) => return "Error finding Relay Chain".to_string(),
    };
    if subdirs.len() != 1 {
        return "Error finding Relay Chain DB directory".to_string();
    }
    let dir_name = subdirs[0].display().to_string();
    match chains::relay_name_from_db_dir(&dir_name) {
        Some(name) => name.to_string(),
        None => dir_name,
    }
}

/// Wasm override files currently installed, as a comma-joined list.
pub(crate) fn wasm_info(wasm_dir: &Path) -> String {
    if !wasm_dir.exists() {
        return format!("{} directory not found", wasm_dir.display());
    }
    let files: Vec<String> = match std::fs::read_dir(wasm_dir) {
        Ok(entries) => entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "wasm"))
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .collect(),
        Err(_) => Vec::new(),
    };
    if files.is_empty() {
        return format!("No wasm files found in {}", wasm_dir.display());
    }
    files.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn workload_kind_round_trips_through_strings() {
        for kind in [WorkloadKind::Binary, WorkloadKind::Snap] {
            assert_eq!(kind.to_string().parse::<WorkloadKind>().unwrap(), kind);
        }
        assert!("deb".parse::<WorkloadKind>().is_err());
    }

    #[test]
    fn relay_classification_from_db_tree() {
        let root = TempDir::new().unwrap();
        let relay_db = root.path().join("polkadot");
        std::fs::create_dir_all(relay_db.join("chains/westend2")).unwrap();
        assert_eq!(relay_for_parachain(&relay_db), "Westend");

        std::fs::create_dir_all(relay_db.join("chains/ksmcc3")).unwrap();
        assert!(relay_for_parachain(&relay_db).contains("Error finding Relay Chain DB"));
    }

    #[test]
    fn wasm_info_lists_only_wasm_files() {
        let root = TempDir::new().unwrap();
        let wasm_dir = root.path().join("wasm");
        std::fs::create_dir_all(&wasm_dir).unwrap();
        assert!(wasm_info(&wasm_dir).starts_with("No wasm files"));

        std::fs::write(wasm_dir.join("runtime-v100.wasm"), b"\0asm").unwrap();
        std::fs::write(wasm_dir.join("notes.txt"), b"ignore me").unwrap();
        assert_eq!(wasm_info(&wasm_dir), "runtime-v100.wasm");
    }
}
