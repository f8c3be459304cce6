//! On-disk layouts for the two workload mechanisms.
//!
//! The binary mechanism keeps everything under the service user's home
//! directory, the snap mechanism under the snap's common directory. Both
//! layouts can be re-rooted, which is what the tests do.

use std::path::{Path, PathBuf};

/// System user owning the direct-binary deployment.
pub const SERVICE_USER: &str = "polkadot";

/// Owner of files under the snap common directory.
pub const SNAP_USER: &str = "root";

/// Snap names this operator knows how to manage.
pub const SUPPORTED_SNAPS: &[&str] = &["polkadot", "polkadot-parachain"];

/// Layout of a direct-binary deployment with a systemd unit.
#[derive(Debug, Clone)]
pub struct BinaryLayout {
    pub home_dir: PathBuf,
    pub binary_file: PathBuf,
    pub chain_spec_dir: PathBuf,
    pub node_key_file: PathBuf,
    pub chain_db_dir: PathBuf,
    pub relay_db_dir: PathBuf,
    pub wasm_dir: PathBuf,
    /// Env file read by the systemd unit, holds `POLKADOT_CLI_ARGS='...'`.
    pub env_file: PathBuf,
    pub unit_file: PathBuf,
    pub service_name: String,
    pub user: String,
}

impl BinaryLayout {
    /// Layout rooted entirely at an arbitrary home directory, including the
    /// env and unit files normally living under /etc.
    pub fn under<P: AsRef<Path>>(home: P) -> Self {
        let home = home.as_ref().to_path_buf();
        Self {
            binary_file: home.join("polkadot"),
            chain_spec_dir: home.join("spec"),
            node_key_file: home.join("node-key"),
            chain_db_dir: home.join(".local/share/polkadot/chains"),
            relay_db_dir: home.join(".local/share/polkadot/polkadot"),
            wasm_dir: home.join("wasm"),
            env_file: home.join(format!("default-{SERVICE_USER}")),
            unit_file: home.join(format!("{SERVICE_USER}.service")),
            service_name: SERVICE_USER.to_string(),
            user: SERVICE_USER.to_string(),
            home_dir: home,
        }
    }

    /// Root of the node's database tree, moved wholesale on migration.
    pub fn data_dir(&self) -> PathBuf {
        self.home_dir.join(".local/share/polkadot")
    }
}

impl Default for BinaryLayout {
    fn default() -> Self {
        let mut layout = Self::under("/home/polkadot");
        layout.env_file = PathBuf::from(format!("/etc/default/{SERVICE_USER}"));
        layout.unit_file = PathBuf::from(format!("/etc/systemd/system/{SERVICE_USER}.service"));
        layout
    }
}

/// Layout of a snap deployment.
#[derive(Debug, Clone)]
pub struct SnapLayout {
    pub snap_name: String,
    pub service_name: String,
    /// Command run through `snap run` to reach the client CLI.
    pub cli_command: String,
    pub base_path: PathBuf,
    pub snap_binary_path: PathBuf,
    pub chain_spec_dir: PathBuf,
    pub chain_db_dir: PathBuf,
    pub relay_db_dir: PathBuf,
    pub wasm_dir: PathBuf,
    pub node_key_file: PathBuf,
    pub user: String,
}

impl SnapLayout {
    /// Layout for a supported snap name, or `None` if unknown.
    pub fn for_name(snap_name: &str) -> Option<Self> {
        let cli_command = match snap_name {
            "polkadot" => "polkadot.polkadot-cli",
            "polkadot-parachain" => "polkadot-parachain.cli",
            _ => return None,
        };
        let common = PathBuf::from(format!("/var/snap/{snap_name}/common"));
        let base = common.join("polkadot_base");
        Some(Self {
            service_name: snap_name.to_string(),
            cli_command: cli_command.to_string(),
            snap_binary_path: PathBuf::from(format!("/snap/{snap_name}/current/bin/{snap_name}")),
            chain_spec_dir: base.join("spec"),
            chain_db_dir: base.join("chains"),
            relay_db_dir: base.join("polkadot"),
            wasm_dir: base.join("wasm"),
            node_key_file: common.join("node-key"),
            base_path: base,
            user: SNAP_USER.to_string(),
            snap_name: snap_name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_snaps_have_layouts() {
        for name in SUPPORTED_SNAPS {
            let layout = SnapLayout::for_name(name).unwrap();
            assert_eq!(layout.snap_name, *name);
            assert!(layout.base_path.starts_with(format!("/var/snap/{name}")));
        }
    }

    #[test]
    fn unknown_snap_has_no_layout() {
        assert!(SnapLayout::for_name("bitcoin").is_none());
    }

    #[test]
    fn binary_layout_reroots() {
        let layout = BinaryLayout::under("/tmp/test-home");
        assert_eq!(layout.binary_file, PathBuf::from("/tmp/test-home/polkadot"));
        assert_eq!(layout.data_dir(), PathBuf::from("/tmp/test-home/.local/share/polkadot"));
        assert!(layout.env_file.starts_with("/tmp/test-home"));
        assert!(layout.unit_file.starts_with("/tmp/test-home"));
    }

    #[test]
    fn default_binary_layout_uses_system_paths() {
        let layout = BinaryLayout::default();
        assert_eq!(layout.env_file, PathBuf::from("/etc/default/polkadot"));
        assert_eq!(layout.unit_file, PathBuf::from("/etc/systemd/system/polkadot.service"));
    }
}
