//! Snap workload: the client ships as a strictly confined snap package with
//! its own service management. Arguments are stored in the snap's
//! configuration under `service-args`, and the snap daemon handles refreshes
//! unless a hold is requested.

use async_trait::async_trait;
use std::path::Path;
use tokio::time::{sleep, Duration};
use tracing::info;
use warden_common::layout::{SnapLayout, SUPPORTED_SNAPS};
use warden_common::{sys, ConfigurationError, ServiceError, WardenError};

use crate::{cmd, relay_for_parachain, wasm_info, Workload, WorkloadKind, POLL_INTERVAL_SECS};

/// Interfaces the client needs beyond the strict-confinement defaults.
const PLUGS: &[&str] = &["hardware-observe", "system-observe", "removable-media"];

#[derive(Debug)]
pub struct SnapWorkload {
    layout: SnapLayout,
    channel: Option<String>,
    revision: Option<String>,
    hold: bool,
    endure: bool,
}

impl SnapWorkload {
    /// Validate the mechanism settings. Only known snap names are accepted.
    pub fn configure(params: &crate::WorkloadParams) -> Result<Self, WardenError> {
        let name = params.snap_name.as_deref().ok_or(ConfigurationError::NoSourceSet)?;
        let layout = SnapLayout::for_name(name).ok_or_else(|| ConfigurationError::UnsupportedSnap {
            name: name.to_string(),
            supported: SUPPORTED_SNAPS.to_vec(),
        })?;
        Ok(Self {
            layout,
            channel: params.snap_channel.clone(),
            revision: params.snap_revision.clone(),
            hold: params.snap_hold,
            endure: params.snap_endure,
        })
    }

    async fn snap_is_installed(&self) -> bool {
        cmd::succeeds(&["snap", "list", &self.layout.snap_name]).await
    }

    /// Install or refresh to the declared channel/revision.
    async fn ensure_revision(&self) -> Result<(), WardenError> {
        let verb = if self.snap_is_installed().await { "refresh" } else { "install" };
        let mut argv = vec!["snap", verb, self.layout.snap_name.as_str()];
        let pin = if let Some(revision) = &self.revision {
            Some(format!("--revision={revision}"))
        } else {
            self.channel.as_ref().map(|channel| format!("--channel={channel}"))
        };
        if let Some(pin) = &pin {
            argv.push(pin.as_str());
        }
        cmd::run_checked(&argv).await
    }

    async fn connect_plugs(&self) {
        for plug in PLUGS {
            let plug = format!("{}:{}", self.layout.snap_name, plug);
            // Already-connected plugs make this fail harmlessly.
            cmd::run_unchecked(&["snap", "connect", &plug]).await;
        }
    }

    async fn cli_output(&self, args: &[&str]) -> Option<String> {
        let mut argv = vec!["snap", "run", self.layout.cli_command.as_str()];
        argv.extend_from_slice(args);
        cmd::output(&argv).await
    }

    /// Arguments as the snap stores them: the base path flag is injected
    /// when the operator did not supply one, since the snap's data must
    /// stay inside its common directory.
    fn normalize_args(&self, args: &str) -> String {
        if args.contains("--base-path") {
            return args.to_string();
        }
        format!("{} --base-path {}", args, self.layout.base_path.display())
    }
}

#[async_trait]
impl Workload for SnapWorkload {
    fn kind(&self) -> WorkloadKind {
        WorkloadKind::Snap
    }

    async fn install(&self) -> Result<(), WardenError> {
        info!("Installing snap {}", self.layout.snap_name);
        self.ensure_revision().await?;
        self.connect_plugs().await;
        self.set_hold(self.hold).await?;
        self.set_endure(self.endure).await?;
        // Installation may auto-start the service; the caller decides when
        // it actually starts.
        let _ = self.stop_service().await;
        Ok(())
    }

    async fn uninstall(&self) -> Result<(), WardenError> {
        if !self.snap_is_installed().await {
            return Ok(());
        }
        let _ = self.stop_service().await;
        // The snap stays on disk so its database survives a mechanism
        // switch; disabling keeps it inert.
        cmd::run_checked(&["snap", "disable", &self.layout.snap_name]).await
    }

    async fn start_service(&self) -> Result<(), WardenError> {
        info!("Starting {} snap service", self.layout.snap_name);
        if !cmd::succeeds(&["snap", "start", "--enable", &self.layout.service_name]).await {
            return Err(ServiceError::Start(format!("snap start {} failed", self.layout.service_name)).into());
        }
        Ok(())
    }

    async fn stop_service(&self) -> Result<(), WardenError> {
        info!("Stopping {} snap service", self.layout.snap_name);
        if !cmd::succeeds(&["snap", "stop", "--disable", &self.layout.service_name]).await {
            return Err(ServiceError::Stop(format!("snap stop {} failed", self.layout.service_name)).into());
        }
        Ok(())
    }

    async fn restart_service(&self) -> Result<(), WardenError> {
        if !cmd::succeeds(&["snap", "restart", &self.layout.service_name]).await {
            return Err(ServiceError::Restart(format!("snap restart {} failed", self.layout.service_name)).into());
        }
        Ok(())
    }

    async fn is_service_installed(&self) -> bool {
        self.snap_is_installed().await
    }

    async fn is_service_running(&self, iterations: u32) -> bool {
        for i in 0..iterations.max(1) {
            let services = cmd::output(&["snap", "services", &self.layout.snap_name])
                .await
                .unwrap_or_default();
            if services.lines().any(|line| {
                line.starts_with(&self.layout.snap_name) && line.split_whitespace().nth(2) == Some("active")
            }) {
                return true;
            }
            if i + 1 < iterations {
                sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;
            }
        }
        false
    }

    async fn get_service_args(&self) -> Result<String, WardenError> {
        cmd::output(&["snap", "get", &self.layout.snap_name, "service-args"])
            .await
            .ok_or_else(|| ServiceError::ReadArgs("snap get failed".to_string()).into())
    }

    async fn set_service_args(&self, args: &str) -> Result<(), WardenError> {
        let assignment = format!("service-args={}", self.normalize_args(args));
        cmd::run_checked(&["snap", "set", &self.layout.snap_name, &assignment])
            .await
            .map_err(|e| ServiceError::WriteArgs(e.to_string()).into())
    }

    async fn service_args_differ_from_disk(&self, candidate: &str) -> bool {
        match self.get_service_args().await {
            Ok(stored) => stored != self.normalize_args(candidate),
            Err(_) => true,
        }
    }

    async fn generate_node_key(&self) -> Result<(), WardenError> {
        if !self.snap_is_installed().await {
            return Err(ServiceError::NoBinaryForKey.into());
        }
        let key_file = self.layout.node_key_file.display().to_string();
        let mut argv = vec![
            "snap",
            "run",
            self.layout.cli_command.as_str(),
            "key",
            "generate-node-key",
            "--file",
            key_file.as_str(),
        ];
        let version = self.cli_output(&["--version"]).await.unwrap_or_default();
        if version.to_lowercase().contains("enjin") {
            argv.extend(["--chain", "enjin"]);
        }
        cmd::run_checked(&argv).await?;
        sys::chown(&self.layout.node_key_file, &self.layout.user);
        sys::set_mode(&self.layout.node_key_file, 0o600)?;
        Ok(())
    }

    fn write_node_key_file(&self, key: &str) -> Result<(), WardenError> {
        sys::write_key_file(&self.layout.node_key_file, key, &self.layout.user)?;
        Ok(())
    }

    async fn get_binary_version(&self) -> String {
        match self.cli_output(&["--version"]).await {
            Some(out) => sys::extract_version(&out).unwrap_or(out),
            None => String::new(),
        }
    }

    fn get_binary_md5sum(&self) -> String {
        sys::file_md5sum(&self.layout.snap_binary_path)
    }

    fn get_binary_last_changed(&self) -> String {
        sys::file_last_changed(&self.layout.snap_binary_path)
    }

    fn get_wasm_info(&self) -> String {
        wasm_info(&self.layout.wasm_dir)
    }

    async fn download_wasm_runtime(&self, url: &str) -> Result<(), WardenError> {
        warden_fetch::download_wasm_runtime(url, &self.layout.wasm_dir, &self.layout.user).await
    }

    fn get_chain_disk_usage(&self) -> String {
        sys::disk_usage(&self.layout.chain_db_dir)
    }

    fn get_relay_disk_usage(&self) -> String {
        sys::disk_usage(&self.layout.relay_db_dir)
    }

    async fn get_help_output(&self) -> String {
        self.cli_output(&["--help"]).await.unwrap_or_default()
    }

    fn get_proc_cmdline(&self) -> String {
        sys::process_cmdline(&self.layout.snap_name)
    }

    async fn is_parachain_node(&self) -> bool {
        if self.layout.chain_db_dir.exists() && self.layout.relay_db_dir.exists() {
            return true;
        }
        self.get_help_output().await.contains("--collator")
    }

    async fn get_relay_for_parachain(&self) -> String {
        relay_for_parachain(&self.layout.relay_db_dir)
    }

    async fn set_hold(&self, value: bool) -> Result<(), WardenError> {
        let flag = if value { "--hold" } else { "--unhold" };
        cmd::run_checked(&["snap", "refresh", &self.layout.snap_name, flag]).await
    }

    async fn set_endure(&self, value: bool) -> Result<(), WardenError> {
        let assignment = format!("endure={value}");
        cmd::run_checked(&["snap", "set", &self.layout.snap_name, &assignment]).await
    }

    fn node_key_file(&self) -> &Path {
        &self.layout.node_key_file
    }

    fn spec_dir(&self) -> &Path {
        &self.layout.chain_spec_dir
    }

    fn wasm_dir(&self) -> &Path {
        &self.layout.wasm_dir
    }

    fn owner(&self) -> &str {
        &self.layout.user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WorkloadParams;

    fn params(snap_name: &str) -> WorkloadParams {
        WorkloadParams {
            chain_name: "polkadot".to_string(),
            snap_name: Some(snap_name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn configure_rejects_unknown_snaps() {
        let err = SnapWorkload::configure(&params("bitcoin")).unwrap_err();
        assert!(matches!(
            err,
            WardenError::Configuration(ConfigurationError::UnsupportedSnap { .. })
        ));
        assert!(SnapWorkload::configure(&params("polkadot")).is_ok());
        assert!(SnapWorkload::configure(&params("polkadot-parachain")).is_ok());
    }

    #[test]
    fn base_path_is_injected_when_absent() {
        let workload = SnapWorkload::configure(&params("polkadot")).unwrap();
        assert_eq!(
            workload.normalize_args("--chain westend --rpc-port 9944"),
            "--chain westend --rpc-port 9944 --base-path /var/snap/polkadot/common/polkadot_base"
        );
        let explicit = "--chain westend --rpc-port 9944 --base-path /data";
        assert_eq!(workload.normalize_args(explicit), explicit);
    }
}
