//! Direct-binary workload: the client binary lives in the service user's
//! home directory and runs under a systemd unit. Artifacts come from direct
//! download URLs, release tarballs or container images.

use async_trait::async_trait;
use std::path::Path;
use tracing::{info, warn};
use warden_common::layout::BinaryLayout;
use warden_common::{sys, ConfigurationError, ServiceError, WardenError};

use crate::{cmd, relay_for_parachain, systemd, wasm_info, Workload, WorkloadKind};

/// Where the client binary comes from.
#[derive(Debug, Clone)]
enum BinarySource {
    /// Direct download URL(s), optionally with detached sha256 URL(s).
    Url { urls: String, sha256_urls: Option<String> },
    /// Release tarball containing the client binary.
    Tarball { url: String },
    /// Container image tag to extract the binary from.
    Docker { tag: String },
}

pub struct BinaryWorkload {
    chain_name: String,
    source: BinarySource,
    layout: BinaryLayout,
}

impl BinaryWorkload {
    /// Validate the mechanism settings. Exactly one artifact source must be
    /// declared.
    pub fn configure(params: &crate::WorkloadParams) -> Result<Self, WardenError> {
        let source = match (&params.binary_url, &params.docker_tag) {
            (Some(_), Some(_)) => return Err(ConfigurationError::ConflictingSources.into()),
            (Some(url), None) => {
                if url.split_whitespace().count() == 1 && url.ends_with(".tar.gz") {
                    BinarySource::Tarball { url: url.clone() }
                } else {
                    BinarySource::Url {
                        urls: url.clone(),
                        sha256_urls: params.binary_sha256_url.clone(),
                    }
                }
            }
            (None, Some(tag)) => BinarySource::Docker { tag: tag.clone() },
            (None, None) => return Err(ConfigurationError::NoSourceSet.into()),
        };
        Ok(Self {
            chain_name: params.chain_name.clone(),
            source,
            layout: BinaryLayout::default(),
        })
    }

    #[cfg(test)]
    fn with_layout(mut self, layout: BinaryLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Create the service user and the directory tree artifacts land in.
    async fn prepare_home(&self) -> Result<(), WardenError> {
        if !cmd::succeeds(&["id", &self.layout.user]).await {
            let home = self.layout.home_dir.display().to_string();
            cmd::run_checked(&["useradd", "--system", "--create-home", "--home-dir", &home, &self.layout.user])
                .await?;
        }
        for dir in [&self.layout.home_dir, &self.layout.chain_spec_dir, &self.layout.wasm_dir] {
            if !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }
        sys::chown_recursive(&self.layout.home_dir, &self.layout.user);
        Ok(())
    }

    async fn install_binary(&self) -> Result<(), WardenError> {
        match &self.source {
            BinarySource::Url { urls, sha256_urls } => {
                let main_name = self
                    .layout
                    .binary_file
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "polkadot".to_string());
                let artifacts = warden_fetch::fetch_binary_set(
                    urls,
                    sha256_urls.as_deref(),
                    &self.chain_name,
                    &main_name,
                )
                .await?;
                warden_fetch::write_artifacts(&artifacts, &self.layout)?;
            }
            BinarySource::Tarball { url } => {
                warden_fetch::install_from_tarball(url, &self.chain_name, &self.layout).await?;
            }
            BinarySource::Docker { tag } => {
                warden_fetch::extract_from_docker(&self.chain_name, tag, &self.layout).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Workload for BinaryWorkload {
    fn kind(&self) -> WorkloadKind {
        WorkloadKind::Binary
    }

    async fn install(&self) -> Result<(), WardenError> {
        info!("Installing binary workload for chain {}", self.chain_name);
        self.prepare_home().await?;
        if self.is_service_installed().await {
            // Never overwrite a binary the supervisor may be executing.
            let _ = systemd::stop(&self.layout.service_name).await;
        }
        self.install_binary().await?;
        if !self.layout.env_file.exists() {
            systemd::create_env_file(&self.layout)?;
        }
        systemd::install_unit(&self.layout).await?;
        Ok(())
    }

    async fn uninstall(&self) -> Result<(), WardenError> {
        if self.is_service_installed().await {
            let _ = systemd::stop(&self.layout.service_name).await;
        }
        systemd::remove_unit(&self.layout).await?;
        if self.layout.binary_file.exists() {
            std::fs::remove_file(&self.layout.binary_file)?;
        }
        Ok(())
    }

    async fn start_service(&self) -> Result<(), WardenError> {
        systemd::start(&self.layout.service_name).await
    }

    async fn stop_service(&self) -> Result<(), WardenError> {
        systemd::stop(&self.layout.service_name).await
    }

    async fn restart_service(&self) -> Result<(), WardenError> {
        systemd::restart(&self.layout.service_name).await
    }

    async fn is_service_installed(&self) -> bool {
        self.layout.unit_file.exists()
    }

    async fn is_service_running(&self, iterations: u32) -> bool {
        systemd::wait_active(&self.layout.service_name, iterations).await
    }

    async fn get_service_args(&self) -> Result<String, WardenError> {
        systemd::read_args(&self.layout)
    }

    async fn set_service_args(&self, args: &str) -> Result<(), WardenError> {
        systemd::write_args(&self.layout, args)
    }

    async fn service_args_differ_from_disk(&self, candidate: &str) -> bool {
        systemd::args_differ(&self.layout, candidate)
    }

    async fn generate_node_key(&self) -> Result<(), WardenError> {
        if !self.layout.binary_file.exists() {
            return Err(ServiceError::NoBinaryForKey.into());
        }
        let binary = self.layout.binary_file.display().to_string();
        let key_file = self.layout.node_key_file.display().to_string();
        let mut argv = vec![binary.as_str(), "key", "generate-node-key", "--file", key_file.as_str()];
        // The Enjin client refuses to generate a key without a chain context.
        let version = cmd::output(&[&binary, "--version"]).await.unwrap_or_default();
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
        let binary = self.layout.binary_file.display().to_string();
        match cmd::output(&[&binary, "--version"]).await {
            Some(out) => sys::extract_version(&out).unwrap_or(out),
            None => String::new(),
        }
    }

    fn get_binary_md5sum(&self) -> String {
        sys::file_md5sum(&self.layout.binary_file)
    }

    fn get_binary_last_changed(&self) -> String {
        sys::file_last_changed(&self.layout.binary_file)
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
        let binary = self.layout.binary_file.display().to_string();
        cmd::output(&[&binary, "--help"]).await.unwrap_or_else(|| {
            warn!("Could not read help output from {}", binary);
            String::new()
        })
    }

    fn get_proc_cmdline(&self) -> String {
        sys::process_cmdline(
            &self
                .layout
                .binary_file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        )
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
    use tempfile::TempDir;

    fn params(binary_url: Option<&str>, docker_tag: Option<&str>) -> WorkloadParams {
        WorkloadParams {
            chain_name: "westend".to_string(),
            binary_url: binary_url.map(str::to_string),
            docker_tag: docker_tag.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn configure_requires_exactly_one_source() {
        assert!(BinaryWorkload::configure(&params(None, None)).is_err());
        assert!(BinaryWorkload::configure(&params(Some("https://host/polkadot"), Some("v1.0"))).is_err());
        assert!(BinaryWorkload::configure(&params(Some("https://host/polkadot"), None)).is_ok());
        assert!(BinaryWorkload::configure(&params(None, Some("v1.0"))).is_ok());
    }

    #[test]
    fn tarball_urls_select_the_tarball_source() {
        let workload =
            BinaryWorkload::configure(&params(Some("https://host/node-v1.tar.gz"), None)).unwrap();
        assert!(matches!(workload.source, BinarySource::Tarball { .. }));

        // Multiple URLs are always treated as direct downloads.
        let workload = BinaryWorkload::configure(&params(
            Some("https://host/a.tar.gz https://host/b.tar.gz"),
            None,
        ))
        .unwrap();
        assert!(matches!(workload.source, BinarySource::Url { .. }));
    }

    #[tokio::test]
    async fn parachain_heuristic_uses_db_directories() {
        let home = TempDir::new().unwrap();
        let layout = BinaryLayout::under(home.path());
        std::fs::create_dir_all(&layout.chain_db_dir).unwrap();
        std::fs::create_dir_all(&layout.relay_db_dir).unwrap();
        let workload = BinaryWorkload::configure(&params(Some("https://host/polkadot"), None))
            .unwrap()
            .with_layout(layout);
        assert!(workload.is_parachain_node().await);
    }

    #[tokio::test]
    async fn uninstall_on_absent_workload_is_a_noop() {
        let home = TempDir::new().unwrap();
        let workload = BinaryWorkload::configure(&params(Some("https://host/polkadot"), None))
            .unwrap()
            .with_layout(BinaryLayout::under(home.path()));
        workload.uninstall().await.unwrap();
        // A second pass must also succeed and leave nothing behind.
        workload.uninstall().await.unwrap();
        assert!(!workload.layout.unit_file.exists());
        assert!(!workload.layout.binary_file.exists());
    }

    #[tokio::test]
    async fn generate_node_key_requires_a_binary() {
        let home = TempDir::new().unwrap();
        let workload = BinaryWorkload::configure(&params(Some("https://host/polkadot"), None))
            .unwrap()
            .with_layout(BinaryLayout::under(home.path()));
        assert!(matches!(
            workload.generate_node_key().await,
            Err(WardenError::Service(ServiceError::NoBinaryForKey))
        ));
    }
}
