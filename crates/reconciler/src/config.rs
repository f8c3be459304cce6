//! Operator-declared desired state.

use serde::Deserialize;
use warden_common::ConfigurationError;
use warden_workload::{WorkloadKind, WorkloadParams};

/// The declared target state for one managed node. Exactly one deployment
/// source (binary URL, container tag or snap name) may be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DesiredConfig {
    /// Raw argument string for the node process.
    pub service_args: String,
    pub binary_url: Option<String>,
    pub binary_sha256_url: Option<String>,
    pub docker_tag: Option<String>,
    pub snap_name: Option<String>,
    pub snap_channel: Option<String>,
    pub snap_revision: Option<String>,
    pub snap_hold: bool,
    pub snap_endure: bool,
    pub chain_spec_url: Option<String>,
    pub relaychain_spec_url: Option<String>,
    pub wasm_runtime_url: Option<String>,
    /// Operator-held mnemonic used by the insert-key action when no
    /// mnemonic is passed explicitly.
    pub mnemonic_secret: Option<String>,
}

impl DesiredConfig {
    /// Which mechanism the declared source selects. Fails when no source or
    /// more than one source is set.
    pub fn workload_kind(&self) -> Result<WorkloadKind, ConfigurationError> {
        let sources = [
            self.binary_url.is_some(),
            self.docker_tag.is_some(),
            self.snap_name.is_some(),
        ];
        match sources.iter().filter(|set| **set).count() {
            0 => Err(ConfigurationError::NoSourceSet),
            1 if self.snap_name.is_some() => Ok(WorkloadKind::Snap),
            1 => Ok(WorkloadKind::Binary),
            _ => Err(ConfigurationError::ConflictingSources),
        }
    }

    /// Mechanism settings handed to the workload constructors.
    pub fn workload_params(&self, chain_name: &str) -> WorkloadParams {
        WorkloadParams {
            chain_name: chain_name.to_string(),
            binary_url: self.binary_url.clone(),
            binary_sha256_url: self.binary_sha256_url.clone(),
            docker_tag: self.docker_tag.clone(),
            snap_name: self.snap_name.clone(),
            snap_channel: self.snap_channel.clone(),
            snap_revision: self.snap_revision.clone(),
            snap_hold: self.snap_hold,
            snap_endure: self.snap_endure,
        }
    }

    /// The deployment-source fields as stored-state pairs, used both to
    /// persist them and to diff against the previous pass.
    pub fn source_fields(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("binary-url", self.binary_url.clone()),
            ("binary-sha256-url", self.binary_sha256_url.clone()),
            ("docker-tag", self.docker_tag.clone()),
            ("snap-name", self.snap_name.clone()),
            ("snap-channel", self.snap_channel.clone()),
            ("snap-revision", self.snap_revision.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_source_required() {
        let mut config = DesiredConfig::default();
        assert!(matches!(config.workload_kind(), Err(ConfigurationError::NoSourceSet)));

        config.binary_url = Some("https://host/polkadot".to_string());
        assert_eq!(config.workload_kind().unwrap(), WorkloadKind::Binary);

        config.snap_name = Some("polkadot".to_string());
        assert!(matches!(config.workload_kind(), Err(ConfigurationError::ConflictingSources)));

        config.binary_url = None;
        assert_eq!(config.workload_kind().unwrap(), WorkloadKind::Snap);
    }

    #[test]
    fn docker_tag_selects_binary_mechanism() {
        let config = DesiredConfig { docker_tag: Some("v1.7.0".to_string()), ..Default::default() };
        assert_eq!(config.workload_kind().unwrap(), WorkloadKind::Binary);
    }

    #[test]
    fn kebab_case_fields_deserialize() {
        let config: DesiredConfig = serde_json::from_value(serde_json::json!({
            "service-args": "--chain westend --rpc-port 9944",
            "snap-name": "polkadot",
            "mnemonic-secret": "secret:vault/validator-seed",
        }))
        .unwrap();
        assert_eq!(config.workload_kind().unwrap(), WorkloadKind::Snap);
        assert_eq!(config.mnemonic_secret.as_deref(), Some("secret:vault/validator-seed"));
    }
}
