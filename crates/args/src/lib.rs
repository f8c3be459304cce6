//! Argument model for the managed node's CLI.
//!
//! The operator-declared raw argument string is unescaped, tokenized and
//! validated, then system overrides are injected: the managed node-key-file
//! path, relay RPC endpoints discovered over peer relations, wasm runtime
//! overrides and chain-spec file substitutions. The result is immutable; a
//! new configuration event rebuilds it from scratch.

mod unescape;

pub use unescape::unescape;

use std::path::{Path, PathBuf};
use warden_common::{chains, ConfigurationError, WardenError};

/// Separator between the parachain segment and the relay-chain segment of a
/// dual-process launch.
const SEGMENT_SEPARATOR: &str = "--";

/// Inputs for building the final argument set from declared configuration.
#[derive(Debug, Clone)]
pub struct ArgInputs {
    /// Path injected as `--node-key-file`.
    pub node_key_file: PathBuf,
    /// Relay RPC endpoints, injected as `--relay-chain-rpc-urls` values.
    pub relay_rpc_urls: Vec<String>,
    /// Remote chain spec for the primary (parachain) segment.
    pub chain_spec_url: Option<String>,
    /// Remote chain spec for the secondary (relay) segment.
    pub relaychain_spec_url: Option<String>,
    /// Set when a wasm runtime override is configured; injects
    /// `--wasm-runtime-overrides` pointing at `wasm_dir`.
    pub wasm_override: bool,
    /// Directory chain-spec files are persisted under.
    pub spec_dir: PathBuf,
    /// Directory wasm override files live under.
    pub wasm_dir: PathBuf,
    /// Owner of downloaded spec files.
    pub owner: String,
}

/// Parsed and customized node arguments.
#[derive(Debug, Clone)]
pub struct ServiceArgs {
    /// Tokens as declared by the operator, after validation.
    declared: Vec<String>,
    /// Tokens with system overrides applied; what the service actually runs.
    customized: Vec<String>,
}

impl ServiceArgs {
    /// Tokenize and validate the declared argument string without applying
    /// any overrides.
    pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
        let decoded = unescape(raw);
        let tokens = tokenize(&decoded);
        validate(&tokens)?;
        Ok(Self { customized: tokens.clone(), declared: tokens })
    }

    /// Build the final argument set: parse, fetch any configured chain-spec
    /// files, and inject system overrides.
    pub async fn build(raw: &str, inputs: &ArgInputs) -> Result<Self, WardenError> {
        let mut args = Self::parse(raw).map_err(WardenError::Configuration)?;

        let chain_spec = match &inputs.chain_spec_url {
            Some(url) => Some(
                warden_fetch::download_chain_spec(url, "chain-spec.json", &inputs.spec_dir, &inputs.owner)
                    .await?,
            ),
            None => None,
        };
        let relaychain_spec = match &inputs.relaychain_spec_url {
            Some(url) => Some(
                warden_fetch::download_chain_spec(
                    url,
                    "relaychain-spec.json",
                    &inputs.spec_dir,
                    &inputs.owner,
                )
                .await?,
            ),
            None => None,
        };

        args.customize(inputs, chain_spec.as_deref(), relaychain_spec.as_deref());
        Ok(args)
    }

    /// Apply overrides with chain-spec files already on disk. Exposed
    /// separately so the pipeline can be exercised without network access.
    pub fn customize(
        &mut self,
        inputs: &ArgInputs,
        chain_spec: Option<&Path>,
        relaychain_spec: Option<&Path>,
    ) {
        self.prepend_primary(&[
            "--node-key-file".to_string(),
            inputs.node_key_file.display().to_string(),
        ]);
        if !inputs.relay_rpc_urls.is_empty() {
            let mut relay_args = vec!["--relay-chain-rpc-urls".to_string()];
            relay_args.extend(inputs.relay_rpc_urls.iter().cloned());
            self.prepend_primary(&relay_args);
        }

        // Deprecated hardcoded aliases; the chain-spec configs below override
        // these when both are present.
        if let Some(alias) = chains::spec_alias(&self.chain_name()) {
            self.set_chain_value(alias, 0);
        }

        if let Some(spec) = chain_spec {
            self.set_chain_value(&spec.display().to_string(), 0);
        }
        if let Some(spec) = relaychain_spec {
            self.set_chain_value(&spec.display().to_string(), 1);
        }
        if inputs.wasm_override {
            self.prepend_primary(&[
                "--wasm-runtime-overrides".to_string(),
                inputs.wasm_dir.display().to_string(),
            ]);
        }
    }

    /// The final space-joined argument string used for the service.
    pub fn to_service_string(&self) -> String {
        self.customized.join(" ")
    }

    /// The declared arguments, unmodified by overrides.
    pub fn declared_string(&self) -> String {
        self.declared.join(" ")
    }

    /// Value of `--chain` as declared by the operator.
    pub fn chain_name(&self) -> String {
        self.value_of("--chain").unwrap_or_default()
    }

    /// Value of `--rpc-port` as declared by the operator.
    pub fn rpc_port(&self) -> Option<u16> {
        self.value_of("--rpc-port").and_then(|v| v.parse().ok())
    }

    /// Value of `--ws-port`; newer clients drop this flag and serve
    /// websockets on the RPC port.
    pub fn ws_port(&self) -> Option<u16> {
        self.value_of("--ws-port").and_then(|v| v.parse().ok())
    }

    /// Whether the node runs in block-production mode.
    pub fn is_validator(&self) -> bool {
        self.declared.iter().any(|t| t == "--validator" || t == "--collator")
    }

    fn value_of(&self, flag: &str) -> Option<String> {
        let i = self.declared.iter().position(|t| t == flag)?;
        self.declared.get(i + 1).cloned()
    }

    /// Prepend arguments to the primary segment.
    fn prepend_primary(&mut self, args: &[String]) {
        let mut combined = args.to_vec();
        combined.append(&mut self.customized);
        self.customized = combined;
    }

    /// Append arguments to the secondary segment, creating it on demand.
    fn append_secondary(&mut self, args: &[String]) {
        if !self.customized.iter().any(|t| t == SEGMENT_SEPARATOR) {
            self.customized.push(SEGMENT_SEPARATOR.to_string());
        }
        self.customized.extend_from_slice(args);
    }

    /// Rewrite the value of the nth `--chain` occurrence (0 = primary,
    /// 1 = secondary), adding the flag to the matching segment when absent.
    fn set_chain_value(&mut self, value: &str, position: usize) {
        let occurrence = self
            .customized
            .iter()
            .enumerate()
            .filter(|(_, t)| *t == "--chain")
            .map(|(i, _)| i)
            .nth(position);
        match occurrence {
            Some(i) => {
                if i + 1 < self.customized.len() {
                    self.customized[i + 1] = value.to_string();
                } else {
                    // A trailing `--chain` with no value gets one appended.
                    self.customized.push(value.to_string());
                }
            }
            None => {
                let args = ["--chain".to_string(), value.to_string()];
                if position == 0 {
                    self.prepend_primary(&args);
                } else {
                    self.append_secondary(&args);
                }
            }
        }
    }
}

/// Split on runs of whitespace and `=`, making `--key value` and
/// `--key=value` equivalent.
fn tokenize(raw: &str) -> Vec<String> {
    raw.split(|c: char| c.is_whitespace() || c == '=')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn validate(tokens: &[String]) -> Result<(), ConfigurationError> {
    let has = |flag: &str| tokens.iter().any(|t| t == flag);
    if !has("--chain") {
        return Err(ConfigurationError::MissingFlag("--chain"));
    }
    if !has("--rpc-port") {
        return Err(ConfigurationError::MissingFlag("--rpc-port"));
    }
    if has("--prometheus-port") {
        return Err(ConfigurationError::PrometheusPortSet);
    }
    if has("--node-key-file") {
        return Err(ConfigurationError::NodeKeyFileSet(
            "the node-key-file path is injected by the operator".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> ArgInputs {
        ArgInputs {
            node_key_file: PathBuf::from("/home/polkadot/node-key"),
            relay_rpc_urls: vec![],
            chain_spec_url: None,
            relaychain_spec_url: None,
            wasm_override: false,
            spec_dir: PathBuf::from("/home/polkadot/spec"),
            wasm_dir: PathBuf::from("/home/polkadot/wasm"),
            owner: "polkadot".to_string(),
        }
    }

    #[test]
    fn missing_chain_is_rejected() {
        let err = ServiceArgs::parse("--rpc-port 9944").unwrap_err();
        assert!(err.to_string().contains("--chain"));
    }

    #[test]
    fn missing_rpc_port_is_rejected() {
        let err = ServiceArgs::parse("--chain westend").unwrap_err();
        assert!(err.to_string().contains("--rpc-port"));
    }

    #[test]
    fn forbidden_flags_are_rejected() {
        assert!(ServiceArgs::parse("--chain westend --rpc-port 9944 --prometheus-port 9615").is_err());
        assert!(ServiceArgs::parse("--chain westend --rpc-port 9944 --node-key-file /k").is_err());
    }

    #[test]
    fn equals_and_space_forms_are_equivalent() {
        let a = ServiceArgs::parse("--chain westend --rpc-port 9944").unwrap();
        let b = ServiceArgs::parse("--chain=westend --rpc-port=9944").unwrap();
        assert_eq!(a.declared_string(), b.declared_string());
        assert_eq!(b.chain_name(), "westend");
        assert_eq!(b.rpc_port(), Some(9944));
    }

    #[test]
    fn ws_port_is_optional() {
        let with = ServiceArgs::parse("--chain dot --rpc-port 9944 --ws-port 9945").unwrap();
        let without = ServiceArgs::parse("--chain dot --rpc-port 9944").unwrap();
        assert_eq!(with.ws_port(), Some(9945));
        assert_eq!(without.ws_port(), None);
    }

    #[test]
    fn reserialization_round_trips_under_tokenization() {
        let raw = "--chain=westend   --rpc-port 9944 --name Node";
        let args = ServiceArgs::parse(raw).unwrap();
        let reparsed = ServiceArgs::parse(&args.declared_string()).unwrap();
        assert_eq!(args.declared_string(), reparsed.declared_string());
    }

    #[test]
    fn node_key_file_is_prepended() {
        let mut args = ServiceArgs::parse("--chain westend --rpc-port 9944").unwrap();
        args.customize(&inputs(), None, None);
        assert_eq!(
            args.to_service_string(),
            "--node-key-file /home/polkadot/node-key --chain westend --rpc-port 9944"
        );
    }

    #[test]
    fn relay_urls_are_injected_before_node_key() {
        let mut args = ServiceArgs::parse("--chain westend --rpc-port 9944").unwrap();
        let mut inputs = inputs();
        inputs.relay_rpc_urls = vec!["ws://relay-a:9944".into(), "ws://relay-b:9944".into()];
        args.customize(&inputs, None, None);
        assert!(args.to_service_string().starts_with(
            "--relay-chain-rpc-urls ws://relay-a:9944 ws://relay-b:9944 --node-key-file"
        ));
    }

    #[test]
    fn chain_spec_file_overrides_hardcoded_alias() {
        let mut args = ServiceArgs::parse("--chain crust-mainnet --rpc-port 9944").unwrap();
        args.customize(&inputs(), Some(Path::new("/home/polkadot/spec/chain-spec.json")), None);
        let rendered = args.to_service_string();
        assert!(rendered.contains("--chain /home/polkadot/spec/chain-spec.json"));
        assert!(!rendered.contains("crust-mainnet"));
    }

    #[test]
    fn hardcoded_alias_applies_without_spec_file() {
        let mut args = ServiceArgs::parse("--chain aleph-zero-testnet --rpc-port 9944").unwrap();
        args.customize(&inputs(), None, None);
        assert!(args.to_service_string().contains("--chain testnet"));
    }

    #[test]
    fn relaychain_spec_lands_in_secondary_segment() {
        let mut args = ServiceArgs::parse("--chain para --rpc-port 9944").unwrap();
        args.customize(&inputs(), None, Some(Path::new("/home/polkadot/spec/relaychain-spec.json")));
        let rendered = args.to_service_string();
        let (_, secondary) = rendered.split_once(" -- ").unwrap();
        assert_eq!(secondary, "--chain /home/polkadot/spec/relaychain-spec.json");
    }

    #[test]
    fn existing_secondary_chain_is_rewritten_in_place() {
        let mut args =
            ServiceArgs::parse("--chain para --rpc-port 9944 -- --chain rococo").unwrap();
        args.customize(&inputs(), None, Some(Path::new("/spec/relaychain-spec.json")));
        let rendered = args.to_service_string();
        assert!(rendered.ends_with("-- --chain /spec/relaychain-spec.json"));
        assert!(!rendered.contains("rococo"));
    }

    #[test]
    fn dangling_secondary_chain_gains_a_value() {
        let mut args = ServiceArgs::parse("--chain para --rpc-port 9944 -- --chain").unwrap();
        args.customize(&inputs(), None, Some(Path::new("/spec/relaychain-spec.json")));
        let rendered = args.to_service_string();
        assert!(rendered.ends_with("-- --chain /spec/relaychain-spec.json"));
        assert_eq!(rendered.matches("--chain").count(), 2);
    }

    #[test]
    fn wasm_override_prepends_flag() {
        let mut args = ServiceArgs::parse("--chain westend --rpc-port 9944").unwrap();
        let mut inputs = inputs();
        inputs.wasm_override = true;
        args.customize(&inputs, None, None);
        assert!(args
            .to_service_string()
            .starts_with("--wasm-runtime-overrides /home/polkadot/wasm"));
    }

    #[test]
    fn validator_and_collator_both_count() {
        let v = ServiceArgs::parse("--chain dot --rpc-port 1 --validator").unwrap();
        let c = ServiceArgs::parse("--chain dot --rpc-port 1 --collator").unwrap();
        let n = ServiceArgs::parse("--chain dot --rpc-port 1").unwrap();
        assert!(v.is_validator());
        assert!(c.is_validator());
        assert!(!n.is_validator());
    }
}
