//! The reconciliation state machine. One pass runs to completion per
//! delivered configuration event; stored state is only advanced after the
//! corresponding step succeeded, so an interrupted pass re-runs cleanly.

use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};
use warden_args::{ArgInputs, ServiceArgs};
use warden_common::{ConfigurationError, WardenError};
use warden_rpc::NodeRpc;
use warden_workload::{configure_workload, Workload, WorkloadKind, WorkloadParams, POLL_INTERVAL_SECS};

use crate::config::DesiredConfig;
use crate::state::{RelayEndpointSet, StateStore};
use crate::status::UnitStatus;

/// RPC attempts before the node is reported as still starting up.
const STATUS_POLL_ATTEMPTS: u32 = 3;

/// Result of one reconciliation pass. `deferred` asks the host runtime to
/// redeliver the triggering event, used for failures that may succeed later
/// with the same desired state.
#[derive(Debug)]
pub struct ReconcileOutcome {
    pub status: UnitStatus,
    pub deferred: bool,
}

pub struct Controller {
    store: StateStore,
}

impl Controller {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn endpoints(&self) -> RelayEndpointSet<'_> {
        RelayEndpointSet::new(&self.store)
    }

    /// Run one reconciliation pass against the declared configuration.
    pub async fn reconcile(&self, desired: &DesiredConfig) -> ReconcileOutcome {
        match self.try_reconcile(desired).await {
            Ok(status) => ReconcileOutcome { status, deferred: false },
            Err(e) => {
                error!("Reconciliation failed: {}", e);
                // Source mutual-exclusivity violations need a corrected
                // configuration; everything else may succeed on redelivery.
                let deferred = !matches!(
                    e,
                    WardenError::Configuration(ConfigurationError::ConflictingSources)
                        | WardenError::Configuration(ConfigurationError::NoSourceSet)
                );
                ReconcileOutcome { status: UnitStatus::Blocked(e.to_string()), deferred }
            }
        }
    }

    async fn try_reconcile(&self, desired: &DesiredConfig) -> Result<UnitStatus, WardenError> {
        let kind = desired.workload_kind()?;
        let declared = ServiceArgs::parse(&desired.service_args)?;
        let chain_name = declared.chain_name();

        let params = desired.workload_params(&chain_name);
        let workload = configure_workload(kind, &params)?;

        let inputs = ArgInputs {
            node_key_file: workload.node_key_file().to_path_buf(),
            relay_rpc_urls: self.endpoints().urls(),
            chain_spec_url: desired.chain_spec_url.clone(),
            relaychain_spec_url: desired.relaychain_spec_url.clone(),
            wasm_override: desired.wasm_runtime_url.is_some(),
            spec_dir: workload.spec_dir().to_path_buf(),
            wasm_dir: workload.wasm_dir().to_path_buf(),
            owner: workload.owner().to_string(),
        };
        let args = ServiceArgs::build(&desired.service_args, &inputs).await?;

        let stored_kind: Option<WorkloadKind> =
            self.store.get("workload-kind").and_then(|s| s.parse().ok());
        let source_changed = desired
            .source_fields()
            .iter()
            .any(|(key, value)| self.store.get(key) != *value);

        let mut was_running = false;
        let mut suppress_start = false;

        match stored_kind {
            Some(old_kind) if old_kind != kind => {
                info!("Switching deployment mechanism from {} to {}", old_kind, kind);
                let old_params = self.stored_params(&chain_name);
                match configure_workload(old_kind, &old_params) {
                    Ok(old_workload) => old_workload.uninstall().await?,
                    Err(e) => warn!(
                        "Could not reconstruct the previous {} workload from stored state, leaving it in place: {}",
                        old_kind, e
                    ),
                }
                workload.install().await?;
                // The chain database may need migrating before the new
                // mechanism starts; the next pass performs the first start.
                suppress_start = true;
                self.record_mechanism_switch(desired, kind)?;
            }
            _ if source_changed || stored_kind.is_none() => {
                was_running = workload.is_service_running(1).await;
                workload.install().await?;
                self.persist_source(desired, kind)?;
            }
            _ => {
                was_running = workload.is_service_running(1).await;
            }
        }

        if !workload.node_key_file().exists() {
            workload.generate_node_key().await?;
        }

        let service_string = args.to_service_string();
        let args_changed = workload.service_args_differ_from_disk(&service_string).await;
        if args_changed {
            info!("Updating service arguments");
            workload.set_service_args(&service_string).await?;
        }
        self.store.set("service-args", &desired.service_args)?;
        self.store.set_opt("chain-spec-url", desired.chain_spec_url.as_deref())?;
        self.store.set_opt("relaychain-spec-url", desired.relaychain_spec_url.as_deref())?;

        if desired.wasm_runtime_url != self.store.get("wasm-runtime-url") {
            if let Some(url) = &desired.wasm_runtime_url {
                workload.download_wasm_runtime(url).await?;
            }
            self.store.set_opt("wasm-runtime-url", desired.wasm_runtime_url.as_deref())?;
        }

        if kind == WorkloadKind::Snap {
            if desired.snap_hold != self.store.get_bool("snap-hold") {
                workload.set_hold(desired.snap_hold).await?;
                self.store.set_bool("snap-hold", desired.snap_hold)?;
            }
            if desired.snap_endure != self.store.get_bool("snap-endure") {
                workload.set_endure(desired.snap_endure).await?;
                self.store.set_bool("snap-endure", desired.snap_endure)?;
            }
        }

        if suppress_start {
            return Ok(UnitStatus::Maintenance(
                "Deployment mechanism switched; migrate data if needed, then re-run reconciliation to start the service".to_string(),
            ));
        }
        let first_start = !self.store.get_bool("service-initialized");
        if first_start {
            workload.start_service().await?;
            self.store.set_bool("service-initialized", true)?;
        } else if was_running && !workload.is_service_running(1).await {
            workload.start_service().await?;
        } else if args_changed && was_running {
            workload.restart_service().await?;
        }

        Ok(self.update_status(&declared, workload.as_ref()).await)
    }

    /// Mechanism settings as persisted by the previous pass, used to build
    /// the old workload handle during a mechanism switch.
    fn stored_params(&self, chain_name: &str) -> WorkloadParams {
        WorkloadParams {
            chain_name: chain_name.to_string(),
            binary_url: self.store.get("binary-url"),
            binary_sha256_url: self.store.get("binary-sha256-url"),
            docker_tag: self.store.get("docker-tag"),
            snap_name: self.store.get("snap-name"),
            snap_channel: self.store.get("snap-channel"),
            snap_revision: self.store.get("snap-revision"),
            snap_hold: self.store.get_bool("snap-hold"),
            snap_endure: self.store.get_bool("snap-endure"),
        }
    }

    /// Persist a mechanism switch. The new handle is a fresh install, so the
    /// initialized flag is cleared and the next reconciliation pass starts
    /// the service as a first start.
    fn record_mechanism_switch(
        &self,
        desired: &DesiredConfig,
        kind: WorkloadKind,
    ) -> Result<(), WardenError> {
        self.persist_source(desired, kind)?;
        self.store.set_bool("service-initialized", false)
    }

    fn persist_source(&self, desired: &DesiredConfig, kind: WorkloadKind) -> Result<(), WardenError> {
        for (key, value) in desired.source_fields() {
            self.store.set_opt(key, value.as_deref())?;
        }
        self.store.set("workload-kind", &kind.to_string())
    }

    /// Recompute the observable status: not running, running but not yet
    /// responsive over RPC, or active with sync/validator state.
    pub async fn update_status(&self, args: &ServiceArgs, workload: &dyn Workload) -> UnitStatus {
        if !workload.is_service_running(2).await {
            return UnitStatus::Waiting("Service not running".to_string());
        }
        let Some(port) = args.rpc_port() else {
            return UnitStatus::Waiting("Service running, RPC port unknown".to_string());
        };
        let rpc = NodeRpc::new(port);
        for attempt in 0..STATUS_POLL_ATTEMPTS {
            match rpc.is_syncing().await {
                Ok(syncing) => {
                    let validating = rpc.is_validating().await.unwrap_or(false);
                    return UnitStatus::Active(format!(
                        "Syncing: {syncing}, Validating: {validating}"
                    ));
                }
                Err(e) => debug!("Node RPC not ready: {}", e),
            }
            if attempt + 1 < STATUS_POLL_ATTEMPTS {
                sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;
            }
        }
        UnitStatus::Waiting("Service running, client starting up".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateStore;
    use tempfile::TempDir;

    fn controller() -> (TempDir, Controller) {
        let dir = TempDir::new().unwrap();
        let store = StateStore::open(dir.path().join("state")).unwrap();
        (dir, Controller::new(store))
    }

    #[tokio::test]
    async fn conflicting_sources_block_without_state_mutation() {
        let (_dir, controller) = controller();
        let desired = DesiredConfig {
            service_args: "--chain westend --rpc-port 9944".to_string(),
            binary_url: Some("https://host/polkadot".to_string()),
            snap_name: Some("polkadot".to_string()),
            ..Default::default()
        };
        let outcome = controller.reconcile(&desired).await;
        assert!(matches!(outcome.status, UnitStatus::Blocked(_)));
        assert!(!outcome.deferred);
        assert_eq!(controller.store().get("workload-kind"), None);
        assert_eq!(controller.store().get("binary-url"), None);
    }

    #[tokio::test]
    async fn invalid_args_block_and_request_redelivery() {
        let (_dir, controller) = controller();
        let desired = DesiredConfig {
            service_args: "--rpc-port 9944".to_string(),
            binary_url: Some("https://host/polkadot".to_string()),
            ..Default::default()
        };
        let outcome = controller.reconcile(&desired).await;
        assert!(matches!(outcome.status, UnitStatus::Blocked(_)));
        assert!(outcome.status.message().contains("--chain"));
        assert!(outcome.deferred);
        assert_eq!(controller.store().get("service-args"), None);
    }

    #[test]
    fn mechanism_switch_rearms_the_first_start() {
        let (_dir, controller) = controller();
        controller.store().set_bool("service-initialized", true).unwrap();
        let desired = DesiredConfig {
            service_args: "--chain westend --rpc-port 9944".to_string(),
            snap_name: Some("polkadot".to_string()),
            ..Default::default()
        };
        controller.record_mechanism_switch(&desired, WorkloadKind::Snap).unwrap();
        assert!(!controller.store().get_bool("service-initialized"));
        assert_eq!(controller.store().get("workload-kind").as_deref(), Some("snap"));
        assert_eq!(controller.store().get("snap-name").as_deref(), Some("polkadot"));
    }

    #[tokio::test]
    async fn missing_source_blocks() {
        let (_dir, controller) = controller();
        let desired = DesiredConfig {
            service_args: "--chain westend --rpc-port 9944".to_string(),
            ..Default::default()
        };
        let outcome = controller.reconcile(&desired).await;
        assert!(matches!(outcome.status, UnitStatus::Blocked(_)));
        assert!(!outcome.deferred);
    }
}
