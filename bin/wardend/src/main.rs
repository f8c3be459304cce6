mod cli;
mod config_loader;

use anyhow::bail;
use clap::Parser;
use tracing::info;
use warden_args::ServiceArgs;
use warden_reconciler::{actions, Controller, DesiredConfig, StateStore, UnitStatus};
use warden_rpc::NodeRpc;
use warden_workload::{configure_workload, Workload};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    let config = config_loader::load(&args.config)?;
    warden_common::logging::init(&config.logging);

    let store = StateStore::open(&args.state_dir)?;
    let controller = Controller::new(store);
    let desired = config.node;

    match args.command.unwrap_or(cli::Commands::Reconcile) {
        cli::Commands::Reconcile => {
            let outcome = controller.reconcile(&desired).await;
            report(&outcome.status, outcome.deferred)?;
        }
        cli::Commands::Status => {
            let workload = workload_for(&desired)?;
            let parsed = ServiceArgs::parse(&desired.service_args)?;
            let status = controller.update_status(&parsed, workload.as_ref()).await;
            println!("{status}");
        }
        cli::Commands::Start => {
            let workload = workload_for(&desired)?;
            workload.start_service().await?;
            info!("Service started");
        }
        cli::Commands::Stop => {
            let workload = workload_for(&desired)?;
            workload.stop_service().await?;
            info!("Service stopped");
        }
        cli::Commands::Restart => {
            let workload = workload_for(&desired)?;
            actions::restart_node(workload.as_ref()).await?;
            info!("Service restarted");
        }
        cli::Commands::GetSessionKey => {
            let key = actions::get_session_key(&rpc_for(&desired)?).await?;
            println!("{key}");
        }
        cli::Commands::HasSessionKey { key } => {
            let held = actions::has_session_key(&rpc_for(&desired)?, &key).await?;
            println!("{held}");
        }
        cli::Commands::InsertKey { mnemonic, address } => {
            let Some(mnemonic) = mnemonic.or_else(|| desired.mnemonic_secret.clone()) else {
                bail!("no mnemonic given and no mnemonic-secret configured");
            };
            actions::insert_key(&rpc_for(&desired)?, &mnemonic, &address).await?;
            info!("Key inserted into the node keystore");
        }
        cli::Commands::SetNodeKey { key_file } => {
            let key = std::fs::read_to_string(&key_file)?;
            let workload = workload_for(&desired)?;
            actions::set_node_key(workload.as_ref(), key.trim()).await?;
            info!("Node key replaced");
        }
        cli::Commands::NodeInfo => {
            let workload = workload_for(&desired)?;
            let node_info = actions::get_node_info(workload.as_ref(), &rpc_for(&desired)?).await;
            println!("{}", serde_json::to_string_pretty(&node_info)?);
        }
        cli::Commands::MigrateData { dry_run, reverse } => {
            let outcome = actions::migrate_data(dry_run, reverse)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        cli::Commands::MigrateNodeKey { dry_run, reverse } => {
            let outcome = actions::migrate_key(dry_run, reverse)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        cli::Commands::EndpointJoined { peer, relation_id, url } => {
            controller.endpoints().add(&peer, relation_id, &url)?;
            let outcome = controller.reconcile(&desired).await;
            report(&outcome.status, outcome.deferred)?;
        }
        cli::Commands::EndpointDeparted { peer, relation_id } => {
            controller.endpoints().remove(&peer, relation_id)?;
            let outcome = controller.reconcile(&desired).await;
            report(&outcome.status, outcome.deferred)?;
        }
    }
    Ok(())
}

fn report(status: &UnitStatus, deferred: bool) -> anyhow::Result<()> {
    println!("{status}");
    if let UnitStatus::Blocked(message) = status {
        if deferred {
            bail!("reconciliation deferred, re-run after the condition clears: {message}");
        }
        bail!("reconciliation blocked: {message}");
    }
    Ok(())
}

fn workload_for(desired: &DesiredConfig) -> anyhow::Result<Box<dyn Workload>> {
    let kind = desired.workload_kind()?;
    let chain = ServiceArgs::parse(&desired.service_args)?.chain_name();
    Ok(configure_workload(kind, &desired.workload_params(&chain))?)
}

fn rpc_for(desired: &DesiredConfig) -> anyhow::Result<NodeRpc> {
    let port = ServiceArgs::parse(&desired.service_args)?.rpc_port().unwrap_or(9944);
    Ok(NodeRpc::new(port))
}
