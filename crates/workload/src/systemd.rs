//! systemd plumbing for the direct-binary mechanism: the unit file, the
//! environment file carrying the node's CLI arguments, and service control.

use tokio::time::{sleep, Duration};
use tracing::info;
use warden_common::layout::BinaryLayout;
use warden_common::{ServiceError, WardenError};

use crate::cmd;
use crate::POLL_INTERVAL_SECS;

/// Unit file installed for the direct-binary deployment. Arguments come
/// from the env file so argument updates never rewrite the unit itself.
const UNIT_TEMPLATE: &str = "\
[Unit]
Description=Polkadot node
After=network.target

[Service]
User=polkadot
Group=polkadot
EnvironmentFile=/etc/default/polkadot
ExecStart=/home/polkadot/polkadot $POLKADOT_CLI_ARGS
Restart=on-failure
RestartSec=10

[Install]
WantedBy=multi-user.target
";

/// Install the service unit and reload systemd.
pub async fn install_unit(layout: &BinaryLayout) -> Result<(), WardenError> {
    std::fs::write(&layout.unit_file, UNIT_TEMPLATE)?;
    cmd::run_unchecked(&["systemctl", "daemon-reload"]).await;
    Ok(())
}

/// Remove the service unit if present and reload systemd.
pub async fn remove_unit(layout: &BinaryLayout) -> Result<(), WardenError> {
    if layout.unit_file.exists() {
        std::fs::remove_file(&layout.unit_file)?;
        cmd::run_unchecked(&["systemctl", "daemon-reload"]).await;
    }
    Ok(())
}

pub async fn start(service_name: &str) -> Result<(), WardenError> {
    info!("Starting {} service", service_name);
    let unit = format!("{service_name}.service");
    if !cmd::succeeds(&["systemctl", "start", &unit]).await {
        return Err(ServiceError::Start(format!("systemctl start {unit} failed")).into());
    }
    cmd::run_unchecked(&["systemctl", "enable", &unit]).await;
    Ok(())
}

pub async fn stop(service_name: &str) -> Result<(), WardenError> {
    info!("Stopping {} service", service_name);
    let unit = format!("{service_name}.service");
    if !cmd::succeeds(&["systemctl", "stop", &unit]).await {
        return Err(ServiceError::Stop(format!("systemctl stop {unit} failed")).into());
    }
    cmd::run_unchecked(&["systemctl", "disable", &unit]).await;
    Ok(())
}

pub async fn restart(service_name: &str) -> Result<(), WardenError> {
    info!("Restarting {} service", service_name);
    let unit = format!("{service_name}.service");
    if !cmd::succeeds(&["systemctl", "restart", &unit]).await {
        return Err(ServiceError::Restart(format!("systemctl restart {unit} failed")).into());
    }
    Ok(())
}

/// Poll the unit's active state, sleeping between attempts to ride out
/// supervisor propagation delay.
pub async fn wait_active(service_name: &str, iterations: u32) -> bool {
    let unit = format!("{service_name}.service");
    for i in 0..iterations.max(1) {
        if cmd::succeeds(&["systemctl", "is-active", "--quiet", &unit]).await {
            return true;
        }
        if i + 1 < iterations {
            sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;
        }
    }
    false
}

/// Render the env-file line holding the node's CLI arguments.
pub fn render_args_line(user: &str, args: &str) -> String {
    format!("{}_CLI_ARGS='{}'\n", user.to_uppercase(), args)
}

/// Create the env file empty so the unit can start before the first
/// argument update.
pub fn create_env_file(layout: &BinaryLayout) -> Result<(), WardenError> {
    std::fs::write(&layout.env_file, render_args_line(&layout.user, ""))?;
    Ok(())
}

pub fn write_args(layout: &BinaryLayout, args: &str) -> Result<(), WardenError> {
    std::fs::write(&layout.env_file, render_args_line(&layout.user, args))
        .map_err(|e| ServiceError::WriteArgs(e.to_string()))?;
    Ok(())
}

/// Read the argument string back out of the env file.
pub fn read_args(layout: &BinaryLayout) -> Result<String, WardenError> {
    let contents = std::fs::read_to_string(&layout.env_file)
        .map_err(|e| ServiceError::ReadArgs(e.to_string()))?;
    Ok(parse_args_line(&contents))
}

fn parse_args_line(contents: &str) -> String {
    contents
        .trim()
        .split_once('=')
        .map(|(_, value)| value.trim_matches('\'').to_string())
        .unwrap_or_default()
}

/// Whether `candidate` differs from the env file on disk. A missing env
/// file always differs.
pub fn args_differ(layout: &BinaryLayout, candidate: &str) -> bool {
    match std::fs::read_to_string(&layout.env_file) {
        Ok(contents) => contents != render_args_line(&layout.user, candidate),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn args_round_trip_through_env_file() {
        let dir = TempDir::new().unwrap();
        let layout = BinaryLayout::under(dir.path());
        write_args(&layout, "--chain westend --rpc-port 9944").unwrap();
        assert_eq!(read_args(&layout).unwrap(), "--chain westend --rpc-port 9944");
    }

    #[test]
    fn differ_detects_changes_and_missing_file() {
        let dir = TempDir::new().unwrap();
        let layout = BinaryLayout::under(dir.path());
        assert!(args_differ(&layout, "--chain westend --rpc-port 9944"));

        write_args(&layout, "--chain westend --rpc-port 9944").unwrap();
        assert!(!args_differ(&layout, "--chain westend --rpc-port 9944"));
        assert!(args_differ(&layout, "--chain kusama --rpc-port 9944"));
    }

    #[test]
    fn env_line_embeds_uppercased_user() {
        assert_eq!(
            render_args_line("polkadot", "--chain dot"),
            "POLKADOT_CLI_ARGS='--chain dot'\n"
        );
    }
}
