//! Process-spawning helpers shared by both workload implementations.

use tokio::process::Command;
use warden_common::{InstallError, WardenError};

/// Run a command, returning stdout as a trimmed string on exit 0.
pub async fn output(argv: &[&str]) -> Option<String> {
    let out = Command::new(argv[0]).args(&argv[1..]).output().await.ok()?;
    if !out.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

/// Run a command, ignoring its exit status entirely.
pub async fn run_unchecked(argv: &[&str]) {
    let _ = Command::new(argv[0]).args(&argv[1..]).status().await;
}

/// Run a command, returning whether it exited successfully.
pub async fn succeeds(argv: &[&str]) -> bool {
    Command::new(argv[0])
        .args(&argv[1..])
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Run a command, converting a spawn failure or non-zero exit into an
/// install error.
pub async fn run_checked(argv: &[&str]) -> Result<(), WardenError> {
    let status = Command::new(argv[0])
        .args(&argv[1..])
        .status()
        .await
        .map_err(|e| InstallError::Command { command: argv.join(" "), reason: e.to_string() })?;
    if !status.success() {
        return Err(InstallError::Command {
            command: argv.join(" "),
            reason: format!("exit status {status}"),
        }
        .into());
    }
    Ok(())
}
