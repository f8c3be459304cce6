//! Small system helpers shared by the workload managers, the artifact
//! fetcher and the migrators. Ownership changes shell out to `chown` since
//! the operator runs as root and target users are system accounts.

use chrono::{DateTime, Local};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Command;
use tracing::warn;

/// Change ownership of a path to `owner:owner`.
pub fn chown<P: AsRef<Path>>(path: P, owner: &str) {
    let _ = Command::new("chown")
        .arg(format!("{owner}:{owner}"))
        .arg(path.as_ref())
        .status();
}

/// Recursively change ownership of a tree to `owner:owner`.
pub fn chown_recursive<P: AsRef<Path>>(path: P, owner: &str) {
    let _ = Command::new("chown")
        .arg("-R")
        .arg(format!("{owner}:{owner}"))
        .arg(path.as_ref())
        .status();
}

/// Set unix permission bits on a path.
pub fn set_mode<P: AsRef<Path>>(path: P, mode: u32) -> std::io::Result<()> {
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

/// Mark a file executable (0755).
pub fn make_executable<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    set_mode(path, 0o755)
}

/// Write a node identity key file with 0600 permissions and the given owner.
pub fn write_key_file<P: AsRef<Path>>(path: P, key: &str, owner: &str) -> std::io::Result<()> {
    std::fs::write(&path, key)?;
    chown(&path, owner);
    set_mode(&path, 0o600)
}

/// Human-readable disk usage of a directory via `du -hs`, e.g. "12G".
/// Empty string when the path does not exist.
pub fn disk_usage<P: AsRef<Path>>(path: P) -> String {
    if !path.as_ref().exists() {
        return String::new();
    }
    let output = Command::new("du").arg(path.as_ref()).arg("-hs").output();
    match output {
        Ok(out) => {
            let text = String::from_utf8_lossy(&out.stdout);
            match text.split_whitespace().next() {
                Some(size) => size.to_string(),
                None => {
                    warn!("Couldn't parse return from 'du' command");
                    "Error parsing disk usage".to_string()
                }
            }
        }
        Err(e) => {
            warn!("Failed to run 'du': {}", e);
            "Error parsing disk usage".to_string()
        }
    }
}

/// md5 checksum of a file via `md5sum`. Empty string when the file is absent.
pub fn file_md5sum<P: AsRef<Path>>(path: P) -> String {
    if !path.as_ref().exists() {
        return String::new();
    }
    let output = Command::new("md5sum").arg(path.as_ref()).output();
    match output {
        Ok(out) => String::from_utf8_lossy(&out.stdout)
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string(),
        Err(_) => String::new(),
    }
}

/// Last status-change time of a file formatted as "YYYY-MM-DD HH:MM:SS".
/// Empty string when the file is absent.
pub fn file_last_changed<P: AsRef<Path>>(path: P) -> String {
    use std::os::unix::fs::MetadataExt;
    match std::fs::metadata(path) {
        Ok(meta) => {
            let changed = DateTime::from_timestamp(meta.ctime(), 0).unwrap_or_default();
            changed
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        }
        Err(_) => String::new(),
    }
}

/// First digits-and-dots run in a string, used to pull a version number out
/// of `--version` output.
pub fn extract_version(output: &str) -> Option<String> {
    let start = output.find(|c: char| c.is_ascii_digit())?;
    let version: String = output[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if version.is_empty() {
        None
    } else {
        Some(version.trim_matches('.').to_string())
    }
}

/// Command line of the first process matching `name` via pgrep, NUL bytes
/// replaced with spaces. Empty string when no process is found.
pub fn process_cmdline(name: &str) -> String {
    let pid = match Command::new("pgrep").arg(name).output() {
        Ok(out) => String::from_utf8_lossy(&out.stdout)
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string(),
        Err(_) => String::new(),
    };
    if pid.is_empty() {
        return String::new();
    }
    match std::fs::read(format!("/proc/{pid}/cmdline")) {
        Ok(raw) => String::from_utf8_lossy(&raw).replace('\0', " ").trim().to_string(),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn version_extraction() {
        assert_eq!(extract_version("polkadot 1.7.0-abcdef").as_deref(), Some("1.7.0"));
        assert_eq!(extract_version("parity-polkadot v0.9.43").as_deref(), Some("0.9.43"));
        assert_eq!(extract_version("no digits here"), None);
    }

    #[test]
    fn key_file_has_restrictive_mode() {
        let dir = TempDir::new().unwrap();
        let key_path = dir.path().join("node-key");
        write_key_file(&key_path, "deadbeef", "nobody-that-does-not-exist").unwrap();

        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&key_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(std::fs::read_to_string(&key_path).unwrap(), "deadbeef");
    }

    #[test]
    fn missing_files_report_empty() {
        assert_eq!(disk_usage("/nonexistent/path"), "");
        assert_eq!(file_md5sum("/nonexistent/path"), "");
        assert_eq!(file_last_changed("/nonexistent/path"), "");
    }
}
