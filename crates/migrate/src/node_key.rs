//! Node identity key migration. Unlike the bulk data move the source file
//! is retained, so a reverse migration is always possible.

use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use warden_common::{sys, DataMigrationError};

use crate::{orient, owner_for_destination, LEGACY_NODE_KEY, SNAP_NODE_KEY};

#[derive(Debug, Clone, Serialize)]
pub struct KeyMigrationOutcome {
    pub performed: bool,
    pub dry_run: bool,
    pub message: String,
}

/// Copy the node key between the legacy and snap locations, fixing
/// ownership and restoring the 0600 mode.
pub fn migrate_node_key(
    src: Option<PathBuf>,
    dest: Option<PathBuf>,
    dry_run: bool,
    reverse: bool,
) -> Result<KeyMigrationOutcome, DataMigrationError> {
    let src = src.unwrap_or_else(|| PathBuf::from(LEGACY_NODE_KEY));
    let dest = dest.unwrap_or_else(|| PathBuf::from(SNAP_NODE_KEY));
    let (src, dest) = orient(src, dest, reverse);

    if !src.exists() {
        info!("No node key found to migrate.");
        return Ok(KeyMigrationOutcome {
            performed: false,
            dry_run,
            message: "No node key found to migrate.".to_string(),
        });
    }
    if dry_run {
        let message = format!(
            "Dry run: Node key would be migrated from {} to {}.",
            src.display(),
            dest.display()
        );
        info!("{}", message);
        return Ok(KeyMigrationOutcome { performed: false, dry_run: true, message });
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| DataMigrationError::CopyFailed(e.to_string()))?;
    }
    std::fs::copy(&src, &dest).map_err(|e| DataMigrationError::CopyFailed(e.to_string()))?;
    if let Some(owner) = owner_for_destination(&dest) {
        sys::chown(&dest, owner);
    }
    sys::set_mode(&dest, 0o600).map_err(|e| DataMigrationError::CopyFailed(e.to_string()))?;

    let message = format!("Node key migrated from {} to {}.", src.display(), dest.display());
    info!("{}", message);
    Ok(KeyMigrationOutcome { performed: true, dry_run: false, message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[test]
    fn key_is_copied_with_restrictive_mode_and_source_kept() {
        let root = TempDir::new().unwrap();
        let src = root.path().join("node-key");
        let dest = root.path().join("common/node-key");
        std::fs::write(&src, "secret").unwrap();

        let outcome = migrate_node_key(Some(src.clone()), Some(dest.clone()), false, false).unwrap();
        assert!(outcome.performed);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "secret");
        assert!(src.exists());
        let mode = std::fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn missing_key_is_a_noop() {
        let root = TempDir::new().unwrap();
        let outcome = migrate_node_key(
            Some(root.path().join("missing")),
            Some(root.path().join("dest")),
            false,
            false,
        )
        .unwrap();
        assert!(!outcome.performed);
        assert!(outcome.message.contains("No node key"));
    }

    #[test]
    fn dry_run_does_not_copy() {
        let root = TempDir::new().unwrap();
        let src = root.path().join("node-key");
        let dest = root.path().join("dest/node-key");
        std::fs::write(&src, "secret").unwrap();

        let outcome = migrate_node_key(Some(src), Some(dest.clone()), true, false).unwrap();
        assert!(outcome.dry_run);
        assert!(!dest.exists());
    }

    #[test]
    fn reverse_copies_back() {
        let root = TempDir::new().unwrap();
        let legacy = root.path().join("node-key");
        let snap = root.path().join("common/node-key");
        std::fs::create_dir_all(snap.parent().unwrap()).unwrap();
        std::fs::write(&snap, "secret").unwrap();

        let outcome = migrate_node_key(Some(legacy.clone()), Some(snap), false, true).unwrap();
        assert!(outcome.performed);
        assert_eq!(std::fs::read_to_string(&legacy).unwrap(), "secret");
    }
}
