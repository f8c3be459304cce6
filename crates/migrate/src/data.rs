//! Bulk chain-data migration.

use serde::Serialize;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use warden_common::{sys, DataMigrationError};

use crate::{dir_is_empty, orient, owner_for_destination, LEGACY_DATA_DIR, SNAP_DATA_DIR};

/// How the data gets from source to destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationMethod {
    /// Atomic rename, same filesystem.
    Rename,
    /// File-by-file copy with source removal, cross-filesystem.
    Copy,
    /// Nothing to do.
    None,
}

/// Result of a (possibly dry-run) migration.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationOutcome {
    pub performed: bool,
    pub method: MigrationMethod,
    pub reason: String,
    pub dry_run: bool,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub size_bytes: u64,
    pub estimated_time: Option<String>,
}

/// Moves the node's database tree between the legacy layout and the snap
/// common layout.
pub struct DataMigrator {
    src: PathBuf,
    dest: PathBuf,
}

impl DataMigrator {
    /// `reverse` swaps the roles of source and destination.
    pub fn new(src: Option<PathBuf>, dest: Option<PathBuf>, reverse: bool) -> Self {
        let src = src.unwrap_or_else(|| PathBuf::from(LEGACY_DATA_DIR));
        let dest = dest.unwrap_or_else(|| PathBuf::from(SNAP_DATA_DIR));
        let (src, dest) = orient(src, dest, reverse);
        Self { src, dest }
    }

    /// Whether there is anything to migrate. An absent or empty source, or a
    /// destination that already contains data, means "nothing to do" rather
    /// than an error.
    pub fn check_needed(&self) -> (bool, String) {
        info!("Checking if migration is needed from {} to {}", self.src.display(), self.dest.display());
        if !self.src.exists() {
            return (false, format!("Source data directory {} does not exist", self.src.display()));
        }
        if dir_is_empty(&self.src) {
            return (false, format!("Source data directory {} is empty", self.src.display()));
        }
        if self.dest.exists() && !dir_is_empty(&self.dest) {
            return (
                false,
                format!("Destination data directory {} already contains data", self.dest.display()),
            );
        }
        (true, "Migration needed".to_string())
    }

    /// Move the data. With `dry_run` the chosen method and a time estimate
    /// are reported without touching the filesystem.
    ///
    /// The copy path removes each source file only after its copy has been
    /// written, but there is no automatic rollback if post-transfer
    /// verification fails; the operator must inspect both locations.
    pub fn move_data(&self, dry_run: bool) -> Result<MigrationOutcome, DataMigrationError> {
        info!("Starting data migration (dry_run={})", dry_run);

        let (needed, reason) = self.check_needed();
        if !needed {
            return Ok(MigrationOutcome {
                performed: false,
                method: MigrationMethod::None,
                reason,
                dry_run,
                source: self.src.clone(),
                destination: self.dest.clone(),
                size_bytes: 0,
                estimated_time: None,
            });
        }

        let size_bytes = tree_size(&self.src);
        let method = if self.can_use_rename() {
            MigrationMethod::Rename
        } else {
            MigrationMethod::Copy
        };
        info!("Using migration method: {:?}", method);

        if dry_run {
            return Ok(MigrationOutcome {
                performed: false,
                method,
                reason: "Dry run".to_string(),
                dry_run: true,
                source: self.src.clone(),
                destination: self.dest.clone(),
                size_bytes,
                estimated_time: Some(estimate_time(size_bytes, method)),
            });
        }

        if let Some(parent) = self.dest.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DataMigrationError::MoveFailed(e.to_string()))?;
        }

        match method {
            MigrationMethod::Rename => {
                std::fs::rename(&self.src, &self.dest)
                    .map_err(|e| DataMigrationError::MoveFailed(e.to_string()))?;
            }
            MigrationMethod::Copy => {
                copy_and_drain(&self.src, &self.dest)?;
                remove_empty_dirs(&self.src);
            }
            MigrationMethod::None => unreachable!(),
        }

        self.verify()?;

        if let Some(owner) = owner_for_destination(&self.dest) {
            sys::chown_recursive(&self.dest, owner);
        }

        Ok(MigrationOutcome {
            performed: true,
            method,
            reason: "Migration complete".to_string(),
            dry_run: false,
            source: self.src.clone(),
            destination: self.dest.clone(),
            size_bytes,
            estimated_time: None,
        })
    }

    /// Rename is safe when source and destination parent share a device and
    /// the source is not itself a mount point.
    fn can_use_rename(&self) -> bool {
        let src_meta = match std::fs::metadata(&self.src) {
            Ok(m) => m,
            Err(_) => return false,
        };
        let dest_parent = match self.dest.parent() {
            Some(p) if p.exists() => p,
            _ => return false,
        };
        let dest_meta = match std::fs::metadata(dest_parent) {
            Ok(m) => m,
            Err(_) => return false,
        };
        let same_device = src_meta.dev() == dest_meta.dev();
        let src_is_mountpoint = is_mount_point(&self.src);
        info!("Move analysis: same_device={}, source_mountpoint={}", same_device, src_is_mountpoint);
        same_device && !src_is_mountpoint
    }

    fn verify(&self) -> Result<(), DataMigrationError> {
        if !self.dest.exists() || dir_is_empty(&self.dest) {
            return Err(DataMigrationError::VerificationFailed(format!(
                "destination {} is empty",
                self.dest.display()
            )));
        }
        if self.src.exists() && !dir_is_empty(&self.src) {
            return Err(DataMigrationError::VerificationFailed(format!(
                "source {} still contains files",
                self.src.display()
            )));
        }
        info!("Migration verification passed");
        Ok(())
    }
}

/// A directory whose device differs from its parent's is a mount point.
fn is_mount_point(path: &Path) -> bool {
    let (meta, parent_meta) = match (std::fs::metadata(path), path.parent().and_then(|p| std::fs::metadata(p).ok())) {
        (Ok(m), Some(p)) => (m, p),
        _ => return false,
    };
    meta.dev() != parent_meta.dev()
}

fn tree_size(path: &Path) -> u64 {
    let mut total = 0;
    let entries = match std::fs::read_dir(path) {
        Ok(e) => e,
        Err(_) => return 0,
    };
    for entry in entries.flatten() {
        let p = entry.path();
        if p.is_dir() {
            total += tree_size(&p);
        } else if let Ok(meta) = p.metadata() {
            total += meta.len();
        }
    }
    total
}

/// Copy the tree file by file, removing each source file once its copy has
/// been written.
fn copy_and_drain(src: &Path, dest: &Path) -> Result<(), DataMigrationError> {
    std::fs::create_dir_all(dest).map_err(|e| DataMigrationError::CopyFailed(e.to_string()))?;
    let entries = std::fs::read_dir(src).map_err(|e| DataMigrationError::CopyFailed(e.to_string()))?;
    for entry in entries {
        let entry = entry.map_err(|e| DataMigrationError::CopyFailed(e.to_string()))?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        if from.is_dir() {
            copy_and_drain(&from, &to)?;
        } else {
            std::fs::copy(&from, &to)
                .map_err(|e| DataMigrationError::CopyFailed(format!("{}: {e}", from.display())))?;
            std::fs::remove_file(&from)
                .map_err(|e| DataMigrationError::CopyFailed(format!("{}: {e}", from.display())))?;
        }
    }
    Ok(())
}

/// Remove the emptied directory skeleton bottom-up; non-empty directories
/// are left in place.
fn remove_empty_dirs(path: &Path) {
    if let Ok(entries) = std::fs::read_dir(path) {
        for entry in entries.flatten() {
            let p = entry.path();
            if p.is_dir() {
                remove_empty_dirs(&p);
            }
        }
    }
    if dir_is_empty(path) {
        if let Err(e) = std::fs::remove_dir(path) {
            warn!("Failed to remove empty directory {}: {}", path.display(), e);
        }
    }
}

fn estimate_time(size_bytes: u64, method: MigrationMethod) -> String {
    if method == MigrationMethod::Rename {
        return "< 1 second (atomic operation)".to_string();
    }
    // Rough copy throughput assumption of 100MB/s.
    let seconds = size_bytes as f64 / (100.0 * 1024.0 * 1024.0);
    if seconds < 60.0 {
        format!("~{seconds:.0} seconds")
    } else if seconds < 3600.0 {
        format!("~{:.1} minutes", seconds / 60.0)
    } else {
        format!("~{:.1} hours", seconds / 3600.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn populate(dir: &Path) {
        std::fs::create_dir_all(dir.join("chains/westend2/db")).unwrap();
        std::fs::write(dir.join("chains/westend2/db/000001.sst"), b"blockdata").unwrap();
        std::fs::write(dir.join("chains/westend2/lock"), b"").unwrap();
    }

    #[test]
    fn absent_source_is_not_needed() {
        let root = TempDir::new().unwrap();
        let migrator = DataMigrator::new(
            Some(root.path().join("missing")),
            Some(root.path().join("dest")),
            false,
        );
        let outcome = migrator.move_data(false).unwrap();
        assert!(!outcome.performed);
        assert_eq!(outcome.method, MigrationMethod::None);
        assert!(outcome.reason.contains("does not exist"));
    }

    #[test]
    fn populated_destination_is_not_needed() {
        let root = TempDir::new().unwrap();
        let src = root.path().join("src");
        let dest = root.path().join("dest");
        populate(&src);
        populate(&dest);
        let migrator = DataMigrator::new(Some(src.clone()), Some(dest), false);
        let outcome = migrator.move_data(false).unwrap();
        assert!(!outcome.performed);
        assert!(outcome.reason.contains("already contains data"));
        // Source untouched.
        assert!(src.join("chains/westend2/db/000001.sst").exists());
    }

    #[test]
    fn dry_run_touches_nothing() {
        let root = TempDir::new().unwrap();
        let src = root.path().join("src");
        let dest = root.path().join("dest");
        populate(&src);
        let migrator = DataMigrator::new(Some(src.clone()), Some(dest.clone()), false);
        let outcome = migrator.move_data(true).unwrap();
        assert!(outcome.dry_run);
        assert!(!outcome.performed);
        assert_eq!(outcome.method, MigrationMethod::Rename);
        assert!(outcome.estimated_time.is_some());
        assert!(src.exists());
        assert!(!dest.exists());
    }

    #[test]
    fn same_device_migration_renames_and_drains_source() {
        let root = TempDir::new().unwrap();
        let src = root.path().join("src");
        let dest = root.path().join("dest");
        populate(&src);
        let migrator = DataMigrator::new(Some(src.clone()), Some(dest.clone()), false);
        let outcome = migrator.move_data(false).unwrap();
        assert!(outcome.performed);
        assert_eq!(outcome.method, MigrationMethod::Rename);
        assert!(dest.join("chains/westend2/db/000001.sst").exists());
        assert!(!src.exists());
    }

    #[test]
    fn reverse_swaps_roles() {
        let root = TempDir::new().unwrap();
        let legacy = root.path().join("legacy");
        let snap = root.path().join("snap");
        populate(&snap);
        let migrator = DataMigrator::new(Some(legacy.clone()), Some(snap.clone()), true);
        let outcome = migrator.move_data(false).unwrap();
        assert!(outcome.performed);
        assert!(legacy.join("chains/westend2/db/000001.sst").exists());
        assert!(!snap.exists());
    }

    #[test]
    fn copy_and_drain_moves_tree() {
        let root = TempDir::new().unwrap();
        let src = root.path().join("src");
        let dest = root.path().join("dest");
        populate(&src);
        copy_and_drain(&src, &dest).unwrap();
        remove_empty_dirs(&src);
        assert!(dest.join("chains/westend2/db/000001.sst").exists());
        assert!(dest.join("chains/westend2/lock").exists());
        assert!(!src.exists());
    }

    #[test]
    fn estimates_scale_with_method() {
        assert!(estimate_time(0, MigrationMethod::Rename).contains("atomic"));
        assert!(estimate_time(500 * 1024 * 1024, MigrationMethod::Copy).contains("seconds"));
        assert!(estimate_time(200 * 1024 * 1024 * 1024, MigrationMethod::Copy).contains("minutes"));
    }
}
