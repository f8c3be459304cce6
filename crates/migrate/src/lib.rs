//! Migration of on-disk chain state and the node identity key between the
//! legacy direct-install layout and the snap common layout, used when the
//! deployment mechanism switches.

mod data;
mod node_key;

pub use data::{DataMigrator, MigrationMethod, MigrationOutcome};
pub use node_key::{migrate_node_key, KeyMigrationOutcome};

use std::path::{Path, PathBuf};

/// Legacy database root of the direct-binary deployment.
pub const LEGACY_DATA_DIR: &str = "/home/polkadot/.local/share/polkadot";

/// Database root under the snap common directory.
pub const SNAP_DATA_DIR: &str = "/var/snap/polkadot/common/polkadot_base";

/// Node key path of the direct-binary deployment.
pub const LEGACY_NODE_KEY: &str = "/home/polkadot/node-key";

/// Node key path under the snap common directory.
pub const SNAP_NODE_KEY: &str = "/var/snap/polkadot/common/node-key";

/// Owner of a migrated tree, derived from which root it lives under.
pub(crate) fn owner_for_destination(dest: &Path) -> Option<&'static str> {
    if dest.starts_with("/var/snap/polkadot") {
        Some("root")
    } else if dest.starts_with("/home/polkadot") {
        Some("polkadot")
    } else {
        None
    }
}

pub(crate) fn dir_is_empty(path: &Path) -> bool {
    match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

/// Swap source and destination when running a reverse migration.
pub(crate) fn orient(src: PathBuf, dest: PathBuf, reverse: bool) -> (PathBuf, PathBuf) {
    if reverse {
        (dest, src)
    } else {
        (src, dest)
    }
}
