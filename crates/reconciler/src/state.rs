//! Durable stored state. The last-applied configuration is persisted keyed
//! by logical field name and only ever written after the corresponding
//! reconciliation step succeeded, so diffs against it never flap on
//! transient read failures.

use std::path::Path;
use warden_common::WardenError;

const ENDPOINT_PREFIX: &str = "relay-endpoint:";

pub struct StateStore {
    db: sled::Db,
}

impl StateStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WardenError> {
        let db = sled::open(path).map_err(|e| WardenError::State(e.to_string()))?;
        Ok(Self { db })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.db
            .get(key)
            .ok()
            .flatten()
            .map(|v| String::from_utf8_lossy(&v).to_string())
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), WardenError> {
        self.db
            .insert(key, value.as_bytes())
            .map_err(|e| WardenError::State(e.to_string()))?;
        self.db.flush().map_err(|e| WardenError::State(e.to_string()))?;
        Ok(())
    }

    /// Set or clear depending on whether a value is present.
    pub fn set_opt(&self, key: &str, value: Option<&str>) -> Result<(), WardenError> {
        match value {
            Some(value) => self.set(key, value),
            None => self.remove(key),
        }
    }

    pub fn remove(&self, key: &str) -> Result<(), WardenError> {
        self.db.remove(key).map_err(|e| WardenError::State(e.to_string()))?;
        self.db.flush().map_err(|e| WardenError::State(e.to_string()))?;
        Ok(())
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).as_deref() == Some("true")
    }

    pub fn set_bool(&self, key: &str, value: bool) -> Result<(), WardenError> {
        self.set(key, if value { "true" } else { "false" })
    }
}

/// Relay RPC endpoints advertised by peer units, keyed by
/// `peer-identifier:relation-id` so the same peer appearing across relation
/// instances stays distinct. Persisted alongside the rest of stored state.
pub struct RelayEndpointSet<'a> {
    store: &'a StateStore,
}

impl<'a> RelayEndpointSet<'a> {
    pub fn new(store: &'a StateStore) -> Self {
        Self { store }
    }

    fn key(peer: &str, relation_id: u32) -> String {
        format!("{ENDPOINT_PREFIX}{peer}:{relation_id}")
    }

    pub fn add(&self, peer: &str, relation_id: u32, url: &str) -> Result<(), WardenError> {
        self.store.set(&Self::key(peer, relation_id), url)
    }

    pub fn remove(&self, peer: &str, relation_id: u32) -> Result<(), WardenError> {
        self.store.remove(&Self::key(peer, relation_id))
    }

    /// All known endpoint URLs in stable key order.
    pub fn urls(&self) -> Vec<String> {
        self.store
            .db
            .scan_prefix(ENDPOINT_PREFIX)
            .filter_map(|entry| entry.ok())
            .map(|(_, v)| String::from_utf8_lossy(&v).to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, StateStore) {
        let dir = TempDir::new().unwrap();
        let store = StateStore::open(dir.path().join("state")).unwrap();
        (dir, store)
    }

    #[test]
    fn values_round_trip() {
        let (_dir, store) = store();
        assert_eq!(store.get("binary-url"), None);
        store.set("binary-url", "https://host/polkadot").unwrap();
        assert_eq!(store.get("binary-url").as_deref(), Some("https://host/polkadot"));
        store.set_opt("binary-url", None).unwrap();
        assert_eq!(store.get("binary-url"), None);
    }

    #[test]
    fn bools_default_to_false() {
        let (_dir, store) = store();
        assert!(!store.get_bool("service-initialized"));
        store.set_bool("service-initialized", true).unwrap();
        assert!(store.get_bool("service-initialized"));
    }

    #[test]
    fn endpoint_departure_removes_only_the_composite_key() {
        let (_dir, store) = store();
        let endpoints = RelayEndpointSet::new(&store);
        endpoints.add("unit-a", 1, "ws://host-a:9944").unwrap();
        endpoints.add("unit-a", 2, "ws://host-a2:9944").unwrap();
        endpoints.add("unit-b", 1, "ws://host-b:9944").unwrap();
        assert_eq!(endpoints.urls().len(), 3);

        endpoints.remove("unit-a", 1).unwrap();
        let urls = endpoints.urls();
        assert_eq!(urls.len(), 2);
        assert!(urls.contains(&"ws://host-a2:9944".to_string()));
        assert!(urls.contains(&"ws://host-b:9944".to_string()));
    }
}
