//! In-memory key-value store

use std::collections::BTreeMap;
use waypoint_core::{KeyValueStore, StorageResult};

/// Volatile store
///
/// Keys are kept ordered so prefix scans are deterministic.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let mut store = MemoryStore::new();
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));

        store.set("a", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));

        store.remove("a").unwrap();
        assert!(store.get("a").unwrap().is_none());
        // Removing twice is fine
        store.remove("a").unwrap();
    }

    #[test]
    fn prefix_scan_only_returns_matching_keys() {
        let mut store = MemoryStore::new();
        store.set("tour:a:stop:1", "{}").unwrap();
        store.set("tour:a:stop:2", "{}").unwrap();
        store.set("tour:b:stop:1", "{}").unwrap();
        store.set("prefs", "{}").unwrap();

        let keys = store.keys_with_prefix("tour:a:stop:").unwrap();
        assert_eq!(keys, vec!["tour:a:stop:1", "tour:a:stop:2"]);
    }
}
