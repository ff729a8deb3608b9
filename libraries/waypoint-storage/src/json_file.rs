//! File-backed key-value store

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use waypoint_core::{KeyValueStore, StorageError, StorageResult};

/// Durable store persisting every key into a single JSON object
///
/// The whole document is rewritten on each mutation through a temporary file
/// and a rename, so a crash mid-write leaves the previous document intact.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`
    ///
    /// A missing file is treated as an empty store. A file that is not a JSON
    /// object of strings is an error rather than being silently overwritten.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StorageError::Io(e)),
        };

        debug!("Opened progress store {} ({} keys)", path.display(), entries.len());

        Ok(Self { path, entries })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let raw = serde_json::to_string_pretty(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        let previous = self.entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist() {
            // Keep memory consistent with what is on disk
            match previous {
                Some(old) => self.entries.insert(key.to_string(), old),
                None => self.entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        if self.entries.remove(key).is_some() {
            self.persist()?;
        }
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
    use tempfile::TempDir;

    #[test]
    fn values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.json");

        {
            let mut store = JsonFileStore::open(&path).unwrap();
            store.set("tour:rome:stop:1", r#"{"completed":true}"#).unwrap();
            store.set("prefs", r#"{"selectedLanguage":"de"}"#).unwrap();
        }

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(
            store.get("tour:rome:stop:1").unwrap().as_deref(),
            Some(r#"{"completed":true}"#)
        );
        assert_eq!(store.keys_with_prefix("tour:").unwrap().len(), 1);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "not json").unwrap();

        let result = JsonFileStore::open(&path);
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }

    #[test]
    fn empty_file_is_an_empty_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "").unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert!(store.keys_with_prefix("").unwrap().is_empty());
    }
}
