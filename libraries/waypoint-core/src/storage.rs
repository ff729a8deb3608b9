//! Durable key-value store abstraction
//!
//! Progress and preferences are written through this trait so the core never
//! depends on a storage medium. Browser builds back it with local storage, the
//! CLI with a JSON file, tests with memory.

use crate::error::StorageResult;
use crate::types::{StopId, TourId};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Key-value store holding JSON-serialized values
///
/// Implementations must be cheap for single-key reads and writes; the progress
/// tracker calls `set` on throttled playback ticks.
pub trait KeyValueStore: Send {
    /// Read a raw value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write a raw value, replacing any previous one
    fn set(&mut self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete a value; deleting a missing key is not an error
    fn remove(&mut self, key: &str) -> StorageResult<()>;

    /// All keys starting with `prefix`
    fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>>;
}

/// Read and deserialize a JSON value
pub fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> StorageResult<Option<T>> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Serialize and write a JSON value
pub fn set_json<T: Serialize>(
    store: &mut dyn KeyValueStore,
    key: &str,
    value: &T,
) -> StorageResult<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

/// Key layout
///
/// Every progress key is namespaced by tour id so writes for different stops
/// never collide.
pub mod keys {
    use super::{StopId, TourId};

    /// Key holding the user's [`Preferences`](crate::Preferences)
    pub const PREFERENCES: &str = "prefs";

    /// Prefix shared by all progress entries of a tour
    pub fn tour_prefix(tour_id: &TourId) -> String {
        format!("tour:{}:stop:", tour_id)
    }

    /// Key of a single stop's progress entry
    pub fn stop_progress(tour_id: &TourId, stop_id: &StopId) -> String {
        format!("{}{}", tour_prefix(tour_id), stop_id)
    }
}
