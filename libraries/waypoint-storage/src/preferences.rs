//! User preference persistence
//!
//! Preferences live under a single key next to the progress entries. Reads
//! never fail: an unreadable value falls back to defaults.

use tracing::warn;
use waypoint_core::storage::{get_json, keys, set_json};
use waypoint_core::{KeyValueStore, Preferences, StorageResult};

/// Load preferences, falling back to defaults on any storage error
pub fn load_preferences(store: &dyn KeyValueStore) -> Preferences {
    match get_json::<Preferences>(store, keys::PREFERENCES) {
        Ok(Some(prefs)) => prefs,
        Ok(None) => Preferences::default(),
        Err(e) => {
            warn!("Failed to read preferences, using defaults: {}", e);
            Preferences::default()
        }
    }
}

/// Persist preferences
pub fn save_preferences(store: &mut dyn KeyValueStore, prefs: &Preferences) -> StorageResult<()> {
    set_json(store, keys::PREFERENCES, prefs)
}

/// Remember the language the user picked
pub fn save_selected_language(store: &mut dyn KeyValueStore, code: &str) -> StorageResult<()> {
    let mut prefs = load_preferences(store);
    prefs.selected_language = Some(code.to_string());
    save_preferences(store, &prefs)
}
