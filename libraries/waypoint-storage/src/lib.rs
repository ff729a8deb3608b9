//! Waypoint Storage
//!
//! Local persistence for the tour player.
//!
//! This crate provides:
//! - `MemoryStore`: volatile [`KeyValueStore`] for tests and degraded sessions
//! - `JsonFileStore`: durable [`KeyValueStore`] backed by one JSON document
//! - Preferences helpers (last selected language)
//! - `TourCatalog`: tour files indexed by id and language, with fallback
//!
//! # Example
//!
//! ```rust,no_run
//! use waypoint_storage::{JsonFileStore, preferences};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = JsonFileStore::open("progress.json")?;
//! preferences::save_selected_language(&mut store, "cs")?;
//! let prefs = preferences::load_preferences(&store);
//! assert_eq!(prefs.selected_language.as_deref(), Some("cs"));
//! # Ok(())
//! # }
//! ```
//!
//! [`KeyValueStore`]: waypoint_core::KeyValueStore

mod json_file;
mod memory;

pub mod catalog;
pub mod preferences;

pub use catalog::TourCatalog;
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
