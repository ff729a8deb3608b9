//! Waypoint Core
//!
//! Platform-agnostic tour data model, persisted value types, and storage traits
//! shared by every Waypoint crate.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Tour`, `Stop` (audio, gallery, quote, text, poi), `StopProgress`
//! - **Core Traits**: `KeyValueStore` (the durable local store the progress tracker writes to)
//! - **Error Handling**: `CoreError` and `StorageError`
//!
//! # Example
//!
//! ```rust
//! use waypoint_core::Tour;
//!
//! let json = r#"{
//!     "id": "rome-01",
//!     "language": "en",
//!     "title": "Ancient Rome",
//!     "stops": [
//!         { "type": "audio", "id": "1", "title": "The Colosseum",
//!           "audioFile": "audio/colosseum.mp3", "duration": 300 },
//!         { "type": "quote", "id": "q1", "quote": "Roma locuta, causa finita." }
//!     ]
//! }"#;
//!
//! let tour = Tour::from_json(json).unwrap();
//! assert_eq!(tour.audio_stop_count(), 1);
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod language;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use error::{CoreError, Result, StorageError, StorageResult};
pub use language::choose_language;
pub use storage::KeyValueStore;

pub use types::{
    AudioStop, GalleryImage, GalleryStop, Language, PoiStop, Preferences, QuoteStop, Stop,
    StopId, StopKind, StopProgress, TextStop, Tour, TourId,
};
