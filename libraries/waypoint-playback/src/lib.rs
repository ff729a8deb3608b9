//! Waypoint - Tour Playback
//!
//! Platform-agnostic playback core for narrated tours.
//!
//! This crate provides:
//! - A single shared audio session with stale-event protection and stall recovery
//! - Tour navigation over audio stops (select, next/previous, natural completion)
//! - Persisted per-stop progress and a duration-weighted tour percentage
//! - Deep link and auto-resume resolution of the opening stop
//! - Background preloading of narrations and stop images
//!
//! # Architecture
//!
//! `waypoint-playback` never touches a media element, a clock or a storage
//! medium directly:
//! - Media playback is a [`MediaBackend`], background fetching a [`MediaFetcher`]
//! - Time is passed in as [`std::time::Instant`] so every timer is testable
//! - Progress goes through [`waypoint_core::KeyValueStore`]
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Instant;
//! use waypoint_core::{Tour, TourId};
//! use waypoint_playback::{
//!     AudioSession, MediaBackend, MediaError, PlayerConfig, ProgressTracker,
//!     SourceGeneration, TourPlayer,
//! };
//! use waypoint_storage::MemoryStore;
//!
//! struct Silent;
//!
//! impl MediaBackend for Silent {
//!     fn load(&mut self, _url: &str, _generation: SourceGeneration) {}
//!     fn play(&mut self) -> Result<(), MediaError> { Ok(()) }
//!     fn pause(&mut self) {}
//!     fn set_current_time(&mut self, _seconds: f64) {}
//!     fn unload(&mut self) {}
//! }
//!
//! let tour = Arc::new(Tour::from_json(r#"{
//!     "id": "rome", "language": "en",
//!     "stops": [{ "type": "audio", "id": "1", "title": "Forum", "audioFile": "forum.mp3" }]
//! }"#).unwrap());
//!
//! let config = PlayerConfig::default();
//! let session = AudioSession::shared(Box::new(Silent), config.session.clone());
//! let progress = ProgressTracker::new(
//!     TourId::new("rome"),
//!     Box::new(MemoryStore::new()),
//!     config.progress.clone(),
//! );
//!
//! let mut player = TourPlayer::new(tour, session, progress, config);
//! let plan = player.resolve_initial_state(None, Instant::now()).unwrap();
//! assert_eq!(plan.stop_id, "1");
//! assert!(!player.playback_state().is_playing);
//! ```

#![forbid(unsafe_code)]

pub mod backend;
pub mod error;
pub mod events;
pub mod navigator;
pub mod player;
pub mod preloader;
pub mod progress;
pub mod resume;
pub mod session;
pub mod types;

pub use backend::{MediaBackend, MediaEvent, MediaEventKind, MediaFetcher, PreloadHandle};
pub use error::{MediaError, NavigationError};
pub use events::{NavigationEvent, PlayerEvent, SessionEvent};
pub use navigator::{NavigatorState, TourNavigator, TransitionPhase};
pub use player::TourPlayer;
pub use preloader::{AssetsReport, PreloadWindow, Preloader};
pub use progress::ProgressTracker;
pub use resume::{resolve_initial_stop, ResumePlan, ResumeSource};
pub use session::{lock_session, AudioSession, SharedAudioSession};
pub use types::{
    NavigatorConfig, PlaybackState, PlayerConfig, PreloadConfig, ProgressConfig, SessionConfig,
    SourceGeneration,
};
