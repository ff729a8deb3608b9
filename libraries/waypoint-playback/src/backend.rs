//! Platform-agnostic media traits
//!
//! The playback core never touches a real media element. Platforms implement
//! [`MediaBackend`] for the single narration element and [`MediaFetcher`] for
//! background buffering, then feed native notifications back as
//! [`MediaEvent`]s tagged with the generation they were loaded under.

use crate::error::MediaError;
use crate::types::SourceGeneration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The one media element the session drives
///
/// Calls are fire-and-forget; the backend reports their effect later through
/// [`MediaEvent`]s. `play` may fail synchronously when the platform refuses
/// outright, otherwise a refusal arrives as [`MediaEventKind::PlayRejected`].
pub trait MediaBackend: Send {
    /// Start loading `url`, tagging every subsequent event with `generation`
    fn load(&mut self, url: &str, generation: SourceGeneration);

    /// Request playback of the loaded source
    fn play(&mut self) -> Result<(), MediaError>;

    fn pause(&mut self);

    /// Move the playhead, in seconds
    fn set_current_time(&mut self, seconds: f64);

    /// Release the loaded resource
    fn unload(&mut self);
}

/// Native media notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaEvent {
    /// Generation the source was loaded under
    pub generation: SourceGeneration,
    pub kind: MediaEventKind,
}

impl MediaEvent {
    pub fn new(generation: SourceGeneration, kind: MediaEventKind) -> Self {
        Self { generation, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MediaEventKind {
    /// Duration became known
    LoadedMetadata { duration: f64 },

    /// Enough data is buffered to start
    CanPlay,

    /// Playhead moved
    TimeUpdate { current_time: f64 },

    Playing,
    Paused,

    /// Playback is waiting for data
    Waiting,

    /// The network stopped delivering data
    Stalled,

    /// Playback reached the end
    Ended,

    /// Load or decode failure
    Error { message: String },

    /// A play request was refused
    PlayRejected { reason: String },
}

/// Handle to a buffered resource held by the preloader
pub trait PreloadHandle: Send {
    /// Drop the underlying resource (detach source, abort download)
    fn release(&mut self);
}

/// Background fetching used by the preloader
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Buffer an audio file until it can play through
    async fn buffer_audio(&self, url: &str) -> Result<Box<dyn PreloadHandle>, MediaError>;

    /// Fetch an image into the platform cache
    async fn load_image(&self, url: &str) -> Result<(), MediaError>;
}
