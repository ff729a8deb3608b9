//! Error types for playback management
//!
//! Nothing here is fatal: media and storage failures are absorbed at the
//! component boundary and surface as events, navigation errors are returned
//! synchronously with state left untouched.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use waypoint_core::{StopId, StopKind};

/// Media-level failures reported by the platform
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum MediaError {
    /// The resource failed to load or decode
    #[error("Media failed to load: {0}")]
    Load(String),

    /// The platform refused to start playback (autoplay policy, interrupted session)
    #[error("Playback blocked: {0}")]
    PlaybackBlocked(String),

    /// Playback stayed stuck after every recovery attempt
    #[error("Playback stalled after {attempts} recovery attempts")]
    StallTimeout { attempts: u32 },

    /// A preload or asset fetch failed
    #[error("Fetch failed: {0}")]
    Fetch(String),
}

/// Rejected navigation requests
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    /// No stop with this id exists in the tour
    #[error("Stop not found: {0}")]
    UnknownStop(StopId),

    /// The stop exists but carries no narration
    #[error("Stop {id} is a {kind} stop, only audio stops can be played")]
    NotAudioStop { id: StopId, kind: StopKind },
}
