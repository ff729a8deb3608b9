//! Playback Events
//!
//! Event-based communication between the components and the UI. Each
//! component queues its own events and the owner drains them:
//! - [`SessionEvent`] from the audio session (media lifecycle)
//! - [`NavigationEvent`] from the tour navigator (stop and intent changes)
//! - [`PlayerEvent`] from the tour player, the only stream a UI needs

use crate::error::MediaError;
use crate::preloader::PreloadWindow;
use crate::types::{PlaybackState, SourceGeneration};
use serde::{Deserialize, Serialize};
use waypoint_core::StopId;

/// Events emitted by the audio session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// A new source was assigned
    SourceChanged {
        url: String,
        generation: SourceGeneration,
    },

    /// Duration became known for the current source (once per source)
    DurationKnown {
        generation: SourceGeneration,
        duration: f64,
    },

    /// Playhead update
    Progress {
        generation: SourceGeneration,
        current_time: f64,
        duration: f64,
        /// 0-100
        percent: f64,
    },

    PlaybackStarted { generation: SourceGeneration },
    PlaybackPaused { generation: SourceGeneration },

    /// The source played to its end (once per playthrough)
    Ended { generation: SourceGeneration },

    /// The platform refused to play; intent was reset to paused
    PlaybackBlocked {
        generation: SourceGeneration,
        reason: String,
    },

    /// A stall was detected and a reload is scheduled
    StallRecovering {
        generation: SourceGeneration,
        attempt: u32,
    },

    Error {
        generation: SourceGeneration,
        error: MediaError,
    },
}

/// Events emitted by the tour navigator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NavigationEvent {
    /// The current stop changed
    StopChanged {
        stop_id: StopId,
        previous: Option<StopId>,
    },

    /// User intent flipped between playing and paused
    PlayIntentChanged { playing: bool },

    /// Debounce window after next/previous opened or closed
    SwitchingTracks { active: bool },

    /// A narration ended on its own and the completion window opened
    CompletionStarted { stop_id: StopId },

    CompletionEnded { stop_id: StopId },

    /// The tour's transition clip should play during the completion window
    TransitionAudioStarted { url: String },

    TransitionAudioEnded,

    /// Advanced past the last audio stop
    TourFinished,
}

/// Events a UI consumes from the tour player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlayerEvent {
    /// The visible playback state changed
    StateChanged(PlaybackState),

    /// Forwarded navigator event
    Navigation(NavigationEvent),

    /// Tour percentage changed (0-100)
    TourProgress { percent: f64 },

    /// Every audio stop is completed (emitted once)
    TourCompleted,

    /// Preload window for the new current stop
    PreloadWindowChanged(PreloadWindow),

    /// The saved position from a deep link or auto-resume was applied
    ResumeSeekApplied { stop_id: StopId, position: f64 },

    /// Playback could not start; the player is paused
    PlaybackBlocked { reason: String },

    MediaError(MediaError),
}
