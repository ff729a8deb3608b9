//! Core types for playback management

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use waypoint_core::StopId;

/// Identity of one `set_source` call on the audio session
///
/// Every media event is tagged with the generation that was current when the
/// source was assigned. Events carrying an older generation are stale and
/// must not affect state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceGeneration(u64);

impl SourceGeneration {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// Generation following this one
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for SourceGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Snapshot of what the UI should show
///
/// `is_playing` is the user's intent as tracked by the navigator, the timing
/// figures come from the audio session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub current_stop_id: Option<StopId>,
    pub is_playing: bool,

    /// Seconds into the current narration
    pub current_time: f64,

    /// Duration of the current narration, 0 while unknown
    pub duration: f64,

    /// Position within the current narration (0-100)
    pub progress_percent: f64,

    /// Any navigator transition (switch debounce or completion window)
    pub is_transitioning: bool,

    /// Completion window after a narration ended on its own
    pub is_completing: bool,

    /// Debounce window after next/previous
    pub is_switching_tracks: bool,
}

// ===== Configuration =====

/// Audio session tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seek distance used by skip forward/backward (default: 15s)
    pub skip_seconds: f64,

    /// Distance kept from the end when skipping forward (default: 0.5s)
    pub end_guard_seconds: f64,

    /// Tracks shorter than this skip all the way to the end (default: 5s)
    pub end_guard_min_duration: f64,

    /// Reload attempts before a stall is reported (default: 2)
    pub stall_retry_budget: u32,

    /// Base delay between stall retries, multiplied by the attempt (default: 1000ms)
    pub stall_backoff_ms: u64,

    /// Playing without a time update for this long counts as a stall (default: 8000ms)
    pub stall_timeout_ms: u64,
}

impl SessionConfig {
    pub fn stall_backoff(&self) -> Duration {
        Duration::from_millis(self.stall_backoff_ms)
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            skip_seconds: 15.0,
            end_guard_seconds: 0.5,
            end_guard_min_duration: 5.0,
            stall_retry_budget: 2,
            stall_backoff_ms: 1000,
            stall_timeout_ms: 8000,
        }
    }
}

/// Navigator timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    /// Debounce window after next/previous (default: 300ms)
    pub switch_debounce_ms: u64,

    /// Completion window after a narration ends (default: 1500ms)
    pub completion_window_ms: u64,
}

impl NavigatorConfig {
    pub fn switch_debounce(&self) -> Duration {
        Duration::from_millis(self.switch_debounce_ms)
    }

    pub fn completion_window(&self) -> Duration {
        Duration::from_millis(self.completion_window_ms)
    }
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            switch_debounce_ms: 300,
            completion_window_ms: 1500,
        }
    }
}

/// Progress persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Fraction of the duration after which a stop counts as completed (default: 0.95)
    pub completion_threshold: f64,

    /// Minimum interval between position writes for one stop (default: 2000ms)
    pub write_throttle_ms: u64,
}

impl ProgressConfig {
    pub fn write_throttle(&self) -> Duration {
        Duration::from_millis(self.write_throttle_ms)
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            completion_threshold: 0.95,
            write_throttle_ms: 2000,
        }
    }
}

/// Preloading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreloadConfig {
    /// Upcoming narrations buffered ahead of the current one (default: 1)
    pub preload_count: usize,

    /// Delay before evicting preloads outside the window (default: 5000ms)
    pub cleanup_debounce_ms: u64,

    /// Concurrent image fetches during the asset phase (default: 3)
    pub image_batch_size: usize,
}

impl PreloadConfig {
    pub fn cleanup_debounce(&self) -> Duration {
        Duration::from_millis(self.cleanup_debounce_ms)
    }
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            preload_count: 1,
            cleanup_debounce_ms: 5000,
            image_batch_size: 3,
        }
    }
}

/// Everything the tour player needs, loadable as one config section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub session: SessionConfig,
    pub navigator: NavigatorConfig,
    pub progress: ProgressConfig,
    pub preload: PreloadConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PlayerConfig::default();
        assert_eq!(config.session.skip_seconds, 15.0);
        assert_eq!(config.session.end_guard_seconds, 0.5);
        assert_eq!(config.session.stall_retry_budget, 2);
        assert_eq!(config.navigator.switch_debounce(), Duration::from_millis(300));
        assert_eq!(config.navigator.completion_window(), Duration::from_millis(1500));
        assert_eq!(config.progress.completion_threshold, 0.95);
        assert_eq!(config.progress.write_throttle(), Duration::from_secs(2));
        assert_eq!(config.preload.preload_count, 1);
        assert_eq!(config.preload.image_batch_size, 3);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config: PlayerConfig =
            serde_json::from_str(r#"{ "navigator": { "switch_debounce_ms": 500 } }"#).unwrap();
        assert_eq!(config.navigator.switch_debounce_ms, 500);
        assert_eq!(config.navigator.completion_window_ms, 1500);
        assert_eq!(config.session, SessionConfig::default());
    }

    #[test]
    fn generations_are_ordered() {
        let first = SourceGeneration::default();
        let second = first.next();
        assert!(second > first);
        assert_eq!(second.value(), 1);
        assert_eq!(second.to_string(), "#1");
    }
}
