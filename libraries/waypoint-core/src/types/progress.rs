//! Persisted progress and preference values

use super::ids::StopId;
use serde::{Deserialize, Serialize};

/// Listening progress for a single stop
///
/// Stored as JSON under `tour:{tour_id}:stop:{stop_id}`. Created on first
/// playback of a stop and only removed by an explicit progress reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopProgress {
    /// Stop this entry belongs to
    pub stop_id: StopId,

    /// Last known playback position in seconds
    pub last_position_seconds: f64,

    /// Whether the stop has been listened to completion
    pub completed: bool,
}

impl StopProgress {
    /// Create a fresh entry at position 0
    pub fn new(stop_id: StopId) -> Self {
        Self {
            stop_id,
            last_position_seconds: 0.0,
            completed: false,
        }
    }

    /// Mark completed. Returns true if this call changed the flag.
    ///
    /// Completion never reverts, so there is no inverse operation.
    pub fn mark_completed(&mut self) -> bool {
        let changed = !self.completed;
        self.completed = true;
        changed
    }
}

/// User preferences persisted alongside progress
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    /// Language code the user explicitly picked
    #[serde(default)]
    pub selected_language: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_is_sticky() {
        let mut progress = StopProgress::new(StopId::new("1"));
        assert!(progress.mark_completed());
        assert!(!progress.mark_completed());
        assert!(progress.completed);
    }

    #[test]
    fn stop_progress_uses_camel_case_keys() {
        let progress = StopProgress {
            stop_id: StopId::new("3"),
            last_position_seconds: 42.5,
            completed: false,
        };
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(json["stopId"], "3");
        assert_eq!(json["lastPositionSeconds"], 42.5);
        assert_eq!(json["completed"], false);
    }

    #[test]
    fn preferences_tolerate_missing_fields() {
        let prefs: Preferences = serde_json::from_str("{}").unwrap();
        assert_eq!(prefs.selected_language, None);
    }
}
