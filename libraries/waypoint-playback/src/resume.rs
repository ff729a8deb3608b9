//! Initial stop resolution
//!
//! Decides where a freshly opened tour starts. A valid deep link wins and
//! starts playing at the stop's saved position. Otherwise the tour resumes at
//! the first audio stop not yet completed, cued but paused.

use crate::progress::ProgressTracker;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use waypoint_core::{StopId, Tour};

/// How the initial stop was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResumeSource {
    DeepLink,
    AutoResume,
}

/// Where to start and how
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumePlan {
    pub stop_id: StopId,

    /// Saved position to apply once the duration is known
    pub seek_to: Option<f64>,

    /// Start playing right away
    pub autoplay: bool,

    /// Skip the tour start card
    pub has_started: bool,

    /// Stop card to bring into view
    pub scroll_to: Option<StopId>,

    pub source: ResumeSource,
}

/// Resolve the stop a tour opens on
///
/// Returns `None` only for tours without audio stops.
pub fn resolve_initial_stop(
    tour: &Tour,
    url_stop_id: Option<&str>,
    progress: &ProgressTracker,
) -> Option<ResumePlan> {
    if let Some(requested) = url_stop_id.filter(|id| !id.is_empty()) {
        match tour.audio_stop(requested) {
            Some(stop) => {
                info!("Deep link to stop {}", stop.id);
                return Some(ResumePlan {
                    stop_id: stop.id.clone(),
                    seek_to: saved_position(progress, stop.id.as_str()),
                    autoplay: true,
                    has_started: true,
                    scroll_to: Some(stop.id.clone()),
                    source: ResumeSource::DeepLink,
                });
            }
            None => warn!(
                "Deep link to {} does not name an audio stop, resuming instead",
                requested
            ),
        }
    }

    let resume = tour
        .audio_stops()
        .find(|s| !progress.is_stop_completed(s.id.as_str()));
    let (stop, seek_to) = match resume {
        Some(stop) => (stop, saved_position(progress, stop.id.as_str())),
        None => (tour.first_audio_stop()?, None),
    };

    debug!("Auto-resume at stop {} ({:?})", stop.id, seek_to);
    Some(ResumePlan {
        stop_id: stop.id.clone(),
        seek_to,
        autoplay: false,
        has_started: false,
        scroll_to: None,
        source: ResumeSource::AutoResume,
    })
}

fn saved_position(progress: &ProgressTracker, stop_id: &str) -> Option<f64> {
    let position = progress.stop_position(stop_id);
    (position > 0.0).then_some(position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProgressConfig;
    use std::time::Instant;
    use waypoint_core::TourId;
    use waypoint_storage::MemoryStore;

    fn tour() -> Tour {
        Tour::from_json(
            r#"{ "id": "t", "language": "en", "stops": [
                { "type": "text", "id": "intro", "content": "..." },
                { "type": "audio", "id": "A", "title": "A", "audioFile": "a.mp3", "duration": 120 },
                { "type": "audio", "id": "C", "title": "C", "audioFile": "c.mp3", "duration": 60 }
            ] }"#,
        )
        .unwrap()
    }

    fn tracker() -> ProgressTracker {
        ProgressTracker::new(
            TourId::new("t"),
            Box::new(MemoryStore::new()),
            ProgressConfig::default(),
        )
    }

    #[test]
    fn deep_link_autoplays_at_saved_position() {
        let mut progress = tracker();
        progress.record_progress(&StopId::new("C"), 42.0, 60.0, Instant::now());

        let plan = resolve_initial_stop(&tour(), Some("C"), &progress).unwrap();
        assert_eq!(plan.stop_id, "C");
        assert_eq!(plan.seek_to, Some(42.0));
        assert!(plan.autoplay);
        assert!(plan.has_started);
        assert_eq!(plan.scroll_to.as_ref().unwrap(), "C");
        assert_eq!(plan.source, ResumeSource::DeepLink);
    }

    #[test]
    fn invalid_deep_link_falls_back_to_auto_resume() {
        let plan = resolve_initial_stop(&tour(), Some("intro"), &tracker()).unwrap();
        assert_eq!(plan.stop_id, "A");
        assert_eq!(plan.source, ResumeSource::AutoResume);
        assert!(!plan.autoplay);
        assert_eq!(plan.seek_to, None);
    }

    #[test]
    fn auto_resume_skips_completed_stops() {
        let mut progress = tracker();
        progress.mark_completed(&StopId::new("A"), Instant::now());
        progress.record_progress(&StopId::new("C"), 30.0, 60.0, Instant::now());

        let plan = resolve_initial_stop(&tour(), None, &progress).unwrap();
        assert_eq!(plan.stop_id, "C");
        assert_eq!(plan.seek_to, Some(30.0));
        assert!(!plan.has_started);
    }

    #[test]
    fn fully_completed_tour_restarts_from_the_top() {
        let mut progress = tracker();
        progress.mark_completed(&StopId::new("A"), Instant::now());
        progress.mark_completed(&StopId::new("C"), Instant::now());

        let plan = resolve_initial_stop(&tour(), None, &progress).unwrap();
        assert_eq!(plan.stop_id, "A");
        assert_eq!(plan.seek_to, None);
    }

    #[test]
    fn tour_without_audio_has_no_plan() {
        let tour = Tour::from_json(
            r#"{ "id": "t", "language": "en", "stops": [
                { "type": "text", "id": "x", "content": "..." }
            ] }"#,
        )
        .unwrap();
        assert!(resolve_initial_stop(&tour, None, &tracker()).is_none());
    }
}
