//! Tour aggregate

use super::ids::TourId;
use super::stop::{AudioStop, Stop};
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A guided tour in one language
///
/// Stop order is meaningful: it is the navigation sequence. A tour is
/// immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    /// Tour identifier, shared by all language versions
    pub id: TourId,

    /// Language code of this version
    pub language: String,

    /// Tour title
    #[serde(default)]
    pub title: String,

    /// Short description for the start card
    #[serde(default)]
    pub description: Option<String>,

    /// Ordered stops
    #[serde(default)]
    pub stops: Vec<Stop>,

    /// Short audio played between stops after a natural completion
    #[serde(default)]
    pub transition_audio: Option<String>,
}

impl Tour {
    /// Parse and validate a tour from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let tour: Tour = serde_json::from_str(json)?;
        tour.validate()?;
        Ok(tour)
    }

    /// Check structural invariants
    ///
    /// Stop ids must be non-empty and unique, and audio stops need a media URL.
    pub fn validate(&self) -> Result<()> {
        if self.id.as_str().is_empty() {
            return Err(CoreError::invalid_tour("missing tour id"));
        }
        if self.language.is_empty() {
            return Err(CoreError::invalid_tour(format!(
                "tour {} has no language",
                self.id
            )));
        }

        let mut seen = HashSet::new();
        for stop in &self.stops {
            let id = stop.id();
            if id.as_str().is_empty() {
                return Err(CoreError::invalid_tour(format!(
                    "tour {} has a stop without id",
                    self.id
                )));
            }
            if !seen.insert(id.as_str()) {
                return Err(CoreError::invalid_tour(format!(
                    "duplicate stop id {} in tour {}",
                    id, self.id
                )));
            }
            if let Some(audio) = stop.as_audio() {
                if audio.audio_file.is_empty() {
                    return Err(CoreError::invalid_tour(format!(
                        "audio stop {} has no audio file",
                        id
                    )));
                }
            }
        }

        Ok(())
    }

    /// Look up a stop of any kind
    pub fn stop(&self, id: &str) -> Option<&Stop> {
        self.stops.iter().find(|s| s.id().as_str() == id)
    }

    /// Look up an audio stop
    pub fn audio_stop(&self, id: &str) -> Option<&AudioStop> {
        self.stop(id).and_then(Stop::as_audio)
    }

    /// Position of a stop in tour order
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.stops.iter().position(|s| s.id().as_str() == id)
    }

    /// Audio stops in tour order
    pub fn audio_stops(&self) -> impl Iterator<Item = &AudioStop> {
        self.stops.iter().filter_map(Stop::as_audio)
    }

    pub fn first_audio_stop(&self) -> Option<&AudioStop> {
        self.audio_stops().next()
    }

    /// Nearest audio stop after `id`, skipping non-audio stops
    ///
    /// Returns `None` if `id` is unknown or is the last audio stop.
    pub fn next_audio_stop(&self, id: &str) -> Option<&AudioStop> {
        let index = self.index_of(id)?;
        self.stops[index + 1..].iter().find_map(Stop::as_audio)
    }

    /// Nearest audio stop before `id`, skipping non-audio stops
    pub fn previous_audio_stop(&self, id: &str) -> Option<&AudioStop> {
        let index = self.index_of(id)?;
        self.stops[..index].iter().rev().find_map(Stop::as_audio)
    }

    /// Up to `count` audio stops following `id`
    pub fn upcoming_audio_stops(&self, id: &str, count: usize) -> Vec<&AudioStop> {
        let Some(index) = self.index_of(id) else {
            return Vec::new();
        };
        self.stops[index + 1..]
            .iter()
            .filter_map(Stop::as_audio)
            .take(count)
            .collect()
    }

    pub fn audio_stop_count(&self) -> usize {
        self.audio_stops().count()
    }

    /// Sum of the duration hints of all audio stops, in seconds
    pub fn total_audio_duration(&self) -> f64 {
        self.audio_stops().filter_map(|s| s.duration).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tour() -> Tour {
        Tour::from_json(
            r#"{
                "id": "rome-01",
                "language": "en",
                "title": "Ancient Rome",
                "transitionAudio": "audio/chime.mp3",
                "stops": [
                    { "type": "text", "id": "intro", "content": "Welcome" },
                    { "type": "audio", "id": "A", "title": "A", "audioFile": "a.mp3", "duration": 120 },
                    { "type": "quote", "id": "B", "quote": "..." },
                    { "type": "audio", "id": "C", "title": "C", "audioFile": "c.mp3", "duration": 60 },
                    { "type": "poi", "id": "D", "title": "Fountain" }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn navigation_helpers_skip_non_audio_stops() {
        let tour = sample_tour();
        assert_eq!(tour.first_audio_stop().unwrap().id, "A");
        assert_eq!(tour.next_audio_stop("A").unwrap().id, "C");
        assert_eq!(tour.previous_audio_stop("C").unwrap().id, "A");
        assert!(tour.next_audio_stop("C").is_none());
        assert!(tour.previous_audio_stop("A").is_none());
        // From a non-audio stop the nearest audio neighbour is still found
        assert_eq!(tour.next_audio_stop("B").unwrap().id, "C");
        assert!(tour.next_audio_stop("missing").is_none());
    }

    #[test]
    fn derived_totals() {
        let tour = sample_tour();
        assert_eq!(tour.audio_stop_count(), 2);
        assert_eq!(tour.total_audio_duration(), 180.0);
        assert_eq!(tour.transition_audio.as_deref(), Some("audio/chime.mp3"));
        assert_eq!(tour.upcoming_audio_stops("intro", 5).len(), 2);
        assert_eq!(tour.upcoming_audio_stops("A", 1)[0].id, "C");
    }

    #[test]
    fn duplicate_stop_ids_are_rejected() {
        let result = Tour::from_json(
            r#"{ "id": "t", "language": "en", "stops": [
                { "type": "text", "id": "x", "content": "a" },
                { "type": "quote", "id": "x", "quote": "b" }
            ] }"#,
        );
        assert!(matches!(result, Err(CoreError::InvalidTour(_))));
    }

    #[test]
    fn audio_stop_requires_media() {
        let result = Tour::from_json(
            r#"{ "id": "t", "language": "en", "stops": [
                { "type": "audio", "id": "a", "title": "A", "audioFile": "" }
            ] }"#,
        );
        assert!(matches!(result, Err(CoreError::InvalidTour(_))));
    }
}
