//! Property-based tests for navigation and progress
//!
//! Uses proptest to check invariants over random tours and input sequences.

use proptest::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use waypoint_core::{AudioStop, Stop, StopId, TextStop, Tour, TourId};
use waypoint_playback::{NavigatorConfig, ProgressConfig, ProgressTracker, TourNavigator};
use waypoint_storage::MemoryStore;

// ===== Helpers =====

/// A tour from a list of optional durations: `Some(d)` is an audio stop,
/// `None` a text card
fn build_tour(layout: &[Option<f64>]) -> Tour {
    let stops = layout
        .iter()
        .enumerate()
        .map(|(i, slot)| match slot {
            Some(duration) => Stop::Audio(AudioStop {
                id: StopId::new(format!("s{i}")),
                title: format!("Stop {i}"),
                audio_file: format!("s{i}.mp3"),
                duration: Some(*duration),
                transcription: None,
                image: None,
                image_caption: None,
            }),
            None => Stop::Text(TextStop {
                id: StopId::new(format!("s{i}")),
                title: None,
                content: "...".to_string(),
            }),
        })
        .collect();

    Tour {
        id: TourId::new("prop"),
        language: "en".to_string(),
        title: "Property tour".to_string(),
        description: None,
        stops,
        transition_audio: None,
    }
}

/// Layouts with at least one audio stop
fn arbitrary_layout() -> impl Strategy<Value = Vec<Option<f64>>> {
    prop::collection::vec(proptest::option::weighted(0.7, 5.0f64..600.0), 1..15)
        .prop_filter("needs an audio stop", |layout| layout.iter().any(Option::is_some))
}

// ===== Property Tests =====

proptest! {
    /// Property: advancing from the first audio stop visits every audio stop
    /// in order, then finishes
    #[test]
    fn advance_visits_every_audio_stop_in_order(layout in arbitrary_layout()) {
        let tour = Arc::new(build_tour(&layout));
        let expected: Vec<StopId> = tour.audio_stops().map(|s| s.id.clone()).collect();
        let mut nav = TourNavigator::new(Arc::clone(&tour), NavigatorConfig::default());

        nav.select_stop(expected[0].as_str()).unwrap();
        let mut visited = vec![nav.current_stop_id().unwrap().clone()];
        let mut now = Instant::now();

        for _ in 0..expected.len() {
            nav.advance(now);
            now += Duration::from_millis(300);
            nav.poll(now);
            if nav.is_finished() {
                break;
            }
            visited.push(nav.current_stop_id().unwrap().clone());
        }

        prop_assert!(nav.is_finished());
        prop_assert!(!nav.is_playing());
        prop_assert_eq!(visited, expected);
    }

    /// Property: under any input sequence the current stop is an audio stop,
    /// and playing implies a current stop
    #[test]
    fn current_stop_is_always_audio(
        layout in arbitrary_layout(),
        operations in prop::collection::vec((0u8..6, 0usize..15, 0u64..2000), 1..60)
    ) {
        let tour = Arc::new(build_tour(&layout));
        let mut nav = TourNavigator::new(Arc::clone(&tour), NavigatorConfig::default());
        let mut now = Instant::now();

        for (op, index, ms) in operations {
            match op {
                0 => {
                    let id = format!("s{}", index % layout.len());
                    let result = nav.select_stop(&id);
                    prop_assert_eq!(result.is_ok(), layout[index % layout.len()].is_some());
                }
                1 => nav.advance(now),
                2 => nav.retreat(now),
                3 => nav.on_track_natural_completion(now),
                4 => nav.toggle_play_pause(),
                _ => {
                    now += Duration::from_millis(ms);
                    nav.poll(now);
                }
            }

            if let Some(id) = nav.current_stop_id() {
                prop_assert!(tour.audio_stop(id.as_str()).is_some());
            }
            if nav.is_playing() {
                prop_assert!(nav.current_stop_id().is_some());
            }
            if let Some(pending) = nav.pending_stop_id() {
                prop_assert!(tour.audio_stop(pending.as_str()).is_some());
            }
        }
    }

    /// Property: tour percentage never decreases during a forward playthrough
    /// and reaches 100 at the end, even when the media reports durations
    /// that differ from the tour's hints
    #[test]
    fn percentage_is_monotonic_during_playthrough(
        layout in arbitrary_layout(),
        steps in 2usize..20,
        stretch in 0.5f64..2.0
    ) {
        let tour = build_tour(&layout);
        let mut progress = ProgressTracker::new(
            tour.id.clone(),
            Box::new(MemoryStore::new()),
            ProgressConfig::default(),
        );
        let now = Instant::now();
        let mut last = 0.0f64;

        for stop in tour.audio_stops() {
            let reported = stop.duration.unwrap() * stretch;
            progress.set_known_duration(&stop.id, reported);

            for step in 0..=steps {
                let t = reported * step as f64 / steps as f64;
                progress.record_progress(&stop.id, t, reported, now);
                let live = t / reported * 100.0;
                let pct = progress.realtime_progress_percentage(&tour.stops, Some(&stop.id), live);

                prop_assert!((0.0..=100.0).contains(&pct));
                prop_assert!(pct + 1e-9 >= last, "dropped from {} to {}", last, pct);
                last = pct;
            }
        }

        prop_assert!((last - 100.0).abs() < 1e-6);
    }
}
