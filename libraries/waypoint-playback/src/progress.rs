//! Progress tracker - per-stop listening progress and tour percentage
//!
//! Positions and completion flags are persisted through a
//! [`KeyValueStore`] under the tour's key prefix. Writes are throttled per
//! stop, except that a stop becoming completed is written immediately.
//!
//! A failing store never interrupts playback: the tracker logs once, switches
//! to memory-only mode and keeps answering queries from its in-memory copy.

use crate::types::ProgressConfig;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info, warn};
use waypoint_core::storage::{get_json, keys, set_json, KeyValueStore};
use waypoint_core::{Stop, StopId, StopProgress, StorageError, TourId};

pub struct ProgressTracker {
    tour_id: TourId,
    store: Box<dyn KeyValueStore>,
    config: ProgressConfig,

    entries: HashMap<StopId, StopProgress>,
    known_durations: HashMap<StopId, f64>,
    last_write: HashMap<StopId, Instant>,
    dirty: HashSet<StopId>,

    degraded: bool,
}

impl ProgressTracker {
    /// Create a tracker for `tour_id`, loading whatever the store holds
    pub fn new(tour_id: TourId, store: Box<dyn KeyValueStore>, config: ProgressConfig) -> Self {
        let mut tracker = Self {
            tour_id,
            store,
            config,
            entries: HashMap::new(),
            known_durations: HashMap::new(),
            last_write: HashMap::new(),
            dirty: HashSet::new(),
            degraded: false,
        };
        tracker.load();
        tracker
    }

    fn load(&mut self) {
        let prefix = keys::tour_prefix(&self.tour_id);
        let stored_keys = match self.store.keys_with_prefix(&prefix) {
            Ok(keys) => keys,
            Err(e) => {
                self.degrade(&e);
                return;
            }
        };

        for key in stored_keys {
            match get_json::<StopProgress>(self.store.as_ref(), &key) {
                Ok(Some(progress)) => {
                    self.entries.insert(progress.stop_id.clone(), progress);
                }
                Ok(None) => {}
                Err(e) => warn!("Ignoring unreadable progress entry {}: {}", key, e),
            }
        }
        debug!(
            "Loaded progress for {} stops of tour {}",
            self.entries.len(),
            self.tour_id
        );
    }

    fn degrade(&mut self, error: &StorageError) {
        if !self.degraded {
            warn!(
                "Progress storage unavailable, continuing in memory only: {}",
                error
            );
            self.degraded = true;
        }
    }

    // ===== Recording =====

    /// Record a playback position
    ///
    /// Marks the stop completed once `current_time / duration` reaches the
    /// completion threshold. Returns true if this call completed the stop.
    pub fn record_progress(
        &mut self,
        stop_id: &StopId,
        current_time: f64,
        duration: f64,
        now: Instant,
    ) -> bool {
        if !current_time.is_finite() || current_time < 0.0 {
            return false;
        }

        let entry = self
            .entries
            .entry(stop_id.clone())
            .or_insert_with(|| StopProgress::new(stop_id.clone()));
        entry.last_position_seconds = current_time;

        let newly_completed = duration.is_finite()
            && duration > 0.0
            && current_time / duration >= self.config.completion_threshold
            && entry.mark_completed();
        self.dirty.insert(stop_id.clone());

        if newly_completed {
            info!("Stop {} completed", stop_id);
            self.persist(stop_id, now);
        } else if self.write_due(stop_id, now) {
            self.persist(stop_id, now);
        }
        newly_completed
    }

    /// Mark a stop completed regardless of position
    pub fn mark_completed(&mut self, stop_id: &StopId, now: Instant) -> bool {
        let changed = self
            .entries
            .entry(stop_id.clone())
            .or_insert_with(|| StopProgress::new(stop_id.clone()))
            .mark_completed();
        if changed {
            info!("Stop {} completed", stop_id);
            self.dirty.insert(stop_id.clone());
            self.persist(stop_id, now);
        }
        changed
    }

    /// Remember the duration reported by the media element
    ///
    /// Only weighs stops the tour gives no duration hint for, so the share a
    /// completed stop earned never changes mid-tour.
    pub fn set_known_duration(&mut self, stop_id: &StopId, duration: f64) {
        if duration.is_finite() && duration > 0.0 {
            self.known_durations.insert(stop_id.clone(), duration);
        }
    }

    fn write_due(&self, stop_id: &StopId, now: Instant) -> bool {
        match self.last_write.get(stop_id) {
            Some(last) => now.saturating_duration_since(*last) >= self.config.write_throttle(),
            None => true,
        }
    }

    fn persist(&mut self, stop_id: &StopId, now: Instant) {
        if self.degraded {
            return;
        }
        let Some(entry) = self.entries.get(stop_id) else {
            return;
        };

        let key = keys::stop_progress(&self.tour_id, stop_id);
        match set_json(self.store.as_mut(), &key, entry) {
            Ok(()) => {
                self.last_write.insert(stop_id.clone(), now);
                self.dirty.remove(stop_id);
            }
            Err(e) => self.degrade(&e),
        }
    }

    /// Write every entry changed since its last write
    pub fn flush(&mut self, now: Instant) {
        let dirty: Vec<StopId> = self.dirty.iter().cloned().collect();
        for stop_id in dirty {
            self.persist(&stop_id, now);
        }
    }

    /// Forget all progress for this tour, in memory and in the store
    pub fn reset(&mut self) {
        info!("Resetting progress for tour {}", self.tour_id);
        self.entries.clear();
        self.last_write.clear();
        self.dirty.clear();
        if self.degraded {
            return;
        }

        let prefix = keys::tour_prefix(&self.tour_id);
        let result = self.store.keys_with_prefix(&prefix).and_then(|stored| {
            stored
                .iter()
                .try_for_each(|key| self.store.remove(key))
        });
        if let Err(e) = result {
            self.degrade(&e);
        }
    }

    // ===== Queries =====

    /// Saved position, 0 for stops never played
    pub fn stop_position(&self, stop_id: &str) -> f64 {
        self.entries
            .get(stop_id)
            .map_or(0.0, |p| p.last_position_seconds)
    }

    pub fn is_stop_completed(&self, stop_id: &str) -> bool {
        self.entries.get(stop_id).is_some_and(|p| p.completed)
    }

    pub fn stop_progress(&self, stop_id: &str) -> Option<&StopProgress> {
        self.entries.get(stop_id)
    }

    /// Number of completed stops among `stops`
    pub fn completed_count(&self, stops: &[Stop]) -> usize {
        stops
            .iter()
            .filter(|s| s.is_audio() && self.is_stop_completed(s.id().as_str()))
            .count()
    }

    /// Time-weighted tour percentage (0-100)
    ///
    /// Each audio stop weighs its duration: the tour's hint, else the one
    /// reported by the media element, else the mean of the other
    /// weights. Completed stops count in full; the current stop, if not yet
    /// completed, counts by `live_percent`.
    pub fn realtime_progress_percentage(
        &self,
        stops: &[Stop],
        current_stop_id: Option<&StopId>,
        live_percent: f64,
    ) -> f64 {
        let weights: Vec<(&StopId, Option<f64>)> = stops
            .iter()
            .filter_map(Stop::as_audio)
            .map(|stop| {
                let weight = stop
                    .duration
                    .filter(|d| d.is_finite() && *d > 0.0)
                    .or_else(|| self.known_durations.get(&stop.id).copied());
                (&stop.id, weight)
            })
            .collect();
        if weights.is_empty() {
            return 0.0;
        }

        let known: Vec<f64> = weights.iter().filter_map(|(_, w)| *w).collect();
        let fallback = if known.is_empty() {
            1.0
        } else {
            known.iter().sum::<f64>() / known.len() as f64
        };

        let live = if live_percent.is_finite() {
            live_percent.clamp(0.0, 100.0) / 100.0
        } else {
            0.0
        };

        let mut total = 0.0;
        let mut done = 0.0;
        for (id, weight) in weights {
            let weight = weight.unwrap_or(fallback);
            total += weight;
            if self.is_stop_completed(id.as_str()) {
                done += weight;
            } else if current_stop_id == Some(id) {
                done += weight * live;
            }
        }

        (done / total * 100.0).clamp(0.0, 100.0)
    }

    pub fn tour_id(&self) -> &TourId {
        &self.tour_id
    }

    /// Whether the store failed and the tracker is memory-only
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use waypoint_core::{StorageResult, Tour};

    // ===== Test Helpers =====

    /// Shared in-memory store that can be told to fail
    #[derive(Clone, Default)]
    struct SharedStore {
        data: Arc<Mutex<HashMap<String, String>>>,
        fail: Arc<Mutex<bool>>,
        writes: Arc<Mutex<usize>>,
    }

    impl KeyValueStore for SharedStore {
        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            Ok(self.data.lock().unwrap().get(key).cloned())
        }

        fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
            if *self.fail.lock().unwrap() {
                return Err(StorageError::unavailable("quota exceeded"));
            }
            *self.writes.lock().unwrap() += 1;
            self.data
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn remove(&mut self, key: &str) -> StorageResult<()> {
            self.data.lock().unwrap().remove(key);
            Ok(())
        }

        fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
            Ok(self
                .data
                .lock()
                .unwrap()
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect())
        }
    }

    fn tour() -> Tour {
        Tour::from_json(
            r#"{ "id": "t", "language": "en", "stops": [
                { "type": "audio", "id": "A", "title": "A", "audioFile": "a.mp3", "duration": 100 },
                { "type": "text", "id": "B", "content": "..." },
                { "type": "audio", "id": "C", "title": "C", "audioFile": "c.mp3", "duration": 300 },
                { "type": "audio", "id": "D", "title": "D", "audioFile": "d.mp3" }
            ] }"#,
        )
        .unwrap()
    }

    fn tracker(store: &SharedStore) -> ProgressTracker {
        ProgressTracker::new(
            TourId::new("t"),
            Box::new(store.clone()),
            ProgressConfig::default(),
        )
    }

    fn id(s: &str) -> StopId {
        StopId::new(s)
    }

    // ===== Tests =====

    #[test]
    fn completion_threshold() {
        let store = SharedStore::default();
        let mut progress = tracker(&store);
        let now = Instant::now();

        assert!(!progress.record_progress(&id("A"), 94.0, 100.0, now));
        assert!(!progress.is_stop_completed("A"));
        assert!(progress.record_progress(&id("A"), 95.0, 100.0, now));
        assert!(progress.is_stop_completed("A"));

        // Rewinding never reverts completion
        assert!(!progress.record_progress(&id("A"), 3.0, 100.0, now));
        assert!(progress.is_stop_completed("A"));
        assert_eq!(progress.stop_position("A"), 3.0);
    }

    #[test]
    fn writes_are_throttled_but_completion_is_immediate() {
        let store = SharedStore::default();
        let mut progress = tracker(&store);
        let t0 = Instant::now();

        progress.record_progress(&id("A"), 1.0, 100.0, t0);
        progress.record_progress(&id("A"), 2.0, 100.0, t0 + Duration::from_millis(500));
        progress.record_progress(&id("A"), 3.0, 100.0, t0 + Duration::from_millis(1000));
        assert_eq!(*store.writes.lock().unwrap(), 1);

        progress.record_progress(&id("A"), 96.0, 100.0, t0 + Duration::from_millis(1100));
        assert_eq!(*store.writes.lock().unwrap(), 2);

        progress.record_progress(&id("A"), 97.0, 100.0, t0 + Duration::from_millis(3200));
        assert_eq!(*store.writes.lock().unwrap(), 3);
    }

    #[test]
    fn progress_survives_reload() {
        let store = SharedStore::default();
        {
            let mut progress = tracker(&store);
            progress.record_progress(&id("C"), 42.0, 300.0, Instant::now());
        }
        let reloaded = tracker(&store);
        assert_eq!(reloaded.stop_position("C"), 42.0);
        assert!(!reloaded.is_stop_completed("C"));
    }

    #[test]
    fn flush_writes_throttled_positions() {
        let store = SharedStore::default();
        let mut progress = tracker(&store);
        let t0 = Instant::now();
        progress.record_progress(&id("C"), 10.0, 300.0, t0);
        progress.record_progress(&id("C"), 11.0, 300.0, t0 + Duration::from_millis(100));
        progress.flush(t0 + Duration::from_millis(200));

        assert_eq!(tracker(&store).stop_position("C"), 11.0);
    }

    #[test]
    fn storage_failure_degrades_to_memory() {
        let store = SharedStore::default();
        *store.fail.lock().unwrap() = true;
        let mut progress = tracker(&store);

        assert!(progress.record_progress(&id("A"), 99.0, 100.0, Instant::now()));
        assert!(progress.is_degraded());
        assert!(progress.is_stop_completed("A"));
        assert!(store.data.lock().unwrap().is_empty());
    }

    #[test]
    fn reset_clears_memory_and_store() {
        let store = SharedStore::default();
        let mut progress = tracker(&store);
        progress.mark_completed(&id("A"), Instant::now());
        progress.reset();

        assert!(!progress.is_stop_completed("A"));
        assert!(store.data.lock().unwrap().is_empty());
    }

    #[test]
    fn percentage_is_duration_weighted() {
        let store = SharedStore::default();
        let mut progress = tracker(&store);
        let tour = tour();
        // A=100, C=300, D unknown -> mean 200. Total 600.
        assert_eq!(progress.realtime_progress_percentage(&tour.stops, None, 0.0), 0.0);

        progress.mark_completed(&id("A"), Instant::now());
        let pct = progress.realtime_progress_percentage(&tour.stops, None, 0.0);
        assert!((pct - 100.0 / 6.0).abs() < 1e-9);

        // Halfway through C adds 150 of 600
        let pct = progress.realtime_progress_percentage(&tour.stops, Some(&id("C")), 50.0);
        assert!((pct - 250.0 / 6.0).abs() < 1e-9);

        // A stop without a hint takes the media-reported duration
        progress.set_known_duration(&id("D"), 600.0);
        let pct = progress.realtime_progress_percentage(&tour.stops, None, 0.0);
        assert!((pct - 10.0).abs() < 1e-9);

        // Hinted stops keep their weight
        progress.set_known_duration(&id("A"), 50.0);
        progress.set_known_duration(&id("C"), 900.0);
        let pct = progress.realtime_progress_percentage(&tour.stops, None, 0.0);
        assert!((pct - 10.0).abs() < 1e-9);
    }

    #[test]
    fn current_completed_stop_is_not_counted_twice() {
        let store = SharedStore::default();
        let mut progress = tracker(&store);
        let tour = tour();
        for stop in ["A", "C", "D"] {
            progress.mark_completed(&id(stop), Instant::now());
        }
        let pct = progress.realtime_progress_percentage(&tour.stops, Some(&id("D")), 80.0);
        assert_eq!(pct, 100.0);
        assert_eq!(progress.completed_count(&tour.stops), 3);
    }
}
