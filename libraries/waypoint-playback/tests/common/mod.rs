//! Shared fixtures for the playback integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use waypoint_core::storage::{keys, set_json};
use waypoint_core::{StopId, StopProgress, Tour, TourId};
use waypoint_playback::{
    lock_session, AudioSession, MediaBackend, MediaError, MediaEvent, MediaEventKind,
    PlayerConfig, PlayerEvent, ProgressTracker, SharedAudioSession, SourceGeneration, TourPlayer,
};
use waypoint_storage::MemoryStore;

// ===== Tours =====

/// intro(text), A(audio 120s), B(quote), C(audio 60s), D(poi)
pub const SAMPLE_TOUR: &str = r#"{
    "id": "rome",
    "language": "en",
    "title": "Ancient Rome",
    "stops": [
        { "type": "text", "id": "intro", "content": "Welcome" },
        { "type": "audio", "id": "A", "title": "Forum", "audioFile": "a.mp3", "duration": 120 },
        { "type": "quote", "id": "B", "quote": "Veni, vidi, vici" },
        { "type": "audio", "id": "C", "title": "Colosseum", "audioFile": "c.mp3", "duration": 60 },
        { "type": "poi", "id": "D", "title": "Fountain", "image": "d.jpg" }
    ]
}"#;

/// Same stops as [`SAMPLE_TOUR`] with a transition clip
pub const TRANSITION_TOUR: &str = r#"{
    "id": "rome",
    "language": "en",
    "transitionAudio": "chime.mp3",
    "stops": [
        { "type": "text", "id": "intro", "content": "Welcome" },
        { "type": "audio", "id": "A", "title": "Forum", "audioFile": "a.mp3", "duration": 120 },
        { "type": "quote", "id": "B", "quote": "Veni, vidi, vici" },
        { "type": "audio", "id": "C", "title": "Colosseum", "audioFile": "c.mp3", "duration": 60 }
    ]
}"#;

/// Three narrations A, C, E
pub const THREE_STOP_TOUR: &str = r#"{
    "id": "rome",
    "language": "en",
    "stops": [
        { "type": "audio", "id": "A", "title": "A", "audioFile": "a.mp3", "duration": 100 },
        { "type": "audio", "id": "C", "title": "C", "audioFile": "c.mp3", "duration": 100 },
        { "type": "audio", "id": "E", "title": "E", "audioFile": "e.mp3", "duration": 100 }
    ]
}"#;

pub fn tour(json: &str) -> Arc<Tour> {
    Arc::new(Tour::from_json(json).unwrap())
}

// ===== Fake Backend =====

/// Everything the session asked the media element to do
#[derive(Debug, Default)]
pub struct BackendLog {
    pub loads: Vec<(String, SourceGeneration)>,
    pub plays: usize,
    pub pauses: usize,
    pub seeks: Vec<f64>,
    pub unloads: usize,
    /// Refuse `play()` with this reason
    pub reject_play: Option<String>,
}

impl BackendLog {
    pub fn loaded_urls(&self) -> Vec<&str> {
        self.loads.iter().map(|(url, _)| url.as_str()).collect()
    }
}

pub struct FakeBackend {
    log: Arc<Mutex<BackendLog>>,
}

impl FakeBackend {
    pub fn new() -> (Self, Arc<Mutex<BackendLog>>) {
        let log = Arc::new(Mutex::new(BackendLog::default()));
        (
            Self {
                log: Arc::clone(&log),
            },
            log,
        )
    }
}

impl MediaBackend for FakeBackend {
    fn load(&mut self, url: &str, generation: SourceGeneration) {
        self.log
            .lock()
            .unwrap()
            .loads
            .push((url.to_string(), generation));
    }

    fn play(&mut self) -> Result<(), MediaError> {
        let mut log = self.log.lock().unwrap();
        log.plays += 1;
        match &log.reject_play {
            Some(reason) => Err(MediaError::PlaybackBlocked(reason.clone())),
            None => Ok(()),
        }
    }

    fn pause(&mut self) {
        self.log.lock().unwrap().pauses += 1;
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.log.lock().unwrap().seeks.push(seconds);
    }

    fn unload(&mut self) {
        self.log.lock().unwrap().unloads += 1;
    }
}

// ===== Player Rig =====

/// A tour player on a fake backend with a controllable clock
pub struct Rig {
    pub player: TourPlayer,
    pub session: SharedAudioSession,
    pub log: Arc<Mutex<BackendLog>>,
    pub now: Instant,
}

impl Rig {
    pub fn new(tour_json: &str) -> Self {
        Self::with_store(tour_json, MemoryStore::new())
    }

    pub fn with_store(tour_json: &str, store: MemoryStore) -> Self {
        let config = PlayerConfig::default();
        let (backend, log) = FakeBackend::new();
        let session = AudioSession::shared(Box::new(backend), config.session.clone());
        let player = player_on(tour_json, Arc::clone(&session), store);
        Self {
            player,
            session,
            log,
            now: Instant::now(),
        }
    }

    /// Move the clock forward and fire due timers
    pub fn advance(&mut self, ms: u64) {
        self.now += Duration::from_millis(ms);
        self.player.tick(self.now);
    }

    pub fn generation(&self) -> SourceGeneration {
        lock_session(&self.session).generation()
    }

    pub fn source(&self) -> Option<String> {
        lock_session(&self.session).source().map(str::to_string)
    }

    /// Deliver a media event tagged with the current generation
    pub fn media(&mut self, kind: MediaEventKind) {
        let generation = self.generation();
        self.media_for(generation, kind);
    }

    pub fn media_for(&mut self, generation: SourceGeneration, kind: MediaEventKind) {
        self.player
            .handle_media_event(MediaEvent::new(generation, kind), self.now);
    }

    /// Metadata then readiness for the current source
    pub fn ready(&mut self, duration: f64) {
        self.media(MediaEventKind::LoadedMetadata { duration });
        self.media(MediaEventKind::CanPlay);
    }

    pub fn time(&mut self, current_time: f64) {
        self.media(MediaEventKind::TimeUpdate { current_time });
    }

    pub fn select(&mut self, stop_id: &str) {
        self.player.select_stop(stop_id, self.now).unwrap();
    }

    pub fn next(&mut self) {
        self.player.next(self.now);
    }

    pub fn previous(&mut self) {
        self.player.previous(self.now);
    }

    pub fn events(&mut self) -> Vec<PlayerEvent> {
        self.player.drain_events()
    }

    pub fn current_stop(&self) -> Option<String> {
        self.player
            .playback_state()
            .current_stop_id
            .map(|id| id.as_str().to_string())
    }
}

/// A fresh player for `tour_json` on an existing session
pub fn player_on(tour_json: &str, session: SharedAudioSession, store: MemoryStore) -> TourPlayer {
    let tour = tour(tour_json);
    let config = PlayerConfig::default();
    let progress = ProgressTracker::new(tour.id.clone(), Box::new(store), config.progress.clone());
    TourPlayer::new(tour, session, progress, config)
}

/// Store holding saved progress for the sample tour
pub fn store_with_progress(entries: &[(&str, f64, bool)]) -> MemoryStore {
    let mut store = MemoryStore::new();
    let tour_id = TourId::new("rome");
    for (stop, position, completed) in entries {
        let progress = StopProgress {
            stop_id: StopId::new(*stop),
            last_position_seconds: *position,
            completed: *completed,
        };
        set_json(
            &mut store,
            &keys::stop_progress(&tour_id, &StopId::new(*stop)),
            &progress,
        )
        .unwrap();
    }
    store
}
