//! Simulated playthrough
//!
//! Stands in for a real media element so a tour can be played end to end from
//! the terminal:
//! - [`SimulatedBackend`] answers loads with metadata and readiness, and plays
//!   narrations on a virtual clock
//! - [`SimulatedFetcher`] acknowledges preload requests after an optional delay
//! - [`Simulation`] drives a [`TourPlayer`] until the tour finishes

use crate::config::CliConfig;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use waypoint_core::{KeyValueStore, StopId, Tour};
use waypoint_playback::{
    AudioSession, MediaBackend, MediaError, MediaEvent, MediaEventKind, MediaFetcher,
    NavigationEvent, PlayerEvent, PreloadHandle, Preloader, ProgressTracker, SourceGeneration,
    TourPlayer,
};

// ===== Media Backend =====

#[derive(Debug, Default)]
struct MediaState {
    url: Option<String>,
    generation: SourceGeneration,
    position: f64,
    duration: f64,
    playing: bool,
    queue: Vec<MediaEvent>,
}

impl MediaState {
    fn emit(&mut self, kind: MediaEventKind) {
        let event = MediaEvent::new(self.generation, kind);
        self.queue.push(event);
    }
}

fn lock(state: &Mutex<MediaState>) -> MutexGuard<'_, MediaState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Media element whose narrations advance only when the clock is stepped
pub struct SimulatedBackend {
    state: Arc<Mutex<MediaState>>,
    durations: HashMap<String, f64>,
    default_duration: f64,
}

impl MediaBackend for SimulatedBackend {
    fn load(&mut self, url: &str, generation: SourceGeneration) {
        let duration = self
            .durations
            .get(url)
            .copied()
            .unwrap_or(self.default_duration);

        let mut state = lock(&self.state);
        state.url = Some(url.to_string());
        state.generation = generation;
        state.position = 0.0;
        state.duration = duration;
        state.playing = false;
        state.emit(MediaEventKind::LoadedMetadata { duration });
        state.emit(MediaEventKind::CanPlay);
    }

    fn play(&mut self) -> Result<(), MediaError> {
        let mut state = lock(&self.state);
        if state.url.is_none() {
            return Err(MediaError::PlaybackBlocked("no source loaded".to_string()));
        }
        if state.position >= state.duration {
            state.position = 0.0;
        }
        state.playing = true;
        state.emit(MediaEventKind::Playing);
        Ok(())
    }

    fn pause(&mut self) {
        let mut state = lock(&self.state);
        if state.playing {
            state.playing = false;
            state.emit(MediaEventKind::Paused);
        }
    }

    fn set_current_time(&mut self, seconds: f64) {
        let mut state = lock(&self.state);
        state.position = seconds.clamp(0.0, state.duration);
        let current_time = state.position;
        state.emit(MediaEventKind::TimeUpdate { current_time });
    }

    fn unload(&mut self) {
        let mut state = lock(&self.state);
        state.url = None;
        state.playing = false;
    }
}

/// Clock side of the simulated media element
pub struct SimulatedMedia {
    state: Arc<Mutex<MediaState>>,
}

impl SimulatedMedia {
    /// Create the media pair for `tour`
    ///
    /// Narrations last their duration hint, or `default_duration` without one.
    pub fn new(
        tour: &Tour,
        default_duration: f64,
        transition_duration: f64,
    ) -> (Self, SimulatedBackend) {
        let mut durations: HashMap<String, f64> = tour
            .audio_stops()
            .map(|stop| {
                let duration = stop.duration.filter(|d| *d > 0.0).unwrap_or(default_duration);
                (stop.audio_file.clone(), duration)
            })
            .collect();
        if let Some(url) = &tour.transition_audio {
            durations.insert(url.clone(), transition_duration);
        }

        let state = Arc::new(Mutex::new(MediaState::default()));
        let backend = SimulatedBackend {
            state: Arc::clone(&state),
            durations,
            default_duration,
        };
        (Self { state }, backend)
    }

    /// Play `elapsed` of the current narration
    pub fn advance(&self, elapsed: Duration) {
        let mut state = lock(&self.state);
        if !state.playing {
            return;
        }

        state.position = (state.position + elapsed.as_secs_f64()).min(state.duration);
        let current_time = state.position;
        state.emit(MediaEventKind::TimeUpdate { current_time });

        if current_time >= state.duration {
            state.playing = false;
            state.emit(MediaEventKind::Ended);
        }
    }

    /// Notifications produced since the last call
    pub fn take_events(&self) -> Vec<MediaEvent> {
        std::mem::take(&mut lock(&self.state).queue)
    }
}

// ===== Fetcher =====

struct SimulatedHandle {
    url: String,
}

impl PreloadHandle for SimulatedHandle {
    fn release(&mut self) {
        debug!("Released buffer for {}", self.url);
    }
}

/// Fetcher that succeeds for every non-empty URL
pub struct SimulatedFetcher {
    latency: Duration,
}

impl SimulatedFetcher {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    async fn wait(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl MediaFetcher for SimulatedFetcher {
    async fn buffer_audio(&self, url: &str) -> Result<Box<dyn PreloadHandle>, MediaError> {
        if url.is_empty() {
            return Err(MediaError::Fetch("empty audio URL".to_string()));
        }
        self.wait().await;
        Ok(Box::new(SimulatedHandle {
            url: url.to_string(),
        }))
    }

    async fn load_image(&self, url: &str) -> Result<(), MediaError> {
        if url.is_empty() {
            return Err(MediaError::Fetch("empty image URL".to_string()));
        }
        self.wait().await;
        Ok(())
    }
}

// ===== Simulation =====

/// Outcome of a simulated playthrough
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    /// Stops that became current, in order
    pub stops_played: Vec<StopId>,

    /// Tour percentage when the run ended
    pub tour_percent: f64,

    /// The listener reached the end of the tour
    pub finished: bool,

    /// Every narration was completed at some point
    pub tour_completed: bool,

    /// Simulated time spent
    pub elapsed: Duration,
}

/// A tour player wired to simulated media
pub struct Simulation {
    player: TourPlayer,
    media: SimulatedMedia,
    preloader: Preloader,
    step: Duration,
    limit: Duration,
}

impl Simulation {
    pub fn new(tour: Arc<Tour>, store: Box<dyn KeyValueStore>, config: &CliConfig) -> Self {
        let sim = &config.simulation;
        let (media, backend) = SimulatedMedia::new(
            &tour,
            sim.default_duration_seconds,
            sim.transition_duration_seconds,
        );

        let session = AudioSession::shared(Box::new(backend), config.player.session.clone());
        let progress = ProgressTracker::new(tour.id.clone(), store, config.player.progress.clone());
        let preloader = Preloader::new(
            Arc::new(SimulatedFetcher::new(sim.fetch_latency())),
            config.player.preload.clone(),
        );

        // Every stop plus its completion window and switch debounce, with slack
        let per_stop = config.player.navigator.completion_window()
            + config.player.navigator.switch_debounce()
            + Duration::from_secs(5);
        let narration: f64 = tour
            .audio_stops()
            .map(|s| s.duration.unwrap_or(sim.default_duration_seconds))
            .sum();
        let stops = u32::try_from(tour.audio_stop_count()).unwrap_or(u32::MAX);
        let limit = Duration::from_secs_f64(narration.max(0.0))
            + per_stop.saturating_mul(stops)
            + Duration::from_secs(60);

        let player = TourPlayer::new(tour, session, progress, config.player.clone());

        Self {
            player,
            media,
            preloader,
            step: sim.tick(),
            limit,
        }
    }

    /// Play the tour from the deep-linked or resumed stop until it finishes
    pub async fn run(mut self, deep_link: Option<&str>) -> SimulationReport {
        let start = Instant::now();
        let mut now = start;

        let assets = self.preloader.preload_tour_assets(self.player.tour()).await;
        info!(
            "Tour assets ready: first audio {}, {} images ({} failed)",
            assets.first_audio_ready, assets.images_loaded, assets.images_failed
        );

        if let Some(plan) = self.player.resolve_initial_state(deep_link, now) {
            info!("Opening at stop {} ({:?})", plan.stop_id, plan.source);
        }
        if !self.player.has_started() {
            self.player.start_tour(now);
        }

        let mut report = SimulationReport {
            stops_played: Vec::new(),
            tour_percent: 0.0,
            finished: false,
            tour_completed: false,
            elapsed: Duration::ZERO,
        };

        loop {
            for event in self.media.take_events() {
                self.player.handle_media_event(event, now);
            }
            self.player.tick(now);

            for event in self.player.drain_events() {
                self.observe(event, &mut report).await;
            }

            if report.finished {
                break;
            }
            if now - start >= self.limit {
                warn!("Simulation stopped after {:?} without finishing", self.limit);
                break;
            }

            now += self.step;
            self.media.advance(self.step);
        }

        report.tour_percent = self.player.tour_progress();
        report.elapsed = now - start;
        self.preloader.dispose();
        report
    }

    async fn observe(&self, event: PlayerEvent, report: &mut SimulationReport) {
        match event {
            PlayerEvent::Navigation(NavigationEvent::StopChanged { stop_id, .. }) => {
                match self.player.tour().audio_stop(stop_id.as_str()) {
                    Some(stop) => println!("-> {} {}", stop.id, stop.title),
                    None => println!("-> {}", stop_id),
                }
                report.stops_played.push(stop_id);
            }
            PlayerEvent::Navigation(NavigationEvent::TourFinished) => {
                report.finished = true;
            }
            PlayerEvent::Navigation(NavigationEvent::TransitionAudioStarted { url }) => {
                debug!("Transition audio {}", url);
            }
            PlayerEvent::TourCompleted => {
                println!("Tour completed");
                report.tour_completed = true;
            }
            PlayerEvent::PreloadWindowChanged(window) => {
                let warmed = self.preloader.warm_window(&window).await;
                debug!("Preloaded {} upcoming narrations", warmed);
            }
            PlayerEvent::ResumeSeekApplied { stop_id, position } => {
                println!("   resuming {} at {:.0}s", stop_id, position);
            }
            PlayerEvent::PlaybackBlocked { reason } => warn!("Playback blocked: {}", reason),
            PlayerEvent::MediaError(error) => warn!("Media error: {}", error),
            PlayerEvent::TourProgress { percent } => debug!("Tour progress {:.1}%", percent),
            PlayerEvent::StateChanged(_) | PlayerEvent::Navigation(_) => {}
        }
    }
}
