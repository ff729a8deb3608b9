//! Tour player - one tour's playback, wired end to end
//!
//! Owns the navigator and progress tracker for a tour and drives the shared
//! audio session from them:
//! - The navigator decides which stop is current and whether it should play
//! - The session plays that stop's narration, or the transition clip during a
//!   completion window
//! - Session events feed progress, natural completion and error handling back
//!
//! Every input (user action, media event, timer tick) is followed by a pump
//! that drains component events until the system settles, then publishes
//! [`PlayerEvent`]s.
//!
//! Dropping a player leaves the session untouched, so playback survives the
//! view that created it.

use crate::backend::MediaEvent;
use crate::error::NavigationError;
use crate::events::{NavigationEvent, PlayerEvent, SessionEvent};
use crate::navigator::{NavigatorState, TourNavigator, TransitionPhase};
use crate::preloader::PreloadWindow;
use crate::progress::ProgressTracker;
use crate::resume::{resolve_initial_stop, ResumePlan};
use crate::session::{lock_session, AudioSession, SharedAudioSession};
use crate::types::{PlaybackState, PlayerConfig, SourceGeneration};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use waypoint_core::{StopId, Tour};

/// Component event rounds per input before giving up on settling
const MAX_PUMP_ROUNDS: usize = 8;

/// What the session's current generation is playing for us
#[derive(Debug, Clone, PartialEq)]
enum BoundSource {
    Stop {
        stop_id: StopId,
        generation: SourceGeneration,
    },
    Transition {
        generation: SourceGeneration,
    },
}

pub struct TourPlayer {
    tour: Arc<Tour>,
    config: PlayerConfig,
    session: SharedAudioSession,
    navigator: TourNavigator,
    progress: ProgressTracker,

    bound: Option<BoundSource>,
    pending_seek: Option<(StopId, f64)>,
    pending_scroll: Option<StopId>,

    has_started: bool,
    initial_resolved: bool,
    completion_announced: bool,
    last_percent: Option<f64>,
    last_state: Option<PlaybackState>,

    // Event queue for the UI
    pending_events: Vec<PlayerEvent>,
}

impl TourPlayer {
    /// Create a player for `tour` on the shared `session`
    pub fn new(
        tour: Arc<Tour>,
        session: SharedAudioSession,
        progress: ProgressTracker,
        config: PlayerConfig,
    ) -> Self {
        if progress.tour_id() != &tour.id {
            warn!(
                "Progress tracker for {} attached to tour {}",
                progress.tour_id(),
                tour.id
            );
        }

        let audio_stops = tour.audio_stop_count();
        let completion_announced =
            audio_stops > 0 && progress.completed_count(&tour.stops) == audio_stops;
        let navigator = TourNavigator::new(Arc::clone(&tour), config.navigator.clone());

        Self {
            tour,
            config,
            session,
            navigator,
            progress,
            bound: None,
            pending_seek: None,
            pending_scroll: None,
            has_started: false,
            initial_resolved: false,
            completion_announced,
            last_percent: None,
            last_state: None,
            pending_events: Vec::new(),
        }
    }

    // ===== Initial State =====

    /// Pick the opening stop from a deep link or saved progress
    ///
    /// Runs once. Returns `None` if it already ran, if the user navigated
    /// first, or if the tour has no audio stops.
    pub fn resolve_initial_state(
        &mut self,
        url_stop_id: Option<&str>,
        now: Instant,
    ) -> Option<ResumePlan> {
        let plan = self.resolve_plan(url_stop_id)?;
        self.pump(now);
        Some(plan)
    }

    fn resolve_plan(&mut self, url_stop_id: Option<&str>) -> Option<ResumePlan> {
        if self.initial_resolved {
            debug!("Initial stop already resolved");
            return None;
        }
        self.initial_resolved = true;

        let plan = resolve_initial_stop(&self.tour, url_stop_id, &self.progress)?;
        let applied = if plan.autoplay {
            self.navigator.select_stop(plan.stop_id.as_str())
        } else {
            self.navigator.cue_stop(plan.stop_id.as_str())
        };
        if let Err(e) = applied {
            warn!("Could not apply initial stop: {}", e);
            return None;
        }

        self.has_started |= plan.has_started;
        self.pending_seek = plan.seek_to.map(|position| (plan.stop_id.clone(), position));
        self.pending_scroll.clone_from(&plan.scroll_to);
        Some(plan)
    }

    /// Leave the start card and play the current (or resolved) stop
    pub fn start_tour(&mut self, now: Instant) {
        self.has_started = true;
        if matches!(self.navigator.state(), NavigatorState::Idle) {
            self.resolve_plan(None);
        }
        self.navigator.set_playing(true);
        self.pump(now);
    }

    // ===== User Input =====

    /// Play `stop_id` from the feed
    pub fn select_stop(&mut self, stop_id: &str, now: Instant) -> Result<(), NavigationError> {
        self.navigator.select_stop(stop_id)?;
        self.user_navigated();
        self.pump(now);
        Ok(())
    }

    pub fn toggle_play_pause(&mut self, now: Instant) {
        self.navigator.toggle_play_pause();
        if self.navigator.is_playing() {
            self.has_started = true;
        }
        self.pump(now);
    }

    pub fn play(&mut self, now: Instant) {
        self.navigator.set_playing(true);
        self.has_started = true;
        self.pump(now);
    }

    pub fn pause(&mut self, now: Instant) {
        self.navigator.set_playing(false);
        self.pump(now);
    }

    pub fn next(&mut self, now: Instant) {
        self.navigator.advance(now);
        self.user_navigated();
        self.pump(now);
    }

    pub fn previous(&mut self, now: Instant) {
        self.navigator.retreat(now);
        self.user_navigated();
        self.pump(now);
    }

    pub fn seek(&mut self, seconds: f64, now: Instant) {
        lock_session(&self.session).seek(seconds);
        self.pump(now);
    }

    pub fn skip_forward(&mut self, now: Instant) {
        lock_session(&self.session).skip_forward(self.config.session.skip_seconds);
        self.pump(now);
    }

    pub fn skip_backward(&mut self, now: Instant) {
        lock_session(&self.session).skip_backward(self.config.session.skip_seconds);
        self.pump(now);
    }

    /// Clear all saved progress for this tour
    pub fn reset_progress(&mut self, now: Instant) {
        self.progress.reset();
        self.completion_announced = false;
        self.last_percent = None;
        self.pump(now);
    }

    /// Explicit navigation supersedes any pending initial resolution
    fn user_navigated(&mut self) {
        self.initial_resolved = true;
        self.has_started = true;
    }

    // ===== Platform Input =====

    /// Feed a native media notification
    pub fn handle_media_event(&mut self, event: MediaEvent, now: Instant) {
        lock_session(&self.session).handle_event(event, now);
        self.pump(now);
    }

    /// Advance timers (stall retries, debounce and completion windows)
    pub fn tick(&mut self, now: Instant) {
        lock_session(&self.session).poll(now);
        self.navigator.poll(now);
        self.pump(now);
    }

    // ===== Event Pump =====

    fn pump(&mut self, now: Instant) {
        for _ in 0..MAX_PUMP_ROUNDS {
            let session_events = lock_session(&self.session).drain_events();
            for event in session_events {
                self.on_session_event(event, now);
            }
            for event in self.navigator.drain_events() {
                self.on_navigation_event(event);
            }

            self.sync_session();

            let settled = !lock_session(&self.session).has_pending_events()
                && !self.navigator.has_pending_events();
            if settled {
                break;
            }
        }

        self.refresh_tour_progress();
        self.publish_state();
    }

    fn on_session_event(&mut self, event: SessionEvent, now: Instant) {
        match event {
            SessionEvent::Progress {
                generation,
                current_time,
                duration,
                ..
            } => {
                if let Some(stop_id) = self.bound_stop(generation) {
                    self.progress
                        .record_progress(&stop_id, current_time, duration, now);
                }
            }
            SessionEvent::DurationKnown {
                generation,
                duration,
            } => {
                if let Some(stop_id) = self.bound_stop(generation) {
                    self.progress.set_known_duration(&stop_id, duration);
                }
            }
            SessionEvent::Ended { generation } => match self.bound_stop(generation) {
                Some(stop_id) => {
                    self.progress.mark_completed(&stop_id, now);
                    if self.navigator.current_stop_id() == Some(&stop_id) {
                        self.navigator.on_track_natural_completion(now);
                    }
                }
                None => debug!("Ignoring ended for generation {}", generation),
            },
            SessionEvent::PlaybackPaused { .. } => {
                // Paused by the platform, not by us
                self.navigator.set_playing(false);
            }
            SessionEvent::PlaybackBlocked { reason, .. } => {
                self.navigator.set_playing(false);
                self.pending_events
                    .push(PlayerEvent::PlaybackBlocked { reason });
            }
            SessionEvent::Error { error, .. } => {
                self.navigator.set_playing(false);
                self.pending_events.push(PlayerEvent::MediaError(error));
            }
            SessionEvent::SourceChanged { .. }
            | SessionEvent::PlaybackStarted { .. }
            | SessionEvent::StallRecovering { .. } => {}
        }
    }

    fn on_navigation_event(&mut self, event: NavigationEvent) {
        match &event {
            NavigationEvent::StopChanged { stop_id, .. } => {
                if self
                    .pending_seek
                    .as_ref()
                    .is_some_and(|(seek_stop, _)| seek_stop != stop_id)
                {
                    debug!("Dropping saved position, navigated to {}", stop_id);
                    self.pending_seek = None;
                }
                let window = self.preload_window_for(stop_id);
                self.pending_events
                    .push(PlayerEvent::PreloadWindowChanged(window));
            }
            NavigationEvent::TransitionAudioEnded => {
                if matches!(self.bound, Some(BoundSource::Transition { .. })) {
                    lock_session(&self.session).pause();
                }
            }
            NavigationEvent::TourFinished => info!("Tour {} finished", self.tour.id),
            _ => {}
        }
        self.pending_events.push(PlayerEvent::Navigation(event));
    }

    /// Make the session reflect the navigator
    fn sync_session(&mut self) {
        let shared = Arc::clone(&self.session);
        let mut session = lock_session(&shared);

        match self.navigator.state().clone() {
            // The outgoing narration keeps playing through the debounce
            NavigatorState::Idle
            | NavigatorState::Transitioning {
                phase: TransitionPhase::Switch,
                ..
            } => {}
            NavigatorState::Active { stop_id, playing } => {
                self.bind_stop(&mut session, &stop_id);
                self.apply_pending_seek(&mut session);
                if playing {
                    session.play();
                } else {
                    session.pause();
                }
            }
            NavigatorState::Transitioning {
                phase: TransitionPhase::Completion,
                ..
            } => {
                if let Some(url) = self.navigator.transition_audio() {
                    // Played once per completion window
                    if session.set_source(url) {
                        self.bound = Some(BoundSource::Transition {
                            generation: session.generation(),
                        });
                        session.play();
                    }
                }
            }
            NavigatorState::Finished { .. } => session.pause(),
        }
    }

    fn bind_stop(&mut self, session: &mut AudioSession, stop_id: &StopId) {
        let Some(stop) = self.tour.audio_stop(stop_id.as_str()) else {
            return;
        };
        if !session.set_source(&stop.audio_file) && !self.is_bound_to(stop_id) {
            debug!("Adopting the loaded source for stop {}", stop_id);
        }
        self.bound = Some(BoundSource::Stop {
            stop_id: stop_id.clone(),
            generation: session.generation(),
        });
    }

    /// Seek to the saved position once the bound stop's duration is known
    fn apply_pending_seek(&mut self, session: &mut AudioSession) {
        let Some((stop_id, position)) = self.pending_seek.take() else {
            return;
        };
        if !self.is_bound_to(&stop_id) || session.duration().is_none() {
            self.pending_seek = Some((stop_id, position));
            return;
        }

        debug!("Resuming stop {} at {:.1}s", stop_id, position);
        session.seek(position);
        self.pending_events
            .push(PlayerEvent::ResumeSeekApplied { stop_id, position });
    }

    fn bound_stop(&self, generation: SourceGeneration) -> Option<StopId> {
        match &self.bound {
            Some(BoundSource::Stop {
                stop_id,
                generation: bound,
            }) if *bound == generation => Some(stop_id.clone()),
            _ => None,
        }
    }

    fn is_bound_to(&self, stop_id: &StopId) -> bool {
        matches!(&self.bound, Some(BoundSource::Stop { stop_id: bound, .. }) if bound == stop_id)
    }

    fn refresh_tour_progress(&mut self) {
        let current = self.navigator.current_stop_id().cloned();
        let live = match &current {
            Some(stop_id) if self.is_bound_to(stop_id) => {
                lock_session(&self.session).progress_percent()
            }
            _ => 0.0,
        };

        let percent =
            self.progress
                .realtime_progress_percentage(&self.tour.stops, current.as_ref(), live);
        if self
            .last_percent
            .map_or(true, |last| (last - percent).abs() >= 0.01)
        {
            self.last_percent = Some(percent);
            self.pending_events
                .push(PlayerEvent::TourProgress { percent });
        }

        let audio_stops = self.tour.audio_stop_count();
        if !self.completion_announced
            && audio_stops > 0
            && self.progress.completed_count(&self.tour.stops) == audio_stops
        {
            self.completion_announced = true;
            info!("All stops of tour {} completed", self.tour.id);
            self.pending_events.push(PlayerEvent::TourCompleted);
        }
    }

    fn publish_state(&mut self) {
        let state = self.playback_state();
        if self.last_state.as_ref() != Some(&state) {
            self.pending_events
                .push(PlayerEvent::StateChanged(state.clone()));
            self.last_state = Some(state);
        }
    }

    // ===== State Queries =====

    /// Snapshot for rendering
    ///
    /// Timing comes from the session while it plays the current stop, and
    /// from saved progress otherwise.
    pub fn playback_state(&self) -> PlaybackState {
        let current = self.navigator.current_stop_id().cloned();

        let (current_time, duration, progress_percent) = match &current {
            Some(stop_id) if self.is_bound_to(stop_id) => {
                let session = lock_session(&self.session);
                (
                    session.current_time(),
                    session.duration().unwrap_or(0.0),
                    session.progress_percent(),
                )
            }
            Some(stop_id) => {
                let position = self.progress.stop_position(stop_id.as_str());
                let duration = self
                    .tour
                    .audio_stop(stop_id.as_str())
                    .and_then(|s| s.duration)
                    .unwrap_or(0.0);
                let percent = if self.progress.is_stop_completed(stop_id.as_str()) {
                    100.0
                } else if duration > 0.0 {
                    (position / duration * 100.0).clamp(0.0, 100.0)
                } else {
                    0.0
                };
                (position, duration, percent)
            }
            None => (0.0, 0.0, 0.0),
        };

        PlaybackState {
            current_stop_id: current,
            is_playing: self.navigator.is_playing(),
            current_time,
            duration,
            progress_percent,
            is_transitioning: self.navigator.is_transitioning(),
            is_completing: self.navigator.is_completing(),
            is_switching_tracks: self.navigator.is_switching_tracks(),
        }
    }

    /// Tour percentage (0-100) including the live position
    pub fn tour_progress(&self) -> f64 {
        self.last_percent.unwrap_or(0.0)
    }

    /// Narrations to keep buffered around `stop_id`
    pub fn preload_window_for(&self, stop_id: &StopId) -> PreloadWindow {
        PreloadWindow {
            current: self
                .tour
                .audio_stop(stop_id.as_str())
                .map(|s| s.audio_file.clone()),
            upcoming: self
                .tour
                .upcoming_audio_stops(stop_id.as_str(), self.config.preload.preload_count)
                .into_iter()
                .map(|s| s.audio_file.clone())
                .collect(),
        }
    }

    /// Preload window for the current stop
    pub fn preload_window(&self) -> Option<PreloadWindow> {
        self.navigator
            .current_stop_id()
            .map(|stop_id| self.preload_window_for(stop_id))
    }

    /// Stop card to scroll to, consumed once
    pub fn take_scroll_request(&mut self) -> Option<StopId> {
        self.pending_scroll.take()
    }

    /// Whether the start card has been dismissed
    pub fn has_started(&self) -> bool {
        self.has_started
    }

    pub fn tour(&self) -> &Tour {
        &self.tour
    }

    pub fn navigator(&self) -> &TourNavigator {
        &self.navigator
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn session(&self) -> &SharedAudioSession {
        &self.session
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    // ===== Events =====

    pub fn drain_events(&mut self) -> Vec<PlayerEvent> {
        std::mem::take(&mut self.pending_events)
    }

    pub fn has_pending_events(&self) -> bool {
        !self.pending_events.is_empty()
    }
}

impl Drop for TourPlayer {
    fn drop(&mut self) {
        self.progress.flush(Instant::now());
    }
}
