//! Audio session - the single narration element
//!
//! Wraps the platform [`MediaBackend`] and owns everything that must hold no
//! matter which screen is showing:
//! - One media element for the whole app, shared through [`SharedAudioSession`]
//! - A generation counter so events from a replaced source are ignored
//! - Deferred play: `play()` before the source is ready is honoured exactly
//!   once when it becomes ready
//! - Seek and skip clamping against the known duration
//! - Stall detection with bounded, backed-off reload retries
//!
//! The session is a synchronous state machine. Native notifications enter via
//! [`AudioSession::handle_event`], timers advance via [`AudioSession::poll`],
//! and observers read the resulting [`SessionEvent`]s from
//! [`AudioSession::drain_events`].

use crate::backend::{MediaBackend, MediaEvent, MediaEventKind};
use crate::error::MediaError;
use crate::events::SessionEvent;
use crate::types::{SessionConfig, SourceGeneration};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Process-wide handle to the audio session
///
/// Views hold clones of this handle. Dropping a view never stops playback;
/// only [`AudioSession::dispose`] does.
pub type SharedAudioSession = Arc<Mutex<AudioSession>>;

/// Lock a shared session, recovering from a poisoned mutex
///
/// Session state stays consistent across a panicking holder because every
/// mutation completes before events are queued.
pub fn lock_session(session: &SharedAudioSession) -> MutexGuard<'_, AudioSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct StallState {
    /// Reloads attempted for the current stall episode
    attempts: u32,

    /// When the next reload is due
    retry_at: Option<Instant>,

    /// Position to restore once the reloaded source is ready
    resume_position: Option<f64>,
}

/// Single-element audio engine
pub struct AudioSession {
    backend: Box<dyn MediaBackend>,
    config: SessionConfig,

    source: Option<String>,
    generation: SourceGeneration,

    // Per-source state, reset on every set_source
    current_time: f64,
    duration: Option<f64>,
    duration_announced: bool,
    ready: bool,
    is_playing: bool,
    ended_fired: bool,

    // Playback intent
    wants_playback: bool,
    deferred_play: bool,
    play_in_flight: bool,

    stall: StallState,
    last_progress_at: Option<Instant>,

    disposed: bool,

    // Event queue for observers
    pending_events: Vec<SessionEvent>,
}

impl AudioSession {
    /// Create a session driving `backend`
    pub fn new(backend: Box<dyn MediaBackend>, config: SessionConfig) -> Self {
        Self {
            backend,
            config,
            source: None,
            generation: SourceGeneration::default(),
            current_time: 0.0,
            duration: None,
            duration_announced: false,
            ready: false,
            is_playing: false,
            ended_fired: false,
            wants_playback: false,
            deferred_play: false,
            play_in_flight: false,
            stall: StallState::default(),
            last_progress_at: None,
            disposed: false,
            pending_events: Vec::new(),
        }
    }

    /// Create a session and wrap it for sharing
    pub fn shared(backend: Box<dyn MediaBackend>, config: SessionConfig) -> SharedAudioSession {
        Arc::new(Mutex::new(Self::new(backend, config)))
    }

    // ===== Source =====

    /// Assign the narration to play
    ///
    /// Assigning the current URL again is a no-op and returns `false`.
    /// Otherwise playback stops, the generation advances, per-source state is
    /// reset and the backend starts loading. Playback intent is cleared; call
    /// [`play`](Self::play) afterwards to start the new source.
    pub fn set_source(&mut self, url: &str) -> bool {
        if self.disposed {
            warn!("Ignoring source {} on a disposed audio session", url);
            return false;
        }
        if self.source.as_deref() == Some(url) {
            debug!("Source {} unchanged", url);
            return false;
        }

        if self.source.is_some() {
            self.backend.pause();
        }

        self.generation = self.generation.next();
        self.reset_source_state();
        self.source = Some(url.to_string());

        info!("Loading {} (generation {})", url, self.generation);
        self.backend.load(url, self.generation);
        self.pending_events.push(SessionEvent::SourceChanged {
            url: url.to_string(),
            generation: self.generation,
        });
        true
    }

    /// Drop the current source without assigning a new one
    pub fn clear_source(&mut self) {
        if self.source.take().is_none() {
            return;
        }
        self.backend.pause();
        self.backend.unload();
        self.generation = self.generation.next();
        self.reset_source_state();
    }

    fn reset_source_state(&mut self) {
        self.current_time = 0.0;
        self.duration = None;
        self.duration_announced = false;
        self.ready = false;
        self.is_playing = false;
        self.ended_fired = false;
        self.wants_playback = false;
        self.deferred_play = false;
        self.play_in_flight = false;
        self.stall = StallState::default();
        self.last_progress_at = None;
    }

    // ===== Playback Control =====

    /// Request playback
    ///
    /// If the source is not ready yet the request is parked and issued once on
    /// readiness. Repeated calls while a request is pending do not stack.
    pub fn play(&mut self) {
        if self.disposed || self.source.is_none() {
            debug!("play() without a source ignored");
            return;
        }

        self.wants_playback = true;
        if self.is_playing || self.play_in_flight {
            return;
        }

        if self.ended_fired {
            debug!("Restarting ended source (generation {})", self.generation);
            self.ended_fired = false;
            self.current_time = 0.0;
            self.backend.set_current_time(0.0);
        }

        if self.ready {
            self.issue_play();
        } else if !self.deferred_play {
            debug!("Source not ready, deferring play (generation {})", self.generation);
            self.deferred_play = true;
        }
    }

    /// Pause playback; idempotent
    pub fn pause(&mut self) {
        if !self.wants_playback && !self.is_playing && !self.play_in_flight {
            return;
        }

        self.wants_playback = false;
        self.deferred_play = false;
        self.play_in_flight = false;
        self.is_playing = false;
        self.stall.retry_at = None;
        self.backend.pause();
    }

    fn issue_play(&mut self) {
        self.deferred_play = false;
        match self.backend.play() {
            Ok(()) => self.play_in_flight = true,
            Err(e) => self.block(e.to_string()),
        }
    }

    /// Playback was refused: reset intent so the UI reflects reality
    fn block(&mut self, reason: String) {
        warn!("Playback blocked (generation {}): {}", self.generation, reason);
        self.wants_playback = false;
        self.deferred_play = false;
        self.play_in_flight = false;
        self.is_playing = false;
        self.pending_events.push(SessionEvent::PlaybackBlocked {
            generation: self.generation,
            reason,
        });
    }

    // ===== Seek =====

    /// Move the playhead, clamped to `[0, duration]`
    ///
    /// Ignored until a finite, positive duration is known.
    pub fn seek(&mut self, seconds: f64) {
        let Some(duration) = self.known_duration() else {
            debug!("Seek to {:.1}s ignored, duration unknown", seconds);
            return;
        };
        if !seconds.is_finite() {
            return;
        }

        let target = seconds.clamp(0.0, duration);
        self.backend.set_current_time(target);
        self.current_time = target;
        if target < duration {
            self.ended_fired = false;
        }
    }

    /// Skip ahead, never landing in the last half second of tracks longer
    /// than the end guard minimum
    pub fn skip_forward(&mut self, seconds: f64) {
        let Some(duration) = self.known_duration() else {
            return;
        };

        let limit = if duration > self.config.end_guard_min_duration {
            duration - self.config.end_guard_seconds
        } else {
            duration
        };
        if self.current_time >= limit {
            return;
        }

        self.seek((self.current_time + seconds.max(0.0)).min(limit));
    }

    pub fn skip_backward(&mut self, seconds: f64) {
        self.seek((self.current_time - seconds.max(0.0)).max(0.0));
    }

    // ===== Media Events =====

    /// Apply a native media notification
    ///
    /// Events tagged with a superseded generation are dropped.
    pub fn handle_event(&mut self, event: MediaEvent, now: Instant) {
        if event.generation != self.generation {
            debug!(
                "Dropping stale {:?} from generation {} (current {})",
                event.kind, event.generation, self.generation
            );
            return;
        }
        if self.disposed || self.source.is_none() {
            return;
        }

        match event.kind {
            MediaEventKind::LoadedMetadata { duration } => self.on_metadata(duration),
            MediaEventKind::CanPlay => self.on_ready(),
            MediaEventKind::TimeUpdate { current_time } => self.on_time_update(current_time, now),
            MediaEventKind::Playing => {
                self.play_in_flight = false;
                self.last_progress_at = Some(now);
                if self.wants_playback {
                    self.is_playing = true;
                    self.pending_events.push(SessionEvent::PlaybackStarted {
                        generation: self.generation,
                    });
                } else {
                    // Paused while the play request was in flight
                    self.backend.pause();
                }
            }
            MediaEventKind::Paused => {
                if self.is_playing {
                    self.is_playing = false;
                    self.pending_events.push(SessionEvent::PlaybackPaused {
                        generation: self.generation,
                    });
                }
            }
            MediaEventKind::Waiting => {
                debug!("Buffering (generation {})", self.generation);
            }
            MediaEventKind::Stalled => {
                if self.wants_playback {
                    self.on_stall(now);
                } else {
                    debug!("Stall while paused ignored");
                }
            }
            MediaEventKind::Ended => self.on_ended(),
            MediaEventKind::Error { message } => self.on_error(MediaError::Load(message)),
            MediaEventKind::PlayRejected { reason } => self.block(reason),
        }
    }

    fn on_metadata(&mut self, duration: f64) {
        if !duration.is_finite() || duration <= 0.0 {
            debug!("Ignoring unusable duration {}", duration);
            return;
        }
        self.duration = Some(duration);
        if !self.duration_announced {
            self.duration_announced = true;
            self.pending_events.push(SessionEvent::DurationKnown {
                generation: self.generation,
                duration,
            });
        }
    }

    fn on_ready(&mut self) {
        self.ready = true;

        if let Some(position) = self.stall.resume_position.take() {
            debug!("Restoring position {:.1}s after reload", position);
            self.backend.set_current_time(position);
            self.current_time = position;
        }

        if self.deferred_play && self.wants_playback {
            self.issue_play();
        }
    }

    fn on_time_update(&mut self, current_time: f64, now: Instant) {
        if !current_time.is_finite() {
            return;
        }
        self.current_time = current_time.max(0.0);
        self.last_progress_at = Some(now);

        if self.play_in_flight {
            self.play_in_flight = false;
            self.is_playing = true;
        }
        if self.is_playing && self.stall.attempts > 0 && self.stall.retry_at.is_none() {
            info!("Playback recovered after {} attempt(s)", self.stall.attempts);
            self.stall = StallState::default();
        }

        if let Some(duration) = self.known_duration() {
            self.pending_events.push(SessionEvent::Progress {
                generation: self.generation,
                current_time: self.current_time,
                duration,
                percent: (self.current_time / duration * 100.0).clamp(0.0, 100.0),
            });
        }
    }

    fn on_ended(&mut self) {
        if self.ended_fired {
            debug!("Duplicate ended for generation {} ignored", self.generation);
            return;
        }
        self.ended_fired = true;
        self.is_playing = false;
        self.wants_playback = false;
        self.play_in_flight = false;
        self.stall = StallState::default();
        if let Some(duration) = self.duration {
            self.current_time = duration;
        }

        debug!("Source ended (generation {})", self.generation);
        self.pending_events.push(SessionEvent::Ended {
            generation: self.generation,
        });
    }

    fn on_error(&mut self, error: MediaError) {
        error!("Media error (generation {}): {}", self.generation, error);
        self.is_playing = false;
        self.wants_playback = false;
        self.deferred_play = false;
        self.play_in_flight = false;
        self.stall = StallState::default();
        self.pending_events.push(SessionEvent::Error {
            generation: self.generation,
            error,
        });
    }

    // ===== Stall Recovery =====

    fn on_stall(&mut self, now: Instant) {
        if self.stall.retry_at.is_some() {
            return;
        }
        if self.stall.attempts >= self.config.stall_retry_budget {
            self.give_up();
            return;
        }

        self.stall.attempts += 1;
        let delay = self.config.stall_backoff() * self.stall.attempts;
        self.stall.retry_at = Some(now + delay);
        warn!(
            "Playback stalled at {:.1}s, retry {} of {} in {:?}",
            self.current_time, self.stall.attempts, self.config.stall_retry_budget, delay
        );
        self.pending_events.push(SessionEvent::StallRecovering {
            generation: self.generation,
            attempt: self.stall.attempts,
        });
    }

    fn give_up(&mut self) {
        let attempts = self.stall.attempts;
        self.on_error(MediaError::StallTimeout { attempts });
        self.block(format!("stalled after {} recovery attempts", attempts));
    }

    /// Reload the current source at the current position
    fn reload(&mut self, now: Instant) {
        let Some(url) = self.source.clone() else {
            return;
        };

        info!("Reloading {} at {:.1}s", url, self.current_time);
        self.stall.resume_position = Some(self.current_time);
        self.ready = false;
        self.is_playing = false;
        self.play_in_flight = false;
        self.deferred_play = true;
        self.last_progress_at = Some(now);
        self.backend.load(&url, self.generation);
    }

    /// Advance timers: due stall retries and the no-progress watchdog
    pub fn poll(&mut self, now: Instant) {
        if self.disposed {
            return;
        }

        if let Some(at) = self.stall.retry_at {
            if now >= at {
                self.stall.retry_at = None;
                self.reload(now);
            }
            return;
        }

        let watching = self.is_playing || self.stall.attempts > 0;
        if !self.wants_playback || !watching {
            return;
        }
        if let Some(last) = self.last_progress_at {
            if now.saturating_duration_since(last) >= self.config.stall_timeout() {
                warn!("No playback progress for {:?}", self.config.stall_timeout());
                self.last_progress_at = Some(now);
                self.on_stall(now);
            }
        }
    }

    // ===== Lifecycle =====

    /// Tear down: pause, release the media resource and stop reacting
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        info!("Disposing audio session");
        self.backend.pause();
        self.backend.unload();
        self.source = None;
        self.generation = self.generation.next();
        self.reset_source_state();
        self.disposed = true;
    }

    // ===== State Queries =====

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn generation(&self) -> SourceGeneration {
        self.generation
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Duration if known, finite and positive
    pub fn duration(&self) -> Option<f64> {
        self.known_duration()
    }

    fn known_duration(&self) -> Option<f64> {
        self.duration.filter(|d| d.is_finite() && *d > 0.0)
    }

    /// Position within the source (0-100), 0 while duration is unknown
    pub fn progress_percent(&self) -> f64 {
        match self.known_duration() {
            Some(duration) => (self.current_time / duration * 100.0).clamp(0.0, 100.0),
            None => 0.0,
        }
    }

    /// Whether the backend confirmed playback
    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Whether playback has been requested and not yet cancelled
    pub fn wants_playback(&self) -> bool {
        self.wants_playback
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn has_ended(&self) -> bool {
        self.ended_fired
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ===== Events =====

    /// Take pending events
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.pending_events)
    }

    pub fn has_pending_events(&self) -> bool {
        !self.pending_events.is_empty()
    }
}

impl std::fmt::Debug for AudioSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSession")
            .field("source", &self.source)
            .field("generation", &self.generation)
            .field("current_time", &self.current_time)
            .field("duration", &self.duration)
            .field("is_playing", &self.is_playing)
            .field("wants_playback", &self.wants_playback)
            .finish_non_exhaustive()
    }
}
