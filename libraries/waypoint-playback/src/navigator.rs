//! Tour navigator - which stop is current and whether it should play
//!
//! A state machine over the audio stops of one tour:
//!
//! ```text
//! Idle ──select/cue──► Active(stop, playing)
//! Active ──next/prev──► Transitioning(Switch, 300ms) ──► Active(target, playing)
//! Active ──narration ended──► Transitioning(Completion, 1.5s) ──► next/prev path
//! Active(last) ──next──► Finished
//! ```
//!
//! Non-audio stops are never current. Timers are driven by [`TourNavigator::poll`]
//! so tests control time explicitly.

use crate::error::NavigationError;
use crate::events::NavigationEvent;
use crate::types::NavigatorConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use waypoint_core::{StopId, Tour};

/// Why the navigator is between stops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionPhase {
    /// Debounce after next/previous
    Switch,

    /// Window after a narration ended on its own
    Completion,
}

/// Navigator state
#[derive(Debug, Clone, PartialEq)]
pub enum NavigatorState {
    /// Nothing selected yet
    Idle,

    Active { stop_id: StopId, playing: bool },

    /// `from` stays current until the window at `until` closes.
    /// `to` is `None` for a completion on the last stop.
    Transitioning {
        from: StopId,
        to: Option<StopId>,
        phase: TransitionPhase,
        playing: bool,
        until: Instant,
    },

    /// Advanced past the last audio stop
    Finished { last_stop: StopId },
}

/// Observable facets compared before and after each state change
#[derive(PartialEq)]
struct Facets {
    stop: Option<StopId>,
    playing: bool,
    switching: bool,
    completing: bool,
}

pub struct TourNavigator {
    tour: Arc<Tour>,
    config: NavigatorConfig,
    state: NavigatorState,
    transition_audio_active: bool,
    pending_events: Vec<NavigationEvent>,
}

impl TourNavigator {
    pub fn new(tour: Arc<Tour>, config: NavigatorConfig) -> Self {
        Self {
            tour,
            config,
            state: NavigatorState::Idle,
            transition_audio_active: false,
            pending_events: Vec::new(),
        }
    }

    pub fn tour(&self) -> &Tour {
        &self.tour
    }

    // ===== Selection =====

    /// Make `stop_id` current and playing
    ///
    /// Cancels any running transition. Unknown and non-audio stops are
    /// rejected and leave the state unchanged.
    pub fn select_stop(&mut self, stop_id: &str) -> Result<(), NavigationError> {
        self.activate(stop_id, true)
    }

    /// Make `stop_id` current without starting playback
    pub fn cue_stop(&mut self, stop_id: &str) -> Result<(), NavigationError> {
        self.activate(stop_id, false)
    }

    fn activate(&mut self, stop_id: &str, playing: bool) -> Result<(), NavigationError> {
        let id = self.validate(stop_id)?;
        self.end_transition_audio();
        self.set_state(NavigatorState::Active {
            stop_id: id,
            playing,
        });
        Ok(())
    }

    fn validate(&self, stop_id: &str) -> Result<StopId, NavigationError> {
        let Some(stop) = self.tour.stop(stop_id) else {
            warn!("Rejecting unknown stop {}", stop_id);
            return Err(NavigationError::UnknownStop(StopId::new(stop_id)));
        };
        if !stop.is_audio() {
            warn!("Rejecting {} stop {}", stop.kind(), stop_id);
            return Err(NavigationError::NotAudioStop {
                id: stop.id().clone(),
                kind: stop.kind(),
            });
        }
        Ok(stop.id().clone())
    }

    // ===== Play Intent =====

    /// Flip play/pause on the current stop; no-op unless Active
    pub fn toggle_play_pause(&mut self) {
        if let NavigatorState::Active { playing, .. } = self.state {
            self.set_playing(!playing);
        }
    }

    /// Set play intent on the current stop; no-op unless Active
    pub fn set_playing(&mut self, playing: bool) {
        let NavigatorState::Active { stop_id, .. } = &self.state else {
            return;
        };
        let stop_id = stop_id.clone();
        self.set_state(NavigatorState::Active { stop_id, playing });
    }

    // ===== Next / Previous =====

    /// Move to the next audio stop, or finish after the last one
    ///
    /// Repeated calls during the switch window re-target from the pending
    /// stop and restart the window. During the completion window the window
    /// is cut short.
    pub fn advance(&mut self, now: Instant) {
        if self.is_finished() {
            debug!("advance() ignored, tour already finished");
            return;
        }
        let Some((from, base)) = self.navigation_base() else {
            debug!("advance() ignored in {:?}", self.state);
            return;
        };
        self.end_transition_audio();

        let next = self.tour.next_audio_stop(base.as_str()).map(|s| s.id.clone());
        match next {
            Some(target) => self.begin_switch(from, target, now),
            None => self.finish(base),
        }
    }

    /// Move to the previous audio stop; no-op on the first one
    pub fn retreat(&mut self, now: Instant) {
        let Some((from, base)) = self.navigation_base() else {
            debug!("retreat() ignored in {:?}", self.state);
            return;
        };

        let Some(target) = self
            .tour
            .previous_audio_stop(base.as_str())
            .map(|s| s.id.clone())
        else {
            debug!("Already at the first audio stop");
            return;
        };
        self.end_transition_audio();
        self.begin_switch(from, target, now);
    }

    /// (stop shown now, stop to navigate relative to)
    fn navigation_base(&self) -> Option<(StopId, StopId)> {
        match &self.state {
            NavigatorState::Idle => None,
            NavigatorState::Active { stop_id, .. } => Some((stop_id.clone(), stop_id.clone())),
            NavigatorState::Transitioning {
                from,
                to: Some(to),
                phase: TransitionPhase::Switch,
                ..
            } => Some((from.clone(), to.clone())),
            NavigatorState::Transitioning { from, .. } => Some((from.clone(), from.clone())),
            NavigatorState::Finished { last_stop } => {
                Some((last_stop.clone(), last_stop.clone()))
            }
        }
    }

    fn begin_switch(&mut self, from: StopId, to: StopId, now: Instant) {
        debug!("Switching {} -> {}", from, to);
        self.set_state(NavigatorState::Transitioning {
            from,
            to: Some(to),
            phase: TransitionPhase::Switch,
            playing: true,
            until: now + self.config.switch_debounce(),
        });
    }

    fn finish(&mut self, last_stop: StopId) {
        info!("Tour {} finished at {}", self.tour.id, last_stop);
        self.set_state(NavigatorState::Finished { last_stop });
        self.pending_events.push(NavigationEvent::TourFinished);
    }

    // ===== Natural Completion =====

    /// The current narration reached its end on its own
    ///
    /// Opens the completion window, starting the tour's transition clip when
    /// there is a next stop. Ignored unless Active, so duplicate
    /// notifications within one window have no effect.
    pub fn on_track_natural_completion(&mut self, now: Instant) {
        let NavigatorState::Active { stop_id, .. } = &self.state else {
            debug!("Completion ignored in {:?}", self.state);
            return;
        };
        let from = stop_id.clone();
        let next = self
            .tour
            .next_audio_stop(from.as_str())
            .map(|s| s.id.clone());
        let has_next = next.is_some();

        self.set_state(NavigatorState::Transitioning {
            from,
            to: next,
            phase: TransitionPhase::Completion,
            playing: true,
            until: now + self.config.completion_window(),
        });

        if has_next {
            if let Some(url) = self.tour.transition_audio.clone() {
                self.transition_audio_active = true;
                self.pending_events
                    .push(NavigationEvent::TransitionAudioStarted { url });
            }
        }
    }

    // ===== Timers =====

    /// Close a transition window if it is due
    pub fn poll(&mut self, now: Instant) {
        let NavigatorState::Transitioning {
            from,
            to,
            phase,
            until,
            ..
        } = &self.state
        else {
            return;
        };
        if now < *until {
            return;
        }

        match phase {
            TransitionPhase::Switch => {
                let target = to.clone().unwrap_or_else(|| from.clone());
                self.set_state(NavigatorState::Active {
                    stop_id: target,
                    playing: true,
                });
            }
            TransitionPhase::Completion => {
                let from = from.clone();
                self.end_transition_audio();
                self.set_state(NavigatorState::Active {
                    stop_id: from,
                    playing: true,
                });
                self.advance(now);
            }
        }
    }

    fn end_transition_audio(&mut self) {
        if self.transition_audio_active {
            self.transition_audio_active = false;
            self.pending_events.push(NavigationEvent::TransitionAudioEnded);
        }
    }

    // ===== State =====

    fn facets(&self) -> Facets {
        Facets {
            stop: self.current_stop_id().cloned(),
            playing: self.is_playing(),
            switching: self.is_switching_tracks(),
            completing: self.is_completing(),
        }
    }

    /// Replace the state and queue events for every facet that changed
    fn set_state(&mut self, state: NavigatorState) {
        let before = self.facets();
        self.state = state;
        let after = self.facets();
        if before == after {
            return;
        }

        if before.completing && !after.completing {
            if let Some(stop_id) = before.stop.clone() {
                self.pending_events
                    .push(NavigationEvent::CompletionEnded { stop_id });
            }
        }
        if before.switching != after.switching {
            self.pending_events.push(NavigationEvent::SwitchingTracks {
                active: after.switching,
            });
        }
        if before.stop != after.stop {
            if let Some(stop_id) = after.stop.clone() {
                self.pending_events.push(NavigationEvent::StopChanged {
                    stop_id,
                    previous: before.stop.clone(),
                });
            }
        }
        if !before.completing && after.completing {
            if let Some(stop_id) = after.stop.clone() {
                self.pending_events
                    .push(NavigationEvent::CompletionStarted { stop_id });
            }
        }
        if before.playing != after.playing {
            self.pending_events.push(NavigationEvent::PlayIntentChanged {
                playing: after.playing,
            });
        }
    }

    pub fn state(&self) -> &NavigatorState {
        &self.state
    }

    /// Stop whose card is current; during a transition the outgoing stop
    pub fn current_stop_id(&self) -> Option<&StopId> {
        match &self.state {
            NavigatorState::Idle => None,
            NavigatorState::Active { stop_id, .. } => Some(stop_id),
            NavigatorState::Transitioning { from, .. } => Some(from),
            NavigatorState::Finished { last_stop } => Some(last_stop),
        }
    }

    /// Stop a running switch will land on
    pub fn pending_stop_id(&self) -> Option<&StopId> {
        match &self.state {
            NavigatorState::Transitioning { to, .. } => to.as_ref(),
            _ => None,
        }
    }

    pub fn is_playing(&self) -> bool {
        match &self.state {
            NavigatorState::Active { playing, .. }
            | NavigatorState::Transitioning { playing, .. } => *playing,
            NavigatorState::Idle | NavigatorState::Finished { .. } => false,
        }
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self.state, NavigatorState::Transitioning { .. })
    }

    pub fn is_switching_tracks(&self) -> bool {
        matches!(
            self.state,
            NavigatorState::Transitioning {
                phase: TransitionPhase::Switch,
                ..
            }
        )
    }

    pub fn is_completing(&self) -> bool {
        matches!(
            self.state,
            NavigatorState::Transitioning {
                phase: TransitionPhase::Completion,
                ..
            }
        )
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, NavigatorState::Finished { .. })
    }

    /// Transition clip URL while it should be playing
    pub fn transition_audio(&self) -> Option<&str> {
        if self.transition_audio_active {
            self.tour.transition_audio.as_deref()
        } else {
            None
        }
    }

    // ===== Events =====

    pub fn drain_events(&mut self) -> Vec<NavigationEvent> {
        std::mem::take(&mut self.pending_events)
    }

    pub fn has_pending_events(&self) -> bool {
        !self.pending_events.is_empty()
    }
}
