//! View timer implementation.
//!
//! The view timer is a wall-clock-based countdown for the profile currently on
//! screen. It does not use internal threads - the caller passes the current
//! time to `tick()` and gets a completion event back exactly once per
//! activation.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> Completed
//!           ^            |
//!           +-- activate +
//! ```
//!
//! The timer is advisory. It gates the interest affordance optimistically and
//! drives UI feedback; the server measures dwell time on its own.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::events::Event;
use crate::profile::ProfileId;

/// Minimum view time before interest unlocks, in seconds.
pub const DEFAULT_VIEW_DURATION_SECS: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Completed,
}

/// One activation of the timer for one profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSession {
    pub profile_id: ProfileId,
    /// Increments on every activation; completion events carry it so a
    /// superseded activation can be recognised.
    pub activation: u64,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Set once the local countdown has crossed its boundary.
    pub elapsed_locally: bool,
    /// Dwell time the server reported when an action was attempted.
    pub server_elapsed_secs: Option<f64>,
    /// Highest elapsed value observed, keeps progress monotonic if the wall
    /// clock steps backwards.
    #[serde(skip)]
    high_water_ms: u64,
}

/// Countdown owned by a single discovery session.
///
/// Operates on wall-clock deltas, so time spent suspended counts toward
/// the dwell requirement exactly as the server will count it.
#[derive(Debug, Clone)]
pub struct ViewTimer {
    duration_ms: u64,
    activations: u64,
    session: Option<ViewSession>,
}

impl Default for ViewTimer {
    fn default() -> Self {
        Self::with_duration_secs(DEFAULT_VIEW_DURATION_SECS)
    }
}

impl ViewTimer {
    pub fn new(duration: std::time::Duration) -> Self {
        Self {
            duration_ms: duration.as_millis() as u64,
            activations: 0,
            session: None,
        }
    }

    pub fn with_duration_secs(secs: u64) -> Self {
        Self::new(std::time::Duration::from_secs(secs))
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        match &self.session {
            None => TimerState::Idle,
            Some(s) if s.elapsed_locally => TimerState::Completed,
            Some(_) => TimerState::Running,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn session(&self) -> Option<&ViewSession> {
        self.session.as_ref()
    }

    /// Whether the completion boundary has been crossed for the live
    /// activation. Only `tick()` flips this.
    pub fn is_complete(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.elapsed_locally)
    }

    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        match &self.session {
            Some(s) => {
                let delta = (now - s.started_at).num_milliseconds().max(0) as u64;
                delta.max(s.high_water_ms)
            }
            None => 0,
        }
    }

    pub fn remaining_ms(&self, now: DateTime<Utc>) -> u64 {
        if self.session.is_none() {
            return 0;
        }
        self.duration_ms.saturating_sub(self.elapsed_ms(now))
    }

    /// 0.0 .. 1.0 progress within the live activation.
    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        if self.session.is_none() {
            return 0.0;
        }
        if self.duration_ms == 0 {
            return 1.0;
        }
        (self.elapsed_ms(now) as f64 / self.duration_ms as f64).min(1.0)
    }

    /// Instant at which the live activation completes, if still pending.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.session
            .as_ref()
            .filter(|s| !s.elapsed_locally)
            .map(|s| s.started_at + Duration::milliseconds(self.duration_ms as i64))
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a fresh countdown for `profile_id`, superseding any live one.
    pub fn activate(&mut self, profile_id: ProfileId, now: DateTime<Utc>) -> Event {
        self.activations += 1;
        self.session = Some(ViewSession {
            profile_id: profile_id.clone(),
            activation: self.activations,
            started_at: now,
            duration_ms: self.duration_ms,
            elapsed_locally: false,
            server_elapsed_secs: None,
            high_water_ms: 0,
        });
        Event::ViewStarted {
            profile_id,
            activation: self.activations,
            duration_secs: self.duration_ms / 1000,
            at: now,
        }
    }

    /// Drop the live activation without completing it.
    pub fn cancel(&mut self) {
        self.session = None;
    }

    /// Call periodically. Returns `Some(Event::ViewCompleted)` the first time
    /// the live activation reaches its duration.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let elapsed = self.elapsed_ms(now);
        let session = self.session.as_mut()?;
        session.high_water_ms = elapsed;
        if session.elapsed_locally || elapsed < self.duration_ms {
            return None;
        }
        session.elapsed_locally = true;
        Some(Event::ViewCompleted {
            profile_id: session.profile_id.clone(),
            activation: session.activation,
            at: now,
        })
    }

    /// Attach the server's dwell measurement to the live activation.
    pub fn record_server_elapsed(&mut self, profile_id: &ProfileId, secs: f64) {
        if let Some(session) = self.session.as_mut().filter(|s| &s.profile_id == profile_id) {
            session.server_elapsed_secs = Some(secs);
        }
    }
}
