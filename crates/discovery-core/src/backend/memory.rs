//! In-process reference implementation of the discovery server.
//!
//! Keeps its own clock and measures dwell time from the moment it saw
//! `start_view`, ignoring whatever elapsed time the client claims. Used by
//! tests and by the CLI's offline demo mode.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::debug;

use super::{DecisionResponse, DiscoveryBackend, InterestRequest, PassRequest, TodayResponse};
use crate::clock::Clock;
use crate::discovery::DecisionKind;
use crate::error::BackendError;
use crate::profile::{Profile, ProfileId};
use crate::timer::DEFAULT_VIEW_DURATION_SECS;

#[derive(Debug)]
struct ServerState {
    day: NaiveDate,
    roster: Vec<Profile>,
    resolved: HashMap<ProfileId, DecisionKind>,
    views: HashMap<ProfileId, DateTime<Utc>>,
    free_pick_used: bool,
    authenticated: bool,
    injected_failures: VecDeque<BackendError>,
    view_failures: VecDeque<BackendError>,
}

impl ServerState {
    fn interested_count(&self) -> u32 {
        self.resolved
            .values()
            .filter(|k| **k == DecisionKind::Interest)
            .count() as u32
    }

    fn knows(&self, profile_id: &ProfileId) -> bool {
        self.roster.iter().any(|p| &p.id == profile_id)
    }
}

/// Authoritative single-user discovery server held in memory.
pub struct InMemoryBackend {
    clock: Arc<dyn Clock>,
    min_dwell: Duration,
    state: Mutex<ServerState>,
}

impl InMemoryBackend {
    /// Serve `roster` as every day's queue, with the default minimum dwell.
    pub fn new(clock: Arc<dyn Clock>, roster: Vec<Profile>) -> Self {
        let day = clock.now().date_naive();
        Self {
            clock,
            min_dwell: Duration::seconds(DEFAULT_VIEW_DURATION_SECS as i64),
            state: Mutex::new(ServerState {
                day,
                roster,
                resolved: HashMap::new(),
                views: HashMap::new(),
                free_pick_used: false,
                authenticated: true,
                injected_failures: VecDeque::new(),
                view_failures: VecDeque::new(),
            }),
        }
    }

    pub fn with_min_dwell(mut self, min_dwell: std::time::Duration) -> Self {
        self.min_dwell = Duration::milliseconds(min_dwell.as_millis() as i64);
        self
    }

    // ── Test and demo controls ───────────────────────────────────────

    /// Make the next call fail with `err`. Failures queue up in order.
    pub fn fail_next(&self, err: BackendError) {
        self.lock().injected_failures.push_back(err);
    }

    /// Make the next `start_view` call fail with `err`, leaving other
    /// calls untouched.
    pub fn fail_next_view(&self, err: BackendError) {
        self.lock().view_failures.push_back(err);
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        self.lock().authenticated = authenticated;
    }

    pub fn set_free_pick_available(&self, available: bool) {
        self.lock().free_pick_used = !available;
    }

    /// Resolve a profile as if another client session had done it.
    pub fn resolve_elsewhere(&self, profile_id: &ProfileId, kind: DecisionKind) {
        self.lock().resolved.insert(profile_id.clone(), kind);
    }

    /// Number of decisions the server has accepted today.
    pub fn resolved_count(&self) -> usize {
        self.lock().resolved.len()
    }

    pub fn free_pick_used(&self) -> bool {
        self.lock().free_pick_used
    }

    /// When the server started measuring dwell for `profile_id`, if ever.
    pub fn view_started_at(&self, profile_id: &ProfileId) -> Option<DateTime<Utc>> {
        self.lock().views.get(profile_id).copied()
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Roll the day if needed, then surface injected failures and the
    /// authentication check.
    fn enter(&self) -> Result<MutexGuard<'_, ServerState>, BackendError> {
        let today = self.clock.now().date_naive();
        let mut state = self.lock();
        if state.day != today {
            debug!(previous = %state.day, current = %today, "server day rollover");
            state.day = today;
            state.resolved.clear();
            state.views.clear();
            state.free_pick_used = false;
        }
        if let Some(err) = state.injected_failures.pop_front() {
            return Err(err);
        }
        if !state.authenticated {
            return Err(BackendError::Unauthorized);
        }
        Ok(state)
    }

    fn unknown(profile_id: &ProfileId) -> BackendError {
        BackendError::Status {
            status: 404,
            body: format!("unknown profile {profile_id}"),
        }
    }
}

#[async_trait]
impl DiscoveryBackend for InMemoryBackend {
    async fn today(&self) -> Result<TodayResponse, BackendError> {
        let state = self.enter()?;
        let profiles: Vec<Profile> = state
            .roster
            .iter()
            .filter(|p| !state.resolved.contains_key(&p.id))
            .cloned()
            .collect();
        Ok(TodayResponse {
            profiles,
            viewed_count: state.resolved.len() as u32,
            interested_count: state.interested_count(),
            total: state.roster.len() as u32,
            free_pick_available: !state.free_pick_used,
        })
    }

    async fn start_view(&self, profile_id: &ProfileId) -> Result<(), BackendError> {
        let now = self.clock.now();
        let mut state = self.enter()?;
        if let Some(err) = state.view_failures.pop_front() {
            return Err(err);
        }
        if !state.knows(profile_id) {
            return Err(Self::unknown(profile_id));
        }
        // Idempotent: a repeated call keeps the original start.
        state.views.entry(profile_id.clone()).or_insert(now);
        Ok(())
    }

    async fn interest(&self, request: &InterestRequest) -> Result<DecisionResponse, BackendError> {
        let now = self.clock.now();
        let mut state = self.enter()?;
        let id = &request.profile_id;
        if !state.knows(id) {
            return Err(Self::unknown(id));
        }
        if state.resolved.contains_key(id) {
            return Ok(DecisionResponse::rejected("already_resolved"));
        }

        let elapsed = state
            .views
            .get(id)
            .map(|started| now - *started)
            .unwrap_or_else(Duration::zero);
        let elapsed_secs = elapsed.num_milliseconds().max(0) as f64 / 1000.0;
        debug!(
            profile_id = %id,
            client_elapsed_secs = request.client_elapsed_seconds,
            server_elapsed_secs = elapsed_secs,
            "interest received"
        );

        let free_pick_consumed = if elapsed >= self.min_dwell {
            false
        } else if !state.free_pick_used {
            state.free_pick_used = true;
            true
        } else {
            let mut resp = DecisionResponse::rejected("insufficient_dwell");
            resp.server_elapsed_seconds = Some(elapsed_secs);
            return Ok(resp);
        };

        state.resolved.insert(id.clone(), DecisionKind::Interest);
        Ok(DecisionResponse {
            accepted: true,
            reason: None,
            free_pick_consumed: Some(free_pick_consumed),
            server_elapsed_seconds: Some(elapsed_secs),
        })
    }

    async fn pass(&self, request: &PassRequest) -> Result<DecisionResponse, BackendError> {
        let mut state = self.enter()?;
        let id = &request.profile_id;
        if !state.knows(id) {
            return Err(Self::unknown(id));
        }
        if state.resolved.contains_key(id) {
            return Ok(DecisionResponse::rejected("already_resolved"));
        }
        state.resolved.insert(id.clone(), DecisionKind::Pass);
        Ok(DecisionResponse::accepted())
    }
}
