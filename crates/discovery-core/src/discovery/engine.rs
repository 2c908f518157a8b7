//! Discovery session engine.
//!
//! The engine is an event-driven state machine for one user's day. It reacts
//! to exactly three sources - timer ticks, user commands and backend
//! responses - and every read of [`SessionEngine::view`] recomputes the
//! projection from current state.
//!
//! ## Phases
//!
//! ```text
//! Loading -> Active(p0) -> Active(p1) -> ... -> Complete
//!    |           |                                 |
//!    +-----------+------------> Error              |
//!    ^                                             |
//!    +----------- day rollover / dev reset --------+
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = SessionEngine::new(backend, auth, clock, EngineConfig::default());
//! engine.load().await?;
//! // In a loop:
//! engine.tick();            // timer completion, day rollover
//! engine.interest().await;  // or engine.pass().await
//! for event in engine.drain_events() { /* render */ }
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::cursor::QueueCursor;
use super::decision::{Decision, DecisionKind, DecisionOutcome, RejectReason};
use super::recorder::DecisionRecorder;
use crate::backend::{AuthGate, DiscoveryBackend, TodayResponse};
use crate::clock::Clock;
use crate::error::{BackendError, SessionFailure};
use crate::events::Event;
use crate::profile::{DailyQueue, Profile, ProfileId};
use crate::timer::{UnlockState, ViewTimer, DEFAULT_VIEW_DURATION_SECS};

/// Tunables for a session engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Local countdown before interest unlocks.
    pub view_duration: Duration,
    /// Extra attempts for the daily fetch on transient failures.
    pub fetch_retries: u32,
    /// Delay before the first retry; doubles on each further attempt.
    pub fetch_backoff: Duration,
    /// Offset used to decide which calendar day a session belongs to.
    pub day_offset: FixedOffset,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            view_duration: Duration::from_secs(DEFAULT_VIEW_DURATION_SECS),
            fetch_retries: 2,
            fetch_backoff: Duration::from_millis(250),
            day_offset: Utc.fix(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Loading,
    Active,
    Complete,
    Error,
}

/// Per-day counters. Never decrease within a day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionCounters {
    pub viewed: u32,
    pub interested: u32,
    pub total: u32,
}

/// Proof that a decision passed local validation and is in flight.
///
/// Hand it back to [`SessionEngine::complete_decision`] together with the
/// backend's answer.
#[derive(Debug, Clone)]
pub struct DecisionTicket {
    epoch: u64,
    decision: Decision,
    would_use_free_pick: bool,
}

impl DecisionTicket {
    pub fn decision(&self) -> &Decision {
        &self.decision
    }
}

/// What became of a decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Accepted { free_pick_consumed: bool },
    Rejected(RejectReason),
    /// Nothing was applied; see the classified failure.
    Failed(SessionFailure),
    /// The response belonged to a decision the session no longer tracks.
    Stale,
}

#[derive(Debug, Clone)]
struct PendingDecision {
    id: Uuid,
    profile_id: ProfileId,
}

/// Read-only projection for presentation.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub phase: SessionPhase,
    pub profile: Option<Profile>,
    pub locked: bool,
    pub free_pick_available: bool,
    /// An interest issued now would spend the free pick.
    pub is_free_pick: bool,
    pub timer_complete: bool,
    pub timer_progress: f64,
    pub remaining_secs: u64,
    pub viewed_count: u32,
    pub interested_count: u32,
    pub total: u32,
    /// Profiles left in the loaded queue, the current one included.
    pub remaining: usize,
    pub is_loading: bool,
    pub decision_pending: bool,
    pub error: Option<SessionFailure>,
    pub last_rejection: Option<RejectReason>,
    /// The server reported the current profile as resolved elsewhere; a
    /// reload brings the queue back in line.
    pub resync_required: bool,
}

/// Orchestrates the view timer, unlock policy, queue cursor and decision
/// recorder for one user's day.
pub struct SessionEngine {
    backend: Arc<dyn DiscoveryBackend>,
    recorder: DecisionRecorder,
    auth: Arc<dyn AuthGate>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,

    phase: SessionPhase,
    /// Bumped whenever the session is rebuilt; tickets from older epochs
    /// are discarded.
    epoch: u64,
    day: Option<NaiveDate>,
    cursor: QueueCursor,
    timer: ViewTimer,
    counters: SessionCounters,
    free_pick_available: bool,
    view_announced: bool,
    pending: Option<PendingDecision>,
    error: Option<SessionFailure>,
    last_rejection: Option<RejectReason>,
    resync_required: bool,
    events: Vec<Event>,
}

impl SessionEngine {
    pub fn new(
        backend: Arc<dyn DiscoveryBackend>,
        auth: Arc<dyn AuthGate>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let timer = ViewTimer::new(config.view_duration);
        Self {
            recorder: DecisionRecorder::new(Arc::clone(&backend)),
            backend,
            auth,
            clock,
            config,
            phase: SessionPhase::Loading,
            epoch: 0,
            day: None,
            cursor: QueueCursor::default(),
            timer,
            counters: SessionCounters::default(),
            free_pick_available: false,
            view_announced: false,
            pending: None,
            error: None,
            last_rejection: None,
            resync_required: false,
            events: Vec::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    pub fn current_profile(&self) -> Option<&Profile> {
        match self.phase {
            SessionPhase::Active => self.cursor.current(),
            _ => None,
        }
    }

    pub fn free_pick_available(&self) -> bool {
        self.free_pick_available
    }

    /// When the live view countdown completes, for drivers that sleep until
    /// the next timer boundary.
    pub fn timer_deadline(&self) -> Option<DateTime<Utc>> {
        match self.phase {
            SessionPhase::Active => self.timer.deadline(),
            _ => None,
        }
    }

    pub fn view(&self) -> SessionView {
        let now = self.clock.now();
        let active = self.phase == SessionPhase::Active;
        let timer_complete = active && self.timer.is_complete();
        let unlock = UnlockState::evaluate(self.free_pick_available, timer_complete);
        SessionView {
            phase: self.phase,
            profile: self.current_profile().cloned(),
            locked: !active || unlock.locked,
            free_pick_available: self.free_pick_available,
            is_free_pick: active && unlock.is_free_pick,
            timer_complete,
            timer_progress: if active { self.timer.progress(now) } else { 0.0 },
            remaining_secs: if active {
                self.timer.remaining_ms(now).div_ceil(1000)
            } else {
                0
            },
            viewed_count: self.counters.viewed,
            interested_count: self.counters.interested,
            total: self.counters.total,
            remaining: if active { self.cursor.remaining() } else { 0 },
            is_loading: self.phase == SessionPhase::Loading,
            decision_pending: self.pending.is_some(),
            error: self.error.clone(),
            last_rejection: self.last_rejection.clone(),
            resync_required: self.resync_required,
        }
    }

    /// Take all events produced since the last drain.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    // ── Loading ──────────────────────────────────────────────────────

    /// Fetch today's queue and (re)build the session from it.
    ///
    /// Any decision still in flight belongs to the previous epoch and its
    /// response will be discarded.
    pub async fn load(&mut self) -> Result<(), SessionFailure> {
        self.epoch += 1;
        self.enter_loading();

        if !self.auth.is_authenticated() {
            return Err(self.fail(SessionFailure::Authentication {
                message: "not logged in".into(),
            }));
        }

        let today = match self.fetch_today().await {
            Ok(today) => today,
            Err(err) => return Err(self.fail(SessionFailure::from_fetch(&err))),
        };
        let queue = match DailyQueue::new(today.profiles.clone()) {
            Ok(queue) => queue,
            Err(err) => {
                return Err(self.fail(SessionFailure::FetchFailed {
                    message: err.to_string(),
                }))
            }
        };

        let now = self.clock.now();
        self.day = Some(self.local_day(now));
        self.counters = SessionCounters {
            viewed: today.viewed_count,
            interested: today.interested_count,
            total: today.total,
        };
        self.free_pick_available = today.free_pick_available;
        self.cursor = QueueCursor::new(queue);
        self.emit(Event::SessionLoaded {
            remaining: self.cursor.remaining(),
            total: today.total,
            free_pick_available: today.free_pick_available,
            at: now,
        });
        info!(
            remaining = self.cursor.remaining(),
            viewed = today.viewed_count,
            total = today.total,
            free_pick = today.free_pick_available,
            "discovery session loaded"
        );

        if self.cursor.is_exhausted() {
            self.enter_complete(now);
        } else {
            self.phase = SessionPhase::Active;
            self.activate_current(now);
            self.announce_view().await?;
        }
        Ok(())
    }

    async fn fetch_today(&self) -> Result<TodayResponse, BackendError> {
        let mut attempt = 0;
        loop {
            match self.backend.today().await {
                Ok(today) => return Ok(today),
                Err(err) if err.is_transient() && attempt < self.config.fetch_retries => {
                    let delay = self.config.fetch_backoff * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    warn!(%err, attempt, "fetching today's queue failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Tell the server the current profile is on screen. Idempotent.
    ///
    /// A transient failure leaves the view unannounced so that the next
    /// interest attempt tries again. An authentication failure ends the
    /// session and is returned.
    pub async fn announce_view(&mut self) -> Result<(), SessionFailure> {
        if self.view_announced || self.phase != SessionPhase::Active {
            return Ok(());
        }
        let Some(profile_id) = self.cursor.current().map(|p| p.id.clone()) else {
            return Ok(());
        };
        let epoch = self.epoch;
        match self.backend.start_view(&profile_id).await {
            Ok(()) => {
                if epoch == self.epoch && self.is_current(&profile_id) {
                    self.view_announced = true;
                }
            }
            Err(BackendError::Unauthorized) => {
                return Err(self.fail(SessionFailure::from_submit(&BackendError::Unauthorized)));
            }
            Err(err) => {
                warn!(%err, profile_id = %profile_id, "could not start server-side view");
            }
        }
        Ok(())
    }

    // ── Timer ────────────────────────────────────────────────────────

    /// Advance time-dependent state. Returns the event produced, if any.
    ///
    /// Detects day rollover (the session drops back to `Loading` and the
    /// caller should `load()` again) and view-timer completion.
    pub fn tick(&mut self) -> Option<Event> {
        let now = self.clock.now();
        if let Some(previous) = self.day {
            let current = self.local_day(now);
            if current != previous
                && matches!(self.phase, SessionPhase::Active | SessionPhase::Complete)
            {
                info!(%previous, %current, "day rolled over, session must reload");
                self.epoch += 1;
                self.enter_loading();
                self.day = None;
                return Some(self.emit(Event::DayRolledOver {
                    previous,
                    current,
                    at: now,
                }));
            }
        }
        if self.phase != SessionPhase::Active {
            return None;
        }
        let event = self.timer.tick(now)?;
        if let Event::ViewCompleted { profile_id, .. } = &event {
            if !self.is_current(profile_id) {
                return None;
            }
            debug!(profile_id = %profile_id, "view timer completed");
        }
        Some(self.emit(event))
    }

    // ── Decisions ────────────────────────────────────────────────────

    pub async fn interest(&mut self) -> Resolution {
        self.decide_current(DecisionKind::Interest).await
    }

    pub async fn pass(&mut self) -> Resolution {
        self.decide_current(DecisionKind::Pass).await
    }

    async fn decide_current(&mut self, kind: DecisionKind) -> Resolution {
        let Some(profile_id) = self.current_profile().map(|p| p.id.clone()) else {
            return Resolution::Rejected(self.reject_locally(None, kind, RejectReason::NotActive));
        };
        self.decide(kind, &profile_id).await
    }

    /// Validate, submit and apply a decision for `profile_id`.
    pub async fn decide(&mut self, kind: DecisionKind, profile_id: &ProfileId) -> Resolution {
        self.tick();
        if kind == DecisionKind::Interest && self.is_current(profile_id) {
            if let Err(failure) = self.announce_view().await {
                return Resolution::Failed(failure);
            }
        }
        let ticket = match self.begin_decision(kind, profile_id) {
            Ok(ticket) => ticket,
            Err(reason) => return Resolution::Rejected(reason),
        };
        let result = self.recorder.submit(ticket.decision()).await;
        let resolution = self.complete_decision(ticket, result);
        if matches!(resolution, Resolution::Accepted { .. }) {
            // The decision stands; an auth failure here shows up in the phase.
            let _ = self.announce_view().await;
        }
        resolution
    }

    /// Local validation. On success the decision is marked in flight and
    /// any further decision is refused until it completes.
    pub fn begin_decision(
        &mut self,
        kind: DecisionKind,
        profile_id: &ProfileId,
    ) -> Result<DecisionTicket, RejectReason> {
        let subject = Some(profile_id.clone());
        if self.phase == SessionPhase::Complete && self.cursor.contains(profile_id) {
            return Err(self.reject_locally(subject, kind, RejectReason::AlreadyResolved));
        }
        if self.phase != SessionPhase::Active {
            return Err(self.reject_locally(subject, kind, RejectReason::NotActive));
        }
        if self.pending.is_some() {
            return Err(self.reject_locally(subject, kind, RejectReason::DecisionPending));
        }
        if !self.is_current(profile_id) {
            return Err(self.reject_locally(subject, kind, RejectReason::AlreadyResolved));
        }

        let timer_complete = self.timer.is_complete();
        let unlock = UnlockState::evaluate(self.free_pick_available, timer_complete);
        if kind == DecisionKind::Interest && unlock.locked {
            return Err(self.reject_locally(subject, kind, RejectReason::InsufficientDwell));
        }

        let now = self.clock.now();
        let elapsed_secs = self.timer.elapsed_ms(now) as f64 / 1000.0;
        let decision = Decision::new(kind, profile_id.clone(), elapsed_secs, now);
        self.pending = Some(PendingDecision {
            id: decision.id,
            profile_id: profile_id.clone(),
        });
        Ok(DecisionTicket {
            epoch: self.epoch,
            decision,
            would_use_free_pick: kind == DecisionKind::Interest && unlock.is_free_pick,
        })
    }

    /// Apply the backend's answer to an in-flight decision.
    ///
    /// Answers whose ticket no longer matches the session (a reload or reset
    /// happened, or the cursor moved) are discarded.
    pub fn complete_decision(
        &mut self,
        ticket: DecisionTicket,
        result: Result<DecisionOutcome, BackendError>,
    ) -> Resolution {
        let now = self.clock.now();
        let decision = ticket.decision;
        let matches_pending = self
            .pending
            .as_ref()
            .is_some_and(|p| p.id == decision.id && p.profile_id == decision.profile_id);
        if ticket.epoch != self.epoch
            || !matches_pending
            || !self.is_current(&decision.profile_id)
        {
            warn!(
                decision_id = %decision.id,
                profile_id = %decision.profile_id,
                "discarding response for a superseded decision"
            );
            self.emit(Event::StaleResponseDiscarded {
                profile_id: decision.profile_id,
                decision_id: decision.id,
                at: now,
            });
            return Resolution::Stale;
        }
        self.pending = None;

        match result {
            Err(err) => {
                let failure = SessionFailure::from_submit(&err);
                warn!(%err, kind = %decision.kind, "decision not recorded");
                if matches!(failure, SessionFailure::Authentication { .. }) {
                    self.fail(failure.clone());
                } else {
                    self.error = Some(failure.clone());
                }
                Resolution::Failed(failure)
            }
            Ok(DecisionOutcome::Rejected(reason)) => {
                warn!(reason = %reason, kind = %decision.kind, profile_id = %decision.profile_id, "decision rejected");
                match &reason {
                    RejectReason::FreePickUsed => self.free_pick_available = false,
                    RejectReason::AlreadyResolved => self.resync_required = true,
                    _ => {}
                }
                self.error = Some(SessionFailure::Rejected {
                    reason: reason.clone(),
                });
                self.last_rejection = Some(reason.clone());
                self.emit(Event::DecisionRejected {
                    profile_id: decision.profile_id,
                    kind: decision.kind,
                    reason: reason.clone(),
                    at: now,
                });
                Resolution::Rejected(reason)
            }
            Ok(DecisionOutcome::Accepted {
                free_pick_consumed,
                server_elapsed_secs,
            }) => {
                if let Some(secs) = server_elapsed_secs {
                    self.timer.record_server_elapsed(&decision.profile_id, secs);
                }
                let consumed = decision.kind == DecisionKind::Interest
                    && free_pick_consumed.unwrap_or(ticket.would_use_free_pick);
                self.apply_accepted(&decision, consumed, now);
                Resolution::Accepted {
                    free_pick_consumed: consumed,
                }
            }
        }
    }

    #[cfg(any(test, feature = "dev-reset"))]
    /// Drop all local state and return to `Loading`. Development only.
    pub fn reset_for_testing(&mut self) {
        let now = self.clock.now();
        info!("discovery session reset");
        self.epoch += 1;
        self.enter_loading();
        self.cursor = QueueCursor::default();
        self.counters = SessionCounters::default();
        self.free_pick_available = false;
        self.day = None;
        self.emit(Event::SessionReset { at: now });
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn apply_accepted(&mut self, decision: &Decision, free_pick_consumed: bool, now: DateTime<Utc>) {
        self.counters.viewed += 1;
        if decision.kind == DecisionKind::Interest {
            self.counters.interested += 1;
        }
        if free_pick_consumed {
            self.free_pick_available = false;
        }
        self.error = None;
        self.last_rejection = None;
        self.resync_required = false;
        info!(
            kind = %decision.kind,
            profile_id = %decision.profile_id,
            free_pick_consumed,
            viewed = self.counters.viewed,
            "decision accepted"
        );
        self.emit(Event::DecisionAccepted {
            profile_id: decision.profile_id.clone(),
            kind: decision.kind,
            free_pick_consumed,
            at: now,
        });

        self.cursor.advance();
        if self.cursor.is_exhausted() {
            self.enter_complete(now);
        } else {
            self.activate_current(now);
        }
    }

    fn activate_current(&mut self, now: DateTime<Utc>) {
        self.view_announced = false;
        match self.cursor.current().map(|p| p.id.clone()) {
            Some(id) => {
                let event = self.timer.activate(id, now);
                self.emit(event);
            }
            None => self.timer.cancel(),
        }
    }

    fn enter_loading(&mut self) {
        self.phase = SessionPhase::Loading;
        self.timer.cancel();
        self.pending = None;
        self.view_announced = false;
        self.error = None;
        self.last_rejection = None;
        self.resync_required = false;
    }

    fn enter_complete(&mut self, now: DateTime<Utc>) {
        self.phase = SessionPhase::Complete;
        self.timer.cancel();
        info!(
            viewed = self.counters.viewed,
            interested = self.counters.interested,
            "discovery complete for today"
        );
        self.emit(Event::SessionCompleted {
            viewed_count: self.counters.viewed,
            interested_count: self.counters.interested,
            at: now,
        });
    }

    fn fail(&mut self, failure: SessionFailure) -> SessionFailure {
        warn!(%failure, "discovery session failed");
        self.phase = SessionPhase::Error;
        self.timer.cancel();
        self.pending = None;
        self.error = Some(failure.clone());
        let at = self.clock.now();
        self.emit(Event::SessionFailed {
            failure: failure.clone(),
            at,
        });
        failure
    }

    fn reject_locally(
        &mut self,
        profile_id: Option<ProfileId>,
        kind: DecisionKind,
        reason: RejectReason,
    ) -> RejectReason {
        debug!(reason = %reason, kind = %kind, "decision refused locally");
        self.last_rejection = Some(reason.clone());
        if let Some(profile_id) = profile_id {
            let at = self.clock.now();
            self.emit(Event::DecisionRejected {
                profile_id,
                kind,
                reason: reason.clone(),
                at,
            });
        }
        reason
    }

    fn is_current(&self, profile_id: &ProfileId) -> bool {
        self.phase == SessionPhase::Active
            && self.cursor.current().is_some_and(|p| &p.id == profile_id)
    }

    fn local_day(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.config.day_offset).date_naive()
    }

    fn emit(&mut self, event: Event) -> Event {
        self.events.push(event.clone());
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AuthFlag, InMemoryBackend};
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    struct Harness {
        clock: ManualClock,
        server: Arc<InMemoryBackend>,
        auth: AuthFlag,
        engine: SessionEngine,
    }

    fn harness(ids: &[&str]) -> Harness {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap());
        let roster = ids.iter().map(|id| Profile::named(*id, id.to_uppercase())).collect();
        let server = Arc::new(InMemoryBackend::new(Arc::new(clock.clone()), roster));
        let auth = AuthFlag::default();
        let config = EngineConfig {
            fetch_retries: 0,
            fetch_backoff: Duration::ZERO,
            ..EngineConfig::default()
        };
        let engine = SessionEngine::new(
            server.clone(),
            Arc::new(auth.clone()),
            Arc::new(clock.clone()),
            config,
        );
        Harness {
            clock,
            server,
            auth,
            engine,
        }
    }

    fn current_id(engine: &SessionEngine) -> String {
        engine.current_profile().unwrap().id.to_string()
    }

    #[tokio::test]
    async fn load_activates_first_profile() {
        let mut h = harness(&["a", "b"]);
        h.engine.load().await.unwrap();

        assert_eq!(h.engine.phase(), SessionPhase::Active);
        assert_eq!(current_id(&h.engine), "a");
        let view = h.engine.view();
        assert_eq!(view.total, 2);
        assert!(view.free_pick_available);
        assert!(!view.locked);
        assert!(view.is_free_pick);

        let events = h.engine.drain_events();
        assert!(matches!(events[0], Event::SessionLoaded { remaining: 2, .. }));
        assert!(matches!(events[1], Event::ViewStarted { activation: 1, .. }));
    }

    #[tokio::test]
    async fn empty_queue_loads_straight_to_complete() {
        let mut h = harness(&[]);
        h.engine.load().await.unwrap();
        assert_eq!(h.engine.phase(), SessionPhase::Complete);
        assert!(h.engine.current_profile().is_none());
    }

    #[tokio::test]
    async fn interest_locked_without_free_pick_until_timer_completes() {
        let mut h = harness(&["a"]);
        h.server.set_free_pick_available(false);
        h.engine.load().await.unwrap();
        assert!(h.engine.view().locked);

        h.clock.advance_secs(5);
        assert_eq!(
            h.engine.interest().await,
            Resolution::Rejected(RejectReason::InsufficientDwell)
        );
        assert_eq!(h.server.resolved_count(), 0);

        h.clock.advance_secs(15);
        assert!(matches!(h.engine.tick(), Some(Event::ViewCompleted { .. })));
        assert!(!h.engine.view().locked);
        assert_eq!(
            h.engine.interest().await,
            Resolution::Accepted {
                free_pick_consumed: false
            }
        );
        assert_eq!(h.engine.phase(), SessionPhase::Complete);
    }

    #[tokio::test]
    async fn free_pick_is_kept_when_timer_already_finished() {
        let mut h = harness(&["a", "b"]);
        h.engine.load().await.unwrap();
        h.clock.advance_secs(21);

        let resolution = h.engine.interest().await;
        assert_eq!(
            resolution,
            Resolution::Accepted {
                free_pick_consumed: false
            }
        );
        assert!(h.engine.free_pick_available());
    }

    #[tokio::test]
    async fn second_decision_while_pending_is_refused() {
        let mut h = harness(&["a", "b"]);
        h.engine.load().await.unwrap();

        let first = h.engine.begin_decision(DecisionKind::Pass, &ProfileId::new("a")).unwrap();
        let second = h.engine.begin_decision(DecisionKind::Pass, &ProfileId::new("a"));
        assert_eq!(second.unwrap_err(), RejectReason::DecisionPending);
        assert!(h.engine.view().decision_pending);

        let outcome = Ok(DecisionOutcome::Accepted {
            free_pick_consumed: None,
            server_elapsed_secs: None,
        });
        assert!(matches!(
            h.engine.complete_decision(first, outcome),
            Resolution::Accepted { .. }
        ));
        assert_eq!(current_id(&h.engine), "b");
        assert_eq!(h.engine.counters().viewed, 1);
    }

    #[tokio::test]
    async fn late_response_after_reset_is_discarded() {
        let mut h = harness(&["a", "b"]);
        h.engine.load().await.unwrap();

        let ticket = h.engine.begin_decision(DecisionKind::Pass, &ProfileId::new("a")).unwrap();
        h.engine.reset_for_testing();
        h.engine.load().await.unwrap();
        h.engine.drain_events();

        let late = Ok(DecisionOutcome::Accepted {
            free_pick_consumed: None,
            server_elapsed_secs: None,
        });
        assert_eq!(h.engine.complete_decision(ticket, late), Resolution::Stale);
        assert_eq!(current_id(&h.engine), "a");
        assert_eq!(h.engine.counters().viewed, 0);
        assert!(matches!(
            h.engine.drain_events().as_slice(),
            [Event::StaleResponseDiscarded { .. }]
        ));
    }

    #[tokio::test]
    async fn reset_returns_to_loading() {
        let mut h = harness(&["a"]);
        h.engine.load().await.unwrap();
        h.engine.reset_for_testing();
        assert_eq!(h.engine.phase(), SessionPhase::Loading);
        assert!(h.engine.view().is_loading);
        assert!(h.engine.timer_deadline().is_none());
    }

    #[tokio::test]
    async fn stale_completion_never_fires_for_previous_profile() {
        let mut h = harness(&["a", "b"]);
        h.engine.load().await.unwrap();
        h.clock.advance_secs(10);
        h.engine.pass().await;
        h.engine.drain_events();

        // A's countdown would have ended at +20s; B's ends at +30s.
        h.clock.advance_secs(11);
        assert!(h.engine.tick().is_none());
        h.clock.advance_secs(9);
        match h.engine.tick() {
            Some(Event::ViewCompleted { profile_id, .. }) => assert_eq!(profile_id.as_str(), "b"),
            other => panic!("Expected ViewCompleted for b, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn network_failure_applies_nothing() {
        let mut h = harness(&["a", "b"]);
        h.engine.load().await.unwrap();
        h.server.fail_next(BackendError::Network("connection reset".into()));

        let resolution = h.engine.pass().await;
        assert!(matches!(
            resolution,
            Resolution::Failed(SessionFailure::Transient { .. })
        ));
        assert_eq!(h.engine.phase(), SessionPhase::Active);
        assert_eq!(current_id(&h.engine), "a");
        assert_eq!(h.engine.counters().viewed, 0);
        assert!(h.engine.view().error.is_some());

        // A retry goes through and clears the error.
        assert!(matches!(h.engine.pass().await, Resolution::Accepted { .. }));
        assert!(h.engine.view().error.is_none());
    }

    #[tokio::test]
    async fn fetch_failure_enters_error_and_retry_recovers() {
        let mut h = harness(&["a"]);
        h.server.fail_next(BackendError::Status {
            status: 503,
            body: "unavailable".into(),
        });
        let err = h.engine.load().await.unwrap_err();
        assert!(matches!(err, SessionFailure::FetchFailed { .. }));
        assert_eq!(h.engine.phase(), SessionPhase::Error);

        h.engine.load().await.unwrap();
        assert_eq!(h.engine.phase(), SessionPhase::Active);
    }

    #[tokio::test]
    async fn transient_fetch_failure_is_retried() {
        let mut h = harness(&["a"]);
        h.engine.config.fetch_retries = 1;
        h.server.fail_next(BackendError::Timeout);
        h.engine.load().await.unwrap();
        assert_eq!(h.engine.phase(), SessionPhase::Active);
    }

    #[tokio::test]
    async fn unauthenticated_caller_never_reaches_backend() {
        let mut h = harness(&["a"]);
        h.auth.set(false);
        let err = h.engine.load().await.unwrap_err();
        assert!(matches!(err, SessionFailure::Authentication { .. }));
        assert_eq!(h.engine.phase(), SessionPhase::Error);
    }

    #[tokio::test]
    async fn auth_failure_mid_session_ends_session() {
        let mut h = harness(&["a", "b"]);
        h.engine.load().await.unwrap();
        h.server.set_authenticated(false);

        let resolution = h.engine.pass().await;
        assert!(matches!(
            resolution,
            Resolution::Failed(SessionFailure::Authentication { .. })
        ));
        assert_eq!(h.engine.phase(), SessionPhase::Error);
    }

    #[tokio::test]
    async fn resolved_elsewhere_flags_resync() {
        let mut h = harness(&["a", "b"]);
        h.engine.load().await.unwrap();
        h.server.resolve_elsewhere(&ProfileId::new("a"), DecisionKind::Pass);

        assert_eq!(
            h.engine.pass().await,
            Resolution::Rejected(RejectReason::AlreadyResolved)
        );
        assert_eq!(current_id(&h.engine), "a");
        assert!(h.engine.view().resync_required);

        h.engine.load().await.unwrap();
        assert_eq!(current_id(&h.engine), "b");
        assert_eq!(h.engine.counters().viewed, 1);
        assert!(!h.engine.view().resync_required);
    }

    #[tokio::test]
    async fn free_pick_used_rejection_clears_local_flag() {
        let mut h = harness(&["a"]);
        h.engine.load().await.unwrap();
        let ticket = h
            .engine
            .begin_decision(DecisionKind::Interest, &ProfileId::new("a"))
            .unwrap();
        let resolution = h.engine.complete_decision(
            ticket,
            Ok(DecisionOutcome::Rejected(RejectReason::FreePickUsed)),
        );
        assert_eq!(resolution, Resolution::Rejected(RejectReason::FreePickUsed));
        let view = h.engine.view();
        assert!(!view.free_pick_available);
        assert!(view.locked);
        assert_eq!(current_id(&h.engine), "a");
    }

    #[tokio::test]
    async fn free_pick_consumption_inferred_when_server_is_silent() {
        let mut h = harness(&["a", "b"]);
        h.engine.load().await.unwrap();
        let ticket = h
            .engine
            .begin_decision(DecisionKind::Interest, &ProfileId::new("a"))
            .unwrap();
        let resolution = h.engine.complete_decision(
            ticket,
            Ok(DecisionOutcome::Accepted {
                free_pick_consumed: None,
                server_elapsed_secs: Some(0.0),
            }),
        );
        assert_eq!(
            resolution,
            Resolution::Accepted {
                free_pick_consumed: true
            }
        );
        assert!(!h.engine.free_pick_available());
    }

    #[tokio::test]
    async fn day_rollover_requires_reload() {
        let mut h = harness(&["a", "b"]);
        h.engine.load().await.unwrap();
        h.engine.pass().await;
        h.engine.pass().await;
        assert_eq!(h.engine.phase(), SessionPhase::Complete);

        h.clock.advance(chrono::Duration::hours(15));
        assert!(matches!(h.engine.tick(), Some(Event::DayRolledOver { .. })));
        assert_eq!(h.engine.phase(), SessionPhase::Loading);

        h.engine.load().await.unwrap();
        assert_eq!(h.engine.phase(), SessionPhase::Active);
        assert_eq!(h.engine.counters().viewed, 0);
        assert!(h.engine.free_pick_available());
    }

    #[tokio::test]
    async fn decisions_refused_when_not_active() {
        let mut h = harness(&["a"]);
        assert_eq!(
            h.engine.pass().await,
            Resolution::Rejected(RejectReason::NotActive)
        );
        h.engine.load().await.unwrap();
        h.engine.pass().await;
        assert_eq!(
            h.engine.interest().await,
            Resolution::Rejected(RejectReason::NotActive)
        );
    }

    #[tokio::test]
    async fn repeated_pass_after_last_profile_is_already_resolved() {
        let mut h = harness(&["a"]);
        h.engine.load().await.unwrap();
        assert!(matches!(h.engine.pass().await, Resolution::Accepted { .. }));
        assert_eq!(h.engine.phase(), SessionPhase::Complete);

        let again = h.engine.decide(DecisionKind::Pass, &ProfileId::new("a")).await;
        assert_eq!(again, Resolution::Rejected(RejectReason::AlreadyResolved));
        let unknown = h.engine.decide(DecisionKind::Pass, &ProfileId::new("zz")).await;
        assert_eq!(unknown, Resolution::Rejected(RejectReason::NotActive));
        assert_eq!(h.server.resolved_count(), 1);
    }

    #[tokio::test]
    async fn stale_id_outside_a_loaded_day_is_not_active() {
        let mut h = harness(&["a"]);
        h.server.fail_next(BackendError::Network("down".into()));
        assert!(h.engine.load().await.is_err());
        assert_eq!(h.engine.phase(), SessionPhase::Error);
        assert_eq!(
            h.engine.decide(DecisionKind::Pass, &ProfileId::new("a")).await,
            Resolution::Rejected(RejectReason::NotActive)
        );
    }

    #[tokio::test]
    async fn load_fails_when_view_start_is_unauthorized() {
        let mut h = harness(&["a", "b"]);
        h.server.fail_next_view(BackendError::Unauthorized);

        let failure = h.engine.load().await.unwrap_err();
        assert!(matches!(failure, SessionFailure::Authentication { .. }));
        assert_eq!(h.engine.phase(), SessionPhase::Error);
        assert_eq!(h.engine.view().error, Some(failure));
    }

    #[tokio::test]
    async fn transient_view_failure_is_announced_again_on_interest() {
        let mut h = harness(&["a", "b"]);
        h.server.set_free_pick_available(false);
        h.server.fail_next_view(BackendError::Network("reset".into()));
        h.engine.load().await.unwrap();
        assert_eq!(h.engine.phase(), SessionPhase::Active);
        assert_eq!(h.server.view_started_at(&ProfileId::new("a")), None);

        h.clock.advance_secs(3);
        assert_eq!(
            h.engine.interest().await,
            Resolution::Rejected(RejectReason::InsufficientDwell)
        );
        assert_eq!(
            h.server.view_started_at(&ProfileId::new("a")),
            Some(h.clock.now())
        );
    }

    #[tokio::test]
    async fn view_announce_auth_failure_ends_session() {
        let mut h = harness(&["a", "b"]);
        h.engine.load().await.unwrap();
        let ticket = h
            .engine
            .begin_decision(DecisionKind::Pass, &ProfileId::new("a"))
            .unwrap();
        h.engine.complete_decision(
            ticket,
            Ok(DecisionOutcome::Accepted {
                free_pick_consumed: Some(false),
                server_elapsed_secs: None,
            }),
        );
        assert_eq!(current_id(&h.engine), "b");
        h.server.set_authenticated(false);

        let failure = h.engine.announce_view().await.unwrap_err();
        assert!(matches!(failure, SessionFailure::Authentication { .. }));
        assert_eq!(h.engine.phase(), SessionPhase::Error);
        assert_eq!(h.server.view_started_at(&ProfileId::new("b")), None);
    }

    #[tokio::test]
    async fn locked_whenever_not_active() {
        let mut h = harness(&["a"]);
        assert!(h.engine.view().locked);

        h.engine.load().await.unwrap();
        assert!(!h.engine.view().locked);
        h.engine.pass().await;
        let view = h.engine.view();
        assert_eq!(view.phase, SessionPhase::Complete);
        assert!(view.free_pick_available);
        assert!(view.locked);
        assert!(!view.is_free_pick);
    }

    #[tokio::test]
    async fn server_rejection_is_exposed_as_session_error() {
        let mut h = harness(&["a", "b"]);
        h.engine.load().await.unwrap();
        h.server.resolve_elsewhere(&ProfileId::new("a"), DecisionKind::Pass);

        h.engine.pass().await;
        assert_eq!(
            h.engine.view().error,
            Some(SessionFailure::Rejected {
                reason: RejectReason::AlreadyResolved
            })
        );

        h.engine.load().await.unwrap();
        assert!(matches!(h.engine.pass().await, Resolution::Accepted { .. }));
        assert_eq!(h.engine.view().error, None);
    }
}
