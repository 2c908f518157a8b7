use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::discovery::{DecisionKind, RejectReason};
use crate::error::SessionFailure;
use crate::profile::ProfileId;

/// Every state change in a discovery session produces an Event.
/// Front ends drain them from the engine after each command or tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionLoaded {
        remaining: usize,
        total: u32,
        free_pick_available: bool,
        at: DateTime<Utc>,
    },
    ViewStarted {
        profile_id: ProfileId,
        activation: u64,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    /// The local countdown for the live activation crossed its boundary.
    ViewCompleted {
        profile_id: ProfileId,
        activation: u64,
        at: DateTime<Utc>,
    },
    DecisionAccepted {
        profile_id: ProfileId,
        kind: DecisionKind,
        free_pick_consumed: bool,
        at: DateTime<Utc>,
    },
    DecisionRejected {
        profile_id: ProfileId,
        kind: DecisionKind,
        reason: RejectReason,
        at: DateTime<Utc>,
    },
    /// A response arrived for a decision the session no longer tracks.
    StaleResponseDiscarded {
        profile_id: ProfileId,
        decision_id: Uuid,
        at: DateTime<Utc>,
    },
    SessionCompleted {
        viewed_count: u32,
        interested_count: u32,
        at: DateTime<Utc>,
    },
    SessionFailed {
        failure: SessionFailure,
        at: DateTime<Utc>,
    },
    /// The calendar day changed under a loaded session; a reload is due.
    DayRolledOver {
        previous: NaiveDate,
        current: NaiveDate,
        at: DateTime<Utc>,
    },
    SessionReset {
        at: DateTime<Utc>,
    },
}
