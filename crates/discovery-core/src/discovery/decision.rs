//! Decisions and their outcomes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::DecisionResponse;
use crate::profile::ProfileId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    Interest,
    Pass,
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionKind::Interest => f.write_str("interest"),
            DecisionKind::Pass => f.write_str("pass"),
        }
    }
}

/// A user's resolution of one profile, sent once to the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    /// Client-generated id used to match a late response to its request.
    pub id: Uuid,
    pub kind: DecisionKind,
    pub profile_id: ProfileId,
    /// Telemetry only; the server measures dwell time itself.
    pub client_elapsed_secs: f64,
    pub submitted_at: DateTime<Utc>,
}

impl Decision {
    pub fn new(
        kind: DecisionKind,
        profile_id: ProfileId,
        client_elapsed_secs: f64,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            profile_id,
            client_elapsed_secs,
            submitted_at,
        }
    }
}

/// Why a decision did not count.
///
/// The first three come from the server; the rest are raised locally
/// before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RejectReason {
    InsufficientDwell,
    AlreadyResolved,
    FreePickUsed,
    /// Another decision for this session is still in flight.
    DecisionPending,
    /// The session is not showing a profile.
    NotActive,
    /// A reason this client does not know about.
    Other(String),
}

impl RejectReason {
    pub fn as_str(&self) -> &str {
        match self {
            RejectReason::InsufficientDwell => "insufficient_dwell",
            RejectReason::AlreadyResolved => "already_resolved",
            RejectReason::FreePickUsed => "free_pick_used",
            RejectReason::DecisionPending => "decision_pending",
            RejectReason::NotActive => "not_active",
            RejectReason::Other(s) => s,
        }
    }

    /// User-facing explanation.
    pub fn message(&self) -> &str {
        match self {
            RejectReason::InsufficientDwell => {
                "Take a little more time with this profile before expressing interest."
            }
            RejectReason::AlreadyResolved => "This profile was already resolved.",
            RejectReason::FreePickUsed => "Today's free pick has already been used.",
            RejectReason::DecisionPending => "Your previous choice is still being saved.",
            RejectReason::NotActive => "There is no profile to act on right now.",
            RejectReason::Other(_) => "The server did not accept this action.",
        }
    }
}

impl From<String> for RejectReason {
    fn from(s: String) -> Self {
        match s.as_str() {
            "insufficient_dwell" => RejectReason::InsufficientDwell,
            "already_resolved" => RejectReason::AlreadyResolved,
            "free_pick_used" => RejectReason::FreePickUsed,
            "decision_pending" => RejectReason::DecisionPending,
            "not_active" => RejectReason::NotActive,
            _ => RejectReason::Other(s),
        }
    }
}

impl From<RejectReason> for String {
    fn from(r: RejectReason) -> Self {
        r.as_str().to_string()
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server verdict on a submitted decision.
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionOutcome {
    Accepted {
        /// `None` when the server did not say.
        free_pick_consumed: Option<bool>,
        server_elapsed_secs: Option<f64>,
    },
    Rejected(RejectReason),
}

impl From<DecisionResponse> for DecisionOutcome {
    fn from(resp: DecisionResponse) -> Self {
        if resp.accepted {
            DecisionOutcome::Accepted {
                free_pick_consumed: resp.free_pick_consumed,
                server_elapsed_secs: resp.server_elapsed_seconds,
            }
        } else {
            DecisionOutcome::Rejected(
                resp.reason
                    .map(RejectReason::from)
                    .unwrap_or_else(|| RejectReason::Other("unspecified".into())),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_reason_wire_codes() {
        let r: RejectReason = serde_json::from_str(r#""insufficient_dwell""#).unwrap();
        assert_eq!(r, RejectReason::InsufficientDwell);
        let r: RejectReason = serde_json::from_str(r#""rate_limited""#).unwrap();
        assert_eq!(r, RejectReason::Other("rate_limited".into()));
        assert_eq!(
            serde_json::to_string(&RejectReason::AlreadyResolved).unwrap(),
            r#""already_resolved""#
        );
    }

    #[test]
    fn rejected_response_without_reason() {
        let outcome = DecisionOutcome::from(DecisionResponse {
            accepted: false,
            reason: None,
            free_pick_consumed: None,
            server_elapsed_seconds: None,
        });
        assert_eq!(
            outcome,
            DecisionOutcome::Rejected(RejectReason::Other("unspecified".into()))
        );
    }

    #[test]
    fn accepted_response_keeps_free_pick_flag() {
        let outcome = DecisionOutcome::from(DecisionResponse {
            accepted: true,
            reason: None,
            free_pick_consumed: Some(true),
            server_elapsed_seconds: Some(0.4),
        });
        assert_eq!(
            outcome,
            DecisionOutcome::Accepted {
                free_pick_consumed: Some(true),
                server_elapsed_secs: Some(0.4)
            }
        );
    }

    #[test]
    fn decisions_get_unique_ids() {
        let now = Utc::now();
        let a = Decision::new(DecisionKind::Pass, ProfileId::new("a"), 0.0, now);
        let b = Decision::new(DecisionKind::Pass, ProfileId::new("a"), 0.0, now);
        assert_ne!(a.id, b.id);
    }
}
