//! Submits decisions to the authoritative backend.

use std::sync::Arc;

use tracing::debug;

use super::decision::{Decision, DecisionKind, DecisionOutcome};
use crate::backend::{DiscoveryBackend, InterestRequest, PassRequest};
use crate::error::BackendError;

/// Thin adapter between a [`Decision`] and the backend's decision endpoints.
///
/// Performs exactly one request per call. Decisions are never retried here:
/// a POST that timed out may still have been applied by the server.
#[derive(Clone)]
pub struct DecisionRecorder {
    backend: Arc<dyn DiscoveryBackend>,
}

impl DecisionRecorder {
    pub fn new(backend: Arc<dyn DiscoveryBackend>) -> Self {
        Self { backend }
    }

    pub async fn submit(&self, decision: &Decision) -> Result<DecisionOutcome, BackendError> {
        debug!(
            decision_id = %decision.id,
            profile_id = %decision.profile_id,
            kind = %decision.kind,
            client_elapsed_secs = decision.client_elapsed_secs,
            "submitting decision"
        );
        let response = match decision.kind {
            DecisionKind::Interest => {
                self.backend
                    .interest(&InterestRequest {
                        profile_id: decision.profile_id.clone(),
                        client_elapsed_seconds: decision.client_elapsed_secs,
                    })
                    .await?
            }
            DecisionKind::Pass => {
                self.backend
                    .pass(&PassRequest {
                        profile_id: decision.profile_id.clone(),
                    })
                    .await?
            }
        };
        Ok(DecisionOutcome::from(response))
    }
}
