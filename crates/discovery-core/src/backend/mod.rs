//! The authority contract.
//!
//! The server is the source of truth for today's queue, for how long a
//! profile has really been on screen, and for whether a decision counts.
//! [`DiscoveryBackend`] is the seam the session engine talks through; wire
//! shapes use camelCase JSON.

pub mod auth;
pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::profile::{Profile, ProfileId};

pub use auth::{AuthFlag, AuthGate};
pub use http::HttpBackend;
pub use memory::InMemoryBackend;

/// `GET /discovery/today`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayResponse {
    /// Profiles still unresolved today, in presentation order.
    pub profiles: Vec<Profile>,
    pub viewed_count: u32,
    pub interested_count: u32,
    pub total: u32,
    pub free_pick_available: bool,
}

impl TodayResponse {
    /// An empty queue with everything viewed means the day is done.
    pub fn is_complete(&self) -> bool {
        self.profiles.is_empty() && self.viewed_count >= self.total
    }
}

/// `POST /discovery/view`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewRequest {
    pub profile_id: ProfileId,
}

/// `POST /discovery/interest`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestRequest {
    pub profile_id: ProfileId,
    pub client_elapsed_seconds: f64,
}

/// `POST /discovery/pass`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassRequest {
    pub profile_id: ProfileId,
}

/// Response body of both decision endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResponse {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_pick_consumed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_elapsed_seconds: Option<f64>,
}

impl DecisionResponse {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            reason: None,
            free_pick_consumed: None,
            server_elapsed_seconds: None,
        }
    }

    pub fn rejected(reason: &str) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.to_string()),
            free_pick_consumed: None,
            server_elapsed_seconds: None,
        }
    }
}

/// Discovery endpoints consumed by the session engine.
#[async_trait]
pub trait DiscoveryBackend: Send + Sync {
    /// Fetch today's queue, counters and free-pick state.
    async fn today(&self) -> Result<TodayResponse, BackendError>;

    /// Begin server-side dwell tracking. Idempotent for the same profile.
    async fn start_view(&self, profile_id: &ProfileId) -> Result<(), BackendError>;

    async fn interest(&self, request: &InterestRequest) -> Result<DecisionResponse, BackendError>;

    async fn pass(&self, request: &PassRequest) -> Result<DecisionResponse, BackendError>;
}
