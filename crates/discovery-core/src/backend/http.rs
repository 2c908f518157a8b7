//! HTTP client for the discovery API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use super::auth::AuthGate;
use super::{
    DecisionResponse, DiscoveryBackend, InterestRequest, PassRequest, TodayResponse, ViewRequest,
};
use crate::error::{BackendError, ConfigError, CoreError};
use crate::profile::ProfileId;

/// Discovery backend reached over HTTP with a bearer token.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpBackend {
    /// Build a client for `base_url` (e.g. `http://localhost:8000/v1`).
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or the HTTP client cannot
    /// be constructed.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CoreError> {
        let mut base_url = Url::parse(base_url).map_err(|e| ConfigError::InvalidValue {
            key: "api.base_url".into(),
            message: e.to_string(),
        })?;
        // Url::join drops the last segment unless the path ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BackendError::from)?;
        Ok(Self {
            client,
            base_url,
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path)
            .map_err(|e| BackendError::Network(format!("invalid endpoint {path}: {e}")))
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let url = self.endpoint(path)?;
        debug!(%url, "GET");
        let resp = self.authorized(self.client.get(url)).send().await?;
        decode(check_status(resp).await?).await
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response, BackendError> {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        Ok(self.authorized(self.client.post(url)).json(body).send().await?)
    }

    /// Decision endpoints may answer a rejection with a 4xx status and the
    /// regular decision body; both forms are accepted.
    async fn post_decision<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<DecisionResponse, BackendError> {
        let resp = self.post(path, body).await?;
        let status = resp.status();
        if status.is_success() {
            return decode(resp).await;
        }
        if is_auth_failure(status) {
            return Err(BackendError::Unauthorized);
        }
        let text = resp.text().await.unwrap_or_default();
        if status.is_client_error() {
            if let Ok(decision) = serde_json::from_str::<DecisionResponse>(&text) {
                return Ok(decision);
            }
        }
        Err(BackendError::Status {
            status: status.as_u16(),
            body: text,
        })
    }

    /// `POST /auth/refresh` - ask the auth service to renew the session.
    pub async fn refresh_session(&self) -> Result<(), BackendError> {
        let resp = self.post("auth/refresh", &serde_json::json!({})).await?;
        check_status(resp).await.map(|_| ())
    }

    /// `POST /auth/logout`
    pub async fn logout(&self) -> Result<(), BackendError> {
        let resp = self.post("auth/logout", &serde_json::json!({})).await?;
        check_status(resp).await.map(|_| ())
    }
}

impl AuthGate for HttpBackend {
    fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

#[async_trait]
impl DiscoveryBackend for HttpBackend {
    async fn today(&self) -> Result<TodayResponse, BackendError> {
        self.get_json("discovery/today").await
    }

    async fn start_view(&self, profile_id: &ProfileId) -> Result<(), BackendError> {
        let body = ViewRequest {
            profile_id: profile_id.clone(),
        };
        let resp = self.post("discovery/view", &body).await?;
        check_status(resp).await.map(|_| ())
    }

    async fn interest(&self, request: &InterestRequest) -> Result<DecisionResponse, BackendError> {
        self.post_decision("discovery/interest", request).await
    }

    async fn pass(&self, request: &PassRequest) -> Result<DecisionResponse, BackendError> {
        self.post_decision("discovery/pass", request).await
    }
}

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

async fn check_status(resp: Response) -> Result<Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if is_auth_failure(status) {
        return Err(BackendError::Unauthorized);
    }
    let body = resp.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), "discovery API returned an error status");
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, BackendError> {
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode(e.to_string()))
}
