//! Contract tests for the HTTP backend against a mock discovery API.

use std::time::Duration;

use discovery_core::backend::{
    AuthGate, DiscoveryBackend, HttpBackend, InterestRequest, PassRequest,
};
use discovery_core::discovery::{DecisionOutcome, RejectReason};
use discovery_core::error::BackendError;
use discovery_core::profile::ProfileId;
use mockito::Matcher;

fn backend(server: &mockito::ServerGuard) -> HttpBackend {
    HttpBackend::new(&format!("{}/v1", server.url()), Duration::from_secs(5))
        .unwrap()
        .with_token("tok-123")
}

#[tokio::test]
async fn test_today_sends_bearer_token_and_decodes_queue() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/discovery/today")
        .match_header("authorization", "Bearer tok-123")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "profiles": [
                    {"id": "p1", "name": "Noa", "age": 29, "photos": ["a.jpg"]},
                    {"id": "p2", "name": "Eli", "photos": []}
                ],
                "viewedCount": 1,
                "interestedCount": 0,
                "total": 3,
                "freePickAvailable": true
            }"#,
        )
        .create_async()
        .await;

    let backend = backend(&server);
    assert!(backend.is_authenticated());
    let today = backend.today().await.unwrap();
    assert_eq!(today.profiles.len(), 2);
    assert_eq!(today.profiles[0].age, Some(29));
    assert_eq!(today.viewed_count, 1);
    assert!(today.free_pick_available);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_start_view_posts_profile_id() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/discovery/view")
        .match_body(Matcher::PartialJson(serde_json::json!({"profileId": "p1"})))
        .with_status(204)
        .create_async()
        .await;

    backend(&server)
        .start_view(&ProfileId::new("p1"))
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_interest_reports_client_elapsed_and_reads_outcome() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/discovery/interest")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "profileId": "p1",
            "clientElapsedSeconds": 21.5
        })))
        .with_status(200)
        .with_body(r#"{"accepted": true, "freePickConsumed": false, "serverElapsedSeconds": 21.2}"#)
        .create_async()
        .await;

    let response = backend(&server)
        .interest(&InterestRequest {
            profile_id: ProfileId::new("p1"),
            client_elapsed_seconds: 21.5,
        })
        .await
        .unwrap();
    assert_eq!(
        DecisionOutcome::from(response),
        DecisionOutcome::Accepted {
            free_pick_consumed: Some(false),
            server_elapsed_secs: Some(21.2),
        }
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rejection_with_conflict_status_is_an_outcome() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/discovery/pass")
        .with_status(409)
        .with_body(r#"{"accepted": false, "reason": "already_resolved"}"#)
        .create_async()
        .await;

    let response = backend(&server)
        .pass(&PassRequest {
            profile_id: ProfileId::new("p1"),
        })
        .await
        .unwrap();
    assert_eq!(
        DecisionOutcome::from(response),
        DecisionOutcome::Rejected(RejectReason::AlreadyResolved)
    );
}

#[tokio::test]
async fn test_unauthorized_status_maps_to_unauthorized() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/discovery/today")
        .with_status(401)
        .with_body(r#"{"detail": "token expired"}"#)
        .create_async()
        .await;

    let err = backend(&server).today().await.unwrap_err();
    assert_eq!(err, BackendError::Unauthorized);
}

#[tokio::test]
async fn test_server_error_is_transient_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/discovery/pass")
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;

    let err = backend(&server)
        .pass(&PassRequest {
            profile_id: ProfileId::new("p1"),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Status { status: 503, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/discovery/today")
        .with_status(200)
        .with_body("<html>oops</html>")
        .create_async()
        .await;

    let err = backend(&server).today().await.unwrap_err();
    assert!(matches!(err, BackendError::Decode(_)));
}

#[tokio::test]
async fn test_auth_refresh_and_logout_endpoints() {
    let mut server = mockito::Server::new_async().await;
    let refresh = server
        .mock("POST", "/v1/auth/refresh")
        .match_header("authorization", "Bearer tok-123")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;
    let logout = server
        .mock("POST", "/v1/auth/logout")
        .with_status(204)
        .create_async()
        .await;

    let backend = backend(&server);
    backend.refresh_session().await.unwrap();
    backend.logout().await.unwrap();
    refresh.assert_async().await;
    logout.assert_async().await;
}
