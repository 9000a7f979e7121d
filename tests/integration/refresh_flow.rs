//! Integration tests for the single-flight refresh cycle

use super::*;
use confejas_client::{ClientError, RefreshError, SessionEvent};
use futures::future::join;
use secrecy::ExposeSecret;
use serde_json::Value;
use std::time::Duration;
use wiremock::matchers::body_json;

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let server = setup_mock_server().await;

    mock_with_token("GET", "/rooms", "T1")
        .respond_with(unauthorized())
        .mount(&server)
        .await;
    mock_with_token("GET", "/rooms", "T2")
        .respond_with(success_response(json!([{"id": 1, "name": "Quarto 1"}])))
        .mount(&server)
        .await;
    mock_with_token("GET", "/participants", "T1")
        .respond_with(unauthorized())
        .mount(&server)
        .await;
    mock_with_token("GET", "/participants", "T2")
        .respond_with(success_response(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({"refreshToken": "R1"})))
        .respond_with(refresh_response("T2").set_delay(Duration::from_millis(100)))
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_in_client(&server, "T1", "R1").await;

    let (rooms, participants) = join(
        client.get::<Value>("/rooms"),
        client.get::<Value>("/participants"),
    )
    .await;

    assert_eq!(rooms.unwrap()[0]["name"], "Quarto 1");
    assert_eq!(participants.unwrap(), json!([]));
    assert_eq!(client.refresh_count(), 1);

    let credentials = client
        .session()
        .tokens()
        .credentials()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(credentials.access_token().expose_secret(), "T2");
    // Refresh token is not rotated.
    assert_eq!(credentials.refresh_token().expose_secret(), "R1");

    let retried: Vec<_> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| {
            r.headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                == Some("Bearer T2")
        })
        .collect();
    assert_eq!(retried.len(), 2);
}

#[tokio::test]
async fn test_retry_rejected_again_is_returned() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/lodging"))
        .respond_with(unauthorized())
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(refresh_response("T2"))
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_in_client(&server, "T1", "R1").await;
    let err = client.get::<Value>("/lodging").await.unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert!(!err.needs_reauth());
    assert_eq!(client.refresh_count(), 1);
}

#[tokio::test]
async fn test_failed_refresh_tears_down_session_once() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .respond_with(unauthorized())
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"message": "Refresh token revoked"}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_in_client(&server, "T1", "R1").await;
    let mut events = client.subscribe();

    let (a, b) = join(client.get::<Value>("/rooms"), client.get::<Value>("/rooms/2")).await;

    for result in [a, b] {
        let err = result.unwrap_err();
        assert!(err.needs_reauth());
        assert!(matches!(
            err,
            ClientError::Refresh(RefreshError::Rejected { status: 401, .. })
        ));
    }

    assert!(client.session().tokens().credentials().await.unwrap().is_none());
    match events.try_recv().unwrap() {
        SessionEvent::Invalidated { redirect_to, .. } => assert_eq!(redirect_to, "/login"),
        other => panic!("Expected Invalidated, got {:?}", other),
    }
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_missing_refresh_token_skips_network() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/rooms"))
        .respond_with(unauthorized())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(refresh_response("T2"))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_with(&server, InMemoryPreferences::new());
    let err = client.get::<Value>("/rooms").await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::Refresh(RefreshError::MissingRefreshToken)
    ));
    assert_eq!(client.refresh_count(), 0);
}

#[tokio::test]
async fn test_non_401_errors_pass_through() {
    let server = setup_mock_server().await;

    Mock::given(method("DELETE"))
        .and(path("/rooms/9"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(json!({"message": "Room has occupants"})),
        )
        .mount(&server)
        .await;

    let client = signed_in_client(&server, "T1", "R1").await;
    match client.delete("/rooms/9").await.unwrap_err() {
        ClientError::Http(e) => {
            assert_eq!(e.status, 409);
            assert_eq!(e.api_message().as_deref(), Some("Room has occupants"));
        }
        other => panic!("Expected HTTP error, got {:?}", other),
    }
    assert_eq!(client.refresh_count(), 0);
}
