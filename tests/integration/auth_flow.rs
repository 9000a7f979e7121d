//! Integration tests for login, registration and logout

use super::*;
use confejas_client::{ClientError, LoginCredentials, Registration, SessionEvent};
use secrecy::ExposeSecret;
use wiremock::matchers::body_json;

fn auth_body(access: &str, refresh: &str) -> serde_json::Value {
    json!({
        "accessToken": access,
        "refreshToken": refresh,
        "user": {"id": 7, "email": "ana@confejas.test", "name": "Ana", "role": "staff"}
    })
}

#[tokio::test]
async fn test_login_stores_credentials_and_user() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"email": "ana@confejas.test", "password": "s3cret"})))
        .respond_with(success_response(auth_body("T1", "R1")))
        .expect(1)
        .mount(&server)
        .await;
    mock_with_token("GET", "/me", "T1")
        .respond_with(success_response(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with(&server, InMemoryPreferences::new());
    let mut events = client.subscribe();

    let user = client
        .login(&LoginCredentials::new("ana@confejas.test", "s3cret"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(user.name.as_deref(), Some("Ana"));
    assert!(client.is_authenticated());
    assert!(matches!(
        events.try_recv().unwrap(),
        SessionEvent::SignedIn { user: Some(_) }
    ));

    let _: serde_json::Value = client.get("/me").await.unwrap();
}

#[tokio::test]
async fn test_login_401_does_not_refresh() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid credentials"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(refresh_response("T2"))
        .expect(0)
        .mount(&server)
        .await;

    // A stale session must not turn a bad password into a refresh.
    let client = signed_in_client(&server, "T0", "R0").await;
    let err = client
        .login(&LoginCredentials::new("ana@confejas.test", "wrong"))
        .await
        .unwrap_err();

    match err {
        ClientError::Http(e) => {
            assert!(e.is_unauthorized());
            assert_eq!(e.api_message().as_deref(), Some("Invalid credentials"));
        }
        other => panic!("Expected HTTP error, got {:?}", other),
    }
    assert_eq!(client.refresh_count(), 0);
}

#[tokio::test]
async fn test_register_signs_in() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .and(body_json(json!({
            "name": "Ana",
            "email": "ana@confejas.test",
            "password": "s3cret",
            "stake": "Centro"
        })))
        .respond_with(success_response(auth_body("T1", "R1")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with(&server, InMemoryPreferences::new());
    let registration =
        Registration::new("Ana", "ana@confejas.test", "s3cret").field("stake", "Centro");
    client.register(&registration).await.unwrap();

    let credentials = client
        .session()
        .tokens()
        .credentials()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(credentials.access_token().expose_secret(), "T1");
    assert_eq!(credentials.refresh_token().expose_secret(), "R1");
}

#[tokio::test]
async fn test_logout_is_local() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(success_response(auth_body("T1", "R1")))
        .mount(&server)
        .await;

    let client = client_with(&server, InMemoryPreferences::new());
    client
        .login(&LoginCredentials::new("ana@confejas.test", "s3cret"))
        .await
        .unwrap();
    client.logout().await.unwrap();

    assert!(!client.is_authenticated());
    assert!(client.current_user().is_none());
    assert!(client.session().tokens().credentials().await.unwrap().is_none());
    // Only the login call reached the server.
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
