//! Integration tests for session persistence across restarts

use super::*;
use confejas_client::{FilePreferences, LoginCredentials};
use serde_json::Value;
use tempfile::TempDir;

#[tokio::test]
async fn test_session_survives_restart() {
    let server = setup_mock_server().await;
    let dir = TempDir::new().unwrap();
    let prefs_path = dir.path().join("session.json");

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(success_response(json!({
            "accessToken": "T1",
            "refreshToken": "R1",
            "user": {"id": "u-1", "name": "Ana"}
        })))
        .mount(&server)
        .await;
    mock_with_token("GET", "/attendance", "T1")
        .respond_with(success_response(json!({"present": 42})))
        .expect(1)
        .mount(&server)
        .await;

    {
        let client = client_with(&server, FilePreferences::open(&prefs_path));
        client
            .login(&LoginCredentials::new("ana@confejas.test", "s3cret"))
            .await
            .unwrap();
    }

    let client = client_with(&server, FilePreferences::open(&prefs_path));
    assert!(!client.is_authenticated());

    let user = client.restore_session().await.unwrap().unwrap();
    assert_eq!(user.name.as_deref(), Some("Ana"));
    assert!(client.is_authenticated());

    let body: Value = client.get("/attendance").await.unwrap();
    assert_eq!(body["present"], 42);
}

#[tokio::test]
async fn test_refreshed_token_is_persisted() {
    let server = setup_mock_server().await;
    let dir = TempDir::new().unwrap();
    let prefs_path = dir.path().join("session.json");

    mock_with_token("GET", "/rooms", "T1")
        .respond_with(unauthorized())
        .mount(&server)
        .await;
    mock_with_token("GET", "/rooms", "T2")
        .respond_with(success_response(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(refresh_response("T2"))
        .expect(1)
        .mount(&server)
        .await;

    {
        let client = client_with(&server, FilePreferences::open(&prefs_path));
        client
            .session()
            .sign_in(&CredentialPair::new("T1", "R1"), None)
            .await
            .unwrap();
        let _: Value = client.get("/rooms").await.unwrap();
    }

    let prefs = FilePreferences::open(&prefs_path);
    assert_eq!(prefs.get("accessToken").await.unwrap().as_deref(), Some("T2"));
    assert_eq!(prefs.get("refreshToken").await.unwrap().as_deref(), Some("R1"));
}
