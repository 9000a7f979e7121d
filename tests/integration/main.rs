//! Integration tests using WireMock
//!
//! These tests drive the client over real HTTP against a mock server and
//! cover the token refresh cycle, sign-in and persistence across restarts.

mod auth_flow;
mod persistence;
mod refresh_flow;

use confejas_client::{
    client_config, ApiClient, ClientConfig, CredentialPair, InMemoryPreferences,
    PreferencesStore, ReqwestHttpTransport,
};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

pub type TestClient<P = InMemoryPreferences> = ApiClient<ReqwestHttpTransport, P>;

/// Helper to start a mock server
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

pub fn test_config(server: &MockServer) -> ClientConfig {
    client_config()
        .base_url(server.uri())
        .build()
        .expect("valid config")
}

pub fn client_with<P: PreferencesStore>(server: &MockServer, prefs: P) -> TestClient<P> {
    let transport = ReqwestHttpTransport::new().expect("transport");
    ApiClient::with_components(test_config(server), transport, prefs)
}

pub async fn signed_in_client(server: &MockServer, access: &str, refresh: &str) -> TestClient {
    let client = client_with(server, InMemoryPreferences::new());
    client
        .session()
        .sign_in(&CredentialPair::new(access, refresh), None)
        .await
        .expect("sign in");
    client
}

/// Helper to create a mock that only matches a given bearer token
pub fn mock_with_token(method_matcher: &str, path_matcher: &str, token: &str) -> MockBuilder {
    Mock::given(method(method_matcher))
        .and(path(path_matcher))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
}

pub fn unauthorized() -> ResponseTemplate {
    ResponseTemplate::new(401).set_body_json(json!({"message": "Token expired"}))
}

pub fn success_response(body: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

pub fn refresh_response(access_token: &str) -> ResponseTemplate {
    success_response(json!({ "accessToken": access_token }))
}
