//! API Client
//!
//! Authenticated client for the ConfeJAS REST API. Every request carries the
//! stored access token; a 401 triggers one shared refresh and a single retry.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, instrument};

use crate::core::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestHttpTransport};
use crate::error::{ClientError, ClientResult, HttpError, ProtocolError};
use crate::session::{SessionEvent, SessionState};
use crate::token::{FilePreferences, PreferencesStore, RefreshCoordinator};
use crate::types::{
    bearer, AuthResponse, ClientConfig, LoginCredentials, Registration, UserRecord,
};

/// One logical API call, kept intact across the retry.
#[derive(Debug)]
struct ApiCall {
    method: HttpMethod,
    path: String,
    body: Option<String>,
    /// Set once the call has been re-issued after a refresh.
    retry_attempt: bool,
}

/// ConfeJAS API client.
pub struct ApiClient<T: HttpTransport = ReqwestHttpTransport, P: PreferencesStore = FilePreferences>
{
    config: ClientConfig,
    transport: Arc<T>,
    session: Arc<SessionState<P>>,
    coordinator: RefreshCoordinator<T, P>,
}

impl ApiClient<ReqwestHttpTransport, FilePreferences> {
    /// Create a client over HTTP with preferences persisted at `preferences_path`.
    pub fn new(config: ClientConfig, preferences_path: impl Into<PathBuf>) -> ClientResult<Self> {
        let transport = ReqwestHttpTransport::with_options(config.timeout, 4 * 1024 * 1024)?;
        let prefs = FilePreferences::open(preferences_path);
        Ok(Self::with_components(config, transport, prefs))
    }
}

impl<T: HttpTransport, P: PreferencesStore> ApiClient<T, P> {
    /// Create a client with custom implementations.
    pub fn with_components(config: ClientConfig, transport: T, prefs: P) -> Self {
        Self::from_shared(config, Arc::new(transport), Arc::new(prefs))
    }

    /// Create a client over shared components.
    pub fn from_shared(config: ClientConfig, transport: Arc<T>, prefs: Arc<P>) -> Self {
        let session = Arc::new(SessionState::new(prefs));
        let coordinator = RefreshCoordinator::new(&config, transport.clone(), session.clone());
        Self {
            config,
            transport,
            session,
            coordinator,
        }
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Session state shared with the refresh coordinator.
    pub fn session(&self) -> &SessionState<P> {
        &self.session
    }

    /// Listen for sign-in, refresh, sign-out and invalidation events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.subscribe()
    }

    /// Number of refresh calls this client has made.
    pub fn refresh_count(&self) -> u64 {
        self.coordinator.refresh_count()
    }

    // ========== Requests ==========

    /// Send a request with the stored bearer token.
    ///
    /// 2xx responses are returned as is; any other status comes back as
    /// [`ClientError::Http`] with the response untouched. A 401 on a
    /// credential-consuming endpoint is retried once after a token refresh.
    #[instrument(skip(self, body))]
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ClientResult<HttpResponse> {
        let mut call = ApiCall {
            method,
            path: path.to_string(),
            body: body.map(|b| b.to_string()),
            retry_attempt: false,
        };

        let token = self.session.tokens().access_token().await?;
        let response = self.dispatch(&call, token.as_ref()).await?;
        if response.status != 401 || !self.should_refresh(&call) {
            return into_result(response);
        }

        call.retry_attempt = true;
        let fresh = self.fresh_token(token.as_ref()).await?;
        debug!("Retrying request with refreshed token");
        let retried = self.dispatch(&call, Some(&fresh)).await?;
        into_result(retried)
    }

    /// Send a request and deserialize the 2xx body.
    pub async fn request_json<R: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ClientResult<R> {
        self.request(method, path, body).await?.parse_json()
    }

    /// GET `path`.
    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> ClientResult<R> {
        self.request_json(HttpMethod::Get, path, None).await
    }

    /// POST `body` to `path`.
    pub async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<R> {
        self.request_json(HttpMethod::Post, path, Some(to_json(body)?))
            .await
    }

    /// PUT `body` to `path`.
    pub async fn put<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<R> {
        self.request_json(HttpMethod::Put, path, Some(to_json(body)?))
            .await
    }

    /// PATCH `path` with `body`.
    pub async fn patch<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<R> {
        self.request_json(HttpMethod::Patch, path, Some(to_json(body)?))
            .await
    }

    /// DELETE `path`. The response body is not interpreted.
    pub async fn delete(&self, path: &str) -> ClientResult<()> {
        self.request(HttpMethod::Delete, path, None).await?;
        Ok(())
    }

    fn should_refresh(&self, call: &ApiCall) -> bool {
        if self.config.auth.is_credential_endpoint(&call.path) {
            debug!(path = %call.path, "401 from credential endpoint, not refreshing");
            return false;
        }
        if call.retry_attempt {
            debug!(path = %call.path, "401 after retry, giving up");
            return false;
        }
        true
    }

    /// Token for the retry. Reuses the stored token when another request
    /// already refreshed it after this one was sent.
    async fn fresh_token(&self, used: Option<&SecretString>) -> ClientResult<SecretString> {
        if let (Some(used), Some(current)) = (used, self.session.tokens().access_token().await?) {
            if used.expose_secret() != current.expose_secret() {
                debug!("Access token already refreshed by another request");
                return Ok(current);
            }
        }
        Ok(self.coordinator.obtain_token().await?)
    }

    async fn dispatch(
        &self,
        call: &ApiCall,
        token: Option<&SecretString>,
    ) -> ClientResult<HttpResponse> {
        let mut headers: HashMap<String, String> = self.config.default_headers.clone();
        headers.insert("accept".to_string(), "application/json".to_string());
        if call.body.is_some() {
            headers.insert("content-type".to_string(), "application/json".to_string());
        }
        if let Some(token) = token {
            headers.insert("authorization".to_string(), bearer(token));
        }

        let request = HttpRequest {
            method: call.method,
            url: self.config.endpoint_url(&call.path),
            headers,
            body: call.body.clone(),
            timeout: Some(self.config.timeout),
        };

        let response = self.transport.send(request).await?;
        debug!(
            path = %call.path,
            status = response.status,
            retry_attempt = call.retry_attempt,
            "API response"
        );
        Ok(response)
    }

    // ========== Authentication ==========

    /// Reload the persisted session after a restart.
    pub async fn restore_session(&self) -> ClientResult<Option<UserRecord>> {
        Ok(self.session.restore().await?)
    }

    /// Sign in with email and password.
    pub async fn login(&self, credentials: &LoginCredentials) -> ClientResult<Option<UserRecord>> {
        let path = self.config.auth.login_path();
        let response = self
            .request(HttpMethod::Post, &path, Some(credentials.to_body()))
            .await?;
        self.establish(response).await
    }

    /// Create an account and sign in with it.
    pub async fn register(&self, registration: &Registration) -> ClientResult<Option<UserRecord>> {
        let path = self.config.auth.register_path();
        let response = self
            .request(HttpMethod::Post, &path, Some(registration.to_body()))
            .await?;
        self.establish(response).await
    }

    /// Sign out locally, forgetting tokens and user.
    pub async fn logout(&self) -> ClientResult<()> {
        Ok(self.session.sign_out().await?)
    }

    /// Signed-in user, if any.
    pub fn current_user(&self) -> Option<UserRecord> {
        self.session.current_user()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    async fn establish(&self, response: HttpResponse) -> ClientResult<Option<UserRecord>> {
        let auth: AuthResponse = response.parse_json()?;
        let (credentials, user) = auth.into_parts();
        self.session.sign_in(&credentials, user.clone()).await?;
        Ok(user)
    }
}

fn into_result(response: HttpResponse) -> ClientResult<HttpResponse> {
    if response.is_success() {
        return Ok(response);
    }
    Err(ClientError::Http(HttpError {
        status: response.status,
        status_text: response.status_text,
        headers: response.headers,
        body: response.body,
    }))
}

fn to_json<B: Serialize>(body: &B) -> ClientResult<serde_json::Value> {
    serde_json::to_value(body).map_err(|e| {
        ClientError::Protocol(ProtocolError::InvalidJson {
            message: e.to_string(),
        })
    })
}
