//! Configuration Types
//!
//! API client configuration types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// API client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL every request path is resolved against.
    pub base_url: String,
    /// Authentication endpoint layout.
    pub auth: AuthEndpoints,
    /// Route the UI navigates to when the session is invalidated.
    pub login_route: String,
    /// HTTP timeout for regular requests.
    pub timeout: Duration,
    /// Upper bound on a single refresh call.
    pub refresh_timeout: Duration,
    /// Headers added to every request.
    pub default_headers: HashMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth: AuthEndpoints::default(),
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            refresh_timeout: Duration::from_millis(DEFAULT_REFRESH_TIMEOUT_MS),
            default_headers: HashMap::new(),
        }
    }
}

impl ClientConfig {
    /// Full URL for a request path.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Authentication endpoint layout relative to the base URL.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthEndpoints {
    /// Prefix shared by the auth endpoints.
    pub base_path: String,
    pub login: String,
    pub register: String,
    pub refresh: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            base_path: "/auth".to_string(),
            login: "login".to_string(),
            register: "register".to_string(),
            refresh: "refresh".to_string(),
        }
    }
}

impl AuthEndpoints {
    pub fn login_path(&self) -> String {
        self.join(&self.login)
    }

    pub fn register_path(&self) -> String {
        self.join(&self.register)
    }

    pub fn refresh_path(&self) -> String {
        self.join(&self.refresh)
    }

    /// Whether the path establishes credentials rather than consuming them.
    ///
    /// A 401 from these endpoints means bad credentials, never an expired
    /// access token.
    pub fn is_credential_endpoint(&self, path: &str) -> bool {
        let path = normalize_path(path);
        path == self.login_path() || path == self.register_path()
    }

    fn join(&self, endpoint: &str) -> String {
        normalize_path(&format!(
            "{}/{}",
            self.base_path.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        ))
    }
}

/// Leading slash, no trailing slash, no query or fragment.
pub fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_matches('/');
    format!("/{}", trimmed)
}

/// Default configuration values.
pub const DEFAULT_TIMEOUT_MS: u64 = 30000;
pub const DEFAULT_REFRESH_TIMEOUT_MS: u64 = 15000;
pub const DEFAULT_LOGIN_ROUTE: &str = "/login";
