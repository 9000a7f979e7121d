//! Configuration Builder
//!
//! Fluent builder for the API client configuration.

use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::error::{ClientError, ConfigurationError};
use crate::types::{
    AuthEndpoints, ClientConfig, DEFAULT_LOGIN_ROUTE, DEFAULT_REFRESH_TIMEOUT_MS,
    DEFAULT_TIMEOUT_MS,
};

/// Environment variable holding the API base URL.
pub const ENV_API_URL: &str = "CONFEJAS_API_URL";
/// Environment variable holding the request timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "CONFEJAS_API_TIMEOUT_SECS";
/// Environment variable holding the refresh timeout in seconds.
pub const ENV_REFRESH_TIMEOUT_SECS: &str = "CONFEJAS_REFRESH_TIMEOUT_SECS";

/// API client configuration builder.
#[derive(Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    auth: AuthEndpoints,
    login_route: Option<String>,
    timeout: Option<Duration>,
    refresh_timeout: Option<Duration>,
    default_headers: HashMap<String, String>,
}

impl ClientConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the prefix shared by the auth endpoints.
    pub fn auth_base_path(mut self, path: impl Into<String>) -> Self {
        self.auth.base_path = path.into();
        self
    }

    /// Set the login endpoint, relative to the auth base path.
    pub fn login_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.auth.login = endpoint.into();
        self
    }

    /// Set the registration endpoint, relative to the auth base path.
    pub fn register_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.auth.register = endpoint.into();
        self
    }

    /// Set the refresh endpoint, relative to the auth base path.
    pub fn refresh_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.auth.refresh = endpoint.into();
        self
    }

    /// Set the route announced when the session is invalidated.
    pub fn login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = Some(route.into());
        self
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the upper bound on a refresh call.
    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = Some(timeout);
        self
    }

    /// Add a header sent with every request.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    /// Fill unset values from the environment.
    ///
    /// # Environment Variables
    ///
    /// - `CONFEJAS_API_URL`: API base URL
    /// - `CONFEJAS_API_TIMEOUT_SECS`: request timeout in seconds
    /// - `CONFEJAS_REFRESH_TIMEOUT_SECS`: refresh timeout in seconds
    pub fn from_env(mut self) -> Self {
        if self.base_url.is_none() {
            self.base_url = std::env::var(ENV_API_URL).ok();
        }

        if self.timeout.is_none() {
            self.timeout = env_secs(ENV_TIMEOUT_SECS);
        }

        if self.refresh_timeout.is_none() {
            self.refresh_timeout = env_secs(ENV_REFRESH_TIMEOUT_SECS);
        }

        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<ClientConfig, ClientError> {
        let base_url = self.base_url.ok_or_else(|| {
            ClientError::Configuration(ConfigurationError::MissingField {
                field: "base_url".to_string(),
            })
        })?;

        let parsed = Url::parse(&base_url).map_err(|_| {
            ClientError::Configuration(ConfigurationError::InvalidEndpoint {
                url: base_url.clone(),
            })
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::Configuration(
                ConfigurationError::InvalidEndpoint { url: base_url },
            ));
        }

        for (field, value) in [
            ("auth.login", &self.auth.login),
            ("auth.register", &self.auth.register),
            ("auth.refresh", &self.auth.refresh),
        ] {
            if value.trim_matches('/').is_empty() {
                return Err(ClientError::Configuration(
                    ConfigurationError::MissingField {
                        field: field.to_string(),
                    },
                ));
            }
        }

        let timeout = self
            .timeout
            .unwrap_or(Duration::from_millis(DEFAULT_TIMEOUT_MS));
        let refresh_timeout = self
            .refresh_timeout
            .unwrap_or(Duration::from_millis(DEFAULT_REFRESH_TIMEOUT_MS));
        if timeout.is_zero() || refresh_timeout.is_zero() {
            return Err(ClientError::Configuration(
                ConfigurationError::InvalidConfig {
                    message: "timeouts must be greater than zero".to_string(),
                },
            ));
        }

        Ok(ClientConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth: self.auth,
            login_route: self
                .login_route
                .unwrap_or_else(|| DEFAULT_LOGIN_ROUTE.to_string()),
            timeout,
            refresh_timeout,
            default_headers: self.default_headers,
        })
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Create a new client configuration builder.
pub fn client_config() -> ClientConfigBuilder {
    ClientConfigBuilder::new()
}
