//! Client Error Types
//!
//! Error hierarchy for the API client, the token store and the refresh cycle.

use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Root error type for the API client.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Session refresh failed: {0}")]
    Refresh(#[from] RefreshError),

    #[error("{0}")]
    Http(#[from] HttpError),
}

impl ClientError {
    /// Get error code for logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CLIENT_CONFIG",
            Self::Network(_) => "CLIENT_NETWORK",
            Self::Storage(_) => "CLIENT_STORAGE",
            Self::Protocol(_) => "CLIENT_PROTOCOL",
            Self::Refresh(_) => "CLIENT_REFRESH",
            Self::Http(_) => "CLIENT_HTTP",
        }
    }

    /// HTTP status of a passed-through response, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http(e) => Some(e.status),
            Self::Refresh(RefreshError::Rejected { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Check if the session is gone and the user has to sign in again.
    pub fn needs_reauth(&self) -> bool {
        matches!(self, Self::Refresh(_))
    }
}

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid endpoint URL: {url}")]
    InvalidEndpoint { url: String },
}

/// Network/transport error.
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Client initialization failed: {message}")]
    ClientInit { message: String },
}

/// Protocol/response parsing error.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },

    #[error("Response too large: {size} bytes")]
    ResponseTooLarge { size: usize },
}

/// Preferences storage error.
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    #[error("Read failed: {message}")]
    ReadFailed { message: String },

    #[error("Write failed: {message}")]
    WriteFailed { message: String },

    #[error("Corrupted data: {message}")]
    CorruptedData { message: String },
}

/// Failure of a refresh cycle.
///
/// Cloned to every request that waited on the cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("No refresh token available")]
    MissingRefreshToken,

    #[error("Refresh rejected with HTTP {status}")]
    Rejected { status: u16, body: String },

    #[error("Refresh request failed: {message}")]
    Network { message: String },

    #[error("Invalid refresh response: {message}")]
    InvalidResponse { message: String },

    #[error("Refresh timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Token storage failed during refresh: {message}")]
    Storage { message: String },

    #[error("Refresh was cancelled before completing")]
    Cancelled,
}

/// Non-success HTTP response passed through to the caller unchanged.
#[derive(Error, Debug, Clone)]
#[error("HTTP {status} {status_text}")]
pub struct HttpError {
    pub status: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpError {
    /// Whether the API rejected the credentials.
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// Parse the error body as JSON, if it is JSON.
    pub fn json_body(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }

    /// The `message` field most API errors carry.
    pub fn api_message(&self) -> Option<String> {
        self.json_body()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Get user-friendly error message.
pub fn get_user_message(error: &ClientError) -> String {
    match error {
        ClientError::Refresh(_) => "Your session has expired. Please sign in again.".to_string(),
        ClientError::Http(e) if e.status == 401 => {
            "Invalid credentials. Please check them and try again.".to_string()
        }
        ClientError::Http(e) if e.status == 403 => {
            "You do not have permission to perform this action.".to_string()
        }
        ClientError::Http(e) if e.status == 404 => "The record was not found.".to_string(),
        ClientError::Http(e) => e
            .api_message()
            .unwrap_or_else(|| "The server could not process the request.".to_string()),
        ClientError::Network(NetworkError::Timeout { .. }) => {
            "The request timed out. Please check your connection and try again.".to_string()
        }
        ClientError::Network(_) => {
            "Could not reach the server. Please check your connection.".to_string()
        }
        _ => "An unexpected error occurred. Please try again.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_error(status: u16, body: &str) -> HttpError {
        HttpError {
            status,
            status_text: String::new(),
            headers: HashMap::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_status_passthrough() {
        let error = ClientError::Http(http_error(404, ""));
        assert_eq!(error.status(), Some(404));
        assert!(!error.needs_reauth());

        let error = ClientError::Refresh(RefreshError::MissingRefreshToken);
        assert_eq!(error.status(), None);
        assert!(error.needs_reauth());
    }

    #[test]
    fn test_api_message() {
        let error = http_error(422, r#"{"message":"Room is full"}"#);
        assert_eq!(error.api_message(), Some("Room is full".to_string()));
        assert_eq!(
            get_user_message(&ClientError::Http(error)),
            "Room is full".to_string()
        );

        assert_eq!(http_error(500, "<html>").api_message(), None);
    }

    #[test]
    fn test_refresh_error_is_shared_by_clone() {
        let error = RefreshError::Rejected {
            status: 401,
            body: "expired".to_string(),
        };
        assert_eq!(error.clone(), error);
        assert_eq!(ClientError::from(error).status(), Some(401));
    }
}
