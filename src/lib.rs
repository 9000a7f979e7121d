//! ConfeJAS API Client
//!
//! Authenticated REST client for the ConfeJAS attendance, lodging and
//! participant API.
//!
//! # Features
//!
//! - Bearer token attached to every request
//! - Single-flight token refresh: concurrent 401s share one refresh call
//! - Exactly one retry per request after a refresh
//! - Session teardown with an `Invalidated` event when refresh fails
//! - Tokens and user persisted in a preferences store (memory or JSON file)
//!
//! # Example
//!
//! ```rust,ignore
//! use confejas_client::{client_config, ApiClient, LoginCredentials, SessionEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = client_config()
//!         .base_url("https://api.confejas.org/api")
//!         .from_env()
//!         .build()?;
//!
//!     let client = ApiClient::new(config, "confejas-session.json")?;
//!     client.restore_session().await?;
//!
//!     let mut events = client.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             if let SessionEvent::Invalidated { redirect_to, .. } = event {
//!                 println!("navigate to {}", redirect_to);
//!             }
//!         }
//!     });
//!
//!     if !client.is_authenticated() {
//!         client
//!             .login(&LoginCredentials::new("staff@confejas.org", "password"))
//!             .await?;
//!     }
//!
//!     let rooms: serde_json::Value = client.get("/rooms").await?;
//!     println!("{}", rooms);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: configuration, credential and wire types
//! - `error`: error hierarchy
//! - `core`: HTTP transport seam
//! - `token`: preferences stores, token store and the refresh coordinator
//! - `session`: signed-in user and session events
//! - `builders`: fluent configuration builder
//! - `client`: the API client combining all of the above

pub mod builders;
pub mod client;
pub mod core;
pub mod error;
pub mod session;
pub mod token;
pub mod types;

// Re-export main client
pub use client::ApiClient;

// Re-export builders
pub use builders::{client_config, ClientConfigBuilder};

// Re-export errors
pub use error::{
    get_user_message, ClientError, ClientResult, ConfigurationError, HttpError, NetworkError,
    ProtocolError, RefreshError, StorageError,
};

// Re-export types
pub use types::{
    // Config
    AuthEndpoints, ClientConfig,
    // Token
    CredentialPair, RefreshRequest, RefreshResponse,
    // Auth
    AuthResponse, LoginCredentials, Registration, UserId, UserRecord,
};

// Re-export core components
pub use self::core::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport, ReqwestHttpTransport,
};

// Re-export session
pub use session::{SessionEvent, SessionState, StoredSession};

// Re-export token management
pub use token::{
    FilePreferences, InMemoryPreferences, PreferencesStore, RefreshCoordinator, TokenStore,
};
