//! Token Management
//!
//! Token persistence and refresh coordination.
//!
//! This module provides:
//!
//! - **Token Storage**: preferences stores and the access/refresh token entries
//! - **Refresh Coordinator**: single-flight refresh with fan-out to waiters

pub mod refresh;
pub mod storage;

// Token Storage
pub use storage::{
    FilePreferences, InMemoryPreferences, PreferencesStore, TokenStore, ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
};

// Refresh Coordinator
pub use refresh::{RefreshCoordinator, RefreshOutcome};
