//! Session State
//!
//! Current signed-in user, persisted next to the tokens, and the session
//! event channel the UI layer listens on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{RefreshError, StorageError};
use crate::token::{PreferencesStore, TokenStore};
use crate::types::{CredentialPair, UserRecord};

/// Key of the persisted session record.
pub const USER_KEY: &str = "user";

const EVENT_CAPACITY: usize = 16;

/// Session lifecycle notification.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// Credentials were issued by login or registration.
    SignedIn { user: Option<UserRecord> },
    /// A refresh cycle produced a new access token.
    TokenRefreshed,
    /// The user signed out.
    SignedOut,
    /// A refresh cycle failed and the session was torn down. The UI is
    /// expected to perform a full navigation to `redirect_to`.
    Invalidated {
        reason: RefreshError,
        redirect_to: String,
    },
}

/// Persisted form of the signed-in user.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub user: UserRecord,
    pub signed_in_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// In-memory session backed by a preferences store.
pub struct SessionState<P: PreferencesStore> {
    prefs: Arc<P>,
    tokens: TokenStore<P>,
    current: RwLock<Option<StoredSession>>,
    events: broadcast::Sender<SessionEvent>,
}

impl<P: PreferencesStore> SessionState<P> {
    pub fn new(prefs: Arc<P>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            tokens: TokenStore::new(prefs.clone()),
            prefs,
            current: RwLock::new(None),
            events,
        }
    }

    /// Token entries of this session.
    pub fn tokens(&self) -> &TokenStore<P> {
        &self.tokens
    }

    /// Listen for session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Signed-in user, if any.
    pub fn current_user(&self) -> Option<UserRecord> {
        self.current
            .read()
            .unwrap()
            .as_ref()
            .map(|session| session.user.clone())
    }

    /// Full session record, if any.
    pub fn stored_session(&self) -> Option<StoredSession> {
        self.current.read().unwrap().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.read().unwrap().is_some()
    }

    /// Reload the persisted session after a restart.
    ///
    /// A record that no longer parses is dropped rather than reported, so a
    /// format change never locks the user out of the login screen.
    pub async fn restore(&self) -> Result<Option<UserRecord>, StorageError> {
        let Some(raw) = self.prefs.get(USER_KEY).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<StoredSession>(&raw) {
            Ok(session) => {
                let user = session.user.clone();
                *self.current.write().unwrap() = Some(session);
                debug!("Session restored");
                Ok(Some(user))
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable session record");
                self.prefs.remove(USER_KEY).await?;
                Ok(None)
            }
        }
    }

    /// Store credentials and user issued at sign-in.
    pub async fn sign_in(
        &self,
        credentials: &CredentialPair,
        user: Option<UserRecord>,
    ) -> Result<(), StorageError> {
        self.tokens.store(credentials).await?;
        match &user {
            Some(user) => {
                self.save(StoredSession {
                    user: user.clone(),
                    signed_in_at: Utc::now(),
                    refreshed_at: None,
                })
                .await?
            }
            // The previous user must not outlive its credentials.
            None => {
                *self.current.write().unwrap() = None;
                self.prefs.remove(USER_KEY).await?;
            }
        }
        info!(user_id = ?user.as_ref().and_then(|u| u.id.as_ref()), "Signed in");
        self.emit(SessionEvent::SignedIn { user });
        Ok(())
    }

    /// Record a successful refresh, replacing the user when the server sent one.
    pub async fn token_refreshed(&self, user: Option<UserRecord>) -> Result<(), StorageError> {
        let now = Utc::now();
        let previous = self.stored_session();
        let updated = match (previous, user) {
            (Some(mut session), Some(user)) => {
                session.user = user;
                session.refreshed_at = Some(now);
                Some(session)
            }
            (Some(mut session), None) => {
                session.refreshed_at = Some(now);
                Some(session)
            }
            (None, Some(user)) => Some(StoredSession {
                user,
                signed_in_at: now,
                refreshed_at: Some(now),
            }),
            (None, None) => None,
        };

        if let Some(session) = updated {
            self.save(session).await?;
        }
        self.emit(SessionEvent::TokenRefreshed);
        Ok(())
    }

    /// Tear the session down after an unrecoverable refresh failure.
    ///
    /// Storage failures are logged; the in-memory session is cleared and the
    /// event is emitted regardless.
    pub async fn invalidate(&self, reason: RefreshError, redirect_to: &str) {
        if let Err(e) = self.purge().await {
            warn!(error = %e, "Failed to purge session storage");
        }
        warn!(reason = %reason, redirect_to, "Session invalidated");
        self.emit(SessionEvent::Invalidated {
            reason,
            redirect_to: redirect_to.to_string(),
        });
    }

    /// Sign out locally.
    pub async fn sign_out(&self) -> Result<(), StorageError> {
        let result = self.purge().await;
        info!("Signed out");
        self.emit(SessionEvent::SignedOut);
        result
    }

    async fn purge(&self) -> Result<(), StorageError> {
        *self.current.write().unwrap() = None;
        let tokens = self.tokens.clear().await;
        let user = self.prefs.remove(USER_KEY).await;
        tokens.and(user)
    }

    async fn save(&self, session: StoredSession) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&session).map_err(|e| StorageError::WriteFailed {
            message: e.to_string(),
        })?;
        self.prefs.set(USER_KEY, &raw).await?;
        *self.current.write().unwrap() = Some(session);
        Ok(())
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}
