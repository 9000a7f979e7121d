//! Refresh Coordinator
//!
//! Single-flight access token refresh. However many requests are rejected
//! with 401 at the same time, one refresh call goes out and its outcome is
//! fanned out to every caller that waited on it.

use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::core::{HttpMethod, HttpRequest, HttpTransport};
use crate::error::RefreshError;
use crate::session::SessionState;
use crate::token::PreferencesStore;
use crate::types::{ClientConfig, RefreshRequest, RefreshResponse};

/// Outcome of one refresh cycle, shared by every waiter.
pub type RefreshOutcome = Result<SecretString, RefreshError>;

enum RefreshState {
    Idle,
    Refreshing {
        waiters: Vec<oneshot::Sender<RefreshOutcome>>,
    },
}

enum Role {
    Leader,
    Waiter(oneshot::Receiver<RefreshOutcome>),
}

/// Coordinates token refresh for one client.
pub struct RefreshCoordinator<T: HttpTransport, P: PreferencesStore> {
    refresh_url: String,
    refresh_timeout: Duration,
    login_route: String,
    transport: Arc<T>,
    session: Arc<SessionState<P>>,
    // Never held across an await.
    state: Mutex<RefreshState>,
    refresh_calls: AtomicU64,
}

impl<T: HttpTransport, P: PreferencesStore> RefreshCoordinator<T, P> {
    pub fn new(config: &ClientConfig, transport: Arc<T>, session: Arc<SessionState<P>>) -> Self {
        Self {
            refresh_url: config.endpoint_url(&config.auth.refresh_path()),
            refresh_timeout: config.refresh_timeout,
            login_route: config.login_route.clone(),
            transport,
            session,
            state: Mutex::new(RefreshState::Idle),
            refresh_calls: AtomicU64::new(0),
        }
    }

    /// Number of refresh network calls issued so far.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Whether a refresh cycle is in progress.
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.state.lock().unwrap(), RefreshState::Refreshing { .. })
    }

    /// Number of callers waiting on the current cycle.
    pub fn waiter_count(&self) -> usize {
        match &*self.state.lock().unwrap() {
            RefreshState::Refreshing { waiters } => waiters.len(),
            RefreshState::Idle => 0,
        }
    }

    /// Get a new access token, joining the in-flight refresh if there is one.
    ///
    /// On failure the session has already been torn down by the time the
    /// error is returned.
    pub async fn obtain_token(&self) -> RefreshOutcome {
        let role = {
            let mut state = self.state.lock().unwrap();
            if let RefreshState::Refreshing { waiters } = &mut *state {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                Role::Waiter(rx)
            } else {
                *state = RefreshState::Refreshing {
                    waiters: Vec::new(),
                };
                Role::Leader
            }
        };

        match role {
            Role::Waiter(rx) => {
                debug!("Waiting on in-flight token refresh");
                rx.await.unwrap_or(Err(RefreshError::Cancelled))
            }
            Role::Leader => {
                let mut guard = CycleGuard {
                    coordinator: self,
                    armed: true,
                };
                let outcome = self.run_cycle().await;
                guard.armed = false;
                self.settle(&outcome);
                outcome
            }
        }
    }

    async fn run_cycle(&self) -> RefreshOutcome {
        let outcome = self.refresh().await;
        match &outcome {
            Ok(_) => info!("Access token refreshed"),
            Err(e) => {
                self.session
                    .invalidate(e.clone(), &self.login_route)
                    .await;
            }
        }
        outcome
    }

    async fn refresh(&self) -> RefreshOutcome {
        let refresh_token = self
            .session
            .tokens()
            .refresh_token()
            .await
            .map_err(|e| RefreshError::Storage {
                message: e.to_string(),
            })?
            .ok_or(RefreshError::MissingRefreshToken)?;

        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let response = tokio::time::timeout(self.refresh_timeout, self.call(&refresh_token))
            .await
            .map_err(|_| RefreshError::Timeout {
                timeout: self.refresh_timeout,
            })??;

        // The refresh token is not rotated; only the access token changes.
        let access_token = SecretString::new(response.access_token);
        self.session
            .tokens()
            .set_access_token(&access_token)
            .await
            .map_err(|e| RefreshError::Storage {
                message: e.to_string(),
            })?;

        if let Err(e) = self.session.token_refreshed(response.user).await {
            warn!(error = %e, "Failed to persist refreshed session record");
        }

        Ok(access_token)
    }

    async fn call(&self, refresh_token: &SecretString) -> Result<RefreshResponse, RefreshError> {
        let body = serde_json::to_string(&RefreshRequest {
            refresh_token: refresh_token.expose_secret(),
        })
        .map_err(|e| RefreshError::Network {
            message: e.to_string(),
        })?;

        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers.insert("accept".to_string(), "application/json".to_string());

        let request = HttpRequest {
            method: HttpMethod::Post,
            url: self.refresh_url.clone(),
            headers,
            body: Some(body),
            timeout: Some(self.refresh_timeout),
        };

        debug!(url = %self.refresh_url, "Sending refresh request");
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| RefreshError::Network {
                message: e.to_string(),
            })?;

        if !response.is_success() {
            return Err(RefreshError::Rejected {
                status: response.status,
                body: response.body,
            });
        }

        serde_json::from_str(&response.body).map_err(|e| RefreshError::InvalidResponse {
            message: e.to_string(),
        })
    }

    /// Back to idle, releasing every waiter in enqueue order.
    fn settle(&self, outcome: &RefreshOutcome) {
        let waiters = {
            let mut state = self.state.lock().unwrap();
            match std::mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing { waiters } => waiters,
                RefreshState::Idle => Vec::new(),
            }
        };

        debug!(
            waiters = waiters.len(),
            success = outcome.is_ok(),
            "Refresh cycle settled"
        );
        for waiter in waiters {
            // A waiter whose request was dropped no longer listens.
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Releases the waiters if the leading future is dropped mid-cycle.
struct CycleGuard<'a, T: HttpTransport, P: PreferencesStore> {
    coordinator: &'a RefreshCoordinator<T, P>,
    armed: bool,
}

impl<T: HttpTransport, P: PreferencesStore> Drop for CycleGuard<'_, T, P> {
    fn drop(&mut self) {
        if self.armed {
            warn!("Token refresh dropped before completing");
            self.coordinator.settle(&Err(RefreshError::Cancelled));
        }
    }
}
