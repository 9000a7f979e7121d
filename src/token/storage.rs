//! Token Storage
//!
//! Preferences-style key-value persistence and the token store built on it.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::types::CredentialPair;

/// Key of the stored access token.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";
/// Key of the stored refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Persistent string key-value store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PreferencesStore: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a value. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory preferences, lost on drop.
#[derive(Default)]
pub struct InMemoryPreferences {
    values: Mutex<HashMap<String, String>>,
}

impl InMemoryPreferences {
    /// Create empty in-memory preferences.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.values.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PreferencesStore for InMemoryPreferences {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Preferences persisted as one JSON object in a file.
///
/// The file is read once on first access. Every write rewrites the whole
/// file through a temporary sibling and a rename.
pub struct FilePreferences {
    path: PathBuf,
    cache: tokio::sync::Mutex<Option<HashMap<String, String>>>,
}

impl FilePreferences {
    /// Open preferences at `path`. The file is created on first write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: tokio::sync::Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, String>, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                StorageError::CorruptedData {
                    message: format!("{}: {}", self.path.display(), e),
                }
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(StorageError::ReadFailed {
                message: format!("{}: {}", self.path.display(), e),
            }),
        }
    }

    async fn persist(&self, values: &HashMap<String, String>) -> Result<(), StorageError> {
        let write_failed = |e: &dyn std::fmt::Display| StorageError::WriteFailed {
            message: format!("{}: {}", self.path.display(), e),
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| write_failed(&e))?;
            }
        }

        let bytes = serde_json::to_vec_pretty(values).map_err(|e| write_failed(&e))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| write_failed(&e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| write_failed(&e))?;

        debug!(path = %self.path.display(), entries = values.len(), "Preferences written");
        Ok(())
    }
}

#[async_trait]
impl PreferencesStore for FilePreferences {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.load().await?);
        }
        Ok(cache.as_ref().and_then(|values| values.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut cache = self.cache.lock().await;
        let mut values = match cache.as_ref() {
            Some(values) => values.clone(),
            None => self.load().await?,
        };
        values.insert(key.to_string(), value.to_string());
        self.persist(&values).await?;
        *cache = Some(values);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut cache = self.cache.lock().await;
        let mut values = match cache.as_ref() {
            Some(values) => values.clone(),
            None => self.load().await?,
        };
        if values.remove(key).is_some() {
            self.persist(&values).await?;
        }
        *cache = Some(values);
        Ok(())
    }
}

/// Access and refresh token entries on top of a preferences store.
pub struct TokenStore<P: PreferencesStore> {
    prefs: Arc<P>,
}

impl<P: PreferencesStore> Clone for TokenStore<P> {
    fn clone(&self) -> Self {
        Self {
            prefs: self.prefs.clone(),
        }
    }
}

impl<P: PreferencesStore> TokenStore<P> {
    pub fn new(prefs: Arc<P>) -> Self {
        Self { prefs }
    }

    /// Stored access token.
    pub async fn access_token(&self) -> Result<Option<SecretString>, StorageError> {
        Ok(self.prefs.get(ACCESS_TOKEN_KEY).await?.map(SecretString::new))
    }

    /// Stored refresh token.
    pub async fn refresh_token(&self) -> Result<Option<SecretString>, StorageError> {
        Ok(self.prefs.get(REFRESH_TOKEN_KEY).await?.map(SecretString::new))
    }

    /// Both tokens, when both are present.
    pub async fn credentials(&self) -> Result<Option<CredentialPair>, StorageError> {
        let access = self.prefs.get(ACCESS_TOKEN_KEY).await?;
        let refresh = self.prefs.get(REFRESH_TOKEN_KEY).await?;
        Ok(access
            .zip(refresh)
            .map(|(access, refresh)| CredentialPair::new(access, refresh)))
    }

    /// Store a freshly issued pair.
    pub async fn store(&self, pair: &CredentialPair) -> Result<(), StorageError> {
        self.prefs
            .set(ACCESS_TOKEN_KEY, pair.access_token().expose_secret())
            .await?;
        self.prefs
            .set(REFRESH_TOKEN_KEY, pair.refresh_token().expose_secret())
            .await
    }

    /// Replace the access token. The refresh token is left as is.
    pub async fn set_access_token(&self, token: &SecretString) -> Result<(), StorageError> {
        self.prefs.set(ACCESS_TOKEN_KEY, token.expose_secret()).await
    }

    /// Remove both tokens.
    ///
    /// Both removals are attempted; the first failure is returned.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let access = self.prefs.remove(ACCESS_TOKEN_KEY).await;
        let refresh = self.prefs.remove(REFRESH_TOKEN_KEY).await;
        if let Err(e) = &access {
            warn!(error = %e, "Failed to remove access token");
        }
        if let Err(e) = &refresh {
            warn!(error = %e, "Failed to remove refresh token");
        }
        access.and(refresh)
    }
}
