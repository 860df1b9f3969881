//! Bearer-token persistence and the login lifecycle.
//!
//! Tokens live in a small JSON key-value file, the moral equivalent of the
//! browser's local storage. `Session` ties that file to an `ApiClient`.

use crate::api::ApiClient;
use crate::error::{ApiError, SessionError};
use crate::models::{Credentials, User};
use directories::ProjectDirs;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Key under which the bearer token is stored.
pub const TOKEN_KEY: &str = "access_token";

/// Persistent key-value storage for session data.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError>;
    fn set(&self, key: &str, value: &str) -> Result<(), SessionError>;
    fn remove(&self, key: &str) -> Result<(), SessionError>;
}

/// JSON object on disk, rewritten on every change.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `session.json` in the platform data directory.
    pub fn default_location() -> Result<Self, SessionError> {
        let dirs = ProjectDirs::from("", "", "emolens").ok_or(SessionError::NoDataDir)?;
        Ok(Self::new(dirs.data_dir().join("session.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<Map<String, Value>, SessionError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(map)?)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self
            .read_map()?
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let mut map = self.read_map()?;
        map.insert(key.to_string(), Value::String(value.to_string()));
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// Volatile store, for tests and one-shot `--token` use.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    values: Mutex<Map<String, Value>>,
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        Ok(values.get(key).and_then(Value::as_str).map(str::to_string))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let mut values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        values.insert(key.to_string(), Value::String(value.to_string()));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        let mut values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        values.remove(key);
        Ok(())
    }
}

/// Errors from session flows.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] SessionError),
}

/// Authenticated-or-not state of one client.
pub struct Session {
    client: ApiClient,
    tokens: Box<dyn TokenStore>,
    user: Option<User>,
}

impl Session {
    pub fn new(client: ApiClient, tokens: Box<dyn TokenStore>) -> Self {
        Self {
            client,
            tokens,
            user: None,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Load a stored token and check it against `/auth/me`.
    ///
    /// A token the server rejects is deleted. Without a stored token no
    /// request is made and the session stays unauthenticated.
    pub async fn restore(&mut self) -> Result<Option<&User>, AuthError> {
        let Some(token) = self.tokens.get(TOKEN_KEY)? else {
            debug!("No stored token");
            return Ok(None);
        };

        self.client.set_token(token);
        match self.client.me().await {
            Ok(user) => {
                info!("Restored session for {}", user.email);
                self.user = Some(user);
                Ok(self.user.as_ref())
            }
            Err(e) if e.is_auth_failure() => {
                warn!("Stored token is invalid or expired, removing it");
                self.tokens.remove(TOKEN_KEY)?;
                self.client.clear_token();
                self.user = None;
                Ok(None)
            }
            Err(e) => {
                // Server unreachable: keep the token for next time.
                self.client.clear_token();
                Err(e.into())
            }
        }
    }

    /// Exchange credentials for a token, persist it and load the profile.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<&User, AuthError> {
        let token = self.client.login(email, password).await?;
        self.tokens.set(TOKEN_KEY, &token)?;
        self.client.set_token(token);

        let user = self.client.me().await?;
        info!("Logged in as {}", user.email);
        let user = self.user.insert(user);
        Ok(&*user)
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, credentials: &Credentials) -> Result<User, AuthError> {
        Ok(self.client.register(credentials).await?)
    }

    /// Forget the token locally and on this client.
    pub fn logout(&mut self) -> Result<(), AuthError> {
        self.tokens.remove(TOKEN_KEY)?;
        self.client.clear_token();
        self.user = None;
        info!("Logged out");
        Ok(())
    }
}
