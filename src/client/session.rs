//! Session Storage
//!
//! Persists the auth token and identity between runs. The connection manager
//! only connects while a session is present, and logout clears it.

use crate::shared::error::SessionError;
use crate::shared::messaging::UserId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Logged-in identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token sent on REST calls and in the STOMP CONNECT frame
    pub token: String,
    pub user_id: UserId,
    #[serde(default)]
    pub username: Option<String>,
}

impl Session {
    pub fn new(token: impl Into<String>, user_id: UserId) -> Self {
        Self {
            token: token.into(),
            user_id,
            username: None,
        }
    }

    /// A session is usable only with a non-blank token
    pub fn is_valid(&self) -> bool {
        !self.token.trim().is_empty()
    }
}

/// Where the login state lives
pub trait SessionStore: Send + Sync {
    /// Read the persisted session, if any
    fn load(&self) -> Result<Option<Session>, SessionError>;
    fn save(&self, session: &Session) -> Result<(), SessionError>;
    fn clear(&self) -> Result<(), SessionError>;
}

/// TOML file under the platform data directory
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/ticketchat/session.toml`
    pub fn default_location() -> Result<Self, SessionError> {
        let mut path = dirs::data_dir().ok_or(SessionError::NoDataDir)?;
        path.push("ticketchat");
        path.push("session.toml");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>, SessionError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let session: Session = toml::from_str(&contents)?;
        Ok(Some(session).filter(Session::is_valid))
    }

    fn save(&self, session: &Session) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, toml::to_string(session)?)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store, for tests and embedding
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>, SessionError> {
        let guard = self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(guard.clone().filter(Session::is_valid))
    }

    fn save(&self, session: &Session) -> Result<(), SessionError> {
        let mut guard = self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        let mut guard = self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = None;
        Ok(())
    }
}
