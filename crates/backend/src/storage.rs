//! Session persistence between runs.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use facturly_auth::Session;

use crate::error::BackendError;

pub trait SessionStorage: Send + Sync {
    fn load(&self) -> Result<Option<Session>, BackendError>;
    fn save(&self, session: &Session) -> Result<(), BackendError>;
    fn clear(&self) -> Result<(), BackendError>;
}

/// Keeps the session for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    slot: Mutex<Option<Session>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn load(&self) -> Result<Option<Session>, BackendError> {
        let slot = self.slot.lock().map_err(|_| BackendError::Storage("poisoned".into()))?;
        Ok(slot.clone())
    }

    fn save(&self, session: &Session) -> Result<(), BackendError> {
        let mut slot = self.slot.lock().map_err(|_| BackendError::Storage("poisoned".into()))?;
        *slot = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), BackendError> {
        let mut slot = self.slot.lock().map_err(|_| BackendError::Storage("poisoned".into()))?;
        *slot = None;
        Ok(())
    }
}

/// JSON file holding the last session.
///
/// A corrupt file reads as "no session" and is logged.
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStorage for FileSessionStorage {
    fn load(&self) -> Result<Option<Session>, BackendError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BackendError::Storage(format!("{}: {e}", self.path.display()))),
        };
        match serde_json::from_slice(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable session file");
                Ok(None)
            }
        }
    }

    fn save(&self, session: &Session) -> Result<(), BackendError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| BackendError::Storage(format!("{}: {e}", parent.display())))?;
        }
        let json = serde_json::to_vec(session).map_err(|e| BackendError::Storage(e.to_string()))?;
        std::fs::write(&self.path, json)
            .map_err(|e| BackendError::Storage(format!("{}: {e}", self.path.display())))
    }

    fn clear(&self) -> Result<(), BackendError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BackendError::Storage(format!("{}: {e}", self.path.display()))),
        }
    }
}
