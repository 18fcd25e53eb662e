//! Durable mirror of the refresh token. A pure key/value pass-through:
//! nothing here inspects token contents.

use crate::config::StorageConfig;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

pub trait TokenStore: Send + Sync {
    /// Writes through the given token. An empty string means "no session"
    /// and overwrites any previous value.
    fn persist_refresh_token(&self, token: &str) -> io::Result<()>;

    /// Reads the persisted token; absent key and empty value both come back
    /// as `None`.
    fn read_refresh_token(&self) -> io::Result<Option<String>>;
}

/// File-backed store, one file holding the raw token string.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.path.clone())
    }
}

impl TokenStore for FileTokenStore {
    fn persist_refresh_token(&self, token: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        debug!("Persisting refresh token to {}", self.path.display());
        fs::write(&self.path, token)
    }

    fn read_refresh_token(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim().to_string();
                Ok((!token.is_empty()).then_some(token))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn persist_refresh_token(&self, token: &str) -> io::Result<()> {
        let mut slot = self.token.lock().unwrap_or_else(|e| e.into_inner());
        *slot = (!token.is_empty()).then(|| token.to_string());
        Ok(())
    }

    fn read_refresh_token(&self) -> io::Result<Option<String>> {
        let slot = self.token.lock().unwrap_or_else(|e| e.into_inner());
        Ok(slot.clone())
    }
}
