//! Persisted credential storage
//!
//! The credential survives client restarts in a single file under the
//! platform data directory:
//! - Linux: ~/.local/share/csvdash/credential
//! - macOS: ~/Library/Application Support/csvdash/credential
//! - Windows: %APPDATA%\csvdash\credential

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Credential storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Data directory not found")]
    NoDirFound,
}

/// Where the session credential is kept between runs
pub trait CredentialStore: Send {
    fn load(&self) -> Result<Option<String>, StorageError>;
    fn save(&mut self, token: &str) -> Result<(), StorageError>;
    fn clear(&mut self) -> Result<(), StorageError>;
}

/// File-backed credential store
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the platform data directory
    pub fn default_location() -> Result<Self, StorageError> {
        dirs::data_dir()
            .map(|p| Self::new(p.join("csvdash").join("credential")))
            .ok_or(StorageError::NoDirFound)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let token = content.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self, token: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, token)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory credential store
///
/// Clones share the same slot, so a clone kept outside a `SessionStore`
/// observes what the store persisted. Used to model a restart in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(token.to_string()))),
        }
    }

    pub fn peek(&self) -> Option<String> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<String>, StorageError> {
        Ok(self.peek())
    }

    fn save(&mut self, token: &str) -> Result<(), StorageError> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("csvdash-test-{}-{}", std::process::id(), name))
            .join("credential")
    }

    #[test]
    fn test_file_store_roundtrip() {
        let path = temp_path("roundtrip");
        let mut store = FileCredentialStore::new(&path);

        assert_eq!(store.load().unwrap(), None);

        store.save("abc.def.ghi").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("abc.def.ghi"));

        // A fresh handle on the same path sees the same credential
        let reopened = FileCredentialStore::new(&path);
        assert_eq!(reopened.load().unwrap().as_deref(), Some("abc.def.ghi"));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_file_store_clear_missing_is_ok() {
        let mut store = FileCredentialStore::new(temp_path("missing"));
        assert_ok!(store.clear());
        assert_ok!(store.clear());
    }

    #[test]
    fn test_memory_store_shares_slot() {
        let store = MemoryCredentialStore::new();
        let mut writer = store.clone();

        writer.save("token").unwrap();
        assert_eq!(store.peek().as_deref(), Some("token"));

        writer.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}
