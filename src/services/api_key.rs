// Persisted API key: a single plain-text value at a fixed path
//
// Loaded at startup if present, overwritten on save, file removed on clear.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::errors::{KeyStoreError, KeyStoreResult};

/// Plain-text API key store
#[derive(Debug, Clone)]
pub struct ApiKeyStore {
    path: PathBuf,
}

impl ApiKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored key, trimmed; `None` when the file is absent or blank.
    pub fn load(&self) -> KeyStoreResult<Option<String>> {
        if !self.path.is_file() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path).map_err(|source| {
            KeyStoreError::ReadFailed {
                path: self.path.clone(),
                source,
            }
        })?;

        let key = contents.trim();
        if key.is_empty() {
            Ok(None)
        } else {
            Ok(Some(key.to_string()))
        }
    }

    /// Overwrite the stored key. An empty (or whitespace-only) key is
    /// rejected rather than written.
    pub fn save(&self, key: &str) -> KeyStoreResult<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(KeyStoreError::EmptyKey);
        }

        fs::write(&self.path, key).map_err(|source| KeyStoreError::SaveFailed {
            path: self.path.clone(),
            source,
        })?;

        info!(path = %self.path.display(), "API key saved");
        Ok(())
    }

    /// Remove the stored key. A missing file is not an error.
    pub fn clear(&self) -> KeyStoreResult<()> {
        if self.path.is_file() {
            fs::remove_file(&self.path).map_err(|source| KeyStoreError::RemoveFailed {
                path: self.path.clone(),
                source,
            })?;
            info!(path = %self.path.display(), "API key cleared");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in_tempdir() -> (tempfile::TempDir, ApiKeyStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ApiKeyStore::new(dir.path().join("photoroom_api_key.txt"));
        (dir, store)
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let (_dir, store) = store_in_tempdir();
        store.save("  sk-test-123  ").unwrap();
        assert_eq!(store.load().unwrap(), Some("sk-test-123".to_string()));
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let (_dir, store) = store_in_tempdir();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_load_blank_file_is_none() {
        let (_dir, store) = store_in_tempdir();
        fs::write(store.path(), "   \n").unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_save_rejects_empty_key() {
        let (_dir, store) = store_in_tempdir();
        assert!(matches!(store.save("   "), Err(KeyStoreError::EmptyKey)));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_clear_removes_file_and_tolerates_missing() {
        let (_dir, store) = store_in_tempdir();
        store.save("sk-test").unwrap();
        store.clear().unwrap();
        assert!(!store.path().exists());

        // Clearing again is a no-op
        store.clear().unwrap();
    }
}
