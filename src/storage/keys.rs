//! Encryption key management.
//!
//! The key manager is an explicitly constructed object: built once at
//! process start and passed to the store, never a hidden global. Key
//! material is obtained through `CredentialStore` backends in preference
//! order; an OS credential store can be registered first, with the
//! permission-restricted key file always available as the fallback.
//!
//! Rotation writes the new key to every location that held the old one but
//! does NOT re-encrypt existing rows: ciphertext stays bound to the key
//! that was active when it was written, and re-encryption is a separate
//! operator-driven migration.

use rand::RngCore;
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::debug;

use super::crypto::KEY_LEN;
use super::StorageError;

/// One place a key can live (OS keychain, key file, ...).
pub trait CredentialStore: Send + Sync {
    fn name(&self) -> &str;

    /// Read the stored key, `None` when absent.
    fn load(&self) -> Result<Option<[u8; KEY_LEN]>, StorageError>;

    fn store(&self, key: &[u8; KEY_LEN]) -> Result<(), StorageError>;

    /// Remove the key; returns whether one was present.
    fn delete(&self) -> Result<bool, StorageError>;
}

/// Key file in the per-user configuration directory, created with
/// owner-only permissions before any key bytes touch disk.
pub struct FileKeyStore {
    path: PathBuf,
}

impl FileKeyStore {
    pub fn new(path: PathBuf) -> Self {
        FileKeyStore { path }
    }

    /// Default location: `<config dir>/piiguard/.key`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("piiguard")
            .join(".key")
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl CredentialStore for FileKeyStore {
    fn name(&self) -> &str {
        "key file"
    }

    fn load(&self) -> Result<Option<[u8; KEY_LEN]>, StorageError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => {
                let key: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
                    StorageError::KeyStore(format!(
                        "key file {} has wrong length ({} bytes, expected {KEY_LEN})",
                        self.path.display(),
                        bytes.len()
                    ))
                })?;
                Ok(Some(key))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn store(&self, key: &[u8; KEY_LEN]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Owner-only permissions are set at creation time, before the key
        // bytes are written.
        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)?;
            file.write_all(key)?;
        }

        #[cfg(not(unix))]
        {
            std::fs::write(&self.path, key)?;
        }

        debug!(path = %self.path.display(), "wrote encryption key file");
        Ok(())
    }

    fn delete(&self) -> Result<bool, StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

/// Obtains, caches, rotates, and deletes the symmetric encryption key.
pub struct KeyManager {
    stores: Vec<Box<dyn CredentialStore>>,
    // Read-mostly; written only on first load and explicit rotate.
    cached: RwLock<Option<[u8; KEY_LEN]>>,
}

impl KeyManager {
    /// Key manager backed by the default key file location.
    pub fn new() -> Self {
        Self::with_stores(vec![Box::new(FileKeyStore::new(
            FileKeyStore::default_path(),
        ))])
    }

    /// Key manager with an explicit backend preference order. The last
    /// store acts as the fallback and must support writes.
    pub fn with_stores(stores: Vec<Box<dyn CredentialStore>>) -> Self {
        KeyManager {
            stores,
            cached: RwLock::new(None),
        }
    }

    fn generate_key() -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        key
    }

    /// Get the encryption key, creating and persisting one if none exists
    /// in any backend.
    pub fn get_or_create_key(&self) -> Result<[u8; KEY_LEN], StorageError> {
        if let Some(key) = *self.cached.read().unwrap() {
            return Ok(key);
        }

        for store in &self.stores {
            match store.load() {
                Ok(Some(key)) => {
                    *self.cached.write().unwrap() = Some(key);
                    return Ok(key);
                }
                Ok(None) => continue,
                Err(e) => {
                    debug!(store = store.name(), "credential store unavailable: {e}");
                    continue;
                }
            }
        }

        // No backend holds a key yet: create one in the first store that
        // accepts a write.
        let key = Self::generate_key();
        let mut last_err = None;
        for store in &self.stores {
            match store.store(&key) {
                Ok(()) => {
                    *self.cached.write().unwrap() = Some(key);
                    return Ok(key);
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            StorageError::KeyStore("no credential store configured".to_string())
        }))
    }

    /// Rotate to a freshly generated key.
    ///
    /// The new key is written to every backend that currently holds the old
    /// one (or to the preferred writable backend when none do). Existing
    /// encrypted rows are NOT re-encrypted.
    pub fn rotate_key(&self) -> Result<[u8; KEY_LEN], StorageError> {
        let new_key = Self::generate_key();

        let holders: Vec<&dyn CredentialStore> = self
            .stores
            .iter()
            .map(|s| s.as_ref())
            .filter(|s| matches!(s.load(), Ok(Some(_))))
            .collect();

        let mut written = false;
        let mut last_err = None;
        if holders.is_empty() {
            // Nothing to rotate over: create the key in the preferred
            // writable backend.
            for store in &self.stores {
                match store.store(&new_key) {
                    Ok(()) => {
                        written = true;
                        break;
                    }
                    Err(e) => last_err = Some(e),
                }
            }
        } else {
            // Replace the key everywhere the old one was found.
            for store in holders {
                match store.store(&new_key) {
                    Ok(()) => written = true,
                    Err(e) => last_err = Some(e),
                }
            }
        }

        if !written {
            return Err(last_err.unwrap_or_else(|| {
                StorageError::KeyStore("no credential store accepted the new key".to_string())
            }));
        }

        *self.cached.write().unwrap() = Some(new_key);
        Ok(new_key)
    }

    /// Delete the key from every backend.
    ///
    /// WARNING: makes all previously encrypted data unrecoverable.
    /// Returns whether any backend held a key.
    pub fn delete_key(&self) -> Result<bool, StorageError> {
        let mut deleted = false;
        for store in &self.stores {
            deleted |= store.delete()?;
        }
        *self.cached.write().unwrap() = None;
        Ok(deleted)
    }
}

impl Default for KeyManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager_in(dir: &TempDir) -> KeyManager {
        KeyManager::with_stores(vec![Box::new(FileKeyStore::new(
            dir.path().join("piiguard").join(".key"),
        ))])
    }

    #[test]
    fn creates_key_on_first_use_and_reuses_it() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);

        let first = manager.get_or_create_key().unwrap();
        let second = manager.get_or_create_key().unwrap();
        assert_eq!(first, second);

        // A fresh manager over the same backing file sees the same key.
        let other = manager_in(&dir);
        assert_eq!(other.get_or_create_key().unwrap(), first);
    }

    #[test]
    fn rotation_replaces_the_key_in_place() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);

        let old = manager.get_or_create_key().unwrap();
        let new = manager.rotate_key().unwrap();
        assert_ne!(old, new);
        assert_eq!(manager.get_or_create_key().unwrap(), new);

        let other = manager_in(&dir);
        assert_eq!(other.get_or_create_key().unwrap(), new);
    }

    #[test]
    fn delete_reports_whether_a_key_existed() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);

        assert!(!manager.delete_key().unwrap());
        manager.get_or_create_key().unwrap();
        assert!(manager.delete_key().unwrap());

        // After deletion a new key is generated.
        let recreated = manager.get_or_create_key().unwrap();
        assert_eq!(recreated.len(), KEY_LEN);
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".key");
        let store = FileKeyStore::new(path.clone());
        store.store(&[0x11; KEY_LEN]).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn corrupt_key_file_is_a_key_store_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".key");
        std::fs::write(&path, b"short").unwrap();

        let store = FileKeyStore::new(path);
        assert!(matches!(store.load(), Err(StorageError::KeyStore(_))));
    }
}
