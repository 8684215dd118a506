//! Encrypted findings storage.
//!
//! The storage layer owns everything that persists: the SQLite findings
//! database with field-level encryption, the key manager that feeds it,
//! and the append-only audit log that records every access.

pub mod audit;
pub mod crypto;
pub mod database;
pub mod keys;

pub use audit::{AuditAction, AuditEntry, AuditFilter, AuditLog, AuditStats};
pub use crypto::{CryptoError, Encryptor, KEY_LEN};
pub use database::{
    FindingFilters, FindingsDatabase, StoredFile, StoredFinding, StoredScan, StoreStats,
};
pub use keys::{CredentialStore, FileKeyStore, KeyManager};

use std::path::PathBuf;
use thiserror::Error;

/// Storage-layer failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential store error: {0}")]
    KeyStore(String),

    #[error("audit log error: {0}")]
    Audit(String),

    #[error("scan not found: {0}")]
    ScanNotFound(String),
}

/// Per-user application data directory, honoring an explicit override.
pub fn data_dir(override_dir: Option<&PathBuf>) -> PathBuf {
    if let Some(dir) = override_dir {
        return dir.clone();
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("piiguard")
}

/// Default findings database path under the data directory.
pub fn default_db_path(override_dir: Option<&PathBuf>) -> PathBuf {
    data_dir(override_dir).join("findings.db")
}

/// Default audit log path, kept next to the database it covers.
pub fn default_audit_path(override_dir: Option<&PathBuf>) -> PathBuf {
    data_dir(override_dir).join("findings.audit.jsonl")
}
