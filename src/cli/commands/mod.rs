//! Command implementations.
//!
//! Each command is organized into its own module. Shared plumbing for
//! opening the encrypted findings store lives here.

pub mod audit;
pub mod export;
pub mod findings;
pub mod key;
pub mod scan;
pub mod scans;
pub mod stats;

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::config::PiiguardConfig;
use crate::storage::{self, Encryptor, FileKeyStore, FindingsDatabase, KeyManager};

/// Key manager honoring an overridden data directory: when the store is
/// relocated, the key file moves with it.
pub(crate) fn key_manager_for(config: &PiiguardConfig) -> KeyManager {
    match &config.storage.data_dir {
        Some(dir) => KeyManager::with_stores(vec![Box::new(FileKeyStore::new(dir.join(".key")))]),
        None => KeyManager::new(),
    }
}

/// Where the key file lives for this configuration.
pub(crate) fn key_path_for(config: &PiiguardConfig) -> PathBuf {
    match &config.storage.data_dir {
        Some(dir) => dir.join(".key"),
        None => FileKeyStore::default_path(),
    }
}

/// Open the findings store, creating the key on first use.
pub(crate) fn open_store(config: &PiiguardConfig) -> Result<FindingsDatabase> {
    let data_dir = config.storage.data_dir.as_ref();
    let key_path = key_path_for(config);
    let key_existed = key_path.exists();
    let key = key_manager_for(config)
        .get_or_create_key()
        .context("failed to obtain encryption key")?;
    let encryptor = Encryptor::new(&key).context("failed to initialize encryption")?;

    let db = FindingsDatabase::open_at(
        storage::default_db_path(data_dir),
        storage::default_audit_path(data_dir),
        encryptor,
    )
    .context("failed to open findings store")?;

    if !key_existed {
        db.audit().log(
            storage::AuditAction::KeyCreate,
            serde_json::json!({"key_path": key_path.display().to_string()}),
        )?;
    }
    Ok(db)
}
