use anyhow::Result;
use clap::Subcommand;
use serde_json::json;

use crate::cli::Output;
use crate::config::PiiguardConfig;
use crate::storage::{self, AuditAction, AuditLog};

#[derive(Subcommand)]
pub enum KeyCommands {
    /// Show where the encryption key lives and whether it exists
    Status,
    /// Rotate to a freshly generated key
    Rotate,
    /// Delete the encryption key
    Delete {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

pub fn execute(cmd: KeyCommands, config_path: Option<&str>, output: &Output) -> Result<()> {
    let config = PiiguardConfig::load(config_path)?;
    let manager = super::key_manager_for(&config);
    let key_path = super::key_path_for(&config);
    let audit = AuditLog::new(storage::default_audit_path(config.storage.data_dir.as_ref()))?;

    match cmd {
        KeyCommands::Status => {
            output.header("Encryption key");
            output.line(&format!("Location: {}", key_path.display()));
            if key_path.exists() {
                output.line("Status:   present");
            } else {
                output.line("Status:   not created yet (generated on first scan)");
            }
        }
        KeyCommands::Rotate => {
            manager.rotate_key()?;
            audit.log(
                AuditAction::KeyRotate,
                json!({"key_path": key_path.display().to_string()}),
            )?;
            output.success("Rotated encryption key");
            output.warning(
                "Existing findings remain encrypted with the previous key and can no \
                 longer be decrypted; delete or re-scan them if needed",
            );
        }
        KeyCommands::Delete { yes } => {
            if !yes {
                anyhow::bail!(
                    "deleting the key makes all encrypted findings unrecoverable; \
                     pass --yes to confirm"
                );
            }
            let existed = manager.delete_key()?;
            audit.log(
                AuditAction::KeyDelete,
                json!({"key_path": key_path.display().to_string(), "existed": existed}),
            )?;
            if existed {
                output.success("Deleted encryption key");
                output.warning("All previously encrypted findings are now unrecoverable");
            } else {
                output.info("No encryption key was present");
            }
        }
    }

    Ok(())
}
