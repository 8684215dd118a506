use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;

use crate::cli::Output;
use crate::config::PiiguardConfig;
use crate::storage::{self, AuditAction, AuditFilter, AuditLog};

#[derive(Args)]
pub struct AuditArgs {
    /// Restrict to one action (e.g. finding_store, key_rotate)
    #[arg(long)]
    pub action: Option<AuditAction>,

    /// Restrict to one scan
    #[arg(long)]
    pub scan_id: Option<String>,

    /// Only entries at or after this RFC 3339 timestamp
    #[arg(long)]
    pub since: Option<DateTime<Utc>>,

    /// Maximum entries to show
    #[arg(long, default_value = "50")]
    pub limit: usize,

    /// Show aggregate statistics instead of entries
    #[arg(long)]
    pub stats: bool,
}

/// Inspect the audit log. Reading entries needs neither the database nor
/// the encryption key.
pub fn execute(args: AuditArgs, config_path: Option<&str>, output: &Output) -> Result<()> {
    let config = PiiguardConfig::load(config_path)?;
    let log = AuditLog::new(storage::default_audit_path(config.storage.data_dir.as_ref()))?;

    if args.stats {
        let stats = log.get_stats()?;
        output.header("Audit log");
        output.line(&format!("Entries: {}", stats.total_entries));
        output.line(&format!("Errors:  {}", stats.errors));
        if let (Some(first), Some(last)) = (stats.first_entry, stats.last_entry) {
            output.line(&format!("Range:   {} .. {}", first.to_rfc3339(), last.to_rfc3339()));
        }
        for (action, count) in &stats.by_action {
            output.line(&format!("  {action}: {count}"));
        }
        for (user, count) in &stats.by_user {
            output.verbose(&format!("  user {user}: {count}"));
        }
        return Ok(());
    }

    let entries = log.get_entries(&AuditFilter {
        since: args.since,
        action: args.action,
        scan_id: args.scan_id,
        limit: args.limit,
    })?;

    if entries.is_empty() {
        output.info("No audit entries matched the filters");
        return Ok(());
    }

    output.header(&format!("{} audit entries", entries.len()));
    for entry in &entries {
        let outcome = if entry.success { "ok" } else { "FAILED" };
        output.line(&format!(
            "{}  {}  {}  {} records  [{outcome}]{}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.action,
            entry.user,
            entry.record_count,
            entry
                .scan_id
                .as_deref()
                .map(|id| format!("  scan {id}"))
                .unwrap_or_default(),
        ));
        if let Some(error) = &entry.error {
            output.warning(&format!("  {error}"));
        }
        if output.is_verbose() {
            output.verbose(&format!("  {}", entry.details));
        }
    }

    Ok(())
}
