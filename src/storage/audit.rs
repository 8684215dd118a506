//! Append-only audit logging for compliance and traceability.
//!
//! Every sensitive-data access or mutation appends one self-describing
//! JSON-lines record. The file is never rewritten or truncated by normal
//! operation; reads tolerate and skip malformed lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use super::StorageError;

/// Kinds of auditable actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    // Database lifecycle
    DbCreate,
    DbOpen,
    DbClose,

    // Scan lifecycle
    ScanStart,
    ScanComplete,

    // Findings data
    FindingStore,
    FindingRead,
    FindingDelete,
    FindingExport,

    // Human review
    ReviewStart,
    ReviewVerdict,

    // Key lifecycle
    KeyCreate,
    KeyRotate,
    KeyDelete,

    // Reporting/export
    ReportGenerate,
    DataExport,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::DbCreate => "db_create",
            AuditAction::DbOpen => "db_open",
            AuditAction::DbClose => "db_close",
            AuditAction::ScanStart => "scan_start",
            AuditAction::ScanComplete => "scan_complete",
            AuditAction::FindingStore => "finding_store",
            AuditAction::FindingRead => "finding_read",
            AuditAction::FindingDelete => "finding_delete",
            AuditAction::FindingExport => "finding_export",
            AuditAction::ReviewStart => "review_start",
            AuditAction::ReviewVerdict => "review_verdict",
            AuditAction::KeyCreate => "key_create",
            AuditAction::KeyRotate => "key_rotate",
            AuditAction::KeyDelete => "key_delete",
            AuditAction::ReportGenerate => "report_generate",
            AuditAction::DataExport => "data_export",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| format!("unknown audit action: {s}"))
    }
}

/// Single audit log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub user: String,
    pub details: serde_json::Value,
    #[serde(default)]
    pub record_count: u64,
    #[serde(default)]
    pub scan_id: Option<String>,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

fn default_success() -> bool {
    true
}

/// Filters for reading back audit entries.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub since: Option<DateTime<Utc>>,
    pub action: Option<AuditAction>,
    pub scan_id: Option<String>,
    /// Maximum entries returned; 0 means the default of 1000.
    pub limit: usize,
}

/// Aggregate statistics over the whole log.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditStats {
    pub total_entries: u64,
    pub by_action: BTreeMap<String, u64>,
    pub by_user: BTreeMap<String, u64>,
    pub errors: u64,
    pub first_entry: Option<DateTime<Utc>>,
    pub last_entry: Option<DateTime<Utc>>,
}

/// Append-only audit log stored as JSON lines.
///
/// Appends are serialized behind a mutex so concurrent callers within the
/// process never interleave partial lines.
pub struct AuditLog {
    path: PathBuf,
    user: String,
    append_lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(path: PathBuf) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        Ok(AuditLog {
            path,
            user: current_user(),
            append_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record with defaults: zero records affected, no scan id.
    pub fn log(
        &self,
        action: AuditAction,
        details: serde_json::Value,
    ) -> Result<AuditEntry, StorageError> {
        self.log_with(action, details, 0, None)
    }

    /// Append one successful record with an accurate affected-record count.
    pub fn log_with(
        &self,
        action: AuditAction,
        details: serde_json::Value,
        record_count: u64,
        scan_id: Option<&str>,
    ) -> Result<AuditEntry, StorageError> {
        self.append(AuditEntry {
            timestamp: Utc::now(),
            action,
            user: self.user.clone(),
            details,
            record_count,
            scan_id: scan_id.map(str::to_string),
            success: true,
            error: None,
        })
    }

    /// Append a failure record.
    pub fn log_failure(
        &self,
        action: AuditAction,
        details: serde_json::Value,
        error: &str,
    ) -> Result<AuditEntry, StorageError> {
        self.append(AuditEntry {
            timestamp: Utc::now(),
            action,
            user: self.user.clone(),
            details,
            record_count: 0,
            scan_id: None,
            success: false,
            error: Some(error.to_string()),
        })
    }

    fn append(&self, entry: AuditEntry) -> Result<AuditEntry, StorageError> {
        let line = serde_json::to_string(&entry)
            .map_err(|e| StorageError::Audit(format!("serialize audit entry: {e}")))?;

        let _guard = self.append_lock.lock().unwrap();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;

        Ok(entry)
    }

    /// Read entries with optional filters. Malformed lines are skipped, not
    /// errors: a partially damaged log still yields its intact records.
    pub fn get_entries(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StorageError> {
        let limit = if filter.limit == 0 { 1000 } else { filter.limit };
        let mut entries = Vec::new();

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(StorageError::Io(e)),
        };

        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }

            let entry: AuditEntry = match serde_json::from_str(line) {
                Ok(entry) => entry,
                Err(_) => continue,
            };

            if let Some(since) = filter.since {
                if entry.timestamp < since {
                    continue;
                }
            }
            if let Some(action) = filter.action {
                if entry.action != action {
                    continue;
                }
            }
            if let Some(scan_id) = &filter.scan_id {
                if entry.scan_id.as_deref() != Some(scan_id.as_str()) {
                    continue;
                }
            }

            entries.push(entry);
            if entries.len() >= limit {
                break;
            }
        }

        Ok(entries)
    }

    /// Aggregate statistics over the whole log.
    pub fn get_stats(&self) -> Result<AuditStats, StorageError> {
        let mut stats = AuditStats::default();

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(stats),
            Err(e) => return Err(StorageError::Io(e)),
        };

        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: AuditEntry = match serde_json::from_str(line) {
                Ok(entry) => entry,
                Err(_) => continue,
            };

            stats.total_entries += 1;
            *stats
                .by_action
                .entry(entry.action.as_str().to_string())
                .or_default() += 1;
            *stats.by_user.entry(entry.user.clone()).or_default() += 1;
            if !entry.success {
                stats.errors += 1;
            }
            if stats.first_entry.is_none() {
                stats.first_entry = Some(entry.timestamp);
            }
            stats.last_entry = Some(entry.timestamp);
        }

        Ok(stats)
    }
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn log_in(dir: &TempDir) -> AuditLog {
        AuditLog::new(dir.path().join("findings.audit.jsonl")).unwrap()
    }

    #[test]
    fn appends_and_reads_back_entries() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);

        log.log(AuditAction::ScanStart, json!({"path": "/docs"}))
            .unwrap();
        log.log_with(
            AuditAction::FindingStore,
            json!({"source_path": "/docs"}),
            7,
            Some("abc123"),
        )
        .unwrap();

        let entries = log.get_entries(&AuditFilter::default()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, AuditAction::ScanStart);
        assert_eq!(entries[1].record_count, 7);
        assert_eq!(entries[1].scan_id.as_deref(), Some("abc123"));
        assert!(entries.iter().all(|e| e.success));
    }

    #[test]
    fn filters_by_action_and_scan_id() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);

        log.log_with(AuditAction::FindingStore, json!({}), 3, Some("scan-a"))
            .unwrap();
        log.log_with(AuditAction::FindingDelete, json!({}), 3, Some("scan-a"))
            .unwrap();
        log.log_with(AuditAction::FindingStore, json!({}), 1, Some("scan-b"))
            .unwrap();

        let stores = log
            .get_entries(&AuditFilter {
                action: Some(AuditAction::FindingStore),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(stores.len(), 2);

        let scan_a = log
            .get_entries(&AuditFilter {
                scan_id: Some("scan-a".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(scan_a.len(), 2);
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);

        log.log(AuditAction::DbOpen, json!({})).unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(log.path())
            .and_then(|mut f| writeln!(f, "{{not valid json"))
            .unwrap();
        log.log(AuditAction::DbClose, json!({})).unwrap();

        let entries = log.get_entries(&AuditFilter::default()).unwrap();
        assert_eq!(entries.len(), 2);

        let stats = log.get_stats().unwrap();
        assert_eq!(stats.total_entries, 2);
    }

    #[test]
    fn stats_aggregate_actions_users_and_errors() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);

        log.log(AuditAction::DbOpen, json!({})).unwrap();
        log.log(AuditAction::FindingRead, json!({})).unwrap();
        log.log(AuditAction::FindingRead, json!({})).unwrap();
        log.log_failure(AuditAction::KeyRotate, json!({}), "store unavailable")
            .unwrap();

        let stats = log.get_stats().unwrap();
        assert_eq!(stats.total_entries, 4);
        assert_eq!(stats.by_action.get("finding_read"), Some(&2));
        assert_eq!(stats.errors, 1);
        assert!(stats.first_entry.is_some());
        assert!(stats.last_entry >= stats.first_entry);
    }

    #[test]
    fn missing_log_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        assert!(log.get_entries(&AuditFilter::default()).unwrap().is_empty());
        assert_eq!(log.get_stats().unwrap().total_entries, 0);
    }

    #[test]
    fn action_parses_from_stable_string() {
        assert_eq!(
            "finding_store".parse::<AuditAction>().unwrap(),
            AuditAction::FindingStore
        );
        assert!("nope".parse::<AuditAction>().is_err());
    }
}
