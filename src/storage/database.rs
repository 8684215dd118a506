//! SQLite findings store with field-level encryption.
//!
//! Three tables: `scans` (one row per run), `files` (one row per scanned
//! file), `matches` (one row per detected match). Raw match values and
//! context windows are encrypted before insertion; the redacted value is
//! stored alongside in plaintext so listings never need the key. Every
//! read and mutation is recorded in the audit log.

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, ToSql};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::results::{ConfidenceLevel, EntityType, LabelRecommendation, ScanResult};

use super::audit::{AuditAction, AuditLog};
use super::crypto::Encryptor;
use super::StorageError;

/// Persisted scan row with its frozen summary counters.
#[derive(Debug, Clone)]
pub struct StoredScan {
    pub scan_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub source_path: String,
    pub source_type: String,
    pub total_files: u64,
    pub files_with_matches: u64,
    pub files_errored: u64,
    pub total_matches: u64,
}

/// Persisted per-file row.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub id: i64,
    pub scan_id: String,
    pub path: String,
    pub source: String,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
    pub has_sensitive_data: bool,
    pub label_recommendation: Option<LabelRecommendation>,
    pub error: Option<String>,
    pub scan_time_ms: u64,
}

/// Persisted match row.
///
/// `value` and `context` are `None` unless the caller asked for decryption;
/// `value_redacted` is always available.
#[derive(Debug, Clone)]
pub struct StoredFinding {
    pub id: i64,
    pub file_id: i64,
    pub scan_id: String,
    pub file_path: String,
    pub entity_type: EntityType,
    pub value: Option<String>,
    pub value_redacted: String,
    pub start_pos: u64,
    pub end_pos: u64,
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    pub detector: String,
    pub context: Option<String>,
    pub is_test_data: bool,
    pub model_version: Option<String>,
}

/// Query filters for reading findings back.
#[derive(Debug, Clone, Default)]
pub struct FindingFilters {
    pub scan_id: Option<String>,
    pub entity_type: Option<EntityType>,
    pub min_confidence: Option<f64>,
    pub include_test_data: bool,
    /// Maximum rows returned; 0 means the default of 1000.
    pub limit: usize,
}

/// Aggregate counts over the whole store.
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub scans: u64,
    pub files: u64,
    pub findings: u64,
    pub by_entity_type: BTreeMap<String, u64>,
    pub by_label: BTreeMap<String, u64>,
    pub db_size_bytes: u64,
}

/// Encrypted SQLite store for scan results.
pub struct FindingsDatabase {
    conn: Mutex<Connection>,
    encryptor: Encryptor,
    audit: AuditLog,
    db_path: PathBuf,
}

impl FindingsDatabase {
    /// Open (or create) the store at an explicit location.
    pub fn open_at(
        db_path: PathBuf,
        audit_path: PathBuf,
        encryptor: Encryptor,
    ) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let existed = db_path.exists();
        let conn = Connection::open(&db_path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Self::create_schema(&conn)?;

        let audit = AuditLog::new(audit_path)?;
        let action = if existed {
            AuditAction::DbOpen
        } else {
            AuditAction::DbCreate
        };
        audit.log(action, json!({"db_path": db_path.display().to_string()}))?;

        debug!(path = %db_path.display(), created = !existed, "findings database ready");

        Ok(FindingsDatabase {
            conn: Mutex::new(conn),
            encryptor,
            audit,
            db_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    fn create_schema(conn: &Connection) -> Result<(), StorageError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS scans (
                scan_id             TEXT PRIMARY KEY,
                started_at          TEXT NOT NULL,
                completed_at        TEXT,
                source_path         TEXT NOT NULL,
                source_type         TEXT NOT NULL,
                total_files         INTEGER NOT NULL,
                files_with_matches  INTEGER NOT NULL,
                files_errored       INTEGER NOT NULL,
                total_matches       INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS files (
                id                   INTEGER PRIMARY KEY AUTOINCREMENT,
                scan_id              TEXT NOT NULL REFERENCES scans(scan_id),
                path                 TEXT NOT NULL,
                source               TEXT NOT NULL,
                size_bytes           INTEGER NOT NULL,
                modified             TEXT NOT NULL,
                has_sensitive_data   INTEGER NOT NULL,
                label_recommendation TEXT,
                error                TEXT,
                scan_time_ms         INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS matches (
                id                INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id           INTEGER NOT NULL REFERENCES files(id),
                scan_id           TEXT NOT NULL REFERENCES scans(scan_id),
                entity_type       TEXT NOT NULL,
                value_encrypted   TEXT NOT NULL,
                value_redacted    TEXT NOT NULL,
                start_pos         INTEGER NOT NULL,
                end_pos           INTEGER NOT NULL,
                confidence        REAL NOT NULL,
                confidence_level  TEXT NOT NULL,
                detector          TEXT NOT NULL,
                context_encrypted TEXT NOT NULL,
                is_test_data      INTEGER NOT NULL,
                model_version     TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_files_scan    ON files(scan_id);
            CREATE INDEX IF NOT EXISTS idx_matches_scan  ON matches(scan_id);
            CREATE INDEX IF NOT EXISTS idx_matches_file  ON matches(file_id);
            CREATE INDEX IF NOT EXISTS idx_matches_entity ON matches(entity_type);
            "#,
        )?;
        Ok(())
    }

    /// Persist a complete scan in one transaction.
    ///
    /// Returns the number of match rows written (test-data matches
    /// included; the scan's summary counters count only real matches).
    pub fn store_scan(&self, scan: &ScanResult) -> Result<u64, StorageError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO scans (scan_id, started_at, completed_at, source_path, source_type,
                                total_files, files_with_matches, files_errored, total_matches)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                scan.scan_id,
                scan.started_at.to_rfc3339(),
                scan.completed_at.map(|t| t.to_rfc3339()),
                scan.source_path,
                scan.source_type,
                scan.total_files() as i64,
                scan.files_with_matches() as i64,
                scan.files_errored() as i64,
                scan.total_matches() as i64,
            ],
        )?;

        let mut match_rows: u64 = 0;
        for file in &scan.files {
            tx.execute(
                "INSERT INTO files (scan_id, path, source, size_bytes, modified,
                                    has_sensitive_data, label_recommendation, error, scan_time_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    scan.scan_id,
                    file.path.display().to_string(),
                    file.source,
                    file.size_bytes as i64,
                    file.modified.to_rfc3339(),
                    file.has_sensitive_data(),
                    file.label_recommendation.map(|l| l.as_str()),
                    file.error,
                    file.scan_time_ms as i64,
                ],
            )?;
            let file_id = tx.last_insert_rowid();

            for m in &file.matches {
                tx.execute(
                    "INSERT INTO matches (file_id, scan_id, entity_type, value_encrypted,
                                          value_redacted, start_pos, end_pos, confidence,
                                          confidence_level, detector, context_encrypted,
                                          is_test_data, model_version)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                    params![
                        file_id,
                        scan.scan_id,
                        m.entity_type.as_str(),
                        self.encryptor.encrypt(&m.value)?,
                        m.redacted_value(),
                        m.start as i64,
                        m.end as i64,
                        m.confidence,
                        m.confidence_level().as_str(),
                        m.detector,
                        self.encryptor.encrypt(&m.context)?,
                        m.is_test_data,
                        m.model_version,
                    ],
                )?;
                match_rows += 1;
            }
        }

        tx.commit()?;
        drop(conn);

        self.audit.log_with(
            AuditAction::FindingStore,
            json!({
                "source_path": scan.source_path,
                "files": scan.total_files(),
            }),
            match_rows,
            Some(&scan.scan_id),
        )?;

        Ok(match_rows)
    }

    /// Fetch one scan by id.
    pub fn get_scan(&self, scan_id: &str) -> Result<StoredScan, StorageError> {
        let conn = self.conn.lock().unwrap();
        let scan = conn
            .query_row(
                "SELECT scan_id, started_at, completed_at, source_path, source_type,
                        total_files, files_with_matches, files_errored, total_matches
                 FROM scans WHERE scan_id = ?1",
                params![scan_id],
                row_to_scan,
            )
            .optional()?
            .ok_or_else(|| StorageError::ScanNotFound(scan_id.to_string()))?;
        drop(conn);

        self.audit.log_with(
            AuditAction::FindingRead,
            json!({"what": "scan"}),
            1,
            Some(scan_id),
        )?;
        Ok(scan)
    }

    /// Most recent scans first.
    pub fn list_scans(&self, limit: usize) -> Result<Vec<StoredScan>, StorageError> {
        let limit = if limit == 0 { 50 } else { limit };
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT scan_id, started_at, completed_at, source_path, source_type,
                    total_files, files_with_matches, files_errored, total_matches
             FROM scans ORDER BY started_at DESC LIMIT ?1",
        )?;
        let scans = stmt
            .query_map(params![limit as i64], row_to_scan)?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);
        drop(conn);

        self.audit.log_with(
            AuditAction::FindingRead,
            json!({"what": "scan_list"}),
            scans.len() as u64,
            None,
        )?;
        Ok(scans)
    }

    /// File rows for a scan, in insertion order. `only_with_matches`
    /// restricts to files where real sensitive data was found.
    pub fn get_files(
        &self,
        scan_id: &str,
        only_with_matches: bool,
    ) -> Result<Vec<StoredFile>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let sql = if only_with_matches {
            "SELECT id, scan_id, path, source, size_bytes, modified,
                    has_sensitive_data, label_recommendation, error, scan_time_ms
             FROM files WHERE scan_id = ?1 AND has_sensitive_data = 1 ORDER BY id"
        } else {
            "SELECT id, scan_id, path, source, size_bytes, modified,
                    has_sensitive_data, label_recommendation, error, scan_time_ms
             FROM files WHERE scan_id = ?1 ORDER BY id"
        };
        let mut stmt = conn.prepare(sql)?;
        let files = stmt
            .query_map(params![scan_id], row_to_file)?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);
        drop(conn);

        self.audit.log_with(
            AuditAction::FindingRead,
            json!({"what": "files"}),
            files.len() as u64,
            Some(scan_id),
        )?;
        Ok(files)
    }

    /// Query findings with optional filters.
    ///
    /// When `decrypt` is false the raw value and context stay out of the
    /// result entirely; only the redacted value is populated.
    pub fn get_findings(
        &self,
        filters: &FindingFilters,
        decrypt: bool,
    ) -> Result<Vec<StoredFinding>, StorageError> {
        let limit = if filters.limit == 0 { 1000 } else { filters.limit };

        let mut sql = String::from(
            "SELECT m.id, m.file_id, m.scan_id, f.path, m.entity_type, m.value_encrypted,
                    m.value_redacted, m.start_pos, m.end_pos, m.confidence,
                    m.detector, m.context_encrypted, m.is_test_data, m.model_version
             FROM matches m JOIN files f ON f.id = m.file_id
             WHERE 1=1",
        );
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(scan_id) = &filters.scan_id {
            sql.push_str(" AND m.scan_id = ?");
            params.push(Box::new(scan_id.clone()));
        }
        if let Some(entity_type) = filters.entity_type {
            sql.push_str(" AND m.entity_type = ?");
            params.push(Box::new(entity_type.as_str().to_string()));
        }
        if let Some(min) = filters.min_confidence {
            sql.push_str(" AND m.confidence >= ?");
            params.push(Box::new(min));
        }
        if !filters.include_test_data {
            sql.push_str(" AND m.is_test_data = 0");
        }
        sql.push_str(" ORDER BY m.confidence DESC, m.id LIMIT ?");
        params.push(Box::new(limit as i64));

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter().map(|p| p.as_ref())), |row| {
                Ok(RawFindingRow {
                    id: row.get(0)?,
                    file_id: row.get(1)?,
                    scan_id: row.get(2)?,
                    file_path: row.get(3)?,
                    entity_type: row.get(4)?,
                    value_encrypted: row.get(5)?,
                    value_redacted: row.get(6)?,
                    start_pos: row.get(7)?,
                    end_pos: row.get(8)?,
                    confidence: row.get(9)?,
                    detector: row.get(10)?,
                    context_encrypted: row.get(11)?,
                    is_test_data: row.get(12)?,
                    model_version: row.get(13)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);
        drop(conn);

        let mut findings = Vec::with_capacity(rows.len());
        for row in rows {
            findings.push(self.finish_finding(row, decrypt)?);
        }

        self.audit.log_with(
            AuditAction::FindingRead,
            json!({
                "what": "findings",
                "decrypted": decrypt,
                "entity_type": filters.entity_type.map(|e| e.as_str()),
            }),
            findings.len() as u64,
            filters.scan_id.as_deref(),
        )?;
        Ok(findings)
    }

    /// All findings recorded for one file path, across scans, ordered by
    /// scan then position.
    pub fn get_findings_by_file(
        &self,
        path: &str,
        decrypt: bool,
    ) -> Result<Vec<StoredFinding>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT m.id, m.file_id, m.scan_id, f.path, m.entity_type, m.value_encrypted,
                    m.value_redacted, m.start_pos, m.end_pos, m.confidence,
                    m.detector, m.context_encrypted, m.is_test_data, m.model_version
             FROM matches m JOIN files f ON f.id = m.file_id
             WHERE f.path = ?1 ORDER BY m.scan_id, m.start_pos",
        )?;
        let rows = stmt
            .query_map(params![path], |row| {
                Ok(RawFindingRow {
                    id: row.get(0)?,
                    file_id: row.get(1)?,
                    scan_id: row.get(2)?,
                    file_path: row.get(3)?,
                    entity_type: row.get(4)?,
                    value_encrypted: row.get(5)?,
                    value_redacted: row.get(6)?,
                    start_pos: row.get(7)?,
                    end_pos: row.get(8)?,
                    confidence: row.get(9)?,
                    detector: row.get(10)?,
                    context_encrypted: row.get(11)?,
                    is_test_data: row.get(12)?,
                    model_version: row.get(13)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);
        drop(conn);

        let mut findings = Vec::with_capacity(rows.len());
        for row in rows {
            findings.push(self.finish_finding(row, decrypt)?);
        }

        self.audit.log_with(
            AuditAction::FindingRead,
            json!({"what": "file_findings", "path": path, "decrypted": decrypt}),
            findings.len() as u64,
            None,
        )?;
        Ok(findings)
    }

    fn finish_finding(
        &self,
        row: RawFindingRow,
        decrypt: bool,
    ) -> Result<StoredFinding, StorageError> {
        let (value, context) = if decrypt {
            (
                Some(self.encryptor.decrypt(&row.value_encrypted)?),
                Some(self.encryptor.decrypt(&row.context_encrypted)?),
            )
        } else {
            (None, None)
        };

        Ok(StoredFinding {
            id: row.id,
            file_id: row.file_id,
            scan_id: row.scan_id,
            file_path: row.file_path,
            entity_type: parse_persisted(&row.entity_type)?,
            value,
            value_redacted: row.value_redacted,
            start_pos: row.start_pos as u64,
            end_pos: row.end_pos as u64,
            confidence: row.confidence,
            confidence_level: ConfidenceLevel::from_score(row.confidence),
            detector: row.detector,
            context,
            is_test_data: row.is_test_data,
            model_version: row.model_version,
        })
    }

    /// Delete one scan and everything under it. Returns the number of
    /// match rows removed.
    pub fn delete_scan(&self, scan_id: &str) -> Result<u64, StorageError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let exists: bool = tx
            .query_row(
                "SELECT 1 FROM scans WHERE scan_id = ?1",
                params![scan_id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if !exists {
            return Err(StorageError::ScanNotFound(scan_id.to_string()));
        }

        // Children first, so the foreign keys stay satisfied.
        let matches_deleted =
            tx.execute("DELETE FROM matches WHERE scan_id = ?1", params![scan_id])?;
        tx.execute("DELETE FROM files WHERE scan_id = ?1", params![scan_id])?;
        tx.execute("DELETE FROM scans WHERE scan_id = ?1", params![scan_id])?;
        tx.commit()?;
        drop(conn);

        self.audit.log_with(
            AuditAction::FindingDelete,
            json!({"what": "scan"}),
            matches_deleted as u64,
            Some(scan_id),
        )?;
        Ok(matches_deleted as u64)
    }

    /// Remove every scan, file, and match. Returns the number of match
    /// rows removed.
    pub fn purge_all(&self) -> Result<u64, StorageError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let matches_deleted = tx.execute("DELETE FROM matches", [])?;
        tx.execute("DELETE FROM files", [])?;
        tx.execute("DELETE FROM scans", [])?;
        tx.commit()?;
        drop(conn);

        self.audit.log_with(
            AuditAction::FindingDelete,
            json!({"what": "purge_all"}),
            matches_deleted as u64,
            None,
        )?;
        Ok(matches_deleted as u64)
    }

    /// Aggregate counts over the whole store.
    pub fn get_stats(&self) -> Result<StoreStats, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stats = StoreStats {
            scans: conn.query_row("SELECT COUNT(*) FROM scans", [], |r| r.get::<_, i64>(0))? as u64,
            files: conn.query_row("SELECT COUNT(*) FROM files", [], |r| r.get::<_, i64>(0))? as u64,
            findings: conn.query_row("SELECT COUNT(*) FROM matches WHERE is_test_data = 0", [], |r| {
                r.get::<_, i64>(0)
            })? as u64,
            ..Default::default()
        };

        let mut stmt = conn.prepare(
            "SELECT entity_type, COUNT(*) FROM matches WHERE is_test_data = 0 GROUP BY entity_type",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (entity, count) = row?;
            stats.by_entity_type.insert(entity, count as u64);
        }
        drop(stmt);

        let mut stmt = conn.prepare(
            "SELECT label_recommendation, COUNT(*) FROM files
             WHERE label_recommendation IS NOT NULL GROUP BY label_recommendation",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (label, count) = row?;
            stats.by_label.insert(label, count as u64);
        }
        drop(stmt);
        drop(conn);

        stats.db_size_bytes = std::fs::metadata(&self.db_path).map(|m| m.len()).unwrap_or(0);
        Ok(stats)
    }

    /// Close the store, recording the closure in the audit log.
    pub fn close(self) -> Result<(), StorageError> {
        self.audit.log(
            AuditAction::DbClose,
            json!({"db_path": self.db_path.display().to_string()}),
        )?;
        Ok(())
    }
}

struct RawFindingRow {
    id: i64,
    file_id: i64,
    scan_id: String,
    file_path: String,
    entity_type: String,
    value_encrypted: String,
    value_redacted: String,
    start_pos: i64,
    end_pos: i64,
    confidence: f64,
    detector: String,
    context_encrypted: String,
    is_test_data: bool,
    model_version: Option<String>,
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_persisted<T: std::str::FromStr<Err = String>>(raw: &str) -> Result<T, StorageError> {
    raw.parse::<T>().map_err(|_| {
        StorageError::Database(rusqlite::Error::InvalidColumnType(
            0,
            raw.to_string(),
            rusqlite::types::Type::Text,
        ))
    })
}

fn row_to_scan(row: &rusqlite::Row<'_>) -> Result<StoredScan, rusqlite::Error> {
    let started_raw: String = row.get(1)?;
    let completed_raw: Option<String> = row.get(2)?;
    Ok(StoredScan {
        scan_id: row.get(0)?,
        started_at: parse_timestamp(&started_raw)?,
        completed_at: completed_raw.as_deref().map(parse_timestamp).transpose()?,
        source_path: row.get(3)?,
        source_type: row.get(4)?,
        total_files: row.get::<_, i64>(5)? as u64,
        files_with_matches: row.get::<_, i64>(6)? as u64,
        files_errored: row.get::<_, i64>(7)? as u64,
        total_matches: row.get::<_, i64>(8)? as u64,
    })
}

fn row_to_file(row: &rusqlite::Row<'_>) -> Result<StoredFile, rusqlite::Error> {
    let modified_raw: String = row.get(5)?;
    let label_raw: Option<String> = row.get(7)?;
    Ok(StoredFile {
        id: row.get(0)?,
        scan_id: row.get(1)?,
        path: row.get(2)?,
        source: row.get(3)?,
        size_bytes: row.get::<_, i64>(4)? as u64,
        modified: parse_timestamp(&modified_raw)?,
        has_sensitive_data: row.get(6)?,
        label_recommendation: label_raw
            .as_deref()
            .map(|raw| {
                raw.parse::<LabelRecommendation>().map_err(|_| {
                    rusqlite::Error::InvalidColumnType(
                        7,
                        raw.to_string(),
                        rusqlite::types::Type::Text,
                    )
                })
            })
            .transpose()?,
        error: row.get(8)?,
        scan_time_ms: row.get::<_, i64>(9)? as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{FileResult, Match};
    use crate::storage::audit::AuditFilter;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn open_db(dir: &TempDir) -> FindingsDatabase {
        let encryptor = Encryptor::new(&[0x42; 32]).unwrap();
        FindingsDatabase::open_at(
            dir.path().join("findings.db"),
            dir.path().join("findings.audit.jsonl"),
            encryptor,
        )
        .unwrap()
    }

    fn sample_match(value: &str, entity_type: EntityType, confidence: f64) -> Match {
        Match {
            entity_type,
            value: value.to_string(),
            start: 10,
            end: 10 + value.len(),
            confidence,
            detector: "regex".to_string(),
            context: format!("context around {value} here"),
            is_test_data: false,
            model_version: None,
        }
    }

    fn sample_scan() -> ScanResult {
        let mut scan = ScanResult::new("/docs", "filesystem");
        let mut file = FileResult {
            path: PathBuf::from("/docs/report.txt"),
            source: "filesystem".to_string(),
            size_bytes: 512,
            modified: Utc::now(),
            matches: vec![
                sample_match("078-05-1120", EntityType::Ssn, 0.75),
                sample_match("alice@example.org", EntityType::Email, 0.90),
            ],
            label_recommendation: Some(LabelRecommendation::HighlyConfidential),
            error: None,
            scan_time_ms: 12,
        };
        file.matches.push(Match {
            is_test_data: true,
            ..sample_match("123-45-6789", EntityType::Ssn, 0.75)
        });
        scan.add_file(file);
        scan.complete();
        scan
    }

    #[test]
    fn store_and_read_back_a_scan() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);

        let scan = sample_scan();
        let stored = db.store_scan(&scan).unwrap();
        assert_eq!(stored, 3); // all rows, test data included

        let loaded = db.get_scan(&scan.scan_id).unwrap();
        assert_eq!(loaded.total_files, 1);
        assert_eq!(loaded.files_with_matches, 1);
        assert_eq!(loaded.total_matches, 2); // real matches only
        assert!(loaded.completed_at.is_some());

        let files = db.get_files(&scan.scan_id, false).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(
            files[0].label_recommendation,
            Some(LabelRecommendation::HighlyConfidential)
        );
    }

    #[test]
    fn get_files_can_restrict_to_flagged_files() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let mut scan = sample_scan();
        scan.files.push(FileResult {
            path: PathBuf::from("/docs/clean.txt"),
            source: "filesystem".to_string(),
            size_bytes: 10,
            modified: Utc::now(),
            matches: vec![],
            label_recommendation: None,
            error: None,
            scan_time_ms: 1,
        });
        db.store_scan(&scan).unwrap();

        assert_eq!(db.get_files(&scan.scan_id, false).unwrap().len(), 2);
        let flagged = db.get_files(&scan.scan_id, true).unwrap();
        assert_eq!(flagged.len(), 1);
        assert!(flagged[0].path.ends_with("report.txt"));
    }

    #[test]
    fn findings_are_queryable_by_file_path() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        db.store_scan(&sample_scan()).unwrap();

        let findings = db
            .get_findings_by_file("/docs/report.txt", true)
            .unwrap();
        assert_eq!(findings.len(), 3); // test-data rows included
        assert!(findings
            .iter()
            .any(|f| f.value.as_deref() == Some("078-05-1120")));

        assert!(db
            .get_findings_by_file("/docs/other.txt", false)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn raw_values_are_encrypted_at_rest() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let scan = sample_scan();
        db.store_scan(&scan).unwrap();

        let conn = Connection::open(dir.path().join("findings.db")).unwrap();
        let mut stmt = conn
            .prepare("SELECT value_encrypted, value_redacted FROM matches")
            .unwrap();
        let rows: Vec<(String, String)> = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert!(!rows.is_empty());
        for (encrypted, redacted) in rows {
            assert!(!encrypted.contains("078-05-1120"));
            assert!(!encrypted.contains("alice@example.org"));
            assert!(redacted.contains('*'));
        }
    }

    #[test]
    fn findings_decrypt_only_on_request() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let scan = sample_scan();
        db.store_scan(&scan).unwrap();

        let filters = FindingFilters {
            scan_id: Some(scan.scan_id.clone()),
            ..Default::default()
        };

        let redacted = db.get_findings(&filters, false).unwrap();
        assert_eq!(redacted.len(), 2); // test data excluded by default
        assert!(redacted.iter().all(|f| f.value.is_none()));
        assert!(redacted.iter().all(|f| f.context.is_none()));
        assert!(redacted.iter().all(|f| f.value_redacted.contains('*')));

        let decrypted = db.get_findings(&filters, true).unwrap();
        let values: Vec<&str> = decrypted
            .iter()
            .filter_map(|f| f.value.as_deref())
            .collect();
        assert!(values.contains(&"078-05-1120"));
        assert!(values.contains(&"alice@example.org"));
    }

    #[test]
    fn finding_filters_narrow_results() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let scan = sample_scan();
        db.store_scan(&scan).unwrap();

        let ssn_only = db
            .get_findings(
                &FindingFilters {
                    entity_type: Some(EntityType::Ssn),
                    ..Default::default()
                },
                false,
            )
            .unwrap();
        assert_eq!(ssn_only.len(), 1);

        let with_test = db
            .get_findings(
                &FindingFilters {
                    entity_type: Some(EntityType::Ssn),
                    include_test_data: true,
                    ..Default::default()
                },
                false,
            )
            .unwrap();
        assert_eq!(with_test.len(), 2);

        let high_conf = db
            .get_findings(
                &FindingFilters {
                    min_confidence: Some(0.85),
                    ..Default::default()
                },
                false,
            )
            .unwrap();
        assert_eq!(high_conf.len(), 1);
        assert_eq!(high_conf[0].entity_type, EntityType::Email);
    }

    #[test]
    fn delete_scan_removes_everything_and_reports_count() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let scan = sample_scan();
        db.store_scan(&scan).unwrap();

        let deleted = db.delete_scan(&scan.scan_id).unwrap();
        assert_eq!(deleted, 3);

        assert!(matches!(
            db.get_scan(&scan.scan_id),
            Err(StorageError::ScanNotFound(_))
        ));
        assert!(db.list_scans(0).unwrap().is_empty());
    }

    #[test]
    fn deleting_unknown_scan_is_not_found() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        assert!(matches!(
            db.delete_scan("nope"),
            Err(StorageError::ScanNotFound(_))
        ));
    }

    #[test]
    fn stats_count_real_findings_by_type() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        db.store_scan(&sample_scan()).unwrap();

        let stats = db.get_stats().unwrap();
        assert_eq!(stats.scans, 1);
        assert_eq!(stats.files, 1);
        assert_eq!(stats.findings, 2);
        assert_eq!(stats.by_entity_type.get("ssn"), Some(&1));
        assert_eq!(stats.by_entity_type.get("email"), Some(&1));
        assert_eq!(stats.by_label.get("highly_confidential"), Some(&1));
        assert!(stats.db_size_bytes > 0);
    }

    #[test]
    fn purge_empties_the_store() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        db.store_scan(&sample_scan()).unwrap();

        let removed = db.purge_all().unwrap();
        assert_eq!(removed, 3);
        assert_eq!(db.get_stats().unwrap().scans, 0);
    }

    #[test]
    fn every_access_leaves_an_audit_trail() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let scan = sample_scan();
        db.store_scan(&scan).unwrap();
        db.get_findings(&FindingFilters::default(), true).unwrap();
        db.delete_scan(&scan.scan_id).unwrap();

        let entries = db.audit().get_entries(&AuditFilter::default()).unwrap();
        let actions: Vec<AuditAction> = entries.iter().map(|e| e.action).collect();
        assert!(actions.contains(&AuditAction::DbCreate));
        assert!(actions.contains(&AuditAction::FindingStore));
        assert!(actions.contains(&AuditAction::FindingRead));
        assert!(actions.contains(&AuditAction::FindingDelete));
    }

    #[test]
    fn store_and_delete_audit_entries_carry_matching_record_counts() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let scan = sample_scan(); // 3 match rows
        db.store_scan(&scan).unwrap();
        db.delete_scan(&scan.scan_id).unwrap();

        let stores = db
            .audit()
            .get_entries(&AuditFilter {
                action: Some(AuditAction::FindingStore),
                ..Default::default()
            })
            .unwrap();
        let deletes = db
            .audit()
            .get_entries(&AuditFilter {
                action: Some(AuditAction::FindingDelete),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(stores.len(), 1);
        assert_eq!(deletes.len(), 1);
        assert_eq!(stores[0].record_count, 3);
        assert_eq!(deletes[0].record_count, stores[0].record_count);
        assert_eq!(stores[0].scan_id.as_deref(), Some(scan.scan_id.as_str()));
        assert_eq!(deletes[0].scan_id.as_deref(), Some(scan.scan_id.as_str()));
    }
}
