//! Core findings model: entity types, matches, per-file and per-scan results.
//!
//! These types are produced by the classification pipeline and consumed by
//! the findings store and report export. Aggregate counters on [`ScanResult`]
//! are always computed from the file list so they cannot drift out of sync
//! with the underlying data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Categories of sensitive data we detect.
///
/// The string identifiers are stable: they are used as map keys and
/// persisted verbatim in the findings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    // PII
    Ssn,
    Name,
    Email,
    Phone,
    Address,
    DateOfBirth,

    // PHI
    MedicalRecordNumber,
    HealthPlanId,
    Diagnosis,
    Medication,

    // PCI
    CreditCard,
    Cvv,
    ExpirationDate,

    // Secrets
    ApiKey,
    Password,
    PrivateKey,
}

impl EntityType {
    /// Stable string identifier, persisted verbatim.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Ssn => "ssn",
            EntityType::Name => "name",
            EntityType::Email => "email",
            EntityType::Phone => "phone",
            EntityType::Address => "address",
            EntityType::DateOfBirth => "date_of_birth",
            EntityType::MedicalRecordNumber => "medical_record_number",
            EntityType::HealthPlanId => "health_plan_id",
            EntityType::Diagnosis => "diagnosis",
            EntityType::Medication => "medication",
            EntityType::CreditCard => "credit_card",
            EntityType::Cvv => "cvv",
            EntityType::ExpirationDate => "expiration_date",
            EntityType::ApiKey => "api_key",
            EntityType::Password => "password",
            EntityType::PrivateKey => "private_key",
        }
    }

    /// Uppercase token used when a match value is replaced in tokenized
    /// context for the TP/FP filter, e.g. `[SSN]` or `[CREDIT_CARD]`.
    pub fn token(&self) -> String {
        self.as_str().to_uppercase()
    }

    /// All known entity types.
    pub fn all() -> &'static [EntityType] {
        &[
            EntityType::Ssn,
            EntityType::Name,
            EntityType::Email,
            EntityType::Phone,
            EntityType::Address,
            EntityType::DateOfBirth,
            EntityType::MedicalRecordNumber,
            EntityType::HealthPlanId,
            EntityType::Diagnosis,
            EntityType::Medication,
            EntityType::CreditCard,
            EntityType::Cvv,
            EntityType::ExpirationDate,
            EntityType::ApiKey,
            EntityType::Password,
            EntityType::PrivateKey,
        ]
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::all()
            .iter()
            .find(|e| e.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown entity type: {s}"))
    }
}

/// Confidence bands derived from a match's numeric confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ConfidenceLevel {
    /// Band boundaries: LOW < 0.70 <= MEDIUM < 0.85 <= HIGH < 0.95 <= VERY_HIGH.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.95 {
            ConfidenceLevel::VeryHigh
        } else if score >= 0.85 {
            ConfidenceLevel::High
        } else if score >= 0.70 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
            ConfidenceLevel::VeryHigh => "very_high",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sensitivity label recommendation, ordered least to most sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelRecommendation {
    Public,
    Internal,
    Confidential,
    HighlyConfidential,
}

impl LabelRecommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelRecommendation::Public => "public",
            LabelRecommendation::Internal => "internal",
            LabelRecommendation::Confidential => "confidential",
            LabelRecommendation::HighlyConfidential => "highly_confidential",
        }
    }
}

impl fmt::Display for LabelRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LabelRecommendation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(LabelRecommendation::Public),
            "internal" => Ok(LabelRecommendation::Internal),
            "confidential" => Ok(LabelRecommendation::Confidential),
            "highly_confidential" => Ok(LabelRecommendation::HighlyConfidential),
            other => Err(format!("unknown label recommendation: {other}")),
        }
    }
}

/// A single detected sensitive-data match.
///
/// `start`/`end` are half-open byte offsets into the source text. The raw
/// `value` must never appear in reports or exports; use
/// [`Match::redacted_value`] wherever a match is shown without disclosure.
#[derive(Debug, Clone)]
pub struct Match {
    pub entity_type: EntityType,
    pub value: String,
    pub start: usize,
    pub end: usize,
    /// Detection confidence in [0.0, 1.0].
    pub confidence: f64,
    /// Which detector layer produced this match ("regex", "ner", ...).
    pub detector: String,
    /// Bounded window of surrounding text, for review.
    pub context: String,
    /// True when the value is a known placeholder or the TP/FP filter
    /// predicted a false positive.
    pub is_test_data: bool,
    /// Model version, when a learned filter relabeled this match.
    pub model_version: Option<String>,
}

impl Match {
    pub fn confidence_level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_score(self.confidence)
    }

    /// Value with the interior masked: first and last two characters kept,
    /// everything in between replaced by `*`. Values of four characters or
    /// fewer are fully masked. Character-based, so multibyte text is safe.
    pub fn redacted_value(&self) -> String {
        let chars: Vec<char> = self.value.chars().collect();
        if chars.len() <= 4 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..2].iter().collect();
        let tail: String = chars[chars.len() - 2..].iter().collect();
        format!("{head}{}{tail}", "*".repeat(chars.len() - 4))
    }
}

/// Results for a single scanned file.
///
/// `error` and matches are mutually exclusive: a file that failed
/// extraction or detection carries an error message and no matches.
#[derive(Debug, Clone)]
pub struct FileResult {
    pub path: PathBuf,
    /// Where the file came from ("filesystem", "sharepoint", ...).
    pub source: String,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
    pub matches: Vec<Match>,
    pub label_recommendation: Option<LabelRecommendation>,
    pub error: Option<String>,
    pub scan_time_ms: u64,
}

impl FileResult {
    /// A file result carrying only an extraction/detection error.
    pub fn with_error(
        path: PathBuf,
        source: &str,
        size_bytes: u64,
        modified: DateTime<Utc>,
        error: String,
    ) -> Self {
        FileResult {
            path,
            source: source.to_string(),
            size_bytes,
            modified,
            matches: Vec::new(),
            label_recommendation: None,
            error: Some(error),
            scan_time_ms: 0,
        }
    }

    /// True iff at least one contained match is real (not test data).
    pub fn has_sensitive_data(&self) -> bool {
        self.matches.iter().any(|m| !m.is_test_data)
    }

    pub fn highest_confidence(&self) -> f64 {
        self.matches
            .iter()
            .map(|m| m.confidence)
            .fold(0.0, f64::max)
    }

    pub fn entity_types_found(&self) -> HashSet<EntityType> {
        self.matches.iter().map(|m| m.entity_type).collect()
    }

    /// Matches excluding test data.
    pub fn real_matches(&self) -> impl Iterator<Item = &Match> {
        self.matches.iter().filter(|m| !m.is_test_data)
    }
}

/// Complete results from one scan run.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub scan_id: String,
    pub started_at: DateTime<Utc>,
    /// Set exactly once, by [`ScanResult::complete`].
    pub completed_at: Option<DateTime<Utc>>,
    pub source_path: String,
    pub source_type: String,
    pub files: Vec<FileResult>,
}

impl ScanResult {
    pub fn new(source_path: &str, source_type: &str) -> Self {
        ScanResult {
            scan_id: uuid::Uuid::new_v4().to_string()[..8].to_string(),
            started_at: Utc::now(),
            completed_at: None,
            source_path: source_path.to_string(),
            source_type: source_type.to_string(),
            files: Vec::new(),
        }
    }

    pub fn add_file(&mut self, result: FileResult) {
        self.files.push(result);
    }

    /// Mark the scan finished. Idempotent: the completion time is set once.
    pub fn complete(&mut self) {
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn total_files(&self) -> usize {
        self.files.len()
    }

    pub fn files_with_matches(&self) -> usize {
        self.files.iter().filter(|f| f.has_sensitive_data()).count()
    }

    pub fn files_errored(&self) -> usize {
        self.files.iter().filter(|f| f.error.is_some()).count()
    }

    /// Total real (non-test) matches across all files.
    pub fn total_matches(&self) -> usize {
        self.files.iter().map(|f| f.real_matches().count()).sum()
    }

    /// Serialized representation for export and report generation.
    ///
    /// Contains only redacted match values; raw values never leave the
    /// encrypted store through this path.
    pub fn export(&self) -> serde_json::Value {
        serde_json::json!({
            "scan_id": self.scan_id,
            "started_at": self.started_at.to_rfc3339(),
            "completed_at": self.completed_at.map(|t| t.to_rfc3339()),
            "source_path": self.source_path,
            "source_type": self.source_type,
            "summary": {
                "total_files": self.total_files(),
                "files_with_matches": self.files_with_matches(),
                "files_errored": self.files_errored(),
                "total_matches": self.total_matches(),
            },
            "files": self.files.iter().map(|f| serde_json::json!({
                "path": f.path.display().to_string(),
                "size_bytes": f.size_bytes,
                "modified": f.modified.to_rfc3339(),
                "has_sensitive_data": f.has_sensitive_data(),
                "label_recommendation": f.label_recommendation.map(|l| l.as_str()),
                "error": f.error,
                "scan_time_ms": f.scan_time_ms,
                "matches": f.matches.iter().map(|m| serde_json::json!({
                    "entity_type": m.entity_type.as_str(),
                    "value": m.redacted_value(),
                    "confidence": m.confidence,
                    "confidence_level": m.confidence_level().as_str(),
                    "detector": m.detector,
                    "is_test_data": m.is_test_data,
                    "model_version": m.model_version,
                })).collect::<Vec<_>>(),
            })).collect::<Vec<_>>(),
        })
    }
}
