//! Multi-layer classification pipeline.
//!
//! Orchestrates the registered detectors, deduplicates overlapping
//! candidates, applies the optional learned true/false-positive filter, and
//! derives a sensitivity-label recommendation.

use tracing::warn;

use crate::detector::{Detector, RegexDetector};
use crate::results::{EntityType, LabelRecommendation, Match};

/// Entity types that force a stricter label when present.
const HIGH_SENSITIVITY_TYPES: &[EntityType] = &[
    EntityType::Ssn,
    EntityType::CreditCard,
    EntityType::MedicalRecordNumber,
    EntityType::HealthPlanId,
    EntityType::Cvv,
    EntityType::PrivateKey,
];

/// Verdict from the learned TP/FP filter for one match.
#[derive(Debug, Clone, Copy)]
pub struct FilterVerdict {
    pub is_false_positive: bool,
    pub confidence: f64,
}

/// Learned true/false-positive filter over match contexts.
///
/// Receives each match's entity-type-tokenized context (the matched value
/// replaced by a bracketed type token, e.g. `[SSN]`). The filter may only
/// add test-data flags, never remove one already set by a detector.
pub trait MatchFilter: Send + Sync {
    fn predict_batch(&self, contexts: &[String]) -> anyhow::Result<Vec<FilterVerdict>>;

    /// Model version recorded on relabeled matches, for traceability.
    fn version(&self) -> Option<&str> {
        None
    }
}

/// Result of classifying one text.
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    pub matches: Vec<Match>,
    pub label_recommendation: Option<LabelRecommendation>,
}

impl ClassificationResult {
    /// True if any real (non-test) sensitive data was found.
    pub fn has_sensitive_data(&self) -> bool {
        self.matches.iter().any(|m| !m.is_test_data)
    }

    /// Matches excluding test data.
    pub fn real_matches(&self) -> impl Iterator<Item = &Match> {
        self.matches.iter().filter(|m| !m.is_test_data)
    }
}

/// Orchestrates detectors and derives the label recommendation.
///
/// Stateless across calls: safe to invoke concurrently from multiple worker
/// threads scanning different files.
pub struct ClassifierPipeline {
    detectors: Vec<Box<dyn Detector>>,
    filter: Option<Box<dyn MatchFilter>>,
    filter_threshold: f64,
}

impl ClassifierPipeline {
    /// Pipeline with the built-in pattern detector only.
    pub fn new() -> anyhow::Result<Self> {
        Ok(ClassifierPipeline {
            detectors: vec![Box::new(RegexDetector::new()?)],
            filter: None,
            filter_threshold: 0.5,
        })
    }

    /// Register an auxiliary detector (e.g. a statistical NER backend).
    pub fn with_detector(mut self, detector: Box<dyn Detector>) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Attach a learned TP/FP filter with the given confidence threshold.
    pub fn with_filter(mut self, filter: Box<dyn MatchFilter>, threshold: f64) -> Self {
        self.filter = Some(filter);
        self.filter_threshold = threshold;
        self
    }

    pub fn detector_count(&self) -> usize {
        self.detectors.len()
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// Classify text content for sensitive data.
    ///
    /// A failing detector is logged and skipped; the remaining detectors'
    /// output is used alone. Only non-recoverable configuration errors
    /// propagate, and those are caught at construction time.
    pub fn classify(&self, text: &str, filename: Option<&str>) -> ClassificationResult {
        let mut candidates: Vec<Match> = Vec::new();

        for detector in &self.detectors {
            match detector.detect(text) {
                Ok(found) => candidates.extend(found),
                Err(e) => {
                    warn!(
                        detector = detector.name(),
                        file = filename.unwrap_or("<text>"),
                        "detector failed, continuing without it: {e:#}"
                    );
                }
            }
        }

        let mut matches = deduplicate(candidates);

        if let Some(filter) = &self.filter {
            self.apply_filter(filter.as_ref(), &mut matches);
        }

        let label_recommendation = recommend_label(&matches);

        ClassificationResult {
            matches,
            label_recommendation,
        }
    }

    fn apply_filter(&self, filter: &dyn MatchFilter, matches: &mut [Match]) {
        if matches.is_empty() {
            return;
        }

        let contexts: Vec<String> = matches.iter().map(tokenized_context).collect();

        let verdicts = match filter.predict_batch(&contexts) {
            Ok(v) => v,
            Err(e) => {
                warn!("TP/FP filter failed, keeping detector verdicts: {e:#}");
                return;
            }
        };

        let version = filter.version().map(str::to_string);
        for (m, verdict) in matches.iter_mut().zip(verdicts) {
            if verdict.is_false_positive && verdict.confidence >= self.filter_threshold {
                // Only ever adds the flag; detector-set flags stay.
                m.is_test_data = true;
                m.model_version = version.clone();
            }
        }
    }
}

/// Match context with the value replaced by its bracketed type token.
fn tokenized_context(m: &Match) -> String {
    m.context.replace(&m.value, &format!("[{}]", m.entity_type.token()))
}

/// Remove overlapping candidates, keeping the highest-confidence survivor.
///
/// Sort by start offset ascending, ties broken by confidence descending,
/// then sweep keeping a candidate only if it starts at or after the highest
/// end offset kept so far. The tie-break guarantees the best candidate at
/// any starting position is evaluated first, so among overlapping
/// candidates the highest-confidence one always survives.
fn deduplicate(mut candidates: Vec<Match>) -> Vec<Match> {
    if candidates.is_empty() {
        return candidates;
    }

    candidates.sort_by(|a, b| {
        a.start.cmp(&b.start).then_with(|| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    });

    let mut kept = Vec::with_capacity(candidates.len());
    let mut last_end = 0usize;

    for candidate in candidates {
        if candidate.start < last_end {
            continue;
        }
        last_end = candidate.end;
        kept.push(candidate);
    }

    kept
}

/// Label recommendation from real (non-test) matches only.
fn recommend_label(matches: &[Match]) -> Option<LabelRecommendation> {
    let real: Vec<&Match> = matches.iter().filter(|m| !m.is_test_data).collect();
    if real.is_empty() {
        return None;
    }

    let high = real
        .iter()
        .any(|m| HIGH_SENSITIVITY_TYPES.contains(&m.entity_type));
    let max_conf = real.iter().map(|m| m.confidence).fold(0.0, f64::max);

    Some(if high && max_conf >= 0.85 {
        LabelRecommendation::HighlyConfidential
    } else if high {
        LabelRecommendation::Confidential
    } else if max_conf >= 0.70 {
        LabelRecommendation::Internal
    } else {
        LabelRecommendation::Public
    })
}
