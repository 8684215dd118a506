//! Detection layer: the `Detector` capability and the built-in
//! pattern-based detector.
//!
//! Every detector layer (pattern engine, statistical NER, ...) satisfies the
//! same contract, so any subset can be registered into the pipeline without
//! special-casing. Auxiliary detectors live outside this crate and plug in
//! through the trait.

pub mod patterns;
pub mod validators;

use anyhow::Result;

use crate::results::Match;
use patterns::{default_patterns, Pattern};

/// Produces candidate matches from raw text.
///
/// `detect` must never fail on malformed input text; absence of matches is
/// the only failure mode for bad content. A `Result` is still returned so
/// auxiliary detectors can surface initialization or backend errors, which
/// the pipeline catches per-detector.
pub trait Detector: Send + Sync {
    /// Short identifier recorded on every match this detector produces.
    fn name(&self) -> &str;

    fn detect(&self, text: &str) -> Result<Vec<Match>>;
}

/// Width of the context window captured around each match, in characters
/// per side, clipped to the text bounds.
const CONTEXT_CHARS: usize = 50;

/// Regex-based pattern detector with per-type structural validation.
pub struct RegexDetector {
    patterns: Vec<Pattern>,
}

impl RegexDetector {
    pub fn new() -> Result<Self> {
        Ok(RegexDetector {
            patterns: default_patterns()?,
        })
    }

    pub fn with_patterns(patterns: Vec<Pattern>) -> Self {
        RegexDetector { patterns }
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

impl Detector for RegexDetector {
    fn name(&self) -> &str {
        "regex"
    }

    fn detect(&self, text: &str) -> Result<Vec<Match>> {
        let mut matches = Vec::new();

        for pattern in &self.patterns {
            for m in pattern.regex.find_iter(text) {
                let value = m.as_str();

                if let Some(validate) = pattern.validator {
                    if !validate(value) {
                        continue;
                    }
                }

                matches.push(Match {
                    entity_type: pattern.entity_type,
                    value: value.to_string(),
                    start: m.start(),
                    end: m.end(),
                    confidence: pattern.confidence_base,
                    detector: self.name().to_string(),
                    context: context_window(text, m.start(), m.end()),
                    is_test_data: is_test_value(value, pattern.test_values),
                    model_version: None,
                });
            }
        }

        Ok(matches)
    }
}

/// Case/separator-normalized exact comparison against the pattern's
/// placeholder whitelist.
fn is_test_value(value: &str, test_values: &[&str]) -> bool {
    let normalized = normalize(value);
    test_values.iter().any(|t| normalize(t) == normalized)
}

fn normalize(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '-' | '.' | ' ' | '(' | ')'))
        .collect()
}

/// Text window around `[start, end)`, clipped to the text bounds.
/// Walks characters rather than bytes so multibyte text never splits.
fn context_window(text: &str, start: usize, end: usize) -> String {
    let before: String = {
        let mut chars: Vec<char> = text[..start].chars().rev().take(CONTEXT_CHARS).collect();
        chars.reverse();
        chars.into_iter().collect()
    };
    let after: String = text[end..].chars().take(CONTEXT_CHARS).collect();
    format!("{before}{}{after}", &text[start..end])
}
