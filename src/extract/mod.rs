//! Text extraction boundary.
//!
//! Per-format extraction is a collaborator concern: each adapter turns file
//! bytes into text behind the `Extractor` trait. This crate ships only the
//! plain-text adapter; word-processor, spreadsheet, and mail formats plug in
//! through the same trait. The core treats any extraction failure as "no
//! text available" and records it on the `FileResult`.

use std::path::Path;
use thiserror::Error;

/// Failed to extract text from a file. Never fatal to a scan.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid UTF-8 text")]
    NotText { path: String },

    #[error("unsupported file type: {0}")]
    Unsupported(String),
}

/// Turns file bytes into text for one family of formats.
pub trait Extractor: Send + Sync {
    /// File extensions this extractor handles (lowercase, without dot).
    fn extensions(&self) -> &[&str];

    fn extract(&self, path: &Path) -> Result<String, ExtractionError>;

    fn can_handle(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.extensions().iter().any(|e| *e == ext)
            })
            .unwrap_or(false)
    }
}

/// Plain-text family: source, config, markup, and log formats that are
/// already text on disk.
pub struct TextExtractor;

impl Extractor for TextExtractor {
    fn extensions(&self) -> &[&str] {
        &[
            "txt", "md", "markdown", "csv", "tsv", "log", "json", "xml", "yaml", "yml", "toml",
            "ini", "cfg", "conf", "html", "htm",
        ]
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        let bytes = std::fs::read(path).map_err(|source| ExtractionError::Io {
            path: path.display().to_string(),
            source,
        })?;

        String::from_utf8(bytes).map_err(|_| ExtractionError::NotText {
            path: path.display().to_string(),
        })
    }
}

/// Routes files to the appropriate extractor based on extension.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        ExtractorRegistry {
            extractors: vec![Box::new(TextExtractor)],
        }
    }

    /// Register an additional format adapter.
    pub fn register(&mut self, extractor: Box<dyn Extractor>) {
        self.extractors.push(extractor);
    }

    pub fn can_extract(&self, path: &Path) -> bool {
        self.extractors.iter().any(|e| e.can_handle(path))
    }

    pub fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        let extractor = self
            .extractors
            .iter()
            .find(|e| e.can_handle(path))
            .ok_or_else(|| {
                let suffix = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| format!(".{e}"))
                    .unwrap_or_else(|| "(no extension)".to_string());
                ExtractionError::Unsupported(suffix)
            })?;

        extractor.extract(path)
    }

    pub fn supported_extensions(&self) -> Vec<&str> {
        self.extractors
            .iter()
            .flat_map(|e| e.extensions().iter().copied())
            .collect()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
