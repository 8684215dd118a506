//! Directory and file scanning.
//!
//! The scanner walks a directory tree, extracts text from each supported
//! file, and runs the classification pipeline over it. Per-file failures
//! (unreadable, too large, unsupported, not text) become error-carrying
//! file results; they never abort the scan.

mod parallel;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::{ScanMode, ScannerConfig};
use crate::extract::ExtractorRegistry;
use crate::pipeline::ClassifierPipeline;
use crate::results::{FileResult, ScanResult};

/// Below this many files a parallel scan is not worth the thread setup.
const PARALLEL_THRESHOLD: usize = 16;

/// Walks paths and classifies file contents.
pub struct Scanner {
    registry: ExtractorRegistry,
    pipeline: ClassifierPipeline,
    config: ScannerConfig,
}

impl Scanner {
    pub fn new(config: ScannerConfig) -> Result<Self> {
        Ok(Scanner {
            registry: ExtractorRegistry::new(),
            pipeline: ClassifierPipeline::new().context("failed to build classifier pipeline")?,
            config,
        })
    }

    /// Scanner with an explicit pipeline (custom detectors or filter).
    pub fn with_pipeline(config: ScannerConfig, pipeline: ClassifierPipeline) -> Self {
        Scanner {
            registry: ExtractorRegistry::new(),
            pipeline,
            config,
        }
    }

    pub fn registry_mut(&mut self) -> &mut ExtractorRegistry {
        &mut self.registry
    }

    /// Scan a file or directory tree.
    pub fn scan(&self, path: &Path) -> Result<ScanResult> {
        let mut scan = ScanResult::new(&path.display().to_string(), "filesystem");

        if path.is_file() {
            scan.add_file(self.scan_file(path));
            scan.complete();
            return Ok(scan);
        }

        if !path.is_dir() {
            anyhow::bail!("path does not exist: {}", path.display());
        }

        let files = self.collect_files(path)?;
        debug!(count = files.len(), path = %path.display(), "collected files to scan");

        let use_parallel = match self.config.mode {
            ScanMode::Parallel => true,
            ScanMode::Sequential => false,
            ScanMode::Auto => {
                files.len() >= PARALLEL_THRESHOLD && self.calculate_optimal_workers(files.len()) > 1
            }
        };

        let results = if use_parallel {
            self.scan_files_parallel(&files)?
        } else {
            files.iter().map(|p| self.scan_file(p)).collect()
        };

        for result in results {
            scan.add_file(result);
        }
        scan.complete();
        Ok(scan)
    }

    /// Collect candidate file paths, sorted so results are deterministic
    /// regardless of walk or worker ordering.
    fn collect_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let exclude = self.config.exclude_patterns.clone();
        let walker = WalkBuilder::new(path)
            .follow_links(self.config.follow_symlinks)
            .filter_entry(move |entry| {
                entry
                    .path()
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|name| !is_excluded(name, &exclude))
                    .unwrap_or(true)
            })
            .build();

        let mut files = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_some_and(|ft| ft.is_file()) {
                        files.push(entry.path().to_path_buf());
                    }
                }
                Err(e) => {
                    warn!("walk error: {e}");
                }
            }
        }
        files.sort();
        Ok(files)
    }

    /// Scan a single file. Never fails: errors are carried on the result.
    pub fn scan_file(&self, path: &Path) -> FileResult {
        let started = std::time::Instant::now();

        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                return FileResult::with_error(
                    path.to_path_buf(),
                    "filesystem",
                    0,
                    Utc::now(),
                    format!("cannot stat file: {e}"),
                );
            }
        };
        let size_bytes = metadata.len();
        let modified: DateTime<Utc> = metadata
            .modified()
            .map(DateTime::from)
            .unwrap_or_else(|_| Utc::now());

        let max_bytes = self.config.max_file_size_mb * 1024 * 1024;
        if size_bytes > max_bytes {
            return FileResult::with_error(
                path.to_path_buf(),
                "filesystem",
                size_bytes,
                modified,
                format!(
                    "file exceeds size limit ({size_bytes} bytes > {} MB)",
                    self.config.max_file_size_mb
                ),
            );
        }

        if !self.registry.can_extract(path) {
            return FileResult::with_error(
                path.to_path_buf(),
                "filesystem",
                size_bytes,
                modified,
                "unsupported file type".to_string(),
            );
        }

        let text = match self.registry.extract(path) {
            Ok(text) => text,
            Err(e) => {
                return FileResult::with_error(
                    path.to_path_buf(),
                    "filesystem",
                    size_bytes,
                    modified,
                    e.to_string(),
                );
            }
        };

        let mut result = FileResult {
            path: path.to_path_buf(),
            source: "filesystem".to_string(),
            size_bytes,
            modified,
            matches: Vec::new(),
            label_recommendation: None,
            error: None,
            scan_time_ms: 0,
        };

        if !text.is_empty() {
            let filename = path.file_name().and_then(|n| n.to_str());
            let classified = self.pipeline.classify(&text, filename);
            result.matches = classified.matches;
            result.label_recommendation = classified.label_recommendation;
        }

        result.scan_time_ms = started.elapsed().as_millis() as u64;
        result
    }
}

/// Name-based exclusion. A leading `*` makes the pattern a suffix match,
/// which covers entries like `*.egg-info`.
fn is_excluded(name: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| {
        if let Some(suffix) = p.strip_prefix('*') {
            name.ends_with(suffix)
        } else {
            name == p
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn scanner() -> Scanner {
        Scanner::new(ScannerConfig::default()).unwrap()
    }

    #[test]
    fn scans_a_directory_and_finds_sensitive_data() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("hr.txt"),
            "Employee SSN: 078-05-1120 on file.",
        )
        .unwrap();
        fs::write(dir.path().join("notes.md"), "Nothing sensitive here.").unwrap();

        let result = scanner().scan(dir.path()).unwrap();
        assert_eq!(result.total_files(), 2);
        assert_eq!(result.files_with_matches(), 1);
        assert!(result.total_matches() >= 1);
        assert!(result.completed_at.is_some());
    }

    #[test]
    fn scanning_a_single_file_works() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("contact.txt");
        fs::write(&file, "Reach me at alice@example.org please.").unwrap();

        let result = scanner().scan(&file).unwrap();
        assert_eq!(result.total_files(), 1);
        assert!(result.files[0].has_sensitive_data());
    }

    #[test]
    fn unsupported_files_become_error_results_not_failures() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("blob.bin"), [0u8, 1, 2, 3]).unwrap();

        let result = scanner().scan(dir.path()).unwrap();
        assert_eq!(result.total_files(), 1);
        assert_eq!(result.files_errored(), 1);
        assert!(result.files[0]
            .error
            .as_deref()
            .unwrap()
            .contains("unsupported"));
    }

    #[test]
    fn oversized_files_are_skipped_with_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("big.txt"), "x".repeat(2048)).unwrap();

        let mut config = ScannerConfig::default();
        config.max_file_size_mb = 0; // everything is oversized
        let result = Scanner::new(config).unwrap().scan(dir.path()).unwrap();
        assert_eq!(result.files_errored(), 1);
        assert!(result.files[0]
            .error
            .as_deref()
            .unwrap()
            .contains("size limit"));
    }

    #[test]
    fn excluded_directories_are_not_walked() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("node_modules");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("leak.txt"), "SSN 078-05-1120").unwrap();
        fs::write(dir.path().join("keep.txt"), "clean").unwrap();

        let result = scanner().scan(dir.path()).unwrap();
        assert_eq!(result.total_files(), 1);
        assert!(result.files[0].path.ends_with("keep.txt"));
    }

    #[test]
    fn exclusion_patterns_support_suffix_wildcards() {
        let patterns = vec!["node_modules".to_string(), "*.egg-info".to_string()];
        assert!(is_excluded("node_modules", &patterns));
        assert!(is_excluded("piiguard.egg-info", &patterns));
        assert!(!is_excluded("src", &patterns));
    }

    #[test]
    fn missing_path_is_an_error() {
        assert!(scanner().scan(Path::new("/nonexistent/nowhere")).is_err());
    }

    #[test]
    fn empty_files_produce_clean_results() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("empty.txt"), "").unwrap();

        let result = scanner().scan(dir.path()).unwrap();
        assert_eq!(result.total_files(), 1);
        assert!(!result.files[0].has_sensitive_data());
        assert!(result.files[0].error.is_none());
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let dir = TempDir::new().unwrap();
        for i in 0..20 {
            fs::write(
                dir.path().join(format!("f{i:02}.txt")),
                format!("file {i} card 4111111111111111 end"),
            )
            .unwrap();
        }

        let mut seq_config = ScannerConfig::default();
        seq_config.mode = ScanMode::Sequential;
        let mut par_config = ScannerConfig::default();
        par_config.mode = ScanMode::Parallel;

        let seq = Scanner::new(seq_config).unwrap().scan(dir.path()).unwrap();
        let par = Scanner::new(par_config).unwrap().scan(dir.path()).unwrap();

        assert_eq!(seq.total_files(), par.total_files());
        assert_eq!(seq.total_matches(), par.total_matches());
        let seq_paths: Vec<_> = seq.files.iter().map(|f| f.path.clone()).collect();
        let par_paths: Vec<_> = par.files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(seq_paths, par_paths);
    }
}
