//! Configuration management.
//!
//! Layered with figment: built-in defaults, then an optional
//! `piiguard.toml` (or an explicit `--config` path), then `PIIGUARD_*`
//! environment variables. Nested keys use double underscores, e.g.
//! `PIIGUARD_SCANNER__MAX_FILE_SIZE_MB=25`.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Processing mode for directory scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Pick parallel or sequential based on workload size.
    Auto,
    Parallel,
    Sequential,
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PiiguardConfig {
    pub scanner: ScannerConfig,
    pub pipeline: PipelineConfig,
    pub storage: StorageConfig,
}

/// Scanner behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Skip files larger than this.
    pub max_file_size_mb: u64,

    pub follow_symlinks: bool,

    /// Directory/file name patterns skipped during the walk.
    pub exclude_patterns: Vec<String>,

    pub mode: ScanMode,

    /// Hard cap on worker threads; 0 means derive from `thread_percentage`.
    pub max_threads: usize,

    /// Share of CPU cores used when `max_threads` is 0.
    pub thread_percentage: u8,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        ScannerConfig {
            max_file_size_mb: 100,
            follow_symlinks: false,
            exclude_patterns: vec![
                "node_modules".to_string(),
                ".git".to_string(),
                "__pycache__".to_string(),
                "venv".to_string(),
                ".venv".to_string(),
                ".tox".to_string(),
                ".pytest_cache".to_string(),
                ".mypy_cache".to_string(),
                "dist".to_string(),
                "build".to_string(),
                "target".to_string(),
                "*.egg-info".to_string(),
            ],
            mode: ScanMode::Auto,
            max_threads: 0,
            thread_percentage: 75,
        }
    }
}

/// Classification pipeline knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Confidence threshold above which the TP/FP filter may flag a match.
    pub filter_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            filter_threshold: 0.5,
        }
    }
}

/// Findings store locations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Override for the per-user application data directory.
    pub data_dir: Option<PathBuf>,
}

impl PiiguardConfig {
    /// Load configuration: defaults, then config file, then environment.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(PiiguardConfig::default()));

        figment = match config_path {
            Some(path) => figment.merge(Toml::file(path)),
            None => figment.merge(Toml::file("piiguard.toml")),
        };

        figment
            .merge(Env::prefixed("PIIGUARD_").split("__"))
            .extract()
            .context("invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_sane() {
        let config = PiiguardConfig::default();
        assert_eq!(config.scanner.max_file_size_mb, 100);
        assert_eq!(config.scanner.mode, ScanMode::Auto);
        assert!(config.scanner.exclude_patterns.contains(&".git".to_string()));
        assert!((config.pipeline.filter_threshold - 0.5).abs() < f64::EPSILON);
        assert!(config.storage.data_dir.is_none());
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("piiguard.toml");
        fs::write(
            &path,
            r#"
[scanner]
max_file_size_mb = 5
mode = "sequential"

[pipeline]
filter_threshold = 0.8
"#,
        )
        .unwrap();

        let config = PiiguardConfig::load(path.to_str()).unwrap();
        assert_eq!(config.scanner.max_file_size_mb, 5);
        assert_eq!(config.scanner.mode, ScanMode::Sequential);
        assert!((config.pipeline.filter_threshold - 0.8).abs() < f64::EPSILON);
        // Untouched sections keep their defaults.
        assert_eq!(config.scanner.thread_percentage, 75);
    }

    #[test]
    fn missing_explicit_file_still_yields_defaults() {
        let config = PiiguardConfig::load(Some("/nonexistent/piiguard.toml")).unwrap();
        assert_eq!(config.scanner.max_file_size_mb, 100);
    }
}
