use anyhow::Result;
use clap::Args;
use serde_json::json;
use std::path::PathBuf;

use crate::cli::{Output, OutputFormat};
use crate::config::{PiiguardConfig, ScanMode};
use crate::results::ScanResult;
use crate::scanner::Scanner;
use crate::storage::AuditAction;

#[derive(Args)]
pub struct ScanArgs {
    /// File or directory to scan
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Processing mode: auto (smart default), parallel, or sequential
    #[arg(long, value_enum)]
    pub mode: Option<ScanMode>,

    /// Maximum file size to scan in MB
    #[arg(long)]
    pub max_file_size: Option<u64>,

    /// Do not persist results to the findings store
    #[arg(long)]
    pub no_store: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

pub fn execute(args: ScanArgs, config_path: Option<&str>, output: &Output) -> Result<()> {
    let mut config = PiiguardConfig::load(config_path)?;
    if let Some(mode) = args.mode {
        config.scanner.mode = mode;
    }
    if let Some(mb) = args.max_file_size {
        config.scanner.max_file_size_mb = mb;
    }

    let scanner = Scanner::new(config.scanner.clone())?;
    // Keep stdout to pure JSON in machine-readable mode.
    let text_mode = args.format == OutputFormat::Text;
    if text_mode {
        output.step(&format!("Scanning {}", args.path.display()));
    }

    if args.no_store {
        let result = scanner.scan(&args.path)?;
        render(&result, args.format, output)?;
        return Ok(());
    }

    let db = super::open_store(&config)?;
    db.audit().log(
        AuditAction::ScanStart,
        json!({"path": args.path.display().to_string()}),
    )?;

    let result = scanner.scan(&args.path)?;
    let stored_rows = db.store_scan(&result)?;

    db.audit().log_with(
        AuditAction::ScanComplete,
        json!({
            "path": args.path.display().to_string(),
            "files": result.total_files(),
            "matches": result.total_matches(),
        }),
        stored_rows,
        Some(&result.scan_id),
    )?;

    render(&result, args.format, output)?;
    if text_mode {
        output.success(&format!("Stored scan {}", result.scan_id));
    }
    db.close()?;
    Ok(())
}

fn render(result: &ScanResult, format: OutputFormat, output: &Output) -> Result<()> {
    match format {
        OutputFormat::Json => {
            // Export contains only redacted values.
            println!("{}", serde_json::to_string_pretty(&result.export())?);
        }
        OutputFormat::Text => {
            output.header(&format!("Scan {}", result.scan_id));
            output.line(&format!(
                "{} files scanned, {} with sensitive data, {} errored, {} matches",
                result.total_files(),
                result.files_with_matches(),
                result.files_errored(),
                result.total_matches(),
            ));

            for file in &result.files {
                if let Some(error) = &file.error {
                    output.warning(&format!("{}: {error}", file.path.display()));
                    continue;
                }
                if !file.has_sensitive_data() {
                    continue;
                }

                let label = file
                    .label_recommendation
                    .map(|l| l.as_str())
                    .unwrap_or("none");
                output.line(&format!("{} [{label}]", file.path.display()));
                for m in file.real_matches() {
                    output.line(&format!(
                        "  {} {} ({:.0}% {})",
                        m.entity_type,
                        m.redacted_value(),
                        m.confidence * 100.0,
                        m.confidence_level(),
                    ));
                }
            }
        }
    }
    Ok(())
}
