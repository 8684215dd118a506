use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;
use std::path::PathBuf;

use crate::cli::Output;
use crate::config::PiiguardConfig;
use crate::storage::{AuditAction, FindingFilters};

#[derive(Args)]
pub struct ExportArgs {
    /// Scan identifier to export
    pub scan_id: String,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Export a stored scan as a redacted JSON report. Raw values stay in the
/// encrypted store; this path only ever sees redacted values.
pub fn execute(args: ExportArgs, config_path: Option<&str>, output: &Output) -> Result<()> {
    let config = PiiguardConfig::load(config_path)?;
    let db = super::open_store(&config)?;

    let scan = db.get_scan(&args.scan_id)?;
    let files = db.get_files(&args.scan_id, false)?;
    let findings = db.get_findings(
        &FindingFilters {
            scan_id: Some(args.scan_id.clone()),
            include_test_data: true,
            limit: 1_000_000,
            ..Default::default()
        },
        false,
    )?;

    let report = json!({
        "scan_id": scan.scan_id,
        "started_at": scan.started_at.to_rfc3339(),
        "completed_at": scan.completed_at.map(|t| t.to_rfc3339()),
        "source_path": scan.source_path,
        "source_type": scan.source_type,
        "summary": {
            "total_files": scan.total_files,
            "files_with_matches": scan.files_with_matches,
            "files_errored": scan.files_errored,
            "total_matches": scan.total_matches,
        },
        "files": files.iter().map(|f| json!({
            "path": f.path,
            "size_bytes": f.size_bytes,
            "modified": f.modified.to_rfc3339(),
            "has_sensitive_data": f.has_sensitive_data,
            "label_recommendation": f.label_recommendation.map(|l| l.as_str()),
            "error": f.error,
            "scan_time_ms": f.scan_time_ms,
            "matches": findings.iter().filter(|m| m.file_id == f.id).map(|m| json!({
                "entity_type": m.entity_type.as_str(),
                "value": m.value_redacted,
                "confidence": m.confidence,
                "confidence_level": m.confidence_level.as_str(),
                "detector": m.detector,
                "is_test_data": m.is_test_data,
                "model_version": m.model_version,
            })).collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
    });

    let rendered = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            output.success(&format!("Wrote report to {}", path.display()));
        }
        None => println!("{rendered}"),
    }

    db.audit().log_with(
        AuditAction::DataExport,
        json!({
            "destination": args.output.as_ref().map(|p| p.display().to_string()),
            "redacted": true,
        }),
        findings.len() as u64,
        Some(&args.scan_id),
    )?;

    db.close()?;
    Ok(())
}
