use anyhow::Result;
use clap::Args;

use crate::cli::{Output, OutputFormat};
use crate::config::PiiguardConfig;
use crate::results::EntityType;
use crate::storage::FindingFilters;

#[derive(Args)]
pub struct FindingsArgs {
    /// Restrict to one scan
    #[arg(long)]
    pub scan_id: Option<String>,

    /// Show every finding recorded for one file path, across scans
    #[arg(long, conflicts_with_all = ["scan_id", "entity_type", "min_confidence"])]
    pub file: Option<String>,

    /// Restrict to one entity type (e.g. ssn, credit_card, email)
    #[arg(long)]
    pub entity_type: Option<EntityType>,

    /// Minimum confidence score
    #[arg(long)]
    pub min_confidence: Option<f64>,

    /// Include matches flagged as test data
    #[arg(long)]
    pub include_test_data: bool,

    /// Decrypt raw values and context (recorded in the audit log)
    #[arg(long)]
    pub decrypt: bool,

    /// Maximum findings to show
    #[arg(long, default_value = "100")]
    pub limit: usize,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

pub fn execute(args: FindingsArgs, config_path: Option<&str>, output: &Output) -> Result<()> {
    let config = PiiguardConfig::load(config_path)?;
    let db = super::open_store(&config)?;

    let findings = match &args.file {
        Some(path) => db.get_findings_by_file(path, args.decrypt)?,
        None => {
            let filters = FindingFilters {
                scan_id: args.scan_id,
                entity_type: args.entity_type,
                min_confidence: args.min_confidence,
                include_test_data: args.include_test_data,
                limit: args.limit,
            };
            db.get_findings(&filters, args.decrypt)?
        }
    };

    match args.format {
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = findings
                .iter()
                .map(|f| {
                    serde_json::json!({
                        "id": f.id,
                        "scan_id": f.scan_id,
                        "file_path": f.file_path,
                        "entity_type": f.entity_type.as_str(),
                        "value": f.value,
                        "value_redacted": f.value_redacted,
                        "confidence": f.confidence,
                        "confidence_level": f.confidence_level.as_str(),
                        "detector": f.detector,
                        "context": f.context,
                        "is_test_data": f.is_test_data,
                        "model_version": f.model_version,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Text => {
            if findings.is_empty() {
                output.info("No findings matched the filters");
            } else {
                output.header(&format!("{} findings", findings.len()));
                for f in &findings {
                    let shown = f.value.as_deref().unwrap_or(&f.value_redacted);
                    output.line(&format!(
                        "{}  {}  {}  ({:.0}% {}){}",
                        f.scan_id,
                        f.entity_type,
                        shown,
                        f.confidence * 100.0,
                        f.confidence_level,
                        if f.is_test_data { "  [test data]" } else { "" },
                    ));
                    output.verbose(&format!("  in {}", f.file_path));
                }
            }
        }
    }

    db.close()?;
    Ok(())
}
