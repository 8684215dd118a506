use anyhow::Result;

use crate::cli::Output;
use crate::config::PiiguardConfig;

pub fn execute(config_path: Option<&str>, output: &Output) -> Result<()> {
    let config = PiiguardConfig::load(config_path)?;
    let db = super::open_store(&config)?;
    let stats = db.get_stats()?;

    output.header("Findings store");
    output.line(&format!("Database: {}", db.path().display()));
    output.line(&format!("Size:     {} bytes", stats.db_size_bytes));
    output.line(&format!("Scans:    {}", stats.scans));
    output.line(&format!("Files:    {}", stats.files));
    output.line(&format!("Findings: {}", stats.findings));

    if !stats.by_entity_type.is_empty() {
        output.line("By entity type:");
        for (entity, count) in &stats.by_entity_type {
            output.line(&format!("  {entity}: {count}"));
        }
    }
    if !stats.by_label.is_empty() {
        output.line("By label recommendation:");
        for (label, count) in &stats.by_label {
            output.line(&format!("  {label}: {count}"));
        }
    }

    db.close()?;
    Ok(())
}
