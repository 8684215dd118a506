use anyhow::Result;
use clap::Subcommand;

use crate::cli::Output;
use crate::config::PiiguardConfig;

#[derive(Subcommand)]
pub enum ScansCommands {
    /// List stored scans, most recent first
    List {
        /// Maximum scans to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Show one scan with its files
    Show {
        /// Scan identifier
        scan_id: String,
    },
    /// Delete one scan and all of its findings
    Delete {
        /// Scan identifier
        scan_id: String,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Delete every stored scan, file, and finding
    Purge {
        /// Confirm the purge
        #[arg(long)]
        yes: bool,
    },
}

pub fn execute(cmd: ScansCommands, config_path: Option<&str>, output: &Output) -> Result<()> {
    let config = PiiguardConfig::load(config_path)?;
    let db = super::open_store(&config)?;

    match cmd {
        ScansCommands::List { limit } => {
            let scans = db.list_scans(limit)?;
            if scans.is_empty() {
                output.info("No stored scans");
            } else {
                output.header("Stored scans");
                for scan in scans {
                    output.line(&format!(
                        "{}  {}  {} files, {} matches  {}",
                        scan.scan_id,
                        scan.started_at.format("%Y-%m-%d %H:%M:%S"),
                        scan.total_files,
                        scan.total_matches,
                        scan.source_path,
                    ));
                }
            }
        }
        ScansCommands::Show { scan_id } => {
            let scan = db.get_scan(&scan_id)?;
            output.header(&format!("Scan {}", scan.scan_id));
            output.line(&format!("Source:   {} ({})", scan.source_path, scan.source_type));
            output.line(&format!("Started:  {}", scan.started_at.to_rfc3339()));
            if let Some(completed) = scan.completed_at {
                output.line(&format!("Finished: {}", completed.to_rfc3339()));
            }
            output.line(&format!(
                "Files:    {} total, {} with sensitive data, {} errored",
                scan.total_files, scan.files_with_matches, scan.files_errored,
            ));
            output.line(&format!("Matches:  {}", scan.total_matches));

            for file in db.get_files(&scan_id, false)? {
                let status = match (&file.error, file.has_sensitive_data) {
                    (Some(error), _) => format!("error: {error}"),
                    (None, true) => file
                        .label_recommendation
                        .map(|l| l.as_str().to_string())
                        .unwrap_or_else(|| "flagged".to_string()),
                    (None, false) => "clean".to_string(),
                };
                output.line(&format!("  {}  [{status}]", file.path));
            }
        }
        ScansCommands::Delete { scan_id, yes } => {
            if !yes {
                anyhow::bail!("deleting scan {scan_id} is permanent; pass --yes to confirm");
            }
            let removed = db.delete_scan(&scan_id)?;
            output.success(&format!("Deleted scan {scan_id} ({removed} findings removed)"));
        }
        ScansCommands::Purge { yes } => {
            if !yes {
                anyhow::bail!("purging the findings store is permanent; pass --yes to confirm");
            }
            let removed = db.purge_all()?;
            output.success(&format!("Purged findings store ({removed} findings removed)"));
        }
    }

    db.close()?;
    Ok(())
}
