//! Command-line interface.
//!
//! Uses clap derive for argument parsing. Each command lives in its own
//! module under `commands/`; this module only declares the surface and
//! dispatches.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

mod commands;
mod output;

pub use output::Output;

use commands::{audit, export, findings, key, scan, scans, stats};

/// piiguard - Sensitive data detection with an encrypted findings store
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable quiet output (minimal)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Scan a file or directory for sensitive data
    Scan(scan::ScanArgs),
    /// Manage stored scans
    #[command(subcommand)]
    Scans(scans::ScansCommands),
    /// Query stored findings
    Findings(findings::FindingsArgs),
    /// Export a stored scan as a redacted JSON report
    Export(export::ExportArgs),
    /// Encryption key management
    #[command(subcommand)]
    Key(key::KeyCommands),
    /// Inspect the audit log
    Audit(audit::AuditArgs),
    /// Show findings store statistics
    Stats,
}

/// Output format for commands that can render machine-readable results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON format
    Json,
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let output = Output::new(self.verbose, self.quiet);

        match self.command {
            Some(Commands::Scan(args)) => scan::execute(args, self.config.as_deref(), &output),
            Some(Commands::Scans(cmd)) => scans::execute(cmd, self.config.as_deref(), &output),
            Some(Commands::Findings(args)) => {
                findings::execute(args, self.config.as_deref(), &output)
            }
            Some(Commands::Export(args)) => export::execute(args, self.config.as_deref(), &output),
            Some(Commands::Key(cmd)) => key::execute(cmd, self.config.as_deref(), &output),
            Some(Commands::Audit(args)) => audit::execute(args, self.config.as_deref(), &output),
            Some(Commands::Stats) => stats::execute(self.config.as_deref(), &output),
            None => {
                let mut cmd = Cli::command();
                cmd.print_help()?;
                Ok(())
            }
        }
    }
}
