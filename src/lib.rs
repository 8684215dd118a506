//! Sensitive data detection with an encrypted findings store.
//!
//! piiguard scans files and directories for PII, PHI, PCI, and secrets,
//! classifies each file with a sensitivity label recommendation, and
//! persists findings encrypted at rest with a full audit trail.

pub mod cli;
pub mod config;
pub mod detector;
pub mod extract;
pub mod pipeline;
pub mod results;
pub mod scanner;
pub mod storage;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
