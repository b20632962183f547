//! Command-line argument definitions for the Weir service.
//!
//! This module defines the [`Args`] structure parsed from the command
//! line using [`clap`]. Arguments control persistence, configuration
//! file selection, and logging verbosity.

use clap::Parser;

/// Command-line arguments for the Weir BPMN service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory to persist diagrams to (overrides BPMN_PERSIST_DIR)
    #[arg(short, long)]
    pub persist_dir: Option<String>,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
