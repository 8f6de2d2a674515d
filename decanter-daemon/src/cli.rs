//! CLI argument definitions for decanter-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Decanter telemetry collector daemon.
///
/// Runs the log socket listener, the Camel event notifier and the
/// EventAdmin collector, all publishing onto one in-process event bus.
#[derive(Parser, Debug)]
#[command(name = "decanter-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to decanter.toml configuration file.
    #[arg(short, long, default_value = "/etc/decanter/decanter.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}
