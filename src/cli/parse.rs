//! CLI parse: clap types for Maylo. No behavior; definitions only.

use crate::identity::Role;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Maylo CLI - guest sessions and route gating for the marketplace client
#[derive(Parser)]
#[command(name = "maylo")]
#[command(about = "Inspect and drive the Maylo client session core")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, short)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the guest session
    Guest {
        #[command(subcommand)]
        command: GuestCommands,
    },
    /// Evaluate the session gate for a destination path
    Gate {
        /// Destination path, e.g. /saved or /settings?tab=lang
        path: String,
        /// Treat the viewer as signed in with this user id
        #[arg(long)]
        user: Option<String>,
        /// Profile role of the signed-in viewer (user, provider or admin)
        #[arg(long, requires = "user")]
        role: Option<Role>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Configuration commands (show, validate)
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum GuestCommands {
    /// Start or renew a guest session
    Enable,
    /// End the guest session
    Disable,
    /// Show whether a guest session is active
    Status {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the merged configuration
    Show {
        /// Output format (toml or json)
        #[arg(long, default_value = "toml")]
        format: String,
    },
    /// Validate the merged configuration
    Validate,
}
