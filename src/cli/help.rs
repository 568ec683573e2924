//! CLI command-name contract for logging and routing.

use crate::cli::parse::{Commands, ConfigCommands, GuestCommands};

/// Command name string for log records (e.g. "guest.enable", "gate").
pub fn command_name(command: &Commands) -> String {
    match command {
        Commands::Guest { command } => format!("guest.{}", guest_command_name(command)),
        Commands::Gate { .. } => "gate".to_string(),
        Commands::Config { command } => format!("config.{}", config_command_name(command)),
    }
}

pub fn guest_command_name(command: &GuestCommands) -> &'static str {
    match command {
        GuestCommands::Enable => "enable",
        GuestCommands::Disable => "disable",
        GuestCommands::Status { .. } => "status",
    }
}

pub fn config_command_name(command: &ConfigCommands) -> &'static str {
    match command {
        ConfigCommands::Show { .. } => "show",
        ConfigCommands::Validate => "validate",
    }
}
