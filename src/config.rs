//! Configuration System
//!
//! Layered configuration for the client core: guest session lifetime and
//! storage keys, gate path policy, durable storage location, and logging.
//! Sources are merged by [`ConfigLoader`]; [`MayloConfig::validate`] reports
//! every problem at once.

use crate::error::ApiError;
use crate::gate::GateConfig;
use crate::guest::GuestConfig;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod facade;
mod merge;
mod sources;

pub use crate::storage::StorageConfig;
pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MayloConfig {
    /// Guest session lifetime and storage keys
    #[serde(default)]
    pub guest: GuestConfig,

    /// Route policy used by the session gate
    #[serde(default)]
    pub gate: GateConfig,

    /// Durable storage location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Guest(String),
    Gate(String),
    Storage(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Guest(msg) => write!(f, "Guest: {}", msg),
            ValidationError::Gate(msg) => write!(f, "Gate: {}", msg),
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

fn validate_logging(logging: &LoggingConfig) -> Result<(), String> {
    match logging.format.as_str() {
        "text" | "json" => {}
        other => return Err(format!("Unknown log format '{}'", other)),
    }
    match logging.output.as_str() {
        "stdout" | "stderr" => Ok(()),
        "file" if logging.file.is_some() => Ok(()),
        "file" => Err("Log output 'file' requires logging.file".to_string()),
        other => Err(format!("Unknown log output '{}'", other)),
    }
}

impl MayloConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.guest.validate() {
            errors.push(ValidationError::Guest(e));
        }
        if let Err(e) = self.gate.validate() {
            errors.push(ValidationError::Gate(e));
        }
        if let Err(e) = self.storage.validate() {
            errors.push(ValidationError::Storage(e));
        }
        if let Err(e) = validate_logging(&self.logging) {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Load and validate in one step, folding failures into [`ApiError`].
    pub fn load_validated(workspace_root: &Path) -> Result<Self, ApiError> {
        let config = ConfigLoader::load(workspace_root)
            .map_err(|e| ApiError::ConfigError(format!("Failed to load config: {}", e)))?;

        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;

        Ok(config)
    }
}
