//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::app::{open_durable, ClientCore};
use crate::clock::SystemClock;
use crate::cli::command_name;
use crate::cli::parse::{Commands, ConfigCommands, GuestCommands};
use crate::cli::presentation::{
    format_config, format_gate_outcome, format_guest_state, format_validation_errors,
};
use crate::config::{ConfigLoader, MayloConfig};
use crate::error::ApiError;
use crate::identity::{LocalIdentity, Role};
use crate::storage::{KeyValueStorage, MemoryStorage, UnavailableStorage};
use crate::teardown::TeardownEvent;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runtime context for CLI execution: workspace, config, durable slot and the async runtime.
/// Built from workspace path and optional config path using ConfigLoader only.
pub struct RunContext {
    workspace_root: PathBuf,
    config: MayloConfig,
    durable: Arc<dyn KeyValueStorage>,
    runtime: tokio::runtime::Runtime,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        Self::with_config(workspace_root, config)
    }

    /// Create run context from an already loaded configuration.
    pub fn with_config(workspace_root: PathBuf, config: MayloConfig) -> Result<Self, ApiError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ApiError::Runtime(format!("Failed to start async runtime: {}", e)))?;
        let durable: Arc<dyn KeyValueStorage> = match open_durable(&config) {
            Ok(storage) => Arc::new(storage),
            Err(err) => {
                warn!(error = %err, "Durable storage unavailable");
                Arc::new(UnavailableStorage::new(err.to_string()))
            }
        };
        Ok(Self {
            workspace_root,
            config,
            durable,
            runtime,
        })
    }

    pub fn workspace_root(&self) -> &PathBuf {
        &self.workspace_root
    }

    pub fn config(&self) -> &MayloConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let started = Instant::now();
        let name = command_name(command);
        debug!(command = %name, "Executing command");

        let result = self.execute_inner(command);

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(command = %name, duration_ms, "Command finished"),
            Err(err) => warn!(command = %name, duration_ms, error = %err, "Command failed"),
        }
        result
    }

    fn execute_inner(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Guest { command } => self.handle_guest(command),
            Commands::Gate {
                path,
                user,
                role,
                format,
            } => self.handle_gate(path, user.as_deref(), *role, format),
            Commands::Config { command } => self.handle_config(command),
        }
    }

    /// Open a fresh context for one command: new volatile slot, shared durable
    /// slot. Close it with [`RunContext::close`].
    fn open_core(&self, user: Option<&str>, role: Option<Role>) -> Result<ClientCore, ApiError> {
        let identity = match (user, role) {
            (Some(user_id), Some(role)) => LocalIdentity::signed_in_as(user_id, role),
            (Some(user_id), None) => LocalIdentity::signed_in(user_id),
            (None, _) => LocalIdentity::anonymous(),
        };
        ClientCore::assemble(
            self.config.clone(),
            Arc::new(MemoryStorage::new()),
            self.durable.clone(),
            Arc::new(SystemClock),
            Arc::new(identity),
        )
    }

    fn close(core: ClientCore) {
        core.emit_teardown(TeardownEvent::Unload);
        core.shutdown();
    }

    fn handle_guest(&self, command: &GuestCommands) -> Result<String, ApiError> {
        let core = self.open_core(None, None)?;
        let output = match command {
            GuestCommands::Enable => {
                let nav = core.lifecycle().continue_as_guest();
                let expires = core
                    .guest()
                    .state()
                    .expires_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "unknown (durable storage unavailable)".to_string());
                Ok(format!(
                    "Guest session enabled; continue at {}\n  Fallback expires: {}",
                    nav.target, expires
                ))
            }
            GuestCommands::Disable => {
                core.guest().disable();
                Ok("Guest session ended".to_string())
            }
            GuestCommands::Status { format } => {
                let active = core.guest().is_active();
                format_guest_state(active, &core.guest().state(), format)
            }
        };
        Self::close(core);
        output
    }

    fn handle_gate(
        &self,
        path: &str,
        user: Option<&str>,
        role: Option<Role>,
        format: &str,
    ) -> Result<String, ApiError> {
        let core = self.open_core(user, role)?;
        let outcome = self.runtime.block_on(core.gate().navigate(path));
        let output = match outcome {
            Some(outcome) => format_gate_outcome(&outcome, format),
            None => Ok(format!("{} -> superseded", path)),
        };
        Self::close(core);
        output
    }

    fn handle_config(&self, command: &ConfigCommands) -> Result<String, ApiError> {
        match command {
            ConfigCommands::Show { format } => format_config(&self.config, format),
            ConfigCommands::Validate => match self.config.validate() {
                Ok(()) => Ok("Configuration is valid".to_string()),
                Err(errors) => Err(ApiError::ConfigError(format_validation_errors(&errors))),
            },
        }
    }
}
