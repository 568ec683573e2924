//! Loader facade over the layered sources.

use super::merge::builder_with_defaults;
use super::sources::{self, global_file, workspace_file};
use super::MayloConfig;
use config::{ConfigError, File};
use std::path::Path;
use tracing::debug;

/// Loads [`MayloConfig`] from its sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence, lowest first: built-in defaults, the global file, the
    /// workspace files, then `MAYLO__SECTION__KEY` environment variables.
    pub fn load(workspace_root: &Path) -> Result<MayloConfig, ConfigError> {
        let builder = builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = sources::add_environment(builder)?;

        let config: MayloConfig = builder.build()?.try_deserialize()?;
        debug!(workspace = %workspace_root.display(), "Configuration loaded");
        Ok(config)
    }

    /// Load configuration from a single file layered over the defaults.
    pub fn load_from_file(path: &Path) -> Result<MayloConfig, ConfigError> {
        builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .build()?
            .try_deserialize()
    }
}
