//! Config sources, in the order they are layered.

pub mod global_file;
pub mod workspace_file;

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment};

/// Prefix of environment overrides, e.g. `MAYLO__GUEST__TTL_SECS`
pub const ENV_PREFIX: &str = "MAYLO";

/// Add environment overrides (highest precedence).
pub fn add_environment(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("gate.public_paths")
            .with_list_parse_key("gate.public_prefixes")
            .with_list_parse_key("gate.identity_required_paths")
            .with_list_parse_key("gate.identity_required_prefixes"),
    ))
}
