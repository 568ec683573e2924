//! Merge rules: defaults, override order, conflict handling.

use crate::gate::GateConfig;
use crate::guest::GuestConfig;
use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
///
/// Later sources replace whole lists rather than appending to them.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let guest = GuestConfig::default();
    let gate = GateConfig::default();

    Config::builder()
        .set_default("guest.ttl_secs", guest.ttl_secs)?
        .set_default("guest.session_key", guest.session_key)?
        .set_default("guest.ttl_key", guest.ttl_key)?
        .set_default("gate.public_paths", gate.public_paths)?
        .set_default("gate.public_prefixes", gate.public_prefixes)?
        .set_default("gate.identity_required_paths", gate.identity_required_paths)?
        .set_default(
            "gate.identity_required_prefixes",
            gate.identity_required_prefixes,
        )?
        .set_default("gate.anonymous_entry_path", gate.anonymous_entry_path)?
        .set_default("gate.auth_required_path", gate.auth_required_path)?
        .set_default("gate.home_path", gate.home_path)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stderr")
}
