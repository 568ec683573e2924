//! Integration tests for Configuration System

use crate::integration::test_utils::with_xdg_env;
use maylo::app::ClientCore;
use maylo::config::{ConfigLoader, MayloConfig, ValidationError};
use maylo::gate::GateDecision;
use maylo::identity::LocalIdentity;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_gate_paths_from_workspace_config() {
    let test_dir = TempDir::new().unwrap();
    let workspace = test_dir.path().join("ws");
    fs::create_dir_all(workspace.join("config")).unwrap();
    fs::write(
        workspace.join("config").join("config.toml"),
        r#"
[gate]
public_paths = ["/welcome", "/login", "/"]
identity_required_prefixes = ["/business", "/payouts"]

[storage]
durable_path = "local-store"
"#,
    )
    .unwrap();

    let config = with_xdg_env(&test_dir, || ConfigLoader::load(&workspace).unwrap());
    assert!(config.validate().is_ok());
    assert_eq!(config.gate.public_paths, vec!["/welcome", "/login", "/"]);
    assert_eq!(config.gate.public_prefixes, vec!["/auth"]);

    let mut config = config;
    config.storage.durable_path = Some(test_dir.path().join("local"));
    let core = ClientCore::from_config(config, Arc::new(LocalIdentity::anonymous())).unwrap();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    assert_eq!(runtime.block_on(core.gate().evaluate("/")), GateDecision::Allow);
    assert_eq!(
        runtime.block_on(core.gate().evaluate("/payouts/3")),
        GateDecision::RedirectToAuthRequired
    );
}

#[test]
fn test_global_file_supplies_user_defaults() {
    let test_dir = TempDir::new().unwrap();
    let workspace = test_dir.path().join("ws");
    fs::create_dir_all(&workspace).unwrap();
    let global_dir = test_dir.path().join("config-home").join("maylo");
    fs::create_dir_all(&global_dir).unwrap();
    fs::write(
        global_dir.join("config.toml"),
        "[guest]\nttl_secs = 900\n\n[logging]\nlevel = \"debug\"\n",
    )
    .unwrap();

    let config = with_xdg_env(&test_dir, || ConfigLoader::load(&workspace).unwrap());
    assert_eq!(config.guest.ttl_secs, 900);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.output, "stderr");
}

#[test]
fn test_invalid_values_are_all_reported() {
    let test_dir = TempDir::new().unwrap();
    let config_file = test_dir.path().join("maylo.toml");
    fs::write(
        &config_file,
        r#"
[guest]
ttl_secs = 0
session_key = "same"
ttl_key = "same"

[gate]
anonymous_entry_path = "/saved"

[logging]
format = "yaml"
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 3);
    assert!(matches!(errors[0], ValidationError::Guest(_)));
    assert!(matches!(errors[1], ValidationError::Gate(_)));
    assert!(matches!(errors[2], ValidationError::Logging(_)));
}

#[test]
fn test_missing_file_is_an_error() {
    let test_dir = TempDir::new().unwrap();
    let result = ConfigLoader::load_from_file(&test_dir.path().join("absent.toml"));
    assert!(result.is_err());
}

#[test]
fn test_default_round_trips_through_toml() {
    let rendered = toml::to_string_pretty(&MayloConfig::default()).unwrap();
    let parsed: MayloConfig = toml::from_str(&rendered).unwrap();
    assert_eq!(parsed.gate.public_paths, MayloConfig::default().gate.public_paths);
    assert_eq!(parsed.guest.ttl_key, "maylo_guest_ttl");
}
