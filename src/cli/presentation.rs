//! CLI presentation: text and json formatters per command family.

use crate::config::{MayloConfig, ValidationError};
use crate::error::ApiError;
use crate::gate::RouteOutcome;
use crate::guest::GuestState;
use serde_json::json;

fn to_json(value: &serde_json::Value) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::Runtime(format!("Failed to render output: {}", e)))
}

pub fn format_guest_state(
    active: bool,
    state: &GuestState,
    format: &str,
) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(&json!({
            "active": active,
            "primary_marker": state.primary_marker,
            "expires_at": state.expires_at.map(|t| t.to_rfc3339()),
        }));
    }
    let mut s = if active {
        "Guest session: active".to_string()
    } else {
        "Guest session: inactive".to_string()
    };
    if let Some(expires_at) = state.expires_at {
        s.push_str(&format!("\n  Fallback expires: {}", expires_at.to_rfc3339()));
    }
    Ok(s)
}

pub fn format_gate_outcome(outcome: &RouteOutcome, format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(&json!({
            "path": outcome.path,
            "decision": outcome.decision.as_str(),
            "redirect": outcome.redirect.as_ref().map(|nav| json!({
                "target": nav.target,
                "replace": true,
                "return_to": nav.return_to,
            })),
        }));
    }
    let mut s = format!("{} -> {}", outcome.path, outcome.decision.as_str());
    if let Some(nav) = &outcome.redirect {
        s.push_str(&format!("\n  Redirect (replace): {}", nav.target));
        if let Some(from) = &nav.return_to {
            s.push_str(&format!("\n  Return to: {}", from));
        }
    }
    Ok(s)
}

pub fn format_config(config: &MayloConfig, format: &str) -> Result<String, ApiError> {
    match format {
        "json" => serde_json::to_string_pretty(config)
            .map_err(|e| ApiError::Runtime(format!("Failed to render output: {}", e))),
        _ => toml::to_string_pretty(config)
            .map_err(|e| ApiError::Runtime(format!("Failed to render output: {}", e))),
    }
}

pub fn format_validation_errors(errors: &[ValidationError]) -> String {
    let mut s = format!("Configuration has {} error(s):", errors.len());
    for e in errors {
        s.push_str(&format!("\n  - {}", e));
    }
    s
}
