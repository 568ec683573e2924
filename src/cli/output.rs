//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ApiError;

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::Unauthenticated => "Not signed in. Pass --user to act as a viewer.".to_string(),
        other => other.to_string(),
    }
}
