//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ApiError;

/// Map domain errors to the line printed on stderr
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::NotFound(what) => format!("error: {} does not exist", what),
        ApiError::Validation(msg) => format!("error: invalid input: {}", msg),
        other => format!("error: {}", other),
    }
}
