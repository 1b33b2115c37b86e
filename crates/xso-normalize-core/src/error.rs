//! Error types for definitions-graph normalization.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable, machine-readable error codes.
///
/// Variant names and their serialized `snake_case` strings are part of the
/// public contract; callers map them onto their own reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorCode {
    /// JSON (de)serialization error (malformed input or invalid structure).
    JsonParseError,
    /// A `$ref` does not resolve to an existing definition.
    UnresolvedRef,
    /// A `$ref` is not a local definitions pointer.
    InvalidRef,
    /// An ancestor, `typeOf` or inlining chain exceeded `max-depth`.
    DepthExceeded,
    /// An optional optimization failed (recoverable).
    UnexpectedTransform,
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("JSON (de)serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("The reference {reference} does not exist (at {location})")]
    UnresolvedRef { reference: String, location: String },

    #[error("Invalid $ref {reference}: expected #/definitions/<name> or #/components/schemas/<name>")]
    InvalidRef { reference: String },

    #[error("Chain depth exceeded at {location} (max: {max_depth})")]
    DepthExceeded { location: String, max_depth: usize },

    #[error("An unexpected error ({message}) occurred while constructing the '{stage}'")]
    UnexpectedTransform { stage: String, message: String },
}

impl NormalizeError {
    pub(crate) fn unresolved(reference: impl Into<String>, location: impl Into<String>) -> Self {
        NormalizeError::UnresolvedRef {
            reference: reference.into(),
            location: location.into(),
        }
    }

    /// Returns the stable error code for this error variant.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            NormalizeError::JsonError(_) => ErrorCode::JsonParseError,
            NormalizeError::UnresolvedRef { .. } => ErrorCode::UnresolvedRef,
            NormalizeError::InvalidRef { .. } => ErrorCode::InvalidRef,
            NormalizeError::DepthExceeded { .. } => ErrorCode::DepthExceeded,
            NormalizeError::UnexpectedTransform { .. } => ErrorCode::UnexpectedTransform,
        }
    }

    /// Returns the graph location the error is attributed to, if any.
    pub fn location(&self) -> Option<&str> {
        match self {
            NormalizeError::UnresolvedRef { location, .. } => Some(location),
            NormalizeError::DepthExceeded { location, .. } => Some(location),
            NormalizeError::JsonError(_)
            | NormalizeError::InvalidRef { .. }
            | NormalizeError::UnexpectedTransform { .. } => None,
        }
    }

    /// Whether the pipeline may continue after this error.
    ///
    /// Only optimization failures are recoverable; everything else means the
    /// graph is structurally broken.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, NormalizeError::UnexpectedTransform { .. })
    }

    /// Produces a structured JSON error.
    ///
    /// Format: `{"code": "...", "message": "...", "location": "..." | null}`
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.error_code(),
            "message": self.to_string(),
            "location": self.location(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_code_serializes_snake_case() {
        let json = serde_json::to_value(ErrorCode::UnresolvedRef).unwrap();
        assert_eq!(json, json!("unresolved_ref"));
    }

    #[test]
    fn test_unresolved_ref_to_json_carries_reference_and_location() {
        let err = NormalizeError::unresolved("#/definitions/Missing", "#/definitions/Foo/properties/a");
        let json = err.to_json();
        assert_eq!(json["code"], json!("unresolved_ref"));
        assert_eq!(json["location"], json!("#/definitions/Foo/properties/a"));
        assert!(json["message"]
            .as_str()
            .unwrap()
            .contains("#/definitions/Missing"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_unexpected_transform_is_recoverable() {
        let err = NormalizeError::UnexpectedTransform {
            stage: "element optimization map".to_string(),
            message: "element Foo has no xml".to_string(),
        };
        assert!(err.is_recoverable());
        assert_eq!(err.location(), None);
        assert_eq!(err.error_code(), ErrorCode::UnexpectedTransform);
    }
}
