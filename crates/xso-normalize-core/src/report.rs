//! Diagnostics returned alongside the normalized document.

use serde::{Deserialize, Serialize};

use crate::error::NormalizeError;

/// A recoverable problem: the pipeline skipped an optimization and went on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    /// The pass or construction step that gave up (e.g. "element optimization map").
    pub stage: String,
    /// Human-readable description.
    pub message: String,
}

impl Warning {
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Convert a recoverable error into a warning.
    pub(crate) fn from_error(stage: &str, error: &NormalizeError) -> Self {
        match error {
            NormalizeError::UnexpectedTransform { stage, message } => Self::new(stage, message),
            other => Self::new(stage, other.to_string()),
        }
    }
}

/// What a [`normalize`](crate::normalize) run did besides reshaping the graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizeReport {
    pub warnings: Vec<Warning>,
    /// Definitions added (hierarchy duplicates, `_nil` variants, renames).
    pub created: Vec<String>,
    /// Definitions deleted (optimized elements, merged typedefs, inlined
    /// attributes, unreachable definitions).
    pub removed: Vec<String>,
}

impl NormalizeReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
