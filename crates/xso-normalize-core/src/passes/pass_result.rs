//! Shared result type for rewrite passes.
//!
//! Every pass mutates the document in place and returns a `PassResult`
//! listing the definitions it added or deleted and any recoverable warnings.

use crate::report::{NormalizeReport, Warning};

/// Unified result of a single rewrite pass.
#[derive(Debug, Default)]
pub struct PassResult {
    pub warnings: Vec<Warning>,
    pub created: Vec<String>,
    pub removed: Vec<String>,
}

impl PassResult {
    /// A pass that neither added nor deleted definitions.
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn with_created(created: Vec<String>) -> Self {
        Self {
            created,
            ..Self::default()
        }
    }

    pub fn with_removed(removed: Vec<String>) -> Self {
        Self {
            removed,
            ..Self::default()
        }
    }

    /// Fold another result (e.g. from a sub-pass) into this one.
    pub fn absorb(&mut self, other: PassResult) {
        self.warnings.extend(other.warnings);
        self.created.extend(other.created);
        self.removed.extend(other.removed);
    }

    /// Move this pass's bookkeeping into the run report.
    pub fn merge_into_report(self, report: &mut NormalizeReport) {
        report.warnings.extend(self.warnings);
        report.created.extend(self.created);
        report.removed.extend(self.removed);
    }
}
