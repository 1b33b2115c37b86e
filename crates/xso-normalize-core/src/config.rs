//! Configuration for definitions-graph normalization.

use serde::{Deserialize, Serialize};

/// Number of duplicate definitions above which root elements are replaced by
/// their types instead of duplicating polymorphic hierarchies.
pub const DUPLICATE_THRESHOLD: usize = 75;

/// Global generation options.
///
/// ## Serialization Format
///
/// Fields are serialized in `kebab-case` (e.g., `keep-root-elements`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct NormalizeOptions {
    /// Keep every definition carrying `xml.name` (schema-declared roots)
    /// during pruning, even when nothing references it.
    pub keep_root_elements: bool,
    /// Remove `xml` annotations from positions other than roots, array items
    /// and object properties.
    pub pure_xml: bool,
    /// Nullable keyword flavor: `Some(true)` emits `nullable`, `Some(false)`
    /// emits `x-nullable`, `None` leaves whatever is present.
    pub v3_nullable: Option<bool>,
    /// Maximum length of ancestor chains, `typeOf` chains and reference
    /// inlining before the chain is treated as cyclic.
    pub max_depth: usize,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            keep_root_elements: false,
            pure_xml: true,
            v3_nullable: None,
            max_depth: 64,
        }
    }
}
