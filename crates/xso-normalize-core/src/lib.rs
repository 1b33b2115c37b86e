//! # xso-normalize-core
//!
//! Post-generation normalization of XML-Schema-derived definitions graphs.
//!
//! A WSDL/XSD front end emits a Swagger/OpenAPI-shaped document whose
//! `definitions` (or `components.schemas`) still mirror XML Schema:
//! polymorphic extension, nillability, `typeOf` indirections, anonymous
//! repeating groups. [`normalize`] rewrites that graph into the flat shape
//! an API gateway consumes, keeping the `xml` hints needed to produce valid
//! XML on the wire.
//!
//! ```
//! use serde_json::json;
//! use xso_normalize_core::{normalize, Dictionary, Document, NormalizeOptions};
//!
//! let mut document = Document::from_value(json!({
//!     "paths": { "/echo": { "post": { "parameters": [
//!         { "in": "body", "name": "body", "schema": { "$ref": "#/definitions/Echo" } }
//!     ] } } },
//!     "definitions": {
//!         "Echo": { "type": "object", "properties": { "n": { "type": "integer", "default": "1" } } },
//!         "Unused": { "type": "string" }
//!     }
//! }))
//! .unwrap();
//!
//! let report = normalize(&mut document, &Dictionary::default(), &NormalizeOptions::default()).unwrap();
//! assert_eq!(report.removed, vec!["Unused"]);
//!
//! let out = document.to_value().unwrap();
//! assert_eq!(out["definitions"]["Echo"]["properties"]["n"]["default"], json!(1));
//! ```

pub mod config;
pub mod error;
pub mod hierarchy;
pub mod model;
pub mod passes;
pub mod pointer;
pub mod report;
pub mod resolver;
pub mod walker;

pub use config::NormalizeOptions;
pub use error::{ErrorCode, NormalizeError};
pub use model::{DefRef, Dictionary, Document, Xso};
pub use pointer::{render_path, split_path};
pub use report::{NormalizeReport, Warning};

use passes::pass_result::PassResult;
use passes::{
    p1_poly_hierarchy, p2_nil_split, p3_type_of, p4_restriction, p5_simplify, p6_defaults,
    p7_prune, p8_cleanup, p9_canonical,
};

struct Pipeline {
    req: String,
    report: NormalizeReport,
}

impl Pipeline {
    fn run<F>(&mut self, name: &'static str, document: &mut Document, pass: F) -> Result<(), NormalizeError>
    where
        F: FnOnce(&mut Document) -> Result<PassResult, NormalizeError>,
    {
        let span = tracing::debug_span!("pass", pass = name, req = %self.req);
        let _enter = span.enter();
        let result = pass(document)?;
        tracing::debug!(
            created = result.created.len(),
            removed = result.removed.len(),
            warnings = result.warnings.len(),
            definitions = document.definitions.len(),
            "pass finished"
        );
        result.merge_into_report(&mut self.report);
        Ok(())
    }
}

/// Pass names, in the order [`normalize`] runs them.
pub const PASSES: [&str; 17] = [
    // 1-3: hierarchy, nillability, typeOf
    "duplicate_poly_hierarchy",
    "fixup_nil_and_non_nil",
    "expand_type_ofs",
    // 4-6: structure and values
    "process_complex_content_restriction",
    "squash_all_ofs",
    "remove_any_ofs",
    "remove_one_ofs",
    "remove_unnamed_occurrence",
    // Folded groups and converted choices leave nested wrappers behind.
    "squash_all_ofs",
    "adjust_defaults",
    // 7-9: pruning, cleanup, canonical form
    "remove_unreferenced_definitions",
    "cleanup_definitions",
    "inline_attributes",
    "c14n_xml_objects",
    "remove_redundant_prefixes",
    "c14n_xso",
    "sort_definitions",
];

/// Run a single pass by name.
pub fn run_pass(
    name: &str,
    document: &mut Document,
    dict: &Dictionary,
    options: &NormalizeOptions,
) -> Result<PassResult, NormalizeError> {
    match name {
        "duplicate_poly_hierarchy" => {
            p1_poly_hierarchy::duplicate_poly_hierarchy(document, dict, options)
        }
        "fixup_nil_and_non_nil" => p2_nil_split::fixup_nil_and_non_nil(document, options),
        "expand_type_ofs" => p3_type_of::expand_type_ofs(document, dict, options),
        "process_complex_content_restriction" => {
            p4_restriction::process_complex_content_restriction(document, options)
        }
        "squash_all_ofs" => p5_simplify::squash_all_ofs(document),
        "remove_any_ofs" => p5_simplify::remove_any_ofs(document),
        "remove_one_ofs" => p5_simplify::remove_one_ofs(document),
        "remove_unnamed_occurrence" => p5_simplify::remove_unnamed_occurrence(document),
        "adjust_defaults" => p6_defaults::adjust_defaults(document, options),
        "remove_unreferenced_definitions" => {
            p7_prune::remove_unreferenced_definitions(document, options)
        }
        "cleanup_definitions" => p8_cleanup::cleanup_definitions(document),
        "inline_attributes" => p8_cleanup::inline_attributes(document),
        "c14n_xml_objects" => p8_cleanup::c14n_xml_objects(document, options.pure_xml),
        "remove_redundant_prefixes" => p8_cleanup::remove_redundant_prefixes(document),
        "c14n_xso" => p9_canonical::c14n_xso(document, options.v3_nullable),
        "sort_definitions" => p9_canonical::sort_definitions(document),
        other => Err(NormalizeError::UnexpectedTransform {
            stage: other.to_string(),
            message: "no such pass".to_string(),
        }),
    }
}

/// Run the full pipeline over `document`, in place.
///
/// Passes run strictly in sequence; the first fatal error aborts the run and
/// leaves the document partially rewritten. Recoverable problems end up in
/// the returned report's warnings.
pub fn normalize(
    document: &mut Document,
    dict: &Dictionary,
    options: &NormalizeOptions,
) -> Result<NormalizeReport, NormalizeError> {
    let mut pipeline = Pipeline {
        req: dict.request_label(),
        report: NormalizeReport::default(),
    };

    for name in PASSES {
        pipeline.run(name, document, |d| run_pass(name, d, dict, options))?;
    }

    verify_references(document)?;
    let Pipeline { req, report } = pipeline;
    if !report.is_clean() {
        tracing::warn!(req = %req, warnings = report.warnings.len(), "normalized with warnings");
    }
    Ok(report)
}

/// Check that every `$ref` in the document resolves.
///
/// Returns the first dangling reference; use
/// [`resolver::dangling_references`] to get all of them.
pub fn verify_references(document: &Document) -> Result<(), NormalizeError> {
    match resolver::dangling_references(document).into_iter().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verify_references_reports_first_dangling_ref() {
        let document = Document::from_value(json!({
            "definitions": {
                "A": { "properties": { "b": { "$ref": "#/definitions/Missing" } } }
            }
        }))
        .unwrap();
        let err = verify_references(&document).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::UnresolvedRef);
        assert_eq!(err.location(), Some("#/definitions/A/properties/b"));
    }

    #[test]
    fn test_run_pass_rejects_unknown_name() {
        let mut document = Document::from_value(json!({ "definitions": {} })).unwrap();
        let err = run_pass(
            "flatten_everything",
            &mut document,
            &Dictionary::default(),
            &NormalizeOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::UnexpectedTransform);
    }

    #[test]
    fn test_normalize_empty_document() {
        let mut document = Document::from_value(json!({ "swagger": "2.0" })).unwrap();
        let report = normalize(&mut document, &Dictionary::default(), &NormalizeOptions::default())
            .unwrap();
        assert!(report.is_clean());
        assert_eq!(document.to_value().unwrap(), json!({ "swagger": "2.0" }));
    }
}
