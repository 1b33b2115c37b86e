//! Pass 9: Canonical form
//!
//! Serializing an [`Xso`] already yields the canonical key order (see
//! [`crate::model::Xso`]). What remains is dropping temporary and null
//! annotations, choosing the nullable keyword for the target OpenAPI version,
//! and sorting the definitions by name.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::NormalizeError;
use crate::model::{Document, Xso, TEMPORARY_KEYS};
use crate::passes::pass_result::PassResult;
use crate::walker::{walk_definitions, VisitContext, XsoVisitor};

struct Canonical {
    v3_nullable: Option<bool>,
}

fn drop_empty_extras(extra: &mut BTreeMap<String, Value>) {
    extra.retain(|key, value| !value.is_null() && !TEMPORARY_KEYS.contains(&key.as_str()));
}

impl XsoVisitor for Canonical {
    fn post(&mut self, xso: &mut Xso, _ctx: &VisitContext<'_>) -> Result<(), NormalizeError> {
        drop_empty_extras(&mut xso.extra);
        for xml in [xso.xml.as_mut(), xso.xsi_type_xml.as_mut()].into_iter().flatten() {
            drop_empty_extras(&mut xml.extra);
        }

        match self.v3_nullable {
            Some(true) => {
                if let Some(nullable) = xso.x_nullable.take() {
                    xso.nullable = Some(nullable);
                }
            }
            Some(false) => {
                if let Some(nullable) = xso.nullable.take() {
                    xso.x_nullable = Some(nullable);
                }
            }
            None => {}
        }

        if !xso.has_type("object") && xso.properties.as_ref().is_some_and(|p| p.is_empty()) {
            xso.properties = None;
        }
        Ok(())
    }
}

/// Canonicalize every XSO. `v3_nullable` selects `nullable` (`Some(true)`)
/// or `x-nullable` (`Some(false)`); `None` leaves both keywords alone.
pub fn c14n_xso(document: &mut Document, v3_nullable: Option<bool>) -> Result<PassResult, NormalizeError> {
    let flavor = document.flavor();
    walk_definitions(&mut document.definitions, flavor, &mut Canonical { v3_nullable })?;
    Ok(PassResult::unchanged())
}

/// Order the definitions by name.
pub fn sort_definitions(document: &mut Document) -> Result<PassResult, NormalizeError> {
    document.definitions.sort_keys();
    Ok(PassResult::unchanged())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn document(definitions: Value) -> Document {
        Document::from_value(json!({ "definitions": definitions })).unwrap()
    }

    #[test]
    fn test_temporary_and_null_keys_dropped() {
        let mut doc = document(json!({
            "A": {
                "type": "string",
                "x-ibm-basic-choice": true,
                "x-custom": null,
                "x-kept": 1,
                "xml": { "namespace": "", "x-note": null },
                "properties": {}
            }
        }));
        c14n_xso(&mut doc, None).unwrap();
        assert_eq!(
            serde_json::to_string(&doc.definitions["A"]).unwrap(),
            r#"{"xml":{"namespace":""},"type":"string","x-kept":1}"#
        );
    }

    #[test]
    fn test_empty_properties_kept_on_objects() {
        let mut doc = document(json!({ "O": { "type": "object", "properties": {} } }));
        c14n_xso(&mut doc, None).unwrap();
        assert!(doc.definitions["O"].properties.is_some());
    }

    #[test]
    fn test_nullable_keyword_selection() {
        let source = json!({
            "A": { "type": "string", "x-nullable": true },
            "B": { "type": "string", "nullable": true }
        });

        let mut doc = document(source.clone());
        c14n_xso(&mut doc, Some(true)).unwrap();
        assert_eq!(doc.definitions["A"].nullable, Some(true));
        assert_eq!(doc.definitions["A"].x_nullable, None);
        assert_eq!(doc.definitions["B"].nullable, Some(true));

        let mut doc = document(source.clone());
        c14n_xso(&mut doc, Some(false)).unwrap();
        assert_eq!(doc.definitions["B"].x_nullable, Some(true));
        assert_eq!(doc.definitions["B"].nullable, None);

        let mut doc = document(source);
        c14n_xso(&mut doc, None).unwrap();
        assert_eq!(doc.definitions["A"].x_nullable, Some(true));
        assert_eq!(doc.definitions["B"].nullable, Some(true));
    }

    #[test]
    fn test_sort_definitions() {
        let mut doc = document(json!({ "b": {}, "a_nil": {}, "B": {}, "a": {} }));
        sort_definitions(&mut doc).unwrap();
        let keys: Vec<_> = doc.definitions.keys().cloned().collect();
        assert_eq!(keys, vec!["B", "a", "a_nil", "b"]);
    }
}
