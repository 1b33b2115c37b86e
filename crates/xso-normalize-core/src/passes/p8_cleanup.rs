//! Pass 8: Cleanup
//!
//! Generation leftovers are removed and names settled:
//!
//! - [`cleanup_definitions`] drops the hierarchy indirections and folds
//!   `*_typedef_*` definitions into their `*_type_*` counterpart (or renames
//!   them to it).
//! - [`inline_attributes`] inlines root attribute definitions at every use.
//! - [`c14n_xml_objects`] propagates namespaces down and, in pure mode, keeps
//!   `xml` only where the runtime reads it.
//! - [`remove_redundant_prefixes`] drops empty prefixes on simple types.

use std::collections::{HashMap, HashSet};

use crate::error::NormalizeError;
use crate::model::{Document, Xml, Xso};
use crate::passes::pass_result::PassResult;
use crate::passes::pass_utils::inline_reference;
use crate::resolver::replace_refs;
use crate::walker::{walk_definitions, VisitContext, XsoVisitor};

const TYPEDEF_MARKER: &str = "_typedef_";
const TYPE_MARKER: &str = "_type_";

fn typedef_to_type(name: &str) -> String {
    name.replacen(TYPEDEF_MARKER, TYPE_MARKER, 1)
}

// ---------------------------------------------------------------------------
// Typedef cleanup
// ---------------------------------------------------------------------------

struct StripIndirections;

impl XsoVisitor for StripIndirections {
    fn post(&mut self, xso: &mut Xso, _ctx: &VisitContext<'_>) -> Result<(), NormalizeError> {
        xso.anc_ref = None;
        xso.desc_ref = None;
        if let Some(unique) = xso.xsi_type_uniquename.as_mut() {
            if unique.contains(TYPEDEF_MARKER) {
                *unique = typedef_to_type(unique);
            }
        }
        Ok(())
    }
}

/// A typedef can be folded into an existing type when both agree on
/// nullability and the type is not a discriminated union.
fn can_replace(target: &Xso, source: &Xso) -> bool {
    target.is_nullable() == source.is_nullable() && target.discriminator.is_none()
}

/// Drop hierarchy indirections and merge or rename typedef definitions.
pub fn cleanup_definitions(document: &mut Document) -> Result<PassResult, NormalizeError> {
    // Members of a discriminated union keep their names.
    let do_not_rename: HashSet<String> = document
        .definitions
        .values()
        .filter(|xso| xso.discriminator.is_some())
        .flat_map(|xso| xso.one_of.iter().flatten())
        .filter_map(|member| member.reference.as_ref())
        .map(|reference| reference.name().to_string())
        .collect();

    let flavor = document.flavor();
    walk_definitions(&mut document.definitions, flavor, &mut StripIndirections)?;

    let definitions = &document.definitions;
    let mut renames: HashMap<String, String> = HashMap::new();
    let mut order = Vec::new();
    for (name, xso) in definitions {
        if !name.contains(TYPEDEF_MARKER) || do_not_rename.contains(name) {
            continue;
        }
        let type_name = typedef_to_type(name);
        let replaceable = match definitions.get(&type_name) {
            Some(target) => can_replace(target, xso),
            None => true,
        };
        if replaceable {
            order.push(name.clone());
            renames.insert(name.clone(), type_name);
        }
    }

    let mut result = PassResult::unchanged();
    for name in &order {
        let Some(type_name) = renames.get(name) else {
            continue;
        };
        let Some(xso) = document.definitions.shift_remove(name) else {
            continue;
        };
        if !document.definitions.contains_key(type_name) {
            document.definitions.insert(type_name.clone(), xso);
            result.created.push(type_name.clone());
        }
        result.removed.push(name.clone());
    }
    replace_refs(document, &renames);

    tracing::debug!(typedefs = renames.len(), "cleaned up typedef definitions");
    Ok(result)
}

// ---------------------------------------------------------------------------
// Attribute inlining
// ---------------------------------------------------------------------------

struct InlineAttributes<'a> {
    attributes: &'a HashSet<String>,
}

impl XsoVisitor for InlineAttributes<'_> {
    fn post(&mut self, xso: &mut Xso, ctx: &VisitContext<'_>) -> Result<(), NormalizeError> {
        let is_attribute_ref = xso
            .reference
            .as_ref()
            .is_some_and(|r| r.tail().is_empty() && self.attributes.contains(r.name()));
        if is_attribute_ref {
            inline_reference(xso, ctx.definitions, &ctx.location())?;
        }
        Ok(())
    }
}

/// Inline root attribute definitions at their use sites and delete them.
pub fn inline_attributes(document: &mut Document) -> Result<PassResult, NormalizeError> {
    let attributes: HashSet<String> = document
        .definitions
        .iter()
        .filter(|(_, xso)| xso.is_attribute())
        .map(|(name, _)| name.clone())
        .collect();
    if attributes.is_empty() {
        return Ok(PassResult::unchanged());
    }

    let flavor = document.flavor();
    let mut inliner = InlineAttributes {
        attributes: &attributes,
    };
    walk_definitions(&mut document.definitions, flavor, &mut inliner)?;

    let mut removed = Vec::new();
    document.definitions.retain(|name, _| {
        let keep = !attributes.contains(name);
        if !keep {
            removed.push(name.clone());
        }
        keep
    });
    Ok(PassResult::with_removed(removed))
}

// ---------------------------------------------------------------------------
// xml objects
// ---------------------------------------------------------------------------

struct XmlObjects {
    pure: bool,
}

impl XsoVisitor for XmlObjects {
    fn pre(&mut self, xso: &mut Xso, ctx: &VisitContext<'_>) -> Result<(), NormalizeError> {
        if xso.items.is_none() && xso.reference.is_none() && xso.xml.is_none() {
            let inherited = ctx
                .ancestors
                .iter()
                .rev()
                .find_map(|frame| frame.xml.as_ref());
            if let Some(xml) = inherited {
                xso.xml = Some(Xml::inherited(xml));
                return Ok(());
            }
        }
        if let Some(xml) = xso.xml.as_mut() {
            xml.namespace.get_or_insert_with(String::new);
        }
        Ok(())
    }

    fn post(&mut self, xso: &mut Xso, ctx: &VisitContext<'_>) -> Result<(), NormalizeError> {
        if !self.pure || xso.xml.is_none() {
            return Ok(());
        }
        let read_by_runtime =
            ctx.is_root() || ctx.parent_key() == Some("properties") || ctx.key() == Some("items");
        let nameless_array = xso.items.is_some()
            && xso.xml.as_ref().is_some_and(|xml| xml.name.is_none());
        if !read_by_runtime || nameless_array {
            xso.xml = None;
        }
        Ok(())
    }
}

/// Give every XSO the namespace of its nearest enclosing `xml`; in pure mode
/// keep `xml` only on roots, property values and array items.
pub fn c14n_xml_objects(document: &mut Document, pure: bool) -> Result<PassResult, NormalizeError> {
    let flavor = document.flavor();
    walk_definitions(&mut document.definitions, flavor, &mut XmlObjects { pure })?;
    Ok(PassResult::unchanged())
}

struct RedundantPrefixes;

impl XsoVisitor for RedundantPrefixes {
    fn post(&mut self, xso: &mut Xso, _ctx: &VisitContext<'_>) -> Result<(), NormalizeError> {
        let simple = xso.properties.is_none()
            && xso
                .xso_type
                .as_deref()
                .is_some_and(|ty| ty != "object" && ty != "array");
        if !simple {
            return Ok(());
        }
        if let Some(xml) = xso.xml.as_mut() {
            if xml.prefix.as_deref() == Some("") && xml.namespace.as_deref() == Some("") {
                xml.prefix = None;
            }
        }
        Ok(())
    }
}

/// Drop `prefix: ""` on unqualified simple types.
pub fn remove_redundant_prefixes(document: &mut Document) -> Result<PassResult, NormalizeError> {
    let flavor = document.flavor();
    walk_definitions(&mut document.definitions, flavor, &mut RedundantPrefixes)?;
    Ok(PassResult::unchanged())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn document(definitions: Value) -> Document {
        Document::from_value(json!({ "definitions": definitions })).unwrap()
    }

    fn names(doc: &Document) -> Vec<String> {
        doc.definitions.keys().cloned().collect()
    }

    // -----------------------------------------------------------------------
    // cleanup_definitions
    // -----------------------------------------------------------------------

    #[test]
    fn test_typedef_merged_into_matching_type() {
        let mut doc = document(json!({
            "Addr_typedef_tns": { "type": "object", "x-anc-ref": { "$ref": "#/definitions/X" } },
            "Addr_type_tns": { "type": "object" },
            "Holder": { "properties": { "a": { "$ref": "#/definitions/Addr_typedef_tns" } } }
        }));
        let result = cleanup_definitions(&mut doc).unwrap();

        assert_eq!(result.removed, vec!["Addr_typedef_tns"]);
        assert!(result.created.is_empty());
        assert_eq!(names(&doc), vec!["Addr_type_tns", "Holder"]);
        let a = &doc.definitions["Holder"].properties.as_ref().unwrap()["a"];
        assert_eq!(a.reference.as_ref().unwrap().name(), "Addr_type_tns");
    }

    #[test]
    fn test_typedef_renamed_when_type_is_missing() {
        let mut doc = document(json!({
            "Code_typedef_tns": { "type": "string", "x-xsi-type-uniquename": "Code_typedef_tns" },
            "Holder": { "properties": { "c": { "$ref": "#/definitions/Code_typedef_tns" } } }
        }));
        let result = cleanup_definitions(&mut doc).unwrap();

        assert_eq!(result.created, vec!["Code_type_tns"]);
        assert_eq!(names(&doc), vec!["Holder", "Code_type_tns"]);
        assert_eq!(
            doc.definitions["Code_type_tns"].xsi_type_uniquename.as_deref(),
            Some("Code_type_tns")
        );
    }

    #[test]
    fn test_nullability_mismatch_keeps_typedef() {
        let mut doc = document(json!({
            "Addr_typedef_tns": { "type": "object", "x-nullable": true },
            "Addr_type_tns": { "type": "object" }
        }));
        cleanup_definitions(&mut doc).unwrap();
        assert_eq!(names(&doc), vec!["Addr_typedef_tns", "Addr_type_tns"]);
    }

    #[test]
    fn test_union_members_keep_typedef_names() {
        let mut doc = document(json!({
            "U": {
                "oneOf": [{ "$ref": "#/definitions/M_typedef_tns" }],
                "discriminator": { "propertyName": "x-ibm-discriminator" }
            },
            "M_typedef_tns": { "type": "object", "x-desc-ref": [{ "$ref": "#/definitions/U" }] }
        }));
        cleanup_definitions(&mut doc).unwrap();
        assert_eq!(names(&doc), vec!["U", "M_typedef_tns"]);
        assert_eq!(doc.definitions["M_typedef_tns"].desc_ref, None);
    }

    // -----------------------------------------------------------------------
    // inline_attributes
    // -----------------------------------------------------------------------

    #[test]
    fn test_attribute_definitions_inlined_and_removed() {
        let mut doc = document(json!({
            "lang_attribute": { "type": "string", "xml": { "name": "lang", "attribute": true } },
            "Holder": { "properties": {
                "lang": { "$ref": "#/definitions/lang_attribute", "description": "d" }
            } }
        }));
        let result = inline_attributes(&mut doc).unwrap();

        assert_eq!(result.removed, vec!["lang_attribute"]);
        assert_eq!(
            serde_json::to_value(&doc.definitions["Holder"]).unwrap(),
            json!({ "properties": { "lang": {
                "xml": { "name": "lang", "attribute": true },
                "description": "d",
                "type": "string"
            } } })
        );
    }

    // -----------------------------------------------------------------------
    // c14n_xml_objects / remove_redundant_prefixes
    // -----------------------------------------------------------------------

    fn xml_fixture() -> Value {
        json!({
            "T": {
                "xml": { "namespace": "urn:t", "prefix": "t" },
                "type": "object",
                "properties": {
                    "list": { "type": "array", "items": { "type": "string" } },
                    "named": { "type": "array", "xml": { "name": "named" }, "items": { "type": "string" } },
                    "ref": { "$ref": "#/definitions/T" }
                },
                "allOf": [{ "type": "object" }]
            }
        })
    }

    #[test]
    fn test_namespaces_inherited_in_pure_mode() {
        let mut doc = document(xml_fixture());
        c14n_xml_objects(&mut doc, true).unwrap();
        assert_eq!(
            serde_json::to_value(&doc.definitions["T"]).unwrap(),
            json!({
                "xml": { "namespace": "urn:t", "prefix": "t" },
                "type": "object",
                "properties": {
                    "list": { "type": "array",
                              "items": { "xml": { "namespace": "urn:t", "prefix": "t" }, "type": "string" } },
                    "named": { "type": "array", "xml": { "namespace": "", "name": "named" },
                               "items": { "xml": { "namespace": "" }, "type": "string" } },
                    "ref": { "$ref": "#/definitions/T" }
                },
                "allOf": [{ "type": "object" }]
            })
        );
    }

    #[test]
    fn test_non_pure_mode_keeps_all_xml() {
        let mut doc = document(xml_fixture());
        c14n_xml_objects(&mut doc, false).unwrap();
        let member = &doc.definitions["T"].all_of.as_ref().unwrap()[0];
        assert_eq!(member.xml.as_ref().unwrap().namespace.as_deref(), Some("urn:t"));
    }

    #[test]
    fn test_redundant_prefix_removed_on_simple_types_only() {
        let mut doc = document(json!({
            "S": { "xml": { "namespace": "", "prefix": "" }, "type": "string" },
            "O": { "xml": { "namespace": "", "prefix": "" }, "type": "object" },
            "Q": { "xml": { "namespace": "urn:q", "prefix": "" }, "type": "string" }
        }));
        remove_redundant_prefixes(&mut doc).unwrap();
        assert_eq!(doc.definitions["S"].xml.as_ref().unwrap().prefix, None);
        assert_eq!(doc.definitions["O"].xml.as_ref().unwrap().prefix.as_deref(), Some(""));
        assert_eq!(doc.definitions["Q"].xml.as_ref().unwrap().prefix.as_deref(), Some(""));
    }
}
