//! Pass 5: Structural simplification
//!
//! Four independent rewrites, run in this order:
//!
//! 1. [`squash_all_ofs`]: drop empty `allOf` members, splice nested
//!    wrappers, and merge single inline members or inline object members
//!    into their parent.
//! 2. [`remove_any_ofs`]: approximate an `anyOf` by the best common type.
//! 3. [`remove_one_ofs`]: turn choices without discriminator into `allOf`.
//! 4. [`remove_unnamed_occurrence`]: fold the bounds of anonymous array
//!    wrappers (repeating sequences/choices) into the wrapped content.

use serde_json::Value;

use crate::error::NormalizeError;
use crate::model::{Definitions, Document, Xso};
use crate::passes::pass_result::PassResult;
use crate::resolver::{get_def, get_ref};
use crate::walker::{walk_definitions, VisitContext, XsoVisitor};

// ---------------------------------------------------------------------------
// allOf squashing
// ---------------------------------------------------------------------------

struct Squash;

impl XsoVisitor for Squash {
    fn post(&mut self, xso: &mut Xso, ctx: &VisitContext<'_>) -> Result<(), NormalizeError> {
        // Array items holding an `allOf` are anonymous repeating groups; their
        // members stay separate until occurrence propagation.
        squash_all_of(xso, ctx.key() != Some("items"));
        Ok(())
    }
}

/// Squash redundant `allOf` wrappers everywhere.
pub fn squash_all_ofs(document: &mut Document) -> Result<PassResult, NormalizeError> {
    let flavor = document.flavor();
    walk_definitions(&mut document.definitions, flavor, &mut Squash)?;
    Ok(PassResult::unchanged())
}

/// Squash the `allOf` of a single node (children are assumed squashed).
fn squash_all_of(xso: &mut Xso, merge: bool) {
    let Some(members) = xso.all_of.take() else {
        return;
    };

    let mut flat = Vec::with_capacity(members.len());
    for mut member in members {
        if member.reference.is_none() {
            if member.is_vacuous() {
                continue;
            }
            if let Some(inner) = member.all_of.take() {
                if member.is_vacuous() {
                    flat.extend(inner);
                    continue;
                }
                member.all_of = Some(inner);
            }
        }
        flat.push(member);
    }
    if flat.is_empty() {
        return;
    }

    let parent_is_object = xso.reference.is_none()
        && xso.items.is_none()
        && (xso.xso_type.is_none() || xso.has_type("object"));
    let single_inline = match flat.as_slice() {
        [member] => {
            xso.reference.is_none()
                && member.reference.is_none()
                && !is_repeating_group(member)
                && (xso.xso_type.is_none() || xso.xso_type == member.xso_type)
        }
        _ => false,
    };
    if merge && (single_inline || (parent_is_object && flat.iter().all(is_inline_object))) {
        for member in flat {
            merge_member(xso, member);
        }
    } else {
        xso.all_of = Some(flat);
    }
}

/// An anonymous array wrapper around a repeating sequence or choice.
fn is_repeating_group(xso: &Xso) -> bool {
    xso.is_array()
        && xso
            .items
            .as_ref()
            .is_some_and(|items| items.all_of.is_some() || items.one_of.is_some())
}

fn is_inline_object(xso: &Xso) -> bool {
    xso.reference.is_none()
        && xso.items.is_none()
        && xso.all_of.is_none()
        && xso.one_of.is_none()
        && xso.any_of.is_none()
        && (xso.xso_type.is_none() || xso.has_type("object"))
}

/// Merge an inline member into its parent. Parent fields win, properties are
/// concatenated and `required` lists unioned.
fn merge_member(parent: &mut Xso, mut member: Xso) {
    if let Some(properties) = member.properties.take() {
        let target = parent.properties.get_or_insert_with(Default::default);
        for (key, prop) in properties {
            target.entry(key).or_insert(prop);
        }
    }
    if let Some(required) = member.required.take() {
        let target = parent.required.get_or_insert_with(Vec::new);
        for name in required {
            if !target.contains(&name) {
                target.push(name);
            }
        }
    }
    parent.fill_missing(&member);
}

// ---------------------------------------------------------------------------
// anyOf removal
// ---------------------------------------------------------------------------

struct AnyOfCollapse;

impl XsoVisitor for AnyOfCollapse {
    fn post(&mut self, xso: &mut Xso, ctx: &VisitContext<'_>) -> Result<(), NormalizeError> {
        let Some(members) = xso.any_of.take() else {
            return Ok(());
        };
        let location = ctx.location();
        let mut resolved = Vec::with_capacity(members.len());
        for mut member in members {
            if let Some(reference) = member.reference.take() {
                let target = get_ref(ctx.definitions, &reference, &location)?;
                member.overlay(target);
            }
            resolved.push(member);
        }
        let Some((first, rest)) = resolved.split_first() else {
            return Ok(());
        };

        let mut ty = first.xso_type.clone();
        let mut format = first.format.clone();
        let mut enumeration = first.enumeration.clone();
        for member in rest {
            // Disagreeing members degrade to an unconstrained string.
            if ty != member.xso_type || format != member.format {
                ty = Some("string".to_string());
                format = None;
                enumeration = None;
            }
            match (enumeration.as_mut(), member.enumeration.as_ref()) {
                (Some(values), Some(more)) => {
                    for value in more {
                        if !values.contains(value) {
                            values.push(value.clone());
                        }
                    }
                }
                (Some(_), None) => enumeration = None,
                (None, _) => {}
            }
        }

        if ty.is_some() {
            xso.xso_type = ty;
        }
        if format.is_some() {
            xso.format = format;
        }
        if enumeration.is_some() {
            xso.enumeration = enumeration;
        }
        Ok(())
    }
}

/// Replace every `anyOf` by a single approximating type.
pub fn remove_any_ofs(document: &mut Document) -> Result<PassResult, NormalizeError> {
    let flavor = document.flavor();
    walk_definitions(&mut document.definitions, flavor, &mut AnyOfCollapse)?;
    Ok(PassResult::unchanged())
}

// ---------------------------------------------------------------------------
// oneOf removal
// ---------------------------------------------------------------------------

struct OneOfToAllOf;

impl XsoVisitor for OneOfToAllOf {
    fn post(&mut self, xso: &mut Xso, _ctx: &VisitContext<'_>) -> Result<(), NormalizeError> {
        if xso.discriminator.is_some() {
            return Ok(());
        }
        let Some(mut members) = xso.one_of.take() else {
            return Ok(());
        };
        remove_required(&mut members);
        xso.all_of.get_or_insert_with(Vec::new).extend(members);
        Ok(())
    }
}

/// Turn choices (a `oneOf` without discriminator) into optional `allOf`
/// content.
pub fn remove_one_ofs(document: &mut Document) -> Result<PassResult, NormalizeError> {
    let flavor = document.flavor();
    walk_definitions(&mut document.definitions, flavor, &mut OneOfToAllOf)?;
    Ok(PassResult::unchanged())
}

/// Every branch of a choice is optional.
fn remove_required(members: &mut [Xso]) {
    for member in members {
        if let Some(properties) = member.properties.as_mut() {
            for prop in properties.values_mut() {
                prop.min_items = None;
            }
            member.required = None;
        }
        if let Some(nested) = member.all_of.as_mut() {
            remove_required(nested);
        }
    }
}

// ---------------------------------------------------------------------------
// Occurrence propagation
// ---------------------------------------------------------------------------

/// An occurrence range; `max == None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Occurs {
    min: u64,
    max: Option<u64>,
}

struct Occurrence;

impl XsoVisitor for Occurrence {
    fn post(&mut self, xso: &mut Xso, ctx: &VisitContext<'_>) -> Result<(), NormalizeError> {
        let list = match (xso.all_of.as_mut(), xso.one_of.as_mut()) {
            (Some(list), _) | (None, Some(list)) => list,
            (None, None) => return Ok(()),
        };
        let location = ctx.location();
        for slot in list.iter_mut() {
            if !is_repeating_group(slot) {
                continue;
            }
            let Some(items) = slot.items.take() else {
                continue;
            };
            let occurs = Occurs {
                min: slot.min_items.unwrap_or(0),
                max: slot.max_items.filter(|max| *max != 0),
            };
            let group = slot.ibm_group.take();
            *slot = propagate_occurrence(occurs, group.as_ref(), *items, ctx.definitions, &location)?;
        }
        Ok(())
    }
}

/// Fold anonymous array wrappers into their content.
pub fn remove_unnamed_occurrence(document: &mut Document) -> Result<PassResult, NormalizeError> {
    let flavor = document.flavor();
    walk_definitions(&mut document.definitions, flavor, &mut Occurrence)?;
    Ok(PassResult::unchanged())
}

fn propagate_occurrence(
    occurs: Occurs,
    group: Option<&Value>,
    xso: Xso,
    definitions: &Definitions,
    location: &str,
) -> Result<Xso, NormalizeError> {
    let mut xso = match &xso.reference {
        Some(reference) => get_ref(definitions, reference, location)?.clone(),
        None => xso,
    };

    if let Some(list) = match (xso.one_of.as_mut(), xso.all_of.as_mut()) {
        (Some(list), _) | (None, Some(list)) => Some(list),
        (None, None) => None,
    } {
        for slot in list.iter_mut() {
            let member = std::mem::take(slot);
            *slot = propagate_occurrence(occurs, group, member, definitions, location)?;
        }
    }

    if xso.is_array() {
        if let Some(min) = xso.min_items.filter(|m| *m != 0) {
            xso.min_items = Some(min.saturating_mul(occurs.min));
        }
        if let Some(max) = xso.max_items.filter(|m| *m != 0) {
            xso.max_items = occurs.max.map(|outer| max.saturating_mul(outer));
        }
        if xso.min_items == Some(0) {
            xso.min_items = None;
        }
        if occurs.max != Some(1) {
            xso.ibm_group = concat_groups(group, xso.ibm_group.take());
        }
    } else if let Some(properties) = xso.properties.as_mut() {
        let required = xso.required.as_deref().unwrap_or_default();
        for (key, prop) in properties.iter_mut() {
            let prop_occurs = Occurs {
                min: if required.contains(key) { occurs.min } else { 0 },
                max: occurs.max,
            };
            if prop.is_array() {
                let inner = std::mem::take(prop);
                *prop = propagate_occurrence(prop_occurs, group, inner, definitions, location)?;
            } else if occurs.max != Some(1) {
                let xml = get_def(definitions, prop, location)?.xml.clone();
                let inner = std::mem::take(prop);
                *prop = Xso {
                    xml,
                    xso_type: Some("array".to_string()),
                    min_items: (prop_occurs.min != 0).then_some(prop_occurs.min),
                    max_items: prop_occurs.max,
                    items: Some(Box::new(inner)),
                    ibm_group: group.cloned(),
                    ..Xso::default()
                };
            }
        }
        if occurs.min == 0 {
            xso.required = None;
        }
    }
    Ok(xso)
}

/// `x-ibm-group` hints concatenated, outer first.
fn concat_groups(outer: Option<&Value>, inner: Option<Value>) -> Option<Value> {
    let Some(inner) = inner else {
        return outer.cloned();
    };
    let mut joined = Vec::new();
    for part in [outer.cloned(), Some(inner)].into_iter().flatten() {
        match part {
            Value::Array(values) => joined.extend(values),
            other => joined.push(other),
        }
    }
    Some(Value::Array(joined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn document(definitions: Value) -> Document {
        Document::from_value(json!({ "definitions": definitions })).unwrap()
    }

    fn output(doc: &Document, name: &str) -> Value {
        serde_json::to_value(&doc.definitions[name]).unwrap()
    }

    // -----------------------------------------------------------------------
    // squash_all_ofs
    // -----------------------------------------------------------------------

    #[test]
    fn test_inline_object_members_merge_into_parent() {
        let mut doc = document(json!({
            "A": {
                "description": "parent",
                "required": ["a"],
                "allOf": [
                    { "type": "object", "properties": { "a": { "type": "string" } }, "required": ["a"] },
                    { "type": "object", "properties": {} },
                    { "allOf": [{ "type": "object", "properties": { "b": { "type": "integer" } }, "required": ["b"] }] },
                    { "description": "ignored", "properties": { "a": { "type": "boolean" } } }
                ]
            }
        }));
        squash_all_ofs(&mut doc).unwrap();
        assert_eq!(
            output(&doc, "A"),
            json!({
                "description": "parent",
                "type": "object",
                "properties": { "a": { "type": "string" }, "b": { "type": "integer" } },
                "required": ["a", "b"]
            })
        );
    }

    #[test]
    fn test_reference_members_are_kept() {
        let mut doc = document(json!({
            "Base": { "type": "object" },
            "Ext": { "allOf": [
                { "$ref": "#/definitions/Base" },
                {},
                { "type": "object", "properties": { "x": { "type": "string" } } }
            ] }
        }));
        squash_all_ofs(&mut doc).unwrap();
        assert_eq!(
            output(&doc, "Ext"),
            json!({ "allOf": [
                { "$ref": "#/definitions/Base" },
                { "type": "object", "properties": { "x": { "type": "string" } } }
            ] })
        );
    }

    #[test]
    fn test_empty_allof_is_removed() {
        let mut doc = document(json!({ "A": { "type": "object", "allOf": [{}, { "type": "object" }] } }));
        squash_all_ofs(&mut doc).unwrap();
        assert_eq!(output(&doc, "A"), json!({ "type": "object" }));
    }

    #[test]
    fn test_single_inline_member_collapses_into_parent() {
        let mut doc = document(json!({
            "H": { "type": "object", "properties": {
                "p": { "xml": { "name": "p" }, "allOf": [{ "type": "string", "maxLength": 5 }] }
            } }
        }));
        squash_all_ofs(&mut doc).unwrap();
        assert_eq!(
            output(&doc, "H"),
            json!({ "type": "object", "properties": {
                "p": { "xml": { "name": "p" }, "type": "string", "maxLength": 5 }
            } })
        );
    }

    #[test]
    fn test_single_member_of_another_type_is_kept() {
        let mut doc = document(json!({
            "S": { "type": "integer", "allOf": [{ "type": "string" }] }
        }));
        squash_all_ofs(&mut doc).unwrap();
        assert_eq!(
            output(&doc, "S"),
            json!({ "type": "integer", "allOf": [{ "type": "string" }] })
        );
    }

    #[test]
    fn test_nested_wrappers_left_by_occurrence_folding_are_squashed() {
        let mut doc = document(json!({
            "B": { "type": "object", "allOf": [{
                "type": "array", "minItems": 2, "maxItems": 3,
                "items": { "allOf": [{
                    "type": "object",
                    "required": ["line"],
                    "properties": { "line": { "type": "string", "xml": { "name": "line" } } }
                }] }
            }] }
        }));
        remove_unnamed_occurrence(&mut doc).unwrap();
        squash_all_ofs(&mut doc).unwrap();
        assert_eq!(
            output(&doc, "B"),
            json!({
                "type": "object",
                "properties": { "line": {
                    "xml": { "name": "line" }, "type": "array", "minItems": 2, "maxItems": 3,
                    "items": { "type": "string", "xml": { "name": "line" } }
                } },
                "required": ["line"]
            })
        );
    }

    #[test]
    fn test_repeating_group_members_are_not_merged() {
        let mut doc = document(json!({
            "G": { "allOf": [{
                "type": "array",
                "items": { "allOf": [{}, { "type": "object", "properties": { "a": { "type": "string" } } }] }
            }] }
        }));
        squash_all_ofs(&mut doc).unwrap();
        assert_eq!(
            output(&doc, "G"),
            json!({ "allOf": [{
                "type": "array",
                "items": { "allOf": [{ "type": "object", "properties": { "a": { "type": "string" } } }] }
            }] })
        );
    }

    // -----------------------------------------------------------------------
    // remove_any_ofs
    // -----------------------------------------------------------------------

    #[test]
    fn test_any_of_same_type_unions_enums() {
        let mut doc = document(json!({
            "Colors": { "type": "string", "enum": ["red", "green"] },
            "U": { "anyOf": [
                { "$ref": "#/definitions/Colors" },
                { "type": "string", "enum": ["green", "blue"] }
            ] }
        }));
        remove_any_ofs(&mut doc).unwrap();
        assert_eq!(
            output(&doc, "U"),
            json!({ "type": "string", "enum": ["red", "green", "blue"] })
        );
    }

    #[test]
    fn test_any_of_mismatch_falls_back_to_string() {
        let mut doc = document(json!({
            "U": { "anyOf": [
                { "type": "integer", "enum": [1, 2] },
                { "type": "string", "enum": ["x"] }
            ] }
        }));
        remove_any_ofs(&mut doc).unwrap();
        assert_eq!(output(&doc, "U"), json!({ "type": "string" }));
    }

    #[test]
    fn test_any_of_enum_dropped_when_a_member_is_open() {
        let mut doc = document(json!({
            "U": { "anyOf": [
                { "type": "string", "format": "date", "enum": ["2020-01-01"] },
                { "type": "string", "format": "date" }
            ] }
        }));
        remove_any_ofs(&mut doc).unwrap();
        assert_eq!(output(&doc, "U"), json!({ "type": "string", "format": "date" }));
    }

    // -----------------------------------------------------------------------
    // remove_one_ofs
    // -----------------------------------------------------------------------

    #[test]
    fn test_choice_becomes_optional_allof_content() {
        let mut doc = document(json!({
            "C": {
                "allOf": [{ "$ref": "#/definitions/Base" }],
                "oneOf": [
                    { "type": "object", "required": ["a"], "properties": {
                        "a": { "type": "array", "minItems": 1, "items": { "type": "string" } }
                    } },
                    { "allOf": [{ "required": ["b"], "properties": { "b": { "type": "string" } } }] }
                ]
            },
            "Base": { "type": "object" }
        }));
        remove_one_ofs(&mut doc).unwrap();
        assert_eq!(
            output(&doc, "C"),
            json!({ "allOf": [
                { "$ref": "#/definitions/Base" },
                { "type": "object", "properties": {
                    "a": { "type": "array", "items": { "type": "string" } }
                } },
                { "allOf": [{ "properties": { "b": { "type": "string" } } }] }
            ] })
        );
    }

    #[test]
    fn test_discriminated_union_keeps_one_of() {
        let mut doc = document(json!({
            "U": {
                "oneOf": [{ "$ref": "#/definitions/A" }],
                "discriminator": { "propertyName": "x-ibm-discriminator" }
            },
            "A": { "type": "object" }
        }));
        remove_one_ofs(&mut doc).unwrap();
        assert!(doc.definitions["U"].one_of.is_some());
        assert!(doc.definitions["U"].all_of.is_none());
    }

    // -----------------------------------------------------------------------
    // remove_unnamed_occurrence
    // -----------------------------------------------------------------------

    #[test]
    fn test_nested_bounds_multiply() {
        let mut doc = document(json!({
            "H": { "allOf": [{
                "type": "array", "minItems": 2, "maxItems": 3, "x-ibm-group": "g1",
                "items": { "allOf": [{
                    "type": "object",
                    "required": ["p"],
                    "properties": {
                        "p": { "type": "array", "minItems": 1, "maxItems": 2, "x-ibm-group": "g2",
                               "items": { "type": "string" } },
                        "q": { "type": "string", "xml": { "name": "q" } }
                    }
                }] }
            }] }
        }));
        remove_unnamed_occurrence(&mut doc).unwrap();
        assert_eq!(
            output(&doc, "H"),
            json!({ "allOf": [{ "allOf": [{
                "type": "object",
                "properties": {
                    "p": { "type": "array", "minItems": 2, "maxItems": 6,
                           "items": { "type": "string" }, "x-ibm-group": ["g1", "g2"] },
                    "q": { "xml": { "name": "q" }, "type": "array", "maxItems": 3,
                           "items": { "type": "string", "xml": { "name": "q" } }, "x-ibm-group": "g1" }
                },
                "required": ["p"]
            }] }] })
        );
    }

    #[test]
    fn test_unbounded_wrapper_absorbs_and_optional_wrapper_clears_required() {
        let mut doc = document(json!({
            "T": { "type": "object", "properties": { "v": { "type": "string" } } },
            "H": { "oneOf": [{
                "type": "array",
                "items": { "oneOf": [
                    { "$ref": "#/definitions/T" },
                    { "type": "object", "required": ["r"], "properties": {
                        "r": { "type": "array", "minItems": 3, "maxItems": 4, "items": { "type": "string" } }
                    } }
                ] }
            }] }
        }));
        remove_unnamed_occurrence(&mut doc).unwrap();
        let choice = &doc.definitions["H"].one_of.as_ref().unwrap()[0];
        let members = choice.one_of.as_ref().unwrap();

        // The reference was resolved and its property wrapped.
        let v = &members[0].properties.as_ref().unwrap()["v"];
        assert!(v.is_array());
        assert_eq!(v.max_items, None);
        assert_eq!(v.min_items, None);

        let second = &members[1];
        assert_eq!(second.required, None);
        let r = &second.properties.as_ref().unwrap()["r"];
        assert_eq!(r.min_items, None);
        assert_eq!(r.max_items, None);
    }

    #[test]
    fn test_concat_groups() {
        assert_eq!(concat_groups(Some(&json!("a")), None), Some(json!("a")));
        assert_eq!(
            concat_groups(Some(&json!(["a", "b"])), Some(json!("c"))),
            Some(json!(["a", "b", "c"]))
        );
        assert_eq!(concat_groups(None, Some(json!("c"))), Some(json!(["c"])));
    }
}
