//! Reference resolution, counting and rewriting.
//!
//! All `$ref` handling goes through here: passes never look up a definition
//! by slicing a reference string. Raw document content (`paths`, parameters,
//! responses) is scanned as JSON since it is not part of the typed graph.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::NormalizeError;
use crate::model::{AdditionalProperties, DefRef, Definitions, Document, Xso};
use crate::pointer::render_path;

/// How often a definition is referenced.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefUsage {
    /// Every occurrence.
    pub count: usize,
    /// Occurrences as `allOf[0]`, i.e. as the base of an extension.
    pub structural: usize,
}

impl RefUsage {
    /// Occurrences where the definition is used as a value.
    pub fn substitutable(&self) -> usize {
        self.count - self.structural
    }

    fn record(&mut self, structural: bool) {
        self.count += 1;
        if structural {
            self.structural += 1;
        }
    }
}

/// Definition name → usage, in first-seen order.
pub type RefUsageMap = IndexMap<String, RefUsage>;

// ---------------------------------------------------------------------------
// Counting
// ---------------------------------------------------------------------------

/// Count references across every definition.
pub fn find_refs(definitions: &Definitions) -> RefUsageMap {
    let mut usage = RefUsageMap::new();
    for xso in definitions.values() {
        count_xso(xso, &mut usage);
    }
    usage
}

/// Count references below (and including) a single XSO.
pub fn find_refs_in_xso(xso: &Xso) -> RefUsageMap {
    let mut usage = RefUsageMap::new();
    count_xso(xso, &mut usage);
    usage
}

/// Count definition references in raw JSON. Non-definition pointers
/// (`#/parameters/...`) are ignored.
pub fn find_refs_in_value(value: &Value) -> RefUsageMap {
    let mut usage = RefUsageMap::new();
    scan_value(value, false, &mut |raw, structural| {
        if let Ok(reference) = DefRef::parse(raw) {
            usage
                .entry(reference.name().to_string())
                .or_default()
                .record(structural);
        }
    });
    usage
}

fn count_xso(xso: &Xso, usage: &mut RefUsageMap) {
    xso.for_each_ref(&mut |reference, structural| {
        usage
            .entry(reference.name().to_string())
            .or_default()
            .record(structural);
    });
}

fn scan_value(value: &Value, structural: bool, f: &mut dyn FnMut(&str, bool)) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(raw)) = map.get("$ref") {
                f(raw, structural);
            }
            for (key, child) in map {
                match (key.as_str(), child) {
                    ("$ref", _) => {}
                    ("allOf", Value::Array(members)) => {
                        for (i, member) in members.iter().enumerate() {
                            scan_value(member, i == 0, f);
                        }
                    }
                    _ => scan_value(child, false, f),
                }
            }
        }
        Value::Array(list) => {
            for child in list {
                scan_value(child, false, f);
            }
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Dereferencing
// ---------------------------------------------------------------------------

/// Dereference `reference`, following its pointer tail into the definition.
pub fn get_ref<'a>(
    definitions: &'a Definitions,
    reference: &DefRef,
    location: &str,
) -> Result<&'a Xso, NormalizeError> {
    definitions
        .get(reference.name())
        .and_then(|xso| xso.descend(reference.tail()))
        .ok_or_else(|| NormalizeError::unresolved(reference.as_str(), location))
}

/// `xso` itself when inline, otherwise the XSO its `$ref` resolves to.
pub fn get_def<'a>(
    definitions: &'a Definitions,
    xso: &'a Xso,
    location: &str,
) -> Result<&'a Xso, NormalizeError> {
    match &xso.reference {
        Some(reference) => get_ref(definitions, reference, location),
        None => Ok(xso),
    }
}

// ---------------------------------------------------------------------------
// Rewriting
// ---------------------------------------------------------------------------

/// Point every reference to a definition named in `renames` at its new name,
/// throughout the definitions and the raw document (discriminator mappings
/// included).
pub fn replace_refs(document: &mut Document, renames: &HashMap<String, String>) {
    if renames.is_empty() {
        return;
    }
    let mut rename = |reference: &DefRef| {
        renames
            .get(reference.name())
            .map(|target| reference.renamed(target))
    };
    for xso in document.definitions.values_mut() {
        xso.rewrite_refs(&mut rename);
    }
    for value in document.raw_mut().values_mut() {
        rewrite_value(value, false, &mut rename);
    }
}

fn rewrite_value(
    value: &mut Value,
    in_discriminator: bool,
    rename: &mut dyn FnMut(&DefRef) -> Option<DefRef>,
) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                match (key.as_str(), child) {
                    ("$ref", Value::String(raw)) => rewrite_string(raw, rename),
                    ("mapping", Value::Object(mapping)) if in_discriminator => {
                        for target in mapping.values_mut() {
                            if let Value::String(raw) = target {
                                rewrite_string(raw, rename);
                            }
                        }
                    }
                    (key, child) => rewrite_value(child, key == "discriminator", rename),
                }
            }
        }
        Value::Array(list) => {
            for child in list {
                rewrite_value(child, false, rename);
            }
        }
        _ => {}
    }
}

fn rewrite_string(raw: &mut String, rename: &mut dyn FnMut(&DefRef) -> Option<DefRef>) {
    if let Ok(reference) = DefRef::parse(raw) {
        if let Some(replacement) = rename(&reference) {
            *raw = replacement.into();
        }
    }
}

// ---------------------------------------------------------------------------
// Integrity
// ---------------------------------------------------------------------------

/// Every reference in the document that does not resolve, with its location.
pub fn dangling_references(document: &Document) -> Vec<NormalizeError> {
    let definitions = &document.definitions;
    let mut dangling = Vec::new();

    let root: Vec<String> = document
        .flavor()
        .root_segments()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for (name, xso) in definitions {
        let mut path = root.clone();
        path.push(name.clone());
        dangling_in_xso(xso, &mut path, definitions, &mut dangling);
    }

    for (key, value) in document.raw() {
        let mut path = vec![key.clone()];
        dangling_in_value(value, &mut path, definitions, &mut dangling);
    }
    dangling
}

fn check(
    reference: &DefRef,
    path: &[String],
    definitions: &Definitions,
    dangling: &mut Vec<NormalizeError>,
) {
    if let Err(e) = get_ref(definitions, reference, &render_path(path)) {
        dangling.push(e);
    }
}

fn dangling_in_xso(
    xso: &Xso,
    path: &mut Vec<String>,
    definitions: &Definitions,
    dangling: &mut Vec<NormalizeError>,
) {
    let own = xso
        .reference
        .iter()
        .chain(xso.type_of.iter().map(|h| &h.reference))
        .chain(xso.anc_ref.iter().map(|h| &h.reference))
        .chain(xso.desc_ref.iter().flatten().map(|h| &h.reference));
    for reference in own {
        check(reference, path, definitions, dangling);
    }
    let mapping = xso.discriminator.as_ref().and_then(|d| d.mapping.as_ref());
    for target in mapping.into_iter().flat_map(IndexMap::values) {
        if let Ok(reference) = DefRef::parse(target) {
            check(&reference, path, definitions, dangling);
        }
    }

    let mut children: Vec<(Vec<String>, &Xso)> = Vec::new();
    for (key, child) in xso.properties.iter().flatten() {
        children.push((vec!["properties".to_string(), key.clone()], child));
    }
    if let Some(items) = &xso.items {
        children.push((vec!["items".to_string()], &**items));
    }
    if let Some(not) = &xso.not {
        children.push((vec!["not".to_string()], &**not));
    }
    if let Some(AdditionalProperties::Schema(schema)) = &xso.additional_properties {
        children.push((vec!["additionalProperties".to_string()], &**schema));
    }
    for (keyword, list) in [
        ("allOf", &xso.all_of),
        ("oneOf", &xso.one_of),
        ("anyOf", &xso.any_of),
    ] {
        for (i, member) in list.iter().flatten().enumerate() {
            children.push((vec![keyword.to_string(), i.to_string()], member));
        }
    }

    for (segments, child) in children {
        let depth = path.len();
        path.extend(segments);
        dangling_in_xso(child, path, definitions, dangling);
        path.truncate(depth);
    }
}

fn dangling_in_value(
    value: &Value,
    path: &mut Vec<String>,
    definitions: &Definitions,
    dangling: &mut Vec<NormalizeError>,
) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(raw)) = map.get("$ref") {
                if let Ok(reference) = DefRef::parse(raw) {
                    check(&reference, path, definitions, dangling);
                }
            }
            for (key, child) in map {
                path.push(key.clone());
                dangling_in_value(child, path, definitions, dangling);
                path.pop();
            }
        }
        Value::Array(list) => {
            for (i, child) in list.iter().enumerate() {
                path.push(i.to_string());
                dangling_in_value(child, path, definitions, dangling);
                path.pop();
            }
        }
        _ => {}
    }
}
