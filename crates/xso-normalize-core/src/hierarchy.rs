//! Subtype and ancestor relationships derived from `allOf[0]` links.
//!
//! Nothing here is cached: callers recompute after any pass that adds or
//! removes extension links.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::model::{DefRef, Definitions, Xso};
use crate::resolver::RefUsageMap;

/// Base definition name → names of the definitions extending it directly.
pub type SubTypes = IndexMap<String, Vec<String>>;

/// Scan every definition whose `allOf[0]` references another definition.
pub fn sub_types(definitions: &Definitions) -> SubTypes {
    let mut map = SubTypes::new();
    for (name, xso) in definitions {
        if let Some(base) = xso.base_ref() {
            map.entry(base.name().to_string())
                .or_default()
                .push(name.clone());
        }
    }
    map
}

/// The `allOf[0]` chain above `name`, nearest ancestor first.
///
/// A cyclic chain (or one longer than `max_depth`) is reported and cut.
pub fn ancestor_refs(definitions: &Definitions, name: &str, max_depth: usize) -> Vec<DefRef> {
    let mut chain = Vec::new();
    let mut seen = HashSet::from([name.to_string()]);
    let mut current = definitions.get(name);
    while let Some(base) = current.and_then(Xso::base_ref) {
        if chain.len() >= max_depth || !seen.insert(base.name().to_string()) {
            tracing::warn!(definition = name, ancestor = base.as_str(), "cyclic or too deep extension chain, ancestors truncated");
            break;
        }
        chain.push(base.clone());
        current = definitions.get(base.name());
    }
    chain
}

/// Every definition extending `base`, transitively through extensions that
/// are themselves polymorphic (carry `x-ibm-discriminator`).
pub fn extensions(definitions: &Definitions, base: &str) -> Vec<String> {
    let mut list = Vec::new();
    let mut pending = vec![base.to_string()];
    let mut seen = HashSet::from([base.to_string()]);
    while let Some(current) = pending.pop() {
        for (name, xso) in definitions {
            let extends = xso
                .base_ref()
                .is_some_and(|r| r.name() == current && r.tail().is_empty());
            if extends {
                list.push(name.clone());
                if xso.ibm_discriminator.is_some() && seen.insert(name.clone()) {
                    pending.push(name.clone());
                }
            }
        }
    }
    list
}

/// Whether `name` takes part in polymorphism: it extends something, or
/// something extends it (or the type it was generated for).
pub fn in_poly_hierarchy(
    definitions: &Definitions,
    name: &str,
    ancestors: &[DefRef],
    usage: &RefUsageMap,
) -> bool {
    if !ancestors.is_empty() {
        return true;
    }
    let extended = |n: &str| usage.get(n).is_some_and(|u| u.structural > 0);
    if extended(name) {
        return true;
    }
    definitions
        .get(name)
        .and_then(|xso| xso.xsi_type_uniquename.as_deref())
        .is_some_and(extended)
}

/// The `xsi:type` of an XSO as `{namespace}local`, or `local` when it has no
/// namespace. Abstract types have none.
pub fn xsi_type(xso: &Xso) -> Option<String> {
    let local = xso.xsi_type.as_deref()?;
    let is_abstract = xso
        .xsi_type_abstract
        .as_ref()
        .is_some_and(|v| v.as_bool().unwrap_or(!v.is_null()));
    if is_abstract {
        return None;
    }
    match xso
        .xsi_type_xml
        .as_ref()
        .and_then(|xml| xml.namespace.as_deref())
    {
        Some(ns) if !ns.is_empty() => Some(format!("{{{ns}}}{local}")),
        _ => Some(local.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::find_refs;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn defs(value: serde_json::Value) -> Definitions {
        serde_json::from_value(value).unwrap()
    }

    fn chain() -> Definitions {
        defs(json!({
            "Root": { "type": "object", "x-ibm-discriminator": true },
            "Mid": { "allOf": [{ "$ref": "#/definitions/Root" }, { "type": "object" }], "x-ibm-discriminator": true },
            "Leaf": { "allOf": [{ "$ref": "#/definitions/Mid" }, { "type": "object" }] },
            "Side": { "allOf": [{ "$ref": "#/definitions/Root" }] },
            "Alone": { "type": "string" }
        }))
    }

    #[test]
    fn test_sub_types() {
        let map = sub_types(&chain());
        assert_eq!(map["Root"], vec!["Mid", "Side"]);
        assert_eq!(map["Mid"], vec!["Leaf"]);
        assert!(!map.contains_key("Leaf"));
    }

    #[test]
    fn test_ancestor_refs_nearest_first() {
        let anc = ancestor_refs(&chain(), "Leaf", 64);
        let names: Vec<_> = anc.iter().map(DefRef::name).collect();
        assert_eq!(names, vec!["Mid", "Root"]);
        assert!(ancestor_refs(&chain(), "Root", 64).is_empty());
    }

    #[test]
    fn test_ancestor_refs_cuts_cycles() {
        let graph = defs(json!({
            "A": { "allOf": [{ "$ref": "#/definitions/B" }] },
            "B": { "allOf": [{ "$ref": "#/definitions/A" }] }
        }));
        let names: Vec<_> = ancestor_refs(&graph, "A", 64)
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(names, vec!["B"]);
        assert_eq!(ancestor_refs(&chain(), "Leaf", 1).len(), 1);
    }

    #[test]
    fn test_extensions_recurse_through_polymorphic_subtypes() {
        assert_eq!(extensions(&chain(), "Root"), vec!["Mid", "Side", "Leaf"]);
        assert!(extensions(&chain(), "Leaf").is_empty());
    }

    #[test]
    fn test_in_poly_hierarchy() {
        let graph = chain();
        let usage = find_refs(&graph);
        let anc = ancestor_refs(&graph, "Leaf", 64);
        assert!(in_poly_hierarchy(&graph, "Leaf", &anc, &usage));
        assert!(in_poly_hierarchy(&graph, "Root", &[], &usage));
        assert!(!in_poly_hierarchy(&graph, "Alone", &[], &usage));
    }

    #[test]
    fn test_xsi_type() {
        let qualified: Xso = serde_json::from_value(json!({
            "x-xsi-type": "Ext", "x-xsi-type-xml": { "namespace": "urn:s1" }
        }))
        .unwrap();
        assert_eq!(xsi_type(&qualified).as_deref(), Some("{urn:s1}Ext"));

        let unqualified: Xso = serde_json::from_value(json!({ "x-xsi-type": "Ext" })).unwrap();
        assert_eq!(xsi_type(&unqualified).as_deref(), Some("Ext"));

        let abstract_type: Xso = serde_json::from_value(json!({
            "x-xsi-type": "Base", "x-xsi-type-abstract": true
        }))
        .unwrap();
        assert_eq!(xsi_type(&abstract_type), None);
        assert_eq!(xsi_type(&Xso::default()), None);
    }
}
