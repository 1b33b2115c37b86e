//! Pass 1: Polymorphic hierarchy duplication
//!
//! A root element typed by a polymorphic base (`<xs:element name="Foo"
//! type="s1:Base"/>`) needs its own copy of the base's hierarchy so that
//! discriminator dispatch happens in the element's namespace. Descendants are
//! cloned as `<sub>_for_<root>` and ancestors as `<anc>_for_<root>`, all
//! carrying the root's `xml`.
//!
//! When that would create too many definitions, the element definitions are
//! replaced by their types instead.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::config::{NormalizeOptions, DUPLICATE_THRESHOLD};
use crate::error::NormalizeError;
use crate::hierarchy::{ancestor_refs, in_poly_hierarchy, sub_types, SubTypes};
use crate::model::{Definitions, Dictionary, Document, EntryKind};
use crate::passes::pass_result::PassResult;
use crate::report::Warning;
use crate::resolver::{find_refs, replace_refs};

const OPTIMIZE_STAGE: &str = "element optimization map";

/// Where a descendant clone goes and what it extends.
#[derive(Debug, Clone, PartialEq)]
struct ClonePlan {
    name: String,
    base: String,
}

/// Duplicate polymorphic hierarchies per root element.
pub fn duplicate_poly_hierarchy(
    document: &mut Document,
    dict: &Dictionary,
    options: &NormalizeOptions,
) -> Result<PassResult, NormalizeError> {
    let mut result = PassResult::unchanged();

    let potential = match optimize_root_elements_map(&document.definitions, dict, options) {
        Ok(map) => map,
        Err(e) if e.is_recoverable() => {
            tracing::warn!(req = %dict.request_label(), error = %e, "processing continues without element optimization");
            result.warnings.push(Warning::from_error(OPTIMIZE_STAGE, &e));
            IndexMap::new()
        }
        Err(e) => return Err(e),
    };

    let subs = sub_types(&document.definitions);
    let mut plans: IndexMap<String, IndexMap<String, ClonePlan>> = IndexMap::new();
    for (name, xso) in &document.definitions {
        let Some(type_name) = xso.xsi_type_uniquename.as_deref() else {
            continue;
        };
        if type_name != name {
            let mut plan = IndexMap::new();
            sub_type_plan(&mut plan, &subs, type_name, name, name, options.max_depth);
            plans.insert(name.clone(), plan);
        }
    }

    let for_elements: usize = potential
        .keys()
        .filter_map(|element| plans.get(element).map(|plan| (element, plan.len())))
        .map(|(element, clones)| {
            clones + ancestor_refs(&document.definitions, element, options.max_depth).len()
        })
        .sum();

    if for_elements > DUPLICATE_THRESHOLD {
        tracing::debug!(
            duplicates = for_elements,
            elements = potential.len(),
            "replacing root elements by their types"
        );
        let renames: HashMap<String, String> = potential.clone().into_iter().collect();
        replace_refs(document, &renames);
        for element in potential.keys() {
            if document.definitions.shift_remove(element).is_some() {
                result.removed.push(element.clone());
            }
        }
    }

    let names: Vec<String> = document.definitions.keys().cloned().collect();
    for name in names {
        let Some(plan) = plans.get(&name) else {
            continue;
        };
        let Some(root_xml) = document.definitions.get(&name).map(|d| d.xml.clone()) else {
            continue;
        };
        let definitions = &mut document.definitions;

        for (sub_type, clone_plan) in plan {
            if dict.is_kind(sub_type, EntryKind::Element)
                || definitions.contains_key(&clone_plan.name)
            {
                continue;
            }
            let Some(mut clone) = definitions.get(sub_type).cloned() else {
                continue;
            };
            clone.xml = root_xml.clone();
            if let Some(base) = clone.base_ref_mut() {
                *base = base.renamed(&clone_plan.base);
            }
            clone.xsi_type_uniquename = Some(clone_plan.name.clone());
            definitions.insert(clone_plan.name.clone(), clone);
            result.created.push(clone_plan.name.clone());
        }

        let suffix = format!("_for_{name}");
        let ancestors = ancestor_refs(definitions, &name, options.max_depth);
        for (i, ancestor) in ancestors.iter().enumerate() {
            let clone_name = format!("{}{suffix}", ancestor.name());
            if definitions.contains_key(&clone_name) {
                continue;
            }
            let Some(mut clone) = definitions.get(ancestor.name()).cloned() else {
                continue;
            };
            clone.xml = root_xml.clone();
            if i + 1 < ancestors.len() {
                if let Some(base) = clone.base_ref_mut() {
                    *base = base.with_suffix(&suffix);
                }
            }
            if let Some(unique) = clone.xsi_type_uniquename.as_mut() {
                unique.push_str(&suffix);
            }
            definitions.insert(clone_name.clone(), clone);
            result.created.push(clone_name);
        }
        if !ancestors.is_empty() {
            if let Some(base) = definitions.get_mut(&name).and_then(|d| d.base_ref_mut()) {
                *base = base.with_suffix(&suffix);
            }
        }
    }

    tracing::debug!(clones = result.created.len(), "duplicated polymorphic hierarchies");
    Ok(result)
}

/// Element → type candidates for replacing root elements by their types.
///
/// Fails with a recoverable error when a candidate element has no `xml`.
fn optimize_root_elements_map(
    definitions: &Definitions,
    dict: &Dictionary,
    options: &NormalizeOptions,
) -> Result<IndexMap<String, String>, NormalizeError> {
    let mut potential = IndexMap::new();
    let usage = find_refs(definitions);

    for (name, element) in definitions {
        let Some(entry) = dict.entry(name) else {
            continue;
        };
        if entry.kind != Some(EntryKind::Element) {
            continue;
        }
        let Some(ref_type) = entry.type_ns_name.as_deref() else {
            continue;
        };
        let Some(ref_entry) = dict.entry(ref_type) else {
            continue;
        };
        let def_entry = (ref_entry.schema_type.as_deref() == Some("typeOf"))
            .then(|| ref_entry.type_ns_name.as_deref())
            .flatten()
            .and_then(|def_type| dict.entry(def_type));
        if entry.prevent_optimize || def_entry.is_none() {
            continue;
        }
        let Some(type_xml) = definitions.get(ref_type).and_then(|t| t.xml.as_ref()) else {
            continue;
        };
        let element_xml = element
            .xml
            .as_ref()
            .ok_or_else(|| NormalizeError::UnexpectedTransform {
                stage: OPTIMIZE_STAGE.to_string(),
                message: format!("element {name} has no xml"),
            })?;
        if element_xml.namespace != type_xml.namespace {
            continue;
        }

        let ancestors = ancestor_refs(definitions, name, options.max_depth);
        if in_poly_hierarchy(definitions, name, &ancestors, &usage) {
            potential.insert(name.clone(), ref_type.to_string());
        }
    }
    Ok(potential)
}

/// Plan the clones of every (transitive) subtype of `base` for `root`.
fn sub_type_plan(
    plan: &mut IndexMap<String, ClonePlan>,
    subs: &SubTypes,
    base: &str,
    new_base: &str,
    root: &str,
    depth: usize,
) {
    let Some(children) = subs.get(base) else {
        return;
    };
    if depth == 0 {
        tracing::warn!(base, root, "subtype hierarchy too deep, clones truncated");
        return;
    }
    for sub_type in children {
        let name = format!("{sub_type}_for_{root}");
        plan.insert(
            sub_type.clone(),
            ClonePlan {
                name: name.clone(),
                base: new_base.to_string(),
            },
        );
        sub_type_plan(plan, subs, sub_type, &name, root, depth - 1);
    }
}
