//! Pass 7: Reachability pruning
//!
//! Keeps the definitions reachable from the operations (references found
//! under `paths`), plus `Security`, implicit `*_Header` definitions and,
//! optionally, root elements. A definition used as a value keeps its
//! polymorphic extensions alive too; a definition only used as a base does
//! not.

use indexmap::IndexMap;

use crate::config::NormalizeOptions;
use crate::error::NormalizeError;
use crate::hierarchy::extensions;
use crate::model::Document;
use crate::passes::pass_result::PassResult;
use crate::passes::pass_utils::flag;
use crate::resolver::{find_refs_in_value, find_refs_in_xso};

const SECURITY: &str = "Security";
const HEADER_SUFFIX: &str = "_Header";

#[derive(Debug, Default, Clone, Copy)]
struct Mark {
    traversed: bool,
    extensions_added: bool,
}

/// Delete every definition not reachable from the document's roots.
pub fn remove_unreferenced_definitions(
    document: &mut Document,
    options: &NormalizeOptions,
) -> Result<PassResult, NormalizeError> {
    let from_paths = document.paths().map(find_refs_in_value).unwrap_or_default();
    let definitions = &document.definitions;

    let mut keep: IndexMap<String, Mark> = definitions
        .iter()
        .filter(|(name, xso)| {
            name.as_str() == SECURITY
                || name.ends_with(HEADER_SUFFIX)
                || from_paths.contains_key(name.as_str())
                || (options.keep_root_elements
                    && xso.xml.as_ref().is_some_and(|xml| xml.name.is_some()))
        })
        .map(|(name, _)| (name.clone(), Mark::default()))
        .collect();

    while let Some(index) = keep.values().position(|mark| !mark.traversed) {
        let name = match keep.get_index_mut(index) {
            Some((name, mark)) => {
                mark.traversed = true;
                name.clone()
            }
            None => break,
        };
        let Some(def) = definitions.get(&name) else {
            continue;
        };

        for (target, usage) in find_refs_in_xso(def) {
            let mark = keep.entry(target.clone()).or_default();
            if usage.substitutable() == 0 || mark.extensions_added {
                continue;
            }
            let polymorphic = definitions
                .get(&target)
                .is_some_and(|xso| flag(&xso.ibm_discriminator));
            if !polymorphic {
                continue;
            }
            mark.extensions_added = true;
            for extension in extensions(definitions, &target) {
                keep.entry(extension).or_default().extensions_added = true;
            }
        }
    }

    let removed: Vec<String> = definitions
        .keys()
        .filter(|name| !keep.contains_key(name.as_str()))
        .cloned()
        .collect();
    for name in &removed {
        document.definitions.shift_remove(name);
    }
    tracing::debug!(
        kept = document.definitions.len(),
        removed = removed.len(),
        "removed unreferenced definitions"
    );
    Ok(PassResult::with_removed(removed))
}
