//! Pass 4: Complex-content restrictions
//!
//! A `complexContent/restriction` is emitted as an extension
//! (`allOf: [{$ref: base}, {restricted content}]`) flagged with
//! `x-ibm-complex-restriction`. Restriction does not inherit the base's
//! elements, only its attributes, so the base reference is replaced by an
//! inline object carrying the attributes collected along the base chain.
//! Attributes marked `x-prohibited` by the restriction are dropped.

use indexmap::IndexMap;

use crate::config::NormalizeOptions;
use crate::error::NormalizeError;
use crate::model::{Document, Xso};
use crate::passes::p5_simplify::squash_all_ofs;
use crate::passes::pass_result::PassResult;
use crate::passes::pass_utils::is_truthy;
use crate::walker::{walk_definitions, VisitContext, XsoVisitor};

const PROHIBITED: &str = "x-prohibited";

struct Restriction {
    max_depth: usize,
    found: usize,
}

impl XsoVisitor for Restriction {
    fn post(&mut self, xso: &mut Xso, ctx: &VisitContext<'_>) -> Result<(), NormalizeError> {
        if xso.complex_restriction.take().is_none() {
            return Ok(());
        }
        self.found += 1;

        let Some(members) = xso.all_of.as_mut().filter(|list| list.len() > 1) else {
            return Ok(());
        };
        let Some(mut base) = members[0].reference.clone() else {
            return Ok(());
        };
        let had_properties = members[1].properties.is_some();
        let restricted = members[1].properties.take().unwrap_or_default();

        let mut attributes: IndexMap<String, Xso> = IndexMap::new();
        let mut collect = |properties: &IndexMap<String, Xso>| {
            for (key, prop) in properties {
                if prop.is_attribute() && !restricted.contains_key(key) {
                    attributes.insert(key.clone(), prop.clone());
                }
            }
        };

        let mut depth = 0;
        loop {
            depth += 1;
            if depth > self.max_depth {
                return Err(NormalizeError::DepthExceeded {
                    location: ctx.location(),
                    max_depth: self.max_depth,
                });
            }
            let Some(def) = ctx.definitions.get(base.name()) else {
                tracing::warn!(base = base.name(), "restriction base not found");
                break;
            };
            if let Some(properties) = &def.properties {
                collect(properties);
            }
            let mut next = None;
            for member in def.all_of.iter().flatten() {
                match (&member.reference, &member.properties) {
                    (Some(reference), _) => next = Some(reference.clone()),
                    (None, Some(properties)) => collect(properties),
                    (None, None) => {}
                }
            }
            match next {
                Some(reference) => base = reference,
                None => break,
            }
        }

        let restricted: IndexMap<String, Xso> = restricted
            .into_iter()
            .filter(|(_, prop)| !prop.extra.get(PROHIBITED).is_some_and(is_truthy))
            .collect();
        if had_properties || !restricted.is_empty() {
            members[1].properties = Some(restricted);
        }
        members[0] = Xso {
            xml: members[1].xml.clone(),
            xso_type: Some("object".to_string()),
            properties: Some(attributes),
            ..Xso::default()
        };
        Ok(())
    }
}

/// Rewrite every complex-content restriction into an extension of its
/// inherited attributes, then squash the resulting `allOf` wrappers.
pub fn process_complex_content_restriction(
    document: &mut Document,
    options: &NormalizeOptions,
) -> Result<PassResult, NormalizeError> {
    let flavor = document.flavor();
    let mut restriction = Restriction {
        max_depth: options.max_depth,
        found: 0,
    };
    walk_definitions(&mut document.definitions, flavor, &mut restriction)?;
    tracing::debug!(found = restriction.found, "processed complex restrictions");

    let mut result = PassResult::unchanged();
    if restriction.found > 0 {
        result.absorb(squash_all_ofs(document)?);
    }
    Ok(result)
}
