//! Pass 3: `typeOf` expansion
//!
//! `typeOf` marks an XSO whose shape is that of another definition: a root
//! element or attribute typed by a named type, a type re-used in another
//! qualification context, or a message part. The runtime cannot follow this
//! indirection, so the (possibly chained) target is copied into the node.
//!
//! The node keeps its own `xml`, `example` and extension references. With
//! V3 discriminators enabled, polymorphic targets become an explicit `oneOf`
//! union with a `discriminator.mapping` keyed by xsi:type names.

use indexmap::IndexMap;

use crate::config::NormalizeOptions;
use crate::error::NormalizeError;
use crate::hierarchy::xsi_type;
use crate::model::{DefRef, Dictionary, Discriminator, Document, EntryKind, Xso};
use crate::passes::pass_result::PassResult;
use crate::passes::pass_utils::{flag, strip_xsi_metadata};
use crate::resolver::get_ref;
use crate::walker::{walk_definitions, VisitContext, XsoVisitor};

/// Property name announced by V3 discriminators.
pub const DISCRIMINATOR_PROPERTY: &str = "x-ibm-discriminator";

struct TypeOfExpander<'a> {
    dict: &'a Dictionary,
    max_depth: usize,
    expanded: usize,
}

impl XsoVisitor for TypeOfExpander<'_> {
    fn post(&mut self, xso: &mut Xso, ctx: &VisitContext<'_>) -> Result<(), NormalizeError> {
        let Some(type_of) = xso.type_of.take() else {
            return Ok(());
        };
        let is_part_usage = flag(&xso.for_part.take());
        let location = ctx.location();

        // Follow the chain to the final shape.
        let mut type_ref = type_of.reference.clone();
        let mut target = get_ref(ctx.definitions, &type_ref, &location)?;
        let mut desc = xso.desc_ref.clone().or_else(|| target.desc_ref.clone());
        let mut depth = 0;
        while let Some(next) = &target.type_of {
            depth += 1;
            if depth > self.max_depth {
                return Err(NormalizeError::DepthExceeded {
                    location,
                    max_depth: self.max_depth,
                });
            }
            type_ref = next.reference.clone();
            target = get_ref(ctx.definitions, &type_ref, &location)?;
            desc = desc.or_else(|| target.desc_ref.clone());
        }

        let type_entry = self.dict.entry(type_of.reference.name());
        let own_entry = self.dict.entry(ctx.definition);

        let mut expanded = target.clone();
        if xso.xml.is_some() {
            expanded.xml = xso.xml.take();
        }
        if xso.example.is_some() {
            expanded.example = xso.example.take();
        }
        if xso.anc_ref.is_some() {
            expanded.anc_ref = xso.anc_ref.take();
        }
        if xso.desc_ref.is_some() {
            expanded.desc_ref = xso.desc_ref.take();
        }

        if let Some(xml) = expanded.xml.as_mut() {
            if xml.attribute != Some(true) {
                xml.attribute = None;
            }
        }
        if let Some(anc) = expanded.anc_ref.as_ref().map(|a| a.reference.clone()) {
            if let Some(base) = expanded.base_ref_mut() {
                *base = anc;
            }
        }

        if expanded.is_attribute()
            || is_part_usage
            || own_entry.is_some_and(|e| e.suppress_xsi_type)
        {
            strip_xsi_metadata(&mut expanded);
        }
        if expanded.xsi_type_uniquename.is_some()
            && type_entry.and_then(|e| e.kind) == Some(EntryKind::Typedef)
        {
            expanded.xsi_type_uniquename = Some(ctx.definition.to_string());
        }

        if self.dict.v3_discriminator() && flag(&expanded.ibm_discriminator) {
            expanded.one_of = None;
            expanded.all_of = None;
            expanded.any_of = None;
            expanded.properties = None;
            expanded.xso_type = None;
            expanded.anc_ref = None;
            expanded.desc_ref = None;

            let members: Vec<DefRef> = std::iter::once(type_ref)
                .chain(desc.into_iter().flatten().map(|d| d.reference))
                .collect();
            let mapping = discriminator_mapping(&members, ctx, &location)?;
            expanded.one_of = Some(members.into_iter().map(Xso::reference_to).collect());
            expanded.discriminator = Some(Discriminator {
                property_name: Some(DISCRIMINATOR_PROPERTY.to_string()),
                mapping: Some(mapping),
                ..Discriminator::default()
            });
        }

        *xso = expanded;
        self.expanded += 1;
        Ok(())
    }
}

/// xsi:type name → member reference. The first member is also the default
/// (`""`). Each member is reachable by qualified name, local name, raw
/// reference and definition name.
fn discriminator_mapping(
    members: &[DefRef],
    ctx: &VisitContext<'_>,
    location: &str,
) -> Result<IndexMap<String, String>, NormalizeError> {
    let mut mapping = IndexMap::new();
    for (i, member) in members.iter().enumerate() {
        let target = get_ref(ctx.definitions, member, location)?;
        let Some(xsi) = xsi_type(target) else {
            continue;
        };
        let raw = member.as_str().to_string();
        if i == 0 {
            mapping.insert(String::new(), raw.clone());
        }
        let local = xsi.rsplit_once('}').map(|(_, local)| local.to_string());
        mapping.insert(xsi, raw.clone());
        if let Some(local) = local {
            mapping.insert(local, raw.clone());
        }
        mapping.insert(raw.clone(), raw.clone());
        mapping.insert(member.name().to_string(), raw);
    }
    Ok(mapping)
}

/// Expand every `typeOf` in the graph.
pub fn expand_type_ofs(
    document: &mut Document,
    dict: &Dictionary,
    options: &NormalizeOptions,
) -> Result<PassResult, NormalizeError> {
    let mut expander = TypeOfExpander {
        dict,
        max_depth: options.max_depth,
        expanded: 0,
    };
    let flavor = document.flavor();
    // Expanded content may carry typeOf nodes of its own; repeat until a
    // round finds nothing left to expand.
    let mut rounds = 0;
    loop {
        let before = expander.expanded;
        walk_definitions(&mut document.definitions, flavor, &mut expander)?;
        if expander.expanded == before {
            break;
        }
        rounds += 1;
        if rounds > options.max_depth {
            return Err(NormalizeError::DepthExceeded {
                location: flavor.prefix().trim_end_matches('/').to_string(),
                max_depth: options.max_depth,
            });
        }
    }

    // Every union now carries its own discriminator.
    if dict.v3_discriminator() {
        for xso in document.definitions.values_mut() {
            xso.ibm_discriminator = None;
        }
    }

    tracing::debug!(expanded = expander.expanded, rounds, "expanded typeOf indirections");
    Ok(PassResult::unchanged())
}
