//! Pass 2: Nillable / non-nillable split
//!
//! XSD lets one type be referenced as nillable in one place and non-nillable
//! in another; a JSON Schema definition has a single shape. Reference sites
//! carry `x-nullable: true` when nillable. Definitions used both ways are
//! cloned as `<name>_nil` and the nillable sites re-pointed at the clone;
//! definitions only used nillable are marked nullable in place.
//!
//! Nullability propagates down to subtypes and up to ancestors until no
//! definition changes.

use std::collections::HashSet;

use indexmap::IndexSet;

use crate::config::NormalizeOptions;
use crate::error::NormalizeError;
use crate::hierarchy::{ancestor_refs, sub_types};
use crate::model::{DefRef, Document, Xso};
use crate::passes::pass_result::PassResult;
use crate::passes::pass_utils::definition_location;
use crate::walker::{walk_definitions, VisitContext, XsoVisitor};

const NIL_SUFFIX: &str = "_nil";

/// A reference site: definition name plus path inside it.
type Site = (String, Vec<String>);

#[derive(Default)]
struct NullableCollector {
    nullable: IndexSet<String>,
    non_nullable: IndexSet<String>,
    sites: HashSet<Site>,
}

impl XsoVisitor for NullableCollector {
    fn post(&mut self, xso: &mut Xso, ctx: &VisitContext<'_>) -> Result<(), NormalizeError> {
        let Some(reference) = &xso.reference else {
            return Ok(());
        };
        if ctx.parent_key() == Some("allOf") {
            return Ok(());
        }
        let name = reference.name().to_string();
        if xso.x_nullable == Some(true) {
            xso.x_nullable = None;
            self.nullable.insert(name);
            self.sites
                .insert((ctx.definition.to_string(), ctx.path.to_vec()));
        } else {
            self.non_nullable.insert(name);
        }
        Ok(())
    }
}

struct Repoint<'a> {
    sites: &'a HashSet<Site>,
    split: &'a HashSet<String>,
}

impl XsoVisitor for Repoint<'_> {
    fn post(&mut self, xso: &mut Xso, ctx: &VisitContext<'_>) -> Result<(), NormalizeError> {
        let Some(reference) = xso.reference.as_mut() else {
            return Ok(());
        };
        if self.split.contains(reference.name())
            && self
                .sites
                .contains(&(ctx.definition.to_string(), ctx.path.to_vec()))
        {
            *reference = reference.with_suffix(NIL_SUFFIX);
        }
        Ok(())
    }
}

/// Split definitions referenced both nillable and non-nillable.
pub fn fixup_nil_and_non_nil(
    document: &mut Document,
    options: &NormalizeOptions,
) -> Result<PassResult, NormalizeError> {
    let flavor = document.flavor();
    let mut collector = NullableCollector::default();
    walk_definitions(&mut document.definitions, flavor, &mut collector)?;
    let NullableCollector {
        mut nullable,
        mut non_nullable,
        sites,
    } = collector;

    // A nillable base makes its extensions nillable and the other way round.
    let subs = sub_types(&document.definitions);
    loop {
        let mut changed = false;
        for set in [&mut nullable, &mut non_nullable] {
            let names: Vec<String> = set.iter().cloned().collect();
            for name in names {
                let related = subs
                    .get(&name)
                    .into_iter()
                    .flatten()
                    .cloned()
                    .chain(
                        ancestor_refs(&document.definitions, &name, options.max_depth)
                            .into_iter()
                            .map(|r| r.name().to_string()),
                    );
                for other in related {
                    changed |= set.insert(other);
                }
            }
        }
        if !changed {
            break;
        }
    }

    let split: HashSet<String> = nullable
        .iter()
        .filter(|name| non_nullable.contains(*name))
        .cloned()
        .collect();
    if !split.is_empty() {
        let mut repoint = Repoint {
            sites: &sites,
            split: &split,
        };
        walk_definitions(&mut document.definitions, flavor, &mut repoint)?;
    }

    let mut created = Vec::new();
    for name in &nullable {
        let missing = || {
            NormalizeError::unresolved(
                DefRef::to_definition(name, flavor).to_string(),
                definition_location(flavor, name),
            )
        };
        if !split.contains(name) {
            let def = document.definitions.get_mut(name).ok_or_else(missing)?;
            def.x_nullable = Some(true);
            continue;
        }

        let clone_name = format!("{name}{NIL_SUFFIX}");
        let ancestors = ancestor_refs(&document.definitions, name, options.max_depth);
        let def = document.definitions.get_mut(name).ok_or_else(missing)?;
        let mut clone = def.clone();
        if def.x_nullable == Some(true) {
            def.x_nullable = None;
        }

        let extends_with_content = clone.all_of.as_ref().is_some_and(|list| list.len() > 1);
        if !ancestors.is_empty() && extends_with_content {
            if let Some(base) = clone.base_ref_mut() {
                *base = base.with_suffix(NIL_SUFFIX);
            }
        }
        match clone.xsi_type_uniquename.as_mut() {
            Some(unique) => unique.push_str(NIL_SUFFIX),
            None => clone.xsi_type_uniquename = Some(clone_name.clone()),
        }
        clone.x_nullable = Some(true);
        document.definitions.insert(clone_name.clone(), clone);
        created.push(clone_name);
    }

    tracing::debug!(
        nullable = nullable.len(),
        split = split.len(),
        "fixed up nillable references"
    );
    Ok(PassResult::with_created(created))
}
