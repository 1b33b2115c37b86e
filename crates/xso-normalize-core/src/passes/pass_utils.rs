//! Shared helpers for rewrite passes.

use serde_json::Value;

use crate::error::NormalizeError;
use crate::model::{Definitions, RefFlavor, Xso};
use crate::pointer::render_path;
use crate::resolver::get_ref;

/// JavaScript-style truthiness of an annotation value.
///
/// Generators emit flags such as `x-ibm-discriminator` as booleans, strings
/// or objects; only `false`, `null`, `0` and `""` count as unset.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Whether an optional annotation is present and truthy.
pub fn flag(value: &Option<Value>) -> bool {
    value.as_ref().is_some_and(is_truthy)
}

/// Pointer to a definition, for diagnostics.
pub fn definition_location(flavor: RefFlavor, name: &str) -> String {
    let mut segments = flavor.root_segments().to_vec();
    segments.push(name);
    render_path(&segments)
}

/// Drop the `xsi:type` bookkeeping of an XSO.
pub fn strip_xsi_metadata(xso: &mut Xso) {
    xso.ibm_discriminator = None;
    xso.xsi_type = None;
    xso.xsi_type_xml = None;
    xso.xsi_type_uniquename = None;
    xso.xsi_type_abstract = None;
}

/// Replace `xso`'s own `$ref` with the referenced content, merged over
/// whatever else the node carries.
///
/// Returns whether anything was inlined.
pub fn inline_reference(
    xso: &mut Xso,
    definitions: &Definitions,
    location: &str,
) -> Result<bool, NormalizeError> {
    let Some(reference) = xso.reference.take() else {
        return Ok(false);
    };
    let target = get_ref(definitions, &reference, location)?;
    xso.overlay(target);
    Ok(true)
}

/// Inline every `$ref` on the way from `xso` to its primitive content.
///
/// Follows array `items` and composition members; object shapes are left
/// as they are. Inlined content may itself contain references; those are
/// inlined too, at most `max_depth` levels deep.
pub fn inline_references(
    xso: &mut Xso,
    definitions: &Definitions,
    location: &str,
    max_depth: usize,
) -> Result<(), NormalizeError> {
    inline_at_depth(xso, definitions, location, 0, max_depth)
}

fn inline_at_depth(
    xso: &mut Xso,
    definitions: &Definitions,
    location: &str,
    depth: usize,
    max_depth: usize,
) -> Result<(), NormalizeError> {
    let mut depth = depth;
    while inline_reference(xso, definitions, location)? {
        depth += 1;
        if depth > max_depth {
            return Err(NormalizeError::DepthExceeded {
                location: location.to_string(),
                max_depth,
            });
        }
    }
    if xso.has_type("object") {
        return Ok(());
    }
    if let Some(items) = xso.items.as_deref_mut() {
        inline_at_depth(items, definitions, location, depth, max_depth)?;
    }
    for member in xso
        .all_of
        .iter_mut()
        .chain(xso.one_of.iter_mut())
        .chain(xso.any_of.iter_mut())
        .flatten()
    {
        inline_at_depth(member, definitions, location, depth, max_depth)?;
    }
    Ok(())
}
