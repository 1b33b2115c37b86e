//! Pass 6: Typed defaults and enumerations
//!
//! XSD facets arrive as strings. Defaults and enumeration values are
//! converted to the JSON type of the XSO they constrain. When the XSO has no
//! `type` of its own (a reference or a composition), its references are
//! inlined and the values moved down to the first primitive descendant.

use serde_json::{Number, Value};

use crate::config::NormalizeOptions;
use crate::error::NormalizeError;
use crate::model::{Document, Xso};
use crate::passes::pass_result::PassResult;
use crate::passes::pass_utils::{flag, inline_references};
use crate::walker::{walk_definitions, VisitContext, XsoVisitor};

struct Defaults {
    max_depth: usize,
}

impl XsoVisitor for Defaults {
    fn post(&mut self, xso: &mut Xso, ctx: &VisitContext<'_>) -> Result<(), NormalizeError> {
        let has_default = flag(&xso.default);
        if !has_default && xso.enumeration.is_none() {
            return Ok(());
        }

        if let Some(ty) = xso.xso_type.clone() {
            if has_default {
                xso.default = xso.default.as_ref().map(|v| convert_to(&ty, v));
            }
            for value in xso.enumeration.iter_mut().flatten() {
                *value = convert_to(&ty, value);
            }
            return Ok(());
        }

        inline_references(xso, ctx.definitions, &ctx.location(), self.max_depth)?;
        let default = xso.default.take().filter(|_| has_default);
        let enumeration = xso.enumeration.take();
        let target = match primitive_path(xso) {
            Some(path) => follow_mut(xso, &path),
            None => None,
        };
        if let Some(target) = target {
            let ty = target.xso_type.clone().unwrap_or_default();
            if let Some(default) = default {
                target.default = Some(convert_to(&ty, &default));
            }
            if let Some(values) = enumeration {
                target.enumeration = Some(values.iter().map(|v| convert_to(&ty, v)).collect());
            }
        } else {
            tracing::debug!(location = %ctx.location(), "no primitive type for default/enum");
        }
        Ok(())
    }
}

/// Convert string-valued defaults and enumerations to their declared type.
pub fn adjust_defaults(
    document: &mut Document,
    options: &NormalizeOptions,
) -> Result<PassResult, NormalizeError> {
    let flavor = document.flavor();
    let mut defaults = Defaults {
        max_depth: options.max_depth,
    };
    walk_definitions(&mut document.definitions, flavor, &mut defaults)?;
    Ok(PassResult::unchanged())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Items,
    AllOf(usize),
    OneOf(usize),
    AnyOf(usize),
}

/// Path to the first XSO with a primitive type: array items are followed,
/// objects give up, untyped compositions are searched member by member.
fn primitive_path(xso: &Xso) -> Option<Vec<Step>> {
    match xso.xso_type.as_deref() {
        Some("array") => {
            let mut path = primitive_path(xso.items.as_deref()?)?;
            path.insert(0, Step::Items);
            Some(path)
        }
        Some("object") => None,
        Some(_) => Some(Vec::new()),
        None => {
            let (members, step): (&Vec<Xso>, fn(usize) -> Step) =
                match (&xso.any_of, &xso.one_of, &xso.all_of) {
                    (Some(list), _, _) => (list, Step::AnyOf),
                    (None, Some(list), _) => (list, Step::OneOf),
                    (None, None, Some(list)) => (list, Step::AllOf),
                    (None, None, None) => return None,
                };
            members.iter().enumerate().find_map(|(i, member)| {
                let mut path = primitive_path(member)?;
                path.insert(0, step(i));
                Some(path)
            })
        }
    }
}

fn follow_mut<'a>(xso: &'a mut Xso, path: &[Step]) -> Option<&'a mut Xso> {
    let Some((head, rest)) = path.split_first() else {
        return Some(xso);
    };
    let next = match *head {
        Step::Items => xso.items.as_deref_mut()?,
        Step::AllOf(i) => xso.all_of.as_mut()?.get_mut(i)?,
        Step::OneOf(i) => xso.one_of.as_mut()?.get_mut(i)?,
        Step::AnyOf(i) => xso.any_of.as_mut()?.get_mut(i)?,
    };
    follow_mut(next, rest)
}

/// Convert a lexical XSD value to the JSON type `ty`.
///
/// Values that do not parse are returned unchanged.
pub fn convert_to(ty: &str, value: &Value) -> Value {
    match ty {
        "boolean" => {
            let parsed = match value {
                Value::String(s) => parse_primitive(s),
                other => other.clone(),
            };
            match parsed.as_f64() {
                Some(n) if n == 1.0 => Value::Bool(true),
                Some(n) if n == 0.0 => Value::Bool(false),
                _ => parsed,
            }
        }
        "number" | "integer" => match value {
            Value::String(s) => parse_number(s).map_or_else(|| value.clone(), Value::Number),
            other => other.clone(),
        },
        _ => value.clone(),
    }
}

fn parse_primitive(s: &str) -> Value {
    match s.trim() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        trimmed => parse_number(trimmed).map_or_else(|| Value::String(s.to_string()), Value::Number),
    }
}

fn parse_number(s: &str) -> Option<Number> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(n) = s.parse::<i64>() {
        return Some(n.into());
    }
    s.parse::<f64>().ok().and_then(Number::from_f64)
}
