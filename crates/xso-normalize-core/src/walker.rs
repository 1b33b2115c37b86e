//! Depth-first traversal of the definitions graph with pre/post visitor hooks.
//!
//! Provides [`XsoVisitor`], the trait that passes implement, and
//! [`walk_definitions`], the driver that walks every definition and every
//! nested XSO reachable through `properties`, `items`, `allOf`, `oneOf` and
//! `anyOf`. All knowledge of which keys hold sub-schemas lives here.
//!
//! Each root is detached while it is walked, so visitors can read the rest of
//! the graph through [`VisitContext::definitions`] while mutating the current
//! node. Roots already walked are visible in their updated form.

use crate::error::NormalizeError;
use crate::model::{Definitions, RefFlavor, Xml, Xso};
use crate::pointer::render_path;

/// Snapshot of an enclosing XSO, taken after its pre hook ran.
#[derive(Debug, Clone)]
pub struct Frame {
    pub xml: Option<Xml>,
}

/// Where the visitor currently is.
#[derive(Debug)]
pub struct VisitContext<'a> {
    /// Name of the definition being walked.
    pub definition: &'a str,
    /// Segments from the definition root to the current node.
    pub path: &'a [String],
    /// Enclosing XSOs, outermost first.
    pub ancestors: &'a [Frame],
    /// The graph. The definition being walked appears as it was before this
    /// walk reached it.
    pub definitions: &'a Definitions,
    pub flavor: RefFlavor,
}

impl VisitContext<'_> {
    /// Whether the current node is the definition itself.
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// The last path segment (`items`, a property name, an index).
    pub fn key(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }

    /// The segment before the last one (`properties`, `allOf`, ...).
    pub fn parent_key(&self) -> Option<&str> {
        self.path
            .len()
            .checked_sub(2)
            .map(|i| self.path[i].as_str())
    }

    /// JSON Pointer of the current node, for diagnostics.
    pub fn location(&self) -> String {
        let mut segments: Vec<&str> = self.flavor.root_segments().to_vec();
        segments.push(self.definition);
        segments.extend(self.path.iter().map(String::as_str));
        render_path(&segments)
    }
}

/// A pass over the definitions graph. Both hooks are optional.
pub trait XsoVisitor {
    /// Called before descending. Children added here are visited.
    fn pre(&mut self, _xso: &mut Xso, _ctx: &VisitContext<'_>) -> Result<(), NormalizeError> {
        Ok(())
    }

    /// Called after all children were visited. May replace the node.
    fn post(&mut self, _xso: &mut Xso, _ctx: &VisitContext<'_>) -> Result<(), NormalizeError> {
        Ok(())
    }
}

struct Walk<'a> {
    definition: &'a str,
    definitions: &'a Definitions,
    flavor: RefFlavor,
    path: Vec<String>,
    frames: Vec<Frame>,
}

/// Walk every definition in its current key order.
///
/// Keys are snapshotted up front; definitions removed by an earlier root are
/// skipped and definitions added during the walk are not visited.
pub fn walk_definitions<V: XsoVisitor>(
    definitions: &mut Definitions,
    flavor: RefFlavor,
    visitor: &mut V,
) -> Result<(), NormalizeError> {
    let names: Vec<String> = definitions.keys().cloned().collect();
    for name in names {
        let Some(mut root) = definitions.get(&name).cloned() else {
            continue;
        };
        let mut walk = Walk {
            definition: &name,
            definitions: &*definitions,
            flavor,
            path: Vec::new(),
            frames: Vec::new(),
        };
        walk.node(&mut root, visitor)?;
        if let Some(slot) = definitions.get_mut(&name) {
            *slot = root;
        }
    }
    Ok(())
}

impl Walk<'_> {
    fn context(&self) -> VisitContext<'_> {
        VisitContext {
            definition: self.definition,
            path: &self.path,
            ancestors: &self.frames,
            definitions: self.definitions,
            flavor: self.flavor,
        }
    }

    fn node<V: XsoVisitor>(&mut self, xso: &mut Xso, visitor: &mut V) -> Result<(), NormalizeError> {
        visitor.pre(xso, &self.context())?;
        self.frames.push(Frame {
            xml: xso.xml.clone(),
        });

        if let Some(properties) = xso.properties.as_mut() {
            let keys: Vec<String> = properties.keys().cloned().collect();
            for key in keys {
                let Some(child) = properties.get_mut(&key) else {
                    continue;
                };
                self.path.push("properties".to_string());
                self.path.push(key);
                self.node(child, visitor)?;
                self.path.truncate(self.path.len() - 2);
            }
        }

        if let Some(items) = xso.items.as_deref_mut() {
            self.path.push("items".to_string());
            self.node(items, visitor)?;
            self.path.pop();
        }

        for (keyword, list) in [
            ("allOf", xso.all_of.as_mut()),
            ("oneOf", xso.one_of.as_mut()),
            ("anyOf", xso.any_of.as_mut()),
        ] {
            let Some(list) = list else { continue };
            for (i, member) in list.iter_mut().enumerate() {
                self.path.push(keyword.to_string());
                self.path.push(i.to_string());
                self.node(member, visitor)?;
                self.path.truncate(self.path.len() - 2);
            }
        }

        self.frames.pop();
        visitor.post(xso, &self.context())
    }
}
