//! The document under normalization: raw JSON plus the typed definitions graph.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::reference::{DefRef, RefFlavor};
use super::xso::Xso;
use crate::error::NormalizeError;

/// Definitions graph: unique name (`nsName`) → XSO, in key enumeration order.
pub type Definitions = IndexMap<String, Xso>;

/// A Swagger 2.0 or OpenAPI 3 document whose named schemas have been lifted
/// into a typed [`Definitions`] graph.
///
/// Everything that is not a named schema (`paths`, `parameters`, `info`, ...)
/// stays raw JSON and keeps its position on output.
#[derive(Debug, Clone)]
pub struct Document {
    raw: Map<String, Value>,
    flavor: RefFlavor,
    had_schemas: bool,
    pub definitions: Definitions,
}

impl Document {
    /// Lift the named schemas out of a raw JSON document.
    pub fn from_value(value: Value) -> Result<Self, NormalizeError> {
        let Value::Object(mut raw) = value else {
            return Err(NormalizeError::JsonError(serde::de::Error::custom(
                "document root must be a JSON object",
            )));
        };

        if let Some(slot) = raw.get_mut("definitions") {
            let definitions: Definitions = serde_json::from_value(slot.take())?;
            return Ok(Self {
                raw,
                flavor: RefFlavor::Definitions,
                had_schemas: true,
                definitions,
            });
        }

        let schemas_slot = raw
            .get_mut("components")
            .and_then(Value::as_object_mut)
            .and_then(|components| components.get_mut("schemas"));
        if let Some(slot) = schemas_slot {
            let definitions: Definitions = serde_json::from_value(slot.take())?;
            return Ok(Self {
                raw,
                flavor: RefFlavor::ComponentsSchemas,
                had_schemas: true,
                definitions,
            });
        }

        Ok(Self {
            raw,
            flavor: RefFlavor::Definitions,
            had_schemas: false,
            definitions: Definitions::new(),
        })
    }

    /// Parse a document from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, NormalizeError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Render the document back to JSON, definitions in their current order.
    pub fn to_value(&self) -> Result<Value, NormalizeError> {
        let mut raw = self.raw.clone();
        if self.had_schemas || !self.definitions.is_empty() {
            let schemas = serde_json::to_value(&self.definitions)?;
            match self.flavor {
                RefFlavor::Definitions => {
                    raw.insert("definitions".to_string(), schemas);
                }
                RefFlavor::ComponentsSchemas => {
                    let components = raw
                        .entry("components")
                        .or_insert_with(|| Value::Object(Map::new()));
                    if let Value::Object(components) = components {
                        components.insert("schemas".to_string(), schemas);
                    }
                }
            }
        }
        Ok(Value::Object(raw))
    }

    pub fn flavor(&self) -> RefFlavor {
        self.flavor
    }

    /// Reference to a definition of this document.
    pub fn def_ref(&self, name: &str) -> DefRef {
        DefRef::to_definition(name, self.flavor)
    }

    /// The `paths` section, if any.
    pub fn paths(&self) -> Option<&Value> {
        self.raw.get("paths")
    }

    /// Raw (non-definitions) content. The named-schema slot holds `null`
    /// while the document is lifted.
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    pub fn raw_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.raw
    }
}
