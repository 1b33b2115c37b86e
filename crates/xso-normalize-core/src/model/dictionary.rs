//! The namespace dictionary handed to the pipeline by the generation front end.
//!
//! Read-only: no pass mutates it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What kind of schema construct a definition was generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Element,
    Attribute,
    Type,
    Typedef,
    /// Any other kind the front end may emit.
    #[serde(other)]
    Other,
}

/// Per-definition metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictEntry {
    #[serde(rename = "for", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<EntryKind>,
    #[serde(rename = "typeNSName", default, skip_serializing_if = "Option::is_none")]
    pub type_ns_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(default)]
    pub prevent_optimize: bool,
    #[serde(rename = "suppressXSIType", default)]
    pub suppress_xsi_type: bool,
}

/// Generation options recorded in the dictionary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateOptions {
    /// Emit polymorphism as `oneOf` + `discriminator` (OpenAPI 3 style).
    #[serde(rename = "v3discriminator", default)]
    pub v3_discriminator: bool,
    /// Opaque request context, only used to attribute diagnostics.
    #[serde(rename = "req", default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dictionary {
    #[serde(rename = "dictEntry", default)]
    pub entries: HashMap<String, DictEntry>,
    #[serde(rename = "createOptions", default)]
    pub create_options: CreateOptions,
}

impl Dictionary {
    pub fn entry(&self, name: &str) -> Option<&DictEntry> {
        self.entries.get(name)
    }

    /// Whether `name` has a dictionary entry of the given kind.
    pub fn is_kind(&self, name: &str, kind: EntryKind) -> bool {
        self.entry(name).and_then(|e| e.kind) == Some(kind)
    }

    pub fn v3_discriminator(&self) -> bool {
        self.create_options.v3_discriminator
    }

    /// Short label of the request context for diagnostics.
    pub fn request_label(&self) -> String {
        match &self.create_options.request {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dictionary_deserializes_wire_shape() {
        let dict: Dictionary = serde_json::from_value(json!({
            "dictEntry": {
                "Foo_element_s1": { "for": "element", "typeNSName": "Foo_typedef_s1", "preventOptimize": true },
                "Foo_typedef_s1": { "for": "typedef", "schemaType": "typeOf", "typeNSName": "Foo_type_s1" },
                "Odd_s1": { "for": "group", "suppressXSIType": true }
            },
            "createOptions": { "v3discriminator": true, "req": "req-42" }
        }))
        .unwrap();

        let foo = dict.entry("Foo_element_s1").unwrap();
        assert_eq!(foo.kind, Some(EntryKind::Element));
        assert_eq!(foo.type_ns_name.as_deref(), Some("Foo_typedef_s1"));
        assert!(foo.prevent_optimize);
        assert_eq!(
            dict.entry("Foo_typedef_s1").unwrap().schema_type.as_deref(),
            Some("typeOf")
        );
        assert!(dict.is_kind("Odd_s1", EntryKind::Other));
        assert!(dict.entry("Odd_s1").unwrap().suppress_xsi_type);
        assert!(dict.v3_discriminator());
        assert_eq!(dict.request_label(), "req-42");
    }

    #[test]
    fn test_empty_dictionary_defaults() {
        let dict: Dictionary = serde_json::from_value(json!({})).unwrap();
        assert!(dict.entries.is_empty());
        assert!(!dict.v3_discriminator());
        assert_eq!(dict.request_label(), "");
    }
}
