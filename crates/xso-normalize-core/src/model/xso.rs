//! The XML Schema Object (XSO): one node of the definitions graph.
//!
//! Named fields appear in canonical output order. Keys the model does not
//! name land in the sorted `extra` bag, so serializing an `Xso` always yields
//! the canonical key order: whitelisted keys first, the rest alphabetically.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::reference::DefRef;

/// Keys that only live for the duration of generation and are never emitted.
pub const TEMPORARY_KEYS: &[&str] = &["x-ibm-basic-choice"];

/// XML serialization hints for an XSO.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Xml {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<bool>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Xml {
    /// Namespace-only record inherited from an enclosing XSO.
    pub fn inherited(from: &Xml) -> Self {
        Xml {
            namespace: from.namespace.clone(),
            prefix: from.prefix.clone(),
            ..Xml::default()
        }
    }

    pub fn is_attribute(&self) -> bool {
        self.attribute == Some(true)
    }
}

/// OpenAPI 3 discriminator object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Discriminator {
    #[serde(rename = "propertyName", skip_serializing_if = "Option::is_none")]
    pub property_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping: Option<IndexMap<String, String>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A bare `{"$ref": ...}` holder used by the indirection keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefObject {
    #[serde(rename = "$ref")]
    pub reference: DefRef,
}

/// `additionalProperties`: either a boolean or a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Bool(bool),
    Schema(Box<Xso>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Xso {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<Xso>>,
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<DefRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xml: Option<Xml>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub xso_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enumeration: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Value>,
    #[serde(rename = "exclusiveMinimum", skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<Value>,
    #[serde(rename = "exclusiveMaximum", skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<Value>,
    #[serde(rename = "minItems", skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(rename = "maxItems", skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(rename = "minLength", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(rename = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Xso>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, Xso>>,
    #[serde(rename = "allOf", skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<Xso>>,
    #[serde(rename = "oneOf", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Xso>>,
    #[serde(rename = "anyOf", skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<Xso>>,
    #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(rename = "x-nullable", skip_serializing_if = "Option::is_none")]
    pub x_nullable: Option<bool>,
    #[serde(rename = "x-ibm-whiteSpace", skip_serializing_if = "Option::is_none")]
    pub white_space: Option<Value>,
    #[serde(rename = "x-ibm-fractionDigits", skip_serializing_if = "Option::is_none")]
    pub fraction_digits: Option<Value>,
    #[serde(rename = "x-ibm-totalDigits", skip_serializing_if = "Option::is_none")]
    pub total_digits: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<Discriminator>,
    #[serde(rename = "x-ibm-discriminator", skip_serializing_if = "Option::is_none")]
    pub ibm_discriminator: Option<Value>,
    #[serde(rename = "x-xsi-type", skip_serializing_if = "Option::is_none")]
    pub xsi_type: Option<String>,
    #[serde(rename = "x-xsi-type-xml", skip_serializing_if = "Option::is_none")]
    pub xsi_type_xml: Option<Xml>,
    #[serde(rename = "x-xsi-type-abstract", skip_serializing_if = "Option::is_none")]
    pub xsi_type_abstract: Option<Value>,
    #[serde(rename = "x-xsi-type-uniquename", skip_serializing_if = "Option::is_none")]
    pub xsi_type_uniquename: Option<String>,
    #[serde(rename = "x-ibm-group", skip_serializing_if = "Option::is_none")]
    pub ibm_group: Option<Value>,
    #[serde(rename = "x-anyType", skip_serializing_if = "Option::is_none")]
    pub any_type: Option<Value>,
    #[serde(rename = "x-ibm-complex-restriction", skip_serializing_if = "Option::is_none")]
    pub complex_restriction: Option<Value>,
    #[serde(rename = "x-ibm-schema", skip_serializing_if = "Option::is_none")]
    pub ibm_schema: Option<Value>,
    #[serde(rename = "x-ibm-messages", skip_serializing_if = "Option::is_none")]
    pub ibm_messages: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,

    // Generation-time indirections, consumed by the pipeline.
    #[serde(rename = "typeOf", skip_serializing_if = "Option::is_none")]
    pub type_of: Option<RefObject>,
    #[serde(rename = "forPart", skip_serializing_if = "Option::is_none")]
    pub for_part: Option<Value>,
    #[serde(rename = "x-anc-ref", skip_serializing_if = "Option::is_none")]
    pub anc_ref: Option<RefObject>,
    #[serde(rename = "x-desc-ref", skip_serializing_if = "Option::is_none")]
    pub desc_ref: Option<Vec<RefObject>>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

macro_rules! with_xso_fields {
    ($callback:ident ! ($($args:tt)*)) => {
        $callback!($($args)*;
            not, reference, xml, description, xso_type, format, default, enumeration,
            minimum, maximum, exclusive_minimum, exclusive_maximum, min_items, max_items,
            pattern, min_length, max_length, items, properties, all_of, one_of, any_of,
            additional_properties, required, nullable, x_nullable, white_space,
            fraction_digits, total_digits, discriminator, ibm_discriminator, xsi_type,
            xsi_type_xml, xsi_type_abstract, xsi_type_uniquename, ibm_group, any_type,
            complex_restriction, ibm_schema, ibm_messages, example, type_of, for_part,
            anc_ref, desc_ref)
    };
}

macro_rules! overlay_fields {
    ($dst:expr, $src:expr; $($field:ident),+) => {
        $( if let Some(value) = &$src.$field { $dst.$field = Some(value.clone()); } )+
    };
}

macro_rules! fill_fields {
    ($dst:expr, $src:expr; $($field:ident),+) => {
        $( if $dst.$field.is_none() { $dst.$field = $src.$field.clone(); } )+
    };
}

impl Xso {
    /// A node that is nothing but a reference.
    pub fn reference_to(reference: DefRef) -> Self {
        Xso {
            reference: Some(reference),
            ..Xso::default()
        }
    }

    pub fn has_type(&self, ty: &str) -> bool {
        self.xso_type.as_deref() == Some(ty)
    }

    pub fn is_array(&self) -> bool {
        self.has_type("array")
    }

    /// Either nullable keyword, as a truthiness check.
    pub fn is_nullable(&self) -> bool {
        self.x_nullable == Some(true) || self.nullable == Some(true)
    }

    pub fn is_attribute(&self) -> bool {
        self.xml.as_ref().is_some_and(Xml::is_attribute)
    }

    /// Copy every field present on `source` onto `self`, overwriting.
    pub fn overlay(&mut self, source: &Xso) {
        with_xso_fields!(overlay_fields!(self, source));
        for (key, value) in &source.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }

    /// Copy fields present on `source` that `self` lacks.
    pub fn fill_missing(&mut self, source: &Xso) {
        with_xso_fields!(fill_fields!(self, source));
        for (key, value) in &source.extra {
            self.extra
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// The reference in `allOf[0]`, i.e. the base this XSO extends.
    pub fn base_ref(&self) -> Option<&DefRef> {
        self.all_of
            .as_ref()
            .and_then(|list| list.first())
            .and_then(|first| first.reference.as_ref())
    }

    pub fn base_ref_mut(&mut self) -> Option<&mut DefRef> {
        self.all_of
            .as_mut()
            .and_then(|list| list.first_mut())
            .and_then(|first| first.reference.as_mut())
    }

    /// Whether the node carries no information at all once a bare
    /// `type: object` with no properties is disregarded.
    pub fn is_vacuous(&self) -> bool {
        let mut bare = self.clone();
        if bare.has_type("object") {
            bare.xso_type = None;
        }
        if bare.properties.as_ref().is_some_and(IndexMap::is_empty) {
            bare.properties = None;
        }
        bare == Xso::default()
    }

    /// Follow pointer segments below this node
    /// (`properties/<k>`, `items`, `allOf|oneOf|anyOf/<i>`).
    pub fn descend(&self, tail: &[String]) -> Option<&Xso> {
        let Some((head, rest)) = tail.split_first() else {
            return Some(self);
        };
        match head.as_str() {
            "items" => self.items.as_deref()?.descend(rest),
            "properties" => {
                let (key, rest) = rest.split_first()?;
                self.properties.as_ref()?.get(key)?.descend(rest)
            }
            "allOf" | "oneOf" | "anyOf" => {
                let (index, rest) = rest.split_first()?;
                let index: usize = index.parse().ok()?;
                let list = match head.as_str() {
                    "allOf" => self.all_of.as_ref(),
                    "oneOf" => self.one_of.as_ref(),
                    _ => self.any_of.as_ref(),
                }?;
                list.get(index)?.descend(rest)
            }
            "not" => self.not.as_deref()?.descend(rest),
            "additionalProperties" => match self.additional_properties.as_ref()? {
                AdditionalProperties::Schema(schema) => schema.descend(rest),
                AdditionalProperties::Bool(_) => None,
            },
            _ => None,
        }
    }

    /// Visit every `$ref` anywhere below (and including) this node, together
    /// with whether it is a structural `allOf[0]` reference.
    pub fn for_each_ref(&self, f: &mut dyn FnMut(&DefRef, bool)) {
        self.for_each_ref_inner(false, f);
    }

    fn for_each_ref_inner(&self, structural: bool, f: &mut dyn FnMut(&DefRef, bool)) {
        if let Some(reference) = &self.reference {
            f(reference, structural);
        }
        for holder in [&self.type_of, &self.anc_ref].into_iter().flatten() {
            f(&holder.reference, false);
        }
        for holder in self.desc_ref.iter().flatten() {
            f(&holder.reference, false);
        }
        if let Some(not) = &self.not {
            not.for_each_ref_inner(false, f);
        }
        if let Some(items) = &self.items {
            items.for_each_ref_inner(false, f);
        }
        if let Some(AdditionalProperties::Schema(schema)) = &self.additional_properties {
            schema.for_each_ref_inner(false, f);
        }
        for prop in self.properties.iter().flat_map(IndexMap::values) {
            prop.for_each_ref_inner(false, f);
        }
        for (i, member) in self.all_of.iter().flatten().enumerate() {
            member.for_each_ref_inner(i == 0, f);
        }
        for member in self.one_of.iter().chain(self.any_of.iter()).flatten() {
            member.for_each_ref_inner(false, f);
        }
    }

    /// Rewrite every `$ref` (and discriminator mapping value) below and
    /// including this node.
    pub fn rewrite_refs(&mut self, f: &mut dyn FnMut(&DefRef) -> Option<DefRef>) {
        if let Some(reference) = &mut self.reference {
            if let Some(replacement) = f(reference) {
                *reference = replacement;
            }
        }
        for holder in [&mut self.type_of, &mut self.anc_ref].into_iter().flatten() {
            if let Some(replacement) = f(&holder.reference) {
                holder.reference = replacement;
            }
        }
        for holder in self.desc_ref.iter_mut().flatten() {
            if let Some(replacement) = f(&holder.reference) {
                holder.reference = replacement;
            }
        }
        if let Some(mapping) = self
            .discriminator
            .as_mut()
            .and_then(|d| d.mapping.as_mut())
        {
            for target in mapping.values_mut() {
                if let Ok(parsed) = DefRef::parse(target) {
                    if let Some(replacement) = f(&parsed) {
                        *target = replacement.to_string();
                    }
                }
            }
        }
        if let Some(not) = &mut self.not {
            not.rewrite_refs(f);
        }
        if let Some(items) = &mut self.items {
            items.rewrite_refs(f);
        }
        if let Some(AdditionalProperties::Schema(schema)) = &mut self.additional_properties {
            schema.rewrite_refs(f);
        }
        for prop in self.properties.iter_mut().flat_map(IndexMap::values_mut) {
            prop.rewrite_refs(f);
        }
        for member in self
            .all_of
            .iter_mut()
            .chain(self.one_of.iter_mut())
            .chain(self.any_of.iter_mut())
            .flatten()
        {
            member.rewrite_refs(f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn xso(value: Value) -> Xso {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_serialization_orders_whitelist_then_extras_sorted() {
        let node = xso(json!({
            "zeta": 1,
            "x-ibm-group": ["g"],
            "type": "string",
            "alpha": 2,
            "xml": { "prefix": "s1", "namespace": "urn:a" },
            "$ref": "#/definitions/A"
        }));
        let out = serde_json::to_string(&node).unwrap();
        assert_eq!(
            out,
            r##"{"$ref":"#/definitions/A","xml":{"namespace":"urn:a","prefix":"s1"},"type":"string","x-ibm-group":["g"],"alpha":2,"zeta":1}"##
        );
    }

    #[test]
    fn test_properties_keep_declaration_order() {
        let node = xso(json!({
            "type": "object",
            "properties": { "zulu": {"type": "string"}, "alpha": {"type": "string"} }
        }));
        let keys: Vec<_> = node.properties.unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["zulu", "alpha"]);
    }

    #[test]
    fn test_overlay_overwrites_present_fields_only() {
        let mut target = xso(json!({ "type": "string", "description": "keep" }));
        let source = xso(json!({ "type": "integer", "format": "int32", "custom": true }));
        target.overlay(&source);
        assert_eq!(target.xso_type.as_deref(), Some("integer"));
        assert_eq!(target.format.as_deref(), Some("int32"));
        assert_eq!(target.description.as_deref(), Some("keep"));
        assert_eq!(target.extra.get("custom"), Some(&json!(true)));
    }

    #[test]
    fn test_fill_missing_keeps_existing_fields() {
        let mut target = xso(json!({ "type": "object" }));
        let source = xso(json!({ "type": "string", "description": "d" }));
        target.fill_missing(&source);
        assert_eq!(target.xso_type.as_deref(), Some("object"));
        assert_eq!(target.description.as_deref(), Some("d"));
    }

    #[test]
    fn test_for_each_ref_flags_structural_head_only() {
        let node = xso(json!({
            "allOf": [
                { "$ref": "#/definitions/Base" },
                { "properties": { "p": { "$ref": "#/definitions/P" } } },
                { "$ref": "#/definitions/Other" }
            ]
        }));
        let mut seen = Vec::new();
        node.for_each_ref(&mut |r, structural| seen.push((r.name().to_string(), structural)));
        assert_eq!(
            seen,
            vec![
                ("Base".to_string(), true),
                ("P".to_string(), false),
                ("Other".to_string(), false)
            ]
        );
    }

    #[test]
    fn test_rewrite_refs_touches_mapping_values() {
        let mut node = xso(json!({
            "oneOf": [{ "$ref": "#/definitions/A" }],
            "discriminator": { "propertyName": "x", "mapping": { "a": "#/definitions/A" } }
        }));
        node.rewrite_refs(&mut |r| {
            (r.name() == "A").then(|| DefRef::parse("#/definitions/B").unwrap())
        });
        assert_eq!(
            node.one_of.as_ref().unwrap()[0].reference.as_ref().unwrap().name(),
            "B"
        );
        assert_eq!(
            node.discriminator.unwrap().mapping.unwrap()["a"],
            "#/definitions/B"
        );
    }

    #[test]
    fn test_descend_follows_tail() {
        let node = xso(json!({
            "allOf": [{ "properties": { "id": { "type": "integer" } } }]
        }));
        let tail: Vec<String> = ["allOf", "0", "properties", "id"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            node.descend(&tail).unwrap().xso_type.as_deref(),
            Some("integer")
        );
        assert!(node.descend(&["items".to_string()]).is_none());
    }

    #[test]
    fn test_null_values_deserialize_as_absent() {
        let node = xso(json!({ "type": "string", "default": null }));
        assert_eq!(node.default, None);
    }

    #[test]
    fn test_is_vacuous() {
        assert!(xso(json!({})).is_vacuous());
        assert!(xso(json!({ "type": "object", "properties": {} })).is_vacuous());
        assert!(!xso(json!({ "type": "object", "xml": { "namespace": "" } })).is_vacuous());
    }
}
