//! Validated `$ref` identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::NormalizeError;
use crate::pointer::{escape_pointer_segment, split_path};

/// Where a document keeps its named schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefFlavor {
    /// Swagger 2.0: `#/definitions/<name>`.
    Definitions,
    /// OpenAPI 3: `#/components/schemas/<name>`.
    ComponentsSchemas,
}

impl RefFlavor {
    pub fn prefix(self) -> &'static str {
        match self {
            RefFlavor::Definitions => "#/definitions/",
            RefFlavor::ComponentsSchemas => "#/components/schemas/",
        }
    }

    /// Pointer segments leading to the named schemas.
    pub fn root_segments(self) -> &'static [&'static str] {
        match self {
            RefFlavor::Definitions => &["definitions"],
            RefFlavor::ComponentsSchemas => &["components", "schemas"],
        }
    }
}

/// A local `$ref` to a named schema, optionally continuing into it.
///
/// Parsed once on deserialization; passes never split `$ref` strings ad hoc.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DefRef {
    raw: String,
    flavor: RefFlavor,
    name: String,
    tail: Vec<String>,
}

impl DefRef {
    /// Parse a `$ref` string.
    pub fn parse(raw: &str) -> Result<Self, NormalizeError> {
        let invalid = || NormalizeError::InvalidRef {
            reference: raw.to_string(),
        };
        if !raw.starts_with("#/") {
            return Err(invalid());
        }
        let segments = split_path(raw);
        let (flavor, rest) = match segments.as_slice() {
            [first, rest @ ..] if first == "definitions" => (RefFlavor::Definitions, rest),
            [first, second, rest @ ..] if first == "components" && second == "schemas" => {
                (RefFlavor::ComponentsSchemas, rest)
            }
            _ => return Err(invalid()),
        };
        let Some((name, tail)) = rest.split_first() else {
            return Err(invalid());
        };
        if name.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            raw: raw.to_string(),
            flavor,
            name: name.clone(),
            tail: tail.to_vec(),
        })
    }

    /// Reference to the named definition.
    pub fn to_definition(name: &str, flavor: RefFlavor) -> Self {
        Self {
            raw: format!("{}{}", flavor.prefix(), escape_pointer_segment(name)),
            flavor,
            name: name.to_string(),
            tail: Vec::new(),
        }
    }

    /// The definition name this reference lands in.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pointer segments below the definition (empty for plain references).
    pub fn tail(&self) -> &[String] {
        &self.tail
    }

    pub fn flavor(&self) -> RefFlavor {
        self.flavor
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The same reference landing in definition `name` instead.
    pub fn renamed(&self, name: &str) -> Self {
        let mut renamed = Self::to_definition(name, self.flavor);
        for segment in &self.tail {
            renamed.raw.push('/');
            renamed.raw.push_str(&escape_pointer_segment(segment));
        }
        renamed.tail = self.tail.clone();
        renamed
    }

    /// The same reference with `suffix` appended to the definition name.
    pub fn with_suffix(&self, suffix: &str) -> Self {
        self.renamed(&format!("{}{}", self.name, suffix))
    }
}

impl TryFrom<String> for DefRef {
    type Error = NormalizeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DefRef::parse(&value)
    }
}

impl From<DefRef> for String {
    fn from(value: DefRef) -> Self {
        value.raw
    }
}

impl fmt::Display for DefRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
