//! Field records and their proto type spelling.
//!
//! The cache stores types as the same strings that appear in the generated
//! `.proto` file ("int32", "repeated string", "map <string, string>",
//! "repeated Geo"), so `FieldType` round-trips through that spelling.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const MAP_SPELLING: &str = "map <string, string>";
const REPEATED_PREFIX: &str = "repeated ";

/// Element type of a field, before the `repeated` label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BaseType {
    /// A proto scalar such as `int32` or `string`.
    Scalar(String),
    /// `map <string, string>`.
    Map,
    /// A synthesized container message, e.g. `Geo`.
    Message(String),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldType {
    pub repeated: bool,
    pub base: BaseType,
}

impl FieldType {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            repeated: false,
            base: BaseType::Scalar(name.into()),
        }
    }

    pub fn message(name: impl Into<String>) -> Self {
        Self {
            repeated: false,
            base: BaseType::Message(name.into()),
        }
    }

    pub fn map() -> Self {
        Self {
            repeated: false,
            base: BaseType::Map,
        }
    }

    pub fn into_repeated(self) -> Self {
        Self {
            repeated: true,
            ..self
        }
    }

    /// Name used to look this type up in the legal-change table.
    pub fn base_name(&self) -> &str {
        match &self.base {
            BaseType::Scalar(s) | BaseType::Message(s) => s,
            BaseType::Map => MAP_SPELLING,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.repeated {
            f.write_str(REPEATED_PREFIX)?;
        }
        f.write_str(self.base_name())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (repeated, rest) = match s.strip_prefix(REPEATED_PREFIX) {
            Some(rest) => (true, rest.trim()),
            None => (false, s),
        };

        // Accept "map<string,string>" and friends as well as the canonical spelling.
        let compact: String = rest.chars().filter(|c| !c.is_whitespace()).collect();
        let base = if compact == "map<string,string>" {
            BaseType::Map
        } else if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(format!("invalid field type: {:?}", s));
        } else if rest.starts_with(|c: char| c.is_ascii_uppercase()) {
            BaseType::Message(rest.to_string())
        } else {
            BaseType::Scalar(rest.to_string())
        };

        Ok(Self { repeated, base })
    }
}

impl TryFrom<String> for FieldType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.to_string()
    }
}

/// A field as declared by the current source, before tagging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub key: String,
    pub name: String,
    pub scope: String,
    pub kind: FieldType,
}

/// A tagged field, as merged and as persisted in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub key: String,
    pub name: String,
    pub scope: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    pub tag: u32,
    #[serde(default)]
    pub deprecated: bool,
}

impl Field {
    pub fn from_decl(decl: &FieldDecl, tag: u32) -> Self {
        Self {
            key: decl.key.clone(),
            name: decl.name.clone(),
            scope: decl.scope.clone(),
            kind: decl.kind.clone(),
            tag,
            deprecated: false,
        }
    }
}

/// Largest field number proto3 accepts.
pub const MAX_TAG: u32 = 536_870_911;
/// Field numbers reserved by the protobuf implementation.
pub const RESERVED_TAGS: std::ops::RangeInclusive<u32> = 19_000..=19_999;

/// Whether `tag` may appear as a field number in the generated schema.
pub fn is_valid_tag(tag: u32) -> bool {
    (1..=MAX_TAG).contains(&tag) && !RESERVED_TAGS.contains(&tag)
}

/// Fields keyed by full dotted path.
pub type FieldSet<T> = BTreeMap<String, T>;

/// Split "a.b.c" into ("a.b", "c"); top-level keys have an empty scope.
pub fn split_key(key: &str) -> (&str, &str) {
    key.rsplit_once('.').unwrap_or(("", key))
}

/// Join a scope and a name back into a key.
pub fn join_key(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}
