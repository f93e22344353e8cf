//! Lookup tables that drive building and merging.
//!
//! These are plain data handed to the builder and merger, so tests can swap
//! in a narrower table without touching globals.

use crate::error::SchemaDefinitionError;
use crate::schema::field::{BaseType, FieldType};
use std::collections::{BTreeMap, BTreeSet};

/// How a source field's `normalize` hint resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalize {
    Scalar,
    Array,
}

const ARRAY_MARKER: &str = "array";

#[derive(Debug, Clone)]
pub struct Conventions {
    /// ECS primitive type -> proto element type.
    pub type_map: BTreeMap<String, BaseType>,
    /// Old proto type -> proto types it may become without breaking decoders.
    pub legal_changes: BTreeMap<String, BTreeSet<String>>,
    /// Accepted `normalize` values, compared as whole lists.
    pub normalize_policies: Vec<Vec<String>>,
    pub package: String,
    pub root_message: String,
}

impl Default for Conventions {
    fn default() -> Self {
        let scalar = |s: &str| BaseType::Scalar(s.to_string());

        let type_map = [
            ("binary", scalar("string")),
            ("boolean", scalar("bool")),
            ("byte", scalar("int32")),
            ("constant_keyword", scalar("string")),
            ("date", scalar("string")),
            ("date_nanos", scalar("int64")),
            ("double", scalar("double")),
            ("flattened", BaseType::Map),
            ("float", scalar("float")),
            ("geo_point", scalar("string")),
            ("half_float", scalar("float")),
            ("integer", scalar("int32")),
            ("ip", scalar("string")),
            ("keyword", scalar("string")),
            ("long", scalar("int64")),
            ("match_only_text", scalar("string")),
            ("object", BaseType::Map),
            ("scaled_float", scalar("double")),
            ("short", scalar("int32")),
            ("text", scalar("string")),
            ("unsigned_long", scalar("uint64")),
            ("wildcard", scalar("string")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let varints = ["int32", "uint32", "int64", "uint64", "bool"];
        let zigzag = ["sint32", "sint64"];

        let mut legal_changes: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut allow = |from: &str, to: &[&str]| {
            legal_changes
                .entry(from.to_string())
                .or_default()
                .extend(to.iter().map(|s| s.to_string()));
        };
        for from in varints {
            allow(from, &varints);
        }
        for from in zigzag {
            allow(from, &zigzag);
        }
        allow("fixed32", &["fixed32", "sfixed32"]);
        allow("fixed64", &["fixed64", "sfixed64"]);
        allow("enum", &["enum", "int32", "uint32", "int64", "uint64"]);

        Self {
            type_map,
            legal_changes,
            normalize_policies: vec![vec![], vec![ARRAY_MARKER.to_string()]],
            package: "elastic".to_string(),
            root_message: "CommonSchema".to_string(),
        }
    }
}

impl Conventions {
    /// Map an ECS primitive type name to its proto element type.
    pub fn proto_type(&self, key: &str, type_name: &str) -> Result<BaseType, SchemaDefinitionError> {
        self.type_map
            .get(type_name)
            .cloned()
            .ok_or_else(|| SchemaDefinitionError::UnknownType {
                key: key.to_string(),
                type_name: type_name.to_string(),
            })
    }

    pub fn normalize(&self, key: &str, normalize: &[String]) -> Result<Normalize, SchemaDefinitionError> {
        if !self.normalize_policies.iter().any(|p| p.as_slice() == normalize) {
            return Err(SchemaDefinitionError::UnknownNormalize {
                key: key.to_string(),
                normalize: normalize.to_vec(),
            });
        }
        if normalize.iter().any(|n| n == ARRAY_MARKER) {
            Ok(Normalize::Array)
        } else {
            Ok(Normalize::Scalar)
        }
    }

    /// Whether data written as `new` can still be read by a decoder built for `old`.
    pub fn is_compatible(&self, old: &FieldType, new: &FieldType) -> bool {
        if old == new {
            return true;
        }
        if old.repeated != new.repeated {
            return false;
        }
        match (&old.base, &new.base) {
            (BaseType::Scalar(from), BaseType::Scalar(to)) => self
                .legal_changes
                .get(from)
                .is_some_and(|allowed| allowed.contains(to)),
            _ => false,
        }
    }
}
