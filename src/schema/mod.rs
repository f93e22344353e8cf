//! Schema layer: field records, proto type spelling and the lookup tables.
//!
//! This module knows nothing about where fields come from or where they are
//! written. It owns:
//! - Field / FieldDecl records and FieldType
//! - Conventions (type map, legal type changes, normalize whitelist)

pub mod conventions;
pub mod field;

pub use conventions::{Conventions, Normalize};
pub use field::{
    BaseType, Field, FieldDecl, FieldSet, FieldType, MAX_TAG, RESERVED_TAGS, is_valid_tag, join_key,
    split_key,
};

/// Turn a snake_case path segment into a message name: "user_agent" -> "UserAgent".
pub fn camelize(segment: &str) -> String {
    segment
        .split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
