//! Build the field hierarchy from the flat ECS document.
//!
//! ECS only declares leaves ("host.os.name"); every intermediate segment
//! ("host", "host.os") becomes a container field whose type is a nested
//! message named after the segment.

use crate::error::SchemaDefinitionError;
use crate::schema::{
    BaseType, Conventions, FieldDecl, FieldSet, FieldType, Normalize, camelize, split_key,
};
use crate::source::{FlatDocument, SourceField};
use std::borrow::Cow;

/// ECS names its root timestamp `@timestamp`, which is not a valid identifier.
const RESERVED_TIMESTAMP: &str = "@timestamp";
const TIMESTAMP: &str = "timestamp";

/// Turn a flat document into untagged field declarations, containers included.
///
/// Nothing is returned unless every descriptor resolves.
pub fn build_fields(
    doc: &FlatDocument,
    conventions: &Conventions,
) -> Result<FieldSet<FieldDecl>, SchemaDefinitionError> {
    let doc = rename_timestamp(doc);
    let mut fields: FieldSet<FieldDecl> = FieldSet::new();

    // 1) Containers for every strict prefix of every declared path.
    for key in doc.keys() {
        let segments: Vec<&str> = key.split('.').collect();

        for level in 1..segments.len() {
            let parent_key = segments[..level].join(".");
            if fields.contains_key(&parent_key) {
                continue;
            }

            let parent_name = segments[level - 1];
            let mut kind = FieldType::message(camelize(parent_name));

            if let Some(declared) = doc.get(&parent_key) {
                if conventions.normalize(&parent_key, &declared.normalize)? == Normalize::Array {
                    kind = kind.into_repeated();
                }
            }

            fields.insert(
                parent_key.clone(),
                FieldDecl {
                    key: parent_key,
                    name: parent_name.to_string(),
                    scope: segments[..level - 1].join("."),
                    kind,
                },
            );
        }
    }

    // 2) Leaves. Declared keys that turned out to be containers keep the
    //    container type, but their descriptor must still be valid.
    for (key, declared) in doc.iter() {
        let base = conventions.proto_type(key, &declared.type_name)?;
        let normalize = conventions.normalize(key, &declared.normalize)?;

        if fields.contains_key(key) {
            continue;
        }

        let kind = match normalize {
            Normalize::Scalar => FieldType {
                repeated: false,
                base,
            },
            Normalize::Array if base == BaseType::Map => {
                return Err(SchemaDefinitionError::RepeatedMap { key: key.clone() });
            }
            Normalize::Array => FieldType {
                repeated: true,
                base,
            },
        };

        let (scope, name) = split_key(key);
        fields.insert(
            key.clone(),
            FieldDecl {
                key: key.clone(),
                name: name.to_string(),
                scope: scope.to_string(),
                kind,
            },
        );
    }

    log::debug!(
        "built {} fields from {} declared paths",
        fields.len(),
        doc.len()
    );

    Ok(fields)
}

fn rename_timestamp(doc: &FlatDocument) -> Cow<'_, FlatDocument> {
    match doc.get(RESERVED_TIMESTAMP) {
        None => Cow::Borrowed(doc),
        Some(timestamp) => {
            let mut renamed: FlatDocument = doc
                .iter()
                .filter(|(k, _)| k.as_str() != RESERVED_TIMESTAMP)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            renamed.insert(TIMESTAMP.to_string(), SourceField::clone(timestamp));
            Cow::Owned(renamed)
        }
    }
}
