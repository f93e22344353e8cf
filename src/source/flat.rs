use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One descriptor from `ecs_flat.yml`.
///
/// The ECS file carries many more attributes (description, example, level,
/// ...); only the two that affect the generated schema are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceField {
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub normalize: Vec<String>,
}

#[cfg(test)]
impl SourceField {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            normalize: vec![],
        }
    }

    pub fn array(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            normalize: vec!["array".to_string()],
        }
    }
}

/// Dotted field path -> descriptor.
pub type FlatDocument = BTreeMap<String, SourceField>;

fn null_as_empty<'de, D>(de: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(de)?.unwrap_or_default())
}

/// Parse the body of an `ecs_flat.yml` document.
pub fn parse_flat_document(text: &str, origin: &str) -> Result<FlatDocument, FetchError> {
    serde_yaml::from_str(text).map_err(|source| FetchError::Decode {
        origin: origin.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_descriptors_and_ignores_extra_attributes() {
        let text = r#"
'@timestamp':
  dashed_name: timestamp
  level: core
  normalize: []
  type: date
host.ip:
  description: Host ip addresses.
  normalize:
  - array
  type: ip
labels:
  normalize: ~
  type: object
"#;
        let doc = parse_flat_document(text, "test").unwrap();
        assert_eq!(doc.len(), 3);
        assert_eq!(doc["@timestamp"], SourceField::new("date"));
        assert_eq!(doc["host.ip"], SourceField::array("ip"));
        assert_eq!(doc["labels"], SourceField::new("object"));
    }

    #[test]
    fn missing_type_is_a_decode_error() {
        let err = parse_flat_document("a:\n  normalize: []\n", "inline").unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
        assert!(err.to_string().starts_with("inline is not a valid flat field document"));
    }
}
