//! Typed failures for each stage of a run.
//!
//! Everything here is fatal: `main` prints the chain and exits non-zero.
//! Incompatible type changes during the merge are not errors; see
//! `merge::MergeEvent::Renamed`.

use thiserror::Error;

/// Failure to obtain the flat field document.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to retrieve flat file from {url}: HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("too many redirects while fetching {url} (limit {limit})")]
    TooManyRedirects { url: String, limit: usize },

    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("read flat file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{origin} is not a valid flat field document")]
    Decode {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// The source declares something the target IDL cannot represent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaDefinitionError {
    #[error("field {key} has unknown type {type_name:?}")]
    UnknownType { key: String, type_name: String },

    #[error("don't know how to handle {key}'s normalize setting: {normalize:?}")]
    UnknownNormalize { key: String, normalize: Vec<String> },

    #[error("field {key} would be a repeated map, which proto3 cannot express")]
    RepeatedMap { key: String },
}

/// The merger could not hand out another field number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("scope {scope:?} has no field numbers left (max {max})")]
    TagSpaceExhausted { scope: String, max: u32 },
}

/// Failure reading or writing the persisted tag registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("registry {path} is not valid YAML")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("registry {path} is corrupt at {key}: {reason}")]
    Corrupt {
        path: String,
        key: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn source_appears_once_in_alternate_chain() {
        let err = RegistryError::Io {
            path: "cached-fields.yml".into(),
            source: Error::new(ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "registry cached-fields.yml");

        let chain = format!("{:#}", anyhow::Error::from(err));
        assert_eq!(chain, "registry cached-fields.yml: denied");
    }

    #[test]
    fn decode_message_leaves_yaml_detail_to_the_source() {
        let source = serde_yaml::from_str::<u32>("[").unwrap_err();
        let detail = source.to_string();
        let err = FetchError::Decode {
            origin: "ecs_flat.yml".into(),
            source,
        };
        assert_eq!(err.to_string(), "ecs_flat.yml is not a valid flat field document");
        assert_eq!(format!("{:#}", anyhow::Error::from(err)).matches(&detail).count(), 1);
    }
}
