//! Persisted tag registry (`cached-fields.yml`).
//!
//! YAML shape, keyed by full dotted path:
//! ```yaml
//! host.os.name:
//!   key: host.os.name
//!   name: name
//!   scope: host.os
//!   type: string
//!   tag: 3
//!   deprecated: false
//! ```
//! A missing file is a first run. The file is read once per run. The
//! replacement is staged before the schema file is touched and committed
//! only once both outputs are staged.

use crate::error::RegistryError;
use crate::render::StagedWrite;
use crate::schema::{Field, FieldSet, MAX_TAG, RESERVED_TAGS, is_valid_tag, split_key};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub trait Registry {
    fn describe(&self) -> String;

    fn load(&self) -> Result<FieldSet<Field>, RegistryError>;

    /// Serialize `fields` and stage them as the next registry contents.
    /// Nothing is replaced until the returned write is committed.
    fn stage(&self, fields: &FieldSet<Field>) -> Result<StagedWrite, RegistryError>;
}

#[derive(Debug, Clone)]
pub struct YamlRegistry {
    path: PathBuf,
}

impl YamlRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io(&self, source: std::io::Error) -> RegistryError {
        RegistryError::Io {
            path: self.describe(),
            source,
        }
    }
}

impl Registry for YamlRegistry {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<FieldSet<Field>, RegistryError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(FieldSet::new()),
            Err(e) => return Err(self.io(e)),
        };

        if text.trim().is_empty() {
            return Ok(FieldSet::new());
        }

        let fields: Option<FieldSet<Field>> =
            serde_yaml::from_str(&text).map_err(|source| RegistryError::Yaml {
                path: self.describe(),
                source,
            })?;
        let fields = fields.unwrap_or_default();

        validate(&fields).map_err(|(key, reason)| RegistryError::Corrupt {
            path: self.describe(),
            key,
            reason,
        })?;

        Ok(fields)
    }

    fn stage(&self, fields: &FieldSet<Field>) -> Result<StagedWrite, RegistryError> {
        let yaml = to_yaml(fields).map_err(|source| RegistryError::Yaml {
            path: self.describe(),
            source,
        })?;
        StagedWrite::stage(&self.path, yaml.as_bytes()).map_err(|e| self.io(e))
    }
}

pub fn to_yaml(fields: &FieldSet<Field>) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(fields)
}

/// Entries must agree with their map key and have a usable tag.
fn validate(fields: &FieldSet<Field>) -> Result<(), (String, String)> {
    for (key, field) in fields {
        if field.key != *key {
            return Err((key.clone(), format!("entry key is {:?}", field.key)));
        }
        let (scope, name) = split_key(key);
        if field.scope != scope || field.name != name {
            return Err((
                key.clone(),
                format!(
                    "scope/name {:?}/{:?} do not match the key",
                    field.scope, field.name
                ),
            ));
        }
        if !is_valid_tag(field.tag) {
            return Err((
                key.clone(),
                format!(
                    "tag {} is outside 1..={} or inside the reserved range {}-{}",
                    field.tag,
                    MAX_TAG,
                    RESERVED_TAGS.start(),
                    RESERVED_TAGS.end()
                ),
            ));
        }
    }
    Ok(())
}
