//! Where the flat ECS field document comes from.
//!
//! The pipeline only sees the `FieldSource` trait:
//! - HttpSource: the versioned `ecs_flat.yml` on GitHub (default)
//! - FileSource: a local copy, for offline regeneration

pub mod flat;
pub mod http;

pub use flat::{FlatDocument, SourceField, parse_flat_document};
pub use http::HttpSource;

use crate::error::FetchError;
use std::fs;
use std::path::{Path, PathBuf};

pub trait FieldSource {
    /// Human-readable origin, used in log lines.
    fn describe(&self) -> String;

    fn fetch(&self) -> Result<FlatDocument, FetchError>;
}

/// Reads a flat document already on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FieldSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> Result<FlatDocument, FetchError> {
        let origin = self.describe();
        let text = fs::read_to_string(&self.path).map_err(|source| FetchError::Io {
            path: origin.clone(),
            source,
        })?;
        parse_flat_document(&text, &origin)
    }
}

/// Keep a copy of a fetched document as `<dir>/<version>.yml`.
pub fn save_snapshot(dir: &Path, version: &str, doc: &FlatDocument) -> anyhow::Result<PathBuf> {
    use anyhow::Context;

    // Refs like "release/8.x" become nested paths; keep the file flat.
    let file_name = format!("{}.yml", version.replace('/', "_"));
    let path = dir.join(file_name);

    fs::create_dir_all(dir).with_context(|| format!("create snapshot dir {}", dir.display()))?;
    let yaml = serde_yaml::to_string(doc)?;
    fs::write(&path, yaml).with_context(|| format!("write snapshot {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn file_source_reads_local_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ecs_flat.yml");
        fs::write(&path, "a.b:\n  type: keyword\n").unwrap();

        let doc = FileSource::new(&path).fetch().unwrap();
        assert_eq!(doc["a.b"], SourceField::new("keyword"));
    }

    #[test]
    fn file_source_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSource::new(dir.path().join("nope.yml")).fetch().unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
    }

    #[test]
    fn snapshot_reads_back_identically() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = FlatDocument::new();
        doc.insert("host.ip".into(), SourceField::array("ip"));
        doc.insert("message".into(), SourceField::new("match_only_text"));

        let path = save_snapshot(&dir.path().join("ecs_flat"), "release/8.x", &doc).unwrap();
        assert!(path.ends_with("ecs_flat/release_8.x.yml"));
        assert_eq!(FileSource::new(&path).fetch().unwrap(), doc);
    }
}
