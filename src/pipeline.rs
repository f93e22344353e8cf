//! One regeneration run: fetch, build, merge, render, persist.
//!
//! Both outputs are staged next to their targets before either is replaced,
//! so a failed run leaves the previous schema and registry untouched. The
//! registry is committed first: it is the input the schema is derived from.

use crate::Result;
use crate::hierarchy::build_fields;
use crate::merge::{MergeEvent, MergeReport, merge_fields};
use crate::registry::Registry;
use crate::render::{StagedWrite, render_proto};
use crate::schema::Conventions;
use crate::source::{FieldSource, FlatDocument, save_snapshot};
use anyhow::Context;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub declared: usize,
    pub merged: usize,
    pub report: MergeReport,
}

/// Run against an already fetched document.
pub fn regenerate(
    doc: &FlatDocument,
    registry: &dyn Registry,
    conventions: &Conventions,
    proto_path: &Path,
) -> Result<RunSummary> {
    let new_fields = build_fields(doc, conventions).context("build field hierarchy")?;
    log::info!("built {} fields from the source document", new_fields.len());

    let cached = registry
        .load()
        .with_context(|| format!("load registry {}", registry.describe()))?;
    log::info!("loaded {} cached fields from {}", cached.len(), registry.describe());

    let merged = merge_fields(&new_fields, &cached, conventions).context("assign field tags")?;
    for event in &merged.report.events {
        match event {
            MergeEvent::Renamed { .. } => log::warn!("{}", event),
            MergeEvent::Deprecated { .. } => log::info!("{}", event),
        }
    }

    let proto = render_proto(&merged.fields, conventions)?;

    let staged_registry = registry
        .stage(&merged.fields)
        .with_context(|| format!("stage registry {}", registry.describe()))?;
    let staged_proto = StagedWrite::stage(proto_path, proto.as_bytes())
        .with_context(|| format!("stage schema {}", proto_path.display()))?;

    staged_registry
        .commit()
        .with_context(|| format!("write registry {}", registry.describe()))?;
    let target = staged_proto.target().display().to_string();
    staged_proto
        .commit()
        .with_context(|| format!("write schema {}", target))?;

    Ok(RunSummary {
        declared: new_fields.len(),
        merged: merged.fields.len(),
        report: merged.report,
    })
}

/// Fetch from `source` and regenerate. With `snapshot = Some((dir, version))`
/// the fetched document is also kept as `<dir>/<version>.yml`.
pub fn run(
    source: &dyn FieldSource,
    registry: &dyn Registry,
    conventions: &Conventions,
    proto_path: &Path,
    snapshot: Option<(&Path, &str)>,
) -> Result<RunSummary> {
    log::info!("fetching {}", source.describe());
    let doc = source.fetch()?;

    if let Some((dir, version)) = snapshot {
        let path = save_snapshot(dir, version, &doc)?;
        log::info!("saved flat file snapshot to {}", path.display());
    }

    regenerate(&doc, registry, conventions, proto_path)
}
