//! Tag assignment: reconcile freshly built fields against the registry.
//!
//! A consumer compiled against an older generated schema must still decode
//! data written with the newer one. Therefore:
//! - a field whose key and (compatible) type survive keeps its tag
//! - a field whose type changed incompatibly gets a fresh tag, and the old
//!   definition stays behind as `deprecated_<name>_<tag>`
//! - a field that disappeared from the source stays, marked deprecated
//!
//! Tags are never freed, so a scope's next tag only ever grows. Fresh tags
//! skip the protobuf-reserved 19000-19999 block and stop at `MAX_TAG`.

use crate::error::MergeError;
use crate::schema::{
    Conventions, Field, FieldDecl, FieldSet, FieldType, MAX_TAG, RESERVED_TAGS, join_key,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeEvent {
    /// Incompatible type change; the old definition moved to `to_key`.
    Renamed {
        from_key: String,
        to_key: String,
        old_type: FieldType,
        new_type: FieldType,
        tag: u32,
    },
    /// Field no longer declared by the source.
    Deprecated { key: String, tag: u32 },
}

impl fmt::Display for MergeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeEvent::Renamed {
                from_key,
                to_key,
                old_type,
                new_type,
                tag,
            } => write!(
                f,
                "cannot change {} from {} to {}; the {} version (tag {}) will be renamed to {}",
                from_key, old_type, new_type, old_type, tag, to_key
            ),
            MergeEvent::Deprecated { key, tag } => {
                write!(f, "marking {} (tag {}) as deprecated", key, tag)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub events: Vec<MergeEvent>,
    /// Number of fields that received a newly allocated tag.
    pub allocated: usize,
}

#[derive(Debug, Clone)]
pub struct Merged {
    pub fields: FieldSet<Field>,
    pub report: MergeReport,
}

/// Merge the current declarations with the cached, tagged fields.
///
/// Scopes are visited in lexicographic order and fields within a scope in
/// key order, so the result depends only on the inputs.
///
/// Fails only when a scope needs a fresh tag above `MAX_TAG`.
pub fn merge_fields(
    new_fields: &FieldSet<FieldDecl>,
    cached: &FieldSet<Field>,
    conventions: &Conventions,
) -> Result<Merged, MergeError> {
    let new_by_scope = group_by_scope(new_fields.values(), |f| f.scope.as_str());
    let old_by_scope = group_by_scope(cached.values(), |f| f.scope.as_str());

    let scopes: BTreeSet<&str> = new_by_scope
        .keys()
        .chain(old_by_scope.keys())
        .copied()
        .collect();

    let mut merged: FieldSet<Field> = FieldSet::new();
    let mut report = MergeReport::default();

    for scope in scopes {
        let scoped_new = new_by_scope.get(scope).map(Vec::as_slice).unwrap_or(&[]);
        let scoped_old = old_by_scope.get(scope).map(Vec::as_slice).unwrap_or(&[]);

        let mut tags = TagAllocator::after(scope, scoped_old);
        log::debug!("scope {:?}: next tag starts at {}", scope, tags.next);

        for decl in scoped_new {
            let tag = match cached.get(&decl.key) {
                None => {
                    report.allocated += 1;
                    tags.allocate()?
                }
                Some(old) if conventions.is_compatible(&old.kind, &decl.kind) => old.tag,
                Some(old) => {
                    let renamed = retire(old, scope);
                    report.events.push(MergeEvent::Renamed {
                        from_key: old.key.clone(),
                        to_key: renamed.key.clone(),
                        old_type: old.kind.clone(),
                        new_type: decl.kind.clone(),
                        tag: old.tag,
                    });
                    merged.insert(renamed.key.clone(), renamed);

                    report.allocated += 1;
                    tags.allocate()?
                }
            };

            merged.insert(decl.key.clone(), Field::from_decl(decl, tag));
        }

        for old in scoped_old {
            if new_fields.contains_key(&old.key) {
                continue;
            }

            if !old.deprecated {
                report.events.push(MergeEvent::Deprecated {
                    key: old.key.clone(),
                    tag: old.tag,
                });
            }

            merged.insert(
                old.key.clone(),
                Field {
                    deprecated: true,
                    ..Field::clone(old)
                },
            );
        }
    }

    Ok(Merged {
        fields: merged,
        report,
    })
}

fn group_by_scope<'a, T, I, F>(fields: I, scope_of: F) -> BTreeMap<&'a str, Vec<&'a T>>
where
    I: Iterator<Item = &'a T>,
    F: Fn(&'a T) -> &'a str,
    T: 'a,
{
    let mut groups: BTreeMap<&str, Vec<&T>> = BTreeMap::new();
    for field in fields {
        groups.entry(scope_of(field)).or_default().push(field);
    }
    groups
}

/// Hands out fresh field numbers for one scope.
struct TagAllocator<'a> {
    scope: &'a str,
    /// Kept wide so stepping past `u32::MAX` cannot overflow.
    next: u64,
}

impl<'a> TagAllocator<'a> {
    /// Start one past the cached field count, or past the highest cached tag
    /// if a hand-edited registry left gaps.
    fn after(scope: &'a str, scoped_old: &[&Field]) -> Self {
        let count = scoped_old.len() as u64;
        let highest = scoped_old.iter().map(|f| u64::from(f.tag)).max().unwrap_or(0);
        Self {
            scope,
            next: count.max(highest) + 1,
        }
    }

    fn allocate(&mut self) -> Result<u32, MergeError> {
        let reserved_start = u64::from(*RESERVED_TAGS.start());
        let reserved_end = u64::from(*RESERVED_TAGS.end());
        if (reserved_start..=reserved_end).contains(&self.next) {
            self.next = reserved_end + 1;
        }

        let tag = u32::try_from(self.next)
            .ok()
            .filter(|t| *t <= MAX_TAG)
            .ok_or_else(|| MergeError::TagSpaceExhausted {
                scope: self.scope.to_string(),
                max: MAX_TAG,
            })?;
        self.next += 1;
        Ok(tag)
    }
}

/// The cached definition of a field whose type changed incompatibly.
fn retire(old: &Field, scope: &str) -> Field {
    let name = format!("deprecated_{}_{}", old.name, old.tag);
    Field {
        key: join_key(scope, &name),
        name,
        scope: scope.to_string(),
        kind: old.kind.clone(),
        tag: old.tag,
        deprecated: true,
    }
}
