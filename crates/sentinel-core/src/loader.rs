//! Resource loader: paths on disk → scan items.
//!
//! Loading never fails as a whole. A file that cannot be read or parsed
//! becomes an `Unreadable` item, which the scanner turns into a `READ_ERROR`
//! verdict without calling the backend.

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use serde_json::Value;
use tracing::{debug, warn};

use sentinel_contracts::{
    error::{SentinelError, SentinelResult},
    resource::{ResourceDescriptor, ResourceId},
};

/// Project manifests that are never infrastructure, skipped during
/// directory expansion.
pub const IGNORED_MANIFESTS: [&str; 3] = ["package.json", "package-lock.json", "tsconfig.json"];

/// One unit of work for the scanner.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanItem {
    /// A loaded resource ready for analysis.
    Ready(ResourceDescriptor),
    /// A source that could not be loaded.
    Unreadable {
        id: ResourceId,
        origin: String,
        reason: String,
    },
}

impl ScanItem {
    pub fn id(&self) -> &ResourceId {
        match self {
            ScanItem::Ready(d) => d.id(),
            ScanItem::Unreadable { id, .. } => id,
        }
    }

    fn with_id(self, id: ResourceId) -> Self {
        match self {
            ScanItem::Ready(d) => ScanItem::Ready(d.with_id(id)),
            ScanItem::Unreadable { origin, reason, .. } => ScanItem::Unreadable { id, origin, reason },
        }
    }
}

/// Expand `paths` into the files to scan, in discovery order.
///
/// Directories contribute their `*.json` files (non-recursive, sorted by
/// name), minus [`IGNORED_MANIFESTS`]. Plain paths are kept as given, even if
/// they do not exist, so the failure shows up as a per-file read error.
/// An empty `paths` means the current directory.
pub fn discover(paths: &[PathBuf]) -> Vec<Result<PathBuf, (PathBuf, String)>> {
    let defaults = [PathBuf::from(".")];
    let paths = if paths.is_empty() { &defaults[..] } else { paths };

    let mut found = Vec::new();
    for path in paths {
        if !path.is_dir() {
            found.push(Ok(path.clone()));
            continue;
        }

        match fs::read_dir(path) {
            Ok(entries) => {
                let mut files: Vec<PathBuf> = entries
                    .filter_map(|e| e.ok().map(|e| e.path()))
                    .filter(|p| p.is_file() && is_candidate(p))
                    .collect();
                files.sort();
                debug!(dir = %path.display(), files = files.len(), "directory expanded");
                found.extend(files.into_iter().map(Ok));
            }
            Err(e) => found.push(Err((path.clone(), format!("cannot list directory: {e}")))),
        }
    }
    found
}

fn is_candidate(path: &Path) -> bool {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let ignored = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| IGNORED_MANIFESTS.contains(&n));
    is_json && !ignored
}

/// Parse one IaC document.
///
/// An object with a `resources` array is a bundle: every element becomes its
/// own descriptor, with fallback id `"{file_name}#{index}"`. Anything else is
/// a single descriptor with fallback id `file_name`.
pub fn parse_document(
    text: &str,
    origin: &str,
    file_name: &str,
) -> SentinelResult<Vec<ResourceDescriptor>> {
    let document: Value = serde_json::from_str(text).map_err(|e| SentinelError::ReadError {
        reason: format!("invalid JSON: {e}"),
    })?;

    match document.get("resources") {
        Some(Value::Array(members)) => Ok(members
            .iter()
            .enumerate()
            .map(|(i, member)| {
                ResourceDescriptor::new(member.clone(), origin, format!("{file_name}#{i}"))
            })
            .collect()),
        _ => Ok(vec![ResourceDescriptor::new(document, origin, file_name)]),
    }
}

/// Load one file into scan items.
pub fn load_file(path: &Path) -> Vec<ScanItem> {
    let origin = path.display().to_string();
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| origin.clone());

    let loaded = fs::read_to_string(path)
        .map_err(|e| SentinelError::ReadError {
            reason: format!("cannot read file: {e}"),
        })
        .and_then(|text| parse_document(&text, &origin, &file_name));

    match loaded {
        Ok(descriptors) => descriptors.into_iter().map(ScanItem::Ready).collect(),
        Err(e) => {
            warn!(path = %origin, error = %e, "resource file could not be loaded");
            vec![ScanItem::Unreadable {
                id: ResourceId::new(file_name),
                origin,
                reason: e.reason().to_string(),
            }]
        }
    }
}

/// Discover and load every path, keeping ids unique within the run.
///
/// A repeated id gets a `~2`, `~3`, ... suffix so each resource maps to its
/// own audit key.
pub fn load_paths(paths: &[PathBuf]) -> Vec<ScanItem> {
    let mut items = Vec::new();
    for found in discover(paths) {
        match found {
            Ok(path) => items.extend(load_file(&path)),
            Err((path, reason)) => items.push(ScanItem::Unreadable {
                id: ResourceId::new(path.display().to_string()),
                origin: path.display().to_string(),
                reason,
            }),
        }
    }
    dedupe_ids(items)
}

fn dedupe_ids(items: Vec<ScanItem>) -> Vec<ScanItem> {
    let mut taken: HashSet<ResourceId> = HashSet::new();
    let mut last_suffix: HashMap<ResourceId, usize> = HashMap::new();
    items
        .into_iter()
        .map(|item| {
            let base = item.id().clone();
            if taken.insert(base.clone()) {
                return item;
            }
            // A generated name may collide with an id that appears verbatim.
            let suffix = last_suffix.entry(base.clone()).or_insert(1);
            let renamed = loop {
                *suffix += 1;
                let candidate = ResourceId::new(format!("{base}~{suffix}"));
                if !taken.contains(&candidate) {
                    break candidate;
                }
            };
            taken.insert(renamed.clone());
            item.with_id(renamed)
        })
        .collect()
}
