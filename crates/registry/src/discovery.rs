use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::activity::{ActivityDescriptor, ActivityMeta};
use crate::error::DiscoveryError;
use crate::framework::{FrameworkType, classify};
use crate::route_table::RouteTable;

const FALLBACK_DOMAIN: &str = "tools";
const APPS_DOMAIN: &str = "apps";

/// A directory searched for activities, relative to the base directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRoot {
    pub dir: PathBuf,
    /// Explicit domain; otherwise derived from `dir`.
    #[serde(default)]
    pub domain: Option<String>,
    /// Nested roots (`apps`) are searched up to three levels deep and only
    /// register directories that classify as a known framework.
    #[serde(default)]
    pub nested: bool,
}

impl SearchRoot {
    pub fn flat(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            domain: None,
            nested: false,
        }
    }

    pub fn nested(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            domain: None,
            nested: true,
        }
    }

    /// Domain for activities found directly under this root: the explicit
    /// domain, else the second path segment (`activities/<domain>`), else
    /// `tools`.
    pub fn domain_name(&self) -> String {
        if let Some(domain) = &self.domain {
            return domain.clone();
        }
        self.dir
            .components()
            .nth(1)
            .and_then(|component| component.as_os_str().to_str())
            .map(str::to_string)
            .unwrap_or_else(|| FALLBACK_DOMAIN.to_string())
    }
}

pub fn default_search_roots() -> Vec<SearchRoot> {
    vec![
        SearchRoot::flat("activities/causality"),
        SearchRoot::flat("activities/randomization"),
        SearchRoot::flat("activities/coding-practices"),
        SearchRoot::flat("activities/collaboration"),
        SearchRoot::flat("activities/tools"),
        SearchRoot::flat("templates"),
        SearchRoot::nested("apps"),
    ]
}

/// Walk every search root under `base_dir` and build the route table.
///
/// Roots are visited in order and entries in name order, so the outcome of
/// a route collision (the later discovery wins) is deterministic.
pub fn discover(base_dir: &Path, roots: &[SearchRoot]) -> RouteTable {
    let started = std::time::Instant::now();
    tracing::info!(base_dir = %base_dir.display(), event = "discovery_start", "activity discovery started");

    let mut table = RouteTable::new();
    for root in roots {
        let full_path = base_dir.join(&root.dir);
        if !full_path.is_dir() {
            tracing::debug!(directory = %root.dir.display(), "search root missing, skipping");
            continue;
        }
        tracing::debug!(
            directory = %root.dir.display(),
            full_path = %full_path.display(),
            "searching directory"
        );

        let result = if root.nested {
            discover_nested(&full_path, &mut table)
        } else {
            discover_flat(&full_path, &root.domain_name(), &mut table)
        };
        if let Err(err) = result {
            tracing::warn!(error = %err, "skipping search root");
        }
    }

    tracing::info!(
        duration_ms = started.elapsed().as_millis() as u64,
        activities_found = table.len(),
        event = "discovery_complete",
        "activity discovery completed"
    );
    table
}

fn discover_flat(root: &Path, domain: &str, table: &mut RouteTable) -> Result<(), DiscoveryError> {
    for (name, path) in child_directories(root)? {
        let detected = classify(&path);
        register(table, name, path, domain, detected);
    }
    Ok(())
}

/// `apps/<activity>`, `apps/<domain>/<activity>` and
/// `apps/activities/<domain>/<activity>` layouts all coexist.
fn discover_nested(root: &Path, table: &mut RouteTable) -> Result<(), DiscoveryError> {
    for (item, item_path) in child_directories(root)? {
        let detected = classify(&item_path);
        if detected != FrameworkType::Unknown {
            register(table, item, item_path, APPS_DOMAIN, detected);
            continue;
        }

        let children = match child_directories(&item_path) {
            Ok(children) => children,
            Err(err) => {
                tracing::warn!(error = %err, "skipping nested directory");
                continue;
            }
        };
        for (child, child_path) in children {
            let detected = classify(&child_path);
            if detected != FrameworkType::Unknown {
                register(table, child, child_path, &item, detected);
                continue;
            }

            let grandchildren = match child_directories(&child_path) {
                Ok(grandchildren) => grandchildren,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping nested directory");
                    continue;
                }
            };
            for (grandchild, grandchild_path) in grandchildren {
                let detected = classify(&grandchild_path);
                if detected != FrameworkType::Unknown {
                    register(table, grandchild, grandchild_path, &child, detected);
                }
            }
        }
    }
    Ok(())
}

/// Visible subdirectories of `dir`, sorted by name.
fn child_directories(dir: &Path) -> Result<Vec<(String, PathBuf)>, DiscoveryError> {
    let entries = std::fs::read_dir(dir).map_err(|source| DiscoveryError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut children = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!(path = %dir.display(), error = %err, "unreadable entry");
                continue;
            }
        };
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        children.push((name, path));
    }
    children.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(children)
}

fn register(
    table: &mut RouteTable,
    name: String,
    path: PathBuf,
    domain: &str,
    detected: FrameworkType,
) {
    let started = std::time::Instant::now();
    let meta = match ActivityMeta::load(&path) {
        Ok(meta) => meta,
        Err(err) => {
            tracing::debug!(error = %err, "ignoring activity metadata");
            None
        }
    };

    let activity = ActivityDescriptor::new(name, path, domain, detected, meta);
    tracing::info!(
        name = %activity.name,
        route = %activity.route,
        framework = %activity.framework,
        domain = %activity.domain,
        path = %activity.path.display(),
        duration_ms = started.elapsed().as_millis() as u64,
        event = "activity_registered",
        "activity registered"
    );

    let route = activity.route.clone();
    let new_path = activity.path.clone();
    if let Some(previous) = table.insert(activity) {
        tracing::warn!(
            route = %route,
            replaced = %previous.path.display(),
            path = %new_path.display(),
            event = "route_collision",
            "route already registered, later discovery wins"
        );
    }
}
