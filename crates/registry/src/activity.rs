use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::error::DiscoveryError;
use crate::framework::FrameworkType;

pub const ACTIVITY_CONFIG_FILE: &str = "activity.config.json";

/// Optional per-activity metadata read from `activity.config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tech: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_type: Option<String>,
}

impl ActivityMeta {
    /// Read fields leniently: anything that is not a string is ignored, and a
    /// JSON value that is not an object yields empty metadata.
    pub fn from_value(value: &Value) -> Self {
        let field = |key: &str| {
            value
                .get(key)
                .and_then(|v| v.as_str())
                .map(|v| v.to_string())
        };
        Self {
            name: field("name"),
            tech: field("tech"),
            status: field("status"),
            description: field("description"),
            force_type: field("forceType"),
        }
    }

    /// Parse metadata from the raw contents of a config file.
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(contents)?;
        Ok(Self::from_value(&value))
    }

    /// Load `activity.config.json` from an activity directory.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn load(activity_dir: &Path) -> Result<Option<Self>, DiscoveryError> {
        let path = activity_dir.join(ACTIVITY_CONFIG_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).map_err(|source| {
            DiscoveryError::MetadataRead {
                path: path.clone(),
                source,
            }
        })?;
        Self::parse(&contents)
            .map(Some)
            .map_err(|source| DiscoveryError::MetadataParse { path, source })
    }

    /// Framework forced by `forceType`, when it names a known type.
    pub fn forced_type(&self) -> Option<FrameworkType> {
        self.force_type.as_deref().and_then(FrameworkType::parse)
    }
}

/// One discovered activity. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityDescriptor {
    pub name: String,
    pub path: PathBuf,
    pub domain: String,
    #[serde(rename = "type")]
    pub framework: FrameworkType,
    pub route: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ActivityMeta>,
}

impl ActivityDescriptor {
    /// Build a descriptor from its parts. A known `forceType` in the metadata
    /// replaces the detected framework, and `unknown` is stored as `static`.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        domain: impl Into<String>,
        detected: FrameworkType,
        meta: Option<ActivityMeta>,
    ) -> Self {
        let name = name.into();
        let domain = domain.into();
        let framework = meta
            .as_ref()
            .and_then(ActivityMeta::forced_type)
            .unwrap_or(detected)
            .served_as();
        let route = Self::route_for(&domain, &name);
        Self {
            name,
            path: path.into(),
            domain,
            framework,
            route,
            meta,
        }
    }

    pub fn route_for(domain: &str, name: &str) -> String {
        format!("/{}/{}", domain, name)
    }

    /// Name shown to people: the metadata name when present.
    pub fn display_name(&self) -> &str {
        self.meta
            .as_ref()
            .and_then(|meta| meta.name.as_deref())
            .unwrap_or(&self.name)
    }

    pub fn has_runtime(&self) -> bool {
        self.framework.has_runtime()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn force_type_overrides_detection() {
        let meta = ActivityMeta::parse(r#"{"forceType":"nextjs","name":"Block Randomization"}"#)
            .expect("parse");
        let activity = ActivityDescriptor::new(
            "smi-ran-blk-ran-v3",
            "/srv/activities/randomization/smi-ran-blk-ran-v3",
            "randomization",
            FrameworkType::Static,
            Some(meta),
        );
        assert_eq!(activity.framework, FrameworkType::Nextjs);
        assert_eq!(activity.route, "/randomization/smi-ran-blk-ran-v3");
        assert_eq!(activity.display_name(), "Block Randomization");
    }

    #[test]
    fn unrecognised_force_type_keeps_detected_type() {
        let meta = ActivityMeta::parse(r#"{"forceType":"express"}"#).expect("parse");
        let activity =
            ActivityDescriptor::new("x", "/tmp/x", "tools", FrameworkType::Vite, Some(meta));
        assert_eq!(activity.framework, FrameworkType::Vite);
    }

    #[test]
    fn unknown_is_stored_as_static() {
        let activity = ActivityDescriptor::new("x", "/tmp/x", "tools", FrameworkType::Unknown, None);
        assert_eq!(activity.framework, FrameworkType::Static);
        assert_eq!(activity.display_name(), "x");
    }

    #[test]
    fn non_string_fields_are_ignored() {
        let meta = ActivityMeta::parse(r#"{"name": 3, "status": "beta", "tech": ["react"]}"#)
            .expect("parse");
        assert_eq!(meta.name, None);
        assert_eq!(meta.status.as_deref(), Some("beta"));
        assert_eq!(meta.tech, None);

        let array = ActivityMeta::parse("[]").expect("parse");
        assert_eq!(array, ActivityMeta::default());
    }

    #[test]
    fn load_reports_missing_and_corrupt_files() {
        let dir = TempDir::new().expect("tempdir");
        assert!(matches!(ActivityMeta::load(dir.path()), Ok(None)));

        fs::write(dir.path().join(ACTIVITY_CONFIG_FILE), "{ not json").expect("write");
        assert!(matches!(
            ActivityMeta::load(dir.path()),
            Err(DiscoveryError::MetadataParse { .. })
        ));

        fs::write(
            dir.path().join(ACTIVITY_CONFIG_FILE),
            r#"{"description":"Drag the cards"}"#,
        )
        .expect("write");
        let meta = ActivityMeta::load(dir.path())
            .expect("load")
            .expect("present");
        assert_eq!(meta.description.as_deref(), Some("Drag the cards"));
    }
}
