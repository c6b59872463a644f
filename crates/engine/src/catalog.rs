use pool::RuntimeStatus;
use registry::{ActivityDescriptor, FrameworkType};
use serde::Serialize;

/// One entry of `/api/activities`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivitySummary {
    pub name: String,
    pub domain: String,
    pub route: String,
    #[serde(rename = "type")]
    pub framework: FrameworkType,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tech: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Runtime state; only activities that run a runtime have one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeStatus>,
}

impl ActivitySummary {
    pub fn new(activity: &ActivityDescriptor, url: String, runtime: Option<RuntimeStatus>) -> Self {
        let meta = activity.meta.as_ref();
        Self {
            name: activity.display_name().to_string(),
            domain: activity.domain.clone(),
            route: activity.route.clone(),
            framework: activity.framework,
            url,
            tech: meta.and_then(|m| m.tech.clone()),
            status: meta.and_then(|m| m.status.clone()),
            description: meta.and_then(|m| m.description.clone()),
            runtime,
        }
    }
}
