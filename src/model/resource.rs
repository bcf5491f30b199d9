use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The clouds this engine understands. Closed set: an unrecognized
/// provider string is rejected at the boundary rather than stored as an
/// opaque string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudProvider {
    Aws,
    Azure,
    Gcp,
    DigitalOcean,
}

/// Identifies a resource within a provider's namespace. `(provider, id)` is
/// unique within whatever scope owns the resource set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub provider: CloudProvider,
    pub id: String,
}

impl ResourceRef {
    pub fn new(provider: CloudProvider, id: impl Into<String>) -> Self {
        Self {
            provider,
            id: id.into(),
        }
    }
}

/// A cloud resource as declared or observed. Identity is `(provider, id)`;
/// everything else is descriptive state that can drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub provider: CloudProvider,
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    pub region: String,
    pub status: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Resource {
    pub fn resource_ref(&self) -> ResourceRef {
        ResourceRef::new(self.provider, self.id.clone())
    }

    /// True if any tag key or value suggests this resource is load-bearing
    /// production infrastructure. Shared by the safety engine's
    /// `production_tag` condition and the planner's approval gating.
    pub fn has_production_signal(&self) -> bool {
        contains_any_ci(&self.name, &["production", "prod", "live", "critical"])
            || self.tags.iter().any(|(k, v)| {
                contains_any_ci(k, &["production", "prod", "live", "critical"])
                    || contains_any_ci(v, &["production", "prod", "live", "critical"])
            })
    }

    /// True if name or tags suggest this resource is critical/core
    /// infrastructure, independent of the production signal above.
    pub fn has_critical_signal(&self) -> bool {
        contains_any_ci(&self.name, &["critical", "essential", "core", "primary"])
            || self.tags.iter().any(|(k, v)| {
                contains_any_ci(k, &["critical", "essential", "core", "primary"])
                    || contains_any_ci(v, &["critical", "essential", "core", "primary"])
            })
    }
}

pub(crate) fn contains_any_ci(haystack: &str, needles: &[&str]) -> bool {
    let lower = haystack.to_lowercase();
    needles.iter().any(|n| lower.contains(n))
}

/// The closed set of drift classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftKind {
    Missing,
    Unmanaged,
    Modified,
    Orphaned,
}

/// Severity of an observed drift, also reused as the severity tier for
/// safety-policy and impact-analysis decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A single field-level difference between declared and actual state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Difference {
    pub path: String,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    /// Weight in `[0.0, 1.0]` describing how consequential this field is;
    /// used by the planner's risk scoring to escalate on sensitive fields.
    pub importance: f64,
}

/// A single drift finding against one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftObservation {
    pub resource_ref: ResourceRef,
    pub drift_kind: DriftKind,
    pub severity: Severity,
    pub differences: Vec<Difference>,
    pub detected_at: DateTime<Utc>,
}

impl DriftObservation {
    /// True if any difference touches a field on the force-new list,
    /// fields whose change cannot be applied in place and forces resource
    /// replacement.
    pub fn has_force_new_field(&self) -> bool {
        const FORCE_NEW_FIELDS: &[&str] = &[
            "ami",
            "instance_type",
            "availability_zone",
            "subnet_id",
            "vpc_id",
            "engine",
            "engine_version",
            "node_type",
            "location",
            "region",
            "zone",
        ];
        self.differences
            .iter()
            .any(|d| contains_any_ci(&d.path, FORCE_NEW_FIELDS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_resource(tags: &[(&str, &str)]) -> Resource {
        Resource {
            provider: CloudProvider::Aws,
            id: "i-123".into(),
            resource_type: "aws_instance".into(),
            name: "worker-1".into(),
            region: "us-east-1".into(),
            status: "running".into(),
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn production_signal_matches_tag_value_case_insensitively() {
        let resource = sample_resource(&[("env", "Production")]);
        assert!(resource.has_production_signal());
    }

    #[test]
    fn production_signal_absent_without_markers() {
        let resource = sample_resource(&[("env", "staging")]);
        assert!(!resource.has_production_signal());
    }

    #[test]
    fn force_new_field_detected_by_substring() {
        let obs = DriftObservation {
            resource_ref: ResourceRef::new(CloudProvider::Aws, "i-123"),
            drift_kind: DriftKind::Modified,
            severity: Severity::Medium,
            differences: vec![Difference {
                path: "InstanceType".into(),
                old_value: Some(serde_json::json!("t3.micro")),
                new_value: Some(serde_json::json!("t3.large")),
                importance: 0.9,
            }],
            detected_at: Utc::now(),
        };
        assert!(obs.has_force_new_field());
    }
}
