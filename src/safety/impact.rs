use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::resource::{contains_any_ci, DriftObservation, Resource, Severity};
use crate::planner::action::ActionType;

/// Per-change impact assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Impact {
    pub severity: Severity,
    pub data_loss_risk: bool,
    pub security_impact: bool,
    pub cost_impact: f64,
    pub compliance_impact: bool,
}

const STATEFUL_TYPES: &[&str] = &[
    "database",
    "storage",
    "blob",
    "statefulset",
    "elasticsearch",
    "redis",
    "kafka",
    "rds",
    "dynamodb",
];

const SECURITY_TYPES: &[&str] = &[
    "security_group",
    "iam",
    "policy",
    "firewall",
    "acl",
    "kms",
    "secret",
];

const COMPLIANCE_FIELDS: &[&str] = &["encryption", "iam", "network_security", "public_access"];

/// Baseline monthly cost by resource-type substring, in USD. A coarse
/// per-type table, not a pricing API integration (deliberately out of
/// scope).
static COST_BASELINES: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    HashMap::from([
        ("instance", 50.0),
        ("rds", 120.0),
        ("database", 120.0),
        ("loadbalancer", 25.0),
        ("bucket", 5.0),
        ("storage", 5.0),
        ("volume", 10.0),
        ("function", 2.0),
        ("subnet", 0.0),
        ("vpc", 0.0),
        ("security_group", 0.0),
    ])
});

fn baseline_cost(resource_type: &str) -> f64 {
    let lowered = resource_type.to_lowercase();
    COST_BASELINES
        .iter()
        .find(|(needle, _)| lowered.contains(**needle))
        .map(|(_, cost)| *cost)
        .unwrap_or(15.0)
}

/// Cost delta for applying `action_type` to a resource of `resource_type`,
/// relative to its baseline: deletes and replacements remove the baseline
/// spend, creates add it, everything else is cost-neutral.
fn cost_delta(resource_type: &str, action_type: ActionType) -> f64 {
    let baseline = baseline_cost(resource_type);
    match action_type {
        ActionType::Delete => -baseline,
        ActionType::Create | ActionType::Replace => baseline,
        _ => 0.0,
    }
}

pub fn assess(
    drift: &DriftObservation,
    resource: &Resource,
    action_type: ActionType,
) -> Impact {
    let data_loss_risk = matches!(action_type, ActionType::Delete | ActionType::Replace)
        && contains_any_ci(&resource.resource_type, STATEFUL_TYPES);

    let security_impact = contains_any_ci(&resource.resource_type, SECURITY_TYPES);

    let compliance_impact = drift
        .differences
        .iter()
        .any(|d| contains_any_ci(&d.path, COMPLIANCE_FIELDS));

    Impact {
        severity: drift.severity,
        data_loss_risk,
        security_impact,
        cost_impact: cost_delta(&resource.resource_type, action_type),
        compliance_impact,
    }
}
