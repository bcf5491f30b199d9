use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::model::resource::{DriftObservation, Resource};

/// How strictly a policy's violations are enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Enforcement {
    Advisory,
    Warning,
    Blocking,
}

/// What happens when a rule's condition is met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Block,
    Warn,
    RequireApproval,
}

/// The closed set of built-in conditions a rule can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    ProductionTag,
    BusinessHours,
    CriticalResource,
    HighSeverityDrift,
    CostThreshold,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub description: String,
    pub condition: Condition,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    pub action: RuleAction,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    pub description: String,
    pub rules: Vec<Rule>,
    pub enforcement: Enforcement,
    pub last_updated: DateTime<Utc>,
}

/// The outcome of evaluating one rule against one change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub policy_name: String,
    pub rule_id: String,
    pub action: RuleAction,
    pub message: String,
}

/// Options supplied alongside a validation request. `force` overrides a
/// blocking outcome; the rest feed threshold and condition evaluation.
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    pub force: bool,
    pub cost_threshold: Option<f64>,
    pub now: Option<DateTime<Utc>>,
}

/// Evaluates a single rule's condition against `(drift, resource, options)`.
/// Returns `true` when the condition is met (i.e. the rule fires).
pub fn evaluate_condition(
    rule: &Rule,
    drift: &DriftObservation,
    resource: &Resource,
    options: &ValidationOptions,
) -> bool {
    match rule.condition {
        Condition::ProductionTag => resource.has_production_signal(),
        Condition::BusinessHours => business_hours_violation(rule, options),
        Condition::CriticalResource => resource.has_critical_signal(),
        Condition::HighSeverityDrift => {
            matches!(
                drift.severity,
                crate::model::resource::Severity::High | crate::model::resource::Severity::Critical
            )
        }
        Condition::CostThreshold => cost_threshold_violation(rule, options),
    }
}

fn business_hours_violation(rule: &Rule, options: &ValidationOptions) -> bool {
    let start = rule
        .parameters
        .get("start_hour")
        .and_then(Value::as_u64)
        .unwrap_or(u64::from(*crate::config::BUSINESS_HOURS_START));
    let end = rule
        .parameters
        .get("end_hour")
        .and_then(Value::as_u64)
        .unwrap_or(u64::from(*crate::config::BUSINESS_HOURS_END));

    let now = options.now.unwrap_or_else(Utc::now);
    use chrono::{Datelike, Timelike, Weekday};
    let is_weekend = matches!(now.weekday(), Weekday::Sat | Weekday::Sun);
    let hour = u64::from(now.hour());
    let outside_hours = hour < start || hour >= end;
    is_weekend || outside_hours
}

fn cost_threshold_violation(rule: &Rule, options: &ValidationOptions) -> bool {
    let threshold = rule
        .parameters
        .get("amount")
        .and_then(Value::as_f64)
        .unwrap_or(f64::MAX);
    options
        .cost_threshold
        .map(|cost| cost > threshold)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::resource::{CloudProvider, Difference, DriftKind, ResourceRef, Severity};
    use std::collections::HashMap as Map;

    fn resource(tags: &[(&str, &str)]) -> Resource {
        Resource {
            provider: CloudProvider::Aws,
            id: "i-1".into(),
            resource_type: "aws_instance".into(),
            name: "app".into(),
            region: "us-east-1".into(),
            status: "running".into(),
            tags: tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            metadata: Map::new(),
            created_at: Utc::now(),
        }
    }

    fn drift(severity: Severity) -> DriftObservation {
        DriftObservation {
            resource_ref: ResourceRef::new(CloudProvider::Aws, "i-1"),
            drift_kind: DriftKind::Modified,
            severity,
            differences: vec![Difference {
                path: "status".into(),
                old_value: None,
                new_value: None,
                importance: 0.1,
            }],
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn production_tag_condition_fires_on_tag_value() {
        let rule = Rule {
            id: "r1".into(),
            description: "prod guard".into(),
            condition: Condition::ProductionTag,
            parameters: Map::new(),
            action: RuleAction::Block,
            message: "Resource has production tags, manual approval required".into(),
        };
        let res = resource(&[("env", "production")]);
        assert!(evaluate_condition(&rule, &drift(Severity::Low), &res, &ValidationOptions::default()));
    }

    #[test]
    fn high_severity_condition_requires_high_or_critical() {
        let rule = Rule {
            id: "r2".into(),
            description: "severity guard".into(),
            condition: Condition::HighSeverityDrift,
            parameters: Map::new(),
            action: RuleAction::Warn,
            message: "high severity".into(),
        };
        let res = resource(&[]);
        assert!(!evaluate_condition(&rule, &drift(Severity::Medium), &res, &ValidationOptions::default()));
        assert!(evaluate_condition(&rule, &drift(Severity::High), &res, &ValidationOptions::default()));
    }
}
