use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::model::resource::CloudProvider;

/// The closed set of operations an action can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Import,
    Update,
    Delete,
    Create,
    Refresh,
    Move,
    Replace,
    Taint,
    Untaint,
}

impl ActionType {
    /// Per-type weight used by the planner's weighted-average risk score.
    pub fn risk_weight(self) -> f64 {
        match self {
            ActionType::Import => 0.2,
            ActionType::Update => 0.5,
            ActionType::Delete => 0.8,
            ActionType::Create => 0.3,
            ActionType::Refresh => 0.1,
            ActionType::Move => 0.4,
            ActionType::Replace => 0.9,
            ActionType::Taint => 0.6,
            ActionType::Untaint => 0.3,
        }
    }

    /// The rollback twin of this action type: taint<->untaint,
    /// import<->state_rm (modeled as delete), update<->restore (modeled as
    /// update), create<->delete. Types with no sensible inverse return
    /// `None` and are skipped during rollback synthesis.
    pub fn rollback_twin(self) -> Option<ActionType> {
        match self {
            ActionType::Taint => Some(ActionType::Untaint),
            ActionType::Untaint => Some(ActionType::Taint),
            ActionType::Import => Some(ActionType::Delete),
            ActionType::Create => Some(ActionType::Delete),
            ActionType::Update => Some(ActionType::Update),
            ActionType::Delete | ActionType::Replace | ActionType::Move | ActionType::Refresh => {
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Fields whose change always escalates risk to at least `high`.
const SENSITIVE_FIELDS: &[&str] = &[
    "security_group",
    "iam",
    "policy",
    "encryption",
    "backup",
    "deletion_protection",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationAction {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub resource_address: String,
    pub resource_type: String,
    pub provider: CloudProvider,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    #[serde(default)]
    pub pre_checks: Vec<String>,
    #[serde(default)]
    pub post_checks: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub timeout: Duration,
    pub retryable: bool,
    pub risk_level: RiskLevel,
    pub rollback: Option<Box<RemediationAction>>,
}

impl RemediationAction {
    /// Risk from severity, field sensitivity, and action type. Any factor
    /// can only raise the floor, never lower it.
    pub fn score_risk(
        action_type: ActionType,
        severity: crate::model::resource::Severity,
        changed_fields: &[String],
    ) -> RiskLevel {
        use crate::model::resource::Severity;

        let mut risk = match severity {
            Severity::Low => RiskLevel::Low,
            Severity::Medium => RiskLevel::Medium,
            Severity::High => RiskLevel::High,
            Severity::Critical => RiskLevel::Critical,
        };

        let sensitive = changed_fields
            .iter()
            .any(|f| crate::model::resource::contains_any_ci(f, SENSITIVE_FIELDS));
        if sensitive && risk < RiskLevel::High {
            risk = RiskLevel::High;
        }

        if matches!(action_type, ActionType::Replace | ActionType::Delete) && risk < RiskLevel::High
        {
            risk = RiskLevel::High;
        }
        if severity == Severity::Critical {
            risk = RiskLevel::Critical;
        }

        risk
    }
}
