use dashmap::DashMap;
use tracing::{info, warn};

use super::impact::{self, Impact};
use super::policy::{evaluate_condition, Policy, RuleAction, ValidationOptions, Violation};
use super::thresholds::Thresholds;
use crate::error::{DriftError, DriftResult};
use crate::model::resource::{DriftObservation, Resource, Severity};
use crate::planner::action::ActionType;

/// Resource types that always require an explicit approval, independent of
/// severity or data-loss signal.
const ALWAYS_APPROVAL_TYPES: &[&str] = &["iam", "kms", "security_group"];

/// A single approval requirement surfaced by the approval gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRequirement {
    pub resource_address: String,
    pub reason: String,
}

/// The result of validating one change against every registered policy.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
    pub impact: Impact,
    pub allowed: bool,
    pub override_applied: bool,
}

/// Copy-on-write registry of policies. Readers clone the
/// current `Vec` out from under the map; writers replace it wholesale.
#[derive(Default)]
pub struct PolicyRegistry {
    policies: DashMap<String, Vec<Policy>>,
}

const REGISTRY_KEY: &str = "active";

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, policies: Vec<Policy>) {
        self.policies.insert(REGISTRY_KEY.to_string(), policies);
    }

    pub fn current(&self) -> Vec<Policy> {
        self.policies
            .get(REGISTRY_KEY)
            .map(|entry| entry.clone())
            .unwrap_or_default()
    }
}

pub struct SafetyEngine {
    pub policies: PolicyRegistry,
    pub thresholds: Thresholds,
}

impl SafetyEngine {
    pub fn new(policies: PolicyRegistry, thresholds: Thresholds) -> Self {
        Self { policies, thresholds }
    }

    /// Evaluates every policy's rules against `(drift, resource, options)`,
    /// aggregates violations, and decides whether the change may proceed.
    pub fn validate(
        &self,
        drift: &DriftObservation,
        resource: &Resource,
        action_type: ActionType,
        options: &ValidationOptions,
    ) -> ValidationReport {
        let mut violations = Vec::new();
        for policy in self.policies.current() {
            for rule in &policy.rules {
                if evaluate_condition(&rule, drift, resource, options) {
                    violations.push(Violation {
                        policy_name: policy.name.clone(),
                        rule_id: rule.id.clone(),
                        action: rule.action,
                        message: rule.message.clone(),
                    });
                }
            }
        }

        let has_blocking = violations.iter().any(|v| v.action == RuleAction::Block);
        let impact = impact::assess(drift, resource, action_type);

        let (allowed, override_applied) = if has_blocking {
            if options.force {
                warn!(
                    resource = %resource.id,
                    "blocking safety violation overridden by force"
                );
                (true, true)
            } else {
                (false, false)
            }
        } else {
            (true, false)
        };

        if allowed && !override_applied {
            info!(resource = %resource.id, "safety validation passed");
        }

        ValidationReport {
            violations,
            impact,
            allowed,
            override_applied,
        }
    }

    /// Fails the whole batch with a combined message if any report blocks
    /// execution and `force` was not applied.
    pub fn enforce(&self, reports: &[ValidationReport]) -> DriftResult<()> {
        let blocking: Vec<&str> = reports
            .iter()
            .filter(|r| !r.allowed)
            .flat_map(|r| r.violations.iter())
            .filter(|v| v.action == RuleAction::Block)
            .map(|v| v.message.as_str())
            .collect();

        if blocking.is_empty() {
            Ok(())
        } else {
            Err(DriftError::safety_violation(blocking.join("; ")))
        }
    }

    /// Which changes require an explicit human approval before execution.
    pub fn approval_gate(
        &self,
        reports: &[(String, ValidationReport)],
    ) -> Vec<ApprovalRequirement> {
        reports
            .iter()
            .filter_map(|(resource_address, report)| {
                let reason = if report.impact.data_loss_risk {
                    Some("change carries data-loss risk")
                } else if report.impact.severity == Severity::Critical {
                    Some("change severity is critical")
                } else if ALWAYS_APPROVAL_TYPES
                    .iter()
                    .any(|t| resource_address.to_lowercase().contains(t))
                {
                    Some("resource type requires explicit approval")
                } else {
                    None
                };
                reason.map(|reason| ApprovalRequirement {
                    resource_address: resource_address.clone(),
                    reason: reason.to_string(),
                })
            })
            .collect()
    }
}
