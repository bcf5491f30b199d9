use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

use uuid::Uuid;

use super::action::{ActionType, RemediationAction, RiskLevel};
use super::plan::RemediationPlan;
use crate::error::{DriftError, DriftResult};
use crate::graph::DependencyGraph;
use crate::mapper::resource_address;
use crate::model::resource::{DriftKind, DriftObservation, Resource};
use crate::rollback::{RollbackPlan, RollbackStep, Snapshot, StepStatus};

/// Action types that always require approval, independent of plan risk.
const ALWAYS_REQUIRE_APPROVAL: &[ActionType] = &[ActionType::Delete, ActionType::Replace];

#[derive(Debug, Clone, Default)]
pub struct PlannerOptions {
    pub max_parallel_actions: usize,
    pub auto_approve: bool,
    pub safe_mode: bool,
}

pub struct Planner;

impl Planner {
    /// Builds a plan from a drift report, the dependency graph, and the
    /// resources the drift refers to. `resources` is keyed by the same id
    /// used in `DriftObservation::resource_ref`.
    pub fn build_plan(
        name: impl Into<String>,
        observations: &[DriftObservation],
        resources: &HashMap<String, Resource>,
        graph: &DependencyGraph,
        options: &PlannerOptions,
    ) -> DriftResult<RemediationPlan> {
        let mut actions = Vec::new();
        for observation in observations {
            actions.extend(generate_actions(observation, resources)?);
        }

        let dependency_map = build_dependency_map(&actions, resources, graph);
        let execution_order = topological_order(&actions, &dependency_map)?;

        let risk_level = plan_risk(&actions);
        let parallel_groups = group_parallel(&execution_order, &dependency_map, options.max_parallel_actions.max(1));
        let estimated_duration = estimate_duration(&parallel_groups, &actions);
        let requires_approval = !options.auto_approve
            && (risk_level >= RiskLevel::High || actions_require_approval(&actions));
        let rollback_plan = synthesize_rollback(&execution_order, &actions, options.safe_mode);

        Ok(RemediationPlan {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            created_at: chrono::Utc::now(),
            actions,
            dependency_map,
            execution_order,
            estimated_duration,
            risk_level,
            requires_approval,
            rollback_plan,
            metadata: HashMap::new(),
        })
    }
}

fn changed_field_paths(observation: &DriftObservation) -> Vec<String> {
    observation.differences.iter().map(|d| d.path.clone()).collect()
}

fn new_action(
    action_type: ActionType,
    resource: &Resource,
    observation: &DriftObservation,
) -> RemediationAction {
    let fields = changed_field_paths(observation);
    let risk_level = RemediationAction::score_risk(action_type, observation.severity, &fields);
    RemediationAction {
        id: Uuid::new_v4().to_string(),
        action_type,
        resource_address: resource_address(resource),
        resource_type: resource.resource_type.clone(),
        provider: resource.provider,
        parameters: HashMap::new(),
        pre_checks: default_pre_checks(action_type),
        post_checks: default_post_checks(action_type),
        depends_on: Vec::new(),
        timeout: Duration::from_secs(600),
        retryable: !matches!(action_type, ActionType::Delete | ActionType::Replace),
        risk_level,
        rollback: None,
    }
}

fn default_pre_checks(action_type: ActionType) -> Vec<String> {
    match action_type {
        ActionType::Delete | ActionType::Replace => {
            vec!["resource exists in cloud".to_string(), "backup exists".to_string()]
        }
        _ => vec!["resource exists in cloud".to_string()],
    }
}

fn default_post_checks(_action_type: ActionType) -> Vec<String> {
    vec!["state contains address".to_string(), "no drift".to_string()]
}

/// Generates the actions implied by one drift observation. A resource missing from `resources`
/// means its identity could not be resolved by the caller; that is only
/// acceptable for `missing` drift (falls back to a create action).
fn generate_actions(
    observation: &DriftObservation,
    resources: &HashMap<String, Resource>,
) -> DriftResult<Vec<RemediationAction>> {
    let resource = resources.get(&observation.resource_ref.id);

    match observation.drift_kind {
        DriftKind::Missing => {
            let resource = resource.ok_or_else(|| {
                DriftError::dependency_error(format!(
                    "no resource record for missing drift on {}",
                    observation.resource_ref.id
                ))
            })?;
            let action_type = if !resource.id.is_empty() {
                ActionType::Import
            } else {
                ActionType::Create
            };
            Ok(vec![new_action(action_type, resource, observation)])
        }
        DriftKind::Modified => {
            let resource = resource.ok_or_else(|| {
                DriftError::dependency_error(format!(
                    "no resource record for modified drift on {}",
                    observation.resource_ref.id
                ))
            })?;
            if observation.has_force_new_field() {
                let mut taint = new_action(ActionType::Taint, resource, observation);
                let mut replace = new_action(ActionType::Replace, resource, observation);
                replace.depends_on.push(taint.id.clone());
                taint.rollback = None;
                Ok(vec![taint, replace])
            } else {
                Ok(vec![new_action(ActionType::Update, resource, observation)])
            }
        }
        DriftKind::Unmanaged => {
            let resource = resource.ok_or_else(|| {
                DriftError::dependency_error(format!(
                    "no resource record for unmanaged drift on {}",
                    observation.resource_ref.id
                ))
            })?;
            Ok(vec![new_action(ActionType::Import, resource, observation)])
        }
        DriftKind::Orphaned => {
            let resource = resource.ok_or_else(|| {
                DriftError::dependency_error(format!(
                    "no resource record for orphaned drift on {}",
                    observation.resource_ref.id
                ))
            })?;
            let mut action = new_action(ActionType::Delete, resource, observation);
            action.pre_checks = vec!["no-dependencies".to_string()];
            Ok(vec![action])
        }
    }
}

/// Seeds each action's dependency set from the graph's resource-level
/// dependencies, then unions with any explicit `depends_on`.
fn build_dependency_map(
    actions: &[RemediationAction],
    resources: &HashMap<String, Resource>,
    graph: &DependencyGraph,
) -> HashMap<String, Vec<String>> {
    let address_to_action: HashMap<&str, &str> = actions
        .iter()
        .map(|a| (a.resource_address.as_str(), a.id.as_str()))
        .collect();

    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for action in actions {
        let mut deps: BTreeSet<String> = action.depends_on.iter().cloned().collect();

        if graph.contains(&action.resource_address) {
            for dep_address in graph.reachable_dependencies(&action.resource_address) {
                if let Some(dep_action_id) = address_to_action.get(dep_address.as_str()) {
                    deps.insert(dep_action_id.to_string());
                }
            }
        }
        let _ = resources;
        deps.remove(&action.id);
        map.insert(action.id.clone(), deps.into_iter().collect());
    }
    map
}

/// Topological sort of the action dependency map, tie-broken
/// lexicographically by action id for determinism.
fn topological_order(
    actions: &[RemediationAction],
    dependency_map: &HashMap<String, Vec<String>>,
) -> DriftResult<Vec<String>> {
    let ids: HashSet<&str> = actions.iter().map(|a| a.id.as_str()).collect();
    for deps in dependency_map.values() {
        for dep in deps {
            if !ids.contains(dep.as_str()) {
                return Err(DriftError::dependency_error(format!(
                    "action depends on unknown action id {dep}"
                )));
            }
        }
    }

    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = actions.iter().map(|a| (a.id.as_str(), 0)).collect();
    for action in actions {
        let deps = dependency_map.get(&action.id).map(Vec::as_slice).unwrap_or(&[]);
        *in_degree.get_mut(action.id.as_str()).unwrap() = deps.len();
        for dep in deps {
            dependents.entry(dep.as_str()).or_default().push(action.id.as_str());
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut order = Vec::with_capacity(actions.len());
    while let Some(id) = ready.iter().next().copied() {
        ready.remove(id);
        order.push(id.to_string());
        for dependent in dependents.get(id).into_iter().flatten() {
            let degree = in_degree.get_mut(dependent).unwrap();
            *degree -= 1;
            if *degree == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() != actions.len() {
        return Err(DriftError::dependency_error("cycle detected in action dependency map"));
    }

    Ok(order)
}

fn plan_risk(actions: &[RemediationAction]) -> RiskLevel {
    if actions.is_empty() {
        return RiskLevel::Low;
    }

    let max_risk = actions.iter().map(|a| a.risk_level).max().unwrap();
    let weighted_avg: f64 = actions.iter().map(|a| a.action_type.risk_weight()).sum::<f64>()
        / actions.len() as f64;

    if max_risk >= RiskLevel::Critical || weighted_avg > 0.8 {
        RiskLevel::Critical
    } else if max_risk >= RiskLevel::High || weighted_avg > 0.6 {
        RiskLevel::High
    } else if max_risk >= RiskLevel::Medium || weighted_avg > 0.4 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

fn actions_require_approval(actions: &[RemediationAction]) -> bool {
    actions
        .iter()
        .any(|a| ALWAYS_REQUIRE_APPROVAL.contains(&a.action_type))
}

/// Greedy scan of the execution order, grouping subsequent actions not
/// transitively dependent on already-selected members of the current
/// group, bounded by `max_parallel_actions`.
pub(crate) fn group_parallel(
    order: &[String],
    dependency_map: &HashMap<String, Vec<String>>,
    max_parallel_actions: usize,
) -> Vec<Vec<String>> {
    let mut groups: Vec<Vec<String>> = Vec::new();

    for id in order {
        let deps = dependency_map.get(id).map(Vec::as_slice).unwrap_or(&[]);
        let blocked_by_current_group = groups
            .last()
            .map(|group| deps.iter().any(|dep| group.contains(dep)))
            .unwrap_or(false);

        let fits_current_group = !blocked_by_current_group
            && groups
                .last()
                .map(|group| group.len() < max_parallel_actions)
                .unwrap_or(false);

        if fits_current_group {
            groups.last_mut().unwrap().push(id.clone());
        } else {
            groups.push(vec![id.clone()]);
        }
    }

    groups
}

fn estimate_duration(groups: &[Vec<String>], actions: &[RemediationAction]) -> Duration {
    let by_id: HashMap<&str, &RemediationAction> =
        actions.iter().map(|a| (a.id.as_str(), a)).collect();

    let mut total = Duration::ZERO;
    let mut action_count = 0usize;
    for group in groups {
        let group_max = group
            .iter()
            .filter_map(|id| by_id.get(id.as_str()))
            .map(|a| a.timeout)
            .max()
            .unwrap_or(Duration::ZERO);
        total += group_max;
        action_count += group.len();
    }
    total + Duration::from_secs(5 * action_count as u64)
}

/// Concatenates each action's rollback twin in reverse execution order.
/// Actions with no rollback twin contribute nothing.
fn synthesize_rollback(
    order: &[String],
    actions: &[RemediationAction],
    safe_mode: bool,
) -> Option<RollbackPlan> {
    let by_id: HashMap<&str, &RemediationAction> =
        actions.iter().map(|a| (a.id.as_str(), a)).collect();

    let steps: Vec<RollbackStep> = order
        .iter()
        .rev()
        .filter_map(|id| by_id.get(id.as_str()))
        .filter_map(|action| {
            action.action_type.rollback_twin().map(|twin| (action, twin))
        })
        .enumerate()
        .map(|(idx, (action, twin))| RollbackStep {
            step_number: idx + 1,
            description: format!("{:?} rollback for {}", twin, action.resource_address),
            action: twin,
            parameters: action.parameters.clone(),
            validation: "state matches pre-remediation snapshot".to_string(),
            timeout: action.timeout,
            status: StepStatus::Pending,
        })
        .collect();

    if steps.is_empty() {
        return None;
    }

    Some(RollbackPlan {
        pre_remediation_snapshot: Vec::<Snapshot>::new(),
        steps,
        triggers: vec!["validation_failure".to_string(), "high_risk_failure".to_string()],
        timeout: Duration::from_secs(900),
        automatic: safe_mode,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::resource::{CloudProvider, Difference, ResourceRef, Severity};
    use chrono::Utc;

    fn resource(id: &str, resource_type: &str) -> Resource {
        Resource {
            provider: CloudProvider::Aws,
            id: id.to_string(),
            resource_type: resource_type.to_string(),
            name: id.to_string(),
            region: "us-east-1".into(),
            status: "running".into(),
            tags: HashMap::new(),
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    /// S2.
    #[test]
    fn s2_force_new_field_emits_taint_then_replace() {
        let resource = resource("app", "aws_instance");
        let observation = DriftObservation {
            resource_ref: ResourceRef::new(CloudProvider::Aws, "app"),
            drift_kind: DriftKind::Modified,
            severity: Severity::High,
            differences: vec![Difference {
                path: "instance_type".into(),
                old_value: None,
                new_value: None,
                importance: 0.9,
            }],
            detected_at: Utc::now(),
        };
        let resources = HashMap::from([("app".to_string(), resource)]);
        let graph = DependencyGraph::new();
        let plan = Planner::build_plan(
            "test",
            &[observation],
            &resources,
            &graph,
            &PlannerOptions {
                max_parallel_actions: 5,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(plan.actions.len(), 2);
        assert_eq!(plan.actions[0].action_type, ActionType::Taint);
        assert_eq!(plan.actions[1].action_type, ActionType::Replace);
        assert_eq!(plan.actions[1].depends_on, vec![plan.actions[0].id.clone()]);
        assert_eq!(plan.risk_level, RiskLevel::High);
    }

    /// S6.
    #[test]
    fn s6_unmanaged_drift_emits_single_import_action() {
        let resource = resource("bucket-x", "aws_s3_bucket");
        let observation = DriftObservation {
            resource_ref: ResourceRef::new(CloudProvider::Aws, "bucket-x"),
            drift_kind: DriftKind::Unmanaged,
            severity: Severity::Low,
            differences: vec![],
            detected_at: Utc::now(),
        };
        let resources = HashMap::from([("bucket-x".to_string(), resource)]);
        let graph = DependencyGraph::new();
        let plan = Planner::build_plan(
            "test",
            &[observation],
            &resources,
            &graph,
            &PlannerOptions {
                max_parallel_actions: 5,
                auto_approve: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].action_type, ActionType::Import);
        assert_eq!(plan.actions[0].risk_level, RiskLevel::Low);
    }

    #[test]
    fn missing_drift_with_resolved_id_emits_import() {
        let resource = resource("i-123", "aws_instance");
        let observation = DriftObservation {
            resource_ref: ResourceRef::new(CloudProvider::Aws, "i-123"),
            drift_kind: DriftKind::Missing,
            severity: Severity::Medium,
            differences: vec![],
            detected_at: Utc::now(),
        };
        let resources = HashMap::from([("i-123".to_string(), resource)]);
        let graph = DependencyGraph::new();
        let plan = Planner::build_plan(
            "test",
            &[observation],
            &resources,
            &graph,
            &PlannerOptions {
                max_parallel_actions: 5,
                auto_approve: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].action_type, ActionType::Import);
    }

    #[test]
    fn missing_drift_with_unresolved_id_emits_create() {
        let resource = resource("", "aws_instance");
        let observation = DriftObservation {
            resource_ref: ResourceRef::new(CloudProvider::Aws, "planned-app"),
            drift_kind: DriftKind::Missing,
            severity: Severity::Medium,
            differences: vec![],
            detected_at: Utc::now(),
        };
        let resources = HashMap::from([("planned-app".to_string(), resource)]);
        let graph = DependencyGraph::new();
        let plan = Planner::build_plan(
            "test",
            &[observation],
            &resources,
            &graph,
            &PlannerOptions {
                max_parallel_actions: 5,
                auto_approve: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].action_type, ActionType::Create);
    }

    #[test]
    fn empty_plan_has_zero_duration_and_is_empty() {
        let graph = DependencyGraph::new();
        let plan = Planner::build_plan(
            "empty",
            &[],
            &HashMap::new(),
            &graph,
            &PlannerOptions {
                max_parallel_actions: 5,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.estimated_duration, Duration::ZERO);
    }
}
