//! End-to-end scenarios covering graph ordering, force-replace detection,
//! safety blocking, job lifecycle, rollback, and unmanaged import.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use driftcore::graph::{DependencyGraph, EdgeKind, ResourceNode};
use driftcore::job::{CreateJobRequest, InMemoryJobRepository, JobPriority, JobService, JobStatus};
use driftcore::model::{
    CloudProvider, Difference, DriftKind, DriftObservation, Resource, ResourceRef, Severity,
};
use driftcore::planner::{ActionType, Planner, PlannerOptions, RiskLevel};
use driftcore::provider::MockProvider;
use driftcore::rollback::RollbackManager;
use driftcore::safety::{Policy, PolicyRegistry, Rule, RuleAction, SafetyEngine, Thresholds, ValidationOptions};
use driftcore::{EngineConfig, ExecutionOptions, RemediationEngine};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn node(address: &str) -> ResourceNode {
    ResourceNode::new(address, "aws_instance", address, CloudProvider::Aws)
}

/// S1 Graph ordering.
#[test]
fn s1_graph_ordering() {
    init_tracing();
    let mut graph = DependencyGraph::new();
    for addr in ["vpc.main", "subnet.public", "sg.web", "instance.app"] {
        graph.add_node(node(addr));
    }
    graph.add_edge("subnet.public", "vpc.main", EdgeKind::Explicit).unwrap();
    graph.add_edge("sg.web", "vpc.main", EdgeKind::Explicit).unwrap();
    graph.add_edge("instance.app", "subnet.public", EdgeKind::Explicit).unwrap();
    graph.add_edge("instance.app", "sg.web", EdgeKind::Explicit).unwrap();

    assert_eq!(
        graph.topological_sort().unwrap(),
        vec!["vpc.main", "sg.web", "subnet.public", "instance.app"]
    );
    assert_eq!(
        graph.layers().unwrap(),
        vec![
            vec!["vpc.main".to_string()],
            vec!["sg.web".to_string(), "subnet.public".to_string()],
            vec!["instance.app".to_string()],
        ]
    );

    let all = graph.addresses();
    let mut creation = graph.creation_order(&all).unwrap();
    let deletion = graph.deletion_order(&all).unwrap();
    creation.reverse();
    assert_eq!(creation, deletion);
}

fn instance_resource(id: &str) -> Resource {
    Resource {
        provider: CloudProvider::Aws,
        id: id.to_string(),
        resource_type: "aws_instance".to_string(),
        name: id.to_string(),
        region: "us-east-1".to_string(),
        status: "running".to_string(),
        tags: HashMap::new(),
        metadata: HashMap::new(),
        created_at: Utc::now(),
    }
}

/// S2 Force-replace detection.
#[test]
fn s2_force_replace_detection() {
    init_tracing();
    let resource = instance_resource("app");
    let observation = DriftObservation {
        resource_ref: ResourceRef::new(CloudProvider::Aws, "app"),
        drift_kind: DriftKind::Modified,
        severity: Severity::High,
        differences: vec![Difference {
            path: "instance_type".to_string(),
            old_value: None,
            new_value: None,
            importance: 0.9,
        }],
        detected_at: Utc::now(),
    };
    let resources = HashMap::from([("app".to_string(), resource)]);
    let graph = DependencyGraph::new();

    let plan = Planner::build_plan(
        "s2",
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

/// S3 Safety block.
#[test]
fn s3_safety_block_then_force_override() {
    init_tracing();
    let registry = PolicyRegistry::new();
    registry.set(vec![Policy {
        name: "production-guard".to_string(),
        description: "blocks destructive changes to production".to_string(),
        rules: vec![Rule {
            id: "prod-block".to_string(),
            description: "production tag blocks".to_string(),
            condition: driftcore::safety::Condition::ProductionTag,
            parameters: HashMap::new(),
            action: RuleAction::Block,
            message: "Resource has production tags, manual approval required".to_string(),
        }],
        enforcement: driftcore::safety::Enforcement::Blocking,
        last_updated: Utc::now(),
    }]);
    let engine = SafetyEngine::new(registry, Thresholds::default());

    let mut resource = instance_resource("prod-1");
    resource.tags.insert("env".to_string(), "production".to_string());
    let drift = DriftObservation {
        resource_ref: ResourceRef::new(CloudProvider::Aws, "prod-1"),
        drift_kind: DriftKind::Orphaned,
        severity: Severity::Medium,
        differences: vec![],
        detected_at: Utc::now(),
    };

    let blocked = engine.validate(&drift, &resource, ActionType::Delete, &ValidationOptions::default());
    assert!(!blocked.allowed);
    assert!(engine.enforce(&[blocked]).is_err());

    let forced_options = ValidationOptions {
        force: true,
        ..Default::default()
    };
    let forced = engine.validate(&drift, &resource, ActionType::Delete, &forced_options);
    assert!(forced.allowed);
    assert!(forced.override_applied);
    assert!(engine.enforce(&[forced]).is_ok());
}

/// S4 Job lifecycle.
#[tokio::test]
async fn s4_job_lifecycle() {
    init_tracing();
    let service = JobService::new(InMemoryJobRepository::new(), 5);
    let job = service
        .create_job(CreateJobRequest {
            drift_result_id: "drift-1".to_string(),
            strategy: "terraform_apply".to_string(),
            priority: JobPriority::Medium,
            dry_run: false,
            requires_approval: false,
            created_by: "alice".to_string(),
            configuration: HashMap::new(),
            plan: None,
        })
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Pending);

    let rejected = service.transition(&job.id, JobStatus::Running).await;
    assert!(rejected.is_err());

    service.transition(&job.id, JobStatus::Queued).await.unwrap();
    let running = service.transition(&job.id, JobStatus::Running).await.unwrap();
    assert!(running.started_at.is_some());
    let completed = service.transition(&job.id, JobStatus::Completed).await.unwrap();
    assert!(completed.completed_at.is_some());

    let cancel_result = service.cancel_job(&job.id, "too late now").await;
    assert!(cancel_result.is_err());
}

/// S5 Rollback on validation failure.
#[tokio::test]
async fn s5_rollback_on_validation_failure() {
    init_tracing();
    let provider: Arc<dyn driftcore::ProviderAdapter> = Arc::new(MockProvider::fails_validation());
    let rollback_manager = Arc::new(RollbackManager::new());
    let engine = RemediationEngine::new(provider.clone(), rollback_manager.clone(), 5);

    let resource = instance_resource("app");
    let observation = DriftObservation {
        resource_ref: ResourceRef::new(CloudProvider::Aws, "app"),
        drift_kind: DriftKind::Modified,
        severity: Severity::Medium,
        differences: vec![Difference {
            path: "tags".to_string(),
            old_value: None,
            new_value: None,
            importance: 0.3,
        }],
        detected_at: Utc::now(),
    };
    let resources = HashMap::from([("app".to_string(), resource)]);
    let graph = DependencyGraph::new();
    let plan = Planner::build_plan(
        "s5",
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

    let options = ExecutionOptions {
        auto_rollback: true,
        ..Default::default()
    };
    let result = engine.execute(&plan, &options).await.unwrap();
    assert!(!result.success);
    assert!(result.rollback_outcome.is_some());

    let record_id = result.rollback_outcome.unwrap().id;
    assert!(rollback_manager.get_record(&record_id).is_some());
}

/// S6 Unmanaged import path.
#[test]
fn s6_unmanaged_import_path() {
    init_tracing();
    let resource = Resource {
        resource_type: "aws_s3_bucket".to_string(),
        ..instance_resource("bucket-x")
    };
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
        "s6",
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
    assert!(!plan.requires_approval);

    let _ = EngineConfig::default();
}
