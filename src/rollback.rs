//! Rollback Manager: executes a synthesized rollback plan against a
//! provider, restoring a pre-remediation snapshot and then replaying each
//! rollback step, tolerating partial success.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{DriftError, DriftResult};
use crate::planner::ActionType;
use crate::provider::ProviderAdapter;

/// A point-in-time capture of a resource's state, immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub resource_id: String,
    pub snapshot_time: DateTime<Utc>,
    pub state: HashMap<String, String>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackStep {
    pub step_number: usize,
    pub description: String,
    pub action: ActionType,
    pub parameters: HashMap<String, serde_json::Value>,
    pub validation: String,
    pub timeout: Duration,
    pub status: StepStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackPlan {
    pub pre_remediation_snapshot: Vec<Snapshot>,
    pub steps: Vec<RollbackStep>,
    pub triggers: Vec<String>,
    pub timeout: Duration,
    /// Set when the rollback should run automatically on failure rather
    /// than waiting for an explicit request.
    pub automatic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackStatus {
    Completed,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackRecord {
    pub id: String,
    pub remediation_id: String,
    pub resource_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: RollbackStatus,
    pub step_results: Vec<RollbackStep>,
    pub error: Option<String>,
}

/// Persists rollback records keyed by id so they remain retrievable after
/// the rollback completes.
#[derive(Default)]
pub struct RollbackManager {
    records: DashMap<String, RollbackRecord>,
}

impl RollbackManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_record(&self, id: &str) -> Option<RollbackRecord> {
        self.records.get(id).map(|entry| entry.clone())
    }

    /// Restores the pre-remediation snapshot, then runs each step in
    /// order under its own timeout. The snapshot restore failing is fatal
    /// (`RollbackStatus::Failed`); individual step failures are tolerated
    /// and yield `RollbackStatus::Partial`.
    pub async fn execute(
        &self,
        remediation_id: &str,
        resource_id: &str,
        plan: RollbackPlan,
        provider: &dyn ProviderAdapter,
    ) -> DriftResult<RollbackRecord> {
        let id = Uuid::new_v4().to_string();
        let start_time = Utc::now();

        let snapshot = plan.pre_remediation_snapshot.first().cloned();
        if let Some(snapshot) = &snapshot {
            if let Err(err) = provider.rollback_to_snapshot(snapshot).await {
                error!(remediation_id, "snapshot restore failed: {err}");
                let record = RollbackRecord {
                    id: id.clone(),
                    remediation_id: remediation_id.to_string(),
                    resource_id: resource_id.to_string(),
                    start_time,
                    end_time: Some(Utc::now()),
                    status: RollbackStatus::Failed,
                    step_results: Vec::new(),
                    error: Some(err.to_string()),
                };
                self.records.insert(id.clone(), record.clone());
                return Ok(record);
            }
        }

        let mut step_results = Vec::with_capacity(plan.steps.len());
        let mut any_failed = false;
        for mut step in plan.steps {
            match tokio::time::timeout(step.timeout, run_step(&step, provider)).await {
                Ok(Ok(())) => {
                    step.status = StepStatus::Succeeded;
                    info!(remediation_id, step = step.step_number, "rollback step succeeded");
                }
                Ok(Err(err)) => {
                    step.status = StepStatus::Failed;
                    any_failed = true;
                    warn!(remediation_id, step = step.step_number, "rollback step failed: {err}");
                }
                Err(_) => {
                    step.status = StepStatus::Failed;
                    any_failed = true;
                    warn!(remediation_id, step = step.step_number, "rollback step timed out");
                }
            }
            step_results.push(step);
        }

        let status = if any_failed {
            RollbackStatus::Partial
        } else {
            RollbackStatus::Completed
        };

        let record = RollbackRecord {
            id: id.clone(),
            remediation_id: remediation_id.to_string(),
            resource_id: resource_id.to_string(),
            start_time,
            end_time: Some(Utc::now()),
            status,
            step_results,
            error: None,
        };
        self.records.insert(id, record.clone());
        Ok(record)
    }
}

async fn run_step(step: &RollbackStep, provider: &dyn ProviderAdapter) -> DriftResult<()> {
    provider
        .validate_remediation(&step.description, &[step.validation.clone()])
        .await
        .map_err(|err| DriftError::ProviderError(err.to_string()))
}
