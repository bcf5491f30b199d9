//! Remediation Engine: executes an approved plan with
//! bounded concurrency, per-action timeouts, and rollback on high/critical
//! failures.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::error::{DriftError, DriftResult};
use crate::planner::{RemediationAction, RemediationPlan, RiskLevel};
use crate::provider::ProviderAdapter;
use crate::rollback::{RollbackManager, RollbackPlan, RollbackRecord};

#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    pub dry_run: bool,
    pub backup_state_first: bool,
    pub auto_rollback: bool,
    /// Cancellation is checked at every batch boundary and before each
    /// action's provider call.
    pub cancellation: Option<tokio_util_cancellation::CancellationToken>,
}

/// A minimal stand-in cancellation token: a shared atomic flag. Kept in
/// its own tiny module rather than pulling in `tokio-util` for one type.
pub mod tokio_util_cancellation {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone, Default)]
    pub struct CancellationToken(Arc<AtomicBool>);

    impl CancellationToken {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn cancel(&self) {
            self.0.store(true, Ordering::SeqCst);
        }

        pub fn is_cancelled(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Success,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ActionResult {
    pub action_id: String,
    pub outcome: ActionOutcome,
    pub duration: Duration,
    pub output: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub plan_id: String,
    pub action_results: Vec<ActionResult>,
    pub success: bool,
    pub duration: Duration,
    pub summary: String,
    pub rollback_outcome: Option<RollbackRecord>,
}

pub struct RemediationEngine {
    provider: Arc<dyn ProviderAdapter>,
    rollback_manager: Arc<RollbackManager>,
    max_parallel_actions: usize,
}

impl RemediationEngine {
    pub fn new(
        provider: Arc<dyn ProviderAdapter>,
        rollback_manager: Arc<RollbackManager>,
        max_parallel_actions: usize,
    ) -> Self {
        Self {
            provider,
            rollback_manager,
            max_parallel_actions: max_parallel_actions.max(1),
        }
    }

    pub async fn execute(
        &self,
        plan: &RemediationPlan,
        options: &ExecutionOptions,
    ) -> DriftResult<ExecutionResult> {
        let started = Instant::now();

        if plan.is_empty() {
            return Ok(ExecutionResult {
                plan_id: plan.id.clone(),
                action_results: Vec::new(),
                success: true,
                duration: Duration::ZERO,
                summary: "empty plan, nothing to execute".to_string(),
                rollback_outcome: None,
            });
        }

        if plan.requires_approval {
            return Err(DriftError::PreconditionFailed(
                "plan requires approval before execution".to_string(),
            ));
        }

        if options.backup_state_first && !options.dry_run {
            for action in &plan.actions {
                // Snapshot capture failures are surfaced as provider
                // errors rather than silently skipped.
                let resource = placeholder_resource(action);
                self.provider
                    .create_snapshot(&resource)
                    .await
                    .map_err(|err| DriftError::ProviderError(err.to_string()))?;
            }
        }

        let batches = plan.batches(self.max_parallel_actions);
        let by_id: HashMap<&str, &RemediationAction> =
            plan.actions.iter().map(|a| (a.id.as_str(), a)).collect();

        let mut results = Vec::with_capacity(plan.actions.len());
        let mut any_failure = false;
        let mut cancelled = false;

        'batches: for batch in &batches {
            if options
                .cancellation
                .as_ref()
                .map(|token| token.is_cancelled())
                .unwrap_or(false)
            {
                cancelled = true;
                break;
            }

            let semaphore = Arc::new(Semaphore::new(self.max_parallel_actions));
            let mut handles = Vec::with_capacity(batch.len());

            for action_id in batch {
                let action = match by_id.get(action_id.as_str()) {
                    Some(action) => (*action).clone(),
                    None => continue,
                };
                let provider = self.provider.clone();
                let semaphore = semaphore.clone();
                let dry_run = options.dry_run;

                handles.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                    run_action(&action, provider.as_ref(), dry_run).await
                }));
            }

            for handle in handles {
                let result = handle.await.map_err(|err| {
                    DriftError::Internal(format!("action task panicked: {err}"))
                })?;

                if result.outcome == ActionOutcome::Failed {
                    any_failure = true;
                    let risk = by_id
                        .get(result.action_id.as_str())
                        .map(|a| a.risk_level)
                        .unwrap_or(RiskLevel::Low);
                    if risk >= RiskLevel::High {
                        results.push(result);
                        break 'batches;
                    } else {
                        warn!(action = %result.action_id, "low/medium risk action failed, continuing");
                    }
                }
                results.push(result);
            }
        }

        let success = !any_failure && !cancelled && results.iter().all(|r| r.outcome == ActionOutcome::Success);

        let rollback_outcome = if any_failure && options.auto_rollback {
            if let Some(rollback_plan) = plan.rollback_plan.clone() {
                Some(self.run_rollback(plan, rollback_plan).await?)
            } else {
                None
            }
        } else {
            None
        };

        let summary = summarize(&results, rollback_outcome.is_some(), cancelled);
        info!(plan = %plan.id, success, "plan execution finished");

        Ok(ExecutionResult {
            plan_id: plan.id.clone(),
            action_results: results,
            success,
            duration: started.elapsed(),
            summary,
            rollback_outcome,
        })
    }

    async fn run_rollback(
        &self,
        plan: &RemediationPlan,
        rollback_plan: RollbackPlan,
    ) -> DriftResult<RollbackRecord> {
        let resource_id = plan
            .actions
            .first()
            .map(|a| a.resource_address.clone())
            .unwrap_or_default();
        self.rollback_manager
            .execute(&plan.id, &resource_id, rollback_plan, self.provider.as_ref())
            .await
    }
}

async fn run_action(
    action: &RemediationAction,
    provider: &dyn ProviderAdapter,
    dry_run: bool,
) -> ActionResult {
    let started = Instant::now();

    if dry_run {
        return ActionResult {
            action_id: action.id.clone(),
            outcome: ActionOutcome::Success,
            duration: started.elapsed(),
            output: Some(format!("dry-run: would {:?} {}", action.action_type, action.resource_address)),
            error: None,
        };
    }

    let remediate = tokio::time::timeout(action.timeout, provider.remediate(action)).await;
    let remediate_outcome = match remediate {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(err.to_string()),
        Err(_) => Some("action timed out".to_string()),
    };

    if let Some(error) = remediate_outcome {
        error!(action = %action.id, "action failed: {error}");
        return ActionResult {
            action_id: action.id.clone(),
            outcome: ActionOutcome::Failed,
            duration: started.elapsed(),
            output: None,
            error: Some(error),
        };
    }

    let post_check = provider
        .validate_remediation(&action.resource_address, &action.post_checks)
        .await;

    match post_check {
        Ok(()) => ActionResult {
            action_id: action.id.clone(),
            outcome: ActionOutcome::Success,
            duration: started.elapsed(),
            output: Some(format!("{:?} applied to {}", action.action_type, action.resource_address)),
            error: None,
        },
        Err(err) => ActionResult {
            action_id: action.id.clone(),
            outcome: ActionOutcome::Failed,
            duration: started.elapsed(),
            output: None,
            error: Some(format!("post-check failed: {err}")),
        },
    }
}

fn placeholder_resource(action: &RemediationAction) -> crate::model::resource::Resource {
    crate::model::resource::Resource {
        provider: action.provider,
        id: action.resource_address.clone(),
        resource_type: action.resource_type.clone(),
        name: action.resource_address.clone(),
        region: String::new(),
        status: String::new(),
        tags: HashMap::new(),
        metadata: HashMap::new(),
        created_at: chrono::Utc::now(),
    }
}

fn summarize(results: &[ActionResult], rollback_triggered: bool, cancelled: bool) -> String {
    let succeeded = results.iter().filter(|r| r.outcome == ActionOutcome::Success).count();
    let failed = results.iter().filter(|r| r.outcome == ActionOutcome::Failed).count();
    if cancelled {
        format!("{succeeded} succeeded, {failed} failed, execution cancelled")
    } else if rollback_triggered {
        format!("{succeeded} succeeded, {failed} failed, rollback triggered")
    } else {
        format!("{succeeded} succeeded, {failed} failed")
    }
}
