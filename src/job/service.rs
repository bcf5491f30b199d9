use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::lifecycle;
use super::model::{JobPriority, JobProgress, JobStatus, RemediationJob};
use super::repository::{JobRepository, ListOptions};
use crate::error::{DriftError, DriftResult};
use crate::planner::RemediationPlan;

/// Input to `create_job`.
pub struct CreateJobRequest {
    pub drift_result_id: String,
    pub strategy: String,
    pub priority: JobPriority,
    pub dry_run: bool,
    pub requires_approval: bool,
    pub created_by: String,
    pub configuration: HashMap<String, Value>,
    pub plan: Option<RemediationPlan>,
}

/// Approval/cancel operations are serialized per job id. A
/// per-job mutex guards the read-modify-write cycle against the shared
/// repository.
pub struct JobService<R: JobRepository> {
    repository: Arc<R>,
    locks: dashmap::DashMap<String, Arc<Mutex<()>>>,
    max_concurrent_jobs: usize,
}

impl<R: JobRepository> JobService<R> {
    pub fn new(repository: Arc<R>, max_concurrent_jobs: usize) -> Self {
        Self {
            repository,
            locks: dashmap::DashMap::new(),
            max_concurrent_jobs,
        }
    }

    fn lock_for(&self, job_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(job_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn create_job(&self, request: CreateJobRequest) -> DriftResult<RemediationJob> {
        if request.drift_result_id.trim().is_empty() {
            return Err(DriftError::invalid_request("drift_result_id must not be empty"));
        }
        if request.strategy.trim().is_empty() {
            return Err(DriftError::invalid_request("strategy must not be empty"));
        }

        let total_resources = request
            .plan
            .as_ref()
            .map(|p| p.actions.len() as u64)
            .unwrap_or(0);

        let now = Utc::now();
        let job = RemediationJob {
            id: Uuid::new_v4().to_string(),
            drift_result_id: request.drift_result_id,
            strategy: request.strategy,
            status: JobStatus::Pending,
            priority: request.priority,
            created_by: request.created_by,
            approved_by: None,
            approved_at: None,
            requires_approval: request.requires_approval,
            dry_run: request.dry_run,
            configuration: request.configuration,
            progress: JobProgress::new(total_resources),
            logs: Vec::new(),
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
            plan: request.plan,
        };

        self.repository.create(job).await
    }

    pub async fn get_job(&self, id: &str) -> DriftResult<RemediationJob> {
        self.repository.get(id).await
    }

    pub async fn list_jobs(&self, options: &ListOptions) -> DriftResult<Vec<RemediationJob>> {
        self.repository.list(options).await
    }

    /// History API: same shape as `list_jobs`, documented separately
    /// because callers use it for audit/reporting rather than operational
    /// queueing.
    pub async fn history(&self, options: &ListOptions) -> DriftResult<Vec<RemediationJob>> {
        self.repository.list(options).await
    }

    pub async fn progress(&self, id: &str) -> DriftResult<JobProgress> {
        Ok(self.repository.get(id).await?.progress)
    }

    pub async fn cancel_job(&self, id: &str, reason: impl Into<String>) -> DriftResult<RemediationJob> {
        let reason = reason.into();
        if reason.chars().count() > 500 {
            return Err(DriftError::invalid_request("cancel reason must be ≤ 500 chars"));
        }
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut job = self.repository.get(id).await?;
        lifecycle::cancel(&mut job, reason)?;
        self.repository.update(job).await
    }

    pub async fn approve_job(
        &self,
        id: &str,
        approved_by: impl Into<String>,
        comments: impl Into<String>,
    ) -> DriftResult<RemediationJob> {
        let comments = comments.into();
        if comments.chars().count() > 1000 {
            return Err(DriftError::invalid_request("approval comments must be ≤ 1000 chars"));
        }
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut job = self.repository.get(id).await?;
        lifecycle::approve(&mut job, approved_by)?;
        self.repository.update(job).await
    }

    pub async fn transition(&self, id: &str, to: JobStatus) -> DriftResult<RemediationJob> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut job = self.repository.get(id).await?;
        lifecycle::transition(&mut job, to)?;
        self.repository.update(job).await
    }

    pub async fn update_progress(
        &self,
        id: &str,
        processed: u64,
        successful: u64,
        failed: u64,
        current_step: impl Into<String>,
    ) -> DriftResult<RemediationJob> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut job = self.repository.get(id).await?;
        if successful + failed > processed {
            return Err(DriftError::invalid_request(
                "successful + failed must not exceed processed",
            ));
        }
        job.progress.update(processed, successful, failed, current_step);
        job.updated_at = Utc::now();
        self.repository.update(job).await
    }

    /// Healthy iff the repository reports healthy and queue depth does not
    /// exceed `2 * max_concurrent_jobs`.
    pub async fn health(&self) -> DriftResult<bool> {
        let repo_healthy = self.repository.health().await?;
        let depth = self.repository.queue_depth().await?;
        Ok(repo_healthy && depth <= 2 * self.max_concurrent_jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::repository::{InMemoryJobRepository, JobFilter, SortField, SortOrder};

    fn service() -> JobService<InMemoryJobRepository> {
        JobService::new(InMemoryJobRepository::new(), 5)
    }

    fn sample_request() -> CreateJobRequest {
        CreateJobRequest {
            drift_result_id: "drift-1".into(),
            strategy: "terraform_apply".into(),
            priority: JobPriority::Medium,
            dry_run: false,
            requires_approval: true,
            created_by: "alice".into(),
            configuration: HashMap::new(),
            plan: None,
        }
    }

    #[tokio::test]
    async fn create_job_starts_pending() {
        let service = service();
        let job = service.create_job(sample_request()).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn create_job_rejects_empty_drift_result_id() {
        let service = service();
        let mut request = sample_request();
        request.drift_result_id = String::new();
        let err = service.create_job(request).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn cancel_reports_cannot_cancel_when_terminal() {
        let service = service();
        let job = service.create_job(sample_request()).await.unwrap();
        service.transition(&job.id, JobStatus::Queued).await.unwrap();
        service.transition(&job.id, JobStatus::Running).await.unwrap();
        service.transition(&job.id, JobStatus::Completed).await.unwrap();

        let err = service.cancel_job(&job.id, "too late").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::PreconditionFailed);
    }

    #[tokio::test]
    async fn approve_then_reapprove_returns_conflict() {
        let service = service();
        let job = service.create_job(sample_request()).await.unwrap();
        service.approve_job(&job.id, "alice", "looks good").await.unwrap();
        let err = service
            .approve_job(&job.id, "bob", "also fine")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn history_supports_status_filter() {
        let service = service();
        service.create_job(sample_request()).await.unwrap();
        let options = ListOptions {
            filter: JobFilter {
                status: Some(JobStatus::Pending),
                ..Default::default()
            },
            limit: 10,
            offset: 0,
            sort_by: SortField::CreatedAt,
            sort_order: SortOrder::Desc,
        };
        let jobs = service.history(&options).await.unwrap();
        assert_eq!(jobs.len(), 1);
    }

    #[tokio::test]
    async fn health_is_true_for_empty_queue() {
        let service = service();
        assert!(service.health().await.unwrap());
    }
}
