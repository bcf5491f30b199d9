//! Job repository contract: CRUD, status/progress updates,
//! log append/query, statistics, queue depth, and health. Deliberately an
//! external collaborator: this crate ships an in-memory implementation
//! for its own tests; a real host backs it with whatever durable store fits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use super::model::{JobPriority, JobStatus, LogEntry, RemediationJob};
use crate::error::{DriftError, DriftResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Status,
    Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub priority: Option<JobPriority>,
    pub created_by: Option<String>,
    pub strategy: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ListOptions {
    pub filter: JobFilter,
    pub limit: usize,
    pub offset: usize,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl ListOptions {
    pub fn validate(&self) -> DriftResult<()> {
        if self.limit == 0 || self.limit > 1000 {
            return Err(DriftError::invalid_request(
                "limit must be in [1, 1000]",
            ));
        }
        if let (Some(from), Some(to)) = (self.filter.date_from, self.filter.date_to) {
            if from > to {
                return Err(DriftError::invalid_request("date range is inverted"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobStatistics {
    pub total: u64,
    pub by_status: std::collections::HashMap<String, u64>,
    pub by_priority: std::collections::HashMap<String, u64>,
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: RemediationJob) -> DriftResult<RemediationJob>;
    async fn get(&self, id: &str) -> DriftResult<RemediationJob>;
    async fn update(&self, job: RemediationJob) -> DriftResult<RemediationJob>;
    async fn list(&self, options: &ListOptions) -> DriftResult<Vec<RemediationJob>>;
    async fn append_log(&self, job_id: &str, entry: LogEntry) -> DriftResult<()>;
    async fn logs(&self, job_id: &str) -> DriftResult<Vec<LogEntry>>;
    async fn statistics(&self) -> DriftResult<JobStatistics>;
    async fn queue_depth(&self) -> DriftResult<usize>;
    async fn health(&self) -> DriftResult<bool>;
}

/// An in-memory `JobRepository`, used by this crate's own service tests
/// and as a reference implementation for hosts wiring up a durable store.
#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: DashMap<String, RemediationJob>,
}

impl InMemoryJobRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, job: RemediationJob) -> DriftResult<RemediationJob> {
        if self.jobs.contains_key(&job.id) {
            return Err(DriftError::Conflict(format!("job {} already exists", job.id)));
        }
        self.jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn get(&self, id: &str) -> DriftResult<RemediationJob> {
        self.jobs
            .get(id)
            .map(|entry| entry.clone())
            .ok_or_else(|| DriftError::not_found(format!("job {id} not found")))
    }

    async fn update(&self, job: RemediationJob) -> DriftResult<RemediationJob> {
        if !self.jobs.contains_key(&job.id) {
            return Err(DriftError::not_found(format!("job {} not found", job.id)));
        }
        self.jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn list(&self, options: &ListOptions) -> DriftResult<Vec<RemediationJob>> {
        options.validate()?;
        let mut jobs: Vec<RemediationJob> = self
            .jobs
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|job| {
                options.filter.status.map(|s| s == job.status).unwrap_or(true)
                    && options.filter.priority.map(|p| p == job.priority).unwrap_or(true)
                    && options
                        .filter
                        .created_by
                        .as_ref()
                        .map(|c| c == &job.created_by)
                        .unwrap_or(true)
                    && options
                        .filter
                        .strategy
                        .as_ref()
                        .map(|s| s == &job.strategy)
                        .unwrap_or(true)
                    && options
                        .filter
                        .date_from
                        .map(|from| job.created_at >= from)
                        .unwrap_or(true)
                    && options
                        .filter
                        .date_to
                        .map(|to| job.created_at <= to)
                        .unwrap_or(true)
            })
            .collect();

        jobs.sort_by(|a, b| {
            let ordering = match options.sort_by {
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                SortField::Status => format!("{:?}", a.status).cmp(&format!("{:?}", b.status)),
                SortField::Priority => a.priority.cmp(&b.priority),
            };
            match options.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        Ok(jobs
            .into_iter()
            .skip(options.offset)
            .take(options.limit)
            .collect())
    }

    async fn append_log(&self, job_id: &str, entry: LogEntry) -> DriftResult<()> {
        let mut job = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| DriftError::not_found(format!("job {job_id} not found")))?;
        job.logs.push(entry);
        Ok(())
    }

    async fn logs(&self, job_id: &str) -> DriftResult<Vec<LogEntry>> {
        self.jobs
            .get(job_id)
            .map(|entry| entry.logs.clone())
            .ok_or_else(|| DriftError::not_found(format!("job {job_id} not found")))
    }

    async fn statistics(&self) -> DriftResult<JobStatistics> {
        let mut stats = JobStatistics::default();
        for entry in self.jobs.iter() {
            stats.total += 1;
            *stats
                .by_status
                .entry(format!("{:?}", entry.status))
                .or_insert(0) += 1;
            *stats
                .by_priority
                .entry(format!("{:?}", entry.priority))
                .or_insert(0) += 1;
        }
        Ok(stats)
    }

    async fn queue_depth(&self) -> DriftResult<usize> {
        Ok(self
            .jobs
            .iter()
            .filter(|entry| matches!(entry.status, JobStatus::Pending | JobStatus::Queued))
            .count())
    }

    async fn health(&self) -> DriftResult<bool> {
        Ok(true)
    }
}
