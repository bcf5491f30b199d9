use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::planner::RemediationPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub job_id: String,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgress {
    pub total_resources: u64,
    pub processed_resources: u64,
    pub successful_resources: u64,
    pub failed_resources: u64,
    pub percentage: f64,
    pub current_step: String,
    pub last_update: DateTime<Utc>,
}

impl JobProgress {
    pub fn new(total_resources: u64) -> Self {
        Self {
            total_resources,
            processed_resources: 0,
            successful_resources: 0,
            failed_resources: 0,
            percentage: 0.0,
            current_step: String::new(),
            last_update: Utc::now(),
        }
    }

    /// Overwrites the counters and recomputes `percentage` from them.
    /// Callers are responsible for the invariant
    /// `successful + failed ≤ processed`.
    pub fn update(
        &mut self,
        processed_resources: u64,
        successful_resources: u64,
        failed_resources: u64,
        current_step: impl Into<String>,
    ) {
        self.processed_resources = processed_resources;
        self.successful_resources = successful_resources;
        self.failed_resources = failed_resources;
        self.percentage = if self.total_resources > 0 {
            (processed_resources as f64 / self.total_resources as f64) * 100.0
        } else {
            0.0
        };
        self.current_step = current_step.into();
        self.last_update = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationJob {
    pub id: String,
    pub drift_result_id: String,
    pub strategy: String,
    pub status: JobStatus,
    pub priority: JobPriority,
    pub created_by: String,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub requires_approval: bool,
    pub dry_run: bool,
    #[serde(default)]
    pub configuration: HashMap<String, Value>,
    pub progress: JobProgress,
    pub logs: Vec<LogEntry>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub plan: Option<RemediationPlan>,
}
