use chrono::Utc;
use uuid::Uuid;

use super::model::{JobStatus, LogEntry, LogLevel, RemediationJob};
use crate::error::{DriftError, DriftResult};

/// Whether `from -> to` is an allowed state-machine transition. All other pairs are rejected.
fn is_allowed(from: JobStatus, to: JobStatus) -> bool {
    use JobStatus::*;
    matches!(
        (from, to),
        (Pending, Queued)
            | (Pending, Cancelled)
            | (Queued, Running)
            | (Queued, Cancelled)
            | (Running, Completed)
            | (Running, Failed)
            | (Running, Cancelled)
            | (Failed, Queued)
    )
}

fn log(job: &mut RemediationJob, level: LogLevel, message: impl Into<String>) {
    job.logs.push(LogEntry {
        id: Uuid::new_v4().to_string(),
        job_id: job.id.clone(),
        level,
        message: message.into(),
        timestamp: Utc::now(),
        metadata: Default::default(),
    });
}

/// Applies a transition in place. On rejection the job is left completely
/// unchanged and `precondition_failed` is returned.
pub fn transition(job: &mut RemediationJob, to: JobStatus) -> DriftResult<()> {
    if !is_allowed(job.status, to) {
        return Err(DriftError::PreconditionFailed(format!(
            "cannot transition job {} from {:?} to {:?}",
            job.id, job.status, to
        )));
    }

    let now = Utc::now();
    if to == JobStatus::Running {
        job.started_at = Some(now);
    }
    if matches!(to, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled) {
        job.completed_at = Some(now);
    }

    job.status = to;
    job.updated_at = now;
    log(job, LogLevel::Info, format!("status changed to {to:?}"));
    Ok(())
}

/// Only applicable when `requires_approval` is set and `approved_by` is
/// unset. Re-approval is rejected with `already_approved`.
pub fn approve(job: &mut RemediationJob, approved_by: impl Into<String>) -> DriftResult<()> {
    if !job.requires_approval {
        return Err(DriftError::PreconditionFailed(format!(
            "job {} does not require approval",
            job.id
        )));
    }
    if job.approved_by.is_some() {
        return Err(DriftError::Conflict("already_approved".to_string()));
    }

    let now = Utc::now();
    job.approved_by = Some(approved_by.into());
    job.approved_at = Some(now);
    job.updated_at = now;
    log(job, LogLevel::Info, "job approved");
    Ok(())
}

/// Allowed only in `pending|queued|running`; reason persisted in the log.
pub fn cancel(job: &mut RemediationJob, reason: impl Into<String>) -> DriftResult<()> {
    if job.status.is_terminal() {
        return Err(DriftError::PreconditionFailed("cannot_cancel".to_string()));
    }
    let reason = reason.into();
    transition(job, JobStatus::Cancelled)?;
    log(job, LogLevel::Info, format!("cancelled: {reason}"));
    Ok(())
}
