use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::impact::Impact;
use crate::model::resource::Severity;

/// A recurring or one-off blocked window, e.g. a change freeze.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedTimeWindow {
    pub start_hour: u32,
    pub end_hour: u32,
    pub reason: String,
    pub recurring: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    pub max_changes_per_run: usize,
    pub max_critical_changes: usize,
    pub max_cost_increase: f64,
    pub max_downtime_minutes: u64,
    #[serde(default)]
    pub blocked_resource_types: Vec<String>,
    #[serde(default)]
    pub blocked_time_windows: Vec<BlockedTimeWindow>,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_changes_per_run: 50,
            max_critical_changes: 5,
            max_cost_increase: 1_000.0,
            max_downtime_minutes: 30,
            blocked_resource_types: Vec::new(),
            blocked_time_windows: Vec::new(),
        }
    }
}

/// One breached threshold, carrying a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdBreach(pub String);

impl Thresholds {
    /// Evaluates every threshold against a batch of impacts and the
    /// resource types they touch. Returns every breach found; callers
    /// decide whether any breach is fatal.
    pub fn check(
        &self,
        impacts: &[Impact],
        resource_types: &[String],
        now: Option<DateTime<Utc>>,
    ) -> Vec<ThresholdBreach> {
        let mut breaches = Vec::new();

        if impacts.len() > self.max_changes_per_run {
            breaches.push(ThresholdBreach(format!(
                "plan has {} changes, exceeding max_changes_per_run ({})",
                impacts.len(),
                self.max_changes_per_run
            )));
        }

        let critical_count = impacts
            .iter()
            .filter(|i| i.severity == Severity::Critical)
            .count();
        if critical_count > self.max_critical_changes {
            breaches.push(ThresholdBreach(format!(
                "plan has {} critical changes, exceeding max_critical_changes ({})",
                critical_count, self.max_critical_changes
            )));
        }

        let cost_increase: f64 = impacts.iter().map(|i| i.cost_impact).filter(|c| *c > 0.0).sum();
        if cost_increase > self.max_cost_increase {
            breaches.push(ThresholdBreach(format!(
                "estimated cost increase ${:.2} exceeds max_cost_increase (${:.2})",
                cost_increase, self.max_cost_increase
            )));
        }

        for resource_type in resource_types {
            if self
                .blocked_resource_types
                .iter()
                .any(|blocked| resource_type.to_lowercase().contains(&blocked.to_lowercase()))
            {
                breaches.push(ThresholdBreach(format!(
                    "resource type '{resource_type}' is in blocked_resource_types"
                )));
            }
        }

        let now = now.unwrap_or_else(Utc::now);
        let hour = now.hour();
        for window in &self.blocked_time_windows {
            let in_window = if window.start_hour <= window.end_hour {
                hour >= window.start_hour && hour < window.end_hour
            } else {
                hour >= window.start_hour || hour < window.end_hour
            };
            if in_window {
                breaches.push(ThresholdBreach(format!(
                    "current time falls in blocked window: {}",
                    window.reason
                )));
            }
        }

        breaches
    }
}
