use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::action::{ActionType, RemediationAction, RiskLevel};
use crate::rollback::RollbackPlan;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationPlan {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub actions: Vec<RemediationAction>,
    /// action id -> ids of actions it depends on.
    pub dependency_map: HashMap<String, Vec<String>>,
    /// A valid topological linearization of `dependency_map`.
    pub execution_order: Vec<String>,
    pub estimated_duration: Duration,
    pub risk_level: RiskLevel,
    pub requires_approval: bool,
    pub rollback_plan: Option<RollbackPlan>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl RemediationPlan {
    pub fn action(&self, id: &str) -> Option<&RemediationAction> {
        self.actions.iter().find(|a| a.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Resource types touched by this plan's actions, for threshold checks
    /// that key off `blocked_resource_types`.
    pub fn resource_types(&self) -> Vec<String> {
        self.actions.iter().map(|a| a.resource_type.clone()).collect()
    }

    pub fn requires_approval_for(&self, types: &[ActionType]) -> bool {
        self.actions.iter().any(|a| types.contains(&a.action_type))
    }

    /// Recomputes the greedy parallel grouping over this plan's execution
    /// order, bounded by `max_parallel_actions`. The engine dispatches one
    /// batch at a time; within a batch, actions run concurrently.
    pub fn batches(&self, max_parallel_actions: usize) -> Vec<Vec<String>> {
        super::planner::group_parallel(
            &self.execution_order,
            &self.dependency_map,
            max_parallel_actions.max(1),
        )
    }
}
