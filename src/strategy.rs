//! Strategy API: create (unique name), get, list. The
//! registry is copy-on-write: readers see a consistent
//! snapshot, writers install a new `Arc<Vec<_>>` rather than mutating in
//! place.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{DriftError, DriftResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    TerraformApply,
    TerraformDestroy,
    TerraformImport,
    StateManipulation,
    ResourceCreate,
    ResourceDelete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationStrategy {
    pub id: String,
    #[serde(rename = "type")]
    pub strategy_type: StrategyType,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    pub timeout: Duration,
    pub retry_count: u32,
    pub is_custom: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct StrategyRegistry {
    strategies: RwLock<Arc<Vec<RemediationStrategy>>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with `conflict` on a duplicate name.
    pub fn create(
        &self,
        strategy_type: StrategyType,
        name: impl Into<String>,
        description: impl Into<String>,
        timeout: Duration,
        retry_count: u32,
        created_by: impl Into<String>,
    ) -> DriftResult<RemediationStrategy> {
        let name = name.into();
        if !(0..=10).contains(&retry_count) {
            return Err(DriftError::invalid_request("retry_count must be in [0, 10]"));
        }

        let current = self.strategies.read().unwrap().clone();
        if current.iter().any(|s| s.name == name) {
            return Err(DriftError::Conflict(format!("strategy name '{name}' already exists")));
        }

        let strategy = RemediationStrategy {
            id: Uuid::new_v4().to_string(),
            strategy_type,
            name,
            description: description.into(),
            parameters: HashMap::new(),
            timeout,
            retry_count,
            is_custom: true,
            created_by: created_by.into(),
            created_at: Utc::now(),
        };

        let mut next = (*current).clone();
        next.push(strategy.clone());
        *self.strategies.write().unwrap() = Arc::new(next);
        Ok(strategy)
    }

    pub fn get(&self, id: &str) -> DriftResult<RemediationStrategy> {
        self.strategies
            .read()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| DriftError::not_found(format!("strategy {id} not found")))
    }

    pub fn get_by_name(&self, name: &str) -> DriftResult<RemediationStrategy> {
        self.strategies
            .read()
            .unwrap()
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .ok_or_else(|| DriftError::not_found(format!("strategy '{name}' not found")))
    }

    pub fn list(&self) -> Vec<RemediationStrategy> {
        (*self.strategies.read().unwrap()).to_vec()
    }
}
