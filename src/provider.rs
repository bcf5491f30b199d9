//! Provider adapter contract: the cloud-specific SDK calls
//! this crate drives but does not implement. Deliberately out of scope to
//! implement concretely; callers supply an `Arc<dyn ProviderAdapter>` per
//! provider.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::resource::Resource;
use crate::planner::RemediationAction;
use crate::rollback::Snapshot;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider call failed: {0}")]
    CallFailed(String),
    #[error("provider timed out")]
    Timeout,
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn remediate(&self, action: &RemediationAction) -> Result<(), ProviderError>;
    async fn create_snapshot(&self, resource: &Resource) -> Result<Snapshot, ProviderError>;
    async fn rollback_to_snapshot(&self, snapshot: &Snapshot) -> Result<(), ProviderError>;
    async fn validate_remediation(
        &self,
        resource_address: &str,
        steps: &[String],
    ) -> Result<(), ProviderError>;
}

/// A registry mapping cloud provider to its adapter, mirroring the
/// executor registry pattern: dispatch keyed by an enum, one trait object
/// per entry.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: std::collections::HashMap<
        crate::model::resource::CloudProvider,
        std::sync::Arc<dyn ProviderAdapter>,
    >,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        provider: crate::model::resource::CloudProvider,
        adapter: std::sync::Arc<dyn ProviderAdapter>,
    ) {
        self.adapters.insert(provider, adapter);
    }

    pub fn get(
        &self,
        provider: crate::model::resource::CloudProvider,
    ) -> Option<std::sync::Arc<dyn ProviderAdapter>> {
        self.adapters.get(&provider).cloned()
    }
}

/// A configurable in-memory adapter used by this crate's own test suite.
/// Not part of the public contract surface used in production. Hosts
/// supply a real adapter per cloud.
#[cfg(any(test, feature = "test-util"))]
pub struct MockProvider {
    fail_remediate: bool,
    fail_snapshot_restore: bool,
    fail_validation: bool,
}

#[cfg(any(test, feature = "test-util"))]
impl MockProvider {
    pub fn always_succeeds() -> Self {
        Self {
            fail_remediate: false,
            fail_snapshot_restore: false,
            fail_validation: false,
        }
    }

    pub fn fails_remediate() -> Self {
        Self {
            fail_remediate: true,
            fail_snapshot_restore: false,
            fail_validation: false,
        }
    }

    pub fn fails_snapshot_restore() -> Self {
        Self {
            fail_remediate: false,
            fail_snapshot_restore: true,
            fail_validation: false,
        }
    }

    pub fn fails_validation() -> Self {
        Self {
            fail_remediate: false,
            fail_snapshot_restore: false,
            fail_validation: true,
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn remediate(&self, _action: &RemediationAction) -> Result<(), ProviderError> {
        if self.fail_remediate {
            Err(ProviderError::CallFailed("simulated remediate failure".into()))
        } else {
            Ok(())
        }
    }

    async fn create_snapshot(&self, resource: &Resource) -> Result<Snapshot, ProviderError> {
        Ok(Snapshot {
            resource_id: resource.id.clone(),
            snapshot_time: chrono::Utc::now(),
            state: std::collections::HashMap::new(),
            metadata: std::collections::HashMap::new(),
        })
    }

    async fn rollback_to_snapshot(&self, _snapshot: &Snapshot) -> Result<(), ProviderError> {
        if self.fail_snapshot_restore {
            Err(ProviderError::CallFailed("simulated snapshot restore failure".into()))
        } else {
            Ok(())
        }
    }

    async fn validate_remediation(
        &self,
        _resource_address: &str,
        _steps: &[String],
    ) -> Result<(), ProviderError> {
        if self.fail_validation {
            Err(ProviderError::CallFailed("simulated validation failure".into()))
        } else {
            Ok(())
        }
    }
}
