use thiserror::Error;

use crate::error::DriftError;

/// Errors raised by [`super::DependencyGraph`] operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("edge would create a self-loop on {0}")]
    SelfLoop(String),

    #[error("graph contains a cycle involving: {0:?}")]
    CycleDetected(Vec<String>),

    #[error("unknown address in subset: {0}")]
    UnknownAddress(String),
}

impl From<GraphError> for DriftError {
    fn from(err: GraphError) -> Self {
        match &err {
            GraphError::NodeNotFound(_) | GraphError::UnknownAddress(_) => {
                DriftError::NotFound(err.to_string())
            }
            GraphError::SelfLoop(_) => DriftError::InvalidRequest(err.to_string()),
            GraphError::CycleDetected(_) => DriftError::DependencyError(err.to_string()),
        }
    }
}
