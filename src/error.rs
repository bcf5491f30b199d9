use thiserror::Error;

/// The closed set of failure categories surfaced to callers of `driftcore`.
///
/// Every module-local error type maps onto exactly one of these kinds via
/// `kind()`, so a host application can branch on `kind()` without matching
/// every concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    NotFound,
    Conflict,
    PreconditionFailed,
    SafetyViolation,
    DependencyError,
    ProviderError,
    Timeout,
    Cancelled,
    Internal,
}

/// Crate-wide error type. Module errors (`GraphError`, `SafetyError`, ...)
/// convert into this via `#[from]`, aggregating heterogeneous causes
/// behind one enum.
#[derive(Debug, Error)]
pub enum DriftError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("safety violation: {0}")]
    SafetyViolation(String),

    #[error("dependency error: {0}")]
    DependencyError(String),

    #[error("provider error: {0}")]
    ProviderError(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DriftError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriftError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            DriftError::NotFound(_) => ErrorKind::NotFound,
            DriftError::Conflict(_) => ErrorKind::Conflict,
            DriftError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            DriftError::SafetyViolation(_) => ErrorKind::SafetyViolation,
            DriftError::DependencyError(_) => ErrorKind::DependencyError,
            DriftError::ProviderError(_) => ErrorKind::ProviderError,
            DriftError::Timeout(_) => ErrorKind::Timeout,
            DriftError::Cancelled(_) => ErrorKind::Cancelled,
            DriftError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        DriftError::InvalidRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        DriftError::NotFound(msg.into())
    }

    pub fn dependency_error(msg: impl Into<String>) -> Self {
        DriftError::DependencyError(msg.into())
    }

    pub fn safety_violation(msg: impl Into<String>) -> Self {
        DriftError::SafetyViolation(msg.into())
    }
}

pub type DriftResult<T> = Result<T, DriftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_maps_one_to_one() {
        assert_eq!(
            DriftError::invalid_request("bad").kind(),
            ErrorKind::InvalidRequest
        );
        assert_eq!(
            DriftError::dependency_error("cycle").kind(),
            ErrorKind::DependencyError
        );
    }
}
