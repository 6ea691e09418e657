use crate::types::InstanceId;

/// Caller-facing domain errors.
///
/// Every variant describes a problem with the request itself (bad input,
/// wrong owner, wrong state). None of them is retried automatically; each
/// carries a stable machine-readable [`kind`](CoreError::kind).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound {
        entity: &'static str,
        id: InstanceId,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Maximum number of instances reached ({limit})")]
    QuotaExceeded { limit: i64 },

    #[error("Instance {id} is not owned by the caller")]
    NotOwner { id: InstanceId },

    #[error("Cannot {action} an instance that is {status}")]
    InvalidState {
        action: &'static str,
        status: &'static str,
    },

    #[error("Instance {id} has no workload")]
    NoWorkload { id: InstanceId },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::Conflict(_) => "CONFLICT",
            CoreError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            CoreError::NotOwner { .. } => "NOT_OWNER",
            CoreError::InvalidState { .. } => "INVALID_STATE",
            CoreError::NoWorkload { .. } => "NO_WORKLOAD",
            CoreError::Unauthorized(_) => "UNAUTHORIZED",
            CoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
