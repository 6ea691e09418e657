use fleet_core::error::CoreError;
use fleet_runtime::RuntimeError;

use crate::store::StoreError;

/// Errors surfaced by lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Problem with the request itself; never retried.
    #[error(transparent)]
    Caller(#[from] CoreError),

    /// The workload runtime failed or was unreachable.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// Archive and live-row removal disagree; not recoverable in-core.
    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Storage error: {0}")]
    Store(String),
}

impl LifecycleError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleError::Caller(e) => e.kind(),
            LifecycleError::Runtime(e) => e.kind(),
            LifecycleError::Integrity(_) => "INTEGRITY_ERROR",
            LifecycleError::Store(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => CoreError::Conflict(msg).into(),
            StoreError::QuotaExceeded { limit } => CoreError::QuotaExceeded { limit }.into(),
            StoreError::NotFound(id) => CoreError::NotFound {
                entity: "Instance",
                id,
            }
            .into(),
            StoreError::Database(msg) => LifecycleError::Store(msg),
        }
    }
}
