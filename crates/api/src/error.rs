use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fleet_core::error::CoreError;
use fleet_lifecycle::LifecycleError;
use fleet_runtime::RuntimeError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`LifecycleError`] for operation failures and [`CoreError`] for
/// problems detected before the lifecycle layer is reached (authentication,
/// request body validation). Implements [`IntoResponse`] to produce
/// consistent `{ "error", "code" }` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::Lifecycle(LifecycleError::Caller(core)) => classify_core_error(core),
            AppError::Lifecycle(LifecycleError::Runtime(err)) => classify_runtime_error(err),
            AppError::Lifecycle(LifecycleError::Integrity(msg)) => {
                tracing::error!(error = %msg, "Integrity violation");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTEGRITY_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Lifecycle(LifecycleError::Store(msg)) => {
                tracing::error!(error = %msg, "Storage error");
                internal_error()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Map a caller error to an HTTP status, error code, and message.
///
/// `NotOwner` is reported exactly like `NotFound` so callers cannot learn
/// which ids belong to other owners.
fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::NotOwner { id } => {
            tracing::debug!(instance_id = %id, "Rejected access to another owner's instance");
            (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Instance with id {id} not found"),
            )
        }
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::QuotaExceeded { .. } => (StatusCode::FORBIDDEN, err.kind(), err.to_string()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::InvalidState { .. } | CoreError::NoWorkload { .. } => {
            (StatusCode::CONFLICT, err.kind(), err.to_string())
        }
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            internal_error()
        }
    }
}

fn classify_runtime_error(err: &RuntimeError) -> (StatusCode, &'static str, String) {
    match err {
        RuntimeError::ConnectionUnavailable(msg) => {
            tracing::error!(error = %msg, "Workload runtime unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                err.kind(),
                "The workload runtime is unavailable".to_string(),
            )
        }
        _ => {
            tracing::warn!(error = %err, "Workload runtime call failed");
            (StatusCode::BAD_GATEWAY, err.kind(), err.to_string())
        }
    }
}

fn internal_error() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
