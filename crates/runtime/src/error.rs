/// Failures reported by a workload runtime.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    /// The runtime could not be reached, or the per-call deadline elapsed.
    #[error("Workload runtime unavailable: {0}")]
    ConnectionUnavailable(String),

    /// A workload with the requested name already exists.
    #[error("Workload name already in use: {0}")]
    NameConflict(String),

    #[error("Workload not found: {0}")]
    NotFound(String),

    #[error("Workload operation failed: {0}")]
    OperationFailed(String),
}

impl RuntimeError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeError::ConnectionUnavailable(_) => "RUNTIME_UNAVAILABLE",
            _ => "RUNTIME_ERROR",
        }
    }
}

impl From<bollard::errors::Error> for RuntimeError {
    fn from(err: bollard::errors::Error) -> Self {
        use bollard::errors::Error;

        match err {
            Error::DockerResponseServerError {
                status_code: 404,
                message,
            } => RuntimeError::NotFound(message),
            Error::DockerResponseServerError {
                status_code: 409,
                message,
            } => RuntimeError::NameConflict(message),
            Error::DockerResponseServerError {
                status_code,
                message,
            } => RuntimeError::OperationFailed(format!("{status_code}: {message}")),
            e @ (Error::RequestTimeoutError
            | Error::IOError { .. }
            | Error::HyperResponseError { .. }
            | Error::HyperLegacyError { .. }
            | Error::SocketNotFoundError(_)) => RuntimeError::ConnectionUnavailable(e.to_string()),
            other => RuntimeError::OperationFailed(other.to_string()),
        }
    }
}
