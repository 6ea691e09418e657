use std::time::Duration;

/// Docker adapter configuration loaded from environment variables.
///
/// The Docker endpoint itself follows bollard's defaults: `DOCKER_HOST` if
/// set, otherwise the local socket.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Network workloads join and the edge router uses to reach them.
    pub network: String,
    /// Deadline for every runtime call except image pulls.
    pub call_timeout: Duration,
    /// Deadline for pulling an image.
    pub pull_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            network: "fleet-network".into(),
            call_timeout: Duration::from_secs(30),
            pull_timeout: Duration::from_secs(300),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default         |
    /// |-----------------------------|-----------------|
    /// | `DOCKER_NETWORK`            | `fleet-network` |
    /// | `RUNTIME_CALL_TIMEOUT_SECS` | `30`            |
    /// | `RUNTIME_PULL_TIMEOUT_SECS` | `300`           |
    pub fn from_env() -> Self {
        let network = std::env::var("DOCKER_NETWORK").unwrap_or_else(|_| "fleet-network".into());

        let call_timeout_secs: u64 = std::env::var("RUNTIME_CALL_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("RUNTIME_CALL_TIMEOUT_SECS must be a valid u64");

        let pull_timeout_secs: u64 = std::env::var("RUNTIME_PULL_TIMEOUT_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("RUNTIME_PULL_TIMEOUT_SECS must be a valid u64");

        Self {
            network,
            call_timeout: Duration::from_secs(call_timeout_secs),
            pull_timeout: Duration::from_secs(pull_timeout_secs),
        }
    }
}
