use std::time::Duration;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How often archived instances are checked for expired data.
    pub sweep_interval: Duration,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default |
    /// |---------------------------------|---------|
    /// | `RETENTION_SWEEP_INTERVAL_SECS` | `3600`  |
    pub fn from_env() -> Self {
        let sweep_interval_secs: u64 = std::env::var("RETENTION_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("RETENTION_SWEEP_INTERVAL_SECS must be a valid u64");
        assert!(
            sweep_interval_secs > 0,
            "RETENTION_SWEEP_INTERVAL_SECS must be positive"
        );

        Self {
            sweep_interval: Duration::from_secs(sweep_interval_secs),
        }
    }
}
