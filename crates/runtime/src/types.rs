use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use fleet_core::types::Timestamp;
use serde::Serialize;

/// When the runtime should bring a workload back after it exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartPolicy {
    #[default]
    UnlessStopped,
}

/// Declarative description of a workload to create.
#[derive(Clone)]
pub struct WorkloadSpec {
    /// Unique workload name.
    pub name: String,
    pub image: String,
    /// Port the workload listens on inside its network namespace.
    pub exposed_port: u16,
    /// Host directory bind-mounted into the workload.
    pub host_data_path: PathBuf,
    /// Mount point of `host_data_path` inside the workload.
    pub container_data_path: String,
    pub restart_policy: RestartPolicy,
    /// Opaque labels, e.g. edge-router configuration.
    pub labels: HashMap<String, String>,
    /// Environment entries. Values may be secrets.
    pub env: Vec<(String, String)>,
    pub entrypoint: Option<Vec<String>>,
    pub command: Option<Vec<String>>,
    pub network: Option<String>,
}

// Environment values carry bootstrap credentials; only keys are printed.
impl fmt::Debug for WorkloadSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env_keys: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("WorkloadSpec")
            .field("name", &self.name)
            .field("image", &self.image)
            .field("exposed_port", &self.exposed_port)
            .field("host_data_path", &self.host_data_path)
            .field("container_data_path", &self.container_data_path)
            .field("restart_policy", &self.restart_policy)
            .field("labels", &self.labels)
            .field("env_keys", &env_keys)
            .field("entrypoint", &self.entrypoint)
            .field("command", &self.command)
            .field("network", &self.network)
            .finish()
    }
}

/// Observed state of a workload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadState {
    pub id: String,
    pub running: bool,
    /// Runtime-reported status string (`running`, `exited`, ...).
    pub status: String,
    /// Health-check status when the image defines one.
    pub health: Option<String>,
    pub started_at: Option<Timestamp>,
    pub created_at: Option<Timestamp>,
}

/// Point-in-time resource usage of a running workload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceUsage {
    pub cpu_percent: f64,
    pub memory_bytes: u64,
    pub memory_limit_bytes: u64,
}

/// Minimal listing entry used for orphan discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadSummary {
    pub id: String,
    pub name: String,
    pub running: bool,
}

/// How much of a workload's log to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTail {
    /// The last `n` lines; `n` is at least 1.
    Lines(u32),
    All,
}

impl LogTail {
    /// Default number of trailing lines.
    pub const DEFAULT_LINES: u32 = 100;

    /// Parse `"all"` or a positive line count.
    pub fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        if spec.eq_ignore_ascii_case("all") {
            return Some(LogTail::All);
        }
        match spec.parse::<u32>() {
            Ok(n) if n > 0 => Some(LogTail::Lines(n)),
            _ => None,
        }
    }
}

impl Default for LogTail {
    fn default() -> Self {
        LogTail::Lines(Self::DEFAULT_LINES)
    }
}

impl fmt::Display for LogTail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogTail::Lines(n) => write!(f, "{n}"),
            LogTail::All => f.write_str("all"),
        }
    }
}
