//! Workload runtime port and its Docker adapter.
//!
//! [`WorkloadRuntime`] is the narrow interface the lifecycle manager needs
//! from a container runtime. [`docker::DockerRuntime`] implements it with
//! `bollard`; every call is bounded by a deadline.

pub mod config;
pub mod docker;
pub mod error;
pub mod types;

use async_trait::async_trait;

pub use config::RuntimeConfig;
pub use error::RuntimeError;
pub use types::{LogTail, ResourceUsage, RestartPolicy, WorkloadSpec, WorkloadState, WorkloadSummary};

/// Operations the lifecycle manager requires from a container runtime.
///
/// Workloads are addressed by the opaque id returned from [`create`].
///
/// [`create`]: WorkloadRuntime::create
#[async_trait]
pub trait WorkloadRuntime: Send + Sync {
    /// Pull `image` unless it is already present locally.
    async fn ensure_image(&self, image: &str) -> Result<(), RuntimeError>;

    /// Create (but do not start) a workload. Returns the workload id.
    async fn create(&self, spec: &WorkloadSpec) -> Result<String, RuntimeError>;

    async fn start(&self, id: &str) -> Result<(), RuntimeError>;

    /// Stop, allowing `grace_secs` before the runtime kills the process.
    async fn stop(&self, id: &str, grace_secs: u32) -> Result<(), RuntimeError>;

    async fn restart(&self, id: &str, grace_secs: u32) -> Result<(), RuntimeError>;

    /// Remove a workload, stopping it first if needed. Bind-mounted host
    /// directories are never touched; `purge_volumes` only affects
    /// runtime-managed anonymous volumes.
    async fn remove(&self, id: &str, purge_volumes: bool) -> Result<(), RuntimeError>;

    async fn inspect(&self, id: &str) -> Result<WorkloadState, RuntimeError>;

    /// Captured stdout and stderr, with timestamps.
    async fn logs(&self, id: &str, tail: LogTail) -> Result<String, RuntimeError>;

    /// One-shot resource usage sample.
    async fn stats(&self, id: &str) -> Result<ResourceUsage, RuntimeError>;

    /// Every workload (running or not) whose name starts with `prefix`.
    async fn list_by_name_prefix(&self, prefix: &str)
        -> Result<Vec<WorkloadSummary>, RuntimeError>;
}
