//! Docker adapter for [`WorkloadRuntime`], built on `bollard`.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogsOptions,
    RemoveContainerOptions, RestartContainerOptions, StartContainerOptions, Stats, StatsOptions,
    StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, RestartPolicy as DockerRestartPolicy, RestartPolicyNameEnum};
use bollard::Docker;
use chrono::{DateTime, Datelike, Utc};
use fleet_core::types::Timestamp;
use futures::{StreamExt, TryStreamExt};

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::types::{
    LogTail, ResourceUsage, RestartPolicy, WorkloadSpec, WorkloadState, WorkloadSummary,
};
use crate::WorkloadRuntime;

/// [`WorkloadRuntime`] backed by a Docker daemon.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
    config: RuntimeConfig,
}

impl DockerRuntime {
    /// Connect using bollard's defaults (`DOCKER_HOST` or the local socket)
    /// and verify the daemon answers a ping.
    pub async fn connect(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_defaults()
            .map_err(|e| RuntimeError::ConnectionUnavailable(e.to_string()))?;
        let runtime = Self { docker, config };

        let version = runtime
            .bounded("ping", runtime.config.call_timeout, runtime.docker.ping())
            .await?;
        tracing::info!(ping = %version, network = %runtime.config.network, "Connected to Docker");

        Ok(runtime)
    }

    /// Run a bollard call under `deadline`. An elapsed deadline is reported
    /// as [`RuntimeError::ConnectionUnavailable`].
    async fn bounded<T, F>(
        &self,
        op: &'static str,
        deadline: Duration,
        fut: F,
    ) -> Result<T, RuntimeError>
    where
        F: Future<Output = Result<T, bollard::errors::Error>>,
    {
        match tokio::time::timeout(deadline, fut).await {
            Ok(result) => result.map_err(RuntimeError::from),
            Err(_) => Err(RuntimeError::ConnectionUnavailable(format!(
                "{op} timed out after {}s",
                deadline.as_secs()
            ))),
        }
    }
}

fn container_config(spec: &WorkloadSpec) -> Config<String> {
    let port_key = format!("{}/tcp", spec.exposed_port);
    let binds = vec![format!(
        "{}:{}",
        spec.host_data_path.display(),
        spec.container_data_path
    )];
    let restart_policy = match spec.restart_policy {
        RestartPolicy::UnlessStopped => RestartPolicyNameEnum::UNLESS_STOPPED,
    };

    Config {
        image: Some(spec.image.clone()),
        env: Some(spec.env.iter().map(|(k, v)| format!("{k}={v}")).collect()),
        labels: Some(spec.labels.clone()),
        exposed_ports: Some(HashMap::from([(port_key, HashMap::new())])),
        entrypoint: spec.entrypoint.clone(),
        cmd: spec.command.clone(),
        host_config: Some(HostConfig {
            binds: Some(binds),
            restart_policy: Some(DockerRestartPolicy {
                name: Some(restart_policy),
                maximum_retry_count: None,
            }),
            network_mode: spec.network.clone(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Docker reports unset timestamps as `0001-01-01T00:00:00Z`.
fn parse_docker_time(raw: Option<&str>) -> Option<Timestamp> {
    let parsed = DateTime::parse_from_rfc3339(raw?).ok()?.with_timezone(&Utc);
    (parsed.year() > 1).then_some(parsed)
}

/// CPU percentage the same way `docker stats` computes it: the container's
/// share of the system CPU delta, scaled by the number of online CPUs.
fn cpu_percent(stats: &Stats) -> f64 {
    let cpu_delta = stats
        .cpu_stats
        .cpu_usage
        .total_usage
        .saturating_sub(stats.precpu_stats.cpu_usage.total_usage) as f64;
    let system_delta = stats
        .cpu_stats
        .system_cpu_usage
        .unwrap_or(0)
        .saturating_sub(stats.precpu_stats.system_cpu_usage.unwrap_or(0)) as f64;
    let online_cpus = stats.cpu_stats.online_cpus.unwrap_or(1).max(1) as f64;

    if system_delta > 0.0 && cpu_delta > 0.0 {
        cpu_delta / system_delta * online_cpus * 100.0
    } else {
        0.0
    }
}

#[async_trait]
impl WorkloadRuntime for DockerRuntime {
    async fn ensure_image(&self, image: &str) -> Result<(), RuntimeError> {
        let timeout = self.config.call_timeout;
        match self
            .bounded("inspect image", timeout, self.docker.inspect_image(image))
            .await
        {
            Ok(_) => return Ok(()),
            Err(RuntimeError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        tracing::info!(image, "Pulling workload image");
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };
        self.bounded(
            "pull image",
            self.config.pull_timeout,
            self.docker
                .create_image(Some(options), None, None)
                .try_collect::<Vec<_>>(),
        )
        .await?;
        tracing::info!(image, "Workload image pulled");
        Ok(())
    }

    async fn create(&self, spec: &WorkloadSpec) -> Result<String, RuntimeError> {
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };
        let response = self
            .bounded(
                "create",
                self.config.call_timeout,
                self.docker.create_container(Some(options), container_config(spec)),
            )
            .await?;
        for warning in &response.warnings {
            tracing::warn!(workload = %spec.name, warning = %warning, "Docker create warning");
        }
        Ok(response.id)
    }

    async fn start(&self, id: &str) -> Result<(), RuntimeError> {
        self.bounded(
            "start",
            self.config.call_timeout,
            self.docker.start_container(id, None::<StartContainerOptions<String>>),
        )
        .await
    }

    async fn stop(&self, id: &str, grace_secs: u32) -> Result<(), RuntimeError> {
        let options = StopContainerOptions {
            t: i64::from(grace_secs),
        };
        // The daemon waits up to the grace period before answering.
        let deadline = self.config.call_timeout + Duration::from_secs(grace_secs.into());
        self.bounded("stop", deadline, self.docker.stop_container(id, Some(options)))
            .await
    }

    async fn restart(&self, id: &str, grace_secs: u32) -> Result<(), RuntimeError> {
        let options = RestartContainerOptions {
            t: grace_secs as isize,
        };
        let deadline = self.config.call_timeout + Duration::from_secs(grace_secs.into());
        self.bounded(
            "restart",
            deadline,
            self.docker.restart_container(id, Some(options)),
        )
        .await
    }

    async fn remove(&self, id: &str, purge_volumes: bool) -> Result<(), RuntimeError> {
        let options = RemoveContainerOptions {
            force: true,
            v: purge_volumes,
            ..Default::default()
        };
        self.bounded(
            "remove",
            self.config.call_timeout,
            self.docker.remove_container(id, Some(options)),
        )
        .await
    }

    async fn inspect(&self, id: &str) -> Result<WorkloadState, RuntimeError> {
        let info = self
            .bounded(
                "inspect",
                self.config.call_timeout,
                self.docker.inspect_container(id, None::<InspectContainerOptions>),
            )
            .await?;

        let state = info.state.unwrap_or_default();
        Ok(WorkloadState {
            id: info.id.unwrap_or_else(|| id.to_string()),
            running: state.running.unwrap_or(false),
            status: state
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".into()),
            health: state
                .health
                .and_then(|h| h.status)
                .map(|s| s.to_string())
                .filter(|s| !s.is_empty()),
            started_at: parse_docker_time(state.started_at.as_deref()),
            created_at: parse_docker_time(info.created.as_deref()),
        })
    }

    async fn logs(&self, id: &str, tail: LogTail) -> Result<String, RuntimeError> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            timestamps: true,
            tail: tail.to_string(),
            ..Default::default()
        };
        let chunks = self
            .bounded(
                "logs",
                self.config.call_timeout,
                self.docker.logs(id, Some(options)).try_collect::<Vec<_>>(),
            )
            .await?;

        let mut out = String::new();
        for chunk in chunks {
            out.push_str(&String::from_utf8_lossy(&chunk.into_bytes()));
        }
        Ok(out)
    }

    async fn stats(&self, id: &str) -> Result<ResourceUsage, RuntimeError> {
        // A single non-streamed sample carries the previous reading too, which
        // the CPU delta needs.
        let options = StatsOptions {
            stream: false,
            one_shot: false,
        };
        let samples = self
            .bounded(
                "stats",
                self.config.call_timeout,
                self.docker
                    .stats(id, Some(options))
                    .take(1)
                    .try_collect::<Vec<_>>(),
            )
            .await?;
        let stats = samples
            .into_iter()
            .next()
            .ok_or_else(|| RuntimeError::OperationFailed("empty stats stream".into()))?;

        Ok(ResourceUsage {
            cpu_percent: cpu_percent(&stats),
            memory_bytes: stats.memory_stats.usage.unwrap_or(0),
            memory_limit_bytes: stats.memory_stats.limit.unwrap_or(0),
        })
    }

    async fn list_by_name_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<WorkloadSummary>, RuntimeError> {
        let options = ListContainersOptions::<String> {
            all: true,
            filters: HashMap::from([("name".to_string(), vec![prefix.to_string()])]),
            ..Default::default()
        };
        let containers = self
            .bounded(
                "list",
                self.config.call_timeout,
                self.docker.list_containers(Some(options)),
            )
            .await?;

        // The daemon's name filter is a substring match; narrow it to a prefix.
        let summaries = containers
            .into_iter()
            .filter_map(|c| {
                let name = c
                    .names?
                    .into_iter()
                    .map(|n| n.trim_start_matches('/').to_string())
                    .find(|n| n.starts_with(prefix))?;
                Some(WorkloadSummary {
                    id: c.id?,
                    name,
                    running: c.state.as_deref() == Some("running"),
                })
            })
            .collect();
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_docker_time_is_unset() {
        assert_eq!(parse_docker_time(Some("0001-01-01T00:00:00Z")), None);
        assert_eq!(parse_docker_time(None), None);
        assert_eq!(parse_docker_time(Some("garbage")), None);
    }

    #[test]
    fn parses_nanosecond_timestamps() {
        let parsed = parse_docker_time(Some("2026-03-01T12:30:45.123456789Z")).unwrap();
        assert_eq!(parsed.year(), 2026);
    }

    #[test]
    fn config_binds_data_dir_and_sets_restart_policy() {
        let spec = WorkloadSpec {
            name: "pb-alice-db".into(),
            image: "ghcr.io/muchobien/pocketbase:latest".into(),
            exposed_port: 8090,
            host_data_path: "/srv/instances/alice/db".into(),
            container_data_path: "/pb_data".into(),
            restart_policy: RestartPolicy::UnlessStopped,
            labels: HashMap::from([("traefik.enable".into(), "true".into())]),
            env: vec![("A".into(), "1".into())],
            entrypoint: None,
            command: None,
            network: Some("fleet-network".into()),
        };
        let config = container_config(&spec);
        let host = config.host_config.unwrap();

        assert_eq!(host.binds.unwrap(), vec!["/srv/instances/alice/db:/pb_data"]);
        assert_eq!(
            host.restart_policy.unwrap().name,
            Some(RestartPolicyNameEnum::UNLESS_STOPPED)
        );
        assert_eq!(host.network_mode.as_deref(), Some("fleet-network"));
        assert!(config.exposed_ports.unwrap().contains_key("8090/tcp"));
        assert_eq!(config.env.unwrap(), vec!["A=1"]);
    }
}
