use std::path::PathBuf;

use fleet_core::credentials::{ADMIN_EMAIL_ENV, ADMIN_PASSWORD_ENV};
use fleet_core::retention::DEFAULT_RETENTION_DAYS;
use fleet_core::routing::TlsMode;

/// Lifecycle configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Domain appended to every instance subdomain.
    pub base_domain: String,
    /// Root under which per-owner data directories are created.
    pub instances_base_path: PathBuf,
    /// Live instances allowed per owner, whatever their status.
    pub max_instances_per_user: i64,
    /// Days an archived instance's data is kept before purging.
    pub retention_days: i64,
    /// TLS routing and `https://` URLs when enabled.
    pub tls: TlsMode,
    pub workload_image: String,
    /// Port the workload serves on inside its container.
    pub workload_port: u16,
    /// Mount point of the data directory inside the workload.
    pub data_mount: String,
    /// Seconds the runtime waits on stop/restart before killing.
    pub stop_grace_secs: u32,
    /// Network shared by workloads and the edge router.
    pub network: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            base_domain: "localhost".into(),
            instances_base_path: PathBuf::from("./instances"),
            max_instances_per_user: 5,
            retention_days: DEFAULT_RETENTION_DAYS,
            tls: TlsMode::Disabled,
            workload_image: "ghcr.io/muchobien/pocketbase:latest".into(),
            workload_port: 8090,
            data_mount: "/pb_data".into(),
            stop_grace_secs: 10,
            network: "fleet-network".into(),
        }
    }
}

impl LifecycleConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                               |
    /// |--------------------------|---------------------------------------|
    /// | `BASE_DOMAIN`            | `localhost`                           |
    /// | `INSTANCES_BASE_PATH`    | `./instances`                         |
    /// | `MAX_INSTANCES_PER_USER` | `5`                                   |
    /// | `DATA_RETENTION_DAYS`    | `30`                                  |
    /// | `APP_ENV`                | `development` (`production` => TLS)   |
    /// | `WORKLOAD_IMAGE`         | `ghcr.io/muchobien/pocketbase:latest` |
    /// | `WORKLOAD_PORT`          | `8090`                                |
    /// | `WORKLOAD_DATA_MOUNT`    | `/pb_data`                            |
    /// | `STOP_GRACE_SECS`        | `10`                                  |
    /// | `DOCKER_NETWORK`         | `fleet-network`                       |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_domain = std::env::var("BASE_DOMAIN").unwrap_or(defaults.base_domain);

        let instances_base_path = std::env::var("INSTANCES_BASE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.instances_base_path);

        let max_instances_per_user: i64 = std::env::var("MAX_INSTANCES_PER_USER")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("MAX_INSTANCES_PER_USER must be a valid i64");
        assert!(
            max_instances_per_user >= 0,
            "MAX_INSTANCES_PER_USER must not be negative"
        );

        let retention_days: i64 = std::env::var("DATA_RETENTION_DAYS")
            .unwrap_or_else(|_| DEFAULT_RETENTION_DAYS.to_string())
            .parse()
            .expect("DATA_RETENTION_DAYS must be a valid i64");
        assert!(retention_days >= 0, "DATA_RETENTION_DAYS must not be negative");

        let tls = match std::env::var("APP_ENV").as_deref() {
            Ok("production") => TlsMode::Enabled,
            _ => TlsMode::Disabled,
        };

        let workload_image = std::env::var("WORKLOAD_IMAGE").unwrap_or(defaults.workload_image);

        let workload_port: u16 = std::env::var("WORKLOAD_PORT")
            .unwrap_or_else(|_| "8090".into())
            .parse()
            .expect("WORKLOAD_PORT must be a valid u16");

        let data_mount = std::env::var("WORKLOAD_DATA_MOUNT").unwrap_or(defaults.data_mount);

        let stop_grace_secs: u32 = std::env::var("STOP_GRACE_SECS")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("STOP_GRACE_SECS must be a valid u32");

        let network = std::env::var("DOCKER_NETWORK").unwrap_or(defaults.network);

        Self {
            base_domain,
            instances_base_path,
            max_instances_per_user,
            retention_days,
            tls,
            workload_image,
            workload_port,
            data_mount,
            stop_grace_secs,
            network,
        }
    }

    /// Entrypoint and command that provision the admin account from the
    /// credential environment variables, then serve.
    pub fn bootstrap_command(&self) -> (Vec<String>, Vec<String>) {
        let dir = &self.data_mount;
        let port = self.workload_port;
        let script = format!(
            "set -e\n\
             /usr/local/bin/pocketbase superuser upsert \"${ADMIN_EMAIL_ENV}\" \"${ADMIN_PASSWORD_ENV}\" --dir={dir} || true\n\
             exec /usr/local/bin/pocketbase serve --http=0.0.0.0:{port} --dir={dir}\n"
        );
        (vec!["/bin/sh".into(), "-c".into()], vec![script])
    }
}
