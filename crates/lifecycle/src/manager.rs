//! Instance lifecycle state machine and orchestration.
//!
//! ```text
//! Creating ──> Running <──> Stopped
//!    │            │            │
//!    └────────────┴────────────┴──> Failed
//!
//! Running | Stopped | Failed ──(delete)──> archived
//! ```
//!
//! Persisted status changes only after the runtime call they describe has
//! succeeded. Cleanup after a failure is best-effort: its errors are logged
//! and never replace the original error.
//!
//! Provisioning runs on its own task. Dropping the caller's future (request
//! timeout, client disconnect) does not stop it, so a row never stays in
//! `Creating` once its runtime work has settled.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use fleet_core::credentials::AdminCredentials;
use fleet_core::error::CoreError;
use fleet_core::naming::{self, InstanceNames};
use fleet_core::retention::{retention_deadline, DEFAULT_DELETION_REASON};
use fleet_core::routing;
use fleet_core::status::InstanceStatus;
use fleet_core::types::{new_instance_id, InstanceId, UserId};
use fleet_db::models::archive::{ArchiveInstance, ArchivedInstance};
use fleet_db::models::instance::{CreateInstance, Instance};
use fleet_runtime::{
    LogTail, ResourceUsage, RestartPolicy, RuntimeError, WorkloadRuntime, WorkloadSpec,
    WorkloadState, WorkloadSummary,
};
use serde::Serialize;

use crate::config::LifecycleConfig;
use crate::data_dir;
use crate::error::LifecycleError;
use crate::locks::InstanceLocks;
use crate::store::InstanceStore;

/// Everything needed to provision a new instance.
#[derive(Debug, Clone)]
pub struct CreateInstanceRequest {
    pub owner_id: UserId,
    /// Owner's username; appears in the subdomain and workload name.
    pub owner_name: String,
    /// Human-readable instance name.
    pub name: String,
    pub credentials: AdminCredentials,
}

/// A freshly provisioned, running instance.
#[derive(Debug, Clone)]
pub struct CreatedInstance {
    pub instance: Instance,
    pub url: String,
}

/// Combined runtime view of an instance.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceStats {
    pub instance_id: InstanceId,
    pub status: InstanceStatus,
    pub url: String,
    pub workload: WorkloadState,
    /// Absent when the workload is not running or the sample failed.
    pub usage: Option<ResourceUsage>,
}

/// Orchestrates instance lifecycles across the store and the runtime.
pub struct InstanceManager {
    store: Arc<dyn InstanceStore>,
    runtime: Arc<dyn WorkloadRuntime>,
    config: Arc<LifecycleConfig>,
    locks: InstanceLocks,
}

/// Owned handles for the provisioning task.
struct Provisioner {
    store: Arc<dyn InstanceStore>,
    runtime: Arc<dyn WorkloadRuntime>,
    config: Arc<LifecycleConfig>,
}

impl InstanceManager {
    pub fn new(
        store: Arc<dyn InstanceStore>,
        runtime: Arc<dyn WorkloadRuntime>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            store,
            runtime,
            config: Arc::new(config),
            locks: InstanceLocks::new(),
        }
    }

    /// Externally reachable URL of an instance.
    pub fn url_for(&self, instance: &Instance) -> String {
        routing::external_url(&instance.subdomain, self.config.tls)
    }

    // ── Create ───────────────────────────────────────────────────────

    /// Provision a new instance and bring it to `Running`.
    ///
    /// The row is persisted in `Creating` before any runtime work. Any
    /// runtime failure moves it to `Failed` and is returned unchanged; the
    /// operation is not retried.
    pub async fn create(&self, req: CreateInstanceRequest) -> Result<CreatedInstance, LifecycleError> {
        let id = new_instance_id();
        let names = naming::derive_names(
            id,
            &req.owner_name,
            &req.name,
            &self.config.base_domain,
            &self.config.instances_base_path,
        )?;

        // Advisory only; the unique constraint is authoritative.
        if self.store.find_by_subdomain(&names.subdomain).await?.is_some() {
            return Err(CoreError::Conflict("An instance with this name already exists".into()).into());
        }

        let input = CreateInstance {
            id,
            owner_id: req.owner_id,
            name: req.name.clone(),
            slug: names.slug.clone(),
            subdomain: names.subdomain.clone(),
            workload_name: names.workload_name.clone(),
            data_path: names.data_path.to_string_lossy().into_owned(),
        };
        let instance = self
            .store
            .create_with_quota(input, self.config.max_instances_per_user)
            .await?;
        tracing::info!(
            instance_id = %instance.id,
            owner_id = %req.owner_id,
            subdomain = %instance.subdomain,
            "Instance created, provisioning workload",
        );

        let provisioner = Provisioner {
            store: Arc::clone(&self.store),
            runtime: Arc::clone(&self.runtime),
            config: Arc::clone(&self.config),
        };
        let task = tokio::spawn(provisioner.run(instance.id, names, req.credentials));
        let instance = match task.await {
            Ok(result) => result?,
            Err(e) => {
                tracing::error!(instance_id = %instance.id, error = %e, "Provisioning task aborted");
                mark_failed(self.store.as_ref(), instance.id).await;
                if e.is_panic() {
                    std::panic::resume_unwind(e.into_panic());
                }
                return Err(RuntimeError::OperationFailed("provisioning was cancelled".into()).into());
            }
        };

        let url = self.url_for(&instance);
        Ok(CreatedInstance { instance, url })
    }

    // ── Start / Stop / Restart ───────────────────────────────────────

    /// Start a stopped instance.
    pub async fn start(&self, id: InstanceId, owner_id: UserId) -> Result<Instance, LifecycleError> {
        let _guard = self.locks.acquire(id).await;
        let instance = self.load_owned(id, owner_id).await?;
        let status = status_of(&instance)?;
        if !status.accepts_power_actions() || status == InstanceStatus::Running {
            return Err(invalid_state("start", status));
        }
        let workload_id = workload_of(&instance)?;

        self.runtime.start(workload_id).await?;
        let instance = self.store.update_status(id, InstanceStatus::Running).await?;
        tracing::info!(instance_id = %id, workload_id = %workload_id, "Instance started");
        Ok(instance)
    }

    /// Stop a running instance.
    pub async fn stop(&self, id: InstanceId, owner_id: UserId) -> Result<Instance, LifecycleError> {
        let _guard = self.locks.acquire(id).await;
        let instance = self.load_owned(id, owner_id).await?;
        let status = status_of(&instance)?;
        if !status.accepts_power_actions() || !status.can_transition_to(InstanceStatus::Stopped) {
            return Err(invalid_state("stop", status));
        }
        let workload_id = workload_of(&instance)?;

        self.runtime
            .stop(workload_id, self.config.stop_grace_secs)
            .await?;
        let instance = self.store.update_status(id, InstanceStatus::Stopped).await?;
        tracing::info!(instance_id = %id, workload_id = %workload_id, "Instance stopped");
        Ok(instance)
    }

    /// Restart a running or stopped instance; it ends up `Running`.
    pub async fn restart(&self, id: InstanceId, owner_id: UserId) -> Result<Instance, LifecycleError> {
        let _guard = self.locks.acquire(id).await;
        let instance = self.load_owned(id, owner_id).await?;
        let status = status_of(&instance)?;
        if !status.accepts_power_actions() {
            return Err(invalid_state("restart", status));
        }
        let workload_id = workload_of(&instance)?;

        self.runtime
            .restart(workload_id, self.config.stop_grace_secs)
            .await?;
        let instance = self.store.update_status(id, InstanceStatus::Running).await?;
        tracing::info!(instance_id = %id, workload_id = %workload_id, "Instance restarted");
        Ok(instance)
    }

    // ── Delete ───────────────────────────────────────────────────────

    /// Archive an instance and tear down its workload.
    ///
    /// The archive snapshot and the live-row removal commit together before
    /// anything is destroyed. Workload teardown afterwards is best-effort and
    /// always attempted; the data directory is left in place for the
    /// retention window.
    pub async fn delete(
        &self,
        id: InstanceId,
        owner_id: UserId,
        reason: Option<&str>,
    ) -> Result<ArchivedInstance, LifecycleError> {
        let _guard = self.locks.acquire(id).await;
        let instance = self.load_owned(id, owner_id).await?;
        let status = status_of(&instance)?;
        if !status.is_deletable() {
            return Err(invalid_state("delete", status));
        }

        let deletion_reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_DELETION_REASON)
            .to_string();
        let data_size_mb = data_dir::estimate_size_mb(Path::new(&instance.data_path)).await;
        let deleted_at = Utc::now();
        let input = ArchiveInstance {
            deleted_by: owner_id,
            deletion_reason,
            deleted_at,
            data_retained_until: retention_deadline(deleted_at, self.config.retention_days)?,
            data_size_mb,
        };

        let archived = self.store.archive_and_remove(&instance, input).await?;
        tracing::info!(
            instance_id = %id,
            original_status = %status,
            data_size_mb,
            retained_until = %archived.data_retained_until,
            "Instance archived",
        );

        if let Some(workload_id) = instance.workload_id.as_deref() {
            self.teardown(workload_id).await;
        }

        match self.store.find_by_id(id).await {
            Ok(None) => Ok(archived),
            Ok(Some(_)) => {
                tracing::error!(instance_id = %id, "Live row survived archival");
                Err(LifecycleError::Integrity(format!(
                    "instance {id} is archived but still live"
                )))
            }
            Err(e) => {
                tracing::warn!(instance_id = %id, error = %e, "Could not verify live-row removal");
                Ok(archived)
            }
        }
    }

    async fn teardown(&self, workload_id: &str) {
        match self
            .runtime
            .stop(workload_id, self.config.stop_grace_secs)
            .await
        {
            Ok(()) | Err(RuntimeError::NotFound(_)) => {}
            Err(e) => {
                tracing::warn!(workload_id = %workload_id, error = %e, "Failed to stop workload");
            }
        }
        remove_quietly(self.runtime.as_ref(), workload_id).await;
    }

    // ── Observation ──────────────────────────────────────────────────

    /// Workload logs. `tail` is `"all"` or a positive line count; defaults
    /// to the last 100 lines.
    pub async fn logs(
        &self,
        id: InstanceId,
        owner_id: UserId,
        tail: Option<&str>,
    ) -> Result<String, LifecycleError> {
        let tail = match tail {
            None => LogTail::default(),
            Some(spec) => LogTail::parse(spec).ok_or_else(|| {
                CoreError::Validation(format!(
                    "tail must be 'all' or a positive integer, got '{spec}'"
                ))
            })?,
        };
        let instance = self.load_owned(id, owner_id).await?;
        let workload_id = workload_of(&instance)?;

        let logs = self.runtime.logs(workload_id, tail).await?;
        self.touch(id).await;
        Ok(logs)
    }

    /// Runtime state and, for running workloads, a resource usage sample.
    pub async fn stats(&self, id: InstanceId, owner_id: UserId) -> Result<InstanceStats, LifecycleError> {
        let instance = self.load_owned(id, owner_id).await?;
        let status = status_of(&instance)?;
        let workload_id = workload_of(&instance)?;

        let workload = self.runtime.inspect(workload_id).await?;
        let usage = if workload.running {
            match self.runtime.stats(workload_id).await {
                Ok(usage) => Some(usage),
                Err(e) => {
                    tracing::warn!(instance_id = %id, error = %e, "Failed to sample resource usage");
                    None
                }
            }
        } else {
            None
        };

        self.touch(id).await;
        Ok(InstanceStats {
            instance_id: id,
            status,
            url: self.url_for(&instance),
            workload,
            usage,
        })
    }

    /// The owner's live instances, newest first.
    pub async fn list(&self, owner_id: UserId) -> Result<Vec<Instance>, LifecycleError> {
        Ok(self.store.list_by_owner(owner_id).await?)
    }

    /// A single instance owned by `owner_id`.
    pub async fn get(&self, id: InstanceId, owner_id: UserId) -> Result<Instance, LifecycleError> {
        let instance = self.load_owned(id, owner_id).await?;
        self.touch(id).await;
        Ok(instance)
    }

    /// The owner's archived instances, most recently deleted first.
    pub async fn list_archived(&self, owner_id: UserId) -> Result<Vec<ArchivedInstance>, LifecycleError> {
        Ok(self.store.list_archived_by_owner(owner_id).await?)
    }

    /// Runtime workloads carrying the owner's name prefix that no live
    /// instance of the owner is bound to.
    pub async fn find_orphans(
        &self,
        owner_id: UserId,
        owner_name: &str,
    ) -> Result<Vec<WorkloadSummary>, LifecycleError> {
        naming::validate_owner_name(owner_name)?;
        let prefix = naming::workload_name_prefix(owner_name);

        let workloads = self.runtime.list_by_name_prefix(&prefix).await?;
        let bound: HashSet<String> = self
            .store
            .list_workload_names_by_owner(owner_id)
            .await?
            .into_iter()
            .collect();

        Ok(workloads
            .into_iter()
            .filter(|w| !bound.contains(&w.name))
            .collect())
    }

    /// Whether the workload runtime answers a listing of fleet workloads.
    pub async fn runtime_reachable(&self) -> bool {
        match self
            .runtime
            .list_by_name_prefix(naming::WORKLOAD_NAME_PREFIX)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Workload runtime unreachable");
                false
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    async fn load_owned(&self, id: InstanceId, owner_id: UserId) -> Result<Instance, LifecycleError> {
        let instance = self.store.find_by_id(id).await?.ok_or(CoreError::NotFound {
            entity: "Instance",
            id,
        })?;
        if instance.owner_id != owner_id {
            return Err(CoreError::NotOwner { id }.into());
        }
        Ok(instance)
    }

    async fn touch(&self, id: InstanceId) {
        if let Err(e) = self.store.touch_last_accessed(id).await {
            tracing::warn!(instance_id = %id, error = %e, "Failed to update last access time");
        }
    }

}

impl Provisioner {
    /// Provision the workload for a `Creating` row and bind it. Any failure
    /// leaves the row `Failed`.
    async fn run(
        self,
        instance_id: InstanceId,
        names: InstanceNames,
        credentials: AdminCredentials,
    ) -> Result<Instance, LifecycleError> {
        let workload_id = match self.provision(&names, &credentials).await {
            Ok(workload_id) => workload_id,
            Err(e) => {
                tracing::error!(instance_id = %instance_id, error = %e, "Provisioning failed");
                mark_failed(self.store.as_ref(), instance_id).await;
                return Err(e);
            }
        };

        let instance = match self
            .store
            .bind_workload(instance_id, &workload_id, InstanceStatus::Running)
            .await
        {
            Ok(instance) => instance,
            Err(e) => {
                tracing::error!(instance_id = %instance_id, error = %e, "Failed to record workload");
                remove_quietly(self.runtime.as_ref(), &workload_id).await;
                mark_failed(self.store.as_ref(), instance_id).await;
                return Err(e.into());
            }
        };

        tracing::info!(
            instance_id = %instance_id,
            workload_id = %workload_id,
            "Instance running",
        );
        Ok(instance)
    }

    /// Prepare the data directory, create the workload with its routing
    /// labels, and start it. Returns the workload id.
    async fn provision(
        &self,
        names: &InstanceNames,
        credentials: &AdminCredentials,
    ) -> Result<String, LifecycleError> {
        let host_data_path = data_dir::ensure(&names.data_path).await.map_err(|e| {
            RuntimeError::OperationFailed(format!(
                "failed to prepare data directory {}: {e}",
                names.data_path.display()
            ))
        })?;

        self.runtime.ensure_image(&self.config.workload_image).await?;

        let labels = routing::build_rule(
            &names.workload_name,
            &names.subdomain,
            self.config.workload_port,
            self.config.tls,
        )
        .with_network(&self.config.network)
        .to_labels();
        let (entrypoint, command) = self.config.bootstrap_command();
        let spec = WorkloadSpec {
            name: names.workload_name.clone(),
            image: self.config.workload_image.clone(),
            exposed_port: self.config.workload_port,
            host_data_path,
            container_data_path: self.config.data_mount.clone(),
            restart_policy: RestartPolicy::UnlessStopped,
            labels,
            env: credentials.to_env(),
            entrypoint: Some(entrypoint),
            command: Some(command),
            network: Some(self.config.network.clone()),
        };

        let workload_id = self.runtime.create(&spec).await?;

        if let Err(e) = self.runtime.start(&workload_id).await {
            remove_quietly(self.runtime.as_ref(), &workload_id).await;
            return Err(e.into());
        }
        Ok(workload_id)
    }
}

async fn mark_failed(store: &dyn InstanceStore, id: InstanceId) {
    if let Err(e) = store.update_status(id, InstanceStatus::Failed).await {
        tracing::warn!(instance_id = %id, error = %e, "Failed to mark instance as failed");
    }
}

async fn remove_quietly(runtime: &dyn WorkloadRuntime, workload_id: &str) {
    match runtime.remove(workload_id, false).await {
        Ok(()) | Err(RuntimeError::NotFound(_)) => {}
        Err(e) => {
            tracing::warn!(workload_id = %workload_id, error = %e, "Failed to remove workload");
        }
    }
}

fn status_of(instance: &Instance) -> Result<InstanceStatus, LifecycleError> {
    instance.status().ok_or_else(|| {
        LifecycleError::Store(format!(
            "instance {} has unknown status id {}",
            instance.id, instance.status_id
        ))
    })
}

fn workload_of(instance: &Instance) -> Result<&str, LifecycleError> {
    instance
        .workload_id
        .as_deref()
        .ok_or_else(|| CoreError::NoWorkload { id: instance.id }.into())
}

fn invalid_state(action: &'static str, status: InstanceStatus) -> LifecycleError {
    CoreError::InvalidState {
        action,
        status: status.as_str(),
    }
    .into()
}
