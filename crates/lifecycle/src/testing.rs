//! In-memory test doubles: [`MemoryStore`] and [`FakeRuntime`].
//!
//! Both honour the contracts of the real implementations closely enough for
//! lifecycle and API tests: unique constraints and quota in the store, name
//! conflicts and not-found errors in the runtime. Both support failure
//! injection; the runtime can also be slowed down per operation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use fleet_core::status::InstanceStatus;
use fleet_core::types::{InstanceId, Timestamp, UserId};
use fleet_db::models::archive::{ArchiveInstance, ArchivedInstance};
use fleet_db::models::instance::{CreateInstance, Instance};
use fleet_runtime::{
    LogTail, ResourceUsage, RuntimeError, WorkloadRuntime, WorkloadSpec, WorkloadState,
    WorkloadSummary,
};

use crate::store::{InstanceStore, StoreError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ── MemoryStore ──────────────────────────────────────────────────────

#[derive(Default, Clone)]
struct StoreState {
    instances: HashMap<InstanceId, Instance>,
    archive: HashMap<InstanceId, ArchivedInstance>,
}

/// [`InstanceStore`] kept in process memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    fail_archive_before_remove: AtomicBool,
    fail_lookups_after_archive: AtomicBool,
    lookups_failing: AtomicBool,
    fail_touch: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `archive_and_remove` fail after writing the archive
    /// row but before removing the live row. The write is rolled back.
    pub fn fail_next_archive(&self) {
        self.fail_archive_before_remove.store(true, Ordering::SeqCst);
    }

    /// Once the next archival commits, make every `find_by_id` fail.
    pub fn fail_lookups_after_archive(&self) {
        self.fail_lookups_after_archive.store(true, Ordering::SeqCst);
    }

    /// Make every `touch_last_accessed` fail.
    pub fn fail_touches(&self, fail: bool) {
        self.fail_touch.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of one live row.
    pub fn instance(&self, id: InstanceId) -> Option<Instance> {
        lock(&self.state).instances.get(&id).cloned()
    }

    /// Snapshot of one archive record.
    pub fn archived(&self, id: InstanceId) -> Option<ArchivedInstance> {
        lock(&self.state).archive.get(&id).cloned()
    }

    pub fn instance_count(&self) -> usize {
        lock(&self.state).instances.len()
    }

    pub fn archive_count(&self) -> usize {
        lock(&self.state).archive.len()
    }

    /// Insert an archive record directly, bypassing deletion.
    pub fn seed_archive(&self, record: ArchivedInstance) {
        lock(&self.state).archive.insert(record.id, record);
    }

    /// Overwrite a live row's status, bypassing the lifecycle manager.
    pub fn force_status(&self, id: InstanceId, status: InstanceStatus) {
        if let Some(instance) = lock(&self.state).instances.get_mut(&id) {
            instance.status_id = status.id();
        }
    }
}

#[async_trait]
impl InstanceStore for MemoryStore {
    async fn create_with_quota(
        &self,
        input: CreateInstance,
        max_per_owner: i64,
    ) -> Result<Instance, StoreError> {
        let mut state = lock(&self.state);

        let owned = state
            .instances
            .values()
            .filter(|i| i.owner_id == input.owner_id)
            .count() as i64;
        if owned >= max_per_owner {
            return Err(StoreError::QuotaExceeded {
                limit: max_per_owner,
            });
        }

        for existing in state.instances.values() {
            if existing.subdomain == input.subdomain
                || (existing.owner_id == input.owner_id && existing.slug == input.slug)
            {
                return Err(StoreError::Conflict(
                    "An instance with this name already exists".into(),
                ));
            }
            if existing.workload_name == input.workload_name {
                return Err(StoreError::Conflict(
                    "A workload with this name already exists".into(),
                ));
            }
        }

        let now = Utc::now();
        let instance = Instance {
            id: input.id,
            owner_id: input.owner_id,
            name: input.name,
            slug: input.slug,
            subdomain: input.subdomain,
            workload_id: None,
            workload_name: input.workload_name,
            status_id: InstanceStatus::Creating.id(),
            data_path: input.data_path,
            created_at: now,
            updated_at: now,
            last_accessed_at: None,
        };
        state.instances.insert(instance.id, instance.clone());
        Ok(instance)
    }

    async fn find_by_id(&self, id: InstanceId) -> Result<Option<Instance>, StoreError> {
        if self.lookups_failing.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected lookup failure".into()));
        }
        Ok(self.instance(id))
    }

    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<Instance>, StoreError> {
        Ok(lock(&self.state)
            .instances
            .values()
            .find(|i| i.subdomain == subdomain)
            .cloned())
    }

    async fn list_by_owner(&self, owner_id: UserId) -> Result<Vec<Instance>, StoreError> {
        let mut rows: Vec<Instance> = lock(&self.state)
            .instances
            .values()
            .filter(|i| i.owner_id == owner_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(rows)
    }

    async fn list_workload_names_by_owner(
        &self,
        owner_id: UserId,
    ) -> Result<Vec<String>, StoreError> {
        Ok(lock(&self.state)
            .instances
            .values()
            .filter(|i| i.owner_id == owner_id)
            .map(|i| i.workload_name.clone())
            .collect())
    }

    async fn update_status(
        &self,
        id: InstanceId,
        status: InstanceStatus,
    ) -> Result<Instance, StoreError> {
        let mut state = lock(&self.state);
        let instance = state.instances.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        instance.status_id = status.id();
        instance.updated_at = Utc::now();
        Ok(instance.clone())
    }

    async fn bind_workload(
        &self,
        id: InstanceId,
        workload_id: &str,
        status: InstanceStatus,
    ) -> Result<Instance, StoreError> {
        let mut state = lock(&self.state);
        let instance = state.instances.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        instance.workload_id = Some(workload_id.to_string());
        instance.status_id = status.id();
        instance.updated_at = Utc::now();
        Ok(instance.clone())
    }

    async fn touch_last_accessed(&self, id: InstanceId) -> Result<(), StoreError> {
        if self.fail_touch.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected touch failure".into()));
        }
        if let Some(instance) = lock(&self.state).instances.get_mut(&id) {
            instance.last_accessed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn archive_and_remove(
        &self,
        instance: &Instance,
        input: ArchiveInstance,
    ) -> Result<ArchivedInstance, StoreError> {
        let mut state = lock(&self.state);
        // Work on a copy and only publish it on success, like a transaction.
        let mut tx = state.clone();

        if tx.archive.contains_key(&instance.id) {
            return Err(StoreError::Conflict("Instance is already archived".into()));
        }
        let record = ArchivedInstance {
            id: instance.id,
            owner_id: instance.owner_id,
            name: instance.name.clone(),
            slug: instance.slug.clone(),
            workload_id: instance.workload_id.clone(),
            workload_name: instance.workload_name.clone(),
            data_path: instance.data_path.clone(),
            original_status_id: instance.status_id,
            original_subdomain: instance.subdomain.clone(),
            created_at: instance.created_at,
            updated_at: instance.updated_at,
            last_accessed_at: instance.last_accessed_at,
            deleted_at: input.deleted_at,
            deleted_by: input.deleted_by,
            deletion_reason: input.deletion_reason,
            data_available: true,
            data_retained_until: input.data_retained_until,
            data_size_mb: input.data_size_mb,
        };
        tx.archive.insert(record.id, record.clone());

        if self.fail_archive_before_remove.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Database("injected failure before live-row removal".into()));
        }

        match tx.instances.get(&instance.id) {
            Some(live) if live.status_id == instance.status_id => {
                tx.instances.remove(&instance.id);
            }
            _ => {
                return Err(StoreError::Conflict(
                    "Instance changed while it was being deleted".into(),
                ));
            }
        }

        *state = tx;
        if self.fail_lookups_after_archive.swap(false, Ordering::SeqCst) {
            self.lookups_failing.store(true, Ordering::SeqCst);
        }
        Ok(record)
    }

    async fn list_archived_by_owner(
        &self,
        owner_id: UserId,
    ) -> Result<Vec<ArchivedInstance>, StoreError> {
        let mut rows: Vec<ArchivedInstance> = lock(&self.state)
            .archive
            .values()
            .filter(|a| a.owner_id == owner_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.deleted_at, b.id).cmp(&(a.deleted_at, a.id)));
        Ok(rows)
    }

    async fn find_expired_archives(
        &self,
        now: Timestamp,
    ) -> Result<Vec<ArchivedInstance>, StoreError> {
        let mut rows: Vec<ArchivedInstance> = lock(&self.state)
            .archive
            .values()
            .filter(|a| a.data_available && a.data_retained_until < now)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.data_retained_until);
        Ok(rows)
    }

    async fn mark_data_purged(&self, id: InstanceId) -> Result<bool, StoreError> {
        match lock(&self.state).archive.get_mut(&id) {
            Some(record) if record.data_available => {
                record.data_available = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// ── FakeRuntime ──────────────────────────────────────────────────────

/// Runtime operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    EnsureImage,
    Create,
    Start,
    Stop,
    Restart,
    Remove,
    Inspect,
    Logs,
    Stats,
    List,
}

/// A workload held by [`FakeRuntime`].
#[derive(Debug, Clone)]
pub struct FakeWorkload {
    pub id: String,
    pub name: String,
    pub running: bool,
    /// `None` for workloads inserted with [`FakeRuntime::insert_workload`].
    pub spec: Option<WorkloadSpec>,
}

#[derive(Default)]
struct RuntimeState {
    workloads: HashMap<String, FakeWorkload>,
    failures: HashMap<FakeOp, RuntimeError>,
    delays: HashMap<FakeOp, Duration>,
    calls: Vec<(FakeOp, String)>,
    next_id: u64,
}

/// Scriptable in-memory [`WorkloadRuntime`].
#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<RuntimeState>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call to `op` fail with `err` until cleared.
    pub fn fail(&self, op: FakeOp, err: RuntimeError) {
        lock(&self.state).failures.insert(op, err);
    }

    pub fn clear_failure(&self, op: FakeOp) {
        lock(&self.state).failures.remove(&op);
    }

    /// Make every call to `op` sleep for `delay` before it is handled.
    /// Applies to `EnsureImage` and `Create`.
    pub fn delay(&self, op: FakeOp, delay: Duration) {
        lock(&self.state).delays.insert(op, delay);
    }

    /// Every call made so far, with its target (image, name or id).
    pub fn calls(&self) -> Vec<(FakeOp, String)> {
        lock(&self.state).calls.clone()
    }

    pub fn call_count(&self, op: FakeOp) -> usize {
        lock(&self.state).calls.iter().filter(|(o, _)| *o == op).count()
    }

    pub fn workload(&self, id: &str) -> Option<FakeWorkload> {
        lock(&self.state).workloads.get(id).cloned()
    }

    pub fn workload_count(&self) -> usize {
        lock(&self.state).workloads.len()
    }

    /// Add a workload that no instance created, e.g. an orphan.
    pub fn insert_workload(&self, name: &str, running: bool) -> String {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = format!("wl-{}", state.next_id);
        state.workloads.insert(
            id.clone(),
            FakeWorkload {
                id: id.clone(),
                name: name.to_string(),
                running,
                spec: None,
            },
        );
        id
    }

    async fn pause(&self, op: FakeOp) {
        let delay = lock(&self.state).delays.get(&op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    /// Record the call and return the injected failure, if any.
    fn enter(&self, op: FakeOp, target: &str) -> Result<MutexGuard<'_, RuntimeState>, RuntimeError> {
        let mut state = lock(&self.state);
        state.calls.push((op, target.to_string()));
        if let Some(err) = state.failures.get(&op).cloned() {
            return Err(err);
        }
        Ok(state)
    }
}

fn not_found(id: &str) -> RuntimeError {
    RuntimeError::NotFound(format!("No such container: {id}"))
}

#[async_trait]
impl WorkloadRuntime for FakeRuntime {
    async fn ensure_image(&self, image: &str) -> Result<(), RuntimeError> {
        self.pause(FakeOp::EnsureImage).await;
        drop(self.enter(FakeOp::EnsureImage, image)?);
        Ok(())
    }

    async fn create(&self, spec: &WorkloadSpec) -> Result<String, RuntimeError> {
        self.pause(FakeOp::Create).await;
        let mut state = self.enter(FakeOp::Create, &spec.name)?;
        if state.workloads.values().any(|w| w.name == spec.name) {
            return Err(RuntimeError::NameConflict(spec.name.clone()));
        }
        state.next_id += 1;
        let id = format!("wl-{}", state.next_id);
        state.workloads.insert(
            id.clone(),
            FakeWorkload {
                id: id.clone(),
                name: spec.name.clone(),
                running: false,
                spec: Some(spec.clone()),
            },
        );
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<(), RuntimeError> {
        let mut state = self.enter(FakeOp::Start, id)?;
        let workload = state.workloads.get_mut(id).ok_or_else(|| not_found(id))?;
        workload.running = true;
        Ok(())
    }

    async fn stop(&self, id: &str, _grace_secs: u32) -> Result<(), RuntimeError> {
        let mut state = self.enter(FakeOp::Stop, id)?;
        let workload = state.workloads.get_mut(id).ok_or_else(|| not_found(id))?;
        workload.running = false;
        Ok(())
    }

    async fn restart(&self, id: &str, _grace_secs: u32) -> Result<(), RuntimeError> {
        let mut state = self.enter(FakeOp::Restart, id)?;
        let workload = state.workloads.get_mut(id).ok_or_else(|| not_found(id))?;
        workload.running = true;
        Ok(())
    }

    async fn remove(&self, id: &str, _purge_volumes: bool) -> Result<(), RuntimeError> {
        let mut state = self.enter(FakeOp::Remove, id)?;
        state.workloads.remove(id).ok_or_else(|| not_found(id))?;
        Ok(())
    }

    async fn inspect(&self, id: &str) -> Result<WorkloadState, RuntimeError> {
        let state = self.enter(FakeOp::Inspect, id)?;
        let workload = state.workloads.get(id).ok_or_else(|| not_found(id))?;
        Ok(WorkloadState {
            id: workload.id.clone(),
            running: workload.running,
            status: if workload.running { "running" } else { "exited" }.to_string(),
            health: None,
            started_at: workload.running.then(Utc::now),
            created_at: Some(Utc::now()),
        })
    }

    async fn logs(&self, id: &str, tail: LogTail) -> Result<String, RuntimeError> {
        let state = self.enter(FakeOp::Logs, id)?;
        let workload = state.workloads.get(id).ok_or_else(|| not_found(id))?;
        Ok(format!("{} tail={tail}\n", workload.name))
    }

    async fn stats(&self, id: &str) -> Result<ResourceUsage, RuntimeError> {
        let state = self.enter(FakeOp::Stats, id)?;
        state.workloads.get(id).ok_or_else(|| not_found(id))?;
        Ok(ResourceUsage {
            cpu_percent: 1.5,
            memory_bytes: 32 * 1024 * 1024,
            memory_limit_bytes: 512 * 1024 * 1024,
        })
    }

    async fn list_by_name_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<WorkloadSummary>, RuntimeError> {
        let state = self.enter(FakeOp::List, prefix)?;
        Ok(state
            .workloads
            .values()
            .filter(|w| w.name.starts_with(prefix))
            .map(|w| WorkloadSummary {
                id: w.id.clone(),
                name: w.name.clone(),
                running: w.running,
            })
            .collect())
    }
}
