//! Persistence port for the lifecycle manager.

use async_trait::async_trait;
use fleet_core::status::InstanceStatus;
use fleet_core::types::{InstanceId, Timestamp, UserId};
use fleet_db::models::archive::{ArchiveInstance, ArchivedInstance};
use fleet_db::models::instance::{CreateInstance, Instance};

/// Failures reported by an [`InstanceStore`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write, or the row changed
    /// underneath a conditional write.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Quota of {limit} instances reached")]
    QuotaExceeded { limit: i64 },

    #[error("Instance {0} not found")]
    NotFound(InstanceId),

    #[error("Database error: {0}")]
    Database(String),
}

/// Storage operations the lifecycle manager depends on.
///
/// Implementations must make [`create_with_quota`] and
/// [`archive_and_remove`] atomic: no caller may observe a partially applied
/// result.
///
/// [`create_with_quota`]: InstanceStore::create_with_quota
/// [`archive_and_remove`]: InstanceStore::archive_and_remove
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Insert in `Creating` status unless the owner already holds
    /// `max_per_owner` live instances. Count and insert are serialized per
    /// owner.
    async fn create_with_quota(
        &self,
        input: CreateInstance,
        max_per_owner: i64,
    ) -> Result<Instance, StoreError>;

    async fn find_by_id(&self, id: InstanceId) -> Result<Option<Instance>, StoreError>;

    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<Instance>, StoreError>;

    /// The owner's live instances, newest first.
    async fn list_by_owner(&self, owner_id: UserId) -> Result<Vec<Instance>, StoreError>;

    async fn list_workload_names_by_owner(
        &self,
        owner_id: UserId,
    ) -> Result<Vec<String>, StoreError>;

    async fn update_status(
        &self,
        id: InstanceId,
        status: InstanceStatus,
    ) -> Result<Instance, StoreError>;

    async fn bind_workload(
        &self,
        id: InstanceId,
        workload_id: &str,
        status: InstanceStatus,
    ) -> Result<Instance, StoreError>;

    async fn touch_last_accessed(&self, id: InstanceId) -> Result<(), StoreError>;

    /// Insert the archive snapshot of `instance` and remove its live row,
    /// all or nothing. Fails with [`StoreError::Conflict`] if the live row
    /// no longer matches the snapshot or the id is already archived.
    async fn archive_and_remove(
        &self,
        instance: &Instance,
        input: ArchiveInstance,
    ) -> Result<ArchivedInstance, StoreError>;

    /// The owner's archived instances, most recently deleted first.
    async fn list_archived_by_owner(
        &self,
        owner_id: UserId,
    ) -> Result<Vec<ArchivedInstance>, StoreError>;

    /// Archived records past their deadline whose data is still on disk.
    async fn find_expired_archives(
        &self,
        now: Timestamp,
    ) -> Result<Vec<ArchivedInstance>, StoreError>;

    /// Flip `data_available` off. Returns `false` if it was already off.
    async fn mark_data_purged(&self, id: InstanceId) -> Result<bool, StoreError>;
}
