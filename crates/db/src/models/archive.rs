//! Models for the `instances_archive` table.

use fleet_core::status::{InstanceStatus, StatusId};
use fleet_core::types::{InstanceId, Timestamp, UserId};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `instances_archive` table: the snapshot of a deleted
/// instance plus deletion and retention metadata.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ArchivedInstance {
    pub id: InstanceId,
    pub owner_id: UserId,
    pub name: String,
    pub slug: String,
    pub workload_id: Option<String>,
    pub workload_name: String,
    pub data_path: String,
    pub original_status_id: StatusId,
    pub original_subdomain: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub last_accessed_at: Option<Timestamp>,
    pub deleted_at: Timestamp,
    pub deleted_by: UserId,
    pub deletion_reason: String,
    /// Flipped to `false` exactly once, when the retention sweep purges the
    /// data directory.
    pub data_available: bool,
    pub data_retained_until: Timestamp,
    pub data_size_mb: i64,
}

impl ArchivedInstance {
    pub fn original_status(&self) -> Option<InstanceStatus> {
        InstanceStatus::from_id(self.original_status_id)
    }
}

/// Deletion metadata recorded alongside the instance snapshot.
#[derive(Debug, Clone)]
pub struct ArchiveInstance {
    pub deleted_by: UserId,
    pub deletion_reason: String,
    pub deleted_at: Timestamp,
    pub data_retained_until: Timestamp,
    pub data_size_mb: i64,
}
