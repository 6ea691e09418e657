//! Models for the `instances` table.

use fleet_core::status::{InstanceStatus, StatusId};
use fleet_core::types::{InstanceId, Timestamp, UserId};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `instances` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Instance {
    pub id: InstanceId,
    pub owner_id: UserId,
    pub name: String,
    pub slug: String,
    pub subdomain: String,
    /// Runtime-assigned id; `None` until workload creation succeeds.
    pub workload_id: Option<String>,
    pub workload_name: String,
    pub status_id: StatusId,
    pub data_path: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub last_accessed_at: Option<Timestamp>,
}

impl Instance {
    /// Decoded lifecycle status, or `None` for an id outside the lookup table.
    pub fn status(&self) -> Option<InstanceStatus> {
        InstanceStatus::from_id(self.status_id)
    }
}

/// DTO for inserting a new instance in `Creating` status.
#[derive(Debug, Clone)]
pub struct CreateInstance {
    pub id: InstanceId,
    pub owner_id: UserId,
    pub name: String,
    pub slug: String,
    pub subdomain: String,
    pub workload_name: String,
    pub data_path: String,
}
