//! [`InstanceStore`] backed by PostgreSQL through the `fleet_db`
//! repositories.

use async_trait::async_trait;
use fleet_core::status::InstanceStatus;
use fleet_core::types::{InstanceId, Timestamp, UserId};
use fleet_db::models::archive::{ArchiveInstance, ArchivedInstance};
use fleet_db::models::instance::{CreateInstance, Instance};
use fleet_db::repositories::{ArchiveRepo, CreateOutcome, InstanceRepo};
use fleet_db::DbPool;

use crate::store::{InstanceStore, StoreError};

/// PostgreSQL implementation of [`InstanceStore`].
#[derive(Clone)]
pub struct PgInstanceStore {
    pool: DbPool,
}

impl PgInstanceStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Human-readable message for a violated unique constraint.
fn conflict_message(constraint: &str) -> String {
    match constraint {
        "uq_instances_subdomain" | "uq_instances_owner_slug" => {
            "An instance with this name already exists".to_string()
        }
        "uq_instances_workload_name" => "A workload with this name already exists".to_string(),
        other => format!("Duplicate value violates unique constraint: {other}"),
    }
}

/// Classify a sqlx error: unique violations (SQLSTATE `23505`) on a `uq_`
/// constraint or on the archive primary key become [`StoreError::Conflict`];
/// everything else is a database failure.
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            let constraint = db_err.constraint().unwrap_or("unknown");
            if constraint.starts_with("uq_") {
                return StoreError::Conflict(conflict_message(constraint));
            }
            if constraint == "instances_archive_pkey" {
                return StoreError::Conflict("Instance is already archived".to_string());
            }
        }
    }
    tracing::error!(error = %err, "Database error");
    StoreError::Database(err.to_string())
}

#[async_trait]
impl InstanceStore for PgInstanceStore {
    async fn create_with_quota(
        &self,
        input: CreateInstance,
        max_per_owner: i64,
    ) -> Result<Instance, StoreError> {
        match InstanceRepo::create_with_quota(&self.pool, &input, max_per_owner)
            .await
            .map_err(classify)?
        {
            CreateOutcome::Created(instance) => Ok(instance),
            CreateOutcome::QuotaExceeded { .. } => Err(StoreError::QuotaExceeded {
                limit: max_per_owner,
            }),
        }
    }

    async fn find_by_id(&self, id: InstanceId) -> Result<Option<Instance>, StoreError> {
        InstanceRepo::find_by_id(&self.pool, id)
            .await
            .map_err(classify)
    }

    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<Instance>, StoreError> {
        InstanceRepo::find_by_subdomain(&self.pool, subdomain)
            .await
            .map_err(classify)
    }

    async fn list_by_owner(&self, owner_id: UserId) -> Result<Vec<Instance>, StoreError> {
        InstanceRepo::list_by_owner(&self.pool, owner_id)
            .await
            .map_err(classify)
    }

    async fn list_workload_names_by_owner(
        &self,
        owner_id: UserId,
    ) -> Result<Vec<String>, StoreError> {
        InstanceRepo::list_workload_names_by_owner(&self.pool, owner_id)
            .await
            .map_err(classify)
    }

    async fn update_status(
        &self,
        id: InstanceId,
        status: InstanceStatus,
    ) -> Result<Instance, StoreError> {
        InstanceRepo::update_status(&self.pool, id, status)
            .await
            .map_err(classify)?
            .ok_or(StoreError::NotFound(id))
    }

    async fn bind_workload(
        &self,
        id: InstanceId,
        workload_id: &str,
        status: InstanceStatus,
    ) -> Result<Instance, StoreError> {
        InstanceRepo::bind_workload(&self.pool, id, workload_id, status)
            .await
            .map_err(classify)?
            .ok_or(StoreError::NotFound(id))
    }

    async fn touch_last_accessed(&self, id: InstanceId) -> Result<(), StoreError> {
        InstanceRepo::touch_last_accessed(&self.pool, id)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn archive_and_remove(
        &self,
        instance: &Instance,
        input: ArchiveInstance,
    ) -> Result<ArchivedInstance, StoreError> {
        ArchiveRepo::archive_and_remove(&self.pool, instance, &input)
            .await
            .map_err(classify)?
            .ok_or_else(|| {
                StoreError::Conflict("Instance changed while it was being deleted".to_string())
            })
    }

    async fn list_archived_by_owner(
        &self,
        owner_id: UserId,
    ) -> Result<Vec<ArchivedInstance>, StoreError> {
        ArchiveRepo::list_by_owner(&self.pool, owner_id)
            .await
            .map_err(classify)
    }

    async fn find_expired_archives(
        &self,
        now: Timestamp,
    ) -> Result<Vec<ArchivedInstance>, StoreError> {
        ArchiveRepo::find_expired(&self.pool, now)
            .await
            .map_err(classify)
    }

    async fn mark_data_purged(&self, id: InstanceId) -> Result<bool, StoreError> {
        ArchiveRepo::mark_data_purged(&self.pool, id)
            .await
            .map_err(classify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_messages_name_the_clash() {
        assert_eq!(
            conflict_message("uq_instances_subdomain"),
            "An instance with this name already exists"
        );
        assert_eq!(
            conflict_message("uq_instances_owner_slug"),
            "An instance with this name already exists"
        );
        assert!(conflict_message("uq_other").contains("uq_other"));
    }

    #[test]
    fn non_database_errors_are_internal() {
        assert!(matches!(
            classify(sqlx::Error::PoolTimedOut),
            StoreError::Database(_)
        ));
    }
}
