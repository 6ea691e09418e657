//! Repository for the `instances_archive` table.

use fleet_core::types::{InstanceId, Timestamp, UserId};
use sqlx::PgPool;

use crate::models::archive::{ArchiveInstance, ArchivedInstance};
use crate::models::instance::Instance;

/// Column list for `instances_archive` queries.
const COLUMNS: &str = "\
    id, owner_id, name, slug, workload_id, workload_name, data_path, \
    original_status_id, original_subdomain, created_at, updated_at, last_accessed_at, \
    deleted_at, deleted_by, deletion_reason, data_available, data_retained_until, data_size_mb";

/// Provides archive and retention queries for deleted instances.
pub struct ArchiveRepo;

impl ArchiveRepo {
    /// Insert the snapshot of `instance` and remove its live row in one
    /// transaction.
    ///
    /// The live row is only removed if it still carries the status captured
    /// in the snapshot. Returns `None` (and rolls back) when the row is gone
    /// or has changed since it was read. A second archival of the same id
    /// fails on the primary key.
    pub async fn archive_and_remove(
        pool: &PgPool,
        instance: &Instance,
        input: &ArchiveInstance,
    ) -> Result<Option<ArchivedInstance>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO instances_archive \
                 (id, owner_id, name, slug, workload_id, workload_name, data_path, \
                  original_status_id, original_subdomain, created_at, updated_at, \
                  last_accessed_at, deleted_at, deleted_by, deletion_reason, \
                  data_retained_until, data_size_mb) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             RETURNING {COLUMNS}"
        );
        let archived = sqlx::query_as::<_, ArchivedInstance>(&query)
            .bind(instance.id)
            .bind(instance.owner_id)
            .bind(&instance.name)
            .bind(&instance.slug)
            .bind(&instance.workload_id)
            .bind(&instance.workload_name)
            .bind(&instance.data_path)
            .bind(instance.status_id)
            .bind(&instance.subdomain)
            .bind(instance.created_at)
            .bind(instance.updated_at)
            .bind(instance.last_accessed_at)
            .bind(input.deleted_at)
            .bind(input.deleted_by)
            .bind(&input.deletion_reason)
            .bind(input.data_retained_until)
            .bind(input.data_size_mb)
            .fetch_one(&mut *tx)
            .await?;

        let removed = sqlx::query("DELETE FROM instances WHERE id = $1 AND status_id = $2")
            .bind(instance.id)
            .bind(instance.status_id)
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(archived))
    }

    /// Find an archive record by the original instance ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: InstanceId,
    ) -> Result<Option<ArchivedInstance>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM instances_archive WHERE id = $1");
        sqlx::query_as::<_, ArchivedInstance>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List an owner's archived instances, most recently deleted first.
    pub async fn list_by_owner(
        pool: &PgPool,
        owner_id: UserId,
    ) -> Result<Vec<ArchivedInstance>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM instances_archive WHERE owner_id = $1 \
             ORDER BY deleted_at DESC, id DESC"
        );
        sqlx::query_as::<_, ArchivedInstance>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Records whose retention deadline passed before `now` and whose data
    /// has not been purged yet, oldest deadline first.
    pub async fn find_expired(
        pool: &PgPool,
        now: Timestamp,
    ) -> Result<Vec<ArchivedInstance>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM instances_archive \
             WHERE data_available AND data_retained_until < $1 \
             ORDER BY data_retained_until ASC"
        );
        sqlx::query_as::<_, ArchivedInstance>(&query)
            .bind(now)
            .fetch_all(pool)
            .await
    }

    /// Flip `data_available` to false. Returns `true` only for the call that
    /// performed the flip.
    pub async fn mark_data_purged(pool: &PgPool, id: InstanceId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE instances_archive SET data_available = false \
             WHERE id = $1 AND data_available",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
