//! Repository for the `instances` table.

use fleet_core::status::InstanceStatus;
use fleet_core::types::{InstanceId, UserId};
use sqlx::PgPool;

use crate::models::instance::{CreateInstance, Instance};

/// Column list for `instances` queries.
const COLUMNS: &str = "\
    id, owner_id, name, slug, subdomain, workload_id, workload_name, \
    status_id, data_path, created_at, updated_at, last_accessed_at";

/// Result of a quota-checked insert.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(Instance),
    /// The owner already has `current` live instances; nothing was inserted.
    QuotaExceeded { current: i64 },
}

/// Provides query operations for live instances.
pub struct InstanceRepo;

impl InstanceRepo {
    /// Insert a new instance in `Creating` status, provided the owner has
    /// fewer than `max_per_owner` live instances.
    ///
    /// The count and the insert run in one transaction holding a
    /// transaction-scoped advisory lock keyed on the owner, so concurrent
    /// creations for the same owner cannot both pass the check.
    pub async fn create_with_quota(
        pool: &PgPool,
        input: &CreateInstance,
        max_per_owner: i64,
    ) -> Result<CreateOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(input.owner_id)
            .execute(&mut *tx)
            .await?;

        let (current,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM instances WHERE owner_id = $1")
                .bind(input.owner_id)
                .fetch_one(&mut *tx)
                .await?;
        if current >= max_per_owner {
            tx.rollback().await?;
            return Ok(CreateOutcome::QuotaExceeded { current });
        }

        let query = format!(
            "INSERT INTO instances \
                 (id, owner_id, name, slug, subdomain, workload_name, status_id, data_path) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        let instance = sqlx::query_as::<_, Instance>(&query)
            .bind(input.id)
            .bind(input.owner_id)
            .bind(&input.name)
            .bind(&input.slug)
            .bind(&input.subdomain)
            .bind(&input.workload_name)
            .bind(InstanceStatus::Creating.id())
            .bind(&input.data_path)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(CreateOutcome::Created(instance))
    }

    /// Find an instance by its ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: InstanceId,
    ) -> Result<Option<Instance>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM instances WHERE id = $1");
        sqlx::query_as::<_, Instance>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find the live instance bound to a subdomain.
    pub async fn find_by_subdomain(
        pool: &PgPool,
        subdomain: &str,
    ) -> Result<Option<Instance>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM instances WHERE subdomain = $1");
        sqlx::query_as::<_, Instance>(&query)
            .bind(subdomain)
            .fetch_optional(pool)
            .await
    }

    /// List an owner's instances, newest first.
    pub async fn list_by_owner(
        pool: &PgPool,
        owner_id: UserId,
    ) -> Result<Vec<Instance>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM instances WHERE owner_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Instance>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Count an owner's live instances, whatever their status.
    pub async fn count_by_owner(pool: &PgPool, owner_id: UserId) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM instances WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    /// Workload names bound to an owner's live instances.
    pub async fn list_workload_names_by_owner(
        pool: &PgPool,
        owner_id: UserId,
    ) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT workload_name FROM instances WHERE owner_id = $1")
                .bind(owner_id)
                .fetch_all(pool)
                .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Set an instance's status. Returns `None` if not found.
    pub async fn update_status(
        pool: &PgPool,
        id: InstanceId,
        status: InstanceStatus,
    ) -> Result<Option<Instance>, sqlx::Error> {
        let query = format!(
            "UPDATE instances SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Instance>(&query)
            .bind(id)
            .bind(status.id())
            .fetch_optional(pool)
            .await
    }

    /// Record the runtime's workload id together with a new status.
    /// Returns `None` if not found.
    pub async fn bind_workload(
        pool: &PgPool,
        id: InstanceId,
        workload_id: &str,
        status: InstanceStatus,
    ) -> Result<Option<Instance>, sqlx::Error> {
        let query = format!(
            "UPDATE instances SET workload_id = $2, status_id = $3, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Instance>(&query)
            .bind(id)
            .bind(workload_id)
            .bind(status.id())
            .fetch_optional(pool)
            .await
    }

    /// Stamp `last_accessed_at`. Returns `true` if a row was updated.
    pub async fn touch_last_accessed(pool: &PgPool, id: InstanceId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE instances SET last_accessed_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
