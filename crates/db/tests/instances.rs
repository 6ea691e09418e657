//! Repository tests against a real PostgreSQL database.
//!
//! Run with `DATABASE_URL` pointing at a server the test harness may create
//! scratch databases on: `cargo test -p fleet-db -- --ignored`.

use chrono::{Duration, Utc};
use fleet_core::status::InstanceStatus;
use fleet_db::models::archive::ArchiveInstance;
use fleet_db::models::instance::{CreateInstance, Instance};
use fleet_db::repositories::{ArchiveRepo, CreateOutcome, InstanceRepo};
use sqlx::PgPool;
use uuid::Uuid;

fn new_instance(owner_id: Uuid, slug: &str) -> CreateInstance {
    CreateInstance {
        id: Uuid::now_v7(),
        owner_id,
        name: slug.replace('-', " "),
        slug: slug.to_string(),
        subdomain: format!("alice-{slug}.example.com"),
        workload_name: format!("pb-alice-{slug}"),
        data_path: format!("./instances/alice/{slug}"),
    }
}

async fn create(pool: &PgPool, input: &CreateInstance) -> Instance {
    match InstanceRepo::create_with_quota(pool, input, 5).await.unwrap() {
        CreateOutcome::Created(instance) => instance,
        other => panic!("expected Created, got {other:?}"),
    }
}

fn archive_input(owner_id: Uuid, retention_days: i64) -> ArchiveInstance {
    let now = Utc::now();
    ArchiveInstance {
        deleted_by: owner_id,
        deletion_reason: "manual".into(),
        deleted_at: now,
        data_retained_until: now + Duration::days(retention_days),
        data_size_mb: 12,
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn status_lookup_matches_enum(pool: PgPool) {
    fleet_db::health_check(&pool).await.unwrap();

    let rows: Vec<(i16, String)> = sqlx::query_as("SELECT id, name FROM instance_statuses")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(rows.len(), 4);
    for (id, name) in rows {
        let status = InstanceStatus::from_id(id).expect("known status id");
        assert_eq!(status.as_str(), name);
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn create_starts_in_creating(pool: PgPool) {
    let owner = Uuid::new_v4();
    let instance = create(&pool, &new_instance(owner, "my-cool-db")).await;

    assert_eq!(instance.status(), Some(InstanceStatus::Creating));
    assert!(instance.workload_id.is_none());
    assert_eq!(InstanceRepo::count_by_owner(&pool, owner).await.unwrap(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn quota_blocks_insert(pool: PgPool) {
    let owner = Uuid::new_v4();
    for i in 0..2 {
        let input = new_instance(owner, &format!("db-{i}"));
        InstanceRepo::create_with_quota(&pool, &input, 2).await.unwrap();
    }

    let outcome = InstanceRepo::create_with_quota(&pool, &new_instance(owner, "db-9"), 2)
        .await
        .unwrap();
    assert!(matches!(outcome, CreateOutcome::QuotaExceeded { current: 2 }));
    assert_eq!(InstanceRepo::count_by_owner(&pool, owner).await.unwrap(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn duplicate_subdomain_violates_named_constraint(pool: PgPool) {
    let owner = Uuid::new_v4();
    create(&pool, &new_instance(owner, "dup")).await;

    let err = InstanceRepo::create_with_quota(&pool, &new_instance(owner, "dup"), 5)
        .await
        .unwrap_err();
    let db_err = err.as_database_error().expect("database error");
    assert_eq!(db_err.code().as_deref(), Some("23505"));
    assert!(db_err.constraint().unwrap().starts_with("uq_instances_"));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn bind_workload_sets_running(pool: PgPool) {
    let owner = Uuid::new_v4();
    let instance = create(&pool, &new_instance(owner, "bound")).await;

    let updated = InstanceRepo::bind_workload(&pool, instance.id, "abc123", InstanceStatus::Running)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.workload_id.as_deref(), Some("abc123"));
    assert_eq!(updated.status(), Some(InstanceStatus::Running));

    assert!(InstanceRepo::touch_last_accessed(&pool, instance.id).await.unwrap());
    let reloaded = InstanceRepo::find_by_id(&pool, instance.id).await.unwrap().unwrap();
    assert!(reloaded.last_accessed_at.is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn archive_moves_row_once(pool: PgPool) {
    let owner = Uuid::new_v4();
    let created = create(&pool, &new_instance(owner, "gone")).await;
    let instance = InstanceRepo::update_status(&pool, created.id, InstanceStatus::Running)
        .await
        .unwrap()
        .unwrap();

    let archived = ArchiveRepo::archive_and_remove(&pool, &instance, &archive_input(owner, 30))
        .await
        .unwrap()
        .expect("archived");
    assert_eq!(archived.original_status(), Some(InstanceStatus::Running));
    assert_eq!(archived.original_subdomain, instance.subdomain);
    assert_eq!(archived.created_at, instance.created_at);
    assert_eq!(archived.updated_at, instance.updated_at);
    assert_eq!(archived.last_accessed_at, None);
    assert!(archived.data_available);
    assert!(InstanceRepo::find_by_id(&pool, instance.id).await.unwrap().is_none());

    // The live row is gone, so a second attempt cannot remove anything and
    // the primary key rejects a second snapshot.
    assert!(ArchiveRepo::archive_and_remove(&pool, &instance, &archive_input(owner, 30))
        .await
        .is_err());
    assert_eq!(ArchiveRepo::list_by_owner(&pool, owner).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn stale_snapshot_rolls_back(pool: PgPool) {
    let owner = Uuid::new_v4();
    let snapshot = create(&pool, &new_instance(owner, "stale")).await;
    InstanceRepo::update_status(&pool, snapshot.id, InstanceStatus::Failed)
        .await
        .unwrap();

    let result = ArchiveRepo::archive_and_remove(&pool, &snapshot, &archive_input(owner, 30))
        .await
        .unwrap();
    assert!(result.is_none());
    assert!(ArchiveRepo::find_by_id(&pool, snapshot.id).await.unwrap().is_none());
    assert!(InstanceRepo::find_by_id(&pool, snapshot.id).await.unwrap().is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn expired_records_are_purged_once(pool: PgPool) {
    let owner = Uuid::new_v4();
    let expired = create(&pool, &new_instance(owner, "old")).await;
    let fresh = create(&pool, &new_instance(owner, "new")).await;

    let now = Utc::now();
    let past = ArchiveInstance {
        deleted_at: now - Duration::days(31),
        data_retained_until: now - Duration::seconds(1),
        ..archive_input(owner, 0)
    };
    ArchiveRepo::archive_and_remove(&pool, &expired, &past).await.unwrap();
    ArchiveRepo::archive_and_remove(&pool, &fresh, &archive_input(owner, 30))
        .await
        .unwrap();

    let due = ArchiveRepo::find_expired(&pool, now).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, expired.id);

    assert!(ArchiveRepo::mark_data_purged(&pool, expired.id).await.unwrap());
    assert!(!ArchiveRepo::mark_data_purged(&pool, expired.id).await.unwrap());
    assert!(ArchiveRepo::find_expired(&pool, now).await.unwrap().is_empty());
}
