use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleet_lifecycle::{FsDataPurger, InstanceStore, PgInstanceStore, RetentionManager};
use fleet_worker::config::WorkerConfig;
use fleet_worker::retention;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleet_worker=debug,fleet_lifecycle=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = fleet_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    fleet_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database connection pool created");

    let store: Arc<dyn InstanceStore> = Arc::new(PgInstanceStore::new(pool));
    let sweeper = RetentionManager::new(store, Arc::new(FsDataPurger));

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(retention::run(
        sweeper,
        config.sweep_interval,
        cancel.clone(),
    ));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to install Ctrl-C handler")?;
    tracing::info!("Received SIGINT (Ctrl-C), shutting down");

    cancel.cancel();
    // A sweep in progress finishes its current record set.
    if tokio::time::timeout(Duration::from_secs(30), handle)
        .await
        .is_err()
    {
        tracing::warn!("Retention sweep did not stop in time");
    }

    tracing::info!("Worker stopped");
    Ok(())
}
