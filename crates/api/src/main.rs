use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleet_api::config::ServerConfig;
use fleet_api::router::build_app_router;
use fleet_api::state::AppState;
use fleet_lifecycle::{InstanceManager, InstanceStore, LifecycleConfig, PgInstanceStore};
use fleet_runtime::docker::DockerRuntime;
use fleet_runtime::{RuntimeConfig, WorkloadRuntime};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fleet_api=debug,fleet_lifecycle=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let lifecycle_config = LifecycleConfig::from_env();
    tracing::info!(
        base_domain = %lifecycle_config.base_domain,
        instances_base_path = %lifecycle_config.instances_base_path.display(),
        max_instances_per_user = lifecycle_config.max_instances_per_user,
        tls = ?lifecycle_config.tls,
        "Loaded lifecycle configuration",
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = fleet_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    fleet_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    fleet_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Workload runtime ---
    let runtime = DockerRuntime::connect(RuntimeConfig::from_env())
        .await
        .expect("Failed to connect to the Docker daemon");
    tracing::info!("Workload runtime connected");

    // --- Lifecycle ---
    let store: Arc<dyn InstanceStore> = Arc::new(PgInstanceStore::new(pool.clone()));
    let runtime: Arc<dyn WorkloadRuntime> = Arc::new(runtime);
    let manager = Arc::new(InstanceManager::new(store, runtime, lifecycle_config));

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        manager,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or (on Unix) SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
