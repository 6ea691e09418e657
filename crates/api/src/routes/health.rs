use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Liveness report for the fleet API and the two backends it drives.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `"ok"` when both backends answer, `"degraded"` otherwise.
    pub status: &'static str,
    pub version: &'static str,
    /// Instance records (PostgreSQL).
    pub db_healthy: bool,
    /// Workload runtime (container engine).
    pub runtime_healthy: bool,
}

/// GET /health -- pings the record store and the workload runtime
/// concurrently. Always answers 200 so load balancers can read the body.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (db, runtime_healthy) = tokio::join!(
        fleet_db::health_check(&state.pool),
        state.manager.runtime_reachable(),
    );
    let db_healthy = db.is_ok();

    Json(HealthResponse {
        status: if db_healthy && runtime_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        runtime_healthy,
    })
}

/// `/health` lives beside `/api/v1`, outside bearer auth.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
