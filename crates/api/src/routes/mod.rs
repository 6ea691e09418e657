pub mod health;
pub mod instance;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /instances                           list, create
/// /instances/archived                  deleted instances and retention state
/// /instances/orphans                   unbound workloads of the caller
/// /instances/{id}                      get, delete
/// /instances/{id}/start|stop|restart   power actions (POST)
/// /instances/{id}/logs                 workload logs
/// /instances/{id}/stats                runtime state and resource usage
/// ```
///
/// Every route requires a Bearer token.
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/instances", instance::router())
}
