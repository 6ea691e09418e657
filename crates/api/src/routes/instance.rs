//! Route definitions for the `/instances` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::instance;
use crate::state::AppState;

/// Routes mounted at `/instances`.
///
/// ```text
/// GET    /                  -> list_instances
/// POST   /                  -> create_instance
/// GET    /archived          -> list_archived
/// GET    /orphans           -> list_orphans
/// GET    /{id}              -> get_instance
/// DELETE /{id}              -> delete_instance  (?reason=)
/// POST   /{id}/start        -> start_instance
/// POST   /{id}/stop         -> stop_instance
/// POST   /{id}/restart      -> restart_instance
/// GET    /{id}/logs         -> instance_logs    (?tail=)
/// GET    /{id}/stats        -> instance_stats
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(instance::list_instances).post(instance::create_instance),
        )
        .route("/archived", get(instance::list_archived))
        .route("/orphans", get(instance::list_orphans))
        .route(
            "/{id}",
            get(instance::get_instance).delete(instance::delete_instance),
        )
        .route("/{id}/start", post(instance::start_instance))
        .route("/{id}/stop", post(instance::stop_instance))
        .route("/{id}/restart", post(instance::restart_instance))
        .route("/{id}/logs", get(instance::instance_logs))
        .route("/{id}/stats", get(instance::instance_stats))
}
