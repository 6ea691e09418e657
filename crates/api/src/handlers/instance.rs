//! Handlers for the `/instances` resource.
//!
//! Every handler acts on behalf of the authenticated owner; instances of
//! other owners are indistinguishable from missing ones.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use fleet_core::credentials::AdminCredentials;
use fleet_core::error::CoreError;
use fleet_core::types::InstanceId;
use fleet_db::models::archive::ArchivedInstance;
use fleet_db::models::instance::Instance;
use fleet_lifecycle::{CreateInstanceRequest, InstanceStats};
use fleet_runtime::WorkloadSummary;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /instances`.
///
/// The admin credentials are handed to the workload's bootstrap and never
/// stored.
#[derive(Deserialize, Validate)]
pub struct CreateInstanceBody {
    #[validate(length(min = 3, max = 100))]
    pub name: String,
    #[validate(email)]
    pub admin_email: String,
    #[validate(length(min = 8))]
    pub admin_password: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    /// Free-form deletion reason; defaults to `manual`.
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    /// `all` or a positive line count; defaults to 100.
    pub tail: Option<String>,
}

/// A live instance with its status label and external URL.
#[derive(Debug, Serialize)]
pub struct InstanceView {
    #[serde(flatten)]
    pub instance: Instance,
    pub status: &'static str,
    pub url: String,
}

impl InstanceView {
    fn new(state: &AppState, instance: Instance) -> Self {
        let url = state.manager.url_for(&instance);
        let status = instance.status().map_or("unknown", |s| s.as_str());
        Self {
            instance,
            status,
            url,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedInstanceView {
    pub instance: InstanceView,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct LogsView {
    pub instance_id: InstanceId,
    pub logs: String,
}

/// POST /api/v1/instances
///
/// Provision a new instance for the caller. Returns 201 once it is running.
pub async fn create_instance(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateInstanceBody>,
) -> AppResult<(StatusCode, Json<DataResponse<CreatedInstanceView>>)> {
    body.validate()
        .map_err(|e| CoreError::Validation(e.to_string()))?;
    let credentials = AdminCredentials::new(body.admin_email, body.admin_password)?;

    let created = state
        .manager
        .create(CreateInstanceRequest {
            owner_id: user.user_id,
            owner_name: user.username,
            name: body.name,
            credentials,
        })
        .await?;

    let url = created.url;
    let instance = InstanceView::new(&state, created.instance);
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: CreatedInstanceView { instance, url },
        }),
    ))
}

/// GET /api/v1/instances
pub async fn list_instances(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<InstanceView>>>> {
    let instances = state.manager.list(user.user_id).await?;
    let data = instances
        .into_iter()
        .map(|i| InstanceView::new(&state, i))
        .collect();
    Ok(Json(DataResponse { data }))
}

/// GET /api/v1/instances/archived
pub async fn list_archived(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<ArchivedInstance>>>> {
    let data = state.manager.list_archived(user.user_id).await?;
    Ok(Json(DataResponse { data }))
}

/// GET /api/v1/instances/orphans
///
/// Runtime workloads named for the caller that no live instance is bound to.
pub async fn list_orphans(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<WorkloadSummary>>>> {
    let data = state
        .manager
        .find_orphans(user.user_id, &user.username)
        .await?;
    Ok(Json(DataResponse { data }))
}

/// GET /api/v1/instances/{id}
pub async fn get_instance(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<InstanceId>,
) -> AppResult<Json<DataResponse<InstanceView>>> {
    let instance = state.manager.get(id, user.user_id).await?;
    Ok(Json(DataResponse {
        data: InstanceView::new(&state, instance),
    }))
}

/// DELETE /api/v1/instances/{id}
///
/// Archive the instance and tear down its workload. Data is retained until
/// the retention sweep purges it.
pub async fn delete_instance(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<InstanceId>,
    Query(params): Query<DeleteQuery>,
) -> AppResult<StatusCode> {
    state
        .manager
        .delete(id, user.user_id, params.reason.as_deref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/instances/{id}/start
pub async fn start_instance(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<InstanceId>,
) -> AppResult<Json<DataResponse<InstanceView>>> {
    let instance = state.manager.start(id, user.user_id).await?;
    Ok(Json(DataResponse {
        data: InstanceView::new(&state, instance),
    }))
}

/// POST /api/v1/instances/{id}/stop
pub async fn stop_instance(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<InstanceId>,
) -> AppResult<Json<DataResponse<InstanceView>>> {
    let instance = state.manager.stop(id, user.user_id).await?;
    Ok(Json(DataResponse {
        data: InstanceView::new(&state, instance),
    }))
}

/// POST /api/v1/instances/{id}/restart
pub async fn restart_instance(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<InstanceId>,
) -> AppResult<Json<DataResponse<InstanceView>>> {
    let instance = state.manager.restart(id, user.user_id).await?;
    Ok(Json(DataResponse {
        data: InstanceView::new(&state, instance),
    }))
}

/// GET /api/v1/instances/{id}/logs
pub async fn instance_logs(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<InstanceId>,
    Query(params): Query<LogsQuery>,
) -> AppResult<Json<DataResponse<LogsView>>> {
    let logs = state
        .manager
        .logs(id, user.user_id, params.tail.as_deref())
        .await?;
    Ok(Json(DataResponse {
        data: LogsView {
            instance_id: id,
            logs,
        },
    }))
}

/// GET /api/v1/instances/{id}/stats
pub async fn instance_stats(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<InstanceId>,
) -> AppResult<Json<DataResponse<InstanceStats>>> {
    let data = state.manager.stats(id, user.user_id).await?;
    Ok(Json(DataResponse { data }))
}
