//! HTTP Handlers

use crate::application::context::CredentialContext;
use crate::domain::entities::TaskStatus;
use crate::domain::repository::{CredentialRepository, IdentitySource, PlatformClient};
use crate::error::{CredentialError, CredentialResult};
use crate::presentation::dto::{
    AddIdentityRequest, DownloadAccepted, DownloadRequest, IdentitiesResponse, ReloadResponse,
    TaskStatusResponse,
};
use axum::Json;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use kernel::id::TaskId;
use platform::client::client_key;
use std::net::SocketAddr;

/// POST /api/download
pub async fn submit_download<R, P, S>(
    State(ctx): State<CredentialContext<R, P, S>>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<DownloadRequest>,
) -> CredentialResult<impl IntoResponse>
where
    R: CredentialRepository,
    P: PlatformClient + Send + Sync + 'static,
    S: IdentitySource + Send + Sync + 'static,
{
    let client = client_key(&headers, Some(addr.ip()));

    let submitted = ctx.submit_use_case().execute(&client, &req.url).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DownloadAccepted {
            task_id: submitted.task_id,
            status: TaskStatus::Processing,
        }),
    ))
}

/// GET /api/status/{task_id}
pub async fn task_status<R, P, S>(
    State(ctx): State<CredentialContext<R, P, S>>,
    Path(task_id): Path<String>,
) -> CredentialResult<Json<TaskStatusResponse>>
where
    R: CredentialRepository,
    P: PlatformClient + Send + Sync + 'static,
    S: IdentitySource + Send + Sync + 'static,
{
    // A malformed id cannot name a task
    let task_id: TaskId = task_id.parse().map_err(|_| CredentialError::TaskNotFound)?;
    let task = ctx.tasks.poll(task_id)?;
    Ok(Json(task.into()))
}

/// GET /api/admin/identities
pub async fn list_identities<R, P, S>(
    State(ctx): State<CredentialContext<R, P, S>>,
) -> CredentialResult<Json<IdentitiesResponse>>
where
    R: CredentialRepository,
    P: PlatformClient + Send + Sync + 'static,
    S: IdentitySource + Send + Sync + 'static,
{
    let identities = ctx.snapshot_use_case().execute().await?;
    Ok(Json(IdentitiesResponse {
        count: identities.len(),
        identities,
    }))
}

/// POST /api/admin/identities
pub async fn add_identity<R, P, S>(
    State(ctx): State<CredentialContext<R, P, S>>,
    Json(req): Json<AddIdentityRequest>,
) -> CredentialResult<impl IntoResponse>
where
    R: CredentialRepository,
    P: PlatformClient + Send + Sync + 'static,
    S: IdentitySource + Send + Sync + 'static,
{
    let summary = ctx
        .credential_store()
        .add_identity(&req.name, req.secrets)
        .await?;
    Ok((StatusCode::CREATED, Json(ReloadResponse::from(summary))))
}

/// DELETE /api/admin/identities/{name}
pub async fn remove_identity<R, P, S>(
    State(ctx): State<CredentialContext<R, P, S>>,
    Path(name): Path<String>,
) -> CredentialResult<Json<ReloadResponse>>
where
    R: CredentialRepository,
    P: PlatformClient + Send + Sync + 'static,
    S: IdentitySource + Send + Sync + 'static,
{
    let summary = ctx.credential_store().remove_identity(&name).await?;
    Ok(Json(summary.into()))
}

/// POST /api/admin/reload
pub async fn reload_identities<R, P, S>(
    State(ctx): State<CredentialContext<R, P, S>>,
) -> CredentialResult<Json<ReloadResponse>>
where
    R: CredentialRepository,
    P: PlatformClient + Send + Sync + 'static,
    S: IdentitySource + Send + Sync + 'static,
{
    let summary = ctx.credential_store().reload().await?;
    Ok(Json(summary.into()))
}
