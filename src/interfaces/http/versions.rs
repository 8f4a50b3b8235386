use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::domain::room::NamedVersion;
use crate::domain::DiffLine;
use crate::interfaces::http::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListVersionsQuery {
    pub room_id: String,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListVersionsResponse {
    pub versions: Vec<NamedVersion>,
}

pub async fn list_versions(
    State(state): State<AppState>,
    Query(query): Query<ListVersionsQuery>,
) -> AppResult<Json<ListVersionsResponse>> {
    let limit = query.limit.unwrap_or(50);
    let offset = query.offset.unwrap_or(0);
    let versions = state
        .versions
        .list_versions(&query.room_id, limit, offset)
        .await?;
    Ok(Json(ListVersionsResponse { versions }))
}

#[derive(Debug, Deserialize)]
pub struct CreateVersionRequest {
    pub room_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub content: String,
    pub created_by: Option<String>,
    #[serde(default)]
    pub is_auto: bool,
}

pub async fn create_version(
    State(state): State<AppState>,
    Json(body): Json<CreateVersionRequest>,
) -> AppResult<(StatusCode, Json<NamedVersion>)> {
    if body.room_id.trim().is_empty() {
        return Err(AppError::BadRequest("room_id is required".into()));
    }
    if body.content.is_empty() {
        return Err(AppError::BadRequest("content is required".into()));
    }
    let outcome = state
        .versions
        .create_version(
            &body.room_id,
            body.name,
            body.description,
            &body.content,
            body.created_by,
            body.is_auto,
        )
        .await?;
    let status = if outcome.deduped {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(outcome.version)))
}

pub async fn get_version(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<NamedVersion>> {
    let version = state.versions.get_version(id).await?;
    Ok(Json(version))
}

pub async fn delete_version(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.versions.delete_version(id).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct DiffQuery {
    pub from: i64,
    pub to: i64,
}

#[derive(Debug, Serialize)]
pub struct DiffResponse {
    pub lines: Vec<DiffLine>,
}

pub async fn diff_versions(
    State(state): State<AppState>,
    Query(query): Query<DiffQuery>,
) -> AppResult<Json<DiffResponse>> {
    let lines = state.versions.diff(query.from, query.to).await?;
    Ok(Json(DiffResponse { lines }))
}

#[derive(Debug, Serialize)]
pub struct RestoreResponse {
    pub version_id: i64,
    pub content: String,
}

pub async fn restore_version(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<RestoreResponse>> {
    let (version_id, content) = state.versions.restore_version(id).await?;
    Ok(Json(RestoreResponse {
        version_id,
        content,
    }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/versions", get(list_versions).post(create_version))
        .route("/versions/diff", get(diff_versions))
        .route("/versions/:id", get(get_version).delete(delete_version))
        .route("/versions/:id/restore", post(restore_version))
}
