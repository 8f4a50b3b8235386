use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::domain::room::Room;
use crate::interfaces::http::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListRoomsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListRoomsResponse {
    pub rooms: Vec<Room>,
}

pub async fn list_rooms(
    State(state): State<AppState>,
    Query(query): Query<ListRoomsQuery>,
) -> AppResult<Json<ListRoomsResponse>> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);
    let rooms = state.store.list_rooms(limit, offset).await?;
    Ok(Json(ListRoomsResponse { rooms }))
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub id: Option<String>,
    pub name: Option<String>,
}

pub async fn create_room(
    State(state): State<AppState>,
    Json(body): Json<CreateRoomRequest>,
) -> AppResult<(StatusCode, Json<Room>)> {
    let id = match body.id {
        Some(id) if !id.trim().is_empty() => id,
        _ => return Err(AppError::BadRequest("id is required".into())),
    };
    let name = body.name.unwrap_or_else(|| id.clone());
    let room = state.store.create_room_if_absent(&id, &name).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

pub async fn get_room(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Room>> {
    let room = state.store.get_room(&id).await?;
    Ok(Json(room))
}

pub async fn delete_room(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.store.delete_room(&id).await?;
    Ok(StatusCode::OK)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/:id", get(get_room).delete(delete_room))
}
