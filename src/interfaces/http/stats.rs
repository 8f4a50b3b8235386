use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::interfaces::http::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub active_rooms: usize,
    pub active_clients: usize,
    pub total_rooms: i64,
    pub total_updates: i64,
    pub timestamp: chrono::DateTime<Utc>,
}

pub async fn get_stats(State(state): State<AppState>) -> AppResult<Json<StatsResponse>> {
    let active_rooms = state.hub.active_room_count().await;
    let active_clients = state.hub.client_count().await;
    let stats = state.store.stats().await?;
    Ok(Json(StatsResponse {
        active_rooms,
        active_clients,
        total_rooms: stats.active_rooms,
        total_updates: stats.total_updates,
        timestamp: Utc::now(),
    }))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/stats", get(get_stats))
}
