//! Thin Axum HTTP surface over the hub/store (spec §6.2). Carries no auth,
//! no bespoke CORS policy, and no request logging beyond what
//! `tower_http::trace` gives for free — the spec's Non-goals exclude these
//! as features, not as an excuse to drop the ambient `tower-http` layer
//! `main.rs` wires around the whole router.

pub mod error;
pub mod health;
pub mod rooms;
pub mod stats;
pub mod versions;

use axum::Router;

use crate::state::AppState;

/// `/health` is mounted at the root (unprefixed) per spec §6.2; every other
/// HTTP endpoint lives under `/api`. State is applied once the caller
/// merges this with the WebSocket router (see `main.rs`).
pub fn router() -> Router<AppState> {
    let api = Router::new()
        .merge(stats::routes())
        .merge(rooms::routes())
        .merge(versions::routes());

    Router::new().merge(health::routes()).nest("/api", api)
}
