//! The bidirectional streaming endpoint (spec §6.1). Framing, ping/pong and
//! rate limiting live here; the hub itself never touches a socket — it only
//! ever sees `Vec<u8>` frames over channels (spec §4.3, §9).

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, Duration};

use crate::domain::frame::classify_frame;
use crate::state::AppState;

const READ_DEADLINE: Duration = Duration::from_secs(60);
const PING_PERIOD: Duration = Duration::from_secs(54);
const WRITE_DEADLINE: Duration = Duration::from_secs(10);
const OUTBOUND_BUFFER: usize = 512;
const VIOLATION_WARN_EVERY: u32 = 100;
const VIOLATION_DISCONNECT_AT: u32 = 1000;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub room: Option<String>,
}

pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    let room_id = query.room.unwrap_or_else(|| "default".to_string());
    ws.on_upgrade(move |socket| handle_socket(socket, room_id, state))
}

async fn handle_socket(socket: WebSocket, room_id: String, state: AppState) {
    let client_id = uuid::Uuid::new_v4().to_string();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(OUTBOUND_BUFFER);

    state.hub.register(room_id.clone(), client_id.clone(), out_tx).await;
    tracing::debug!(room_id, client_id, "ws_client_registered");

    let mut ping_ticker = interval(PING_PERIOD);
    ping_ticker.tick().await; // first tick fires immediately; discard it

    let mut violations: u32 = 0;

    'pump: loop {
        tokio::select! {
            inbound = timeout(READ_DEADLINE, ws_rx.next()) => {
                match inbound {
                    Ok(Some(Ok(Message::Binary(bytes)))) => {
                        if !state.rate_limiter.allow(&client_id).await {
                            violations += 1;
                            if violations % VIOLATION_WARN_EVERY == 0 {
                                tracing::warn!(room_id, client_id, violations, "rate_limit_violations");
                            }
                            if violations >= VIOLATION_DISCONNECT_AT {
                                tracing::warn!(room_id, client_id, "rate_limit_disconnect");
                                break 'pump;
                            }
                            continue;
                        }
                        match classify_frame(&bytes) {
                            Ok(_) => {
                                state.hub.broadcast(room_id.clone(), client_id.clone(), bytes).await;
                            }
                            Err(e) => {
                                tracing::debug!(room_id, client_id, error = %e, "protocol_violation_dropped");
                            }
                        }
                    }
                    Ok(Some(Ok(Message::Close(_)))) | Ok(None) => break 'pump,
                    Ok(Some(Ok(_))) => {} // text/ping/pong: any inbound traffic refreshes the read deadline
                    Ok(Some(Err(e))) => {
                        tracing::debug!(room_id, client_id, error = %e, "ws_read_error");
                        break 'pump;
                    }
                    Err(_elapsed) => {
                        tracing::debug!(room_id, client_id, "read_deadline_expired");
                        break 'pump;
                    }
                }
            }
            _ = ping_ticker.tick() => {
                if timeout(WRITE_DEADLINE, ws_tx.send(Message::Ping(Vec::new()))).await.is_err() {
                    break 'pump;
                }
            }
            outbound = out_rx.recv() => {
                match outbound {
                    Some(frame) => {
                        if timeout(WRITE_DEADLINE, ws_tx.send(Message::Binary(frame))).await.is_err() {
                            break 'pump;
                        }
                    }
                    None => break 'pump, // hub closed our channel (slow-consumer eviction)
                }
            }
        }
    }

    state.hub.unregister(room_id.clone(), client_id.clone()).await;
    tracing::debug!(room_id, client_id, "ws_client_unregistered");
}
