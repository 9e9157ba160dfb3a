//! WebSocket push channel.
//!
//! Subscribers join on `/ws`, immediately receive one `overview_update`
//! frame, and then get every broadcast until their connection errors
//! out. There is no acknowledgement protocol; clients reconnect on
//! their own.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::types::make_overview;
use super::AppState;

/// Serialize the current overview into the single frame type the push
/// channel speaks.
pub async fn overview_frame(state: &AppState) -> anyhow::Result<String> {
    let since = Utc::now() - chrono::Duration::hours(24);
    let all_stats = state.store.all_stats(since).await?;
    let overview = make_overview(&all_stats, Utc::now());

    Ok(serde_json::to_string(&json!({
        "type": "overview_update",
        "data": overview,
    }))?)
}

/// GET /ws
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    info!("websocket client connected");

    let (mut sender, mut receiver) = socket.split();

    // Initial snapshot on join.
    match overview_frame(&state).await {
        Ok(frame) => {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                debug!("websocket client left before first frame");
                return;
            }
        }
        Err(e) => {
            debug!("failed to build initial overview frame: {e}");
        }
    }

    let mut rx = state.overview_tx.subscribe();

    let mut send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(frame) => {
                    if sender.send(Message::Text(frame.into())).await.is_err() {
                        debug!("websocket send failed, dropping subscriber");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("websocket subscriber lagged, skipped {skipped} frames");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("websocket client disconnected");
}
