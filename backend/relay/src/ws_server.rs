//! WebSocket entrypoint and per-connection loop.
//!
//! Each connection gets a receive loop and a dedicated send task joined by
//! an mpsc channel; pipeline code never touches the socket sink directly.
//! Inbound events are handled to completion one at a time, so replies for
//! a session keep arrival order.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use clawbridge_core::OutboundEvent;

use crate::dispatch::dispatch_message;
use crate::server::RelayState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<RelayState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: RelayState) {
    let session_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundEvent>();

    // Drain pipeline events into the socket.
    let mut send_task = tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            let json = match serde_json::to_string(&ev) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "Dropping unencodable outbound event");
                    continue;
                }
            };
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    info!(session = %session_id, "Browser connected");
    let _ = tx.send(OutboundEvent::Connected {
        message: "ClawBridge ready".to_string(),
    });

    let recv_state = state.clone();
    let recv_tx = tx.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    dispatch_message(&text, session_id, &recv_state, &recv_tx).await;
                }
                Message::Close(_) => break,
                other => debug!(session = %session_id, frame = ?other, "Ignoring non-text frame"),
            }
        }
    });

    // Whichever side finishes first tears the session down. Any in-flight
    // agent subprocess stays bounded by its own timeout.
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    info!(session = %session_id, "Session closed");
}
