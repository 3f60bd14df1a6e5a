//! # Device Hub Websocket
//!
//! Each connection runs a writer task that drains the client's channel into
//! the socket and a reader task that feeds text frames to the hub. When
//! either side stops the client is unregistered, which closes its channel and
//! with it the socket.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::hub::DeviceHub;
use crate::web::state::AppState;

/// Websocket upgrade: GET /ws
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<DeviceHub>) {
    let (mut sink, mut stream) = socket.split();
    let (client_id, mut rx) = hub.connect().await;
    info!(client_id = %client_id, clients = hub.client_count(), "Hub client connected");

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let reader_hub = hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(Message::Text(text)) => reader_hub.handle_text(&client_id, &text).await,
                Ok(Message::Close(_)) => break,
                Ok(other) => debug!(client_id = %client_id, frame = ?other, "Ignoring non-text frame"),
                Err(e) => {
                    warn!(client_id = %client_id, error = %e, "Websocket read failed");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => {}
    }

    hub.disconnect(&client_id);
    info!(client_id = %client_id, clients = hub.client_count(), "Hub client disconnected");
}
