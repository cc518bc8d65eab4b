//! WebSocket connection handler

use crate::models::WsEvent;
use crate::state::AppState;
use crate::websocket::events::WsConnection;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Connecting user, when known. Anonymous spectators are allowed.
    pub user_id: Option<Uuid>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
) -> Response {
    let conn_id = Uuid::new_v4();
    ws.on_upgrade(move |socket| handle_socket(socket, state, conn_id, query))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, conn_id: Uuid, query: WsQuery) {
    let (mut sender, mut receiver) = socket.split();

    state.broadcaster.add_connection(WsConnection {
        id: conn_id,
        user_id: query.user_id,
    });
    info!("WebSocket connected: {} (user: {:?})", conn_id, query.user_id);

    let mut event_rx = state.broadcaster.subscribe();

    let send_task = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => {
                    let msg = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            error!("Failed to serialize event: {}", e);
                            continue;
                        }
                    };

                    if sender.send(Message::Text(msg)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!("WebSocket {} lagged by {} messages", conn_id, n);
                }
                Err(RecvError::Closed) => {
                    break;
                }
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    handle_client_message(conn_id, &text).await;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    debug!("Heartbeat from {}", conn_id);
                }
                Ok(Message::Close(_)) => {
                    info!("WebSocket {} closed by client", conn_id);
                    break;
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", conn_id, e);
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.broadcaster.remove_connection(&conn_id);
    info!("WebSocket disconnected: {}", conn_id);
}

async fn handle_client_message(conn_id: Uuid, text: &str) {
    match serde_json::from_str::<WsEvent>(text) {
        Ok(WsEvent::Ping) => {
            debug!("Received ping from {}", conn_id);
        }
        Ok(_) => {
            debug!("Received event from {}: {}", conn_id, text);
        }
        Err(e) => {
            warn!("Invalid message from {}: {} - {}", conn_id, text, e);
        }
    }
}
