use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot};

use vrclub_shared::protocol::{ClientMsg, ServerMsg};

use crate::relay::{JoinAccept, RelayCommand, Scope};

/// Shared app state passed to each WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub relay_tx: mpsc::Sender<RelayCommand>,
    pub ping_interval: Duration,
}

/// HTTP handler for WebSocket upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let (mut sink, mut stream) = socket.split();

    let (resp_tx, resp_rx) = oneshot::channel();
    if app_state
        .relay_tx
        .send(RelayCommand::Join { response: resp_tx })
        .await
        .is_err()
    {
        tracing::error!("Failed to send Join command");
        return;
    }

    // The relay subscribes this receiver in the same step that builds the
    // snapshot, so the stream picks up exactly where welcome.players
    // leaves off.
    let JoinAccept {
        id: my_id,
        welcome,
        mut broadcast_rx,
    } = match resp_rx.await {
        Ok(accept) => accept,
        Err(_) => {
            tracing::error!("Failed to receive welcome");
            return;
        }
    };

    tracing::info!("Player {} connected", my_id);

    let welcome_json = serde_json::to_string(&ServerMsg::Welcome(welcome)).unwrap();
    if sink.send(Message::Text(welcome_json.into())).await.is_err() {
        let _ = app_state.relay_tx.send(RelayCommand::Leave { id: my_id }).await;
        return;
    }

    let mut ping_interval = tokio::time::interval(app_state.ping_interval);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ping_interval.tick().await; // first tick completes immediately

    loop {
        tokio::select! {
            // Client -> Server
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMsg>(&text) {
                            Ok(client_msg) => {
                                let _ = app_state.relay_tx.send(RelayCommand::Inbound {
                                    id: my_id,
                                    msg: client_msg,
                                }).await;
                            }
                            // Malformed payloads are dropped, the connection
                            // stays open.
                            Err(err) => {
                                tracing::warn!("Player {} sent undecodable message: {}", my_id, err);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::warn!("Player {} transport error: {}", my_id, err);
                        break;
                    }
                    _ => {} // Ignore ping/pong/binary
                }
            }

            // Server -> Client (broadcast)
            result = broadcast_rx.recv() => {
                match result {
                    Ok(broadcast) => {
                        if let Scope::Except(skip) = broadcast.scope {
                            if skip == my_id {
                                continue;
                            }
                        }
                        if let Ok(json) = serde_json::to_string(&broadcast.msg) {
                            if sink.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Best-effort delivery: dropped broadcasts are not
                        // replayed, the next position update supersedes them.
                        tracing::warn!("Player {} lagged by {} messages", my_id, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            // Liveness ping. No pong tracking; eviction happens only on
            // explicit close or transport error.
            _ = ping_interval.tick() => {
                if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    // Cleanup on disconnect
    let _ = app_state
        .relay_tx
        .send(RelayCommand::Leave { id: my_id })
        .await;
    tracing::info!("Player {} disconnected", my_id);
}
