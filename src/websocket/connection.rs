//! Per-socket reader and writer tasks, and event dispatch into room
//! runtimes.

use super::AppState;
use crate::protocol::{room_codes, ClientEvent, ErrorCode, ServerEvent, SocketId};
use crate::room::runtime::RoomMsg;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Writer queue depth per socket. Bursts past this are dropped with a
/// metric rather than stalling the room that broadcast them.
const WRITER_QUEUE_CAPACITY: usize = 64;

pub(super) async fn handle_socket(socket: WebSocket, state: Arc<AppState>, addr: SocketAddr) {
    let socket_id: SocketId = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Arc<ServerEvent>>(WRITER_QUEUE_CAPACITY);

    state.hub.register_socket(socket_id, tx, addr);

    // Writer: drain the queue, serializing each event to one text frame.
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let frame = match serde_json::to_string(event.as_ref()) {
                Ok(json) => json,
                Err(err) => {
                    tracing::error!(%socket_id, error = %err, "Failed to serialize event");
                    continue;
                }
            };
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    // Reader: parse frames and dispatch.
    let reader_state = state.clone();
    let receive_task = tokio::spawn(async move {
        let max_size = reader_state.config.server.max_message_size;
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(err) => {
                    tracing::debug!(%socket_id, error = %err, "WebSocket read error");
                    break;
                }
            };
            match msg {
                Message::Text(text) => {
                    if text.len() > max_size {
                        reader_state.hub.send_to_socket(
                            &socket_id,
                            ServerEvent::Error {
                                message: format!(
                                    "Message too large ({} bytes, max {max_size} bytes)",
                                    text.len()
                                ),
                                error_code: Some(ErrorCode::MessageTooLarge),
                            },
                        );
                        continue;
                    }
                    match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => dispatch_event(&reader_state, socket_id, event).await,
                        Err(err) => {
                            // Unknown or malformed events are dropped; the
                            // position hot path must never bounce errors.
                            tracing::debug!(
                                %socket_id,
                                error = %err,
                                "Dropping unparseable client frame"
                            );
                        }
                    }
                }
                Message::Close(_) => {
                    tracing::info!(%socket_id, "WebSocket connection closed");
                    break;
                }
                // Binary payloads are not part of this protocol; control
                // frames are handled by the transport.
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {}
        _ = receive_task => {}
    }

    socket_closed(&state, socket_id).await;
}

/// Tear down a dropped socket: remove it from the hub and notify the
/// owning room, if any.
async fn socket_closed(state: &Arc<AppState>, socket_id: SocketId) {
    let route = state.hub.unregister_socket(&socket_id);
    if let Some((room_code, _)) = route {
        if let Some(room_tx) = state.store.get(&room_code) {
            let _ = room_tx.send(RoomMsg::Disconnected { socket_id }).await;
        }
    }
}

/// Route one inbound event. Connection-level events (create, join, rejoin,
/// ping) are handled here; everything else is forwarded into the sender's
/// room runtime.
async fn dispatch_event(state: &Arc<AppState>, socket_id: SocketId, event: ClientEvent) {
    match event {
        ClientEvent::CreateRoom {
            name,
            max_players,
            quiz_id,
        } => {
            if state.hub.route_of(&socket_id).is_some() {
                join_error(state, &socket_id, ErrorCode::AlreadyInRoom);
                return;
            }
            let limit = state.config.server.max_players_limit;
            let requested = max_players.unwrap_or(state.config.server.default_max_players);
            if requested < 2 || requested > limit {
                join_error(state, &socket_id, ErrorCode::InvalidMaxPlayers);
                return;
            }
            match state
                .store
                .create_room(requested, quiz_id, state.runtime_deps())
            {
                Ok((_, room_tx)) => {
                    let _ = room_tx
                        .send(RoomMsg::Join {
                            socket_id,
                            player_name: name,
                        })
                        .await;
                }
                Err(err) => {
                    tracing::error!(%socket_id, error = %err, "Room creation failed");
                    join_error(state, &socket_id, ErrorCode::RoomCreationFailed);
                }
            }
        }
        ClientEvent::JoinRoom {
            room_code,
            player_name,
        } => {
            if state.hub.route_of(&socket_id).is_some() {
                join_error(state, &socket_id, ErrorCode::AlreadyInRoom);
                return;
            }
            let code = room_code.trim().to_ascii_uppercase();
            if !room_codes::is_valid_room_code(&code) {
                join_error(state, &socket_id, ErrorCode::InvalidRoomCode);
                return;
            }
            match state.store.get(&code) {
                Some(room_tx) => {
                    let _ = room_tx
                        .send(RoomMsg::Join {
                            socket_id,
                            player_name,
                        })
                        .await;
                }
                None => join_error(state, &socket_id, ErrorCode::RoomNotFound),
            }
        }
        ClientEvent::RejoinRoom {
            room_code,
            player_id,
        } => {
            let code = room_code.trim().to_ascii_uppercase();
            match state.store.get(&code) {
                Some(room_tx) => {
                    let _ = room_tx
                        .send(RoomMsg::Rejoin {
                            socket_id,
                            player_id,
                        })
                        .await;
                }
                None => {
                    state.hub.send_to_socket(
                        &socket_id,
                        ServerEvent::RejoinError {
                            reason: ErrorCode::RoomNotFound.description().to_string(),
                            error_code: ErrorCode::RoomNotFound,
                        },
                    );
                }
            }
        }
        ClientEvent::Ping {} => {
            state.hub.send_to_socket(&socket_id, ServerEvent::Pong {});
        }
        other => {
            let Some((room_code, _)) = state.hub.route_of(&socket_id) else {
                // Control events outside a room get a typed error; the hot
                // path is dropped silently.
                out_of_room_error(state, &socket_id, &other);
                return;
            };
            if let Some(room_tx) = state.store.get(&room_code) {
                let _ = room_tx
                    .send(RoomMsg::Client {
                        socket_id,
                        event: other,
                    })
                    .await;
            }
        }
    }
}

fn join_error(state: &Arc<AppState>, socket_id: &SocketId, code: ErrorCode) {
    state.hub.send_to_socket(
        socket_id,
        ServerEvent::JoinError {
            reason: code.description().to_string(),
            error_code: code,
        },
    );
}

fn out_of_room_error(state: &Arc<AppState>, socket_id: &SocketId, event: &ClientEvent) {
    let response = match event {
        ClientEvent::LeaveRoom {} => Some(ServerEvent::LeaveError {
            reason: ErrorCode::NotInRoom.description().to_string(),
            error_code: ErrorCode::NotInRoom,
        }),
        ClientEvent::StartGame {} | ClientEvent::EndGame {} => Some(ServerEvent::StartError {
            reason: ErrorCode::NotInRoom.description().to_string(),
            error_code: ErrorCode::NotInRoom,
        }),
        // Hot-path events with no current room: silent drop.
        _ => None,
    };
    if let Some(response) = response {
        state.hub.send_to_socket(socket_id, response);
    } else {
        state.metrics.increment_events_dropped();
    }
}
