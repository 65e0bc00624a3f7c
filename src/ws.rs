//! WebSocket endpoint for the real-time channel.
//!
//! A connection is anonymous until it sends a `join` (user identity) or
//! `joinChat` (conversation) frame; each join subscribes the connection to
//! the matching notifier room and a forwarder task pipes that room's events
//! into the socket. Several rooms can feed one connection; frames are JSON
//! text in both directions.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::notifier::{ClientMessage, ServerEvent};
use crate::state::AppState;

/// Per-connection outbound queue depth.
const OUTBOUND_BUFFER: usize = 32;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sink, stream) = socket.split();

    // All room forwarders feed one queue so writes to the socket are
    // serialized in a single task.
    let (tx, rx) = mpsc::channel::<ServerEvent>(OUTBOUND_BUFFER);
    let mut writer = tokio::spawn(write_frames(sink, rx));
    let mut forwarders: Vec<JoinHandle<()>> = Vec::new();

    read_frames(stream, &state, &tx, &mut forwarders, &mut writer).await;

    for task in &forwarders {
        task.abort();
    }
    writer.abort();
    debug!("websocket connection closed");
}

async fn write_frames(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<ServerEvent>,
) {
    while let Some(event) = rx.recv().await {
        let Ok(frame) = serde_json::to_string(&event) else {
            continue;
        };
        if sink.send(Message::Text(frame.into())).await.is_err() {
            break;
        }
    }
}

async fn read_frames(
    mut stream: SplitStream<WebSocket>,
    state: &Arc<AppState>,
    tx: &mpsc::Sender<ServerEvent>,
    forwarders: &mut Vec<JoinHandle<()>>,
    writer: &mut JoinHandle<()>,
) {
    let mut joined: HashSet<String> = HashSet::new();

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let room = match serde_json::from_str::<ClientMessage>(text.as_str()) {
                        Ok(ClientMessage::Join(user_id)) => user_id,
                        Ok(ClientMessage::JoinChat(chat_id)) => format!("chat_{chat_id}"),
                        Err(err) => {
                            debug!("ignoring unparseable client frame: {err}");
                            continue;
                        }
                    };
                    // Joining the same room twice on one connection is a no-op.
                    if joined.insert(room.clone()) {
                        debug!("connection joined room {room}");
                        forwarders.push(spawn_forwarder(state, room, tx.clone()));
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            // The writer only exits early when the client went away.
            _ = &mut *writer => break,
        }
    }
}

fn spawn_forwarder(
    state: &Arc<AppState>,
    room: String,
    tx: mpsc::Sender<ServerEvent>,
) -> JoinHandle<()> {
    let mut rx = state.notifier.subscribe(&room);
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("room {room}: connection lagged, {skipped} events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
