//! WebSocket handlers for live VWAP snapshot streaming.
//!
//! Uses tokio::select! for concurrent handling of client messages, snapshot
//! broadcasts, and heartbeats.

use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::{types::*, AppState};

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

fn encode(msg: &WebSocketMessage) -> Option<Message> {
    serde_json::to_string(msg).ok().map(Message::Text)
}

/// Streams snapshots for one symbol, or for every symbol when `symbol` is
/// `None`. A symbol stream starts with the latest snapshot if there is one.
pub async fn handle_snapshot_stream(socket: WebSocket, symbol: Option<String>, state: AppState) {
    let label = symbol.as_deref().unwrap_or("*").to_string();
    info!(symbol = %label, "snapshot stream connected");

    let (mut sender, mut receiver) = socket.split();
    let mut snapshot_rx = state.snapshot_broadcaster.subscribe();
    let mut ping_interval = interval(Duration::from_secs(30));

    if let Some(latest) = symbol.as_deref().and_then(|s| state.board.latest(s)) {
        if let Some(msg) = encode(&WebSocketMessage::Snapshot(latest)) {
            let _ = sender.send(msg).await;
        }
    }

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(WebSocketMessage::Ping { timestamp }) =
                            serde_json::from_str::<WebSocketMessage>(&text)
                        {
                            if let Some(pong) = encode(&WebSocketMessage::Pong { timestamp }) {
                                let _ = sender.send(pong).await;
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {}
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) => {
                        info!(symbol = %label, "snapshot stream closed by client");
                        break;
                    }
                    Some(Err(e)) => {
                        error!(symbol = %label, error = %e, "websocket error");
                        break;
                    }
                    None => break,
                }
            }

            event = snapshot_rx.recv() => {
                match event {
                    Ok(event) if symbol.as_deref().map_or(true, |s| s == event.symbol) => {
                        if let Some(msg) = encode(&WebSocketMessage::Snapshot(event)) {
                            if sender.send(msg).await.is_err() {
                                warn!(symbol = %label, "failed to send snapshot");
                                break;
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(symbol = %label, skipped, "snapshot stream lagged");
                        let notice = WebSocketMessage::Error {
                            message: format!("{skipped} snapshots dropped"),
                        };
                        if let Some(msg) = encode(&notice) {
                            let _ = sender.send(msg).await;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            _ = ping_interval.tick() => {
                if let Some(ping) = encode(&WebSocketMessage::Ping { timestamp: now_millis() }) {
                    if sender.send(ping).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    info!(symbol = %label, "snapshot stream ended");
}
