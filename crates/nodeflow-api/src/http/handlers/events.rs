//! WebSocket stream of one execution's lifecycle events.
//!
//! `GET /api/v1/executions/{id}/events` upgrades to a WebSocket and forwards
//! every [`EventEnvelope`] for that execution as a JSON text frame. The
//! socket is closed by the server after `execution:complete` or
//! `execution:error`.
//!
//! Subscribers only see events published after they connect. Clients that
//! start a run through `/execute` should open the socket right away and
//! fall back to `GET /api/v1/executions/{id}` for anything they missed.
//!
//! Disconnecting does not affect the run.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use uuid::Uuid;

use nodeflow_types::event::EventEnvelope;

use super::parse_id;
use crate::http::error::AppError;
use crate::state::AppState;

/// Incoming frame from a client. Anything else is ignored.
#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    /// Keep-alive. Answered with `{"type":"pong"}`.
    Ping,
}

/// GET /api/v1/executions/{id}/events
pub async fn execution_events(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let execution_id = parse_id(&id)?;
    // Subscribe before the upgrade so events published during the
    // handshake are not lost.
    let event_rx = state.event_bus.subscribe();
    Ok(ws.on_upgrade(move |socket| stream_events(socket, execution_id, event_rx)))
}

async fn stream_events(
    socket: WebSocket,
    execution_id: Uuid,
    mut event_rx: broadcast::Receiver<EventEnvelope>,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    tracing::debug!(%execution_id, "event subscriber connected");

    loop {
        tokio::select! {
            event_result = event_rx.recv() => {
                match event_result {
                    Ok(envelope) if envelope.execution_id == execution_id => {
                        let terminal = envelope.event.is_terminal();
                        match serde_json::to_string(&envelope) {
                            Ok(json) => {
                                if ws_sender.send(Message::Text(json.into())).await.is_err() {
                                    break;
                                }
                            }
                            Err(err) => {
                                tracing::warn!("Failed to serialize event: {err}");
                            }
                        }
                        if terminal {
                            let _ = ws_sender.send(Message::Close(None)).await;
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(
                            %execution_id,
                            skipped = n,
                            "event subscriber lagged, skipping {n} events"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(ClientFrame::Ping) => {
                                let pong = r#"{"type":"pong"}"#;
                                if ws_sender.send(Message::Text(pong.into())).await.is_err() {
                                    break;
                                }
                            }
                            Err(err) => {
                                tracing::debug!(raw = %text, error = %err, "ignoring client frame");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!("WebSocket receive error: {err}");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!(%execution_id, "event subscriber closed");
}
