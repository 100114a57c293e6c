//! WebSocket broker.
//!
//! Each client gets its own fan-out task: a snapshot on connect (taken
//! after subscribing, so nothing falls between snapshot and first delta),
//! then registry deltas with per-session coalescing, notification events,
//! and request/reply handling.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use jacques_core::RegistryEvent;
use jacques_core::notify::NotifyEvent;
use jacques_protocol::{ClientMessage, ServerMessage};

use crate::coalesce::{Coalescer, COALESCE_WINDOW};
use crate::handlers::handle_client_message;
use crate::state::AppState;

/// `GET /ws` — WebSocket upgrade for dashboard/GUI clients.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

type WsSink = SplitSink<WebSocket, Message>;

async fn send(sink: &mut WsSink, message: &ServerMessage) -> Result<(), ()> {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            warn!(event = "server.ws.serialize_failed", error = %e);
            return Ok(());
        }
    };
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}

fn initial_state(state: &AppState) -> ServerMessage {
    ServerMessage::InitialState {
        sessions: state.registry.get_all_sessions(),
        focused: state.registry.get_focused_session_id(),
        scanning: state.is_scanning(),
    }
}

async fn flush_pending(sink: &mut WsSink, coalescer: &mut Coalescer) -> Result<(), ()> {
    for session in coalescer.drain() {
        send(sink, &ServerMessage::SessionUpdate { session }).await?;
    }
    Ok(())
}

/// Per-connection fan-out loop.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    info!(event = "server.ws.client_connected");
    let (mut sink, mut stream) = socket.split();

    // Subscribe before snapshotting so no event is dropped in between.
    let mut registry_events = state.registry.subscribe();
    let mut notify_events = state.engine.subscribe();
    let mut broadcasts = state.broadcasts.subscribe();

    if send(&mut sink, &initial_state(&state)).await.is_err() {
        return;
    }
    let history = state.engine.history();
    if !history.is_empty()
        && send(
            &mut sink,
            &ServerMessage::NotificationHistory {
                notifications: history,
            },
        )
        .await
        .is_err()
    {
        return;
    }

    let mut coalescer = Coalescer::new();
    let mut flush = tokio::time::interval(COALESCE_WINDOW);
    flush.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,

            event = registry_events.recv() => match event {
                Ok(RegistryEvent::SessionUpdated(session)) => {
                    coalescer.push(session);
                }
                Ok(RegistryEvent::SessionRemoved { session_id }) => {
                    // The removal supersedes any buffered update and must be
                    // the last message for this id.
                    coalescer.discard(&session_id);
                    if send(&mut sink, &ServerMessage::SessionRemoved { session_id })
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Ok(RegistryEvent::FocusChanged { session_id, session }) => {
                    if flush_pending(&mut sink, &mut coalescer).await.is_err() {
                        break;
                    }
                    if send(&mut sink, &ServerMessage::FocusChanged { session_id, session })
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Too slow; resynchronize with a fresh snapshot.
                    warn!(event = "server.ws.client_lagged", skipped = skipped);
                    if send(&mut sink, &initial_state(&state)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            _ = flush.tick() => {
                if flush_pending(&mut sink, &mut coalescer).await.is_err() {
                    break;
                }
            }

            event = notify_events.recv() => {
                let message = match event {
                    Ok(NotifyEvent::Fired(notification)) => {
                        Some(ServerMessage::NotificationFired { notification })
                    }
                    Ok(NotifyEvent::PlanReady { session_id, title }) => {
                        Some(ServerMessage::PlanReady { session_id, title })
                    }
                    Ok(NotifyEvent::HandoffReady { session_id, path }) => {
                        Some(ServerMessage::HandoffReady { session_id, path })
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => None,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if let Some(message) = message
                    && send(&mut sink, &message).await.is_err()
                {
                    break;
                }
            }

            message = broadcasts.recv() => match message {
                Ok(message) => {
                    if send(&mut sink, &message).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },

            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(message) => {
                            if let Some(reply) = handle_client_message(&state, message).await
                                && send(&mut sink, &reply).await.is_err()
                            {
                                break;
                            }
                        }
                        Err(e) => {
                            debug!(event = "server.ws.bad_client_message", error = %e);
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(_)) => break,
                _ => {}
            },
        }
    }

    // Best-effort delivery of anything still buffered.
    let _ = flush_pending(&mut sink, &mut coalescer).await;
    info!(event = "server.ws.client_disconnected");
}
