//! Agent hook ingestion.
//!
//! Agents post one JSON event per request to `POST /hook`. Non-JSON bodies
//! and unknown event types answer 400; well-formed events for unknown
//! session ids silently no-op (the registry returns `None`).

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::{debug, warn};

use jacques_protocol::HookEvent;

use crate::state::AppState;

pub async fn hook_handler(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    let event: HookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(event = "server.hook.rejected", error = %e);
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"ok": false, "error": e.to_string()})),
            );
        }
    };

    debug!(
        event = "server.hook.received",
        session_id = event.session_id(),
    );
    dispatch(&state, event).await;
    (StatusCode::OK, Json(serde_json::json!({"ok": true})))
}

async fn dispatch(state: &Arc<AppState>, event: HookEvent) {
    match event {
        HookEvent::SessionStart(event) => {
            let session = state.registry.register_session(&event);
            state.divergence.request_refresh();
            refresh_mode(state, session.session_id);
        }
        HookEvent::Activity(event) => {
            let Some(session) = state.registry.update_activity(&event) else {
                return;
            };
            state.divergence.request_refresh();
            if let Some(transcript) = session.transcript_path.clone() {
                let engine = Arc::clone(&state.engine);
                let session_id = session.session_id.clone();
                tokio::task::spawn_blocking(move || {
                    engine.scan_for_errors(&session_id, &transcript);
                    engine.check_for_new_plans(&session_id, &transcript);
                });
            }
        }
        HookEvent::ContextUpdate(event) => {
            let Some(session) = state.registry.update_context(&event) else {
                return;
            };
            state.engine.on_context_update(&session);
            if let Some(body) = autocompact_warning(&session) {
                state.engine.on_autocompact_warning(&session, body);
            }
            state.divergence.request_refresh();
        }
        HookEvent::Idle(event) => {
            let session = state.registry.set_session_idle(
                &event.session_id,
                event.permission_mode,
                event.terminal_pid,
            );
            if session.is_some() {
                refresh_mode(state, event.session_id);
            }
        }
        HookEvent::PreToolUse(event) => {
            let tool = event.tool_name.clone().unwrap_or_default();
            state.registry.set_session_awaiting(
                &event.session_id,
                &tool,
                event.permission_mode,
                Box::new(move |session| {
                    debug!(
                        event = "server.hook.session_awaiting",
                        session_id = %session.session_id,
                        tool = %session.last_tool_name.as_deref().unwrap_or(""),
                    );
                }),
                event.terminal_pid,
            );
        }
    }
}

/// Margin below the autocompact threshold at which the warning fires.
const AUTOCOMPACT_WARNING_MARGIN: f64 = 5.0;

/// Body text when a session is close to its autocompact threshold.
///
/// Disabled sessions still compact near 78% (the platform quirk tracked in
/// `bug_threshold`), so they warn against that value instead.
fn autocompact_warning(session: &jacques_protocol::Session) -> Option<String> {
    let metrics = session.context_metrics.as_ref()?;
    let autocompact = session.autocompact.as_ref()?;
    let threshold = if autocompact.enabled {
        autocompact.threshold?
    } else {
        f64::from(autocompact.bug_threshold?)
    };
    if metrics.used_percentage >= threshold - AUTOCOMPACT_WARNING_MARGIN {
        Some(format!(
            "{} is at {:.0}% context; compaction engages at {:.0}%",
            session.project, metrics.used_percentage, threshold,
        ))
    } else {
        None
    }
}

/// Recompute the session's mode off the hot path.
fn refresh_mode(state: &Arc<AppState>, session_id: String) {
    let registry = Arc::clone(&state.registry);
    tokio::spawn(async move {
        registry.update_session_mode(&session_id).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::app_state;
    use axum::body::Bytes;
    use jacques_protocol::SessionStatus;

    async fn post(state: &Arc<AppState>, body: &str) -> StatusCode {
        let response =
            hook_handler(State(Arc::clone(state)), Bytes::from(body.to_string()))
                .await
                .into_response();
        response.status()
    }

    #[tokio::test]
    async fn test_non_json_body_is_400() {
        let state = app_state();
        assert_eq!(post(&state, "not json").await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_event_is_400() {
        let state = app_state();
        assert_eq!(
            post(&state, r#"{"event":"mystery","session_id":"S1"}"#).await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_session_start_registers() {
        let state = app_state();
        let status = post(
            &state,
            r#"{"event":"session_start","session_id":"S1","terminal_key":"TTY:/dev/ttys001","cwd":"/p"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let session = state.registry.get_session("S1").unwrap();
        assert_eq!(session.terminal_key, "TTY:/dev/ttys001");
    }

    #[tokio::test]
    async fn test_activity_for_unknown_session_is_ok_noop() {
        let state = app_state();
        let status = post(
            &state,
            r#"{"event":"activity","session_id":"ghost","tool_name":"Bash"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.registry.session_count(), 0);
    }

    #[tokio::test]
    async fn test_context_update_auto_registers_and_notifies() {
        let state = app_state();
        let status = post(
            &state,
            r#"{"event":"context_update","session_id":"S1","cwd":"/work/app","context_metrics":{"used_percentage":80.0}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            state.registry.get_session("S1").unwrap().terminal_key,
            "AUTO:S1"
        );
        // 50 and 70 thresholds both crossed.
        assert_eq!(state.engine.history().len(), 2);
    }

    #[tokio::test]
    async fn test_autocompact_warning_near_threshold() {
        let state = app_state();
        let status = post(
            &state,
            r#"{"event":"context_update","session_id":"S1","cwd":"/work/app","context_metrics":{"used_percentage":76.0},"autocompact":{"enabled":true,"threshold":80.0}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(state
            .engine
            .history()
            .iter()
            .any(|n| n.category == jacques_protocol::NotificationCategory::AutoCompact));
    }

    #[tokio::test]
    async fn test_idle_event_sets_status() {
        let state = app_state();
        post(
            &state,
            r#"{"event":"session_start","session_id":"S1","terminal_key":"PID:7","cwd":"/p"}"#,
        )
        .await;
        post(&state, r#"{"event":"idle","session_id":"S1"}"#).await;
        assert_eq!(
            state.registry.get_session("S1").unwrap().status,
            SessionStatus::Idle
        );
    }
}
