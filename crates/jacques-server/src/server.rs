//! Server assembly: wiring, startup discovery, and the axum listener.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use jacques_core::cleanup::{self, CleanupConfig};
use jacques_core::divergence::{DivergenceConfig, DivergenceService};
use jacques_core::focus;
use jacques_core::launch::ProcessLauncher;
use jacques_core::monitor::{self, MonitorConfig};
use jacques_core::notify::{self, NotificationEngine};
use jacques_core::scanner;
use jacques_core::tiling::TilingCoordinator;
use jacques_core::window::{NullWindowSystem, WindowSystem};
use jacques_core::SessionRegistry;
use jacques_paths::JacquesPaths;

use crate::hook::hook_handler;
use crate::state::AppState;
use crate::ws::ws_handler;

/// Default WebSocket/hook port.
pub const DEFAULT_PORT: u16 = 4242;

/// Build the fully wired application state.
pub fn build_state(shutdown: CancellationToken) -> Arc<AppState> {
    let registry = SessionRegistry::new();

    let paths = match JacquesPaths::resolve() {
        Ok(paths) => Some(paths),
        Err(e) => {
            warn!(
                event = "server.paths_resolve_failed",
                error = %e,
                "Notification settings will not persist.",
            );
            None
        }
    };
    let settings = paths
        .as_ref()
        .map(notify::settings::load)
        .unwrap_or_default();
    let engine = NotificationEngine::new(paths, settings, notify::detect_backend());

    // The OS automation layer is provided by the embedding platform; the
    // engine itself ships with the no-op implementation.
    let window_system: Arc<dyn WindowSystem> = Arc::new(NullWindowSystem);
    let tiling = Arc::new(TilingCoordinator::new(Arc::clone(&window_system)));
    let divergence = DivergenceService::new(Arc::clone(&registry), DivergenceConfig::default());

    let state = AppState::new(
        Arc::clone(&registry),
        Arc::clone(&engine),
        Arc::clone(&tiling),
        Arc::clone(&divergence),
        Arc::clone(&window_system),
        Arc::new(ProcessLauncher::default()),
        shutdown,
    );

    // Click-to-focus from desktop notifications.
    {
        let registry = Arc::clone(&registry);
        let window_system = Arc::clone(&window_system);
        engine.set_focus_callback(move |session_id| {
            let session = registry
                .get_session(session_id)
                .ok_or_else(|| format!("unknown session: {}", session_id))?;
            window_system
                .focus_window(&session.terminal_key)
                .map_err(|e| e.to_string())?;
            registry.set_focused_session(Some(session_id));
            Ok(())
        });
    }

    // Registry removals fan into the notification engine and the tiler.
    {
        let engine = Arc::clone(&engine);
        let tiling = Arc::clone(&tiling);
        registry.on_session_removed(move |session| {
            engine.on_session_removed(&session.session_id);
            // Repositioning shells out; run it off the registry lock.
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let tiling = Arc::clone(&tiling);
                let session_id = session.session_id.clone();
                handle.spawn(async move {
                    tiling.rebalance_on_remove(&session_id).await;
                });
            } else {
                tiling.states().remove_session(&session.session_id);
            }
        });
    }

    state
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/hook", post(hook_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the startup discovery pass and flip the scanning flag when done.
pub async fn run_discovery(state: &Arc<AppState>) {
    info!(event = "server.discovery_started");
    let detected = tokio::task::spawn_blocking(scanner::scan)
        .await
        .unwrap_or_default();
    for session in &detected {
        state.registry.register_discovered(session);
    }
    state.set_scanning(false);
    info!(event = "server.discovery_completed", sessions = detected.len());
    state.broadcast(state.server_status());
    state.divergence.request_refresh();
}

/// Run the server until shutdown.
///
/// Binds loopback only — Jacques is a single-user local control plane.
pub async fn run(port: u16) -> Result<(), std::io::Error> {
    let shutdown = CancellationToken::new();
    let state = build_state(shutdown.clone());

    // Periodic services.
    let cleanup_task = cleanup::spawn_sweeper(
        Arc::clone(&state.registry),
        CleanupConfig::default(),
        shutdown.clone(),
    );
    let monitor_task = monitor::spawn_monitor(
        Arc::clone(&state.registry),
        MonitorConfig::default(),
        shutdown.clone(),
    );
    let divergence_task = state.divergence.spawn(shutdown.clone());
    let focus_task = focus::spawn_focus_watcher(
        Arc::clone(&state.registry),
        Arc::clone(&state.window_system),
        shutdown.clone(),
    );

    // Discovery runs concurrently with the listener; clients connecting
    // early observe `scanning: true`.
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move { run_discovery(&state).await });
    }

    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(event = "server.started", addr = %addr);

    // SIGINT/SIGTERM drive the cancellation token.
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = wait_for_shutdown_signal().await {
                error!(event = "server.signal_handler_failed", error = %e);
                return;
            }
            info!(event = "server.shutdown_requested");
            shutdown.cancel();
        });
    }

    let router = build_router(Arc::clone(&state));
    let graceful = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { graceful.cancelled().await })
        .await?;

    // Stop periodic services and clear awaiting timers.
    shutdown.cancel();
    state.registry.stop();
    for task in [cleanup_task, monitor_task, divergence_task, focus_task] {
        let _ = task.await;
    }
    info!(event = "server.stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<(), std::io::Error> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = sigterm.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::app_state;
    use jacques_protocol::ServerMessage;

    #[tokio::test]
    async fn test_server_status_reports_count_and_scanning() {
        let state = app_state();
        let ServerMessage::ServerStatus {
            status,
            session_count,
            scanning,
        } = state.server_status()
        else {
            panic!("wrong message");
        };
        assert_eq!(status, "ok");
        assert_eq!(session_count, 0);
        assert_eq!(scanning, Some(false));
    }

    #[tokio::test]
    async fn test_build_router_has_routes() {
        let state = app_state();
        // Construction itself exercises the route table.
        let _router = build_router(state);
    }
}
