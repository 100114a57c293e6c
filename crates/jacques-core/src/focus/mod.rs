//! Terminal-focus watching.
//!
//! Polls the OS for the front-most terminal window, resolves it to a
//! session through the canonical key match, and drives the registry's
//! focus. The registry stores focus; this watcher is the only component
//! that derives it from the OS.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::registry::SessionRegistry;
use crate::terminal;
use crate::window::WindowSystem;

/// Poll cadence while the front-most window maps to a known session.
pub const FOCUSED_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Poll cadence while it does not.
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// One poll step: resolve the front-most terminal to a session and update
/// focus on change. Returns whether a known session is front-most.
pub fn poll_once(registry: &SessionRegistry, window_system: &dyn WindowSystem) -> bool {
    let Some(identity) = window_system.frontmost_terminal() else {
        return false;
    };
    let Some(key) = terminal::build_key(&identity) else {
        return false;
    };
    let Some(session) = registry.find_session_by_terminal_key(&key) else {
        return false;
    };
    if registry.get_focused_session_id().as_deref() != Some(session.session_id.as_str()) {
        registry.set_focused_session(Some(&session.session_id));
    }
    true
}

/// Spawn the poll loop; stops when `cancel` fires.
pub fn spawn_focus_watcher(
    registry: Arc<SessionRegistry>,
    window_system: Arc<dyn WindowSystem>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut focused = false;
        loop {
            let delay = if focused {
                FOCUSED_POLL_INTERVAL
            } else {
                IDLE_POLL_INTERVAL
            };
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(event = "core.focus.watcher_stopped");
                    break;
                }
                _ = tokio::time::sleep(delay) => {
                    let registry = Arc::clone(&registry);
                    let window_system = Arc::clone(&window_system);
                    // The OS query shells out on most platforms.
                    focused = tokio::task::spawn_blocking(move || {
                        poll_once(&registry, window_system.as_ref())
                    })
                    .await
                    .unwrap_or(false);
                }
            }
        }
    })
}
