//! Stale-session eviction.
//!
//! A periodic sweep evicts sessions that went idle and stayed silent past
//! the idle limit. A process that is alive but quiet is not stale, so
//! pid-bearing sessions get a liveness probe before eviction; sessions
//! without any pid are evicted on age alone.
//!
//! The companion recently-ended quarantine lives inside the registry
//! ([`crate::registry::recently_ended`]) so membership checks share the
//! registry's serialisation boundary.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use jacques_protocol::{epoch_ms, Session, SessionStatus};

use crate::registry::SessionRegistry;
use crate::scanner;

/// Sweep cadence.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Idle sessions older than this are eviction candidates.
pub const MAX_IDLE: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct CleanupConfig {
    pub sweep_interval: Duration,
    pub max_idle: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            sweep_interval: SWEEP_INTERVAL,
            max_idle: MAX_IDLE,
        }
    }
}

/// Whether a session has aged out.
///
/// `liveness` answers "is this pid still running"; it is only consulted for
/// idle-and-old sessions that carry a pid.
pub fn is_stale(
    session: &Session,
    now_ms: i64,
    max_idle: Duration,
    liveness: impl Fn(u32) -> bool,
) -> bool {
    if session.status != SessionStatus::Idle {
        return false;
    }
    let idle_for = now_ms.saturating_sub(session.last_activity);
    if idle_for < max_idle.as_millis() as i64 {
        return false;
    }
    match session.known_pid() {
        Some(pid) => !liveness(pid),
        None => true,
    }
}

/// One eviction pass over the registry.
pub fn sweep(registry: &SessionRegistry, config: &CleanupConfig) -> usize {
    let now = epoch_ms();
    let mut evicted = 0;
    for session in registry.get_all_sessions() {
        if is_stale(&session, now, config.max_idle, scanner::is_process_running) {
            info!(
                event = "core.cleanup.session_evicted",
                session_id = %session.session_id,
                idle_ms = now.saturating_sub(session.last_activity),
            );
            registry.unregister_session(&session.session_id);
            evicted += 1;
        }
    }
    if evicted > 0 {
        info!(event = "core.cleanup.sweep_completed", evicted = evicted);
    } else {
        debug!(event = "core.cleanup.sweep_completed", evicted = 0usize);
    }
    evicted
}

/// Spawn the periodic sweep loop; stops when `cancel` fires.
pub fn spawn_sweeper(
    registry: Arc<SessionRegistry>,
    config: CleanupConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick completes immediately; consume it so the first sweep
        // waits a full interval.
        interval.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(event = "core.cleanup.sweeper_stopped");
                    break;
                }
                _ = interval.tick() => {
                    let registry = Arc::clone(&registry);
                    let config = config.clone();
                    // The liveness probe touches the OS process table.
                    let _ = tokio::task::spawn_blocking(move || sweep(&registry, &config)).await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jacques_protocol::SessionStartEvent;

    fn idle_session(registry: &SessionRegistry, id: &str, last_activity: i64) -> Session {
        registry.register_session(&SessionStartEvent {
            session_id: id.to_string(),
            terminal_key: Some(format!("AUTO:{}", id)),
            ..Default::default()
        });
        registry.set_session_idle(id, None, None);
        // Backdate the idle timestamp directly through a fresh snapshot.
        let mut session = registry.get_session(id).unwrap();
        session.last_activity = last_activity;
        session
    }

    #[tokio::test]
    async fn test_is_stale_requires_idle_status() {
        let registry = SessionRegistry::new();
        let mut session = idle_session(&registry, "S1", 0);
        session.status = SessionStatus::Working;
        assert!(!is_stale(&session, epoch_ms(), MAX_IDLE, |_| false));
    }

    #[tokio::test]
    async fn test_is_stale_respects_age_threshold() {
        let registry = SessionRegistry::new();
        let now = epoch_ms();
        let session = idle_session(&registry, "S1", now - 1000);
        assert!(!is_stale(&session, now, MAX_IDLE, |_| false));
    }

    #[tokio::test]
    async fn test_is_stale_live_process_is_spared() {
        let registry = SessionRegistry::new();
        let now = epoch_ms();
        let mut session = idle_session(&registry, "S1", now - 2 * MAX_IDLE.as_millis() as i64);
        session.terminal_pid = Some(1234);
        assert!(!is_stale(&session, now, MAX_IDLE, |_| true));
        assert!(is_stale(&session, now, MAX_IDLE, |_| false));
    }

    #[tokio::test]
    async fn test_is_stale_pidless_session_evicted_on_age() {
        let registry = SessionRegistry::new();
        let now = epoch_ms();
        let mut session = idle_session(&registry, "S1", now - 2 * MAX_IDLE.as_millis() as i64);
        session.terminal_pid = None;
        session.terminal = None;
        assert!(is_stale(&session, now, MAX_IDLE, |_| true));
    }
}
