//! Periodic process verification.
//!
//! Sessions are observations of processes Jacques does not own, so liveness
//! is verified on a loop: a session whose process exited is unregistered, a
//! session whose cwd landed in the Trash is unregistered, and the
//! `--dangerously-skip-permissions` flag is re-read from the live command
//! line (hooks can miss it when a session is discovered mid-flight).

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::registry::SessionRegistry;
use crate::scanner;

/// Verification cadence.
pub const VERIFY_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: VERIFY_INTERVAL,
        }
    }
}

/// One verification pass. Returns the ids that were evicted.
pub fn verify(registry: &SessionRegistry) -> Vec<String> {
    let mut evicted = Vec::new();
    for session in registry.get_all_sessions() {
        if scanner::is_trashed(&session.cwd) {
            info!(
                event = "core.monitor.session_trashed",
                session_id = %session.session_id,
                cwd = %session.cwd.display(),
            );
            registry.unregister_session(&session.session_id);
            evicted.push(session.session_id);
            continue;
        }
        let Some(pid) = session.known_pid() else {
            continue;
        };
        match scanner::process_bypass_flag(pid) {
            None => {
                info!(
                    event = "core.monitor.process_gone",
                    session_id = %session.session_id,
                    pid = pid,
                );
                registry.unregister_session(&session.session_id);
                evicted.push(session.session_id);
            }
            Some(bypass) => {
                if bypass && !session.is_bypass {
                    registry.update_bypass(&session.session_id, true);
                }
            }
        }
    }
    evicted
}

/// Spawn the verification loop; stops when `cancel` fires.
pub fn spawn_monitor(
    registry: Arc<SessionRegistry>,
    config: MonitorConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(event = "core.monitor.stopped");
                    break;
                }
                _ = interval.tick() => {
                    let registry = Arc::clone(&registry);
                    let _ = tokio::task::spawn_blocking(move || verify(&registry)).await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jacques_protocol::SessionStartEvent;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_verify_evicts_trashed_cwd() {
        let registry = SessionRegistry::new();
        registry.register_session(&SessionStartEvent {
            session_id: "S1".to_string(),
            terminal_key: Some("AUTO:S1".to_string()),
            cwd: Some(PathBuf::from("/Users/me/.Trash/project")),
            ..Default::default()
        });
        let evicted = verify(&registry);
        assert_eq!(evicted, vec!["S1".to_string()]);
        assert_eq!(registry.session_count(), 0);
    }

    #[tokio::test]
    async fn test_verify_evicts_dead_pid() {
        let registry = SessionRegistry::new();
        registry.register_session(&SessionStartEvent {
            session_id: "S1".to_string(),
            terminal_key: Some("PID:999999999".to_string()),
            terminal_pid: Some(999_999_999),
            cwd: Some(PathBuf::from("/p")),
            ..Default::default()
        });
        let evicted = verify(&registry);
        assert_eq!(evicted, vec!["S1".to_string()]);
    }

    #[tokio::test]
    async fn test_verify_keeps_live_pid() {
        let registry = SessionRegistry::new();
        registry.register_session(&SessionStartEvent {
            session_id: "S1".to_string(),
            terminal_key: Some("PID:self".to_string()),
            terminal_pid: Some(std::process::id()),
            cwd: Some(PathBuf::from("/p")),
            ..Default::default()
        });
        let evicted = verify(&registry);
        assert!(evicted.is_empty());
        assert_eq!(registry.session_count(), 1);
    }

    #[tokio::test]
    async fn test_verify_skips_pidless_sessions() {
        let registry = SessionRegistry::new();
        registry.register_session(&SessionStartEvent {
            session_id: "S1".to_string(),
            cwd: Some(PathBuf::from("/p")),
            ..Default::default()
        });
        assert!(verify(&registry).is_empty());
        assert_eq!(registry.session_count(), 1);
    }
}
