//! Client request handling.
//!
//! Every operation that can fail reports back through its `*_result`
//! message; nothing here panics a connection. Blocking work (window
//! automation, process spawns, git) runs off the async executor.

use std::sync::Arc;

use tracing::{debug, info, warn};

use jacques_core::worktree;
use jacques_protocol::{ClientMessage, ServerMessage, TriggerAction};

use crate::state::AppState;

/// Warning attached when the global autocompact toggle is switched off.
const AUTOCOMPACT_OFF_WARNING: &str =
    "Autocompact still engages near 78% while disabled (known platform quirk)";

/// Handle one inbound message; the returned message (if any) goes back to
/// the requesting client only.
pub async fn handle_client_message(
    state: &Arc<AppState>,
    message: ClientMessage,
) -> Option<ServerMessage> {
    match message {
        ClientMessage::SelectSession { session_id } => {
            state.registry.set_focused_session(Some(&session_id));
            None
        }
        ClientMessage::RegisterDashboard { terminal_key } => {
            info!(event = "server.dashboard_registered", terminal_key = %terminal_key);
            state.register_dashboard(&terminal_key);
            None
        }
        ClientMessage::ToggleAutocompact { enabled } => {
            let enabled = state.toggle_autocompact(enabled);
            state.broadcast(ServerMessage::AutocompactToggled {
                enabled,
                warning: (!enabled).then(|| AUTOCOMPACT_OFF_WARNING.to_string()),
            });
            None
        }
        ClientMessage::TriggerAction { session_id, action } => {
            handle_trigger_action(state, &session_id, action);
            None
        }
        ClientMessage::FocusTerminal { session_id } => {
            Some(focus_terminal(state, &session_id).await)
        }
        ClientMessage::TileWindows {
            session_ids,
            layout,
        } => Some(tile_windows(state, &session_ids, layout.as_deref()).await),
        ClientMessage::MaximizeWindow { session_id } => {
            let Some(session) = state.registry.get_session(&session_id) else {
                return Some(ServerMessage::TileWindowsResult {
                    success: false,
                    positioned: 0,
                    total: 1,
                    errors: Some(vec![format!("unknown session: {}", session_id)]),
                });
            };
            let outcome = state
                .tiling
                .maximize_window(&session.terminal_key, &session.session_id)
                .await;
            Some(ServerMessage::TileWindowsResult {
                success: outcome.success,
                positioned: outcome.positioned,
                total: outcome.total,
                errors: (!outcome.errors.is_empty()).then_some(outcome.errors),
            })
        }
        ClientMessage::LaunchSession {
            cwd,
            dangerously_skip_permissions,
        } => {
            if dangerously_skip_permissions {
                state.registry.mark_pending_bypass(&cwd);
            }
            let launcher = Arc::clone(&state.launcher);
            let result = tokio::task::spawn_blocking(move || {
                launcher.launch(&cwd, dangerously_skip_permissions)
            })
            .await;
            Some(match result {
                Ok(Ok(pid)) => {
                    info!(event = "server.session_launched", pid = pid);
                    ServerMessage::LaunchSessionResult {
                        success: true,
                        error: None,
                    }
                }
                Ok(Err(e)) => ServerMessage::LaunchSessionResult {
                    success: false,
                    error: Some(e.to_string()),
                },
                Err(e) => ServerMessage::LaunchSessionResult {
                    success: false,
                    error: Some(e.to_string()),
                },
            })
        }
        ClientMessage::CreateWorktree {
            repo_root,
            name,
            base_branch,
            launch_session,
            dangerously_skip_permissions,
        } => {
            let request = worktree::CreateWorktreeRequest {
                repo_root,
                name,
                base_branch,
            };
            match worktree::create(&request).await {
                Ok(created) => {
                    let session_launched = if launch_session {
                        if dangerously_skip_permissions {
                            state.registry.mark_pending_bypass(&created.path);
                        }
                        let launcher = Arc::clone(&state.launcher);
                        let cwd = created.path.clone();
                        let launched = tokio::task::spawn_blocking(move || {
                            launcher.launch(&cwd, dangerously_skip_permissions)
                        })
                        .await;
                        match launched {
                            Ok(Ok(_)) => true,
                            Ok(Err(e)) => {
                                warn!(event = "server.worktree_launch_failed", error = %e);
                                false
                            }
                            Err(e) => {
                                warn!(event = "server.worktree_launch_failed", error = %e);
                                false
                            }
                        }
                    } else {
                        false
                    };
                    Some(ServerMessage::CreateWorktreeResult {
                        success: true,
                        worktree_path: Some(created.path),
                        branch: Some(created.branch),
                        session_launched: Some(session_launched),
                        error: None,
                    })
                }
                Err(e) => Some(ServerMessage::CreateWorktreeResult {
                    success: false,
                    worktree_path: None,
                    branch: None,
                    session_launched: None,
                    error: Some(e.to_string()),
                }),
            }
        }
        ClientMessage::ListWorktrees { repo_root } => {
            Some(match worktree::list_with_status(&repo_root).await {
                Ok(worktrees) => ServerMessage::ListWorktreesResult {
                    success: true,
                    worktrees,
                    error: None,
                },
                Err(e) => ServerMessage::ListWorktreesResult {
                    success: false,
                    worktrees: Vec::new(),
                    error: Some(e.to_string()),
                },
            })
        }
        ClientMessage::RemoveWorktree {
            repo_root,
            worktree_path,
            force,
            delete_branch,
        } => {
            let request = worktree::RemoveWorktreeRequest {
                repo_root,
                worktree_path,
                force,
                delete_branch,
            };
            Some(match worktree::remove(&request).await {
                Ok(removed) => ServerMessage::RemoveWorktreeResult {
                    success: true,
                    branch_deleted: removed.branch_deleted,
                    error: None,
                },
                Err(e) => ServerMessage::RemoveWorktreeResult {
                    success: false,
                    branch_deleted: None,
                    error: Some(e.to_string()),
                },
            })
        }
    }
}

async fn focus_terminal(state: &Arc<AppState>, session_id: &str) -> ServerMessage {
    let Some(session) = state.registry.get_session(session_id) else {
        return ServerMessage::FocusTerminalResult {
            success: false,
            error: Some(format!("unknown session: {}", session_id)),
        };
    };
    let window_system = Arc::clone(&state.window_system);
    let key = session.terminal_key.clone();
    let result =
        tokio::task::spawn_blocking(move || window_system.focus_window(&key)).await;
    match result {
        Ok(Ok(())) => {
            state.registry.set_focused_session(Some(session_id));
            ServerMessage::FocusTerminalResult {
                success: true,
                error: None,
            }
        }
        Ok(Err(e)) => ServerMessage::FocusTerminalResult {
            success: false,
            error: Some(e.to_string()),
        },
        Err(e) => ServerMessage::FocusTerminalResult {
            success: false,
            error: Some(e.to_string()),
        },
    }
}

async fn tile_windows(
    state: &Arc<AppState>,
    session_ids: &[String],
    layout: Option<&str>,
) -> ServerMessage {
    if let Some(layout) = layout
        && layout != "smart"
    {
        debug!(event = "server.tile_unknown_layout", layout = layout);
    }

    let mut pairs = Vec::new();
    let mut errors = Vec::new();
    for session_id in session_ids {
        match state.registry.get_session(session_id) {
            Some(session) if state.is_dashboard_terminal(&session.terminal_key) => {
                debug!(
                    event = "server.tile_skipped_dashboard",
                    session_id = %session_id,
                );
            }
            Some(session) => pairs.push((session.terminal_key, session.session_id)),
            None => errors.push(format!("unknown session: {}", session_id)),
        }
    }
    if pairs.is_empty() {
        return ServerMessage::TileWindowsResult {
            success: false,
            positioned: 0,
            total: session_ids.len(),
            errors: Some(if errors.is_empty() {
                vec!["no tileable sessions".to_string()]
            } else {
                errors
            }),
        };
    }

    let outcome = state.tiling.tile_windows(&pairs, None).await;
    let mut all_errors = errors;
    all_errors.extend(outcome.errors);
    ServerMessage::TileWindowsResult {
        success: outcome.success && all_errors.is_empty(),
        positioned: outcome.positioned,
        total: outcome.total,
        errors: (!all_errors.is_empty()).then_some(all_errors),
    }
}

fn handle_trigger_action(state: &Arc<AppState>, session_id: &str, action: TriggerAction) {
    match action {
        TriggerAction::NewSession => {
            let Some(session) = state.registry.get_session(session_id) else {
                return;
            };
            let launcher = Arc::clone(&state.launcher);
            tokio::task::spawn_blocking(move || {
                if let Err(e) = launcher.launch(&session.cwd, session.is_bypass) {
                    warn!(event = "server.trigger_launch_failed", error = %e);
                }
            });
        }
        // Agent-side actions; Jacques never injects input into agent
        // processes, so these only surface in the log.
        TriggerAction::SmartCompact | TriggerAction::SaveSnapshot => {
            debug!(
                event = "server.trigger_action_ignored",
                session_id = session_id,
                action = ?action,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::app_state;
    use jacques_protocol::SessionStartEvent;
    use std::path::{Path, PathBuf};
    use std::process::Command;

    fn git(dir: &Path, args: &[&str]) {
        let output = Command::new("git")
            .current_dir(dir)
            .args(args)
            .output()
            .expect("failed to execute git");
        assert!(output.status.success());
    }

    fn init_repo(dir: &Path) {
        git(dir, &["init", "-b", "main"]);
        git(dir, &["config", "user.email", "test@test.com"]);
        git(dir, &["config", "user.name", "Test User"]);
        std::fs::write(dir.join("a.txt"), "a").unwrap();
        git(dir, &["add", "."]);
        git(dir, &["commit", "-m", "initial"]);
    }

    #[tokio::test]
    async fn test_select_session_sets_focus() {
        let state = app_state();
        state.registry.register_session(&SessionStartEvent {
            session_id: "S1".to_string(),
            terminal_key: Some("PID:1".to_string()),
            ..Default::default()
        });
        state.registry.register_session(&SessionStartEvent {
            session_id: "S2".to_string(),
            terminal_key: Some("PID:2".to_string()),
            ..Default::default()
        });
        let reply = handle_client_message(
            &state,
            ClientMessage::SelectSession {
                session_id: "S1".to_string(),
            },
        )
        .await;
        assert!(reply.is_none());
        assert_eq!(state.registry.get_focused_session_id().as_deref(), Some("S1"));
    }

    #[tokio::test]
    async fn test_toggle_autocompact_broadcasts_warning() {
        let state = app_state();
        let mut rx = state.broadcasts.subscribe();
        handle_client_message(&state, ClientMessage::ToggleAutocompact { enabled: None }).await;
        let ServerMessage::AutocompactToggled { enabled, warning } = rx.try_recv().unwrap()
        else {
            panic!("wrong message");
        };
        assert!(!enabled);
        assert!(warning.unwrap().contains("78"));
    }

    #[tokio::test]
    async fn test_focus_terminal_unknown_session() {
        let state = app_state();
        let reply = handle_client_message(
            &state,
            ClientMessage::FocusTerminal {
                session_id: "ghost".to_string(),
            },
        )
        .await
        .unwrap();
        let ServerMessage::FocusTerminalResult { success, error } = reply else {
            panic!("wrong message");
        };
        assert!(!success);
        assert!(error.unwrap().contains("ghost"));
    }

    #[tokio::test]
    async fn test_tile_windows_with_no_known_sessions() {
        let state = app_state();
        let reply = handle_client_message(
            &state,
            ClientMessage::TileWindows {
                session_ids: vec!["ghost".to_string()],
                layout: Some("smart".to_string()),
            },
        )
        .await
        .unwrap();
        let ServerMessage::TileWindowsResult { success, errors, .. } = reply else {
            panic!("wrong message");
        };
        assert!(!success);
        assert!(errors.unwrap()[0].contains("ghost"));
    }

    #[tokio::test]
    async fn test_launch_session_marks_pending_bypass() {
        let state = app_state();
        let tmp = tempfile::TempDir::new().unwrap();
        let reply = handle_client_message(
            &state,
            ClientMessage::LaunchSession {
                cwd: tmp.path().to_path_buf(),
                dangerously_skip_permissions: true,
            },
        )
        .await
        .unwrap();
        assert!(matches!(
            reply,
            ServerMessage::LaunchSessionResult { success: true, .. }
        ));
        // The next session registered in that cwd inherits the flag.
        let session = state.registry.register_session(&SessionStartEvent {
            session_id: "S1".to_string(),
            terminal_key: Some("PID:1".to_string()),
            cwd: Some(tmp.path().to_path_buf()),
            ..Default::default()
        });
        assert!(session.is_bypass);
    }

    #[tokio::test]
    async fn test_worktree_cycle_over_messages() {
        let state = app_state();
        let base = tempfile::TempDir::new().unwrap();
        let repo = base.path().join("r");
        std::fs::create_dir(&repo).unwrap();
        init_repo(&repo);

        let reply = handle_client_message(
            &state,
            ClientMessage::CreateWorktree {
                repo_root: repo.clone(),
                name: "feat".to_string(),
                base_branch: Some("main".to_string()),
                launch_session: true,
                dangerously_skip_permissions: false,
            },
        )
        .await
        .unwrap();
        let ServerMessage::CreateWorktreeResult {
            success,
            worktree_path,
            branch,
            session_launched,
            ..
        } = reply
        else {
            panic!("wrong message");
        };
        assert!(success);
        assert_eq!(branch.as_deref(), Some("feat"));
        assert_eq!(session_launched, Some(true));
        let worktree_path = worktree_path.unwrap();

        let reply = handle_client_message(
            &state,
            ClientMessage::ListWorktrees {
                repo_root: repo.clone(),
            },
        )
        .await
        .unwrap();
        let ServerMessage::ListWorktreesResult { worktrees, .. } = reply else {
            panic!("wrong message");
        };
        assert_eq!(worktrees.len(), 2);

        let reply = handle_client_message(
            &state,
            ClientMessage::RemoveWorktree {
                repo_root: repo,
                worktree_path,
                force: false,
                delete_branch: true,
            },
        )
        .await
        .unwrap();
        let ServerMessage::RemoveWorktreeResult {
            success,
            branch_deleted,
            ..
        } = reply
        else {
            panic!("wrong message");
        };
        assert!(success);
        // Branch was never merged; -d refuses, reported as not deleted.
        assert_eq!(branch_deleted, Some(false));
    }

    #[tokio::test]
    async fn test_invalid_worktree_name_rides_back_in_reply() {
        let state = app_state();
        let reply = handle_client_message(
            &state,
            ClientMessage::CreateWorktree {
                repo_root: PathBuf::from("/tmp"),
                name: "bad name!".to_string(),
                base_branch: None,
                launch_session: false,
                dangerously_skip_permissions: false,
            },
        )
        .await
        .unwrap();
        let ServerMessage::CreateWorktreeResult { success, error, .. } = reply else {
            panic!("wrong message");
        };
        assert!(!success);
        assert!(error.unwrap().contains("Invalid worktree name"));
    }
}
