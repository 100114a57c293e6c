use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The agent platform's known-bad autocompact threshold.
///
/// When autocompact is disabled the platform still fires compaction at 78%,
/// so `bug_threshold` is pinned to this value for disabled sessions.
pub const AUTOCOMPACT_BUG_THRESHOLD: u8 = 78;

/// Which agent platform owns a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionSource {
    ClaudeCode,
    Cursor,
    Other,
}

impl Default for SessionSource {
    fn default() -> Self {
        SessionSource::ClaudeCode
    }
}

/// Session lifecycle status.
///
/// `Active` = registered, no tool calls yet. `Working` = tool call in
/// flight. `Awaiting` = tool call pending user approval (set after the
/// 1-second debounce). `Idle` = assistant finished its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Working,
    Awaiting,
    Idle,
}

/// The agent's permission posture.
///
/// `Planning` is transient — derived from an open `EnterPlanMode` interval
/// in the transcript, never reported by hooks directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionMode {
    #[serde(rename = "default")]
    Default,
    #[serde(rename = "plan")]
    Plan,
    #[serde(rename = "planning")]
    Planning,
    #[serde(rename = "acceptEdits")]
    AcceptEdits,
}

/// Permission mode values accepted from hook events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionMode {
    #[serde(rename = "default")]
    Default,
    #[serde(rename = "plan")]
    Plan,
    #[serde(rename = "acceptEdits")]
    AcceptEdits,
    #[serde(rename = "dontAsk")]
    DontAsk,
    #[serde(rename = "bypassPermissions")]
    BypassPermissions,
}

/// Model identity as reported by statusline updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub display_name: String,
}

/// Workspace directories as reported by statusline updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    pub current_dir: PathBuf,
    pub project_dir: Option<PathBuf>,
}

/// Context-window usage metrics.
///
/// `used_percentage + remaining_percentage` is approximately 100 but not
/// forced exact — clients tolerate skew.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMetrics {
    pub used_percentage: f64,
    pub remaining_percentage: f64,
    pub context_window_size: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub is_estimate: bool,
}

/// Autocompact state for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Autocompact {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bug_threshold: Option<u8>,
}

impl Autocompact {
    /// Build an autocompact record, enforcing the platform quirk:
    /// disabled sessions still compact at [`AUTOCOMPACT_BUG_THRESHOLD`].
    pub fn new(enabled: bool, threshold: Option<f64>) -> Self {
        Self {
            enabled,
            threshold,
            bug_threshold: if enabled {
                None
            } else {
                Some(AUTOCOMPACT_BUG_THRESHOLD)
            },
        }
    }

    /// Re-apply the bug-threshold invariant after deserializing an
    /// externally supplied value.
    pub fn normalized(mut self) -> Self {
        self.bug_threshold = if self.enabled {
            None
        } else {
            Some(AUTOCOMPACT_BUG_THRESHOLD)
        };
        self
    }
}

/// Structured terminal-emulator identity for one pane/tab.
///
/// Agents report whatever their environment exposes; any subset of fields
/// may be present. `jacques-core`'s terminal key module collapses this into
/// a single canonical key string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerminalIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterm_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kitty_window_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wezterm_pane: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wt_session: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

impl TerminalIdentity {
    /// True when no identity field carries a value.
    pub fn is_empty(&self) -> bool {
        self.iterm_session_id.is_none()
            && self.kitty_window_id.is_none()
            && self.wezterm_pane.is_none()
            && self.wt_session.is_none()
            && self.term_session_id.is_none()
            && self.tty.is_none()
            && self.pid.is_none()
    }
}

/// The canonical session record.
///
/// Owned exclusively by the session registry; every other component
/// observes copies through events or read accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    #[serde(default)]
    pub source: SessionSource,
    /// Registration time, ms epoch.
    pub registered_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_title: Option<String>,
    pub cwd: PathBuf,
    /// Leaf name of the project directory (falls back to the cwd leaf).
    pub project: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal: Option<TerminalIdentity>,
    /// Canonical terminal key. Never empty; `AUTO:`/`DISCOVERED:` keys may
    /// be upgraded to declared keys but not downgraded.
    pub terminal_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_pid: Option<u32>,
    pub status: SessionStatus,
    /// Last observed activity, ms epoch.
    pub last_activity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_metrics: Option<ContextMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autocompact: Option<Autocompact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_worktree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_repo_root: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_ahead: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_behind: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_dirty: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<SessionMode>,
    #[serde(default)]
    pub is_bypass: bool,
}

impl Session {
    /// Best-known pid for this session (hook-declared first, then the
    /// structured terminal identity).
    pub fn known_pid(&self) -> Option<u32> {
        self.terminal_pid
            .or_else(|| self.terminal.as_ref().and_then(|t| t.pid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_autocompact_disabled_pins_bug_threshold() {
        let ac = Autocompact::new(false, Some(80.0));
        assert_eq!(ac.bug_threshold, Some(78));
    }

    #[test]
    fn test_autocompact_enabled_has_no_bug_threshold() {
        let ac = Autocompact::new(true, Some(80.0));
        assert_eq!(ac.bug_threshold, None);
    }

    #[test]
    fn test_autocompact_normalized_fixes_external_values() {
        let ac = Autocompact {
            enabled: false,
            threshold: None,
            bug_threshold: None,
        };
        assert_eq!(ac.normalized().bug_threshold, Some(78));
    }

    #[test]
    fn test_session_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::Awaiting).unwrap(),
            "\"awaiting\""
        );
        assert_eq!(
            serde_json::to_string(&SessionStatus::Working).unwrap(),
            "\"working\""
        );
    }

    #[test]
    fn test_session_mode_accept_edits_is_camel_case() {
        assert_eq!(
            serde_json::to_string(&SessionMode::AcceptEdits).unwrap(),
            "\"acceptEdits\""
        );
    }

    #[test]
    fn test_permission_mode_bypass_wire_name() {
        let mode: PermissionMode = serde_json::from_str("\"bypassPermissions\"").unwrap();
        assert_eq!(mode, PermissionMode::BypassPermissions);
    }

    #[test]
    fn test_terminal_identity_is_empty() {
        assert!(TerminalIdentity::default().is_empty());
        let id = TerminalIdentity {
            tty: Some("/dev/ttys001".to_string()),
            ..Default::default()
        };
        assert!(!id.is_empty());
    }

    #[test]
    fn test_terminal_identity_app_alone_is_empty() {
        // `app` is display metadata, not an addressable identity.
        let id = TerminalIdentity {
            app: Some("iTerm2".to_string()),
            ..Default::default()
        };
        assert!(id.is_empty());
    }

    #[test]
    fn test_known_pid_prefers_declared() {
        let mut session = test_session("S1");
        session.terminal_pid = Some(42);
        session.terminal = Some(TerminalIdentity {
            pid: Some(99),
            ..Default::default()
        });
        assert_eq!(session.known_pid(), Some(42));
    }

    pub(crate) fn test_session(id: &str) -> Session {
        Session {
            session_id: id.to_string(),
            source: SessionSource::ClaudeCode,
            registered_at: 1_700_000_000_000,
            session_title: None,
            cwd: PathBuf::from("/tmp/project"),
            project: "project".to_string(),
            transcript_path: None,
            model: None,
            workspace: None,
            terminal: None,
            terminal_key: format!("AUTO:{}", id),
            terminal_pid: None,
            status: SessionStatus::Active,
            last_activity: 1_700_000_000_000,
            last_tool_name: None,
            context_metrics: None,
            autocompact: None,
            git_branch: None,
            git_worktree: None,
            git_repo_root: None,
            git_ahead: None,
            git_behind: None,
            git_dirty: None,
            mode: None,
            is_bypass: false,
        }
    }
}
