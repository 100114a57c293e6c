use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::session::{ContextMetrics, SessionMode};

/// One live agent process as seen by the process scanner.
///
/// The scanner reports raw observations; the registry turns each into a
/// `Session` with a `DISCOVERED:`-prefixed terminal key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedSession {
    pub session_id: String,
    pub pid: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tty: Option<String>,
    pub cwd: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<PathBuf>,
    /// Last observed activity, ms epoch (process start time when nothing
    /// better is known).
    pub last_activity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_worktree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_repo_root: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_metrics: Option<ContextMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<SessionMode>,
    /// Terminal emulator name when the process environment identifies one
    /// (e.g. `iterm`, `kitty`, `wezterm`, `wt`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_type: Option<String>,
    /// Emulator-declared session/pane identifier, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_session_id: Option<String>,
    #[serde(default)]
    pub is_bypass: bool,
}

impl DetectedSession {
    /// Minimal record for a pid+cwd observation.
    pub fn minimal(session_id: impl Into<String>, pid: u32, cwd: PathBuf, now_ms: i64) -> Self {
        Self {
            session_id: session_id.into(),
            pid,
            tty: None,
            cwd,
            project: None,
            transcript_path: None,
            last_activity: now_ms,
            title: None,
            git_branch: None,
            git_worktree: None,
            git_repo_root: None,
            context_metrics: None,
            mode: None,
            terminal_type: None,
            terminal_session_id: None,
            is_bypass: false,
        }
    }
}
