use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::session::{
    Autocompact, ModelInfo, PermissionMode, SessionSource, TerminalIdentity, WorkspaceInfo,
};

/// Events posted by agent hooks to `POST /hook`, tagged by `event`.
///
/// Unknown `event` values fail deserialization and the endpoint answers 400.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HookEvent {
    SessionStart(SessionStartEvent),
    Activity(ActivityEvent),
    ContextUpdate(ContextUpdateEvent),
    Idle(IdleEvent),
    PreToolUse(PreToolUseEvent),
}

impl HookEvent {
    pub fn session_id(&self) -> &str {
        match self {
            HookEvent::SessionStart(e) => &e.session_id,
            HookEvent::Activity(e) => &e.session_id,
            HookEvent::ContextUpdate(e) => &e.session_id,
            HookEvent::Idle(e) => &e.session_id,
            HookEvent::PreToolUse(e) => &e.session_id,
        }
    }
}

/// `session_start` — fired once when an agent process boots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStartEvent {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SessionSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal: Option<TerminalIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<PermissionMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autocompact: Option<Autocompact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_worktree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_repo_root: Option<PathBuf>,
}

/// `activity` — a tool call completed (post-tool-use side).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<PermissionMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_metrics: Option<ContextMetricsUpdate>,
}

/// Partial context metrics carried by statusline/activity events.
///
/// Absent fields fall back to registry defaults (`used=0`, `remaining=100`,
/// `is_estimate=false`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextMetricsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_estimate: Option<bool>,
}

/// `context_update` — statusline refresh; may auto-register an unknown
/// session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextUpdateEvent {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_metrics: Option<ContextMetricsUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autocompact: Option<Autocompact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_worktree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_repo_root: Option<PathBuf>,
}

/// `idle` — the assistant finished its turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdleEvent {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<PermissionMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_pid: Option<u32>,
}

/// `pre_tool_use` — a tool call is about to run (may block on approval).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreToolUseEvent {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<PermissionMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_pid: Option<u32>,
}
