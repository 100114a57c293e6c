use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::notifications::NotificationItem;
use crate::session::Session;

/// Worktree status computed by `list_with_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorktreeStatus {
    pub has_uncommitted_changes: bool,
    pub is_merged_to_main: bool,
}

/// One git worktree as reported to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorktreeEntry {
    pub name: String,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub is_main: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<WorktreeStatus>,
}

/// Actions a client can trigger against a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerAction {
    SmartCompact,
    NewSession,
    SaveSnapshot,
}

/// Client → server messages, tagged by `type`.
///
/// Field casing follows the wire contract the front-ends already speak:
/// session references on action messages are `sessionId`, structural
/// parameters stay snake_case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    SelectSession {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    TriggerAction {
        #[serde(rename = "sessionId")]
        session_id: String,
        action: TriggerAction,
    },
    ToggleAutocompact {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        enabled: Option<bool>,
    },
    FocusTerminal {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    TileWindows {
        session_ids: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        layout: Option<String>,
    },
    MaximizeWindow {
        session_id: String,
    },
    LaunchSession {
        cwd: PathBuf,
        #[serde(default)]
        dangerously_skip_permissions: bool,
    },
    CreateWorktree {
        repo_root: PathBuf,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_branch: Option<String>,
        #[serde(default)]
        launch_session: bool,
        #[serde(default)]
        dangerously_skip_permissions: bool,
    },
    ListWorktrees {
        repo_root: PathBuf,
    },
    RemoveWorktree {
        repo_root: PathBuf,
        worktree_path: PathBuf,
        #[serde(default)]
        force: bool,
        #[serde(default)]
        delete_branch: bool,
    },
    RegisterDashboard {
        terminal_key: String,
    },
}

/// Server → client messages, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    InitialState {
        sessions: Vec<Session>,
        focused: Option<String>,
        scanning: bool,
    },
    SessionUpdate {
        session: Box<Session>,
    },
    SessionRemoved {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    FocusChanged {
        #[serde(rename = "sessionId")]
        session_id: Option<String>,
        session: Option<Box<Session>>,
    },
    ServerStatus {
        status: String,
        session_count: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scanning: Option<bool>,
    },
    AutocompactToggled {
        enabled: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
    },
    HandoffReady {
        session_id: String,
        path: PathBuf,
    },
    PlanReady {
        session_id: String,
        title: String,
    },
    FocusTerminalResult {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    LaunchSessionResult {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    TileWindowsResult {
        success: bool,
        positioned: usize,
        total: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        errors: Option<Vec<String>>,
    },
    CreateWorktreeResult {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        worktree_path: Option<PathBuf>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        branch: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_launched: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    ListWorktreesResult {
        success: bool,
        #[serde(default)]
        worktrees: Vec<WorktreeEntry>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    RemoveWorktreeResult {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        branch_deleted: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    NotificationFired {
        notification: NotificationItem,
    },
    NotificationHistory {
        notifications: Vec<NotificationItem>,
    },
}
