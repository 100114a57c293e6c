//! Session construction for the three creation contexts.
//!
//! Discovery (process scan), hook `session_start`, and statusline
//! `context_update` each carry a different slice of identity; the factory
//! normalizes all three into a full `Session` record.

use std::path::Path;

use jacques_protocol::{
    epoch_ms, ContextUpdateEvent, DetectedSession, Session, SessionSource, SessionStartEvent,
    SessionStatus,
};

use crate::terminal;

/// Drop session titles that are internal command echoes.
///
/// The platform occasionally reports `<local-command-stdout>`-style markers
/// as the session title; those never reach clients.
pub fn filter_title(title: Option<&str>) -> Option<String> {
    let title = title?.trim();
    if title.is_empty() || title.starts_with("<local-command") || title.starts_with("<command-") {
        None
    } else {
        Some(title.to_string())
    }
}

/// Leaf name of the project directory, falling back to the cwd leaf.
pub fn derive_project(cwd: &Path, project_dir: Option<&Path>) -> String {
    let dir = project_dir.unwrap_or(cwd);
    dir.file_name()
        .map(|leaf| leaf.to_string_lossy().to_string())
        .unwrap_or_else(|| dir.display().to_string())
}

/// Synthesize the `DISCOVERED:` terminal key for a scanned process.
///
/// Priority: emulator-declared session id, then tty+pid, then pid alone.
pub fn discovered_terminal_key(detected: &DetectedSession) -> String {
    if let (Some(kind), Some(value)) = (
        detected.terminal_type.as_deref(),
        detected.terminal_session_id.as_deref(),
    ) {
        let prefix = match kind {
            "iterm" | "iterm2" => "ITERM",
            "kitty" => "KITTY",
            "wezterm" => "WEZTERM",
            "wt" => "WT",
            "term" => "TERM",
            other => return format!("DISCOVERED:{}:{}", other.to_uppercase(), value),
        };
        return format!("DISCOVERED:{}:{}", prefix, value);
    }
    if let Some(tty) = detected.tty.as_deref() {
        return format!("DISCOVERED:TTY:{}:{}", tty, detected.pid);
    }
    format!("DISCOVERED:PID:{}", detected.pid)
}

/// Build a session from a scanner observation.
pub fn from_discovered(detected: &DetectedSession) -> Session {
    let terminal_key = discovered_terminal_key(detected);
    Session {
        session_id: detected.session_id.clone(),
        source: SessionSource::ClaudeCode,
        registered_at: epoch_ms(),
        session_title: filter_title(detected.title.as_deref()),
        project: detected
            .project
            .clone()
            .unwrap_or_else(|| derive_project(&detected.cwd, None)),
        cwd: detected.cwd.clone(),
        transcript_path: detected.transcript_path.clone(),
        model: None,
        workspace: None,
        terminal: None,
        terminal_key,
        terminal_pid: Some(detected.pid),
        status: SessionStatus::Active,
        last_activity: detected.last_activity,
        last_tool_name: None,
        context_metrics: detected.context_metrics.clone(),
        autocompact: None,
        git_branch: detected.git_branch.clone(),
        git_worktree: detected.git_worktree.clone(),
        git_repo_root: detected.git_repo_root.clone(),
        git_ahead: None,
        git_behind: None,
        git_dirty: None,
        mode: detected.mode,
        is_bypass: detected.is_bypass,
    }
}

/// Terminal key for a hook registration.
///
/// Prefers the hook-declared key, then a key built from the structured
/// identity, then the pid, then `UNKNOWN`.
pub fn hook_terminal_key(event: &SessionStartEvent) -> String {
    if let Some(key) = event.terminal_key.as_deref()
        && !key.is_empty()
    {
        return key.to_string();
    }
    if let Some(identity) = event.terminal.as_ref()
        && let Some(key) = terminal::build_key(identity)
    {
        return key;
    }
    if let Some(pid) = event.terminal_pid.filter(|pid| *pid > 0) {
        return format!("PID:{}", pid);
    }
    "UNKNOWN".to_string()
}

/// Build a session from a hook `session_start` event.
pub fn from_hook(event: &SessionStartEvent) -> Session {
    let now = epoch_ms();
    let cwd = event
        .cwd
        .clone()
        .unwrap_or_else(|| std::path::PathBuf::from("/"));
    Session {
        session_id: event.session_id.clone(),
        source: event.source.unwrap_or_default(),
        registered_at: now,
        session_title: filter_title(event.session_title.as_deref()),
        project: derive_project(&cwd, event.project_dir.as_deref()),
        cwd,
        transcript_path: event.transcript_path.clone(),
        model: None,
        workspace: None,
        terminal: event.terminal.clone(),
        terminal_key: hook_terminal_key(event),
        terminal_pid: event
            .terminal_pid
            .or_else(|| event.terminal.as_ref().and_then(|t| t.pid)),
        status: SessionStatus::Active,
        last_activity: event.timestamp.unwrap_or(now),
        last_tool_name: None,
        context_metrics: None,
        autocompact: event.autocompact.clone().map(|ac| ac.normalized()),
        git_branch: event.git_branch.clone(),
        git_worktree: event.git_worktree.clone(),
        git_repo_root: event.git_repo_root.clone(),
        git_ahead: None,
        git_behind: None,
        git_dirty: None,
        mode: None,
        is_bypass: false,
    }
}

/// Build a session from a statusline `context_update` for an unknown id.
pub fn from_context(event: &ContextUpdateEvent) -> Session {
    let now = epoch_ms();
    let cwd = event
        .cwd
        .clone()
        .or_else(|| {
            event
                .workspace
                .as_ref()
                .map(|workspace| workspace.current_dir.clone())
        })
        .unwrap_or_else(|| std::path::PathBuf::from("/"));
    let project = derive_project(
        &cwd,
        event.project_dir.as_deref().or_else(|| {
            event
                .workspace
                .as_ref()
                .and_then(|workspace| workspace.project_dir.as_deref())
        }),
    );
    let title = filter_title(event.session_title.as_deref())
        .unwrap_or_else(|| format!("Session in {}", project));
    Session {
        session_id: event.session_id.clone(),
        source: SessionSource::ClaudeCode,
        registered_at: now,
        session_title: Some(title),
        project,
        cwd,
        transcript_path: event.transcript_path.clone(),
        model: event.model.clone(),
        workspace: event.workspace.clone(),
        terminal: None,
        terminal_key: format!("AUTO:{}", event.session_id),
        terminal_pid: event.terminal_pid,
        status: SessionStatus::Active,
        last_activity: event.timestamp.unwrap_or(now),
        last_tool_name: None,
        context_metrics: None,
        autocompact: event.autocompact.clone().map(|ac| ac.normalized()),
        git_branch: event.git_branch.clone(),
        git_worktree: event.git_worktree.clone(),
        git_repo_root: event.git_repo_root.clone(),
        git_ahead: None,
        git_behind: None,
        git_dirty: None,
        mode: None,
        is_bypass: false,
    }
}
