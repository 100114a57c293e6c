//! The canonical session registry.
//!
//! Exclusively owns the `session_id → Session` map. Several independent
//! streams can create or describe the same session (process scan, hook
//! `session_start`, statusline `context_update`, later `activity`); rather
//! than a priority ordering, the registry applies an upgrade-only merge and
//! funnels every terminal comparison through [`crate::terminal::matches`].
//!
//! All mutations happen under one lock, and event emission plus removal
//! hooks run synchronously on that same boundary, so observers always see a
//! consistent snapshot and `session_removed` is the last event for its id.
//! The registry never performs I/O while holding the lock.

pub mod factory;
pub mod pending;
pub mod recently_ended;

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use jacques_protocol::{
    epoch_ms, ActivityEvent, ContextMetrics, ContextMetricsUpdate, ContextUpdateEvent,
    DetectedSession, PermissionMode, Session, SessionMode, SessionStartEvent, SessionStatus,
};

use crate::events::RegistryEvent;
use crate::terminal;
use pending::PendingBypass;
use recently_ended::RecentlyEnded;

/// Debounce before a pending tool call is surfaced as `awaiting`.
///
/// Most tool calls are auto-approved within milliseconds; a literal awaiting
/// state per `pre_tool_use` would strobe the UI.
pub const AWAITING_DEBOUNCE: Duration = Duration::from_secs(1);

type RemovalHook = Box<dyn Fn(&Session) + Send + Sync>;
type AwaitingCallback = Box<dyn FnOnce(Session) + Send>;

struct RegistryInner {
    sessions: HashMap<String, Session>,
    focused_session_id: Option<String>,
    awaiting_timers: HashMap<String, JoinHandle<()>>,
    pending_bypass: PendingBypass,
    recently_ended: RecentlyEnded,
    removal_hooks: Vec<RemovalHook>,
}

/// Canonical in-memory session store. See module docs.
pub struct SessionRegistry {
    inner: Mutex<RegistryInner>,
    events: broadcast::Sender<RegistryEvent>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            inner: Mutex::new(RegistryInner {
                sessions: HashMap::new(),
                focused_session_id: None,
                awaiting_timers: HashMap::new(),
                pending_bypass: PendingBypass::new(),
                recently_ended: RecentlyEnded::new(),
                removal_hooks: Vec::new(),
            }),
            events,
        })
    }

    /// Subscribe to registry events.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Register a hook invoked exactly once per removal, with the outgoing
    /// session, before the id is deleted from the map. Panics are swallowed.
    pub fn on_session_removed(&self, hook: impl Fn(&Session) + Send + Sync + 'static) {
        let mut inner = self.lock();
        inner.removal_hooks.push(Box::new(hook));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn emit(&self, event: RegistryEvent) {
        // No receivers is fine — e.g. during startup discovery.
        let _ = self.events.send(event);
    }

    fn emit_update(&self, session: &Session) {
        self.emit(RegistryEvent::SessionUpdated(Box::new(session.clone())));
    }

    // --- Creation paths ---

    /// Register a session found by the process scanner.
    ///
    /// An already-known id is returned unchanged — discovery never
    /// overwrites richer hook-supplied state.
    pub fn register_discovered(&self, detected: &DetectedSession) -> Session {
        let mut inner = self.lock();
        if let Some(existing) = inner.sessions.get(&detected.session_id) {
            return existing.clone();
        }

        let mut session = factory::from_discovered(detected);
        if inner.pending_bypass.consume(&session.cwd) {
            session.is_bypass = true;
        }

        let first_session = inner.sessions.is_empty();
        inner
            .sessions
            .insert(session.session_id.clone(), session.clone());
        info!(
            event = "core.registry.discovered_registered",
            session_id = %session.session_id,
            terminal_key = %session.terminal_key,
        );
        self.emit_update(&session);
        if first_session {
            self.set_focus_locked(&mut inner, Some(session.session_id.clone()));
        }
        session
    }

    /// Register a session announced by a `session_start` hook.
    ///
    /// Removes every other session that is stale for this terminal first
    /// (same tab relaunch, `/clear`, compaction restart), then creates or
    /// upgrades in place. Fresh hook registrations always take focus.
    pub fn register_session(&self, event: &SessionStartEvent) -> Session {
        let mut inner = self.lock();

        let new_key = factory::hook_terminal_key(event);
        let new_pid = event
            .terminal_pid
            .or_else(|| event.terminal.as_ref().and_then(|t| t.pid));
        self.remove_stale_for_terminal(&mut inner, &event.session_id, &new_key, new_pid);

        let session = match inner.sessions.get_mut(&event.session_id) {
            Some(existing) => {
                // Auto-registered or discovered earlier — upgrade in place.
                if let Some(identity) = event.terminal.clone() {
                    existing.terminal = Some(identity);
                }
                if new_key != "UNKNOWN" {
                    existing.terminal_key = new_key;
                }
                if let Some(pid) = new_pid {
                    existing.terminal_pid = Some(pid);
                }
                if event.transcript_path.is_some() {
                    existing.transcript_path = event.transcript_path.clone();
                }
                if let Some(autocompact) = event.autocompact.clone() {
                    existing.autocompact = Some(autocompact.normalized());
                }
                if let Some(title) = factory::filter_title(event.session_title.as_deref()) {
                    existing.session_title = Some(title);
                }
                for (field, value) in [
                    (&mut existing.git_branch, event.git_branch.clone()),
                    (&mut existing.git_worktree, event.git_worktree.clone()),
                ] {
                    if let Some(value) = value.filter(|v| !v.is_empty()) {
                        *field = Some(value);
                    }
                }
                if event.git_repo_root.is_some() {
                    existing.git_repo_root = event.git_repo_root.clone();
                }
                apply_permission_mode(existing, event.permission_mode);
                existing.clone()
            }
            None => {
                let mut session = factory::from_hook(event);
                apply_permission_mode(&mut session, event.permission_mode);
                if inner.pending_bypass.consume(&session.cwd) {
                    session.is_bypass = true;
                }
                inner
                    .sessions
                    .insert(session.session_id.clone(), session.clone());
                session
            }
        };

        info!(
            event = "core.registry.session_registered",
            session_id = %session.session_id,
            terminal_key = %session.terminal_key,
        );
        self.emit_update(&session);
        self.set_focus_locked(&mut inner, Some(session.session_id.clone()));
        session
    }

    /// Statusline update; auto-registers unknown (and not recently ended)
    /// ids under an `AUTO:` terminal key.
    pub fn update_context(&self, event: &ContextUpdateEvent) -> Option<Session> {
        let mut inner = self.lock();

        if !inner.sessions.contains_key(&event.session_id) {
            if inner.recently_ended.was_recently_ended(&event.session_id) {
                debug!(
                    event = "core.registry.context_for_ended_session",
                    session_id = %event.session_id,
                );
                return None;
            }
            let mut session = factory::from_context(event);
            if inner.pending_bypass.consume(&session.cwd) {
                session.is_bypass = true;
            }
            inner
                .sessions
                .insert(session.session_id.clone(), session.clone());
            info!(
                event = "core.registry.context_auto_registered",
                session_id = %session.session_id,
            );
            // Late-arriving `/clear` reconciliation: drop any other session
            // still holding this terminal.
            self.remove_stale_for_terminal(
                &mut inner,
                &event.session_id,
                &session.terminal_key,
                session.terminal_pid,
            );
            self.emit_update(&session);
            self.set_focus_locked(&mut inner, Some(session.session_id.clone()));
        }

        let session = inner.sessions.get_mut(&event.session_id)?;
        session.last_activity = event.timestamp.unwrap_or_else(epoch_ms);
        if session.status == SessionStatus::Active {
            session.status = SessionStatus::Working;
        }
        session.context_metrics = Some(merged_metrics(
            event.context_metrics.as_ref().unwrap_or(&Default::default()),
        ));
        if let Some(autocompact) = event.autocompact.clone() {
            session.autocompact = Some(autocompact.normalized());
        }
        if let Some(model) = event.model.clone() {
            session.model = Some(model);
        }
        if let Some(workspace) = event.workspace.clone() {
            session.workspace = Some(workspace);
        }
        if let Some(key) = event.terminal_key.as_deref().filter(|k| !k.is_empty())
            && (session.terminal_key.starts_with("AUTO:")
                || session.terminal_key.starts_with("DISCOVERED:"))
        {
            session.terminal_key = key.to_string();
        }
        if let Some(pid) = event.terminal_pid {
            session.terminal_pid = Some(pid);
        }
        if let Some(title) = factory::filter_title(event.session_title.as_deref()) {
            session.session_title = Some(title);
        }
        if session.transcript_path.is_none() {
            session.transcript_path = event.transcript_path.clone();
        }
        for (field, value) in [
            (&mut session.git_branch, event.git_branch.clone()),
            (&mut session.git_worktree, event.git_worktree.clone()),
        ] {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                *field = Some(value);
            }
        }
        if event.git_repo_root.is_some() {
            session.git_repo_root = event.git_repo_root.clone();
        }

        let snapshot = session.clone();
        self.emit_update(&snapshot);
        Some(snapshot)
    }

    // --- Live-update paths ---

    /// A tool call completed; the session is working.
    pub fn update_activity(&self, event: &ActivityEvent) -> Option<Session> {
        let mut inner = self.lock();
        self.cancel_awaiting_timer(&mut inner, &event.session_id);

        let session = inner.sessions.get_mut(&event.session_id)?;
        session.status = SessionStatus::Working;
        session.last_activity = event.timestamp.unwrap_or_else(epoch_ms);
        if let Some(tool) = event.tool_name.clone() {
            session.last_tool_name = Some(tool);
        }
        if let Some(pid) = event.terminal_pid {
            session.terminal_pid = Some(pid);
        }
        apply_permission_mode(session, event.permission_mode);
        if let Some(title) = factory::filter_title(event.session_title.as_deref()) {
            session.session_title = Some(title);
        }
        if let Some(metrics) = event.context_metrics.as_ref() {
            session.context_metrics = Some(merged_metrics(metrics));
        }

        let snapshot = session.clone();
        self.emit_update(&snapshot);
        Some(snapshot)
    }

    /// The assistant finished its turn.
    pub fn set_session_idle(
        &self,
        session_id: &str,
        permission_mode: Option<PermissionMode>,
        terminal_pid: Option<u32>,
    ) -> Option<Session> {
        let mut inner = self.lock();
        self.cancel_awaiting_timer(&mut inner, session_id);

        let session = inner.sessions.get_mut(session_id)?;
        session.status = SessionStatus::Idle;
        session.last_activity = epoch_ms();
        if let Some(pid) = terminal_pid {
            session.terminal_pid = Some(pid);
        }
        apply_permission_mode(session, permission_mode);

        let snapshot = session.clone();
        self.emit_update(&snapshot);
        Some(snapshot)
    }

    /// Schedule the awaiting debounce for a pending tool call.
    ///
    /// When the timer fires and the session still exists in `working` or
    /// `active`, status moves to `awaiting` and `on_timeout` runs with the
    /// post-transition snapshot (off the lock). Any later activity or idle
    /// event cancels the timer.
    pub fn set_session_awaiting(
        self: &Arc<Self>,
        session_id: &str,
        tool_name: &str,
        permission_mode: Option<PermissionMode>,
        on_timeout: AwaitingCallback,
        terminal_pid: Option<u32>,
    ) {
        let mut inner = self.lock();
        if let Some(session) = inner.sessions.get_mut(session_id) {
            let mut changed = apply_permission_mode(session, permission_mode);
            if let Some(pid) = terminal_pid
                && session.terminal_pid != Some(pid)
            {
                session.terminal_pid = Some(pid);
                changed = true;
            }
            if changed {
                let snapshot = session.clone();
                self.emit_update(&snapshot);
            }
        }

        self.cancel_awaiting_timer(&mut inner, session_id);

        let registry = Arc::clone(self);
        let id = session_id.to_string();
        let tool = tool_name.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(AWAITING_DEBOUNCE).await;
            let snapshot = {
                let mut inner = registry.lock();
                inner.awaiting_timers.remove(&id);
                let Some(session) = inner.sessions.get_mut(&id) else {
                    return;
                };
                if !matches!(
                    session.status,
                    SessionStatus::Working | SessionStatus::Active
                ) {
                    return;
                }
                session.status = SessionStatus::Awaiting;
                session.last_tool_name = Some(tool);
                let snapshot = session.clone();
                registry.emit_update(&snapshot);
                snapshot
            };
            on_timeout(snapshot);
        });
        inner.awaiting_timers.insert(session_id.to_string(), handle);
    }

    /// Recompute the session's mode from its transcript.
    pub async fn update_session_mode(&self, session_id: &str) -> Option<Session> {
        let transcript_path = {
            let inner = self.lock();
            inner.sessions.get(session_id)?.transcript_path.clone()
        }?;

        let detected = tokio::task::spawn_blocking(move || {
            crate::mode::detect_mode_from_file(&transcript_path)
        })
        .await
        .ok()?;

        let mut inner = self.lock();
        let session = inner.sessions.get_mut(session_id)?;
        if let Some(mode) = detected
            && session.mode != Some(mode)
        {
            session.mode = Some(mode);
            let snapshot = session.clone();
            self.emit_update(&snapshot);
            return Some(snapshot);
        }
        Some(session.clone())
    }

    /// Overwrite divergence fields; emits only when something changed.
    pub fn update_git_divergence(
        &self,
        session_id: &str,
        ahead: Option<u32>,
        behind: Option<u32>,
        dirty: Option<bool>,
    ) -> bool {
        let mut inner = self.lock();
        let Some(session) = inner.sessions.get_mut(session_id) else {
            return false;
        };
        let changed = session.git_ahead != ahead
            || session.git_behind != behind
            || session.git_dirty != dirty;
        if changed {
            session.git_ahead = ahead;
            session.git_behind = behind;
            session.git_dirty = dirty;
            let snapshot = session.clone();
            self.emit_update(&snapshot);
        }
        changed
    }

    /// Set the bypass flag observed by the process monitor.
    pub fn update_bypass(&self, session_id: &str, is_bypass: bool) {
        let mut inner = self.lock();
        let Some(session) = inner.sessions.get_mut(session_id) else {
            return;
        };
        if session.is_bypass != is_bypass {
            session.is_bypass = is_bypass;
            let snapshot = session.clone();
            self.emit_update(&snapshot);
        }
    }

    // --- Removal ---

    /// Remove a session: cancel its timer, mark it recently ended, run the
    /// removal hooks, delete, and shift focus to the most recently active
    /// remaining session.
    pub fn unregister_session(&self, session_id: &str) -> Option<Session> {
        let mut inner = self.lock();
        self.remove_locked(&mut inner, session_id)
    }

    fn remove_locked(
        &self,
        inner: &mut RegistryInner,
        session_id: &str,
    ) -> Option<Session> {
        self.cancel_awaiting_timer(inner, session_id);
        let session = inner.sessions.get(session_id)?.clone();

        inner.recently_ended.mark(session_id);
        for hook in &inner.removal_hooks {
            if std::panic::catch_unwind(AssertUnwindSafe(|| hook(&session))).is_err() {
                warn!(
                    event = "core.registry.removal_hook_panicked",
                    session_id = session_id,
                );
            }
        }
        inner.sessions.remove(session_id);
        info!(
            event = "core.registry.session_unregistered",
            session_id = session_id,
        );
        self.emit(RegistryEvent::SessionRemoved {
            session_id: session_id.to_string(),
        });

        if inner.focused_session_id.as_deref() == Some(session_id) {
            let next = inner
                .sessions
                .values()
                .max_by_key(|s| s.last_activity)
                .map(|s| s.session_id.clone());
            self.set_focus_locked(inner, next);
        }
        Some(session)
    }

    /// Remove prior sessions that belong to the same terminal.
    ///
    /// A prior session is stale iff its terminal key matches the new key, or
    /// both have a known pid and the pids are equal. Covers same-tab
    /// relaunch, `/clear`, and compaction restarts uniformly.
    fn remove_stale_for_terminal(
        &self,
        inner: &mut RegistryInner,
        new_session_id: &str,
        new_key: &str,
        new_pid: Option<u32>,
    ) {
        // Identity-less sessions all share the `UNKNOWN` key; they only
        // reconcile through pid equality.
        let key_is_usable = new_key != "UNKNOWN";
        let stale: Vec<String> = inner
            .sessions
            .values()
            .filter(|existing| existing.session_id != new_session_id)
            .filter(|existing| {
                (key_is_usable && terminal::matches(&existing.terminal_key, new_key))
                    || matches!((existing.known_pid(), new_pid), (Some(a), Some(b)) if a == b)
            })
            .map(|existing| existing.session_id.clone())
            .collect();
        for session_id in stale {
            info!(
                event = "core.registry.stale_session_replaced",
                session_id = %session_id,
                replaced_by = new_session_id,
            );
            self.remove_locked(inner, &session_id);
        }
    }

    // --- Focus ---

    pub fn get_focused_session_id(&self) -> Option<String> {
        self.lock().focused_session_id.clone()
    }

    /// Set focus. Ignored when the id is unknown.
    pub fn set_focused_session(&self, session_id: Option<&str>) {
        let mut inner = self.lock();
        if let Some(id) = session_id
            && !inner.sessions.contains_key(id)
        {
            return;
        }
        self.set_focus_locked(&mut inner, session_id.map(str::to_string));
    }

    fn set_focus_locked(&self, inner: &mut RegistryInner, session_id: Option<String>) {
        if inner.focused_session_id == session_id {
            return;
        }
        inner.focused_session_id = session_id.clone();
        let session = session_id
            .as_deref()
            .and_then(|id| inner.sessions.get(id))
            .map(|s| Box::new(s.clone()));
        self.emit(RegistryEvent::FocusChanged {
            session_id,
            session,
        });
    }

    // --- Accessors ---

    pub fn get_session(&self, session_id: &str) -> Option<Session> {
        self.lock().sessions.get(session_id).cloned()
    }

    /// All sessions, most recently active first.
    pub fn get_all_sessions(&self) -> Vec<Session> {
        let inner = self.lock();
        let mut sessions: Vec<Session> = inner.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        sessions
    }

    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Find a session whose terminal key canonically matches `key`.
    pub fn find_session_by_terminal_key(&self, key: &str) -> Option<Session> {
        let inner = self.lock();
        inner
            .sessions
            .values()
            .find(|session| terminal::matches(&session.terminal_key, key))
            .cloned()
    }

    /// Expect a bypass session to appear in this cwd within the next minute.
    pub fn mark_pending_bypass(&self, cwd: &Path) {
        self.lock().pending_bypass.mark(cwd);
    }

    /// Whether a session id was removed within the quarantine window.
    pub fn was_recently_ended(&self, session_id: &str) -> bool {
        self.lock().recently_ended.was_recently_ended(session_id)
    }

    /// Remove every session through the normal removal path.
    pub fn clear(&self) {
        let mut inner = self.lock();
        let ids: Vec<String> = inner.sessions.keys().cloned().collect();
        for id in ids {
            self.remove_locked(&mut inner, &id);
        }
    }

    /// Cancel all awaiting timers. Called on shutdown.
    pub fn stop(&self) {
        let mut inner = self.lock();
        for (_, handle) in inner.awaiting_timers.drain() {
            handle.abort();
        }
    }

    fn cancel_awaiting_timer(&self, inner: &mut RegistryInner, session_id: &str) {
        if let Some(handle) = inner.awaiting_timers.remove(session_id) {
            handle.abort();
        }
    }
}

/// Apply a hook-reported permission mode to a session. Returns whether
/// anything changed.
///
/// `bypassPermissions` only sets `is_bypass` — mode for bypass sessions
/// comes from the transcript scan, and hooks are unreliable there, so a
/// bypass session accepts only `plan` from hooks.
fn apply_permission_mode(session: &mut Session, mode: Option<PermissionMode>) -> bool {
    let Some(mode) = mode else {
        return false;
    };
    match mode {
        PermissionMode::BypassPermissions => {
            if !session.is_bypass {
                session.is_bypass = true;
                return true;
            }
            false
        }
        PermissionMode::Plan => set_mode(session, SessionMode::Plan),
        PermissionMode::AcceptEdits if !session.is_bypass => {
            set_mode(session, SessionMode::AcceptEdits)
        }
        PermissionMode::Default | PermissionMode::DontAsk if !session.is_bypass => {
            set_mode(session, SessionMode::Default)
        }
        _ => false,
    }
}

fn set_mode(session: &mut Session, mode: SessionMode) -> bool {
    if session.mode != Some(mode) {
        session.mode = Some(mode);
        true
    } else {
        false
    }
}

/// Fill partial statusline metrics with the documented defaults.
fn merged_metrics(update: &ContextMetricsUpdate) -> ContextMetrics {
    ContextMetrics {
        used_percentage: update.used_percentage.unwrap_or(0.0),
        remaining_percentage: update.remaining_percentage.unwrap_or(100.0),
        context_window_size: update.context_window_size.unwrap_or(0),
        total_input_tokens: update.total_input_tokens.unwrap_or(0),
        total_output_tokens: update.total_output_tokens.unwrap_or(0),
        is_estimate: update.is_estimate.unwrap_or(false),
    }
}
