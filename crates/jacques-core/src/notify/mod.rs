//! Notification engine.
//!
//! Threshold tracking, cooldown dedup, category gating, desktop dispatch,
//! and the byte-offset bug-error scanner. Dispatch is best-effort
//! throughout: a failed toast or a throwing click handler logs a warning
//! and nothing more.

pub mod backends;
pub mod errors;
pub mod registry;
pub mod settings;
pub mod traits;

pub use errors::{ConfigError, NotifyError};
pub use registry::detect_backend;
pub use settings::NotificationSettings;
pub use traits::{NotifierBackend, NotifyResponse};

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use jacques_paths::JacquesPaths;
use jacques_protocol::{
    epoch_ms, ClaudeOperation, NotificationCategory, NotificationItem, NotificationPriority,
    Session,
};

use crate::mode;

/// Retained notification history size.
pub const HISTORY_CAP: usize = 50;

/// Cooldown for bug alerts.
pub const BUG_ALERT_COOLDOWN: Duration = Duration::from_secs(120);

/// Cooldown for every other category.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

/// Context usage at or above this threshold escalates to high priority.
pub const HIGH_PRIORITY_CONTEXT_THRESHOLD: f64 = 70.0;

/// Bug-alert error count at or above this escalates to high priority.
pub const HIGH_PRIORITY_ERROR_COUNT: u32 = 10;

/// Per-session debounce for plan detection runs.
pub const PLAN_CHECK_DEBOUNCE: Duration = Duration::from_secs(30);

/// Events published by the engine.
#[derive(Debug, Clone)]
pub enum NotifyEvent {
    Fired(NotificationItem),
    PlanReady { session_id: String, title: String },
    HandoffReady { session_id: String, path: PathBuf },
}

type FocusCallback = Arc<dyn Fn(&str) -> Result<(), String> + Send + Sync>;

#[derive(Debug, Default, Clone, Copy)]
struct ErrorTracker {
    last_size: u64,
    error_count: u32,
}

pub struct NotificationEngine {
    paths: Option<JacquesPaths>,
    settings: Mutex<NotificationSettings>,
    history: Mutex<VecDeque<NotificationItem>>,
    /// `(session_id, threshold bits)` pairs that already fired; permanent
    /// until the session is removed.
    fired_thresholds: Mutex<HashSet<(String, u64)>>,
    cooldowns: Mutex<HashMap<String, Instant>>,
    error_trackers: Mutex<HashMap<String, ErrorTracker>>,
    known_plans: Mutex<HashMap<String, HashSet<String>>>,
    plan_checks: Mutex<HashMap<String, Instant>>,
    backend: Arc<dyn NotifierBackend>,
    focus_callback: Mutex<Option<FocusCallback>>,
    /// Monotonic counter for dedup keys and ids; two plans arriving in the
    /// same instant never alias into one cooldown slot.
    counter: AtomicU64,
    events: broadcast::Sender<NotifyEvent>,
}

impl NotificationEngine {
    pub fn new(
        paths: Option<JacquesPaths>,
        settings: NotificationSettings,
        backend: Arc<dyn NotifierBackend>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(128);
        Arc::new(Self {
            paths,
            settings: Mutex::new(settings),
            history: Mutex::new(VecDeque::new()),
            fired_thresholds: Mutex::new(HashSet::new()),
            cooldowns: Mutex::new(HashMap::new()),
            error_trackers: Mutex::new(HashMap::new()),
            known_plans: Mutex::new(HashMap::new()),
            plan_checks: Mutex::new(HashMap::new()),
            backend,
            focus_callback: Mutex::new(None),
            counter: AtomicU64::new(0),
            events,
        })
    }

    /// Callback invoked when the user clicks a notification; errors are
    /// swallowed with a warning.
    pub fn set_focus_callback(
        &self,
        callback: impl Fn(&str) -> Result<(), String> + Send + Sync + 'static,
    ) {
        *lock(&self.focus_callback) = Some(Arc::new(callback));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotifyEvent> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> NotificationSettings {
        lock(&self.settings).clone()
    }

    /// Replace settings and persist them.
    pub fn update_settings(&self, settings: NotificationSettings) {
        *lock(&self.settings) = settings.clone();
        if let Some(paths) = &self.paths
            && let Err(e) = settings::save(paths, &settings)
        {
            warn!(event = "core.notify.settings_save_failed", error = %e);
        }
    }

    /// History snapshot, newest first.
    pub fn history(&self) -> Vec<NotificationItem> {
        lock(&self.history).iter().cloned().collect()
    }

    // --- Event entry points ---

    /// Fire once per crossed context threshold per session.
    pub fn on_context_update(&self, session: &Session) {
        let Some(metrics) = session.context_metrics.as_ref() else {
            return;
        };
        let thresholds = lock(&self.settings).context_thresholds.clone();
        for threshold in thresholds {
            if metrics.used_percentage < threshold {
                continue;
            }
            let key = (session.session_id.clone(), threshold.to_bits());
            if !lock(&self.fired_thresholds).insert(key) {
                continue;
            }
            let priority = if threshold >= HIGH_PRIORITY_CONTEXT_THRESHOLD {
                NotificationPriority::High
            } else {
                NotificationPriority::Medium
            };
            self.fire(
                NotificationCategory::Context,
                priority,
                format!("Context at {:.0}%", metrics.used_percentage),
                format!(
                    "{} crossed the {:.0}% context threshold",
                    session.project, threshold
                ),
                Some(session),
                Some(session.session_id.clone()),
                format!("{}", threshold),
            );
        }
    }

    pub fn on_plan_ready(&self, session_id: &str, title: &str) {
        let _ = self.events.send(NotifyEvent::PlanReady {
            session_id: session_id.to_string(),
            title: title.to_string(),
        });
        let extra = format!("{}", self.counter.fetch_add(1, Ordering::Relaxed));
        self.fire(
            NotificationCategory::Plan,
            NotificationPriority::Medium,
            "Plan ready".to_string(),
            title.to_string(),
            None,
            Some(session_id.to_string()),
            extra,
        );
    }

    pub fn on_handoff_ready(&self, session_id: &str, path: &Path) {
        let _ = self.events.send(NotifyEvent::HandoffReady {
            session_id: session_id.to_string(),
            path: path.to_path_buf(),
        });
        self.fire(
            NotificationCategory::Handoff,
            NotificationPriority::Medium,
            "Handoff ready".to_string(),
            path.display().to_string(),
            None,
            Some(session_id.to_string()),
            path.display().to_string(),
        );
    }

    /// Completed large operations only.
    pub fn on_claude_operation(&self, operation: &ClaudeOperation) {
        let threshold = lock(&self.settings).large_operation_threshold;
        if operation.phase != "complete" || operation.total_tokens < threshold {
            return;
        }
        self.fire(
            NotificationCategory::Operation,
            NotificationPriority::Medium,
            "Large operation complete".to_string(),
            operation
                .description
                .clone()
                .unwrap_or_else(|| format!("{} tokens", operation.total_tokens)),
            None,
            operation.session_id.clone(),
            String::new(),
        );
    }

    pub fn on_autocompact_warning(&self, session: &Session, body: String) {
        self.fire(
            NotificationCategory::AutoCompact,
            NotificationPriority::High,
            "Auto-compact imminent".to_string(),
            body,
            Some(session),
            Some(session.session_id.clone()),
            String::new(),
        );
    }

    /// Incremental JSONL error scan.
    ///
    /// Reads only the bytes appended since the previous call, counts
    /// assistant entries carrying an errored `tool_result`, and fires a bug
    /// alert when the running count crosses the configured threshold.
    pub fn scan_for_errors(&self, session_id: &str, jsonl_path: &Path) {
        let size = match std::fs::metadata(jsonl_path) {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                debug!(
                    event = "core.notify.error_scan_stat_failed",
                    path = %jsonl_path.display(),
                    error = %e,
                );
                return;
            }
        };

        let last_size = lock(&self.error_trackers)
            .get(session_id)
            .map(|t| t.last_size)
            .unwrap_or(0);
        if size <= last_size {
            return;
        }

        let delta = match read_from_offset(jsonl_path, last_size) {
            Ok(delta) => delta,
            Err(e) => {
                debug!(
                    event = "core.notify.error_scan_read_failed",
                    path = %jsonl_path.display(),
                    error = %e,
                );
                return;
            }
        };
        let new_errors = count_tool_errors(&delta);

        let (count, alert) = {
            let mut trackers = lock(&self.error_trackers);
            let tracker = trackers.entry(session_id.to_string()).or_default();
            tracker.last_size = size;
            tracker.error_count += new_errors;
            let count = tracker.error_count;
            let threshold = lock(&self.settings).bug_alert_threshold;
            let alert = count >= threshold;
            if alert {
                tracker.error_count = 0;
            }
            (count, alert)
        };

        if alert {
            let priority = if count >= HIGH_PRIORITY_ERROR_COUNT {
                NotificationPriority::High
            } else {
                NotificationPriority::Medium
            };
            self.fire(
                NotificationCategory::BugAlert,
                priority,
                "Repeated tool errors".to_string(),
                format!("{} tool errors in this session", count),
                None,
                Some(session_id.to_string()),
                String::new(),
            );
        }
    }

    /// Detect newly produced plans in a transcript (30 s per-session
    /// debounce) and fire `on_plan_ready` for each unseen title.
    pub fn check_for_new_plans(&self, session_id: &str, jsonl_path: &Path) {
        {
            let mut checks = lock(&self.plan_checks);
            if let Some(last) = checks.get(session_id)
                && last.elapsed() < PLAN_CHECK_DEBOUNCE
            {
                return;
            }
            checks.insert(session_id.to_string(), Instant::now());
        }

        let entries = match mode::read_entries(jsonl_path) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(
                    event = "core.notify.plan_check_read_failed",
                    path = %jsonl_path.display(),
                    error = %e,
                );
                return;
            }
        };
        let detection = mode::detect_mode_and_plans(&entries);

        let mut titles: Vec<String> = detection
            .plan_mode_completions
            .iter()
            .map(|completion| completion.title.clone())
            .collect();
        titles.extend(detection.plan_refs.iter().map(|r| r.title.clone()));

        let new_titles: Vec<String> = {
            let mut known = lock(&self.known_plans);
            let seen = known.entry(session_id.to_string()).or_default();
            titles
                .into_iter()
                .filter(|title| seen.insert(title.clone()))
                .collect()
        };
        for title in new_titles {
            info!(
                event = "core.notify.new_plan_detected",
                session_id = session_id,
                title = %title,
            );
            self.on_plan_ready(session_id, &title);
        }
    }

    /// Purge per-session state when a session leaves the registry.
    pub fn on_session_removed(&self, session_id: &str) {
        lock(&self.fired_thresholds).retain(|(id, _)| id != session_id);
        lock(&self.error_trackers).remove(session_id);
        lock(&self.known_plans).remove(session_id);
        lock(&self.plan_checks).remove(session_id);
    }

    // --- Dispatch ---

    #[allow(clippy::too_many_arguments)]
    fn fire(
        &self,
        category: NotificationCategory,
        priority: NotificationPriority,
        title: String,
        body: String,
        session: Option<&Session>,
        session_id: Option<String>,
        extra_key: String,
    ) {
        if !lock(&self.settings).category_enabled(category) {
            return;
        }

        let cooldown_key = format!(
            "{}:{}:{}",
            category.key(),
            session_id.as_deref().unwrap_or(""),
            extra_key,
        );
        {
            let mut cooldowns = lock(&self.cooldowns);
            let window = cooldown_for(category);
            if let Some(last) = cooldowns.get(&cooldown_key)
                && last.elapsed() < window
            {
                debug!(
                    event = "core.notify.suppressed_by_cooldown",
                    key = %cooldown_key,
                );
                return;
            }
            cooldowns.insert(cooldown_key, Instant::now());
        }

        let item = NotificationItem {
            id: uuid::Uuid::new_v4().to_string(),
            category,
            title,
            body,
            priority,
            timestamp: epoch_ms(),
            session_id: session_id.clone(),
            project_name: session.map(|s| s.project.clone()),
            branch_name: session.and_then(|s| s.git_branch.clone()),
        };

        {
            let mut history = lock(&self.history);
            history.push_front(item.clone());
            history.truncate(HISTORY_CAP);
        }
        info!(
            event = "core.notify.fired",
            category = category.key(),
            title = %item.title,
        );
        let _ = self.events.send(NotifyEvent::Fired(item.clone()));

        if lock(&self.settings).enabled {
            self.dispatch_desktop(item);
        }
    }

    /// Hand the notification to the OS notifier with wait semantics so
    /// clicks deliver a response. Runs off the caller's thread.
    fn dispatch_desktop(&self, item: NotificationItem) {
        let backend = Arc::clone(&self.backend);
        let callback = lock(&self.focus_callback).clone();
        let deliver = move || {
            let response = match backend.send(&item.title, &item.body, true) {
                Ok(response) => response,
                Err(e) => {
                    warn!(event = "core.notify.send_failed", error = %e);
                    return;
                }
            };
            if response != NotifyResponse::Activated {
                return;
            }
            let (Some(callback), Some(session_id)) = (callback, item.session_id.as_deref()) else {
                return;
            };
            if let Err(e) = callback(session_id) {
                warn!(
                    event = "core.notify.focus_callback_failed",
                    session_id = session_id,
                    error = %e,
                );
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = tokio::task::spawn_blocking(deliver).await;
                });
            }
            Err(_) => deliver(),
        }
    }
}

fn cooldown_for(category: NotificationCategory) -> Duration {
    match category {
        NotificationCategory::BugAlert => BUG_ALERT_COOLDOWN,
        _ => DEFAULT_COOLDOWN,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Read file contents from a byte offset to EOF.
fn read_from_offset(path: &Path, offset: u64) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buffer = String::new();
    file.read_to_string(&mut buffer)?;
    Ok(buffer)
}

/// Count assistant entries whose content includes an errored tool result.
fn count_tool_errors(delta: &str) -> u32 {
    let mut count = 0;
    for line in delta.lines() {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };
        if value.get("type").and_then(|t| t.as_str()) != Some("assistant") {
            continue;
        }
        let has_error = value
            .pointer("/message/content")
            .and_then(|content| content.as_array())
            .map(|blocks| {
                blocks.iter().any(|block| {
                    block.get("type").and_then(|t| t.as_str()) == Some("tool_result")
                        && block.get("is_error").and_then(|e| e.as_bool()) == Some(true)
                })
            })
            .unwrap_or(false);
        if has_error {
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use backends::NullNotifierBackend;
    use jacques_protocol::ContextMetrics;

    fn engine() -> Arc<NotificationEngine> {
        let mut settings = NotificationSettings::default();
        // Open every gate so tests observe all categories.
        for category in NotificationCategory::ALL {
            settings.categories.insert(category, true);
        }
        NotificationEngine::new(None, settings, Arc::new(NullNotifierBackend))
    }

    fn session_with_usage(id: &str, used: f64) -> Session {
        let mut session = crate::test_support::session(id);
        session.context_metrics = Some(ContextMetrics {
            used_percentage: used,
            remaining_percentage: 100.0 - used,
            context_window_size: 200_000,
            total_input_tokens: 0,
            total_output_tokens: 0,
            is_estimate: false,
        });
        session
    }

    #[tokio::test]
    async fn test_context_thresholds_fire_once_each() {
        let engine = engine();
        engine.on_context_update(&session_with_usage("S1", 75.0));

        let history = engine.history();
        assert_eq!(history.len(), 2);
        // Both thresholds crossed in one jump: 70 and 50.
        let priorities: Vec<_> = history.iter().map(|n| n.priority).collect();
        assert!(priorities.contains(&NotificationPriority::High));
        assert!(priorities.contains(&NotificationPriority::Medium));

        // A second update above both thresholds fires nothing new.
        engine.on_context_update(&session_with_usage("S1", 76.0));
        assert_eq!(engine.history().len(), 2);
    }

    #[tokio::test]
    async fn test_context_threshold_below_fires_nothing() {
        let engine = engine();
        engine.on_context_update(&session_with_usage("S1", 30.0));
        assert!(engine.history().is_empty());
    }

    #[tokio::test]
    async fn test_threshold_state_cleared_on_session_removal() {
        let engine = engine();
        engine.on_context_update(&session_with_usage("S1", 55.0));
        assert_eq!(engine.history().len(), 1);
        engine.on_session_removed("S1");
        // The fired-set was purged so thresholds can fire again for a new
        // session reusing the id; the 50% key is still inside its cooldown
        // window, so only the 70% threshold fires now.
        engine.on_context_update(&session_with_usage("S1", 90.0));
        assert_eq!(engine.history().len(), 2);
    }

    #[tokio::test]
    async fn test_category_gate_blocks() {
        let mut settings = NotificationSettings::default();
        settings
            .categories
            .insert(NotificationCategory::Plan, false);
        let engine = NotificationEngine::new(None, settings, Arc::new(NullNotifierBackend));
        engine.on_plan_ready("S1", "Some Plan");
        assert!(engine.history().is_empty());
    }

    #[tokio::test]
    async fn test_plan_ready_event_emitted_even_when_gated() {
        let mut settings = NotificationSettings::default();
        settings
            .categories
            .insert(NotificationCategory::Plan, false);
        let engine = NotificationEngine::new(None, settings, Arc::new(NullNotifierBackend));
        let mut rx = engine.subscribe();
        engine.on_plan_ready("S1", "Some Plan");
        assert!(matches!(rx.try_recv(), Ok(NotifyEvent::PlanReady { .. })));
    }

    #[tokio::test]
    async fn test_operation_filter() {
        let engine = engine();
        engine.on_claude_operation(&ClaudeOperation {
            session_id: Some("S1".to_string()),
            phase: "progress".to_string(),
            total_tokens: 100_000,
            description: None,
        });
        engine.on_claude_operation(&ClaudeOperation {
            session_id: Some("S1".to_string()),
            phase: "complete".to_string(),
            total_tokens: 10_000,
            description: None,
        });
        assert!(engine.history().is_empty());

        engine.on_claude_operation(&ClaudeOperation {
            session_id: Some("S1".to_string()),
            phase: "complete".to_string(),
            total_tokens: 60_000,
            description: Some("refactor".to_string()),
        });
        assert_eq!(engine.history().len(), 1);
    }

    #[tokio::test]
    async fn test_operation_cooldown_suppresses_repeat() {
        let engine = engine();
        let op = ClaudeOperation {
            session_id: Some("S1".to_string()),
            phase: "complete".to_string(),
            total_tokens: 60_000,
            description: None,
        };
        engine.on_claude_operation(&op);
        engine.on_claude_operation(&op);
        assert_eq!(engine.history().len(), 1);
    }

    #[tokio::test]
    async fn test_two_plans_in_same_instant_both_fire() {
        let engine = engine();
        engine.on_plan_ready("S1", "Plan A");
        engine.on_plan_ready("S1", "Plan B");
        assert_eq!(engine.history().len(), 2);
    }

    #[tokio::test]
    async fn test_scan_for_errors_counts_and_resets() {
        let engine = engine();
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("t.jsonl");

        let error_line = r#"{"type":"assistant","message":{"content":[{"type":"tool_result","is_error":true}]}}"#;
        let ok_line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"fine"}]}}"#;
        std::fs::write(&path, format!("{}\n{}\n", error_line, ok_line)).unwrap();
        engine.scan_for_errors("S1", &path);
        // 1 error < threshold 5: nothing yet.
        assert!(engine.history().is_empty());

        // Append four more errors; the scan reads only the delta.
        let mut content = std::fs::read_to_string(&path).unwrap();
        for _ in 0..4 {
            content.push_str(error_line);
            content.push('\n');
        }
        std::fs::write(&path, content).unwrap();
        engine.scan_for_errors("S1", &path);

        let history = engine.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].category, NotificationCategory::BugAlert);
        assert_eq!(history[0].priority, NotificationPriority::Medium);
        assert!(history[0].body.contains('5'));
    }

    #[tokio::test]
    async fn test_scan_for_errors_noop_when_file_unchanged() {
        let engine = engine();
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("t.jsonl");
        std::fs::write(
            &path,
            r#"{"type":"assistant","message":{"content":[{"type":"tool_result","is_error":true}]}}"#,
        )
        .unwrap();
        engine.scan_for_errors("S1", &path);
        engine.scan_for_errors("S1", &path);
        // One error counted once; threshold not reached either way.
        assert!(engine.history().is_empty());
    }

    #[tokio::test]
    async fn test_check_for_new_plans_dedups_titles() {
        let engine = engine();
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("t.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"EnterPlanMode","input":{}}]}}"#,
                "\n",
                r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"ExitPlanMode","input":{}}]}}"#,
                "\n",
            ),
        )
        .unwrap();
        engine.check_for_new_plans("S1", &path);
        let fired: Vec<_> = engine
            .history()
            .iter()
            .filter(|n| n.category == NotificationCategory::Plan)
            .cloned()
            .collect();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].body, "Plan Ready");
    }

    #[tokio::test]
    async fn test_plan_check_debounce_collapses_calls() {
        let engine = engine();
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("t.jsonl");
        std::fs::write(&path, "").unwrap();
        engine.check_for_new_plans("S1", &path);
        // The second call lands inside the debounce window; it must not
        // even read the file (which now does not parse).
        std::fs::write(&path, "garbage").unwrap();
        engine.check_for_new_plans("S1", &path);
    }

    #[tokio::test]
    async fn test_history_is_capped_newest_first() {
        let engine = engine();
        for i in 0..60 {
            engine.on_plan_ready("S1", &format!("Plan {}", i));
        }
        let history = engine.history();
        assert_eq!(history.len(), HISTORY_CAP);
        assert_eq!(history[0].body, "Plan 59");
    }

    #[test]
    fn test_count_tool_errors() {
        let delta = concat!(
            r#"{"type":"assistant","message":{"content":[{"type":"tool_result","is_error":true}]}}"#,
            "\n",
            r#"{"type":"user","message":{"content":[{"type":"tool_result","is_error":true}]}}"#,
            "\n",
            r#"{"type":"assistant","message":{"content":[{"type":"tool_result","is_error":false}]}}"#,
            "\n",
            "malformed line\n",
        );
        assert_eq!(count_tool_errors(delta), 1);
    }
}
