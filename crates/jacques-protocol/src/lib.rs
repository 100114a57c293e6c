//! Shared domain and wire types for Jacques.
//!
//! Everything that crosses a process boundary lives here: the canonical
//! [`Session`] model, hook events posted by agents, WebSocket messages
//! exchanged with dashboard clients, and notification items. Owned types
//! only (`String`, `PathBuf`) so values can be serialized, stored, and sent
//! across boundaries.

pub mod hooks;
pub mod messages;
pub mod notifications;
pub mod scan;
pub mod session;

pub use hooks::{
    ActivityEvent, ContextMetricsUpdate, ContextUpdateEvent, HookEvent, IdleEvent,
    PreToolUseEvent, SessionStartEvent,
};
pub use messages::{ClientMessage, ServerMessage, TriggerAction, WorktreeEntry, WorktreeStatus};
pub use notifications::{
    ClaudeOperation, NotificationCategory, NotificationItem, NotificationPriority,
};
pub use scan::DetectedSession;
pub use session::{
    Autocompact, ContextMetrics, ModelInfo, PermissionMode, Session, SessionMode, SessionSource,
    SessionStatus, TerminalIdentity, WorkspaceInfo,
};

/// Current epoch milliseconds.
pub fn epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
