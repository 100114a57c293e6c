use serde::{Deserialize, Serialize};

/// Notification category; each category can be gated off in settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationCategory {
    Context,
    Operation,
    Plan,
    AutoCompact,
    Handoff,
    BugAlert,
}

impl NotificationCategory {
    pub const ALL: [NotificationCategory; 6] = [
        NotificationCategory::Context,
        NotificationCategory::Operation,
        NotificationCategory::Plan,
        NotificationCategory::AutoCompact,
        NotificationCategory::Handoff,
        NotificationCategory::BugAlert,
    ];

    /// The wire/config key for this category (kebab-case).
    pub fn key(&self) -> &'static str {
        match self {
            NotificationCategory::Context => "context",
            NotificationCategory::Operation => "operation",
            NotificationCategory::Plan => "plan",
            NotificationCategory::AutoCompact => "auto-compact",
            NotificationCategory::Handoff => "handoff",
            NotificationCategory::BugAlert => "bug-alert",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// One dispatched notification, retained in the capped history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationItem {
    pub id: String,
    pub category: NotificationCategory,
    pub title: String,
    pub body: String,
    pub priority: NotificationPriority,
    /// Dispatch time, ms epoch.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
}

/// A long-running agent operation observed by the front-ends.
///
/// The notification engine only fires for completed operations at or above
/// the configured token threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaudeOperation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Lifecycle phase, e.g. `start`, `progress`, `complete`.
    pub phase: String,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
