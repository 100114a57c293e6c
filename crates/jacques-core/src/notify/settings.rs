//! Notification settings: defaults, file overlay, atomic persistence.
//!
//! Settings live under the `notifications` key of `~/.jacques/config.json`.
//! Loading merges file values over built-in defaults so a partial file (or
//! no file at all) always yields a complete settings record.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use jacques_paths::JacquesPaths;
use jacques_protocol::NotificationCategory;

use super::errors::ConfigError;

/// Completed-operation token floor for `operation` notifications.
pub const DEFAULT_LARGE_OPERATION_THRESHOLD: u64 = 50_000;

/// Context-usage percentages that fire a notification once each.
pub const DEFAULT_CONTEXT_THRESHOLDS: [f64; 2] = [50.0, 70.0];

/// Assistant tool errors accumulated before a bug alert fires.
pub const DEFAULT_BUG_ALERT_THRESHOLD: u32 = 5;

const DEFAULT_CATEGORY_GATES: [(NotificationCategory, bool); 6] = [
    (NotificationCategory::Context, true),
    (NotificationCategory::Operation, false),
    (NotificationCategory::Plan, true),
    (NotificationCategory::Handoff, true),
    (NotificationCategory::AutoCompact, true),
    (NotificationCategory::BugAlert, false),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub enabled: bool,
    pub categories: HashMap<NotificationCategory, bool>,
    pub context_thresholds: Vec<f64>,
    pub large_operation_threshold: u64,
    pub bug_alert_threshold: u32,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            categories: DEFAULT_CATEGORY_GATES.into_iter().collect(),
            context_thresholds: DEFAULT_CONTEXT_THRESHOLDS.to_vec(),
            large_operation_threshold: DEFAULT_LARGE_OPERATION_THRESHOLD,
            bug_alert_threshold: DEFAULT_BUG_ALERT_THRESHOLD,
        }
    }
}

impl NotificationSettings {
    /// Category gate with built-in fallback for keys missing from the map.
    pub fn category_enabled(&self, category: NotificationCategory) -> bool {
        self.categories.get(&category).copied().unwrap_or_else(|| {
            DEFAULT_CATEGORY_GATES
                .iter()
                .find(|(c, _)| *c == category)
                .map(|(_, enabled)| *enabled)
                .unwrap_or(false)
        })
    }
}

/// Partial settings as found on disk; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SettingsOverlay {
    enabled: Option<bool>,
    categories: Option<HashMap<NotificationCategory, bool>>,
    context_thresholds: Option<Vec<f64>>,
    large_operation_threshold: Option<u64>,
    bug_alert_threshold: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigOverlay {
    notifications: Option<SettingsOverlay>,
}

/// On-disk shape for writes.
#[derive(Debug, Serialize)]
struct ConfigFile<'a> {
    notifications: &'a NotificationSettings,
}

/// Merge an overlay into defaults. Category entries override per key;
/// missing keys keep their defaults.
fn merge(overlay: SettingsOverlay) -> NotificationSettings {
    let mut settings = NotificationSettings::default();
    if let Some(enabled) = overlay.enabled {
        settings.enabled = enabled;
    }
    if let Some(categories) = overlay.categories {
        for (category, enabled) in categories {
            settings.categories.insert(category, enabled);
        }
    }
    if let Some(thresholds) = overlay.context_thresholds {
        settings.context_thresholds = thresholds;
    }
    if let Some(threshold) = overlay.large_operation_threshold {
        settings.large_operation_threshold = threshold;
    }
    if let Some(threshold) = overlay.bug_alert_threshold {
        settings.bug_alert_threshold = threshold;
    }
    settings
}

/// Load settings, merging the config file over defaults.
///
/// A missing file is the normal first-run case; an unparseable file logs a
/// warning and yields defaults rather than taking the server down.
pub fn load(paths: &JacquesPaths) -> NotificationSettings {
    let path = paths.config_file();
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(event = "core.notify.config_missing", path = %path.display());
            return NotificationSettings::default();
        }
        Err(e) => {
            warn!(
                event = "core.notify.config_read_failed",
                path = %path.display(),
                error = %e,
            );
            return NotificationSettings::default();
        }
    };
    match serde_json::from_str::<ConfigOverlay>(&content) {
        Ok(overlay) => merge(overlay.notifications.unwrap_or_default()),
        Err(e) => {
            warn!(
                event = "core.notify.config_parse_failed",
                path = %path.display(),
                error = %e,
            );
            NotificationSettings::default()
        }
    }
}

/// Persist settings atomically: write a temp sibling, then rename.
pub fn save(paths: &JacquesPaths, settings: &NotificationSettings) -> Result<(), ConfigError> {
    let path = paths.config_file();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFailed {
            path: path.display().to_string(),
            source: e,
        })?;
    }
    let content = serde_json::to_string_pretty(&ConfigFile {
        notifications: settings,
    })?;
    let tmp = paths.config_tmp_file();
    std::fs::write(&tmp, content).map_err(|e| ConfigError::WriteFailed {
        path: tmp.display().to_string(),
        source: e,
    })?;
    std::fs::rename(&tmp, &path).map_err(|e| ConfigError::WriteFailed {
        path: path.display().to_string(),
        source: e,
    })?;
    debug!(event = "core.notify.config_saved", path = %path.display());
    Ok(())
}
