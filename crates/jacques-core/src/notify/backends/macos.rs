//! macOS notification backend.
//!
//! Prefers `terminal-notifier` (observable clicks); falls back to an
//! `osascript` fire-and-forget `display notification`.

use crate::notify::errors::NotifyError;
use crate::notify::traits::{NotifierBackend, NotifyResponse};

pub struct MacosNotifierBackend;

impl MacosNotifierBackend {
    fn has_terminal_notifier() -> bool {
        which::which("terminal-notifier").is_ok()
    }
}

impl NotifierBackend for MacosNotifierBackend {
    fn name(&self) -> &'static str {
        "macos"
    }

    fn is_available(&self) -> bool {
        cfg!(target_os = "macos")
    }

    fn send(&self, title: &str, body: &str, wait: bool) -> Result<NotifyResponse, NotifyError> {
        if Self::has_terminal_notifier() {
            let output = std::process::Command::new("terminal-notifier")
                .args(["-title", title, "-message", body, "-actions", "Focus"])
                .output()
                .map_err(|e| NotifyError::SendFailed {
                    message: format!("terminal-notifier exec failed: {}", e),
                })?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(NotifyError::SendFailed {
                    message: format!("terminal-notifier exit {}: {}", output.status, stderr.trim()),
                });
            }
            if wait {
                let stdout = String::from_utf8_lossy(&output.stdout);
                if stdout.contains("@ACTIONCLICKED") || stdout.trim() == "Focus" {
                    return Ok(NotifyResponse::Activated);
                }
                return Ok(NotifyResponse::Dismissed);
            }
            return Ok(NotifyResponse::NoResponse);
        }

        // osascript cannot report clicks; fire and forget.
        let script = format!(
            "display notification {} with title {}",
            applescript_string(body),
            applescript_string(title),
        );
        let output = std::process::Command::new("osascript")
            .args(["-e", &script])
            .output()
            .map_err(|e| NotifyError::SendFailed {
                message: format!("osascript exec failed: {}", e),
            })?;
        if output.status.success() {
            Ok(NotifyResponse::NoResponse)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(NotifyError::SendFailed {
                message: format!("osascript exit {}: {}", output.status, stderr.trim()),
            })
        }
    }
}

/// Quote a value as an AppleScript string literal.
fn applescript_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
