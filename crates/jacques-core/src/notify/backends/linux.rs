//! Linux notification backend using notify-send (libnotify).

use crate::notify::errors::NotifyError;
use crate::notify::traits::{NotifierBackend, NotifyResponse};

/// Action name passed to `notify-send -A`; echoed on stdout when clicked.
const FOCUS_ACTION: &str = "focus";

pub struct LinuxNotifierBackend;

impl NotifierBackend for LinuxNotifierBackend {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn is_available(&self) -> bool {
        cfg!(target_os = "linux") && which::which("notify-send").is_ok()
    }

    fn send(&self, title: &str, body: &str, wait: bool) -> Result<NotifyResponse, NotifyError> {
        let mut cmd = std::process::Command::new("notify-send");
        cmd.arg(title).arg(body);
        if wait {
            // --wait blocks until the notification closes; -A prints the
            // chosen action name to stdout.
            cmd.arg("--wait")
                .arg(format!("-A{}=Focus", FOCUS_ACTION));
        }

        let output = cmd.output().map_err(|e| NotifyError::SendFailed {
            message: format!("notify-send exec failed: {}", e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NotifyError::SendFailed {
                message: format!("notify-send exit {}: {}", output.status, stderr.trim()),
            });
        }

        if !wait {
            return Ok(NotifyResponse::NoResponse);
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim() == FOCUS_ACTION {
            Ok(NotifyResponse::Activated)
        } else {
            Ok(NotifyResponse::Dismissed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linux_backend_name() {
        assert_eq!(LinuxNotifierBackend.name(), "linux");
    }

    #[test]
    fn test_linux_backend_availability_matches_platform() {
        if !cfg!(target_os = "linux") {
            assert!(!LinuxNotifierBackend.is_available());
        }
    }
}
