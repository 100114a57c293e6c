//! Agent process discovery.
//!
//! Enumerates live agent processes through `sysinfo` and maps each onto a
//! [`DetectedSession`]. Runs once at startup and again on demand; live
//! updates afterwards come from hooks, so the scanner only reports what the
//! OS can answer without touching any repository.

use std::path::Path;

use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, info};

use jacques_protocol::DetectedSession;

/// Executable names treated as agent processes.
const AGENT_PROCESS_NAMES: &[&str] = &["claude"];

/// Flag marking a bypass-permissions session on the command line.
pub const BYPASS_FLAG: &str = "--dangerously-skip-permissions";

/// Enumerate live agent processes.
pub fn scan() -> Vec<DetectedSession> {
    info!(event = "core.scanner.scan_started");

    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let mut detected = Vec::new();
    for (pid, process) in system.processes() {
        let name = process.name().to_string_lossy();
        if !AGENT_PROCESS_NAMES.iter().any(|n| name == *n) {
            continue;
        }

        let Some(cwd) = process.cwd() else {
            debug!(
                event = "core.scanner.process_skipped",
                pid = pid.as_u32(),
                reason = "no cwd",
            );
            continue;
        };
        if is_trashed(cwd) {
            debug!(
                event = "core.scanner.process_skipped",
                pid = pid.as_u32(),
                reason = "cwd in trash",
            );
            continue;
        }

        let cmdline: Vec<String> = process
            .cmd()
            .iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect();
        let env: Vec<(String, String)> = process
            .environ()
            .iter()
            .filter_map(|entry| {
                let entry = entry.to_string_lossy();
                entry
                    .split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
            })
            .collect();

        let pid_u32 = pid.as_u32();
        let identity = env_terminal_identity(&env);
        let session_id = env_value(&env, "CLAUDE_SESSION_ID")
            .map(str::to_string)
            .unwrap_or_else(|| format!("proc-{}", pid_u32));

        let mut session = DetectedSession::minimal(
            session_id,
            pid_u32,
            cwd.to_path_buf(),
            (process.start_time() as i64) * 1000,
        );
        session.project = cwd
            .file_name()
            .map(|leaf| leaf.to_string_lossy().to_string());
        session.tty = controlling_tty(pid_u32);
        session.is_bypass = has_bypass_flag(&cmdline);
        session.terminal_type = identity.as_ref().map(|(kind, _)| kind.to_string());
        session.terminal_session_id = identity.map(|(_, value)| value);

        detected.push(session);
    }

    info!(event = "core.scanner.scan_completed", count = detected.len());
    detected
}

/// Whether the command line carries the bypass-permissions flag.
pub fn has_bypass_flag(cmdline: &[String]) -> bool {
    cmdline.iter().any(|arg| arg == BYPASS_FLAG)
}

/// Whether a working directory sits inside a Trash folder.
///
/// Finder moves deleted project directories to `~/.Trash`; agents keep
/// running there and must not be surfaced.
pub fn is_trashed(cwd: &Path) -> bool {
    cwd.components()
        .any(|component| component.as_os_str() == ".Trash")
}

/// Terminal emulator identity from process environment variables.
///
/// Returns `(terminal_type, session_value)` for the richest variable
/// present, in the same priority order the key builder uses.
pub fn env_terminal_identity(env: &[(String, String)]) -> Option<(&'static str, String)> {
    const PROBES: &[(&str, &str)] = &[
        ("ITERM_SESSION_ID", "iterm"),
        ("KITTY_WINDOW_ID", "kitty"),
        ("WEZTERM_PANE", "wezterm"),
        ("WT_SESSION", "wt"),
        ("TERM_SESSION_ID", "term"),
    ];
    for (var, kind) in PROBES {
        if let Some(value) = env_value(env, var)
            && !value.is_empty()
        {
            return Some((kind, value.to_string()));
        }
    }
    None
}

fn env_value<'a>(env: &'a [(String, String)], key: &str) -> Option<&'a str> {
    env.iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Controlling TTY of a process, leaf name only (e.g. `ttys001`).
#[cfg(unix)]
fn controlling_tty(pid: u32) -> Option<String> {
    let output = std::process::Command::new("ps")
        .args(["-o", "tty=", "-p", &pid.to_string()])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let tty = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if tty.is_empty() || tty == "?" || tty == "??" {
        None
    } else {
        Some(tty)
    }
}

#[cfg(not(unix))]
fn controlling_tty(_pid: u32) -> Option<String> {
    None
}

/// Probe whether a process is still alive.
pub fn is_process_running(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[sysinfo::Pid::from_u32(pid)]), true);
    system.process(sysinfo::Pid::from_u32(pid)).is_some()
}

/// Probe whether a live process carries the bypass flag.
///
/// `None` when the process is gone.
pub fn process_bypass_flag(pid: u32) -> Option<bool> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[sysinfo::Pid::from_u32(pid)]), true);
    let process = system.process(sysinfo::Pid::from_u32(pid))?;
    let cmdline: Vec<String> = process
        .cmd()
        .iter()
        .map(|arg| arg.to_string_lossy().to_string())
        .collect();
    Some(has_bypass_flag(&cmdline))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_has_bypass_flag() {
        let cmdline = vec![
            "claude".to_string(),
            "--dangerously-skip-permissions".to_string(),
        ];
        assert!(has_bypass_flag(&cmdline));
        assert!(!has_bypass_flag(&["claude".to_string()]));
    }

    #[test]
    fn test_bypass_flag_must_match_exactly() {
        let cmdline = vec!["claude".to_string(), "--dangerously".to_string()];
        assert!(!has_bypass_flag(&cmdline));
    }

    #[test]
    fn test_is_trashed_detects_trash_component() {
        assert!(is_trashed(&PathBuf::from("/Users/me/.Trash/project")));
        assert!(is_trashed(&PathBuf::from("/Users/me/.Trash")));
        assert!(!is_trashed(&PathBuf::from("/Users/me/projects/app")));
        // Substring is not enough — the component itself must be .Trash.
        assert!(!is_trashed(&PathBuf::from("/Users/me/.Trashy/project")));
    }

    #[test]
    fn test_env_terminal_identity_priority() {
        let env = vec![
            ("WT_SESSION".to_string(), "guid-1".to_string()),
            ("ITERM_SESSION_ID".to_string(), "w0t0p0:UUID".to_string()),
        ];
        let (kind, value) = env_terminal_identity(&env).unwrap();
        assert_eq!(kind, "iterm");
        assert_eq!(value, "w0t0p0:UUID");
    }

    #[test]
    fn test_env_terminal_identity_skips_empty_values() {
        let env = vec![
            ("ITERM_SESSION_ID".to_string(), String::new()),
            ("KITTY_WINDOW_ID".to_string(), "5".to_string()),
        ];
        let (kind, _) = env_terminal_identity(&env).unwrap();
        assert_eq!(kind, "kitty");
    }

    #[test]
    fn test_env_terminal_identity_none_when_absent() {
        let env = vec![("PATH".to_string(), "/usr/bin".to_string())];
        assert!(env_terminal_identity(&env).is_none());
    }

    #[test]
    fn test_is_process_running_self() {
        assert!(is_process_running(std::process::id()));
        assert!(!is_process_running(999_999_999));
    }
}
