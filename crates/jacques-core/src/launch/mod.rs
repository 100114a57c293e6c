//! Agent session launching.
//!
//! Jacques never controls agent processes it tracks, but it can start new
//! ones on request. The trait seam keeps the engine testable; the process
//! implementation spawns a detached agent in the requested directory.

use std::path::Path;

use tracing::info;

use crate::scanner::BYPASS_FLAG;

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Working directory does not exist: {path}")]
    MissingDirectory { path: String },

    #[error("Failed to launch agent: {message}")]
    SpawnFailed { message: String },
}

pub trait SessionLauncher: Send + Sync {
    /// Launch an agent in `cwd`; returns the new process id.
    fn launch(&self, cwd: &Path, dangerously_skip_permissions: bool) -> Result<u32, LaunchError>;
}

/// Launches the agent binary as a detached child process.
pub struct ProcessLauncher {
    pub agent_binary: String,
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self {
            agent_binary: "claude".to_string(),
        }
    }
}

impl SessionLauncher for ProcessLauncher {
    fn launch(&self, cwd: &Path, dangerously_skip_permissions: bool) -> Result<u32, LaunchError> {
        if !cwd.is_dir() {
            return Err(LaunchError::MissingDirectory {
                path: cwd.display().to_string(),
            });
        }
        let mut cmd = std::process::Command::new(&self.agent_binary);
        cmd.current_dir(cwd)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());
        if dangerously_skip_permissions {
            cmd.arg(BYPASS_FLAG);
        }
        let child = cmd.spawn().map_err(|e| LaunchError::SpawnFailed {
            message: e.to_string(),
        })?;
        let pid = child.id();
        info!(
            event = "core.launch.session_launched",
            pid = pid,
            cwd = %cwd.display(),
            bypass = dangerously_skip_permissions,
        );
        Ok(pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_missing_directory_is_rejected() {
        let launcher = ProcessLauncher::default();
        let result = launcher.launch(Path::new("/nonexistent/dir"), false);
        assert!(matches!(result, Err(LaunchError::MissingDirectory { .. })));
    }

    #[test]
    fn test_launch_spawns_binary() {
        let tmp = tempfile::TempDir::new().unwrap();
        let launcher = ProcessLauncher {
            agent_binary: "true".to_string(),
        };
        let pid = launcher.launch(tmp.path(), false).unwrap();
        assert!(pid > 0);
    }

    #[test]
    fn test_launch_unknown_binary_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        let launcher = ProcessLauncher {
            agent_binary: "definitely-not-a-real-binary-xyz".to_string(),
        };
        assert!(matches!(
            launcher.launch(tmp.path(), true),
            Err(LaunchError::SpawnFailed { .. })
        ));
    }
}
