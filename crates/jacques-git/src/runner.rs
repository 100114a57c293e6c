//! Bounded git command execution.
//!
//! Every git invocation in Jacques goes through [`run_git`], which enforces a
//! deadline and kills the child on timeout. The git working tree is shared
//! with the user, so the wrappers here issue only read-like queries plus the
//! worktree/branch mutations the user explicitly requested.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::GitError;

/// Deadline for cheap plumbing probes (`rev-parse`, `symbolic-ref`,
/// `merge-base --is-ancestor`).
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Deadline for status-class queries (`status --porcelain`, `rev-list`,
/// `worktree list`).
pub const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline for worktree mutations (`worktree add/remove`, `branch -d`).
pub const MUTATION_TIMEOUT: Duration = Duration::from_secs(15);

/// Completed git command output.
#[derive(Debug)]
pub struct GitOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    /// stdout with trailing whitespace trimmed.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// stderr with surrounding whitespace trimmed.
    pub fn stderr_trimmed(&self) -> &str {
        self.stderr.trim()
    }
}

/// Validate a value passed as a git positional argument.
///
/// Rejects values that could be parsed as flags or smuggle refspec tricks.
pub fn validate_git_arg(value: &str, what: &str) -> Result<(), GitError> {
    if value.starts_with('-') {
        return Err(GitError::InvalidArgument {
            what: what.to_string(),
            message: "must not start with '-'".to_string(),
        });
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(GitError::InvalidArgument {
            what: what.to_string(),
            message: "must not contain control characters".to_string(),
        });
    }
    if value.contains("::") {
        return Err(GitError::InvalidArgument {
            what: what.to_string(),
            message: "must not contain '::'".to_string(),
        });
    }
    Ok(())
}

/// Run `git <args>` in `dir` with the given deadline.
///
/// A non-zero exit is not an error at this layer — callers classify stderr.
/// Timeout kills the child and returns [`GitError::Timeout`].
pub async fn run_git(dir: &Path, args: &[&str], deadline: Duration) -> Result<GitOutput, GitError> {
    debug!(
        event = "git.command_started",
        args = ?args,
        dir = %dir.display(),
    );

    let child = tokio::process::Command::new("git")
        .current_dir(dir)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| GitError::OperationFailed {
            message: format!("Failed to execute git in {}: {}", dir.display(), e),
        })?;

    let output = match tokio::time::timeout(deadline, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| GitError::IoError { source: e })?,
        Err(_) => {
            warn!(
                event = "git.command_timeout",
                args = ?args,
                dir = %dir.display(),
                seconds = deadline.as_secs(),
            );
            return Err(GitError::Timeout {
                command: args.join(" "),
                seconds: deadline.as_secs(),
            });
        }
    };

    Ok(GitOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_git_arg_rejects_dash_prefix() {
        let result = validate_git_arg("--evil", "branch");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("'-'"));
    }

    #[test]
    fn test_validate_git_arg_rejects_control_chars() {
        assert!(validate_git_arg("a\x00b", "branch").is_err());
    }

    #[test]
    fn test_validate_git_arg_rejects_double_colon() {
        assert!(validate_git_arg("refs::heads", "refspec").is_err());
    }

    #[test]
    fn test_validate_git_arg_accepts_valid_values() {
        assert!(validate_git_arg("main", "branch").is_ok());
        assert!(validate_git_arg("feature-auth_2", "branch").is_ok());
    }

    #[tokio::test]
    async fn test_run_git_reports_version() {
        let out = run_git(Path::new("."), &["--version"], PROBE_TIMEOUT)
            .await
            .unwrap();
        assert!(out.success);
        assert!(out.stdout.contains("git version"));
    }

    #[tokio::test]
    async fn test_run_git_nonzero_exit_is_not_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let out = run_git(tmp.path(), &["rev-parse", "--show-toplevel"], PROBE_TIMEOUT)
            .await
            .unwrap();
        assert!(!out.success);
        assert!(!out.stderr.is_empty());
    }
}
