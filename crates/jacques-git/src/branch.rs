//! Branch-level queries: default branch, divergence, dirtiness.

use std::path::Path;

use tracing::debug;

use crate::errors::GitError;
use crate::runner::{run_git, validate_git_arg, PROBE_TIMEOUT, STATUS_TIMEOUT};

/// Resolve the repository's default branch.
///
/// Resolution order:
/// 1. `symbolic-ref refs/remotes/origin/HEAD` (what origin calls HEAD)
/// 2. a local `refs/heads/main`
/// 3. fallback `master`
pub async fn default_branch(repo_root: &Path) -> String {
    let origin_head = run_git(
        repo_root,
        &["symbolic-ref", "refs/remotes/origin/HEAD"],
        PROBE_TIMEOUT,
    )
    .await;
    if let Ok(out) = origin_head
        && out.success
        && let Some(name) = out.stdout_trimmed().strip_prefix("refs/remotes/origin/")
        && !name.is_empty()
    {
        return name.to_string();
    }

    let local_main = run_git(
        repo_root,
        &["rev-parse", "--verify", "--quiet", "refs/heads/main"],
        PROBE_TIMEOUT,
    )
    .await;
    if let Ok(out) = local_main
        && out.success
    {
        return "main".to_string();
    }

    debug!(
        event = "git.default_branch_fallback",
        repo = %repo_root.display(),
    );
    "master".to_string()
}

/// Commits the branch is ahead of / behind the default branch.
///
/// Uses `rev-list --left-right --count <default>...<branch>`: the left count
/// is commits only on the default branch (behind), the right count commits
/// only on the branch (ahead).
pub async fn ahead_behind(
    repo_root: &Path,
    branch: &str,
    default: &str,
) -> Result<(u32, u32), GitError> {
    validate_git_arg(branch, "branch name")?;
    validate_git_arg(default, "default branch")?;

    let range = format!("{}...{}", default, branch);
    let out = run_git(
        repo_root,
        &["rev-list", "--left-right", "--count", &range],
        STATUS_TIMEOUT,
    )
    .await?;

    if !out.success {
        return Err(GitError::OperationFailed {
            message: format!("rev-list failed: {}", out.stderr_trimmed()),
        });
    }

    let mut parts = out.stdout_trimmed().split_whitespace();
    let behind = parts
        .next()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(0);
    let ahead = parts
        .next()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(0);
    Ok((ahead, behind))
}

/// Whether the working tree or index at `dir` has any modifications.
pub async fn is_dirty(dir: &Path) -> Result<bool, GitError> {
    let out = run_git(dir, &["status", "--porcelain"], STATUS_TIMEOUT).await?;
    if !out.success {
        return Err(GitError::OperationFailed {
            message: format!("git status failed: {}", out.stderr_trimmed()),
        });
    }
    Ok(!out.stdout.trim().is_empty())
}

/// The branch currently checked out at `dir`, if HEAD is on a branch.
pub async fn head_branch(dir: &Path) -> Result<Option<String>, GitError> {
    let out = run_git(dir, &["symbolic-ref", "--short", "HEAD"], PROBE_TIMEOUT).await?;
    if out.success {
        let name = out.stdout_trimmed();
        if !name.is_empty() {
            return Ok(Some(name.to_string()));
        }
    }
    Ok(None)
}

/// Resolve the repository toplevel containing `path`.
pub async fn repo_toplevel(path: &Path) -> Result<std::path::PathBuf, GitError> {
    let out = run_git(path, &["rev-parse", "--show-toplevel"], PROBE_TIMEOUT).await?;
    if !out.success {
        return Err(GitError::NotInRepository {
            path: path.display().to_string(),
        });
    }
    Ok(std::path::PathBuf::from(out.stdout_trimmed()))
}

/// Delete a local branch. `force` switches `-d` to `-D`.
pub async fn delete_branch(repo_root: &Path, branch: &str, force: bool) -> Result<(), GitError> {
    validate_git_arg(branch, "branch name")?;

    let flag = if force { "-D" } else { "-d" };
    let out = run_git(
        repo_root,
        &["branch", flag, branch],
        crate::runner::MUTATION_TIMEOUT,
    )
    .await?;

    if out.success {
        Ok(())
    } else {
        Err(GitError::OperationFailed {
            message: out.stderr_trimmed().to_string(),
        })
    }
}
