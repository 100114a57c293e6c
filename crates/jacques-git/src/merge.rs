//! Merge detection for worktree branches.
//!
//! `merge-base --is-ancestor` alone answers "is the branch tip reachable
//! from the default branch", which is true both after a real merge and when
//! the branch simply points at an old mainline commit. The first-parent walk
//! discriminates the two: a tip sitting on the default branch's first-parent
//! line carries no unique work and is not treated as merged.

use std::path::Path;

use tracing::debug;

use crate::errors::GitError;
use crate::runner::{run_git, validate_git_arg, PROBE_TIMEOUT, STATUS_TIMEOUT};

/// Whether `ancestor` is an ancestor of `descendant`.
pub async fn is_ancestor(
    repo_root: &Path,
    ancestor: &str,
    descendant: &str,
) -> Result<bool, GitError> {
    validate_git_arg(ancestor, "ancestor ref")?;
    validate_git_arg(descendant, "descendant ref")?;

    let out = run_git(
        repo_root,
        &["merge-base", "--is-ancestor", ancestor, descendant],
        PROBE_TIMEOUT,
    )
    .await?;
    // Exit 0 = ancestor, exit 1 = not; other failures surface via stderr.
    if !out.success && !out.stderr.trim().is_empty() {
        return Err(GitError::OperationFailed {
            message: out.stderr_trimmed().to_string(),
        });
    }
    Ok(out.success)
}

/// Resolve a ref to its commit sha.
pub async fn rev_parse(repo_root: &Path, reference: &str) -> Result<String, GitError> {
    validate_git_arg(reference, "ref")?;
    let out = run_git(
        repo_root,
        &["rev-parse", "--verify", reference],
        PROBE_TIMEOUT,
    )
    .await?;
    if !out.success {
        return Err(GitError::OperationFailed {
            message: format!("rev-parse {} failed: {}", reference, out.stderr_trimmed()),
        });
    }
    Ok(out.stdout_trimmed().to_string())
}

/// Whether `branch` has been merged into `default` via a merge commit.
///
/// Three-step predicate:
/// 1. tip not an ancestor of default → not merged.
/// 2. tip appears on default's first-parent line → the branch points at an
///    old mainline commit, not merged.
/// 3. otherwise → merged.
pub async fn is_merged_to_default(
    repo_root: &Path,
    branch: &str,
    default: &str,
) -> Result<bool, GitError> {
    if !is_ancestor(repo_root, branch, default).await? {
        return Ok(false);
    }

    let tip = rev_parse(repo_root, branch).await?;
    let range = format!("{}^..{}", tip, default);
    let out = run_git(
        repo_root,
        &["rev-list", "--first-parent", &range],
        STATUS_TIMEOUT,
    )
    .await?;
    if !out.success {
        return Err(GitError::OperationFailed {
            message: format!("rev-list failed: {}", out.stderr_trimmed()),
        });
    }

    let on_first_parent_line = out.stdout.lines().any(|line| line.trim() == tip);
    debug!(
        event = "git.merge_check_completed",
        branch = branch,
        tip = %tip,
        on_first_parent_line = on_first_parent_line,
    );
    Ok(!on_first_parent_line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{commit_file, init_repo, run};

    #[tokio::test]
    async fn test_unmerged_branch_is_not_merged() {
        let tmp = tempfile::TempDir::new().unwrap();
        init_repo(tmp.path(), "main");
        commit_file(tmp.path(), "a.txt", "a", "initial");
        run(tmp.path(), &["checkout", "-b", "feat"]);
        commit_file(tmp.path(), "b.txt", "b", "feat work");
        run(tmp.path(), &["checkout", "main"]);

        assert!(!is_merged_to_default(tmp.path(), "feat", "main")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_merge_commit_branch_is_merged() {
        let tmp = tempfile::TempDir::new().unwrap();
        init_repo(tmp.path(), "main");
        commit_file(tmp.path(), "a.txt", "a", "initial");
        run(tmp.path(), &["checkout", "-b", "feat"]);
        commit_file(tmp.path(), "b.txt", "b", "feat work");
        run(tmp.path(), &["checkout", "main"]);
        run(tmp.path(), &["merge", "--no-ff", "feat", "-m", "merge feat"]);

        assert!(is_merged_to_default(tmp.path(), "feat", "main")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_branch_at_old_mainline_commit_is_not_merged() {
        let tmp = tempfile::TempDir::new().unwrap();
        init_repo(tmp.path(), "main");
        commit_file(tmp.path(), "a.txt", "a", "initial");
        // Branch with no commits of its own, pointing at an old mainline commit.
        run(tmp.path(), &["branch", "stale"]);
        commit_file(tmp.path(), "b.txt", "b", "main moved on");

        assert!(!is_merged_to_default(tmp.path(), "stale", "main")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_is_ancestor_basic() {
        let tmp = tempfile::TempDir::new().unwrap();
        init_repo(tmp.path(), "main");
        commit_file(tmp.path(), "a.txt", "a", "initial");
        run(tmp.path(), &["branch", "old"]);
        commit_file(tmp.path(), "b.txt", "b", "second");

        assert!(is_ancestor(tmp.path(), "old", "main").await.unwrap());
        assert!(!is_ancestor(tmp.path(), "main", "old").await.unwrap());
    }
}
