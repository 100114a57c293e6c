//! Worktree add/list/remove plumbing.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::errors::GitError;
use crate::runner::{run_git, validate_git_arg, MUTATION_TIMEOUT, STATUS_TIMEOUT};

/// One block of `git worktree list --porcelain` output.
#[derive(Debug, Clone, PartialEq)]
pub struct PorcelainWorktree {
    pub path: PathBuf,
    pub head: Option<String>,
    /// Branch name with `refs/heads/` stripped; `None` for detached HEAD.
    pub branch: Option<String>,
}

/// Create a new worktree at `path` on a new branch `branch`.
///
/// `base` selects the start point; omitted means the current HEAD.
pub async fn add_worktree(
    repo_root: &Path,
    path: &Path,
    branch: &str,
    base: Option<&str>,
) -> Result<(), GitError> {
    validate_git_arg(branch, "branch name")?;
    if let Some(base) = base {
        validate_git_arg(base, "base branch")?;
    }

    info!(
        event = "git.worktree.add_started",
        branch = branch,
        path = %path.display(),
    );

    let path_str = path.display().to_string();
    let mut args = vec!["worktree", "add", "-b", branch, &path_str];
    if let Some(base) = base {
        args.push(base);
    }

    let out = run_git(repo_root, &args, MUTATION_TIMEOUT).await?;
    if out.success {
        info!(
            event = "git.worktree.add_completed",
            branch = branch,
            path = %path.display(),
        );
        return Ok(());
    }

    let stderr = out.stderr_trimmed();
    warn!(
        event = "git.worktree.add_failed",
        branch = branch,
        stderr = %stderr,
    );
    Err(classify_add_error(stderr, branch, path))
}

/// Map `git worktree add` stderr onto canonical errors.
fn classify_add_error(stderr: &str, branch: &str, path: &Path) -> GitError {
    let lower = stderr.to_lowercase();
    if lower.contains("already exists") && lower.contains("branch") {
        GitError::BranchAlreadyExists {
            branch: branch.to_string(),
        }
    } else if lower.contains("already exists") {
        GitError::DirectoryAlreadyExists {
            path: path.display().to_string(),
        }
    } else {
        GitError::OperationFailed {
            message: stderr.to_string(),
        }
    }
}

/// Prune stale worktree bookkeeping. Failures are non-fatal.
pub async fn prune_worktrees(repo_root: &Path) {
    match run_git(repo_root, &["worktree", "prune"], STATUS_TIMEOUT).await {
        Ok(out) if !out.success => {
            warn!(
                event = "git.worktree.prune_failed",
                stderr = %out.stderr_trimmed(),
            );
        }
        Err(e) => {
            warn!(event = "git.worktree.prune_failed", error = %e);
        }
        Ok(_) => {}
    }
}

/// List worktrees via `git worktree list --porcelain`.
pub async fn list_worktrees(repo_root: &Path) -> Result<Vec<PorcelainWorktree>, GitError> {
    let out = run_git(
        repo_root,
        &["worktree", "list", "--porcelain"],
        STATUS_TIMEOUT,
    )
    .await?;
    if !out.success {
        return Err(GitError::OperationFailed {
            message: format!("worktree list failed: {}", out.stderr_trimmed()),
        });
    }
    Ok(parse_porcelain(&out.stdout))
}

/// Parse `worktree list --porcelain` output: blank-line-separated blocks of
/// `worktree <path>` / `HEAD <sha>` / `branch refs/heads/<name>` lines.
pub fn parse_porcelain(output: &str) -> Vec<PorcelainWorktree> {
    let mut entries = Vec::new();
    let mut current: Option<PorcelainWorktree> = None;

    for line in output.lines() {
        if line.is_empty() {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
            continue;
        }
        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
            current = Some(PorcelainWorktree {
                path: PathBuf::from(path),
                head: None,
                branch: None,
            });
        } else if let Some(entry) = current.as_mut() {
            if let Some(sha) = line.strip_prefix("HEAD ") {
                entry.head = Some(sha.to_string());
            } else if let Some(branch_ref) = line.strip_prefix("branch ") {
                entry.branch = Some(
                    branch_ref
                        .strip_prefix("refs/heads/")
                        .unwrap_or(branch_ref)
                        .to_string(),
                );
            }
            // `bare`, `detached`, `locked` markers are irrelevant here.
        }
    }
    if let Some(entry) = current.take() {
        entries.push(entry);
    }
    entries
}

/// Remove a worktree. `force` forwards `--force`.
pub async fn remove_worktree(repo_root: &Path, path: &Path, force: bool) -> Result<(), GitError> {
    info!(
        event = "git.worktree.remove_started",
        path = %path.display(),
        force = force,
    );

    let path_str = path.display().to_string();
    let mut args = vec!["worktree", "remove"];
    if force {
        args.push("--force");
    }
    args.push(&path_str);

    let out = run_git(repo_root, &args, MUTATION_TIMEOUT).await?;
    if out.success {
        info!(
            event = "git.worktree.remove_completed",
            path = %path.display(),
        );
        return Ok(());
    }

    let stderr = out.stderr_trimmed();
    warn!(
        event = "git.worktree.remove_failed",
        path = %path.display(),
        stderr = %stderr,
    );
    let lower = stderr.to_lowercase();
    if lower.contains("contains modified or untracked files")
        || lower.contains("uncommitted changes")
    {
        Err(GitError::WorktreeHasChanges {
            path: path.display().to_string(),
        })
    } else {
        Err(GitError::OperationFailed {
            message: stderr.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{commit_file, init_repo};

    #[test]
    fn test_parse_porcelain_two_entries() {
        let output = "worktree /repo\nHEAD abc123\nbranch refs/heads/main\n\n\
                      worktree /repo-feat\nHEAD def456\nbranch refs/heads/feat\n\n";
        let entries = parse_porcelain(output);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, PathBuf::from("/repo"));
        assert_eq!(entries[0].branch.as_deref(), Some("main"));
        assert_eq!(entries[1].branch.as_deref(), Some("feat"));
        assert_eq!(entries[1].head.as_deref(), Some("def456"));
    }

    #[test]
    fn test_parse_porcelain_detached_entry() {
        let output = "worktree /repo\nHEAD abc123\ndetached\n\n";
        let entries = parse_porcelain(output);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].branch, None);
    }

    #[test]
    fn test_parse_porcelain_missing_trailing_blank() {
        let output = "worktree /repo\nHEAD abc123\nbranch refs/heads/main";
        let entries = parse_porcelain(output);
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_classify_add_error_branch_exists() {
        let err = classify_add_error(
            "fatal: a branch named 'feat' already exists",
            "feat",
            Path::new("/p-feat"),
        );
        assert!(matches!(err, GitError::BranchAlreadyExists { .. }));
    }

    #[test]
    fn test_classify_add_error_path_exists() {
        let err = classify_add_error(
            "fatal: '/p-feat' already exists",
            "feat",
            Path::new("/p-feat"),
        );
        assert!(matches!(err, GitError::DirectoryAlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_add_list_remove_cycle() {
        let base = tempfile::TempDir::new().unwrap();
        let repo = base.path().join("repo");
        std::fs::create_dir(&repo).unwrap();
        init_repo(&repo, "main");
        commit_file(&repo, "a.txt", "a", "initial");

        let wt = base.path().join("repo-feat");
        add_worktree(&repo, &wt, "feat", None).await.unwrap();
        assert!(wt.exists());

        let entries = list_worktrees(&repo).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.branch.as_deref() == Some("feat")));

        remove_worktree(&repo, &wt, false).await.unwrap();
        assert!(!wt.exists());
        let entries = list_worktrees(&repo).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_add_worktree_existing_branch_is_classified() {
        let base = tempfile::TempDir::new().unwrap();
        let repo = base.path().join("repo");
        std::fs::create_dir(&repo).unwrap();
        init_repo(&repo, "main");
        commit_file(&repo, "a.txt", "a", "initial");
        crate::test_support::run(&repo, &["branch", "feat"]);

        let wt = base.path().join("repo-feat");
        let err = add_worktree(&repo, &wt, "feat", None).await.unwrap_err();
        assert!(matches!(err, GitError::BranchAlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_remove_dirty_worktree_needs_force() {
        let base = tempfile::TempDir::new().unwrap();
        let repo = base.path().join("repo");
        std::fs::create_dir(&repo).unwrap();
        init_repo(&repo, "main");
        commit_file(&repo, "a.txt", "a", "initial");

        let wt = base.path().join("repo-feat");
        add_worktree(&repo, &wt, "feat", None).await.unwrap();
        std::fs::write(wt.join("dirty.txt"), "x").unwrap();

        let err = remove_worktree(&repo, &wt, false).await.unwrap_err();
        assert!(matches!(err, GitError::WorktreeHasChanges { .. }));

        remove_worktree(&repo, &wt, true).await.unwrap();
        assert!(!wt.exists());
    }
}
