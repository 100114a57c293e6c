//! Git worktree management.
//!
//! Creates sibling worktrees (`<repo>-<name>`), lists them with optional
//! dirty/merged status, and removes them with optional branch deletion.
//! The git working tree is shared with the user, so every mutation here is
//! strictly scoped to an explicit client request.

pub mod errors;

pub use errors::WorktreeError;

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use jacques_protocol::{WorktreeEntry, WorktreeStatus};

/// Worktree names: `^[A-Za-z0-9_-]+$`, length ≤ 100.
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("name regex is valid"));

pub const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Clone)]
pub struct CreateWorktreeRequest {
    pub repo_root: PathBuf,
    pub name: String,
    pub base_branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedWorktree {
    pub path: PathBuf,
    pub branch: String,
}

#[derive(Debug, Clone)]
pub struct RemoveWorktreeRequest {
    pub repo_root: PathBuf,
    pub worktree_path: PathBuf,
    pub force: bool,
    pub delete_branch: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemovedWorktree {
    /// `Some(success)` when branch deletion was requested.
    pub branch_deleted: Option<bool>,
}

pub fn validate_name(name: &str) -> Result<(), WorktreeError> {
    if name.is_empty() || name.len() > MAX_NAME_LEN || !NAME_RE.is_match(name) {
        return Err(WorktreeError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Sibling path for a named worktree: `dirname(repo)/basename(repo)-<name>`.
pub fn worktree_target_path(repo_root: &Path, name: &str) -> PathBuf {
    let basename = repo_root
        .file_name()
        .map(|leaf| leaf.to_string_lossy().to_string())
        .unwrap_or_else(|| "repo".to_string());
    let parent = repo_root.parent().unwrap_or(repo_root);
    parent.join(format!("{}-{}", basename, name))
}

/// Create a worktree on a new branch named after the worktree.
pub async fn create(request: &CreateWorktreeRequest) -> Result<CreatedWorktree, WorktreeError> {
    validate_name(&request.name)?;
    let target = worktree_target_path(&request.repo_root, &request.name);
    if target.exists() {
        return Err(WorktreeError::PathExists {
            path: target.display().to_string(),
        });
    }

    info!(
        event = "core.worktree.create_started",
        name = %request.name,
        path = %target.display(),
    );
    jacques_git::add_worktree(
        &request.repo_root,
        &target,
        &request.name,
        request.base_branch.as_deref(),
    )
    .await?;
    info!(
        event = "core.worktree.create_completed",
        name = %request.name,
        path = %target.display(),
    );
    Ok(CreatedWorktree {
        path: target,
        branch: request.name.clone(),
    })
}

/// List registered worktrees. Prunes stale bookkeeping first (non-fatal).
pub async fn list(repo_root: &Path) -> Result<Vec<WorktreeEntry>, WorktreeError> {
    jacques_git::prune_worktrees(repo_root).await;
    let entries = jacques_git::list_worktrees(repo_root).await?;
    let resolved_root = resolve(repo_root);
    Ok(entries
        .into_iter()
        .map(|entry| {
            let is_main = resolve(&entry.path) == resolved_root;
            WorktreeEntry {
                name: entry
                    .path
                    .file_name()
                    .map(|leaf| leaf.to_string_lossy().to_string())
                    .unwrap_or_else(|| entry.path.display().to_string()),
                path: entry.path,
                branch: entry.branch,
                is_main,
                status: None,
            }
        })
        .collect())
}

/// List worktrees with dirty/merged status.
///
/// The main worktree skips the checks: it is by definition not dirty in a
/// way clients act on and always "merged".
pub async fn list_with_status(repo_root: &Path) -> Result<Vec<WorktreeEntry>, WorktreeError> {
    let mut entries = list(repo_root).await?;
    let default = jacques_git::default_branch(repo_root).await;
    for entry in &mut entries {
        if entry.is_main {
            entry.status = Some(WorktreeStatus {
                has_uncommitted_changes: false,
                is_merged_to_main: true,
            });
            continue;
        }
        let dirty = jacques_git::is_dirty(&entry.path).await.unwrap_or_else(|e| {
            warn!(
                event = "core.worktree.status_check_failed",
                path = %entry.path.display(),
                error = %e,
            );
            false
        });
        let merged = match entry.branch.as_deref() {
            Some(branch) if branch == default => true,
            Some(branch) => jacques_git::is_merged_to_default(repo_root, branch, &default)
                .await
                .unwrap_or(false),
            None => false,
        };
        entry.status = Some(WorktreeStatus {
            has_uncommitted_changes: dirty,
            is_merged_to_main: merged,
        });
    }
    Ok(entries)
}

/// Remove a worktree, optionally deleting its branch afterwards.
///
/// The branch is captured before removal (the worktree's HEAD disappears
/// with the directory). Branch deletion failure does not fail the overall
/// remove.
pub async fn remove(request: &RemoveWorktreeRequest) -> Result<RemovedWorktree, WorktreeError> {
    if resolve(&request.worktree_path) == resolve(&request.repo_root) {
        return Err(WorktreeError::MainWorktree);
    }

    let branch_to_delete = if request.delete_branch {
        match jacques_git::head_branch(&request.worktree_path).await {
            Ok(branch) => branch,
            Err(e) => {
                warn!(
                    event = "core.worktree.branch_capture_failed",
                    path = %request.worktree_path.display(),
                    error = %e,
                );
                None
            }
        }
    } else {
        None
    };

    jacques_git::remove_worktree(&request.repo_root, &request.worktree_path, request.force)
        .await?;
    info!(
        event = "core.worktree.remove_completed",
        path = %request.worktree_path.display(),
    );

    if !request.delete_branch {
        return Ok(RemovedWorktree {
            branch_deleted: None,
        });
    }
    let Some(branch) = branch_to_delete else {
        return Ok(RemovedWorktree {
            branch_deleted: Some(false),
        });
    };
    match jacques_git::delete_branch(&request.repo_root, &branch, request.force).await {
        Ok(()) => {
            info!(event = "core.worktree.branch_deleted", branch = %branch);
            Ok(RemovedWorktree {
                branch_deleted: Some(true),
            })
        }
        Err(e) => {
            warn!(
                event = "core.worktree.branch_delete_failed",
                branch = %branch,
                error = %e,
            );
            Ok(RemovedWorktree {
                branch_deleted: Some(false),
            })
        }
    }
}

/// Canonicalize when possible; worktree paths compare by resolved form
/// (macOS `/tmp` vs `/private/tmp`).
fn resolve(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
