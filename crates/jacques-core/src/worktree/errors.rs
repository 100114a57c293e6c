use jacques_git::GitError;

#[derive(Debug, thiserror::Error)]
pub enum WorktreeError {
    #[error("Invalid worktree name '{name}': letters, digits, '-' and '_' only, max 100 chars")]
    InvalidName { name: String },

    #[error("Directory already exists at {path}")]
    PathExists { path: String },

    #[error("Branch '{branch}' already exists")]
    BranchExists { branch: String },

    #[error("Worktree at {path} has uncommitted changes")]
    UncommittedChanges { path: String },

    #[error("Cannot remove the main worktree")]
    MainWorktree,

    #[error("{0}")]
    Git(String),
}

impl From<GitError> for WorktreeError {
    fn from(error: GitError) -> Self {
        match error {
            GitError::BranchAlreadyExists { branch } => WorktreeError::BranchExists { branch },
            GitError::DirectoryAlreadyExists { path } => WorktreeError::PathExists { path },
            GitError::WorktreeHasChanges { path } => WorktreeError::UncommittedChanges { path },
            GitError::MainWorktree { .. } => WorktreeError::MainWorktree,
            other => WorktreeError::Git(other.to_string()),
        }
    }
}
