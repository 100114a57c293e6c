#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("Not in a git repository: {path}")]
    NotInRepository { path: String },

    #[error("Branch '{branch}' already exists")]
    BranchAlreadyExists { branch: String },

    #[error("Directory already exists at path: {path}")]
    DirectoryAlreadyExists { path: String },

    #[error("Worktree at {path} has uncommitted changes")]
    WorktreeHasChanges { path: String },

    #[error("Refusing to remove the main worktree at {path}")]
    MainWorktree { path: String },

    #[error("Invalid git argument for {what}: {message}")]
    InvalidArgument { what: String, message: String },

    #[error("git {command} timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    #[error("Git operation failed: {message}")]
    OperationFailed { message: String },

    #[error("IO error during git operation: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}
