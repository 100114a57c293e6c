//! Async git CLI wrappers for Jacques.
//!
//! Everything shells out to the `git` CLI so the user's own configuration
//! (worktree settings, default branch, credential helpers) applies without
//! any library-side setup, and every command carries a deadline so a wedged
//! repository can never stall the session registry.
//!
//! Read-like queries only, plus the worktree/branch mutations a client
//! explicitly requested. Never `checkout`, `fetch`, `pull`, or `push`.

pub mod branch;
pub mod errors;
pub mod merge;
pub mod runner;
pub mod worktree;

pub use branch::{
    ahead_behind, default_branch, delete_branch, head_branch, is_dirty, repo_toplevel,
};
pub use errors::GitError;
pub use merge::{is_ancestor, is_merged_to_default, rev_parse};
pub use runner::{GitOutput, MUTATION_TIMEOUT, PROBE_TIMEOUT, STATUS_TIMEOUT};
pub use worktree::{
    add_worktree, list_worktrees, parse_porcelain, prune_worktrees, remove_worktree,
    PorcelainWorktree,
};

#[cfg(test)]
pub(crate) mod test_support;
