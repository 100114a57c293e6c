//! Shared git fixtures for this crate's tests.

use std::path::Path;
use std::process::Command;

/// Run a git command in `dir`, panicking on spawn failure.
pub fn run(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .expect("failed to execute git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Initialize a repository with a pinned initial branch and test identity.
pub fn init_repo(dir: &Path, initial_branch: &str) {
    let output = Command::new("git")
        .current_dir(dir)
        .args(["init", "-b", initial_branch])
        .output()
        .expect("failed to execute git init");
    assert!(output.status.success());
    run(dir, &["config", "user.email", "test@test.com"]);
    run(dir, &["config", "user.name", "Test User"]);
}

/// Write a file and commit it.
pub fn commit_file(dir: &Path, name: &str, content: &str, message: &str) {
    std::fs::write(dir.join(name), content).expect("failed to write test file");
    run(dir, &["add", "."]);
    run(dir, &["commit", "-m", message]);
}
