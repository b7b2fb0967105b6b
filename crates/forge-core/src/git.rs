//! Git operations on the upstream engine tree.
//!
//! Every command runs with an explicit working directory; the process
//! working directory is never changed.

use std::path::Path;

use forge_host::{CommandRunner, CommandSpec, HostError};

type Result<T> = std::result::Result<T, HostError>;

/// `git clone <url> <dir>`
pub fn clone(runner: &dyn CommandRunner, url: &str, dir: &Path) -> Result<()> {
    let spec = CommandSpec::new("git", ["clone".to_string(), url.to_string(), dir.display().to_string()]);
    runner.run_checked(&spec)?;
    Ok(())
}

/// `git checkout <reference>` inside `repo_dir`.
pub fn checkout(runner: &dyn CommandRunner, repo_dir: &Path, reference: &str) -> Result<()> {
    let spec = CommandSpec::new("git", ["checkout", reference]).in_dir(repo_dir);
    runner.run_checked(&spec)?;
    Ok(())
}

/// Capture the HEAD commit SHA of `repo_dir`.
pub fn capture_head_sha(runner: &dyn CommandRunner, repo_dir: &Path) -> Result<String> {
    let spec = CommandSpec::new("git", ["rev-parse", "HEAD"]).in_dir(repo_dir);
    let output = runner.run_checked(&spec)?;

    let sha = output.stdout.trim().to_string();
    if sha.is_empty() {
        return Err(HostError::CommandFailed {
            command: spec.to_string(),
            status: output.status_text(),
            stderr: "git rev-parse HEAD returned empty output".to_string(),
        });
    }
    Ok(sha)
}

/// Name of the checked-out branch, or `HEAD` when detached.
pub fn current_branch(runner: &dyn CommandRunner, repo_dir: &Path) -> Result<String> {
    let spec = CommandSpec::new("git", ["rev-parse", "--abbrev-ref", "HEAD"]).in_dir(repo_dir);
    let output = runner.run_checked(&spec)?;
    Ok(output.stdout.trim().to_string())
}

/// Paths of tracked files with local modifications. Untracked files
/// (integrated modules, the copied build file) are not reported.
pub fn tracked_changes(runner: &dyn CommandRunner, repo_dir: &Path) -> Result<Vec<String>> {
    let spec = CommandSpec::new("git", ["status", "--porcelain", "--untracked-files=no"])
        .in_dir(repo_dir);
    let output = runner.run_checked(&spec)?;

    Ok(output
        .stdout
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| line[3..].to_string())
        .collect())
}
