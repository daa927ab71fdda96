//! Git helpers for context attachment.

use std::io;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("{0}")]
    Spawn(#[from] io::Error),
    #[error("{0}")]
    Failed(String),
}

/// Output larger than this is cut before it reaches the payload builder.
const MAX_DIFF_BYTES: usize = 8 * 1024 * 1024;

/// Unstaged changes of the working tree at `cwd` (`git diff --`).
pub async fn working_tree_diff(cwd: &str) -> Result<String, GitError> {
    let output = Command::new("git")
        .args(["diff", "--"])
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        return Err(GitError::Failed(if stderr.is_empty() {
            format!("git diff exited with {}", output.status)
        } else {
            stderr.to_string()
        }));
    }

    let stdout = &output.stdout[..output.stdout.len().min(MAX_DIFF_BYTES)];
    Ok(String::from_utf8_lossy(stdout).into_owned())
}
