//! Git diffs through the `git` command line.

use async_trait::async_trait;
use codewright_core::error::CollaboratorError;
use codewright_core::workspace::{CollabResult, GitClient};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

pub struct GitCli {
    root: PathBuf,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Arguments for `git diff`. With no `from`, the working tree is compared
/// against `HEAD`.
fn diff_args(from: Option<&str>, to: Option<&str>, exclude: &[String]) -> Vec<String> {
    let mut args = vec!["diff".to_string(), "--no-color".to_string()];
    match (from, to) {
        (Some(from), Some(to)) => {
            args.push(from.to_string());
            args.push(to.to_string());
        }
        (Some(from), None) => args.push(from.to_string()),
        (None, _) => args.push("HEAD".to_string()),
    }
    args.push("--".to_string());
    args.push(".".to_string());
    args.extend(exclude.iter().map(|p| format!(":(exclude){p}")));
    args
}

#[async_trait]
impl GitClient for GitCli {
    async fn diff(
        &self,
        from: Option<&str>,
        to: Option<&str>,
        exclude: &[String],
    ) -> CollabResult<String> {
        let args = diff_args(from, to, exclude);
        debug!(args = ?args, "Running git");

        let output = Command::new("git")
            .args(&args)
            .current_dir(&self.root)
            .output()
            .await
            .map_err(|e| CollaboratorError::Git(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CollaboratorError::Git(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
