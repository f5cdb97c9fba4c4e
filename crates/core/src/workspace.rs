//! Collaborator traits — the side-effecting services action handlers use.
//!
//! Handlers never touch the disk, a repository or the network directly.
//! They go through these traits, which `codewright-tools` implements and
//! tests replace with in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::CollaboratorError;

pub type CollabResult<T> = std::result::Result<T, CollaboratorError>;

/// File operations scoped to the workspace.
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn read(&self, path: &Path) -> CollabResult<String>;

    /// Write `content` to `path`, creating parent directories as needed.
    /// Returns the number of bytes written.
    async fn write(&self, path: &Path, content: &str) -> CollabResult<usize>;

    async fn rename(&self, from: &Path, to: &Path) -> CollabResult<()>;

    async fn exists(&self, path: &Path) -> bool;

    /// Resolve a workspace-relative path to an absolute one.
    fn resolve(&self, path: &Path) -> PathBuf;
}

/// Repository diffing.
#[async_trait]
pub trait GitClient: Send + Sync {
    /// Diff between two refs. `None` for `from` means the working tree
    /// against HEAD; `None` for `to` means the working tree.
    async fn diff(
        &self,
        from: Option<&str>,
        to: Option<&str>,
        exclude: &[String],
    ) -> CollabResult<String>;
}

/// One line matching a content search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub path: PathBuf,
    pub line: usize,
    pub text: String,
}

impl std::fmt::Display for SearchMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.path.display(), self.line, self.text)
    }
}

/// Content search within a directory tree.
#[async_trait]
pub trait Searcher: Send + Sync {
    /// Matches in a stable order (path, then line number).
    async fn search(&self, term: &str, directory: &Path) -> CollabResult<Vec<SearchMatch>>;
}

/// URL fetching. Transport failures map to [`CollaboratorError::Network`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> CollabResult<String>;
}

/// Fuzzy path correction.
#[async_trait]
pub trait PathAdjuster: Send + Sync {
    /// Return the absolute path of the best known file whose similarity to
    /// `candidate` is at least `threshold` (0.0..=1.0), or `None`.
    async fn adjust_path(&self, candidate: &str, threshold: f64) -> Option<PathBuf>;
}

/// The full set of collaborators, handed to handlers at construction time.
#[derive(Clone)]
pub struct Workspace {
    pub fs: Arc<dyn FileSystem>,
    pub git: Arc<dyn GitClient>,
    pub search: Arc<dyn Searcher>,
    pub fetch: Arc<dyn Fetcher>,
    pub paths: Arc<dyn PathAdjuster>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_match_displays_grep_style() {
        let m = SearchMatch {
            path: PathBuf::from("src/lib.rs"),
            line: 12,
            text: "pub fn run()".into(),
        };
        assert_eq!(m.to_string(), "src/lib.rs:12: pub fn run()");
    }
}
