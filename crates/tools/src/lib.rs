//! Concrete collaborators for Codewright.
//!
//! Action handlers talk to the outside world through the traits in
//! `codewright_core::workspace`. This crate implements them against the
//! local machine: the filesystem under a workspace root, the `git` CLI,
//! a directory walker for content search, an HTTP client, and a fuzzy
//! path index.

pub mod fetch;
pub mod fs;
pub mod git;
pub mod path_index;
pub mod search;

pub use fetch::HttpFetcher;
pub use fs::LocalFileSystem;
pub use git::GitCli;
pub use path_index::FuzzyPathIndex;
pub use search::DirectorySearcher;

use codewright_core::workspace::{CollabResult, Workspace};
use std::path::Path;
use std::sync::Arc;

/// Create a workspace backed by the local machine, rooted at `root`.
///
/// Fails only when the HTTP client for URL fetching cannot be built.
pub fn local_workspace(root: &Path) -> CollabResult<Workspace> {
    Ok(Workspace {
        fs: Arc::new(LocalFileSystem::new(root)),
        git: Arc::new(GitCli::new(root)),
        search: Arc::new(DirectorySearcher::new(root)),
        fetch: Arc::new(HttpFetcher::new()?),
        paths: Arc::new(FuzzyPathIndex::new(root)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_workspace_shares_root() {
        let dir = tempfile::tempdir().unwrap();
        let ws = local_workspace(dir.path()).unwrap();

        ws.fs.write(Path::new("src/lib.rs"), "pub fn marker() {}").await.unwrap();
        let hits = ws.search.search("marker", Path::new("src")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].line, 1);
    }
}
