//! Content search over a directory tree.
//!
//! Walks with `walkdir` in sorted order, skipping VCS and build directories
//! and anything that looks binary.

use async_trait::async_trait;
use codewright_core::error::CollaboratorError;
use codewright_core::workspace::{CollabResult, SearchMatch, Searcher};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Directories never searched.
pub const SKIP_DIRS: &[&str] = &[".git", "target", "node_modules", ".codewright"];

const MAX_FILE_BYTES: u64 = 1024 * 1024;
const MAX_LINE_CHARS: usize = 200;

pub struct DirectorySearcher {
    root: PathBuf,
}

impl DirectorySearcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

pub(crate) fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIP_DIRS.contains(&name))
}

fn search_blocking(root: &Path, directory: &Path, term: &str) -> CollabResult<Vec<SearchMatch>> {
    let start = if directory.is_absolute() {
        directory.to_path_buf()
    } else {
        root.join(directory)
    };
    if !start.exists() {
        return Err(CollaboratorError::NotFound(directory.display().to_string()));
    }

    let mut matches = Vec::new();
    let walker = WalkDir::new(&start)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e));

    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.metadata().map(|m| m.len() > MAX_FILE_BYTES).unwrap_or(true) {
            continue;
        }
        let Ok(bytes) = std::fs::read(entry.path()) else {
            continue;
        };
        if bytes.iter().take(8000).any(|b| *b == 0) {
            continue;
        }
        let Ok(text) = String::from_utf8(bytes) else {
            continue;
        };

        let display = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();

        for (index, line) in text.lines().enumerate() {
            if line.contains(term) {
                let trimmed = line.trim();
                let text = if trimmed.chars().count() > MAX_LINE_CHARS {
                    trimmed.chars().take(MAX_LINE_CHARS).collect()
                } else {
                    trimmed.to_string()
                };
                matches.push(SearchMatch {
                    path: display.clone(),
                    line: index + 1,
                    text,
                });
            }
        }
    }

    Ok(matches)
}

#[async_trait]
impl Searcher for DirectorySearcher {
    async fn search(&self, term: &str, directory: &Path) -> CollabResult<Vec<SearchMatch>> {
        let root = self.root.clone();
        let directory = directory.to_path_buf();
        let term = term.to_string();

        let matches = tokio::task::spawn_blocking(move || search_blocking(&root, &directory, &term))
            .await
            .map_err(|e| CollaboratorError::Io {
                path: self.root.display().to_string(),
                reason: e.to_string(),
            })??;

        debug!(count = matches.len(), "Search finished");
        Ok(matches)
    }
}
