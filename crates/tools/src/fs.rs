//! Local filesystem scoped to a workspace root.
//!
//! Reads, writes and renames are confined to the root: paths are
//! normalized lexically and anything that climbs out of the root, or names
//! an absolute location elsewhere, is refused.

use async_trait::async_trait;
use codewright_core::error::CollaboratorError;
use codewright_core::workspace::{CollabResult, FileSystem};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The normalized location of `path` under the root.
    fn confine(&self, path: &Path) -> CollabResult<PathBuf> {
        let root = normalize(&self.root);
        let full = normalize(&self.root.join(path));
        match full.strip_prefix(&root) {
            Ok(rest)
                if !rest.has_root() && !rest.components().any(|c| c == Component::ParentDir) =>
            {
                Ok(full)
            }
            _ => {
                warn!(path = %path.display(), "Refused path outside workspace root");
                Err(CollaboratorError::Io {
                    path: path.display().to_string(),
                    reason: "path escapes workspace root".into(),
                })
            }
        }
    }
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}

fn io_error(path: &Path, err: std::io::Error) -> CollaboratorError {
    if err.kind() == ErrorKind::NotFound {
        CollaboratorError::NotFound(path.display().to_string())
    } else {
        CollaboratorError::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn read(&self, path: &Path) -> CollabResult<String> {
        let full = self.confine(path)?;
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| io_error(path, e))
    }

    async fn write(&self, path: &Path, content: &str) -> CollabResult<usize> {
        let full = self.confine(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(path, e))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| io_error(path, e))?;
        debug!(path = %full.display(), bytes = content.len(), "Wrote file");
        Ok(content.len())
    }

    async fn rename(&self, from: &Path, to: &Path) -> CollabResult<()> {
        let src = self.confine(from)?;
        let dst = self.confine(to)?;
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(to, e))?;
        }
        tokio::fs::rename(&src, &dst)
            .await
            .map_err(|e| io_error(from, e))
    }

    async fn exists(&self, path: &Path) -> bool {
        let Ok(full) = self.confine(path) else {
            return false;
        };
        tokio::fs::try_exists(full).await.unwrap_or(false)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_creates_parents_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFileSystem::new(dir.path());

        let n = fs.write(Path::new("a/b/c.txt"), "hello").await.unwrap();
        assert_eq!(n, 5);
        assert_eq!(fs.read(Path::new("a/b/c.txt")).await.unwrap(), "hello");
        assert!(fs.exists(Path::new("a/b/c.txt")).await);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFileSystem::new(dir.path());

        let err = fs.read(Path::new("nope.txt")).await.unwrap_err();
        assert_eq!(err.to_string(), "Not found: nope.txt");
    }

    #[tokio::test]
    async fn rename_moves_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFileSystem::new(dir.path());
        fs.write(Path::new("old.rs"), "x").await.unwrap();

        fs.rename(Path::new("old.rs"), Path::new("nested/new.rs"))
            .await
            .unwrap();
        assert!(!fs.exists(Path::new("old.rs")).await);
        assert!(fs.exists(Path::new("nested/new.rs")).await);
    }

    #[tokio::test]
    async fn paths_leaving_the_root_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("ws");
        let fs = LocalFileSystem::new(&root);
        let outside = dir.path().join("outside.txt");
        std::fs::write(&outside, "secret").unwrap();

        let err = fs.write(Path::new("../escaped.txt"), "x").await.unwrap_err();
        assert_eq!(err.to_string(), "../escaped.txt: path escapes workspace root");
        assert!(!dir.path().join("escaped.txt").exists());

        assert!(fs.read(&outside).await.is_err());
        assert!(fs.read(Path::new("src/../../outside.txt")).await.is_err());
        assert!(!fs.exists(&outside).await);
        assert!(
            fs.rename(Path::new("a.txt"), Path::new("../../b.txt"))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn dotted_and_absolute_paths_inside_root_are_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFileSystem::new(dir.path());

        fs.write(Path::new("src/./../notes.txt"), "kept").await.unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
            "kept"
        );
        let absolute = dir.path().join("notes.txt");
        assert_eq!(fs.read(&absolute).await.unwrap(), "kept");
    }

    #[test]
    fn normalize_folds_dots() {
        assert_eq!(normalize(Path::new("/work/src/../lib.rs")), PathBuf::from("/work/lib.rs"));
        assert_eq!(normalize(Path::new("./a/./b")), PathBuf::from("a/b"));
        assert_eq!(normalize(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn resolve_joins_relative_paths() {
        let fs = LocalFileSystem::new("/work");
        assert_eq!(fs.resolve(Path::new("src/lib.rs")), PathBuf::from("/work/src/lib.rs"));
    }
}
