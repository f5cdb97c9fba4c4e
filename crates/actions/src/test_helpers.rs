//! In-memory collaborators for handler tests.

use async_trait::async_trait;
use codewright_core::error::CollaboratorError;
use codewright_core::workspace::{
    CollabResult, Fetcher, FileSystem, GitClient, PathAdjuster, SearchMatch, Searcher, Workspace,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A filesystem held in a map, rooted at `/repo`.
#[derive(Default)]
pub struct MemoryFs {
    pub files: Mutex<BTreeMap<PathBuf, String>>,
}

impl MemoryFs {
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(self.resolve(Path::new(path)), content.to_string());
        self
    }

    pub fn content(&self, path: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(&self.resolve(Path::new(path)))
            .cloned()
    }
}

#[async_trait]
impl FileSystem for MemoryFs {
    async fn read(&self, path: &Path) -> CollabResult<String> {
        self.files
            .lock()
            .unwrap()
            .get(&self.resolve(path))
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound(path.display().to_string()))
    }

    async fn write(&self, path: &Path, content: &str) -> CollabResult<usize> {
        self.files
            .lock()
            .unwrap()
            .insert(self.resolve(path), content.to_string());
        Ok(content.len())
    }

    async fn rename(&self, from: &Path, to: &Path) -> CollabResult<()> {
        let mut files = self.files.lock().unwrap();
        let content = files
            .remove(&self.resolve(from))
            .ok_or_else(|| CollaboratorError::NotFound(from.display().to_string()))?;
        files.insert(self.resolve(to), content);
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(&self.resolve(path))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        Path::new("/repo").join(path)
    }
}

/// Returns a fixed diff and remembers the last arguments.
#[derive(Default)]
pub struct FakeGit {
    pub output: String,
    pub calls: Mutex<Vec<(Option<String>, Option<String>, Vec<String>)>>,
}

#[async_trait]
impl GitClient for FakeGit {
    async fn diff(
        &self,
        from: Option<&str>,
        to: Option<&str>,
        exclude: &[String],
    ) -> CollabResult<String> {
        self.calls.lock().unwrap().push((
            from.map(String::from),
            to.map(String::from),
            exclude.to_vec(),
        ));
        Ok(self.output.clone())
    }
}

/// Returns fixed matches for any term.
#[derive(Default)]
pub struct FakeSearch {
    pub matches: Vec<SearchMatch>,
}

#[async_trait]
impl Searcher for FakeSearch {
    async fn search(&self, term: &str, _directory: &Path) -> CollabResult<Vec<SearchMatch>> {
        Ok(self
            .matches
            .iter()
            .filter(|m| m.text.contains(term))
            .cloned()
            .collect())
    }
}

/// Serves pages from a map; anything else is a network error.
#[derive(Default)]
pub struct FakeFetch {
    pub pages: BTreeMap<String, String>,
}

#[async_trait]
impl Fetcher for FakeFetch {
    async fn fetch(&self, url: &str) -> CollabResult<String> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| CollaboratorError::Network(format!("connection refused: {url}")))
    }
}

/// Suggests one fixed path when the threshold allows it.
#[derive(Default)]
pub struct FakePaths {
    pub suggestion: Option<(PathBuf, f64)>,
}

#[async_trait]
impl PathAdjuster for FakePaths {
    async fn adjust_path(&self, _candidate: &str, threshold: f64) -> Option<PathBuf> {
        self.suggestion
            .as_ref()
            .filter(|(_, score)| *score >= threshold)
            .map(|(p, _)| p.clone())
    }
}

/// A workspace of default fakes, with individual pieces swappable.
pub struct TestWorkspace {
    pub fs: Arc<MemoryFs>,
    pub git: Arc<FakeGit>,
    pub search: Arc<FakeSearch>,
    pub fetch: Arc<FakeFetch>,
    pub paths: Arc<FakePaths>,
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self {
            fs: Arc::new(MemoryFs::default()),
            git: Arc::new(FakeGit::default()),
            search: Arc::new(FakeSearch::default()),
            fetch: Arc::new(FakeFetch::default()),
            paths: Arc::new(FakePaths::default()),
        }
    }
}

impl TestWorkspace {
    pub fn workspace(&self) -> Workspace {
        Workspace {
            fs: self.fs.clone(),
            git: self.git.clone(),
            search: self.search.clone(),
            fetch: self.fetch.clone(),
            paths: self.paths.clone(),
        }
    }
}
