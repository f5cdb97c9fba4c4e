//! Shared test helpers for agent tests.

use async_trait::async_trait;
use codewright_actions::{ActionRegistry, HandlerSettings, builtin_registry};
use codewright_core::agent::default_model_tiers;
use codewright_core::error::{CollaboratorError, ProviderError};
use codewright_core::event::EventBus;
use codewright_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use codewright_core::workspace::{
    CollabResult, Fetcher, FileSystem, GitClient, PathAdjuster, SearchMatch, Searcher, Workspace,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::runner::Agent;
use crate::session::SessionContext;

/// A mock provider that returns a sequence of scripted responses and
/// remembers every request it saw.
///
/// Panics if more calls are made than responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn texts(texts: &[&str]) -> Arc<Self> {
        Self::new(texts.iter().map(|t| make_text_response(t)).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let n = requests.len();
        if n >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{n}, have {})",
                responses.len()
            );
        }
        let mut response = responses[n].clone();
        response.model = request.model.clone();
        requests.push(request);
        Ok(response)
    }
}

/// Never answers.
pub struct HangingProvider;

#[async_trait]
impl Provider for HangingProvider {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        std::future::pending().await
    }
}

pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        content: text.to_string(),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        cost_usd: None,
        model: "mock-model".into(),
    }
}

#[derive(Default)]
struct MemoryFs {
    files: Mutex<BTreeMap<PathBuf, String>>,
}

#[async_trait]
impl FileSystem for MemoryFs {
    async fn read(&self, path: &Path) -> CollabResult<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound(path.display().to_string()))
    }

    async fn write(&self, path: &Path, content: &str) -> CollabResult<usize> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), content.to_string());
        Ok(content.len())
    }

    async fn rename(&self, from: &Path, to: &Path) -> CollabResult<()> {
        let mut files = self.files.lock().unwrap();
        let content = files
            .remove(from)
            .ok_or_else(|| CollaboratorError::NotFound(from.display().to_string()))?;
        files.insert(to.to_path_buf(), content);
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }
}

struct Offline;

#[async_trait]
impl GitClient for Offline {
    async fn diff(&self, _: Option<&str>, _: Option<&str>, _: &[String]) -> CollabResult<String> {
        Ok(String::new())
    }
}

#[async_trait]
impl Searcher for Offline {
    async fn search(&self, _: &str, _: &Path) -> CollabResult<Vec<SearchMatch>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl Fetcher for Offline {
    async fn fetch(&self, url: &str) -> CollabResult<String> {
        Err(CollaboratorError::Network(format!("offline: {url}")))
    }
}

#[async_trait]
impl PathAdjuster for Offline {
    async fn adjust_path(&self, _: &str, _: f64) -> Option<PathBuf> {
        None
    }
}

/// Built-in actions over an in-memory filesystem with offline collaborators.
pub fn test_registry() -> (Workspace, ActionRegistry) {
    let offline = Arc::new(Offline);
    let workspace = Workspace {
        fs: Arc::new(MemoryFs::default()),
        git: offline.clone(),
        search: offline.clone(),
        fetch: offline.clone(),
        paths: offline,
    };
    let registry = builtin_registry(&workspace, HandlerSettings::default());
    (workspace, registry)
}

/// A session with the default tiers and the given phases.
pub fn test_session(phases: Vec<codewright_core::agent::PhaseSpec>) -> Arc<SessionContext> {
    Arc::new(SessionContext::new(
        None,
        default_model_tiers(),
        phases,
        Arc::new(EventBus::default()),
    ))
}

/// An agent with no phases over [`test_registry`].
pub fn test_agent(provider: Arc<dyn Provider>) -> Agent {
    Agent::new(provider, Arc::new(test_registry().1), test_session(Vec::new()))
}
