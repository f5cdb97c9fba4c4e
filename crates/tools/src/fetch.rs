//! URL fetching over HTTP.

use async_trait::async_trait;
use codewright_core::error::CollaboratorError;
use codewright_core::workspace::{CollabResult, Fetcher};
use std::time::Duration;
use tracing::debug;

const DEFAULT_MAX_CHARS: usize = 100_000;

pub struct HttpFetcher {
    client: reqwest::Client,
    max_chars: usize,
}

impl HttpFetcher {
    /// Fails when the HTTP client cannot be built.
    pub fn new() -> CollabResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("codewright/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CollaboratorError::Network(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            max_chars: DEFAULT_MAX_CHARS,
        })
    }

    /// Truncate bodies longer than `max_chars` characters.
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }
}

fn truncate(body: String, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body;
    }
    let mut short: String = body.chars().take(max_chars).collect();
    short.push_str("\n[truncated]");
    short
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> CollabResult<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CollaboratorError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Network(format!("HTTP {status} from {url}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CollaboratorError::Network(e.to_string()))?;
        debug!(url, bytes = body.len(), "Fetched URL");

        Ok(truncate(body, self.max_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_marks_cut_bodies() {
        assert_eq!(truncate("short".into(), 10), "short");
        assert_eq!(truncate("abcdef".into(), 3), "abc\n[truncated]");
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let fetcher = HttpFetcher::new().unwrap();
        let err = fetcher.fetch("http://127.0.0.1:9/").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Network(_)));
    }
}
