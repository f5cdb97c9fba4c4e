//! OpenAI-compatible provider implementation.
//!
//! Works with OpenRouter, OpenAI, Ollama, vLLM and any endpoint exposing
//! `/chat/completions`. Supports plain completions and SSE streaming with
//! cooperative cancellation.

use async_trait::async_trait;
use codewright_core::error::ProviderError;
use codewright_core::message::Message;
use codewright_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    ///
    /// Fails when the HTTP client cannot be built (for example, no TLS
    /// backend is available).
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let name = name.into();
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("{name}: HTTP client: {e}")))?;

        Ok(Self {
            name,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create an OpenRouter provider (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Result<Self, ProviderError> {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama",
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().to_string(),
                content: Some(m.content.clone()),
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });

        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        body
    }

    async fn post(
        &self,
        body: &serde_json::Value,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let body = Self::request_body(&request, false);
        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self.post(&body, false).await?;

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice =
            api_response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::ApiError {
                    status_code: 200,
                    message: "No choices in response".into(),
                })?;

        let cost_usd = api_response.usage.as_ref().and_then(|u| u.cost);
        let usage = api_response.usage.map(ApiUsage::into_usage);

        Ok(ProviderResponse {
            content: choice.message.content.unwrap_or_default(),
            usage,
            cost_usd,
            model: api_response.model.unwrap_or(request.model),
        })
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    async fn stream(
        &self,
        request: ProviderRequest,
        cancel: CancellationToken,
    ) -> std::result::Result<ChunkReceiver, ProviderError> {
        let body = Self::request_body(&request, true);
        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let response = tokio::select! {
            response = self.post(&body, true) => response?,
            () = cancel.cancelled() => {
                return Err(ProviderError::StreamInterrupted("cancelled".into()));
            }
        };

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        // Read the SSE byte stream until [DONE], usage, EOF or cancellation
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();

            loop {
                let chunk_result = tokio::select! {
                    next = byte_stream.next() => match next {
                        Some(r) => r,
                        None => break,
                    },
                    () = cancel.cancelled() => {
                        debug!(provider = %provider_name, "Stream cancelled");
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted("cancelled".into())))
                            .await;
                        return;
                    }
                };

                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.extend_from_slice(&bytes);

                for line in drain_lines(&mut buffer) {
                    match parse_sse_line(&line) {
                        SseEvent::Skip => {}
                        SseEvent::Done => {
                            let _ = tx.send(Ok(done_chunk(None, None))).await;
                            return;
                        }
                        SseEvent::Invalid(error) => {
                            trace!(
                                provider = %provider_name,
                                data = %line,
                                error = %error,
                                "Ignoring unparseable SSE chunk"
                            );
                        }
                        SseEvent::Chunk(chunk) => {
                            let finished = chunk.done;
                            if tx.send(Ok(chunk)).await.is_err() {
                                return; // receiver dropped
                            }
                            if finished {
                                return;
                            }
                        }
                    }
                }
            }

            // Stream ended without [DONE]
            let _ = tx.send(Ok(done_chunk(None, None))).await;
        });

        Ok(rx)
    }
}

/// Remove every complete line from `buffer` and decode it.
///
/// A trailing partial line stays buffered, so a multi-byte character split
/// across network chunks is decoded only once both halves have arrived.
fn drain_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let Some(last_newline) = buffer.iter().rposition(|&b| b == b'\n') else {
        return Vec::new();
    };
    let complete: Vec<u8> = buffer.drain(..=last_newline).collect();
    complete[..last_newline]
        .split(|&b| b == b'\n')
        .map(|line| {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            String::from_utf8_lossy(line).into_owned()
        })
        .collect()
}

fn done_chunk(usage: Option<Usage>, cost_usd: Option<f64>) -> StreamChunk {
    StreamChunk {
        content: None,
        done: true,
        usage,
        cost_usd,
    }
}

/// What one SSE line means for the stream.
#[derive(Debug)]
enum SseEvent {
    /// Blank line, comment, or a chunk with nothing to forward
    Skip,
    Done,
    Chunk(StreamChunk),
    Invalid(String),
}

fn parse_sse_line(line: &str) -> SseEvent {
    if line.is_empty() || line.starts_with(':') {
        return SseEvent::Skip;
    }
    let Some(data) = line.strip_prefix("data:") else {
        return SseEvent::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseEvent::Done;
    }

    let parsed: StreamResponse = match serde_json::from_str(data) {
        Ok(p) => p,
        Err(e) => return SseEvent::Invalid(e.to_string()),
    };

    // Usage arrives in the final chunk when stream_options.include_usage is set
    if let Some(usage) = parsed.usage {
        let cost = usage.cost;
        let content = parsed
            .choices
            .first()
            .and_then(|c| c.delta.content.clone())
            .filter(|c| !c.is_empty());
        return SseEvent::Chunk(StreamChunk {
            content,
            done: true,
            usage: Some(usage.into_usage()),
            cost_usd: cost,
        });
    }

    match parsed.choices.first().and_then(|c| c.delta.content.clone()) {
        Some(content) if !content.is_empty() => SseEvent::Chunk(StreamChunk {
            content: Some(content),
            ..StreamChunk::default()
        }),
        _ => SseEvent::Skip,
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
    /// OpenRouter reports spend here
    #[serde(default)]
    cost: Option<f64>,
}

impl ApiUsage {
    fn into_usage(self) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
        }
    }
}

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openrouter_constructor() {
        let provider = OpenAiCompatProvider::openrouter("sk-test").unwrap();
        assert_eq!(provider.name(), "openrouter");
        assert!(provider.base_url.contains("openrouter.ai"));
    }

    #[test]
    fn ollama_constructor() {
        let provider = OpenAiCompatProvider::ollama(None).unwrap();
        assert_eq!(provider.name(), "ollama");
        assert!(provider.base_url.contains("localhost:11434"));
    }

    #[test]
    fn trailing_slash_trimmed() {
        let provider = OpenAiCompatProvider::new("x", "http://host/v1/", "k").unwrap();
        assert_eq!(provider.base_url(), "http://host/v1");
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You are helpful"), Message::user("Hello")];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn stream_body_requests_usage() {
        let mut request = ProviderRequest::new("m", vec![Message::user("hi")]);
        request.max_tokens = Some(100);
        let body = OpenAiCompatProvider::request_body(&request, true);
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["max_tokens"], 100);

        let plain = OpenAiCompatProvider::request_body(&request, false);
        assert!(plain.get("stream_options").is_none());
    }

    #[test]
    fn parse_response_with_cost() {
        let data = r#"{"model":"anthropic/claude-sonnet-4","choices":[{"message":{"role":"assistant","content":"<end_task>ok</end_task>"}}],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15,"cost":0.0012}}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.usage.as_ref().unwrap().cost, Some(0.0012));
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("<end_task>ok</end_task>")
        );
    }

    // --- SSE parsing tests ---

    #[test]
    fn sse_content_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        match parse_sse_line(line) {
            SseEvent::Chunk(chunk) => {
                assert_eq!(chunk.content.as_deref(), Some("Hello"));
                assert!(!chunk.done);
            }
            other => panic!("expected chunk, got {other:?}"),
        }
    }

    #[test]
    fn sse_finish_without_content_is_skipped() {
        let line = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert!(matches!(parse_sse_line(line), SseEvent::Skip));
    }

    #[test]
    fn sse_usage_chunk_is_final() {
        let line = r#"data: {"choices":[],"usage":{"prompt_tokens":3,"completion_tokens":4,"total_tokens":7,"cost":0.5}}"#;
        match parse_sse_line(line) {
            SseEvent::Chunk(chunk) => {
                assert!(chunk.done);
                assert_eq!(chunk.usage.unwrap().total_tokens, 7);
                assert_eq!(chunk.cost_usd, Some(0.5));
            }
            other => panic!("expected chunk, got {other:?}"),
        }
    }

    #[test]
    fn sse_done_comment_and_garbage() {
        assert!(matches!(parse_sse_line("data: [DONE]"), SseEvent::Done));
        assert!(matches!(parse_sse_line(": keep-alive"), SseEvent::Skip));
        assert!(matches!(parse_sse_line(""), SseEvent::Skip));
        assert!(matches!(parse_sse_line("data: {nope"), SseEvent::Invalid(_)));
    }

    #[test]
    fn lines_are_decoded_only_when_complete() {
        let mut buffer = Vec::new();
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"café\"}}]}\r\n";
        let bytes = line.as_bytes();
        // Split between the two bytes of 'é' (0xC3 0xA9)
        let split = line.find('é').unwrap() + 1;

        buffer.extend_from_slice(&bytes[..split]);
        assert!(drain_lines(&mut buffer).is_empty());
        assert_eq!(buffer.len(), split);

        buffer.extend_from_slice(&bytes[split..]);
        buffer.extend_from_slice(b"data: [DONE]\n: partial");
        let lines = drain_lines(&mut buffer);
        assert_eq!(lines.len(), 2);
        assert!(!lines[0].contains('\u{FFFD}'));
        match parse_sse_line(&lines[0]) {
            SseEvent::Chunk(chunk) => assert_eq!(chunk.content.as_deref(), Some("café")),
            other => panic!("expected chunk, got {other:?}"),
        }
        assert!(matches!(parse_sse_line(&lines[1]), SseEvent::Done));
        assert_eq!(buffer, b": partial");
    }

    #[tokio::test]
    async fn cancelled_before_connect() {
        let provider = OpenAiCompatProvider::new("x", "http://127.0.0.1:9", "k").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = provider
            .stream(ProviderRequest::new("m", vec![Message::user("hi")]), cancel)
            .await;
        // Either the cancel branch or the refused connection wins the race
        assert!(matches!(
            result,
            Err(ProviderError::StreamInterrupted(_)) | Err(ProviderError::Network(_))
        ));
    }
}
