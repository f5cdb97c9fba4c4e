//! The agent turn loop.
//!
//! One turn:
//!
//! 1. **Append** the user input (and, on the first turn, the first phase prompt)
//! 2. **Trim** the conversation to the token budget
//! 3. **Call** the model with the escalation policy's current model
//! 4. **Commit** the complete assistant text, never a partial stream
//! 5. **Dispatch** the actions in it and update try counts
//! 6. **End** on `end_task`, **advance** on `complete_phase`, otherwise
//!    feed the results back and loop
//!
//! The loop stops after `max_rounds` model calls.

use async_trait::async_trait;
use chrono::Utc;
use codewright_actions::handlers::{complete_phase, end_task};
use codewright_actions::{ActionRegistry, Dispatch, describe_actions};
use codewright_core::error::{Error, Result, SessionError};
use codewright_core::event::DomainEvent;
use codewright_core::message::Role;
use codewright_core::provider::{Provider, ProviderRequest, ProviderResponse};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::session::SessionContext;
use crate::stream_event::AgentStreamEvent;

const EMPTY_RESPONSE_FEEDBACK: &str =
    "Error: your response was empty. Reply with at least one action tag.";

const SYSTEM_PREAMBLE: &str = "You are Codewright, an autonomous coding agent working inside a \
software repository. You act only by emitting action tags; every action's result is returned \
to you in the next message. Work in small verified steps. When the task is done, reply with \
<end_task> and a short summary for the user.";

/// Default system instructions: the preamble plus every registered action.
pub fn default_system_instructions(actions: &ActionRegistry) -> String {
    format!("{SYSTEM_PREAMBLE}\n\n{}", describe_actions(actions))
}

/// Per-call options for [`Agent::execute`].
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Upper bound on the whole turn
    pub timeout: Option<Duration>,
    /// Stream model output instead of waiting for the full response
    pub stream: bool,
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model called `end_task`
    Completed { message: String },
    /// `max_rounds` model calls went by without `end_task`
    RoundLimit { rounds: u32 },
}

/// Anything that can run a turn for the interactive loop.
#[async_trait]
pub trait TurnExecutor: Send + Sync {
    async fn execute(
        &self,
        input: &str,
        options: &ExecuteOptions,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome>;

    /// Release session state at the end of a run.
    async fn cleanup(&self) {}
}

/// The coding agent.
pub struct Agent {
    provider: Arc<dyn Provider>,
    actions: Arc<ActionRegistry>,
    session: Arc<SessionContext>,
    temperature: f32,
    max_tokens: Option<u32>,
    max_rounds: u32,
    context_budget: usize,
    progress: Option<mpsc::UnboundedSender<AgentStreamEvent>>,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn Provider>,
        actions: Arc<ActionRegistry>,
        session: Arc<SessionContext>,
    ) -> Self {
        Self {
            provider,
            actions,
            session,
            temperature: 0.2,
            max_tokens: None,
            max_rounds: 25,
            context_budget: 100_000,
            progress: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the maximum number of model calls per turn.
    pub fn with_max_rounds(mut self, max: u32) -> Self {
        self.max_rounds = max;
        self
    }

    /// Set the conversation token budget enforced before each model call.
    pub fn with_context_budget(mut self, tokens: usize) -> Self {
        self.context_budget = tokens;
        self
    }

    /// Send progress events (stream chunks, action results) to `tx`.
    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<AgentStreamEvent>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    fn emit(&self, event: AgentStreamEvent) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(event);
        }
    }

    /// Run one turn for `input`.
    pub async fn execute(
        &self,
        input: &str,
        options: &ExecuteOptions,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome> {
        match options.timeout {
            Some(limit) => tokio::time::timeout(limit, self.run_turn(input, options.stream, &cancel))
                .await
                .map_err(|_| {
                    Error::from(SessionError::Timeout {
                        secs: limit.as_secs(),
                    })
                })?,
            None => self.run_turn(input, options.stream, &cancel).await,
        }
    }

    async fn run_turn(
        &self,
        input: &str,
        stream: bool,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        self.start_turn(input).await?;

        for round in 1..=self.max_rounds {
            if cancel.is_cancelled() {
                return Err(SessionError::Cancelled.into());
            }

            let request = self.next_request().await;
            debug!(round, model = %request.model, "Calling model");

            let response = self.call_model(request, stream, cancel).await?;
            self.session.events.publish(DomainEvent::ResponseGenerated {
                model: response.model.clone(),
                usage: response.usage.clone(),
                cost_usd: response.cost_usd,
                timestamp: Utc::now(),
            });
            self.emit(AgentStreamEvent::Done {
                model: response.model.clone(),
                usage: response.usage.clone(),
                round,
            });

            if response.content.trim().is_empty() {
                warn!(round, "Model returned an empty response");
                self.session
                    .conversation
                    .lock()
                    .await
                    .add_message(Role::User, EMPTY_RESPONSE_FEEDBACK)?;
                continue;
            }

            self.session
                .conversation
                .lock()
                .await
                .add_message(Role::Assistant, response.content.as_str())?;

            let dispatch = self.actions.dispatch(&response.content).await;
            self.post_process(&dispatch).await;

            if let Some(record) = dispatch.succeeded(end_task::TAG) {
                let message = record.result.to_feedback();
                info!(round, "Task completed");
                return Ok(TurnOutcome::Completed { message });
            }

            if let Some(record) = dispatch.succeeded(complete_phase::TAG)
                && self.advance_phase(record.result.to_feedback()).await?
            {
                continue;
            }

            self.session
                .conversation
                .lock()
                .await
                .add_message(Role::User, render_feedback(&dispatch))?;
        }

        warn!(rounds = self.max_rounds, "Round limit reached");
        Ok(TurnOutcome::RoundLimit {
            rounds: self.max_rounds,
        })
    }

    async fn start_turn(&self, input: &str) -> Result<()> {
        let mut conversation = self.session.conversation.lock().await;
        conversation.add_message(Role::User, input)?;

        let mut escalation = self.session.escalation.lock().await;
        let mut phases = self.session.phases.lock().await;
        if let Some(entered) = phases.begin(&mut conversation, &mut escalation)? {
            conversation.add_message(Role::User, entered.prompt)?;
            self.emit(AgentStreamEvent::Phase {
                name: entered.phase,
                model: entered.selected_model,
            });
        }
        Ok(())
    }

    async fn next_request(&self) -> ProviderRequest {
        let messages = {
            let mut conversation = self.session.conversation.lock().await;
            conversation.cleanup_context(self.context_budget);
            conversation.get_messages()
        };
        let model = self
            .session
            .escalation
            .lock()
            .await
            .current_model()
            .to_string();

        let mut request = ProviderRequest::new(model, messages);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request
    }

    /// Call the model, giving up as soon as `cancel` fires. Streamed text is
    /// accumulated and only returned once the stream finishes.
    async fn call_model(
        &self,
        request: ProviderRequest,
        stream: bool,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse> {
        let model = request.model.clone();

        if !stream {
            return tokio::select! {
                response = self.provider.complete(request) => Ok(response?),
                () = cancel.cancelled() => Err(SessionError::Cancelled.into()),
            };
        }

        let mut rx = tokio::select! {
            rx = self.provider.stream(request, cancel.clone()) => match rx {
                Ok(rx) => rx,
                Err(_) if cancel.is_cancelled() => return Err(SessionError::Cancelled.into()),
                Err(e) => return Err(e.into()),
            },
            () = cancel.cancelled() => return Err(SessionError::Cancelled.into()),
        };

        let mut content = String::new();
        let mut usage = None;
        let mut cost_usd = None;

        loop {
            let next = tokio::select! {
                chunk = rx.recv() => chunk,
                () = cancel.cancelled() => return Err(SessionError::Cancelled.into()),
            };

            match next {
                None => break,
                Some(Err(_)) if cancel.is_cancelled() => {
                    return Err(SessionError::Cancelled.into());
                }
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(chunk)) => {
                    if let Some(text) = chunk.content {
                        self.emit(AgentStreamEvent::Chunk {
                            content: text.clone(),
                        });
                        content.push_str(&text);
                    }
                    if chunk.usage.is_some() {
                        usage = chunk.usage;
                    }
                    if chunk.cost_usd.is_some() {
                        cost_usd = chunk.cost_usd;
                    }
                    if chunk.done {
                        break;
                    }
                }
            }
        }

        Ok(ProviderResponse {
            content,
            usage,
            cost_usd,
            model,
        })
    }

    /// Publish action events and bump try counts for post-processed actions.
    async fn post_process(&self, dispatch: &Dispatch) {
        for record in &dispatch.records {
            self.session.events.publish(DomainEvent::ActionExecuted {
                action: record.tag.clone(),
                success: record.result.success,
                duration_ms: record.duration_ms,
                timestamp: Utc::now(),
            });
            self.emit(AgentStreamEvent::Action {
                name: record.tag.clone(),
                success: record.result.success,
                feedback: record.result.to_feedback(),
            });

            if record.requires_post_processing
                && let Some(target) = record.params.text("path")
            {
                self.session
                    .escalation
                    .lock()
                    .await
                    .increment_try_count(target);
            }
        }
    }

    /// Record a finding and move to the next phase. Returns whether the
    /// caller should regenerate with the new phase prompt.
    async fn advance_phase(&self, finding: String) -> Result<bool> {
        let mut conversation = self.session.conversation.lock().await;
        let mut escalation = self.session.escalation.lock().await;
        let mut phases = self.session.phases.lock().await;

        phases.record_finding(finding);
        let transition = phases.transition_to_next_phase(&mut conversation, &mut escalation)?;
        if !transition.regenerate {
            return Ok(false);
        }

        conversation.add_message(Role::User, transition.prompt)?;
        self.emit(AgentStreamEvent::Phase {
            name: transition.phase,
            model: transition.selected_model,
        });
        Ok(true)
    }
}

#[async_trait]
impl TurnExecutor for Agent {
    async fn execute(
        &self,
        input: &str,
        options: &ExecuteOptions,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome> {
        Agent::execute(self, input, options, cancel).await
    }

    async fn cleanup(&self) {
        self.session.teardown().await;
    }
}

/// The message fed back to the model after a dispatch round.
fn render_feedback(dispatch: &Dispatch) -> String {
    if dispatch.records.is_empty() {
        return dispatch.result.to_feedback();
    }
    dispatch
        .records
        .iter()
        .map(|r| format!("[{}] {}", r.tag, r.result.to_feedback()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
