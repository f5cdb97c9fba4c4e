//! Phase transitions for multi-step tasks.
//!
//! A task moves strictly forward through its phases. Entering a phase
//! drops the previous phase's scoped messages, resets escalation onto the
//! phase's model, and renders the phase prompt from the findings gathered
//! so far. The last phase has no successor; transitioning from it changes
//! nothing.

use chrono::Utc;
use codewright_core::agent::PhaseSpec;
use codewright_core::error::{Error, Result};
use codewright_core::event::{DomainEvent, EventBus};
use minijinja::{Environment, context};
use std::sync::Arc;
use tracing::{debug, info};

use crate::conversation::ConversationBuffer;
use crate::escalation::ModelEscalation;

/// Message rendered into a phase prompt when the agent enters it.
pub const CONTINUATION_MESSAGE: &str =
    "Continue the task from where the previous phase left off, using the findings above.";

/// Message rendered into the first phase's prompt.
pub const START_MESSAGE: &str = "Begin with the task described above.";

/// What the runner must do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTransition {
    /// Re-issue the model call with `prompt` and `selected_model`
    pub regenerate: bool,
    pub prompt: String,
    pub selected_model: String,
    pub phase: String,
}

pub struct PhaseController {
    phases: Vec<PhaseSpec>,
    index: usize,
    started: bool,
    findings: Vec<String>,
    env: Environment<'static>,
    events: Option<Arc<EventBus>>,
}

impl PhaseController {
    pub fn new(phases: Vec<PhaseSpec>) -> Self {
        Self {
            phases,
            index: 0,
            started: false,
            findings: Vec::new(),
            env: Environment::new(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn current(&self) -> Option<&PhaseSpec> {
        self.phases.get(self.index)
    }

    pub fn is_terminal(&self) -> bool {
        self.index + 1 >= self.phases.len()
    }

    pub fn findings(&self) -> &[String] {
        &self.findings
    }

    pub fn record_finding(&mut self, finding: impl Into<String>) {
        self.findings.push(finding.into());
    }

    fn render(&self, phase: &PhaseSpec, message: &str) -> Result<String> {
        self.env
            .render_str(
                &phase.prompt,
                context! { findings => &self.findings, message => message },
            )
            .map_err(|e| Error::Config {
                message: format!("phase '{}' prompt template: {e}", phase.name),
            })
    }

    /// Enter the first phase. Returns its rendered prompt, or `None` when
    /// no phases are configured or the task already started.
    pub fn begin(
        &mut self,
        buffer: &mut ConversationBuffer,
        escalation: &mut ModelEscalation,
    ) -> Result<Option<PhaseTransition>> {
        if self.started {
            return Ok(None);
        }
        let Some(phase) = self.phases.first().cloned() else {
            return Ok(None);
        };

        self.started = true;
        self.index = 0;
        buffer.set_scope(Some(phase.name.clone()));
        escalation.enter_phase(&phase.model);

        let prompt = self.render(&phase, START_MESSAGE)?;
        info!(phase = %phase.name, model = %phase.model, "Entering first phase");

        Ok(Some(PhaseTransition {
            regenerate: true,
            prompt,
            selected_model: phase.model,
            phase: phase.name,
        }))
    }

    /// Advance to the next phase.
    ///
    /// At the last phase this is a no-op that reports the current prompt
    /// and model with `regenerate: false`.
    pub fn transition_to_next_phase(
        &mut self,
        buffer: &mut ConversationBuffer,
        escalation: &mut ModelEscalation,
    ) -> Result<PhaseTransition> {
        let Some(current) = self.current().cloned() else {
            return Ok(PhaseTransition {
                regenerate: false,
                prompt: String::new(),
                selected_model: escalation.current_model().to_string(),
                phase: String::new(),
            });
        };

        if self.is_terminal() {
            debug!(phase = %current.name, "Already in final phase");
            return Ok(PhaseTransition {
                regenerate: false,
                prompt: self.render(&current, CONTINUATION_MESSAGE)?,
                selected_model: escalation.current_model().to_string(),
                phase: current.name,
            });
        }

        let evicted = buffer.evict_scope(&current.name);
        self.index += 1;
        self.started = true;
        let next = self.phases[self.index].clone();

        buffer.set_scope(Some(next.name.clone()));
        escalation.enter_phase(&next.model);

        let prompt = self.render(&next, CONTINUATION_MESSAGE)?;

        info!(
            from = %current.name,
            to = %next.name,
            model = %next.model,
            evicted,
            "Phase transition"
        );
        if let Some(events) = &self.events {
            events.publish(DomainEvent::PhaseTransitioned {
                from: current.name.clone(),
                to: next.name.clone(),
                model: next.model.clone(),
                timestamp: Utc::now(),
            });
        }

        Ok(PhaseTransition {
            regenerate: true,
            prompt,
            selected_model: next.model,
            phase: next.name,
        })
    }

    /// Back to the first phase with no findings.
    pub fn reset(&mut self) {
        self.index = 0;
        self.started = false;
        self.findings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codewright_core::agent::{ModelTier, default_model_tiers};
    use codewright_core::message::Role;

    fn phases() -> Vec<PhaseSpec> {
        vec![
            PhaseSpec::new("explore", "model-a", "Explore. {{ message }}"),
            PhaseSpec::new(
                "build",
                "model-b",
                "Build.{% for f in findings %} [{{ f }}]{% endfor %} {{ message }}",
            ),
        ]
    }

    #[test]
    fn begin_enters_first_phase_once() {
        let mut ctl = PhaseController::new(phases());
        let mut buf = ConversationBuffer::new();
        let mut esc = ModelEscalation::new(default_model_tiers());

        let t = ctl.begin(&mut buf, &mut esc).unwrap().unwrap();
        assert_eq!(t.phase, "explore");
        assert_eq!(t.prompt, format!("Explore. {START_MESSAGE}"));
        assert_eq!(esc.current_model(), "model-a");

        assert!(ctl.begin(&mut buf, &mut esc).unwrap().is_none());
    }

    #[test]
    fn transition_evicts_scope_and_renders_findings() {
        let mut ctl = PhaseController::new(phases());
        let mut buf = ConversationBuffer::new();
        let mut esc = ModelEscalation::new(default_model_tiers());

        buf.add_message(Role::User, "the task").unwrap();
        ctl.begin(&mut buf, &mut esc).unwrap();
        buf.add_message(Role::Assistant, "<read_file>...</read_file>").unwrap();
        esc.set_try_count("a.rs", 3);

        ctl.record_finding("parser in src/parse.rs");
        let t = ctl.transition_to_next_phase(&mut buf, &mut esc).unwrap();

        assert!(t.regenerate);
        assert_eq!(t.selected_model, "model-b");
        assert_eq!(
            t.prompt,
            format!("Build. [parser in src/parse.rs] {CONTINUATION_MESSAGE}")
        );
        assert_eq!(esc.current_model(), "model-b");
        assert_eq!(esc.try_count("a.rs"), 0);

        let contents: Vec<_> = buf.get_messages().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["the task"]);
    }

    #[test]
    fn terminal_phase_is_a_no_op() {
        let mut ctl = PhaseController::new(phases());
        let mut buf = ConversationBuffer::new();
        let mut esc = ModelEscalation::new(vec![ModelTier::new("m0", 2, 4, "")]);

        ctl.begin(&mut buf, &mut esc).unwrap();
        ctl.transition_to_next_phase(&mut buf, &mut esc).unwrap();
        buf.add_message(Role::User, "review notes").unwrap();

        let t = ctl.transition_to_next_phase(&mut buf, &mut esc).unwrap();
        assert!(!t.regenerate);
        assert_eq!(t.phase, "build");
        assert_eq!(t.selected_model, "model-b");
        assert_eq!(buf.len(), 1);
        assert!(ctl.is_terminal());
    }

    #[test]
    fn bad_template_is_a_config_error() {
        let mut ctl = PhaseController::new(vec![PhaseSpec::new("x", "m", "{% for %}")]);
        let mut buf = ConversationBuffer::new();
        let mut esc = ModelEscalation::new(default_model_tiers());
        let err = ctl.begin(&mut buf, &mut esc).unwrap_err();
        assert!(err.to_string().contains("phase 'x'"));
    }

    #[tokio::test]
    async fn transition_publishes_event() {
        let bus = Arc::new(EventBus::new(8));
        let mut rx = bus.subscribe();
        let mut ctl = PhaseController::new(phases()).with_events(bus);
        let mut buf = ConversationBuffer::new();
        let mut esc = ModelEscalation::new(default_model_tiers());

        ctl.begin(&mut buf, &mut esc).unwrap();
        ctl.transition_to_next_phase(&mut buf, &mut esc).unwrap();

        match rx.recv().await.unwrap().as_ref() {
            DomainEvent::PhaseTransitioned { from, to, .. } => {
                assert_eq!(from, "explore");
                assert_eq!(to, "build");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
