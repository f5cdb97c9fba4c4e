//! Turn-level progress events for front-ends.
//!
//! `AgentStreamEvent` wraps provider stream chunks and dispatch outcomes
//! into events a terminal (or any other front-end) can render as they
//! happen.

use codewright_core::provider::Usage;
use serde::{Deserialize, Serialize};

/// Events emitted by the agent while a turn runs.
///
/// - `chunk`  — partial text from the model
/// - `action` — an action finished
/// - `phase`  — the task entered a new phase
/// - `done`   — a model round finished
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    /// Partial text from the model.
    Chunk { content: String },

    /// An action ran.
    Action {
        name: String,
        success: bool,
        feedback: String,
    },

    /// The task moved to a new phase.
    Phase { name: String, model: String },

    /// One model round is complete.
    Done {
        model: String,
        usage: Option<Usage>,
        round: u32,
    },
}

impl AgentStreamEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::Action { .. } => "action",
            Self::Phase { .. } => "phase",
            Self::Done { .. } => "done",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_chunk() {
        let event = AgentStreamEvent::Chunk {
            content: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"chunk""#));
        assert!(json.contains(r#""content":"Hello""#));
    }

    #[test]
    fn event_serialization_action() {
        let event = AgentStreamEvent::Action {
            name: "write_file".into(),
            success: true,
            feedback: "Wrote 3 bytes to a.rs".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"action""#));
        assert_eq!(event.event_type(), "action");
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"phase","name":"review","model":"m"}"#;
        let event: AgentStreamEvent = serde_json::from_str(json).unwrap();
        match event {
            AgentStreamEvent::Phase { name, .. } => assert_eq!(name, "review"),
            _ => panic!("Wrong variant"),
        }
    }
}
