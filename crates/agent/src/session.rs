//! Per-run session state.
//!
//! The entry point creates one `SessionContext`, hands it to the agent,
//! and tears it down when the run ends. All mutable agent state lives
//! here behind async mutexes; lock in field order (conversation,
//! escalation, phases) when more than one is needed.

use codewright_core::agent::{ModelTier, PhaseSpec};
use codewright_core::event::EventBus;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::conversation::ConversationBuffer;
use crate::escalation::ModelEscalation;
use crate::phase::PhaseController;

pub struct SessionContext {
    pub conversation: Mutex<ConversationBuffer>,
    pub escalation: Mutex<ModelEscalation>,
    pub phases: Mutex<PhaseController>,
    pub events: Arc<EventBus>,
}

impl SessionContext {
    pub fn new(
        system_instructions: Option<String>,
        tiers: Vec<ModelTier>,
        phases: Vec<PhaseSpec>,
        events: Arc<EventBus>,
    ) -> Self {
        let mut conversation = ConversationBuffer::new();
        conversation.set_system_instructions(system_instructions);

        Self {
            conversation: Mutex::new(conversation),
            escalation: Mutex::new(ModelEscalation::new(tiers).with_events(events.clone())),
            phases: Mutex::new(PhaseController::new(phases).with_events(events.clone())),
            events,
        }
    }

    /// Drop all conversation, retry and phase state.
    pub async fn teardown(&self) {
        self.conversation.lock().await.clear();
        self.escalation.lock().await.reset();
        self.phases.lock().await.reset();
        debug!("Session torn down");
    }
}
