//! Domain event system — decoupled observability for the agent core.
//!
//! Events are published when something interesting happens in the system.
//! Front-ends and tests subscribe and filter for what they care about.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::provider::Usage;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The escalation policy resolved a model after a try-count update.
    /// Emitted for every update, whether or not the model changed.
    ModelEscalation {
        target: String,
        count: u32,
        max_tries: u32,
        model: String,
        changed: bool,
        timestamp: DateTime<Utc>,
    },

    /// The model produced a response
    ResponseGenerated {
        model: String,
        usage: Option<Usage>,
        cost_usd: Option<f64>,
        timestamp: DateTime<Utc>,
    },

    /// An action handler ran
    ActionExecuted {
        action: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The task moved to its next phase
    PhaseTransitioned {
        from: String,
        to: String,
        model: String,
        timestamp: DateTime<Utc>,
    },

    /// An in-flight turn was cancelled
    TurnCancelled {
        input_preview: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
