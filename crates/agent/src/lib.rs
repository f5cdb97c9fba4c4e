//! The Codewright agent.
//!
//! The agent follows an **Act → Observe → Escalate** cycle:
//!
//! 1. **Receive** a task from the user
//! 2. **Send** the bounded conversation to the model picked by the escalation policy
//! 3. **Dispatch** the action tags in the response against the workspace
//! 4. **Feed back** the results; files that keep failing move to stronger models
//! 5. **Stop** when the model calls `end_task`
//!
//! Multi-phase tasks advance on `complete_phase`, dropping the finished
//! phase's messages and carrying its findings forward.

pub mod conversation;
pub mod escalation;
pub mod interactive;
pub mod phase;
pub mod runner;
pub mod session;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use conversation::ConversationBuffer;
pub use escalation::ModelEscalation;
pub use interactive::{InteractiveSession, SessionExit, SessionNotice};
pub use phase::{PhaseController, PhaseTransition};
pub use runner::{Agent, ExecuteOptions, TurnExecutor, TurnOutcome, default_system_instructions};
pub use session::SessionContext;
pub use stream_event::AgentStreamEvent;
