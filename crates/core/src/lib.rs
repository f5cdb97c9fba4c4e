//! # Codewright Core
//!
//! Domain types, traits, and error definitions for the Codewright coding
//! agent. This crate performs no I/O — it defines the domain model that all
//! other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every side-effecting subsystem (model provider, filesystem, git, search,
//! network) is a trait here. Implementations live in their respective
//! crates, so the agent core can be driven entirely by fakes in tests.

pub mod action;
pub mod agent;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod workspace;

// Re-export key types at crate root for ergonomics
pub use action::{ActionErrorKind, ActionFailure, ActionResult};
pub use agent::{ModelTier, PhaseSpec, default_model_tiers, default_phases};
pub use error::{
    ActionError, CollaboratorError, ConversationError, Error, ParamProblem, ProviderError, Result,
    SessionError,
};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, Role};
pub use provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
pub use workspace::{
    FileSystem, Fetcher, GitClient, PathAdjuster, SearchMatch, Searcher, Workspace,
};
