//! Error types for the Codewright domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] wraps them all.

use thiserror::Error;

/// The top-level error type for all Codewright operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Action errors ---
    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    // --- Conversation buffer misuse ---
    #[error("Conversation error: {0}")]
    Conversation(#[from] ConversationError),

    // --- External collaborator failures ---
    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    // --- Interactive session ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Why a parameter failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamProblem {
    /// The parameter tag was absent or empty.
    Missing,
    /// The parameter was present but could not be read as the declared kind.
    WrongType { expected: String, found: String },
}

impl std::fmt::Display for ParamProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "not provided"),
            Self::WrongType { expected, found } => {
                write!(f, "wrong type (expected {expected}, got '{found}')")
            }
        }
    }
}

/// Failures raised while turning model output into executed actions.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{message}")]
    MalformedTag { message: String },

    #[error("Unknown action type: {tag}")]
    UnknownAction { tag: String },

    #[error("Invalid parameter '{param}' for {action}: {problem}")]
    Validation {
        action: String,
        param: String,
        problem: ParamProblem,
    },

    /// A side-effecting handler failed. Displays the cause unmodified so the
    /// model sees the real filesystem/network message.
    #[error("{source}")]
    Handler {
        action: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ActionError {
    /// Wrap any handler-side failure, keeping it as the error source.
    pub fn handler(
        action: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Handler {
            action: action.into(),
            source: source.into(),
        }
    }

    /// Shorthand for a missing required parameter.
    pub fn missing(action: impl Into<String>, param: impl Into<String>) -> Self {
        Self::Validation {
            action: action.into(),
            param: param.into(),
            problem: ParamProblem::Missing,
        }
    }
}

/// Caller contract violations against the conversation buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error("Invalid role '{0}': expected one of user, assistant, system")]
    InvalidRole(String),

    #[error("Message content cannot be empty")]
    EmptyContent,
}

/// Failures from the external collaborators (filesystem, git, search, network).
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("{path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("git: {0}")]
    Git(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("No input received within {secs}s")]
    Timeout { secs: u64 },

    #[error("Request cancelled")]
    Cancelled,
}
