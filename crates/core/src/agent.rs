//! Static agent configuration types: the model escalation ladder and the
//! task phases.

use serde::{Deserialize, Serialize};

/// One rung of the model escalation ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTier {
    /// Model identifier passed to the provider
    pub model: String,

    /// How many tries a single target may spend on this tier
    pub max_write_tries: u32,

    /// Upper bound on the global try count while this tier is active
    pub max_global_tries: u32,

    #[serde(default)]
    pub description: String,
}

impl ModelTier {
    pub fn new(
        model: impl Into<String>,
        max_write_tries: u32,
        max_global_tries: u32,
        description: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            max_write_tries,
            max_global_tries,
            description: description.into(),
        }
    }
}

/// The built-in four-tier ladder, cheapest first.
pub fn default_model_tiers() -> Vec<ModelTier> {
    vec![
        ModelTier::new(
            "anthropic/claude-3.5-haiku",
            2,
            4,
            "Fast default for first attempts",
        ),
        ModelTier::new(
            "anthropic/claude-sonnet-4",
            3,
            8,
            "Stronger model once a file resists a quick fix",
        ),
        ModelTier::new(
            "openai/o3-mini",
            3,
            12,
            "Reasoning model for repeated failures",
        ),
        ModelTier::new(
            "anthropic/claude-opus-4",
            5,
            20,
            "Most capable model, used as the floor",
        ),
    ]
}

/// A named stage of a multi-step task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSpec {
    pub name: String,

    /// Model used while this phase is active
    pub model: String,

    /// Prompt template rendered on entry. Receives `findings` (list of
    /// strings from earlier phases) and `message` (the continuation text).
    pub prompt: String,
}

impl PhaseSpec {
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            prompt: prompt.into(),
        }
    }
}

/// Exploration → implementation → review.
pub fn default_phases() -> Vec<PhaseSpec> {
    vec![
        PhaseSpec::new(
            "exploration",
            "anthropic/claude-3.5-haiku",
            "Explore the repository and collect what is needed for the task. \
             Use read_file, search_string and git_diff. When you understand the \
             code, summarise it inside <complete_phase>...</complete_phase>.\n\n{{ message }}",
        ),
        PhaseSpec::new(
            "implementation",
            "anthropic/claude-sonnet-4",
            "Implement the change.\n\nFindings so far:\n\
             {% for finding in findings %}- {{ finding }}\n{% endfor %}\n{{ message }}",
        ),
        PhaseSpec::new(
            "review",
            "anthropic/claude-sonnet-4",
            "Review the diff with git_diff and fix anything wrong. Finish with \
             <end_task>...</end_task>.\n\nFindings:\n\
             {% for finding in findings %}- {{ finding }}\n{% endfor %}\n{{ message }}",
        ),
    ]
}
