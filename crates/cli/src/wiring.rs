//! Assemble the agent from configuration.

use codewright_actions::{HandlerSettings, builtin_registry, describe_actions};
use codewright_agent::{Agent, AgentStreamEvent, SessionContext, default_system_instructions};
use codewright_config::AppConfig;
use codewright_core::event::EventBus;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

pub struct Wired {
    pub agent: Arc<Agent>,
    pub session: Arc<SessionContext>,
    pub events: Arc<EventBus>,
    pub root: PathBuf,
}

/// The repository the agent works in, relative paths taken from the
/// current directory.
pub fn workspace_root(config: &AppConfig) -> PathBuf {
    if config.workspace.root.is_absolute() {
        return config.workspace.root.clone();
    }
    std::env::current_dir()
        .unwrap_or_default()
        .join(&config.workspace.root)
}

pub fn wire(
    config: &AppConfig,
    progress: mpsc::UnboundedSender<AgentStreamEvent>,
) -> Result<Wired, Box<dyn std::error::Error>> {
    let provider = codewright_providers::build_from_config(config)?;

    let root = workspace_root(config);
    let workspace = codewright_tools::local_workspace(&root)?;
    let actions = Arc::new(builtin_registry(
        &workspace,
        HandlerSettings {
            diff_exclude: config.workspace.diff_exclude.clone(),
            search_max_results: config.workspace.search_max_results,
            path_threshold: config.workspace.path_threshold,
        },
    ));

    let instructions = match &config.system_prompt {
        Some(prompt) => format!("{prompt}\n\n{}", describe_actions(&actions)),
        None => default_system_instructions(&actions),
    };

    let events = Arc::new(EventBus::default());
    let session = Arc::new(SessionContext::new(
        Some(instructions),
        config.models.clone(),
        config.phases.clone(),
        events.clone(),
    ));

    let agent = Agent::new(provider, actions, session.clone())
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens)
        .with_max_rounds(config.session.max_rounds)
        .with_context_budget(config.context.max_tokens)
        .with_progress(progress);

    info!(
        root = %root.display(),
        provider = %config.provider.name,
        tiers = config.models.len(),
        phases = config.phases.len(),
        "Agent ready"
    );

    Ok(Wired {
        agent: Arc::new(agent),
        session,
        events,
        root,
    })
}
