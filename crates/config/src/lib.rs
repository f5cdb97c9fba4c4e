//! Configuration loading, validation, and management for Codewright.
//!
//! Loads configuration from `~/.codewright/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use codewright_core::agent::{ModelTier, PhaseSpec, default_model_tiers, default_phases};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.codewright/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider endpoint
    #[serde(default)]
    pub provider: ProviderSettings,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Override for the built-in system instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Model escalation ladder, cheapest first
    #[serde(default = "default_model_tiers")]
    pub models: Vec<ModelTier>,

    /// Task phases, in order
    #[serde(default = "default_phases")]
    pub phases: Vec<PhaseSpec>,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub workspace: WorkspaceConfig,
}

fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    8192
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("system_prompt", &self.system_prompt.is_some())
            .field("models", &self.models)
            .field("phases", &self.phases)
            .field("context", &self.context)
            .field("session", &self.session)
            .field("workspace", &self.workspace)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_provider_name")]
    pub name: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_provider_name() -> String {
    "openrouter".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Token budget for the conversation, system instructions included
    #[serde(default = "default_context_tokens")]
    pub max_tokens: usize,
}

fn default_context_tokens() -> usize {
    100_000
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_context_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Per-turn timeout for the interactive loop
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Stream model output
    #[serde(default = "default_true")]
    pub stream: bool,

    /// Inputs that end the interactive loop (case-insensitive)
    #[serde(default = "default_exit_keywords")]
    pub exit_keywords: Vec<String>,

    /// Model calls allowed per turn
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

fn default_timeout_secs() -> u64 {
    300
}
fn default_true() -> bool {
    true
}
fn default_exit_keywords() -> Vec<String> {
    vec!["exit".into(), "quit".into()]
}
fn default_max_rounds() -> u32 {
    25
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            stream: true,
            exit_keywords: default_exit_keywords(),
            max_rounds: default_max_rounds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Repository root. Relative action paths resolve against it.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Pathspecs excluded from `git_diff`
    #[serde(default = "default_diff_exclude")]
    pub diff_exclude: Vec<String>,

    #[serde(default = "default_search_max_results")]
    pub search_max_results: usize,

    /// Default similarity threshold for path correction
    #[serde(default = "default_path_threshold")]
    pub path_threshold: f64,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_diff_exclude() -> Vec<String> {
    vec![
        "Cargo.lock".into(),
        "package-lock.json".into(),
        "yarn.lock".into(),
        "pnpm-lock.yaml".into(),
    ]
}
fn default_search_max_results() -> usize {
    200
}
fn default_path_threshold() -> f64 {
    0.6
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            diff_exclude: default_diff_exclude(),
            search_max_results: default_search_max_results(),
            path_threshold: default_path_threshold(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.codewright/config.toml).
    ///
    /// Environment overrides:
    /// - `CODEWRIGHT_API_KEY`, then `OPENROUTER_API_KEY`, then `OPENAI_API_KEY`
    /// - `CODEWRIGHT_BASE_URL` for the provider endpoint
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("CODEWRIGHT_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(url) = std::env::var("CODEWRIGHT_BASE_URL") {
            config.provider.base_url = url;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".codewright")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.models.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one model tier is required".into(),
            ));
        }

        if let Some(tier) = self.models.iter().find(|t| t.max_write_tries == 0) {
            return Err(ConfigError::ValidationError(format!(
                "model tier '{}' must allow at least one write try",
                tier.model
            )));
        }

        // Escalation only moves forward if global limits never shrink
        if self
            .models
            .windows(2)
            .any(|w| w[1].max_global_tries < w[0].max_global_tries)
        {
            return Err(ConfigError::ValidationError(
                "max_global_tries must not decrease from one tier to the next".into(),
            ));
        }

        if self.phases.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one phase is required".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.workspace.path_threshold) {
            return Err(ConfigError::ValidationError(
                "workspace.path_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if self.session.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "session.timeout_secs must be > 0".into(),
            ));
        }

        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    /// Write the default config to `path` unless a file is already there.
    /// Returns whether a file was written.
    pub fn write_default(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            })?;
        }
        std::fs::write(path, Self::default_toml()).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(true)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: ProviderSettings::default(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: None,
            models: default_model_tiers(),
            phases: default_phases(),
            context: ContextConfig::default(),
            session: SessionConfig::default(),
            workspace: WorkspaceConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to write config file at {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
