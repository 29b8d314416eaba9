//! Configuration loading from steward.toml.

use chrono::{FixedOffset, TimeDelta};
use runtime::{AnthropicAuth, LoopConfig};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable consulted when no credential is configured.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub owner: OwnerConfig,

    #[serde(default)]
    pub calendar: CalendarConfig,
}

/// Backend provider configuration.
#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    /// Model to use.
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Override for the API host, mainly for proxies.
    pub base_url: Option<String>,

    /// Standard Anthropic API key (sk-ant-api01-...).
    /// Mutually exclusive with bearer_token.
    pub api_key: Option<String>,

    /// Bearer token for gateways that front the API.
    /// Mutually exclusive with api_key.
    pub bearer_token: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            base_url: None,
            api_key: None,
            bearer_token: None,
        }
    }
}

/// Limits for the conversation loop.
#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_tool_cycles")]
    pub max_tool_cycles: usize,

    /// Bound on one model call. 0 disables it.
    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,

    /// Bound on one tool call. 0 disables it.
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Tool calls from one batch allowed to run at once. Unset means all.
    pub max_concurrency: Option<usize>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_cycles: default_max_tool_cycles(),
            model_timeout_secs: default_model_timeout_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
            max_concurrency: None,
        }
    }
}

impl AgentConfig {
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            max_tool_cycles: self.max_tool_cycles,
            model_timeout: timeout(self.model_timeout_secs),
            tool_timeout: timeout(self.tool_timeout_secs),
            max_concurrency: self.max_concurrency,
        }
    }
}

fn timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// The person whose calendar the assistant manages.
#[derive(Debug, Deserialize)]
pub struct OwnerConfig {
    #[serde(default = "default_owner_name")]
    pub name: String,

    /// Fixed offset from UTC, e.g. "+09:00".
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,

    /// Human-readable zone name shown to the model.
    #[serde(default = "default_timezone_label")]
    pub timezone_label: String,
}

impl Default for OwnerConfig {
    fn default() -> Self {
        Self {
            name: default_owner_name(),
            utc_offset: default_utc_offset(),
            timezone_label: default_timezone_label(),
        }
    }
}

impl OwnerConfig {
    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        self.utc_offset
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("owner.utc_offset `{}`", self.utc_offset)))
    }
}

#[derive(Debug, Deserialize)]
pub struct CalendarConfig {
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: i64,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            slot_minutes: default_slot_minutes(),
        }
    }
}

impl CalendarConfig {
    pub fn slot(&self) -> Result<TimeDelta, ConfigError> {
        TimeDelta::try_minutes(self.slot_minutes)
            .filter(|slot| *slot > TimeDelta::zero())
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "calendar.slot_minutes must be a positive number of minutes, got {}",
                    self.slot_minutes
                ))
            })
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    runtime::providers::DEFAULT_MAX_TOKENS
}

fn default_max_tool_cycles() -> usize {
    runtime::orchestrator::DEFAULT_MAX_TOOL_CYCLES
}

fn default_model_timeout_secs() -> u64 {
    120
}

fn default_tool_timeout_secs() -> u64 {
    30
}

fn default_owner_name() -> String {
    "the owner".to_string()
}

fn default_utc_offset() -> String {
    "+00:00".to_string()
}

fn default_timezone_label() -> String {
    "UTC".to_string()
}

fn default_slot_minutes() -> i64 {
    calendar::DEFAULT_SLOT_MINUTES
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot. Run again after command-line overrides.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_tool_cycles == 0 {
            return Err(ConfigError::Invalid("agent.max_tool_cycles must be at least 1".into()));
        }
        if self.agent.max_concurrency == Some(0) {
            return Err(ConfigError::Invalid("agent.max_concurrency must be at least 1".into()));
        }
        self.calendar.slot()?;
        self.owner.offset()?;
        Ok(())
    }

    /// Build the authentication from config, falling back to the environment.
    pub fn auth(&self) -> Result<AnthropicAuth, ConfigError> {
        self.auth_or(std::env::var(API_KEY_ENV).ok())
    }

    fn auth_or(&self, env_key: Option<String>) -> Result<AnthropicAuth, ConfigError> {
        match (&self.backend.api_key, &self.backend.bearer_token) {
            (Some(key), None) => Ok(AnthropicAuth::ApiKey(key.clone())),
            (None, Some(token)) => Ok(AnthropicAuth::Bearer(token.clone())),
            (Some(_), Some(_)) => Err(ConfigError::AmbiguousAuth),
            (None, None) => env_key
                .filter(|k| !k.is_empty())
                .map(AnthropicAuth::ApiKey)
                .ok_or(ConfigError::MissingAuth),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error(
        "authentication not configured: set backend.api_key, backend.bearer_token or {API_KEY_ENV}"
    )]
    MissingAuth,

    #[error(
        "ambiguous authentication: set either backend.api_key OR backend.bearer_token, not both"
    )]
    AmbiguousAuth,
}
