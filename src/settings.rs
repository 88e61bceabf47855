//! Layered settings: built-in defaults, an optional TOML file, then
//! environment variables.
//!
//! Environment variables use the `SIMPLE_LLM` prefix and `__` between nested
//! keys, e.g. `SIMPLE_LLM_PROVIDER__API_KEY` or
//! `SIMPLE_LLM_EXECUTOR__CONCURRENCY`.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ConfigurationError;
use crate::llm::Provider;
use crate::parallel::{ExecutorConfig, DEFAULT_CONCURRENCY, DEFAULT_MAX_CHECKPOINTS};

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "SIMPLE_LLM";

/// Default completion length in tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 500;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.5;

/// Default nucleus sampling mass.
pub const DEFAULT_TOP_P: f32 = 0.6;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
}

/// Chat completion provider settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Hosted API to call.
    /// Default: openai
    pub kind: Provider,

    /// API key sent with every request.
    pub api_key: String,

    /// Base URL. Required for Azure; defaults to the public OpenAI API.
    pub endpoint: Option<String>,

    /// Maximum completion length in tokens.
    /// Default: 500
    pub max_tokens: u32,

    /// Default: 0.5
    pub temperature: f32,

    /// Default: 0.6
    pub top_p: f32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: Provider::default(),
            api_key: String::new(),
            endpoint: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
        }
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("kind", &self.kind)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "<redacted>" })
            .field("endpoint", &self.endpoint)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .finish()
    }
}

/// Batch executor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    /// Maximum number of requests in flight.
    /// Default: 3
    pub concurrency: usize,

    /// Deadline window per request in milliseconds; unset disables deadlines.
    /// Default: None
    pub deadline_ms: Option<u64>,

    /// Extra deadline windows after the first timeout.
    /// Default: 0
    pub max_checkpoints: u32,

    /// Notify checkpoint observers when a request fails outright.
    /// Default: false
    pub notify_on_failure: bool,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            deadline_ms: None,
            max_checkpoints: DEFAULT_MAX_CHECKPOINTS,
            notify_on_failure: false,
        }
    }
}

impl From<&ExecutorSettings> for ExecutorConfig {
    fn from(settings: &ExecutorSettings) -> Self {
        let config = ExecutorConfig::new()
            .with_concurrency(settings.concurrency)
            .with_max_checkpoints(settings.max_checkpoints)
            .with_notify_on_failure(settings.notify_on_failure);
        match settings.deadline_ms {
            Some(millis) => config.with_deadline(Duration::from_millis(millis)),
            None => config,
        }
    }
}

/// All settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub provider: ProviderSettings,
    pub executor: ExecutorSettings,
}

impl Settings {
    /// Loads settings from defaults, the optional TOML file at `path`, and
    /// `SIMPLE_LLM_*` environment variables, in increasing precedence.
    ///
    /// Executor values are not validated here, so later overrides can still
    /// replace them. Call [`Settings::validate`] on the final settings.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Like [`Settings::load`] with a custom environment prefix.
    pub fn load_with_prefix(path: Option<&Path>, prefix: &str) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Checks the executor settings.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.executor_config().validate()
    }

    /// Executor configuration derived from these settings.
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig::from(&self.executor)
    }
}
