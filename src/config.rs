//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.diffsage.toml` files.

use crate::provider::ProviderKind;
use crate::repo::diff::DEFAULT_EXCLUDES;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE: &str = ".diffsage.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Review tool settings.
    #[serde(default)]
    pub review: ReviewConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Env file read for API keys.
    #[serde(default = "default_env_file")]
    pub env_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            env_file: default_env_file(),
        }
    }
}

fn default_env_file() -> String {
    ".env".to_string()
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Which API to call.
    #[serde(default)]
    pub provider: ProviderKind,

    /// Model name. Defaults depend on the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// API base URL. Defaults depend on the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Sampling temperature. Unset uses the provider default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Maximum number of model steps per review.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            name: None,
            base_url: None,
            temperature: None,
            timeout_seconds: default_timeout(),
            max_steps: default_max_steps(),
        }
    }
}

impl ModelConfig {
    pub fn effective_model(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

fn default_timeout() -> u64 {
    300
}

fn default_max_steps() -> usize {
    crate::agent::agent_loop::DEFAULT_MAX_STEPS
}

/// Review tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Paths never reported by the diff tool.
    #[serde(default = "default_excludes")]
    pub excludes: Vec<String>,

    /// Include staged changes (HEAD vs working tree) in diffs.
    #[serde(default)]
    pub include_staged: bool,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            excludes: default_excludes(),
            include_staged: false,
        }
    }
}

fn default_excludes() -> Vec<String> {
    DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence, but only when they were given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(provider) = args.provider {
            if provider != self.model.provider {
                // Provider-specific defaults no longer apply.
                self.model.name = None;
                self.model.base_url = None;
            }
            self.model.provider = provider;
        }
        if let Some(ref model) = args.model {
            self.model.name = Some(model.clone());
        }
        if let Some(ref base_url) = args.base_url {
            self.model.base_url = Some(base_url.clone());
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = Some(temperature);
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if let Some(max_steps) = args.max_steps {
            self.model.max_steps = max_steps;
        }

        if let Some(ref excludes) = args.exclude {
            self.review.excludes = excludes.clone();
        }
        if args.include_staged {
            self.review.include_staged = true;
        }

        if let Some(ref env_file) = args.env_file {
            self.general.env_file = env_file.display().to_string();
        }
    }

    /// Check values that the CLI validates but a config file can bypass.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.model.max_steps > 0, "model.max_steps must be at least 1");
        anyhow::ensure!(
            self.model.timeout_seconds > 0,
            "model.timeout_seconds must be at least 1"
        );
        if let Some(temperature) = self.model.temperature {
            anyhow::ensure!(
                (0.0..=2.0).contains(&temperature),
                "model.temperature must be between 0.0 and 2.0"
            );
        }
        if let Some(ref url) = self.model.base_url {
            anyhow::ensure!(
                url.starts_with("http://") || url.starts_with("https://"),
                "model.base_url must start with 'http://' or 'https://'"
            );
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
