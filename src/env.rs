//! Environment variable lookup with `.env` file support.
//!
//! Values come from the process environment first and fall back to the
//! env file. The process environment itself is never modified. Tests use
//! [`Env::mock()`] instead of touching real variables.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Environment variable reader.
#[derive(Clone, Debug, Default)]
pub struct Env {
    /// Replaces the process environment when set.
    overrides: Option<HashMap<String, String>>,
    /// Values loaded from the env file.
    file_vars: HashMap<String, String>,
}

impl Env {
    /// Create an `Env` that reads from the real process environment only.
    pub fn real() -> Self {
        Self::default()
    }

    /// Read the process environment, falling back to the env file at `path`.
    ///
    /// A missing file is not an error.
    pub fn with_env_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No env file at {}", path.display());
            return Ok(Self::real());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read env file: {}", path.display()))?;
        let file_vars = parse_env_file(&content);
        debug!(
            "Loaded {} variables from {}",
            file_vars.len(),
            path.display()
        );

        Ok(Self {
            overrides: None,
            file_vars,
        })
    }

    /// Create an `Env` backed by explicit key-value pairs.
    #[cfg(test)]
    pub fn mock(vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        Self {
            overrides: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            file_vars: HashMap::new(),
        }
    }

    /// Look up a variable. Empty values count as unset.
    pub fn var(&self, name: &str) -> Option<String> {
        let primary = match &self.overrides {
            Some(map) => map.get(name).cloned(),
            None => std::env::var(name).ok(),
        };

        primary
            .filter(|v| !v.is_empty())
            .or_else(|| self.file_vars.get(name).cloned().filter(|v| !v.is_empty()))
    }
}

/// Parse dotenv-formatted content. Lines that fail to parse are skipped.
pub fn parse_env_file(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    for item in dotenvy::from_read_iter(content.as_bytes()) {
        match item {
            Ok((key, value)) => {
                vars.insert(key, value);
            }
            Err(e) => warn!("Skipping env file entry: {}", e),
        }
    }

    vars
}
