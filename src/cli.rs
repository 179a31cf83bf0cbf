//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::provider::ProviderKind;
use clap::Parser;
use std::path::PathBuf;

/// diffsage - LLM-powered review of uncommitted git changes
///
/// Asks a language model to review the working-tree changes of a
/// directory file by file. The model can read the diffs, write a markdown
/// report and create a conventional commit.
///
/// Examples:
///   diffsage
///   diffsage ../my-service
///   diffsage ../my-service --provider ollama --model qwen2.5-coder:7b
///   diffsage --exclude dist,bun.lock,target --max-steps 5
///   diffsage --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Directory whose uncommitted changes should be reviewed
    #[arg(value_name = "DIR", default_value = ".")]
    pub directory: PathBuf,

    /// Model API to use
    #[arg(long, value_enum)]
    pub provider: Option<ProviderKind>,

    /// Model to use for the review
    ///
    /// Defaults to gemini-2.5-flash for Gemini and llama3.2:latest for Ollama.
    /// Can also be set via DIFFSAGE_MODEL env var or .diffsage.toml config.
    #[arg(short, long, env = "DIFFSAGE_MODEL")]
    pub model: Option<String>,

    /// Base URL of the model API
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Maximum number of model steps (default: 10)
    #[arg(long, value_name = "COUNT")]
    pub max_steps: Option<usize>,

    /// Paths the diff tool never reports (comma-separated)
    ///
    /// Example: --exclude dist,bun.lock,target
    #[arg(long, value_name = "PATHS", value_delimiter = ',')]
    pub exclude: Option<Vec<String>>,

    /// Include staged changes in the diffs (HEAD vs working tree)
    #[arg(long)]
    pub include_staged: bool,

    /// Temperature for LLM responses (0.0 - 2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .diffsage.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Env file to read API keys from (default: .env)
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .diffsage.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 2.0".to_string());
            }
        }

        if self.max_steps == Some(0) {
            return Err("Max steps must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if !self.directory.exists() {
            return Err(format!(
                "Directory does not exist: {}",
                self.directory.display()
            ));
        }
        if !self.directory.is_dir() {
            return Err(format!(
                "Path is not a directory: {}",
                self.directory.display()
            ));
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn make_args() -> Args {
        Args {
            directory: PathBuf::from("."),
            provider: None,
            model: None,
            base_url: None,
            max_steps: None,
            exclude: None,
            include_staged: false,
            temperature: None,
            timeout: None,
            config: None,
            env_file: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_positional_directory() {
        let args = Args::try_parse_from(["diffsage", "src", "--exclude", "dist,target"]).unwrap();
        assert_eq!(args.directory, PathBuf::from("src"));
        assert_eq!(
            args.exclude,
            Some(vec!["dist".to_string(), "target".to_string()])
        );
    }

    #[test]
    fn test_default_directory() {
        let args = Args::try_parse_from(["diffsage", "--provider", "ollama"]).unwrap();
        assert_eq!(args.directory, PathBuf::from("."));
        assert_eq!(args.provider, Some(ProviderKind::Ollama));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_missing_directory() {
        let mut args = make_args();
        args.directory = PathBuf::from("./definitely/not/here");
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_base_url() {
        let mut args = make_args();
        args.base_url = Some("localhost:11434".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_steps() {
        let mut args = make_args();
        args.max_steps = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
