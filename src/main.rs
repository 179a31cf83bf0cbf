//! diffsage - LLM-powered review of uncommitted git changes
//!
//! A CLI tool that asks a language model to review the working-tree
//! changes of a directory. The model streams its review to stdout and can
//! call tools to read diffs, write a markdown report and create a commit.
//!
//! Exit codes:
//!   0 - Review finished
//!   1 - Runtime error (config, missing API key, model or repository failure)

mod agent;
mod cli;
mod config;
mod env;
mod models;
mod provider;
mod repo;
mod report;

use agent::{AgentConfig, FinishReason, ReviewAgent, ToolRegistry};
use anyhow::{Context, Result};
use cli::Args;
use config::{Config, CONFIG_FILE};
use env::Env;
use repo::DiffReader;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("diffsage v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run_review(args).await {
        error!("Review failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default config file.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to choose the provider, model, excludes, and more.");
    Ok(())
}

/// Initialize logging on stderr based on verbosity settings.
fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run one review of the configured directory.
async fn run_review(args: Args) -> Result<()> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate().context("Invalid configuration")?;

    let env = Env::with_env_file(Path::new(&config.general.env_file))?;
    let client = provider::create_client(&config.model, &env)?;

    let directory = args.directory.display().to_string();
    println!("🔍 Reviewing uncommitted changes in: {}", directory);
    println!("   Provider: {}", config.model.provider);
    println!("   Model: {}", client.model());
    println!("   Max steps: {}\n", config.model.max_steps);

    let reader = DiffReader::new(config.review.excludes.clone())
        .with_staged(config.review.include_staged);
    let tools = ToolRegistry::review_tools(reader);

    let agent_config = AgentConfig {
        max_steps: config.model.max_steps,
        show_spinner: !args.quiet,
    };
    let mut agent = ReviewAgent::new(agent_config, client, tools);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let outcome = agent
        .run(&agent::review_instruction(&directory), &mut out)
        .await?;
    writeln!(out).context("Failed to write to stdout")?;
    debug!("Conversation ended with {} messages", agent.messages().len());

    info!(
        "Review finished after {} step(s) and {} tool call(s) in {:.1}s: {}",
        outcome.steps,
        outcome.tool_calls,
        start_time.elapsed().as_secs_f64(),
        outcome.finish
    );
    if outcome.finish == FinishReason::StepLimit {
        warn!("The model was still calling tools; raise --max-steps for a longer review");
    }

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
