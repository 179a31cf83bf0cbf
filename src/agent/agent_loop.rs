//! Agent loop for tool-based change review.
//!
//! Each step sends the conversation to the model and streams its reply.
//! Text goes straight to the output as it arrives. Requested tools run
//! after the reply is complete, and their results are appended for the
//! next step. The loop ends when a step requests no tools or the step
//! ceiling is reached.

use crate::agent::tools::{ToolDefinition, ToolError, ToolRegistry};
use crate::provider::{ChatRequest, Message, ModelClient, StreamEvent, ToolCall};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Value};
use std::fmt;
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Step ceiling used when none is configured.
pub const DEFAULT_MAX_STEPS: usize = 10;

/// Buffered stream events between the provider and the console writer.
const EVENT_BUFFER: usize = 64;

/// Configuration for the agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub max_steps: usize,
    /// Show a spinner on stderr while waiting for the model.
    pub show_spinner: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            show_spinner: true,
        }
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The model answered without requesting tools.
    Stopped,
    /// The step ceiling was reached.
    StepLimit,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::Stopped => write!(f, "model finished"),
            FinishReason::StepLimit => write!(f, "step limit reached"),
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub steps: usize,
    pub tool_calls: usize,
    pub finish: FinishReason,
}

/// The change review agent.
pub struct ReviewAgent {
    config: AgentConfig,
    client: Box<dyn ModelClient>,
    tools: ToolRegistry,
    messages: Vec<Message>,
}

impl ReviewAgent {
    pub fn new(config: AgentConfig, client: Box<dyn ModelClient>, tools: ToolRegistry) -> Self {
        info!(
            "Initializing agent with model {} and {} tools",
            client.model(),
            tools.len()
        );

        Self {
            config,
            client,
            tools,
            messages: Vec::new(),
        }
    }

    /// Conversation so far, excluding the system prompt.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Run the review, streaming model text into `out`.
    pub async fn run<W: Write>(&mut self, instruction: &str, out: &mut W) -> Result<RunOutcome> {
        anyhow::ensure!(self.config.max_steps > 0, "Max steps must be at least 1");
        if self.tools.is_empty() {
            warn!("No tools registered; the model can only answer in text");
        }

        self.messages.push(Message::user(instruction));
        let definitions = self.tools.definitions();
        let mut tool_calls = 0;

        for step in 1..=self.config.max_steps {
            debug!("Agent step {}", step);

            let (text, calls) = self.stream_step(step, &definitions, out).await?;
            self.messages.push(Message::Assistant {
                text,
                tool_calls: calls.clone(),
            });

            if calls.is_empty() {
                return Ok(RunOutcome {
                    steps: step,
                    tool_calls,
                    finish: FinishReason::Stopped,
                });
            }

            for call in &calls {
                let result = self.dispatch(call)?;
                self.messages.push(Message::tool_result(call, result));
                tool_calls += 1;
            }
        }

        info!("Reached the step limit of {}", self.config.max_steps);
        Ok(RunOutcome {
            steps: self.config.max_steps,
            tool_calls,
            finish: FinishReason::StepLimit,
        })
    }

    /// Stream one model reply. The provider produces events into a bounded
    /// channel while this side writes text out and collects tool calls.
    async fn stream_step<W: Write>(
        &self,
        step: usize,
        tools: &[ToolDefinition],
        out: &mut W,
    ) -> Result<(String, Vec<ToolCall>)> {
        let request = ChatRequest {
            system: SYSTEM_PROMPT,
            messages: &self.messages,
            tools,
        };

        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let mut spinner = self.spinner(step);

        let producer = self.client.stream_chat(&request, tx);
        let out = &mut *out;
        let consumer = async move {
            let mut text = String::new();
            let mut calls = Vec::new();
            let mut written = Ok(());

            while let Some(event) = rx.recv().await {
                if let Some(pb) = spinner.take() {
                    pb.finish_and_clear();
                }

                match event {
                    StreamEvent::Text(fragment) => {
                        if let Err(e) = out.write_all(fragment.as_bytes()).and_then(|_| out.flush())
                        {
                            written = Err(e);
                            break;
                        }
                        text.push_str(&fragment);
                    }
                    StreamEvent::ToolCall(call) => {
                        info!("Model requested tool {}", call.name);
                        calls.push(call);
                    }
                }
            }

            // A closed receiver stops the producer.
            drop(rx);
            if let Some(pb) = spinner {
                pb.finish_and_clear();
            }

            written.map(|_| (text, calls))
        };

        let (produced, consumed) = tokio::join!(producer, consumer);

        let step_output = consumed.context("Failed to write model output")?;
        produced.with_context(|| format!("Model request failed at step {}", step))?;
        Ok(step_output)
    }

    /// Execute a tool call. Invalid or unknown calls are reported back to the
    /// model as failed results; repository errors abort the run.
    fn dispatch(&self, call: &ToolCall) -> Result<Value> {
        match self.tools.execute(call) {
            Ok(result) => {
                info!("Tool {} executed", call.name);
                Ok(result)
            }
            Err(e) if e.is_fatal() => Err(e).context("Tool execution failed"),
            Err(e) => {
                warn!("Rejected tool call: {}", e);
                Ok(rejection(&e))
            }
        }
    }

    fn spinner(&self, step: usize) -> Option<ProgressBar> {
        if !self.config.show_spinner {
            return None;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Waiting for the model (step {})...", step));
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    }
}

fn rejection(error: &ToolError) -> Value {
    json!({
        "success": false,
        "error": error.to_string(),
    })
}

/// The instruction that starts a review of `directory`.
pub fn review_instruction(directory: &str) -> String {
    format!(
        "Review the code changes in '{}' directory, make your reviews and suggestions file by file.",
        directory
    )
}

/// System prompt for the review agent.
pub const SYSTEM_PROMPT: &str = r#"You are an expert code reviewer. Your task is to review the uncommitted changes in a git working tree.

## Available Tools

- `getFileChangesInDirectoryTool(rootDir)` - Get the diff of every changed file
- `generateMarkdownFileTool(filePath, title, content, ...)` - Write a markdown report
- `generateCommitMessageTool(rootDir, type, description, ...)` - Commit staged changes with a conventional commit message

## Your Process

1. Fetch the changes for the directory you were given
2. Review each changed file: correctness, security, performance, readability, tests
3. Give specific, actionable suggestions that reference the file and the changed lines
4. Only write a report file or create a commit when you were asked to

Every tool result has a `success` field. When it is false, read the `error`
and decide whether to retry with corrected input or to continue without it.

Be constructive and concise. Skip praise for trivial changes.
"#;
