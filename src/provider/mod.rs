//! Streaming chat providers.
//!
//! A provider turns the running conversation into one model request and
//! pushes what the model streams back, text fragments and tool calls, into
//! an mpsc channel in arrival order. The agent loop consumes that channel.

pub mod gemini;
pub mod ollama;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;

use crate::agent::tools::ToolDefinition;
use crate::config::ModelConfig;
use crate::env::Env;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Which model API to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Gemini (hosted)
    #[default]
    Gemini,
    /// Ollama-compatible /api/chat endpoint
    Ollama,
}

impl ProviderKind {
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini-2.5-flash",
            ProviderKind::Ollama => "llama3.2:latest",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com",
            ProviderKind::Ollama => "http://localhost:11434",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Gemini => write!(f, "Gemini"),
            ProviderKind::Ollama => write!(f, "Ollama"),
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Provider-assigned call id, when the API has one.
    pub id: Option<String>,
    pub name: String,
    pub arguments: Value,
    /// Opaque signature some APIs require to be echoed back with the call.
    pub signature: Option<String>,
}

/// One entry of the conversation sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    User(String),
    Assistant {
        text: String,
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        call_id: Option<String>,
        name: String,
        result: Value,
    },
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Message::User(text.into())
    }

    pub fn tool_result(call: &ToolCall, result: Value) -> Self {
        Message::Tool {
            call_id: call.id.clone(),
            name: call.name.clone(),
            result,
        }
    }
}

/// Something the model produced while streaming a step.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Text(String),
    ToolCall(ToolCall),
}

/// Everything a provider needs for one step.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub system: &'a str,
    pub messages: &'a [Message],
    pub tools: &'a [ToolDefinition],
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Missing API key: set {0} in the environment or the env file")]
    MissingApiKey(&'static str),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot connect to {0}")]
    Connect(String),

    #[error("Failed to send request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{provider} API error {status}: {body}")]
    Api {
        provider: ProviderKind,
        status: String,
        body: String,
    },

    #[error("Failed to decode stream chunk: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A model API that can stream one step of the conversation.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Model identifier, for logs and the banner.
    fn model(&self) -> &str;

    /// Send the conversation and forward streamed output to `events`.
    ///
    /// Returns once the response is complete. A closed receiver stops the
    /// stream early without an error.
    async fn stream_chat(
        &self,
        request: &ChatRequest<'_>,
        events: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError>;
}

/// Build the client selected by the model settings.
pub fn create_client(config: &ModelConfig, env: &Env) -> Result<Box<dyn ModelClient>> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .build()?;

    let model = config.effective_model().to_string();
    let base_url = config.effective_base_url().trim_end_matches('/').to_string();

    let client: Box<dyn ModelClient> = match config.provider {
        ProviderKind::Gemini => {
            let api_key = gemini::API_KEY_VARS
                .iter()
                .find_map(|name| env.var(name))
                .ok_or(ProviderError::MissingApiKey(gemini::API_KEY_VARS[0]))?;
            Box::new(GeminiClient {
                http,
                base_url,
                model,
                api_key,
                temperature: config.temperature,
                timeout_seconds: config.timeout_seconds,
            })
        }
        ProviderKind::Ollama => Box::new(OllamaClient {
            http,
            base_url,
            model,
            api_key: env.var(ollama::API_KEY_VAR),
            temperature: config.temperature,
            timeout_seconds: config.timeout_seconds,
        }),
    };

    Ok(client)
}

/// Map a transport error the same way for every provider.
pub(crate) fn send_error(e: reqwest::Error, timeout_seconds: u64, base_url: &str) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(timeout_seconds)
    } else if e.is_connect() {
        ProviderError::Connect(base_url.to_string())
    } else {
        ProviderError::Request(e)
    }
}

/// Splits a byte stream into complete text lines.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append a chunk and return every line it completed, without the
    /// trailing `\n` or `\r\n`.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string())
    }
}
