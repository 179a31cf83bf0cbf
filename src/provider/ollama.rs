//! Ollama `/api/chat` client.
//!
//! With `stream: true` Ollama answers with newline-delimited JSON; each
//! line carries a fragment of the assistant message and, when the model
//! decides to use tools, its tool calls.

use crate::agent::tools::ToolDefinition;
use crate::provider::{
    send_error, ChatRequest, LineBuffer, Message, ModelClient, ProviderError, ProviderKind,
    StreamEvent, ToolCall,
};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::debug;

/// Optional bearer token, for hosted Ollama endpoints.
pub const API_KEY_VAR: &str = "OLLAMA_API_KEY";

pub struct OllamaClient {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) model: String,
    pub(crate) api_key: Option<String>,
    pub(crate) temperature: Option<f32>,
    pub(crate) timeout_seconds: u64,
}

/// Message in the chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ToolCallMessage>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToolCallMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    function: ToolCallFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToolCallFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// One line of the streamed chat response.
#[derive(Debug, Deserialize)]
struct OllamaChatChunk {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallMessage>>,
}

impl ChatMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
            tool_calls: None,
            tool_name: None,
        }
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn stream_chat(
        &self,
        request: &ChatRequest<'_>,
        events: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = build_request(&self.model, request, self.temperature);

        debug!("Sending chat request with {} messages", body.messages.len());

        let mut builder = self.http.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout_seconds, &self.base_url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                provider: ProviderKind::Ollama,
                status: status.to_string(),
                body,
            });
        }

        let mut stream = response.bytes_stream();
        let mut lines = LineBuffer::default();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| send_error(e, self.timeout_seconds, &self.base_url))?;
            for line in lines.push(&chunk) {
                for event in parse_chunk(&line)? {
                    if events.send(event).await.is_err() {
                        debug!("Stream consumer closed, stopping Ollama stream");
                        return Ok(());
                    }
                }
            }
        }

        if let Some(line) = lines.finish() {
            for event in parse_chunk(&line)? {
                if events.send(event).await.is_err() {
                    break;
                }
            }
        }

        Ok(())
    }
}

fn build_request(
    model: &str,
    request: &ChatRequest<'_>,
    temperature: Option<f32>,
) -> OllamaChatRequest {
    let mut messages = vec![ChatMessage::text("system", request.system)];

    for message in request.messages {
        messages.push(match message {
            Message::User(text) => ChatMessage::text("user", text),
            Message::Assistant { text, tool_calls } => ChatMessage {
                role: "assistant".to_string(),
                content: text.clone(),
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        tool_calls
                            .iter()
                            .map(|call| ToolCallMessage {
                                id: call.id.clone(),
                                function: ToolCallFunction {
                                    name: call.name.clone(),
                                    arguments: call.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_name: None,
            },
            Message::Tool { name, result, .. } => ChatMessage {
                role: "tool".to_string(),
                content: result.to_string(),
                tool_calls: None,
                tool_name: Some(name.clone()),
            },
        });
    }

    OllamaChatRequest {
        model: model.to_string(),
        messages,
        tools: tool_definitions(request.tools),
        stream: true,
        options: temperature.map(|temperature| OllamaOptions { temperature }),
    }
}

fn tool_definitions(tools: &[ToolDefinition]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                }
            })
        })
        .collect()
}

/// Parse one NDJSON line into stream events.
fn parse_chunk(line: &str) -> Result<Vec<StreamEvent>, ProviderError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(vec![]);
    }

    let chunk: OllamaChatChunk = serde_json::from_str(line)?;

    if let Some(error) = chunk.error {
        return Err(ProviderError::Api {
            provider: ProviderKind::Ollama,
            status: "stream".to_string(),
            body: error,
        });
    }

    let mut events = Vec::new();
    let Some(message) = chunk.message else {
        return Ok(events);
    };

    if !message.content.is_empty() {
        events.push(StreamEvent::Text(message.content));
    }

    for call in message.tool_calls.unwrap_or_default() {
        // Some models send arguments as a JSON-encoded string.
        let arguments = match call.function.arguments {
            Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
            Value::Null => json!({}),
            other => other,
        };
        events.push(StreamEvent::ToolCall(ToolCall {
            id: call.id,
            name: call.function.name,
            arguments,
            signature: None,
        }));
    }

    Ok(events)
}
