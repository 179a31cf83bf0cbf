//! Google Gemini `streamGenerateContent` client.
//!
//! Responses arrive as server-sent events; every `data:` line holds one
//! `GenerateContentResponse` whose parts are text or function calls.

use crate::agent::tools::ToolDefinition;
use crate::provider::{
    send_error, ChatRequest, LineBuffer, Message, ModelClient, ProviderError, ProviderKind,
    StreamEvent, ToolCall,
};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tracing::debug;

/// Environment variables checked for the API key, in order.
pub const API_KEY_VARS: [&str; 2] = ["GOOGLE_GENERATIVE_AI_API_KEY", "GEMINI_API_KEY"];

pub struct GeminiClient {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) model: String,
    pub(crate) api_key: String,
    pub(crate) temperature: Option<f32>,
    pub(crate) timeout_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct GenerateContentChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    /// Thought summaries are not part of the answer.
    #[serde(default)]
    thought: bool,
    #[serde(default)]
    function_call: Option<FunctionCall>,
    #[serde(default)]
    thought_signature: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
}

impl GeminiClient {
    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn stream_chat(
        &self,
        request: &ChatRequest<'_>,
        events: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        let body = build_body(request, self.temperature);
        debug!(
            "Sending Gemini request with {} messages",
            request.messages.len()
        );

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout_seconds, &self.base_url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                provider: ProviderKind::Gemini,
                status: status.to_string(),
                body,
            });
        }

        let mut stream = response.bytes_stream();
        let mut lines = LineBuffer::default();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| send_error(e, self.timeout_seconds, &self.base_url))?;
            for line in lines.push(&chunk) {
                if !forward(&events, parse_sse_line(&line)?).await {
                    return Ok(());
                }
            }
        }

        if let Some(line) = lines.finish() {
            forward(&events, parse_sse_line(&line)?).await;
        }

        Ok(())
    }
}

/// Send events in order; `false` once the receiver has gone away.
async fn forward(events: &mpsc::Sender<StreamEvent>, batch: Vec<StreamEvent>) -> bool {
    for event in batch {
        if events.send(event).await.is_err() {
            debug!("Stream consumer closed, stopping Gemini stream");
            return false;
        }
    }
    true
}

/// Build the JSON request body for one step.
fn build_body(request: &ChatRequest<'_>, temperature: Option<f32>) -> Value {
    let mut body = json!({
        "systemInstruction": { "parts": [{ "text": request.system }] },
        "contents": build_contents(request.messages),
    });

    if !request.tools.is_empty() {
        body["tools"] = json!([{ "functionDeclarations": function_declarations(request.tools) }]);
    }

    if let Some(temperature) = temperature {
        body["generationConfig"] = json!({ "temperature": temperature });
    }

    body
}

fn function_declarations(tools: &[ToolDefinition]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "parametersJsonSchema": tool.parameters,
            })
        })
        .collect()
}

/// Convert the conversation into Gemini `contents`. Consecutive tool results
/// are merged into a single user turn, matching the calls of the preceding
/// model turn.
fn build_contents(messages: &[Message]) -> Vec<Value> {
    let mut contents = Vec::new();
    let mut responses: Vec<Value> = Vec::new();

    for message in messages {
        match message {
            Message::Tool {
                call_id,
                name,
                result,
            } => {
                let mut response = json!({ "name": name, "response": as_object(result) });
                if let Some(id) = call_id {
                    response["id"] = json!(id);
                }
                responses.push(json!({ "functionResponse": response }));
            }
            Message::User(text) => {
                flush_responses(&mut contents, &mut responses);
                contents.push(json!({ "role": "user", "parts": [{ "text": text }] }));
            }
            Message::Assistant { text, tool_calls } => {
                flush_responses(&mut contents, &mut responses);

                let mut parts = Vec::new();
                if !text.is_empty() {
                    parts.push(json!({ "text": text }));
                }
                for call in tool_calls {
                    let mut function_call = json!({ "name": call.name, "args": call.arguments });
                    if let Some(ref id) = call.id {
                        function_call["id"] = json!(id);
                    }
                    let mut part = json!({ "functionCall": function_call });
                    if let Some(ref signature) = call.signature {
                        part["thoughtSignature"] = json!(signature);
                    }
                    parts.push(part);
                }

                if !parts.is_empty() {
                    contents.push(json!({ "role": "model", "parts": parts }));
                }
            }
        }
    }

    flush_responses(&mut contents, &mut responses);
    contents
}

fn flush_responses(contents: &mut Vec<Value>, responses: &mut Vec<Value>) {
    if !responses.is_empty() {
        contents.push(json!({ "role": "user", "parts": std::mem::take(responses) }));
    }
}

/// `functionResponse.response` must be an object.
fn as_object(result: &Value) -> Value {
    if result.is_object() {
        result.clone()
    } else {
        let mut wrapper = Map::new();
        wrapper.insert("result".to_string(), result.clone());
        Value::Object(wrapper)
    }
}

/// Parse one SSE line into stream events. Non-data lines yield nothing.
fn parse_sse_line(line: &str) -> Result<Vec<StreamEvent>, ProviderError> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(vec![]);
    };
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(vec![]);
    }

    let chunk: GenerateContentChunk = serde_json::from_str(data)?;

    if let Some(error) = chunk.error {
        return Err(ProviderError::Api {
            provider: ProviderKind::Gemini,
            status: error
                .code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "stream".to_string()),
            body: error.message,
        });
    }

    let mut events = Vec::new();
    let parts = chunk
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .unwrap_or_default();

    for part in parts {
        if let Some(call) = part.function_call {
            let arguments = if call.args.is_null() {
                json!({})
            } else {
                call.args
            };
            events.push(StreamEvent::ToolCall(ToolCall {
                id: call.id,
                name: call.name,
                arguments,
                signature: part.thought_signature,
            }));
        } else if let Some(text) = part.text {
            if !part.thought && !text.is_empty() {
                events.push(StreamEvent::Text(text));
            }
        }
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> ToolDefinition {
        ToolDefinition {
            name: "getFileChangesInDirectoryTool".to_string(),
            description: "Get the code changes".to_string(),
            parameters: json!({"type": "object", "properties": {"rootDir": {"type": "string"}}}),
        }
    }

    #[test]
    fn test_parse_text_chunk() {
        let line = r#"data: {"candidates":[{"content":{"role":"model","parts":[{"text":"Hello"}]}}]}"#;
        assert_eq!(
            parse_sse_line(line).unwrap(),
            vec![StreamEvent::Text("Hello".to_string())]
        );
    }

    #[test]
    fn test_parse_function_call_chunk() {
        let line = r#"data: {"candidates":[{"content":{"parts":[{"functionCall":{"name":"getFileChangesInDirectoryTool","args":{"rootDir":"."}},"thoughtSignature":"sig"}]}}]}"#;
        let events = parse_sse_line(line).unwrap();
        assert_eq!(
            events,
            vec![StreamEvent::ToolCall(ToolCall {
                id: None,
                name: "getFileChangesInDirectoryTool".to_string(),
                arguments: json!({"rootDir": "."}),
                signature: Some("sig".to_string()),
            })]
        );
    }

    #[test]
    fn test_parse_skips_thoughts_and_other_lines() {
        let thought = r#"data: {"candidates":[{"content":{"parts":[{"text":"thinking","thought":true}]}}]}"#;
        assert!(parse_sse_line(thought).unwrap().is_empty());
        assert!(parse_sse_line("").unwrap().is_empty());
        assert!(parse_sse_line(": keep-alive").unwrap().is_empty());
    }

    #[test]
    fn test_parse_error_chunk() {
        let line = r#"data: {"error":{"code":429,"message":"quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = parse_sse_line(line).unwrap_err();
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(
            parse_sse_line("data: {not json"),
            Err(ProviderError::Decode(_))
        ));
    }

    #[test]
    fn test_build_body() {
        let call = ToolCall {
            id: None,
            name: "getFileChangesInDirectoryTool".to_string(),
            arguments: json!({"rootDir": "."}),
            signature: Some("sig".to_string()),
        };
        let messages = vec![
            Message::user("Review please"),
            Message::Assistant {
                text: String::new(),
                tool_calls: vec![call.clone()],
            },
            Message::tool_result(&call, json!([{"file": "a.rs", "diff": "+x"}])),
        ];
        let tools = vec![tool()];
        let request = ChatRequest {
            system: "You review code.",
            messages: &messages,
            tools: &tools,
        };

        let body = build_body(&request, Some(0.2));

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You review code.");
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"].as_array().unwrap().len(), 1);
        assert_eq!(contents[1]["parts"][0]["thoughtSignature"], "sig");
        assert_eq!(
            contents[2]["parts"][0]["functionResponse"]["response"]["result"][0]["file"],
            "a.rs"
        );
        assert_eq!(
            body["tools"][0]["functionDeclarations"][0]["name"],
            "getFileChangesInDirectoryTool"
        );
        assert!(body["generationConfig"]["temperature"].is_number());
    }

    #[test]
    fn test_consecutive_tool_results_share_a_turn() {
        let a = ToolCall {
            id: Some("1".to_string()),
            name: "a".to_string(),
            arguments: json!({}),
            signature: None,
        };
        let b = ToolCall {
            id: Some("2".to_string()),
            name: "b".to_string(),
            ..a.clone()
        };
        let messages = vec![
            Message::user("go"),
            Message::Assistant {
                text: "Checking".to_string(),
                tool_calls: vec![a.clone(), b.clone()],
            },
            Message::tool_result(&a, json!({"success": true})),
            Message::tool_result(&b, json!({"success": false})),
        ];

        let contents = build_contents(&messages);
        assert_eq!(contents.len(), 3);
        let parts = contents[2]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["functionResponse"]["id"], "1");
        assert_eq!(parts[1]["functionResponse"]["response"]["success"], false);
    }

    #[test]
    fn test_no_tools_no_temperature() {
        let messages = vec![Message::user("hi")];
        let request = ChatRequest {
            system: "s",
            messages: &messages,
            tools: &[],
        };
        let body = build_body(&request, None);
        assert!(body.get("tools").is_none());
        assert!(body.get("generationConfig").is_none());
    }
}
