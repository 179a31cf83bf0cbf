//! Tool definitions for the review agent.
//!
//! This module defines the tools that the LLM can use to inspect and act
//! on the repository under review. Arguments are deserialized into typed
//! requests and validated before anything runs.

use crate::models::{CommitRequest, CommitType, DiffRequest, MarkdownRequest};
use crate::provider::ToolCall;
use crate::repo::{self, DiffReader, GitError};
use crate::report;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

pub const DIFF_TOOL: &str = "getFileChangesInDirectoryTool";
pub const COMMIT_TOOL: &str = "generateCommitMessageTool";
pub const MARKDOWN_TOOL: &str = "generateMarkdownFileTool";

/// Provider-neutral tool description sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments.
    pub parameters: Value,
}

#[derive(Error, Debug)]
pub enum ToolError {
    /// Arguments did not match the tool's input type. Nothing was executed.
    #[error("Invalid input for {tool}: {reason}")]
    InvalidInput { tool: String, reason: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Reading the repository failed; the review cannot continue.
    #[error("{tool} failed: {source}")]
    Repository {
        tool: String,
        #[source]
        source: GitError,
    },

    #[error("Failed to encode {tool} output: {source}")]
    Encode {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ToolError {
    /// Fatal errors abort the run; the rest are reported back to the model.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ToolError::Repository { .. } | ToolError::Encode { .. })
    }
}

/// A callable tool exposed to the model.
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON schema for the arguments.
    fn parameters(&self) -> Value;

    fn execute(&self, args: &Value) -> Result<Value, ToolError>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Deserialize tool arguments into a typed request.
///
/// `null` is treated as an empty object, and a JSON-encoded string is
/// decoded first.
pub fn parse_input<T: DeserializeOwned>(tool: &str, args: &Value) -> Result<T, ToolError> {
    let invalid = |reason: String| ToolError::InvalidInput {
        tool: tool.to_string(),
        reason,
    };

    let args = match args {
        Value::Null => json!({}),
        Value::String(raw) => serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?,
        other => other.clone(),
    };

    serde_json::from_value(args).map_err(|e| invalid(e.to_string()))
}

fn encode<T: Serialize>(tool: &str, output: &T) -> Result<Value, ToolError> {
    serde_json::to_value(output).map_err(|source| ToolError::Encode {
        tool: tool.to_string(),
        source,
    })
}

fn rejected(tool: &str, reason: String) -> ToolError {
    ToolError::InvalidInput {
        tool: tool.to_string(),
        reason,
    }
}

/// Lists uncommitted changes with their diffs.
pub struct FileChangesTool {
    reader: DiffReader,
}

impl FileChangesTool {
    pub fn new(reader: DiffReader) -> Self {
        Self { reader }
    }
}

impl Tool for FileChangesTool {
    fn name(&self) -> &'static str {
        DIFF_TOOL
    }

    fn description(&self) -> &'static str {
        "Get the code changes made in given directory"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "rootDir": {
                    "type": "string",
                    "minLength": 1,
                    "description": "The root directory"
                }
            },
            "required": ["rootDir"]
        })
    }

    fn execute(&self, args: &Value) -> Result<Value, ToolError> {
        let request: DiffRequest = parse_input(DIFF_TOOL, args)?;
        request.validate().map_err(|e| rejected(DIFF_TOOL, e))?;

        let diffs = self
            .reader
            .file_changes(Path::new(&request.root_dir))
            .map_err(|source| ToolError::Repository {
                tool: DIFF_TOOL.to_string(),
                source,
            })?;

        encode(DIFF_TOOL, &diffs)
    }
}

/// Creates a conventional commit from the staged changes.
pub struct CommitTool;

impl Tool for CommitTool {
    fn name(&self) -> &'static str {
        COMMIT_TOOL
    }

    fn description(&self) -> &'static str {
        "Generate and create a git commit with a conventional commit message format"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "rootDir": {
                    "type": "string",
                    "minLength": 1,
                    "description": "The root directory"
                },
                "type": {
                    "type": "string",
                    "enum": CommitType::ALL.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
                    "description": "Type of commit"
                },
                "scope": {
                    "type": "string",
                    "description": "Scope of the commit (optional)"
                },
                "description": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Brief description of the changes"
                },
                "body": {
                    "type": "string",
                    "description": "Detailed description of the changes (optional)"
                },
                "breakingChange": {
                    "type": "boolean",
                    "default": false,
                    "description": "Whether this is a breaking change"
                },
                "breakingChangeDescription": {
                    "type": "string",
                    "description": "Specific description of the breaking change (optional, used when breakingChange is true)"
                }
            },
            "required": ["rootDir", "type", "description"]
        })
    }

    fn execute(&self, args: &Value) -> Result<Value, ToolError> {
        let request: CommitRequest = parse_input(COMMIT_TOOL, args)?;
        request.validate().map_err(|e| rejected(COMMIT_TOOL, e))?;

        encode(COMMIT_TOOL, &repo::create_commit(&request))
    }
}

/// Writes a markdown document with optional front-matter.
pub struct MarkdownTool;

impl Tool for MarkdownTool {
    fn name(&self) -> &'static str {
        MARKDOWN_TOOL
    }

    fn description(&self) -> &'static str {
        "Generate a markdown file with optional frontmatter metadata"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filePath": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Path where the markdown file should be created"
                },
                "title": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Title of the markdown document"
                },
                "content": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Content of the markdown document"
                },
                "includeMetadata": {
                    "type": "boolean",
                    "default": false,
                    "description": "Whether to include frontmatter metadata"
                },
                "metadata": {
                    "type": "object",
                    "additionalProperties": {
                        "type": ["string", "number", "boolean", "null"]
                    },
                    "description": "Metadata to include in frontmatter (if includeMetadata is true)"
                }
            },
            "required": ["filePath", "title", "content"]
        })
    }

    fn execute(&self, args: &Value) -> Result<Value, ToolError> {
        let request: MarkdownRequest = parse_input(MARKDOWN_TOOL, args)?;
        request.validate().map_err(|e| rejected(MARKDOWN_TOOL, e))?;

        encode(MARKDOWN_TOOL, &report::write_markdown_file(&request))
    }
}

/// The set of tools available to the model, looked up by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The diff, commit and markdown tools.
    pub fn review_tools(reader: DiffReader) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(FileChangesTool::new(reader)));
        registry.register(Box::new(CommitTool));
        registry.register(Box::new(MarkdownTool));
        registry
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call and return its JSON result.
    pub fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        debug!("Executing tool: {} with args: {}", call.name, call.arguments);

        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == call.name)
            .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;

        tool.execute(&call.arguments)
    }
}
