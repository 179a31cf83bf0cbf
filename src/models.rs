//! Data models for the review tools.
//!
//! These are the typed inputs the model sends to each tool and the
//! structured results that are fed back into the conversation. Every
//! result carries an explicit `success` flag.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A single changed file together with its textual diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDiff {
    /// Path of the file, relative to the repository root.
    pub file: String,
    /// Patch text for this file.
    pub diff: String,
}

/// Conventional commit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitType {
    Feat,
    Fix,
    Docs,
    Style,
    Refactor,
    Test,
    Chore,
}

impl CommitType {
    /// All accepted commit types, in schema order.
    pub const ALL: [CommitType; 7] = [
        CommitType::Feat,
        CommitType::Fix,
        CommitType::Docs,
        CommitType::Style,
        CommitType::Refactor,
        CommitType::Test,
        CommitType::Chore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommitType::Feat => "feat",
            CommitType::Fix => "fix",
            CommitType::Docs => "docs",
            CommitType::Style => "style",
            CommitType::Refactor => "refactor",
            CommitType::Test => "test",
            CommitType::Chore => "chore",
        }
    }
}

impl fmt::Display for CommitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input of the diff tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffRequest {
    /// Directory whose uncommitted changes should be listed.
    pub root_dir: String,
}

impl DiffRequest {
    pub fn validate(&self) -> Result<(), String> {
        require_non_empty("rootDir", &self.root_dir)
    }
}

/// Input of the commit tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    pub root_dir: String,
    #[serde(rename = "type")]
    pub commit_type: CommitType,
    #[serde(default)]
    pub scope: Option<String>,
    pub description: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub breaking_change: bool,
    #[serde(default)]
    pub breaking_change_description: Option<String>,
}

impl CommitRequest {
    pub fn validate(&self) -> Result<(), String> {
        require_non_empty("rootDir", &self.root_dir)?;
        require_non_empty("description", &self.description)
    }

    /// Scope, treating an empty string as absent.
    pub fn scope(&self) -> Option<&str> {
        present(&self.scope)
    }

    /// Body, treating an empty string as absent.
    pub fn body(&self) -> Option<&str> {
        present(&self.body)
    }

    /// Breaking change description, treating an empty string as absent.
    pub fn breaking_change_description(&self) -> Option<&str> {
        present(&self.breaking_change_description)
    }
}

/// Outcome of the commit tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitResult {
    /// The rendered commit message (empty on failure).
    pub message: String,
    pub success: bool,
    /// Revision identifier of the new commit. Only present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommitResult {
    pub fn committed(message: String, hash: String) -> Self {
        Self {
            message,
            success: true,
            hash: Some(hash),
            error: None,
        }
    }

    pub fn failed(error: String) -> Self {
        Self {
            message: String::new(),
            success: false,
            hash: None,
            error: Some(error),
        }
    }
}

/// Input of the markdown report tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkdownRequest {
    pub file_path: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub include_metadata: bool,
    /// Front-matter entries, in the order the model supplied them.
    #[serde(default)]
    pub metadata: Option<IndexMap<String, Value>>,
}

impl MarkdownRequest {
    pub fn validate(&self) -> Result<(), String> {
        require_non_empty("filePath", &self.file_path)?;
        require_non_empty("title", &self.title)?;
        require_non_empty("content", &self.content)?;

        if let Some(ref metadata) = self.metadata {
            for (key, value) in metadata {
                if value.is_array() || value.is_object() {
                    return Err(format!(
                        "metadata.{} must be a string, number, boolean or null",
                        key
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Outcome of the markdown report tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkdownResult {
    pub file_path: String,
    pub success: bool,
    /// Number of bytes written. Only present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MarkdownResult {
    pub fn written(file_path: String, size: usize) -> Self {
        Self {
            file_path,
            success: true,
            size: Some(size),
            error: None,
        }
    }

    pub fn failed(file_path: String, error: String) -> Self {
        Self {
            file_path,
            success: false,
            size: None,
            error: Some(error),
        }
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        Err(format!("{} must not be empty", field))
    } else {
        Ok(())
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_commit_request_defaults() {
        let request: CommitRequest = serde_json::from_value(json!({
            "rootDir": ".",
            "type": "feat",
            "description": "add login"
        }))
        .unwrap();

        assert_eq!(request.commit_type, CommitType::Feat);
        assert!(!request.breaking_change);
        assert!(request.scope().is_none());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_commit_request_rejects_unknown_type() {
        let result = serde_json::from_value::<CommitRequest>(json!({
            "rootDir": ".",
            "type": "feature",
            "description": "x"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_commit_request_empty_description() {
        let request: CommitRequest = serde_json::from_value(json!({
            "rootDir": ".",
            "type": "fix",
            "description": ""
        }))
        .unwrap();
        assert_eq!(
            request.validate().unwrap_err(),
            "description must not be empty"
        );
    }

    #[test]
    fn test_empty_optional_strings_are_absent() {
        let request: CommitRequest = serde_json::from_value(json!({
            "rootDir": ".",
            "type": "docs",
            "scope": "",
            "description": "readme",
            "body": ""
        }))
        .unwrap();
        assert!(request.scope().is_none());
        assert!(request.body().is_none());
    }

    #[test]
    fn test_markdown_request_rejects_nested_metadata() {
        let request: MarkdownRequest = serde_json::from_value(json!({
            "filePath": "review.md",
            "title": "Review",
            "content": "Looks good",
            "includeMetadata": true,
            "metadata": { "tags": ["a", "b"] }
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_markdown_metadata_keeps_order() {
        // Tool arguments arrive as a decoded Value first.
        let args: Value = serde_json::from_str(
            r#"{"filePath":"review.md","title":"Review","content":"Body","metadata":{"zeta":1,"alpha":null,"mid":"x"}}"#,
        )
        .unwrap();
        let request: MarkdownRequest = serde_json::from_value(args).unwrap();
        let keys: Vec<_> = request.metadata.unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_commit_result_serialization() {
        let failed = serde_json::to_value(CommitResult::failed("boom".to_string())).unwrap();
        assert_eq!(failed, json!({"message": "", "success": false, "error": "boom"}));

        let written = serde_json::to_value(MarkdownResult::written("a.md".to_string(), 7)).unwrap();
        assert_eq!(written, json!({"filePath": "a.md", "success": true, "size": 7}));
    }

    #[test]
    fn test_commit_type_display() {
        let names: Vec<String> = CommitType::ALL.iter().map(|t| t.to_string()).collect();
        assert_eq!(
            names,
            vec!["feat", "fix", "docs", "style", "refactor", "test", "chore"]
        );
    }
}
