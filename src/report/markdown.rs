//! Markdown document rendering and writing.
//!
//! A document is an optional front-matter block, a level-one heading and
//! the body, written verbatim.

use crate::models::{MarkdownRequest, MarkdownResult};
use serde_json::Value;
use tracing::{info, warn};

/// Render the full document for a request.
pub fn render_markdown(request: &MarkdownRequest) -> String {
    let mut output = String::new();

    if request.include_metadata {
        if let Some(ref metadata) = request.metadata {
            output.push_str(&render_front_matter(metadata.iter()));
        }
    }

    output.push_str(&format!("# {}\n\n", request.title));
    output.push_str(&request.content);

    output
}

fn render_front_matter<'a>(entries: impl Iterator<Item = (&'a String, &'a Value)>) -> String {
    let mut block = String::from("---\n");

    for (key, value) in entries {
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        block.push_str(&format!("{}: {}\n", key, rendered));
    }

    block.push_str("---\n\n");
    block
}

/// Render the request and write it to `request.file_path`, replacing any
/// existing file.
///
/// Never returns an error: failures come back as an unsuccessful
/// [`MarkdownResult`].
pub fn write_markdown_file(request: &MarkdownRequest) -> MarkdownResult {
    let document = render_markdown(request);

    match std::fs::write(&request.file_path, document.as_bytes()) {
        Ok(()) => {
            info!(
                "Wrote {} ({} bytes)",
                request.file_path,
                document.len()
            );
            MarkdownResult::written(request.file_path.clone(), document.len())
        }
        Err(e) => {
            warn!("Failed to write {}: {}", request.file_path, e);
            MarkdownResult::failed(request.file_path.clone(), e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;
    use tempfile::TempDir;

    fn request(title: &str, content: &str) -> MarkdownRequest {
        MarkdownRequest {
            file_path: "review.md".to_string(),
            title: title.to_string(),
            content: content.to_string(),
            include_metadata: false,
            metadata: None,
        }
    }

    fn metadata() -> IndexMap<String, Value> {
        let mut map = IndexMap::new();
        map.insert("author".to_string(), json!("reviewer"));
        map.insert("files".to_string(), json!(3));
        map.insert("approved".to_string(), json!(false));
        map.insert("ticket".to_string(), Value::Null);
        map
    }

    #[test]
    fn test_render_without_metadata() {
        assert_eq!(render_markdown(&request("T", "C")), "# T\n\nC");
    }

    #[test]
    fn test_metadata_ignored_when_not_requested() {
        let mut req = request("Review", "Body");
        req.metadata = Some(metadata());

        let rendered = render_markdown(&req);
        assert!(!rendered.contains("---"));
        assert_eq!(rendered, "# Review\n\nBody");
    }

    #[test]
    fn test_render_front_matter() {
        let mut req = request("Review", "Body");
        req.include_metadata = true;
        req.metadata = Some(metadata());

        assert_eq!(
            render_markdown(&req),
            "---\nauthor: reviewer\nfiles: 3\napproved: false\nticket: null\n---\n\n# Review\n\nBody"
        );
    }

    #[test]
    fn test_include_metadata_without_metadata() {
        let mut req = request("T", "C");
        req.include_metadata = true;
        assert_eq!(render_markdown(&req), "# T\n\nC");
    }

    #[test]
    fn test_write_overwrites_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("review.md");
        std::fs::write(&path, "old content that is much longer than the new one").unwrap();

        let mut req = request("T", "C");
        req.file_path = path.display().to_string();

        let first = write_markdown_file(&req);
        let second = write_markdown_file(&req);

        assert!(first.success);
        assert_eq!(first, second);
        assert_eq!(first.size, Some("# T\n\nC".len()));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# T\n\nC");
    }

    #[test]
    fn test_size_is_byte_length() {
        let dir = TempDir::new().unwrap();
        let mut req = request("Überblick", "ok");
        req.file_path = dir.path().join("u.md").display().to_string();

        let result = write_markdown_file(&req);
        assert_eq!(result.size, Some("# Überblick\n\nok".len()));
    }

    #[test]
    fn test_write_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let mut req = request("T", "C");
        req.file_path = dir
            .path()
            .join("missing-dir/review.md")
            .display()
            .to_string();

        let result = write_markdown_file(&req);
        assert!(!result.success);
        assert!(result.size.is_none());
        assert!(result.error.is_some());
        assert_eq!(result.file_path, req.file_path);
    }
}
