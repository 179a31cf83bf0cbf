//! Conventional commit creation.

use crate::models::{CommitRequest, CommitResult};
use crate::repo::{open_repository, GitError};
use git2::{Commit, ErrorCode};
use std::path::Path;
use tracing::{info, warn};

/// Footer text used when a breaking change has neither a description nor a body.
pub const BREAKING_CHANGE_FALLBACK: &str = "Breaking change introduced";

/// Render a conventional commit message: `type(scope)!: description`,
/// followed by the optional body and the `BREAKING CHANGE:` footer.
pub fn format_commit_message(request: &CommitRequest) -> String {
    let mut message = request.commit_type.to_string();

    if let Some(scope) = request.scope() {
        message.push_str(&format!("({})", scope));
    }
    if request.breaking_change {
        message.push('!');
    }
    message.push_str(&format!(": {}", request.description));

    if let Some(body) = request.body() {
        message.push_str(&format!("\n\n{}", body));
    }

    if request.breaking_change {
        let breaking = request
            .breaking_change_description()
            .or_else(|| request.body())
            .unwrap_or(BREAKING_CHANGE_FALLBACK);
        message.push_str(&format!("\n\nBREAKING CHANGE: {}", breaking));
    }

    message
}

/// Commit the staged changes in `request.root_dir` with a conventional message.
///
/// Never returns an error: failures come back as an unsuccessful
/// [`CommitResult`] so the model can react to them.
pub fn create_commit(request: &CommitRequest) -> CommitResult {
    let message = format_commit_message(request);

    match commit_index(Path::new(&request.root_dir), &message) {
        Ok(hash) => {
            info!("Created commit {} in {}", hash, request.root_dir);
            CommitResult::committed(message, hash)
        }
        Err(e) => {
            warn!("Commit in {} failed: {}", request.root_dir, e);
            CommitResult::failed(e.to_string())
        }
    }
}

/// Write the index as a new commit on HEAD and return the new HEAD id.
fn commit_index(root_dir: &Path, message: &str) -> Result<String, GitError> {
    let repo = open_repository(root_dir)?;
    let mut index = repo.index()?;
    let tree_id = index.write_tree()?;

    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit()?),
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => None,
        Err(e) => return Err(GitError::GitOperationFailed(e)),
    };

    match parent {
        Some(ref head) if head.tree_id() == tree_id => return Err(GitError::NothingStaged),
        None if index.is_empty() => return Err(GitError::NothingStaged),
        _ => {}
    }

    let tree = repo.find_tree(tree_id)?;
    let signature = repo.signature()?;
    let parents: Vec<&Commit> = parent.iter().collect();

    repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        message,
        &tree,
        &parents,
    )?;

    let head = repo.head()?.peel_to_commit()?;
    Ok(head.id().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CommitType;
    use crate::repo::test_support::{commit_all, init_repo, stage, write_file};

    fn request(commit_type: CommitType, description: &str) -> CommitRequest {
        CommitRequest {
            root_dir: ".".to_string(),
            commit_type,
            scope: None,
            description: description.to_string(),
            body: None,
            breaking_change: false,
            breaking_change_description: None,
        }
    }

    #[test]
    fn test_message_with_scope() {
        let mut req = request(CommitType::Feat, "add login");
        req.scope = Some("auth".to_string());
        assert_eq!(format_commit_message(&req), "feat(auth): add login");
    }

    #[test]
    fn test_message_breaking_with_description() {
        let mut req = request(CommitType::Fix, "bug");
        req.breaking_change = true;
        req.breaking_change_description = Some("removes endpoint".to_string());
        assert_eq!(
            format_commit_message(&req),
            "fix!: bug\n\nBREAKING CHANGE: removes endpoint"
        );
    }

    #[test]
    fn test_message_breaking_falls_back_to_body() {
        let mut req = request(CommitType::Refactor, "drop v1 api");
        req.scope = Some("api".to_string());
        req.body = Some("The v1 routes are gone.".to_string());
        req.breaking_change = true;
        assert_eq!(
            format_commit_message(&req),
            "refactor(api)!: drop v1 api\n\nThe v1 routes are gone.\n\nBREAKING CHANGE: The v1 routes are gone."
        );
    }

    #[test]
    fn test_message_breaking_fallback_literal() {
        let mut req = request(CommitType::Chore, "bump deps");
        req.breaking_change = true;
        assert_eq!(
            format_commit_message(&req),
            "chore!: bump deps\n\nBREAKING CHANGE: Breaking change introduced"
        );
    }

    #[test]
    fn test_message_body_without_breaking() {
        let mut req = request(CommitType::Docs, "update readme");
        req.body = Some("Explain setup".to_string());
        req.scope = Some(String::new());
        assert_eq!(
            format_commit_message(&req),
            "docs: update readme\n\nExplain setup"
        );
    }

    #[test]
    fn test_create_commit_success() {
        let (dir, repo) = init_repo();
        write_file(dir.path(), "README.md", "hello\n");
        commit_all(&repo, "initial");

        write_file(dir.path(), "README.md", "hello world\n");
        stage(&repo, "README.md");

        let mut req = request(CommitType::Docs, "expand greeting");
        req.root_dir = dir.path().display().to_string();

        let result = create_commit(&req);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.message, "docs: expand greeting");

        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(result.hash.as_deref(), Some(head.id().to_string().as_str()));
        assert_eq!(head.message(), Some("docs: expand greeting"));
        assert_eq!(head.parent_count(), 1);
    }

    #[test]
    fn test_create_first_commit() {
        let (dir, repo) = init_repo();
        write_file(dir.path(), "main.rs", "fn main() {}\n");
        stage(&repo, "main.rs");

        let mut req = request(CommitType::Feat, "initial import");
        req.root_dir = dir.path().display().to_string();

        let result = create_commit(&req);
        assert!(result.success, "{:?}", result.error);
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.parent_count(), 0);
    }

    #[test]
    fn test_nothing_staged_fails() {
        let (dir, repo) = init_repo();
        write_file(dir.path(), "README.md", "hello\n");
        let before = commit_all(&repo, "initial");

        // Unstaged edits do not count.
        write_file(dir.path(), "README.md", "changed\n");

        let mut req = request(CommitType::Fix, "nothing");
        req.root_dir = dir.path().display().to_string();

        let result = create_commit(&req);
        assert!(!result.success);
        assert!(result.hash.is_none());
        assert_eq!(result.message, "");
        assert!(result.error.is_some());
        assert_eq!(repo.head().unwrap().target(), Some(before));
    }

    #[test]
    fn test_empty_unborn_repository_fails() {
        let (dir, _repo) = init_repo();
        let mut req = request(CommitType::Feat, "empty");
        req.root_dir = dir.path().display().to_string();

        let result = create_commit(&req);
        assert!(!result.success);
        assert!(result.hash.is_none());
    }

    #[test]
    fn test_invalid_repository_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut req = request(CommitType::Feat, "x");
        req.root_dir = dir.path().display().to_string();

        let result = create_commit(&req);
        assert!(!result.success);
        assert!(result
            .error
            .unwrap()
            .starts_with("Not a git repository"));
    }
}
