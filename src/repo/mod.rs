//! Git access for the review tools.
//!
//! Reading uncommitted changes and creating commits both go through
//! libgit2; nothing here shells out to the `git` binary.

pub mod commit;
pub mod diff;

pub use commit::create_commit;
pub use diff::DiffReader;

use git2::{ErrorCode, Repository};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("Not a git repository: {0}")]
    NotARepo(String),

    #[error("Git operation failed: {0}")]
    GitOperationFailed(#[from] git2::Error),

    #[error("Nothing to commit: no changes are staged")]
    NothingStaged,
}

/// Open the repository containing `root_dir`.
pub fn open_repository(root_dir: &Path) -> Result<Repository, GitError> {
    Repository::discover(root_dir).map_err(|e| {
        if e.code() == ErrorCode::NotFound {
            GitError::NotARepo(root_dir.display().to_string())
        } else {
            GitError::GitOperationFailed(e)
        }
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_repository_from_subdirectory() {
        let (dir, _repo) = test_support::init_repo();
        let nested = dir.path().join("src/nested");
        std::fs::create_dir_all(&nested).unwrap();

        assert!(open_repository(&nested).is_ok());
    }

    #[test]
    fn test_open_repository_outside_git() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            open_repository(dir.path()),
            Err(GitError::NotARepo(_))
        ));
    }
}
