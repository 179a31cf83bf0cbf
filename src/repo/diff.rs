//! Reading uncommitted changes as per-file diffs.

use crate::models::FileDiff;
use crate::repo::{open_repository, GitError};
use git2::{Diff, DiffOptions, ErrorCode, Patch, Repository};
use std::path::Path;
use tracing::debug;

/// Paths that are never reported, unless configured otherwise.
pub const DEFAULT_EXCLUDES: [&str; 2] = ["dist", "bun.lock"];

/// Lists changed files in a working tree and returns their diffs.
#[derive(Debug, Clone)]
pub struct DiffReader {
    /// Paths skipped entirely. An entry also covers everything beneath it.
    excludes: Vec<String>,
    /// Diff HEAD against the working tree (staged + unstaged) instead of
    /// the index against the working tree.
    include_staged: bool,
}

impl Default for DiffReader {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect())
    }
}

impl DiffReader {
    pub fn new(excludes: Vec<String>) -> Self {
        Self {
            excludes,
            include_staged: false,
        }
    }

    pub fn with_staged(mut self, include: bool) -> Self {
        self.include_staged = include;
        self
    }

    /// Collect the diff of every changed, non-excluded file under `root_dir`.
    ///
    /// Files are returned in the order libgit2 lists the deltas, which is
    /// sorted by path. Errors opening or diffing the repository are returned
    /// unchanged.
    pub fn file_changes(&self, root_dir: &Path) -> Result<Vec<FileDiff>, GitError> {
        let repo = open_repository(root_dir)?;
        let diff = self.working_diff(&repo)?;

        let mut diffs = Vec::new();
        for idx in 0..diff.deltas().len() {
            let Some(delta) = diff.get_delta(idx) else {
                continue;
            };

            let Some(path) = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
            else {
                continue;
            };

            if self.is_excluded(&path) {
                debug!("Skipping excluded file: {}", path);
                continue;
            }

            let text = match Patch::from_diff(&diff, idx)? {
                Some(mut patch) => String::from_utf8_lossy(&patch.to_buf()?).into_owned(),
                None => String::new(),
            };

            diffs.push(FileDiff { file: path, diff: text });
        }

        debug!(
            files = diffs.len(),
            root = %root_dir.display(),
            "Collected file changes"
        );

        Ok(diffs)
    }

    fn working_diff<'r>(&self, repo: &'r Repository) -> Result<Diff<'r>, GitError> {
        let mut opts = DiffOptions::new();

        if !self.include_staged {
            return Ok(repo.diff_index_to_workdir(None, Some(&mut opts))?);
        }

        // An unborn branch has no HEAD tree; diff against the empty tree.
        let head_tree = match repo.head() {
            Ok(head) => Some(head.peel_to_tree()?),
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                None
            }
            Err(e) => return Err(GitError::GitOperationFailed(e)),
        };

        Ok(repo.diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut opts))?)
    }

    /// Check whether a repository-relative path is excluded.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excludes.iter().any(|pattern| {
            path == pattern
                || path
                    .strip_prefix(pattern.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}
