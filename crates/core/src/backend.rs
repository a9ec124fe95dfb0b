//! The version-control collaborator seen from the engine.
//!
//! A [`MergeBackend`] supplies the conflicted files when a merge session
//! begins and performs the real commit or abort at the end. The engine never
//! touches a repository or the filesystem itself.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::BackendError;
use crate::session::CompletedMerge;

/// Raw marker-delimited text of one conflicted file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConflictText {
    pub path: String,
    pub text: String,
}

/// Conflict detection results for one merge attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConflictSet {
    /// Informational label, usually the branch being merged in.
    pub merge_source: Option<String>,
    pub files: Vec<ConflictText>,
}

/// Operations the engine delegates to the version-control process.
pub trait MergeBackend {
    /// Report the files currently in conflict and their raw text.
    fn load_conflicts(&mut self) -> Result<ConflictSet, BackendError>;

    /// Write the resolved files and record the merge. Returns a commit id.
    fn commit(&mut self, merge: &CompletedMerge) -> Result<String, BackendError>;

    /// Physically abort the merge.
    fn abort(&mut self) -> Result<(), BackendError>;
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// A [`MergeBackend`] that keeps everything in memory.
///
/// Used for dry runs and in tests. Failures can be injected for commit and
/// abort to exercise the session's error paths.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    conflicts: ConflictSet,
    commits: Vec<CompletedMerge>,
    aborts: usize,
    fail_commit: Option<String>,
    fail_abort: Option<String>,
}

impl MemoryBackend {
    pub fn new(merge_source: Option<String>) -> Self {
        Self {
            conflicts: ConflictSet {
                merge_source,
                files: Vec::new(),
            },
            ..Self::default()
        }
    }

    /// Add a conflicted file.
    pub fn with_file(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.conflicts.files.push(ConflictText {
            path: path.into(),
            text: text.into(),
        });
        self
    }

    /// Make every subsequent commit fail with `detail`.
    pub fn fail_commit(mut self, detail: impl Into<String>) -> Self {
        self.fail_commit = Some(detail.into());
        self
    }

    /// Make every subsequent abort fail with `detail`.
    pub fn fail_abort(mut self, detail: impl Into<String>) -> Self {
        self.fail_abort = Some(detail.into());
        self
    }

    pub fn commits(&self) -> &[CompletedMerge] {
        &self.commits
    }

    pub fn abort_count(&self) -> usize {
        self.aborts
    }
}

impl MergeBackend for MemoryBackend {
    fn load_conflicts(&mut self) -> Result<ConflictSet, BackendError> {
        debug!(files = self.conflicts.files.len(), "loading in-memory conflicts");
        Ok(self.conflicts.clone())
    }

    fn commit(&mut self, merge: &CompletedMerge) -> Result<String, BackendError> {
        if let Some(detail) = &self.fail_commit {
            return Err(BackendError::Rejected {
                operation: "commit".into(),
                detail: detail.clone(),
            });
        }
        self.commits.push(merge.clone());
        self.conflicts.files.clear();
        let id = format!("memory-{}", self.commits.len());
        info!(commit = %id, files = merge.files.len(), "in-memory merge committed");
        Ok(id)
    }

    fn abort(&mut self) -> Result<(), BackendError> {
        if let Some(detail) = &self.fail_abort {
            return Err(BackendError::Rejected {
                operation: "abort".into(),
                detail: detail.clone(),
            });
        }
        self.aborts += 1;
        self.conflicts.files.clear();
        info!("in-memory merge aborted");
        Ok(())
    }
}
