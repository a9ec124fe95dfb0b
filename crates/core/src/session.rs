//! Merge session state machine.
//!
//! A [`MergeSession`] owns the conflict files of one merge attempt. It moves
//! between two states:
//!
//! - **not in merge**: no files, nothing to resolve;
//! - **in merge**: files loaded, resolution operations accepted.
//!
//! Completion is gated on every file being resolved. Abort discards all
//! progress. Every transition is a single `&mut self` call, so callers never
//! observe a half-updated file.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::conflict::model::{ConflictFile, Resolution};
use crate::conflict::parser::ConflictParser;
use crate::conflict::reconstruct;
use crate::errors::{ConflictError, SessionError};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Aggregate counts for status displays.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConflictSummary {
    pub files: usize,
    pub resolved_files: usize,
    pub hunks: usize,
    /// Same value as [`MergeSession::conflict_count`].
    pub unresolved_hunks: usize,
    pub can_complete: bool,
}

/// Final text for one file, ready to be written back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedFile {
    pub path: String,
    pub content: String,
}

/// Everything the version-control collaborator needs to finalize a merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedMerge {
    pub message: String,
    pub merge_source: Option<String>,
    pub files: Vec<ResolvedFile>,
    pub completed_at: DateTime<Utc>,
}

/// The active merge attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeSession {
    session_id: Option<Uuid>,
    is_in_merge: bool,
    merge_source: Option<String>,
    files: BTreeMap<String, ConflictFile>,
    current_file: Option<String>,
    started_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

impl MergeSession {
    /// A session in the not-in-merge state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse each `(path, text)` pair and begin a session over the results.
    pub fn from_texts<'a, I>(
        merge_source: Option<String>,
        texts: I,
        parser: &ConflictParser,
    ) -> Result<Self, SessionError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut files = Vec::new();
        for (path, text) in texts {
            let hunks = parser.detect_conflicts(text, path)?;
            files.push(ConflictFile::new(path, hunks));
        }
        let mut session = Self::new();
        session.set_merge_state(true, merge_source, files)?;
        Ok(session)
    }

    /// Enter (`true`) or leave (`false`) a merge.
    ///
    /// Entering replaces any previous session wholesale. Leaving behaves
    /// like [`abort_merge`](Self::abort_merge). Paths must be unique; on
    /// [`SessionError::DuplicatePath`] the current session is kept.
    pub fn set_merge_state(
        &mut self,
        in_merge: bool,
        merge_source: Option<String>,
        files: Vec<ConflictFile>,
    ) -> Result<(), SessionError> {
        if !in_merge {
            self.abort_merge();
            return Ok(());
        }

        let mut by_path = BTreeMap::new();
        for file in files {
            let path = file.path().to_string();
            if by_path.contains_key(&path) {
                return Err(SessionError::DuplicatePath(path));
            }
            by_path.insert(path, file);
        }
        let files = by_path;

        if self.is_in_merge {
            warn!(
                session = ?self.session_id,
                files = self.files.len(),
                "replacing an active merge session"
            );
        }

        let session_id = Uuid::new_v4();

        info!(
            session = %session_id,
            source = merge_source.as_deref().unwrap_or("-"),
            files = files.len(),
            "merge session started"
        );

        *self = Self {
            session_id: Some(session_id),
            is_in_merge: true,
            merge_source,
            files,
            current_file: None,
            started_at: Some(Utc::now()),
        };
        Ok(())
    }

    /// Build the completion payload without changing any state.
    ///
    /// Fails with [`SessionError::UnresolvedConflicts`] unless
    /// [`can_complete_merge`](Self::can_complete_merge) holds.
    pub fn prepare_completion(&self, message: &str) -> Result<CompletedMerge, SessionError> {
        if !self.is_in_merge {
            return Err(SessionError::NotInMerge);
        }
        if !self.can_complete_merge() {
            return Err(SessionError::UnresolvedConflicts {
                remaining: self.conflict_count(),
            });
        }

        let files = self
            .files
            .values()
            .map(|f| ResolvedFile {
                path: f.path().to_string(),
                content: f
                    .resolved_content()
                    .map(str::to_string)
                    .unwrap_or_else(|| reconstruct::resolved_content(f)),
            })
            .collect();

        Ok(CompletedMerge {
            message: message.to_string(),
            merge_source: self.merge_source.clone(),
            files,
            completed_at: Utc::now(),
        })
    }

    /// Finish the merge if every file is resolved.
    ///
    /// On failure nothing changes and `message` is discarded.
    pub fn complete_merge(&mut self, message: &str) -> Result<CompletedMerge, SessionError> {
        let completed = self.prepare_completion(message)?;
        info!(
            session = ?self.session_id,
            files = completed.files.len(),
            "merge session completed"
        );
        self.reset();
        Ok(completed)
    }

    /// Discard all resolution progress and leave the merge.
    ///
    /// Returns the number of files dropped.
    pub fn abort_merge(&mut self) -> usize {
        let dropped = self.files.len();
        if self.is_in_merge {
            info!(session = ?self.session_id, files = dropped, "merge session aborted");
        }
        self.reset();
        dropped
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl MergeSession {
    pub fn is_in_merge(&self) -> bool {
        self.is_in_merge
    }

    pub fn merge_source(&self) -> Option<&str> {
        self.merge_source.as_deref()
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Conflict files ordered by path.
    pub fn files(&self) -> impl Iterator<Item = &ConflictFile> {
        self.files.values()
    }

    pub fn file(&self, path: &str) -> Option<&ConflictFile> {
        self.files.get(path)
    }

    /// True iff any file is not yet resolved.
    pub fn has_conflicts(&self) -> bool {
        self.files.values().any(|f| !f.is_resolved())
    }

    /// Unresolved hunks across files that are not themselves resolved.
    ///
    /// A force-marked file contributes nothing even if some of its hunks
    /// have no resolution.
    pub fn conflict_count(&self) -> usize {
        self.files
            .values()
            .filter(|f| !f.is_resolved())
            .map(ConflictFile::unresolved_count)
            .sum()
    }

    pub fn can_complete_merge(&self) -> bool {
        self.files.values().all(ConflictFile::is_resolved)
    }

    pub fn summary(&self) -> ConflictSummary {
        ConflictSummary {
            files: self.files.len(),
            resolved_files: self.files.values().filter(|f| f.is_resolved()).count(),
            hunks: self.files.values().map(|f| f.hunks().len()).sum(),
            unresolved_hunks: self.conflict_count(),
            can_complete: self.can_complete_merge(),
        }
    }

    pub fn current_file(&self) -> Option<&str> {
        self.current_file.as_deref()
    }

    /// Move the navigation cursor. It has no effect on gating.
    pub fn set_current_file(&mut self, path: Option<&str>) -> Result<(), ConflictError> {
        match path {
            Some(p) if !self.files.contains_key(p) => Err(ConflictError::FileNotFound(p.to_string())),
            _ => {
                self.current_file = path.map(str::to_string);
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution operations
// ---------------------------------------------------------------------------

impl MergeSession {
    fn file_mut(&mut self, path: &str) -> Result<&mut ConflictFile, ConflictError> {
        self.files
            .get_mut(path)
            .ok_or_else(|| ConflictError::FileNotFound(path.to_string()))
    }

    /// Set one hunk's resolution. Returns whether anything changed.
    pub fn resolve_hunk(
        &mut self,
        path: &str,
        hunk_id: &str,
        resolution: Resolution,
    ) -> Result<bool, ConflictError> {
        self.file_mut(path)?.resolve_hunk(hunk_id, resolution)
    }

    /// Apply one resolution to every hunk of a file.
    pub fn resolve_file(&mut self, path: &str, resolution: Resolution) -> Result<(), ConflictError> {
        self.file_mut(path)?.resolve_all(resolution)
    }

    /// Force a file to count as resolved without checking its hunks.
    pub fn mark_file_resolved(&mut self, path: &str) -> Result<(), ConflictError> {
        self.file_mut(path)?.mark_resolved();
        Ok(())
    }

    /// Reconstructed text of one file under its current resolutions.
    pub fn resolved_content(&self, path: &str) -> Result<String, ConflictError> {
        let file = self
            .files
            .get(path)
            .ok_or_else(|| ConflictError::FileNotFound(path.to_string()))?;
        Ok(reconstruct::resolved_content(file))
    }

    /// Reconstruct a file and cache the result on it.
    pub fn apply_resolution(&mut self, path: &str) -> Result<&str, ConflictError> {
        let file = self.file_mut(path)?;
        if file.resolved_content.is_none() {
            file.resolved_content = Some(reconstruct::resolved_content(file));
            debug!(path, "resolved content cached");
        }
        Ok(file.resolved_content.as_deref().unwrap_or_default())
    }
}
