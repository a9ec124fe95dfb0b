//! Orchestrates a [`MergeSession`] against a [`MergeBackend`].
//!
//! The session itself is synchronous. Completion and abort also have to go
//! through the version-control process, so the driver exposes them as async
//! operations and keeps the backend behind a `tokio::sync::Mutex`.
//!
//! The session is only reset after the backend has succeeded; a backend
//! failure leaves every file and resolution exactly as it was.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::backend::MergeBackend;
use crate::conflict::model::ConflictFile;
use crate::conflict::parser::ConflictParser;
use crate::errors::SessionError;
use crate::session::{CompletedMerge, MergeSession};

/// Result of a successful [`MergeDriver::complete`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub commit_id: String,
    pub merge: CompletedMerge,
}

/// Owns one merge session and the backend that finalizes it.
pub struct MergeDriver<B> {
    session: MergeSession,
    backend: Arc<Mutex<B>>,
    parser: ConflictParser,
}

impl<B: MergeBackend + Send> MergeDriver<B> {
    pub fn new(backend: B, parser: ConflictParser) -> Self {
        Self {
            session: MergeSession::new(),
            backend: Arc::new(Mutex::new(backend)),
            parser,
        }
    }

    pub fn session(&self) -> &MergeSession {
        &self.session
    }

    /// Mutable access for resolution operations.
    pub fn session_mut(&mut self) -> &mut MergeSession {
        &mut self.session
    }

    pub fn backend(&self) -> Arc<Mutex<B>> {
        Arc::clone(&self.backend)
    }

    /// Load conflicts from the backend and begin a session over them.
    pub async fn start(&mut self) -> Result<&MergeSession, SessionError> {
        let set = {
            let mut backend = self.backend.lock().await;
            backend.load_conflicts().map_err(SessionError::LoadFailed)?
        };

        let mut files = Vec::with_capacity(set.files.len());
        for conflict in &set.files {
            let hunks = self.parser.detect_conflicts(&conflict.text, &conflict.path)?;
            if hunks.is_empty() {
                warn!(path = %conflict.path, "conflicted file has no conflict markers");
            }
            files.push(ConflictFile::new(conflict.path.clone(), hunks));
        }

        self.session.set_merge_state(true, set.merge_source, files)?;
        Ok(&self.session)
    }

    /// Complete the merge and commit it through the backend.
    pub async fn complete(&mut self, message: &str) -> Result<CommitOutcome, SessionError> {
        let snapshot = self.session.clone();
        let merge = self.session.complete_merge(message)?;

        let committed = {
            let mut backend = self.backend.lock().await;
            backend.commit(&merge)
        };

        match committed {
            Ok(commit_id) => {
                info!(commit = %commit_id, files = merge.files.len(), "merge committed");
                Ok(CommitOutcome { commit_id, merge })
            }
            Err(e) => {
                warn!(error = %e, "backend commit failed, restoring session");
                self.session = snapshot;
                Err(SessionError::CommitFailed(e))
            }
        }
    }

    /// Abort the merge in the backend, then discard the session.
    pub async fn abort(&mut self) -> Result<usize, SessionError> {
        if !self.session.is_in_merge() {
            return Err(SessionError::NotInMerge);
        }

        {
            let mut backend = self.backend.lock().await;
            backend.abort().map_err(SessionError::AbortFailed)?;
        }

        Ok(self.session.abort_merge())
    }
}
