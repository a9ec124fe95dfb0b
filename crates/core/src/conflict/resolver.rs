//! Resolution transitions on a single conflict file.
//!
//! Every method here recomputes `is_resolved` before returning and drops the
//! cached reconstruction whenever a hunk's resolution actually changes.

use tracing::{debug, warn};

use crate::conflict::model::{ConflictFile, Resolution};
use crate::errors::ConflictError;

impl ConflictFile {
    /// Set the resolution of one hunk.
    ///
    /// Returns `true` if the stored resolution changed; applying the same
    /// resolution again returns `false` and leaves the file untouched.
    pub fn resolve_hunk(
        &mut self,
        hunk_id: &str,
        resolution: Resolution,
    ) -> Result<bool, ConflictError> {
        let path = &self.path;
        let hunk = self
            .hunks
            .iter_mut()
            .find(|h| h.id == hunk_id)
            .ok_or_else(|| ConflictError::HunkNotFound {
                path: path.clone(),
                hunk_id: hunk_id.to_string(),
            })?;

        if hunk.resolution == resolution {
            debug!(path = %self.path, hunk = hunk_id, "resolution unchanged");
            return Ok(false);
        }

        debug!(path = %self.path, hunk = hunk_id, resolution = %resolution, "hunk resolved");
        hunk.resolution = resolution;
        self.resolved_content = None;
        self.recompute();
        Ok(true)
    }

    /// Apply one resolution to every hunk in the file.
    ///
    /// `Unresolved` is rejected: the file is resolved afterwards by contract.
    pub fn resolve_all(&mut self, resolution: Resolution) -> Result<(), ConflictError> {
        if !resolution.is_resolved() {
            return Err(ConflictError::InvalidResolution {
                path: self.path.clone(),
                detail: "a whole file cannot be resolved as 'unresolved'".into(),
            });
        }

        let mut changed = false;
        for hunk in &mut self.hunks {
            if hunk.resolution != resolution {
                hunk.resolution = resolution.clone();
                changed = true;
            }
        }
        if changed {
            self.resolved_content = None;
        }
        self.recompute();
        debug!(path = %self.path, resolution = %resolution, hunks = self.hunks.len(), "file resolved");
        Ok(())
    }

    /// Force the file to count as resolved regardless of its hunks.
    pub fn mark_resolved(&mut self) {
        let pending = self.unresolved_count();
        if pending > 0 {
            warn!(path = %self.path, pending, "file force-marked resolved with unresolved hunks");
        }
        self.force_resolved = true;
        self.recompute();
    }
}
