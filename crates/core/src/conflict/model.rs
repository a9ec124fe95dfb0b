//! Hunk and file entities for a merge session.
//!
//! Hunks are created once by the parser and never added or removed; only
//! their [`Resolution`] changes afterwards.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// The chosen strategy for reconciling one hunk into final output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "lines")]
pub enum Resolution {
    /// No decision yet.
    #[default]
    Unresolved,
    /// Keep the current-branch lines.
    Ours,
    /// Keep the incoming-branch lines.
    Theirs,
    /// Keep ours followed by theirs.
    Both,
    /// Replace the region with hand-written lines.
    Custom(Vec<String>),
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unresolved)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unresolved => write!(f, "unresolved"),
            Self::Ours => write!(f, "ours"),
            Self::Theirs => write!(f, "theirs"),
            Self::Both => write!(f, "both"),
            Self::Custom(_) => write!(f, "custom"),
        }
    }
}

// ---------------------------------------------------------------------------
// Hunk
// ---------------------------------------------------------------------------

/// One delimited conflicting region within one file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConflictHunk {
    /// Identifier unique within the owning file (`hunk-1`, `hunk-2`, ...).
    pub id: String,
    /// 1-based line of the `<<<<<<<` marker.
    pub start_line: usize,
    /// 1-based line of the `>>>>>>>` marker.
    pub end_line: usize,
    /// Current-branch lines.
    pub our_content: Vec<String>,
    /// Incoming-branch lines.
    pub their_content: Vec<String>,
    /// Common-ancestor lines, present only for diff3-style conflicts.
    pub base_content: Option<Vec<String>>,
    #[serde(default)]
    pub resolution: Resolution,
}

impl ConflictHunk {
    /// Create an unresolved hunk opened at `start_line`.
    pub fn new(id: impl Into<String>, start_line: usize) -> Self {
        Self {
            id: id.into(),
            start_line,
            end_line: start_line,
            our_content: Vec::new(),
            their_content: Vec::new(),
            base_content: None,
            resolution: Resolution::Unresolved,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_resolved()
    }

    /// Lines written by a `Custom` resolution, if any.
    pub fn custom_content(&self) -> Option<&[String]> {
        match &self.resolution {
            Resolution::Custom(lines) => Some(lines),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// File
// ---------------------------------------------------------------------------

/// One file under conflict.
///
/// `is_resolved` is derived state. It is recomputed by every mutating method
/// in [`crate::conflict::resolver`], so the fields are read-only outside the
/// crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConflictFile {
    pub(crate) path: String,
    pub(crate) hunks: Vec<ConflictHunk>,
    pub(crate) is_resolved: bool,
    /// Set only by `mark_resolved`; overrides per-hunk state.
    pub(crate) force_resolved: bool,
    pub(crate) resolved_content: Option<String>,
}

impl ConflictFile {
    pub fn new(path: impl Into<String>, hunks: Vec<ConflictHunk>) -> Self {
        let mut file = Self {
            path: path.into(),
            hunks,
            is_resolved: false,
            force_resolved: false,
            resolved_content: None,
        };
        file.recompute();
        file
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn hunks(&self) -> &[ConflictHunk] {
        &self.hunks
    }

    pub fn hunk(&self, id: &str) -> Option<&ConflictHunk> {
        self.hunks.iter().find(|h| h.id == id)
    }

    pub fn is_resolved(&self) -> bool {
        self.is_resolved
    }

    /// Whether `is_resolved` came from an explicit override.
    pub fn is_force_resolved(&self) -> bool {
        self.force_resolved
    }

    /// Cached reconstruction, populated by `MergeSession::apply_resolution`.
    pub fn resolved_content(&self) -> Option<&str> {
        self.resolved_content.as_deref()
    }

    /// Number of hunks still lacking a resolution.
    pub fn unresolved_count(&self) -> usize {
        self.hunks.iter().filter(|h| !h.is_resolved()).count()
    }

    /// Re-derive `is_resolved` from the hunks and the override flag.
    pub(crate) fn recompute(&mut self) {
        self.is_resolved = self.force_resolved || self.hunks.iter().all(ConflictHunk::is_resolved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hunk(id: &str, resolution: Resolution) -> ConflictHunk {
        let mut h = ConflictHunk::new(id, 1);
        h.our_content = vec!["a".into()];
        h.their_content = vec!["b".into()];
        h.resolution = resolution;
        h
    }

    #[test]
    fn test_new_file_derives_resolved_state() {
        let file = ConflictFile::new("a.txt", vec![hunk("hunk-1", Resolution::Unresolved)]);
        assert!(!file.is_resolved());
        assert_eq!(file.unresolved_count(), 1);

        let file = ConflictFile::new("b.txt", vec![hunk("hunk-1", Resolution::Ours)]);
        assert!(file.is_resolved());
    }

    #[test]
    fn test_custom_content_only_for_custom() {
        let h = hunk("hunk-1", Resolution::Custom(vec!["merged".into()]));
        assert_eq!(h.custom_content(), Some(&["merged".to_string()][..]));
        assert!(h.is_resolved());

        let h = hunk("hunk-1", Resolution::Both);
        assert_eq!(h.custom_content(), None);
    }

    #[test]
    fn test_resolution_names() {
        assert_eq!(Resolution::Theirs.to_string(), "theirs");
        assert_eq!(Resolution::Custom(vec![]).to_string(), "custom");
    }

    #[test]
    fn test_resolution_serializes_tagged() {
        let json = serde_json::to_string(&Resolution::Custom(vec!["x".into()])).unwrap();
        assert_eq!(json, r#"{"kind":"custom","lines":["x"]}"#);
        let json = serde_json::to_string(&Resolution::Both).unwrap();
        assert_eq!(json, r#"{"kind":"both"}"#);
    }
}
