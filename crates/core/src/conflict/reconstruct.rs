//! Rebuild resolved text from a file's hunks.
//!
//! Only hunk content is emitted: the parser never captured the lines outside
//! the conflict regions, so the output is the concatenation of every
//! resolved hunk in source order. Unresolved hunks contribute nothing.

use crate::conflict::model::{ConflictFile, ConflictHunk, Resolution};

/// Lines a single hunk contributes under its current resolution.
pub fn hunk_lines(hunk: &ConflictHunk) -> Vec<&str> {
    match &hunk.resolution {
        Resolution::Unresolved => Vec::new(),
        Resolution::Ours => hunk.our_content.iter().map(String::as_str).collect(),
        Resolution::Theirs => hunk.their_content.iter().map(String::as_str).collect(),
        Resolution::Both => hunk
            .our_content
            .iter()
            .chain(&hunk.their_content)
            .map(String::as_str)
            .collect(),
        Resolution::Custom(lines) => lines.iter().map(String::as_str).collect(),
    }
}

/// All emitted lines of `file`, hunk by hunk.
pub fn resolved_lines(file: &ConflictFile) -> Vec<&str> {
    file.hunks().iter().flat_map(hunk_lines).collect()
}

/// Emitted lines joined with `\n` (no trailing newline).
pub fn resolved_content(file: &ConflictFile) -> String {
    resolved_lines(file).join("\n")
}
