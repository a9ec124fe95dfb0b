//! Conflict parsing, resolution tracking, and content reconstruction.
//!
//! The conflict subsystem is responsible for:
//! 1. **Parsing** -- scanning marker-delimited text into ordered hunks.
//! 2. **Tracking** -- recording a resolution per hunk or per file.
//! 3. **Reconstruction** -- emitting the lines each resolution selects.

pub mod model;
pub mod parser;
pub mod reconstruct;
pub mod resolver;

pub use model::{ConflictFile, ConflictHunk, Resolution};
pub use parser::{detect_conflicts, ConflictParser, ParseMode};
pub use reconstruct::resolved_content;
