//! hunkmerge core library.
//!
//! This crate provides the merge-conflict resolution engine: parsing
//! marker-delimited text into hunks, tracking a resolution per hunk and per
//! file, reconstructing resolved content, and gating completion of a merge
//! session. The version-control process sits behind [`backend::MergeBackend`];
//! [`git::GitBackend`] implements it for a local working tree.

pub mod backend;
pub mod config;
pub mod conflict;
pub mod driver;
pub mod errors;
pub mod git;
pub mod session;

// Re-exports for convenience.
pub use config::AppConfig;
pub use conflict::{ConflictFile, ConflictHunk, ConflictParser, ParseMode, Resolution};
pub use driver::MergeDriver;
pub use git::GitBackend;
pub use session::MergeSession;
