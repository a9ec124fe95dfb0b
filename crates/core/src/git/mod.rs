//! Git working-tree collaborator for merge sessions.

pub mod backend;

pub use backend::{CommitAuthor, GitBackend};
