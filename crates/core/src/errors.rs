//! Error types for the hunkmerge core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

/// Malformed conflict-marker sequences, raised only in strict parse mode.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// A `<<<<<<<` marker appeared inside an open hunk.
    #[error("{path}:{line}: nested conflict start marker inside an open hunk")]
    NestedStart { path: String, line: usize },

    /// A `|||||||`, `=======` or `>>>>>>>` marker appeared outside any hunk.
    #[error("{path}:{line}: '{marker}' marker outside of a conflict hunk")]
    UnexpectedMarker {
        path: String,
        line: usize,
        marker: String,
    },

    /// A `|||||||` marker appeared after the `=======` separator.
    #[error("{path}:{line}: base marker after the separator")]
    MisplacedBase { path: String, line: usize },

    /// Input ended while a hunk was still open.
    #[error("{path}:{start_line}: conflict hunk is never closed")]
    Unterminated { path: String, start_line: usize },
}

// ---------------------------------------------------------------------------
// Conflict (resolution tracker) errors
// ---------------------------------------------------------------------------

/// Errors from resolution operations against the hunk/file model.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConflictError {
    /// No conflict file with this path exists in the session.
    #[error("conflict file not found: {0}")]
    FileNotFound(String),

    /// The file exists but has no hunk with this id.
    #[error("hunk '{hunk_id}' not found in {path}")]
    HunkNotFound { path: String, hunk_id: String },

    /// The requested resolution cannot be applied in this context.
    #[error("invalid resolution for {path}: {detail}")]
    InvalidResolution { path: String, detail: String },
}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

/// Errors from the merge session state machine and its driver.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The operation requires an active merge session.
    #[error("no merge in progress")]
    NotInMerge,

    /// `complete_merge` was called while hunks remain unresolved.
    #[error("cannot complete merge: {remaining} unresolved conflict(s) remain")]
    UnresolvedConflicts { remaining: usize },

    /// Two conflict files were supplied for the same path.
    #[error("duplicate conflict file: {0}")]
    DuplicatePath(String),

    /// The merge source refused the conflicted input.
    #[error("failed to parse conflicts: {0}")]
    Parse(#[from] ParseError),

    /// Loading conflicts from the backend failed.
    #[error("failed to load conflicts: {0}")]
    LoadFailed(#[source] BackendError),

    /// The backend could not record the merge commit.
    #[error("merge commit failed: {0}")]
    CommitFailed(#[source] BackendError),

    /// The backend could not abort the merge.
    #[error("merge abort failed: {0}")]
    AbortFailed(#[source] BackendError),
}

// ---------------------------------------------------------------------------
// Backend errors
// ---------------------------------------------------------------------------

/// Errors from the version-control collaborator behind [`crate::backend::MergeBackend`].
#[derive(Debug, Error)]
pub enum BackendError {
    /// The repository is not in the middle of a merge.
    #[error("repository is not merging")]
    NotMerging,

    /// A file changed on disk after its conflicts were loaded.
    #[error("file '{0}' changed on disk since conflicts were loaded")]
    Stale(String),

    /// A conflicted path is not valid UTF-8 text.
    #[error("file '{0}' is not valid UTF-8 text")]
    NotText(String),

    /// The repository refused the operation (lock contention, missing refs, ...).
    #[error("repository operation '{operation}' rejected: {detail}")]
    Rejected { operation: String, detail: String },

    /// Underlying git error.
    #[error(transparent)]
    Git(#[from] GitError),

    /// Generic I/O wrapper.
    #[error("backend I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from local Git (git2) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The repository path does not exist or is not a git repo.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// The repository has no working directory.
    #[error("git repository at '{0}' is bare")]
    BareRepository(String),

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
