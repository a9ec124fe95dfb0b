//! [`MergeBackend`] over a local Git working tree via `git2`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use git2::{
    Commit, Index, IndexEntry, IndexTime, Oid, Repository, RepositoryState, ResetType, Signature,
};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::backend::{ConflictSet, ConflictText, MergeBackend};
use crate::errors::{BackendError, GitError};
use crate::session::CompletedMerge;

/// Identity used for merge commits when the repository has none configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

/// A repository in the middle of a `git merge`.
pub struct GitBackend {
    repo: Repository,
    workdir: PathBuf,
    author: Option<CommitAuthor>,
    /// Files handed out by the last load, keyed by path.
    loaded: HashMap<String, LoadedFile>,
}

/// What a conflicted file looked like when it was loaded.
#[derive(Debug, Clone)]
struct LoadedFile {
    /// SHA-256 of the working-tree text.
    digest: String,
    /// File mode of the conflict entry, reused when staging.
    mode: u32,
}

impl GitBackend {
    /// Open a non-bare repository at `repo_path`.
    pub fn open<P: AsRef<Path>>(repo_path: P) -> Result<Self, GitError> {
        let path = repo_path.as_ref();
        info!(path = %path.display(), "opening git repository");
        let repo = Repository::open(path)
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| GitError::BareRepository(path.display().to_string()))?
            .to_path_buf();
        Ok(Self {
            repo,
            workdir,
            author: None,
            loaded: HashMap::new(),
        })
    }

    /// Override the merge commit identity.
    pub fn with_author(mut self, author: Option<CommitAuthor>) -> Self {
        self.author = author;
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn is_merging(&self) -> bool {
        self.repo.state() == RepositoryState::Merge
    }

    fn signature(&self) -> Result<Signature<'static>, GitError> {
        match &self.author {
            Some(a) => Ok(Signature::now(&a.name, &a.email)?),
            None => Ok(self.repo.signature()?),
        }
    }

    /// Paths with conflict entries in the index, in index order, with their mode.
    fn conflicted_paths(&self) -> Result<Vec<(String, u32)>, GitError> {
        let index = self.repo.index()?;
        let mut paths: Vec<(String, u32)> = Vec::new();
        for conflict in index.conflicts()? {
            let conflict = conflict?;
            let entry = conflict
                .our
                .or(conflict.their)
                .or(conflict.ancestor);
            if let Some(entry) = entry {
                let path = String::from_utf8_lossy(&entry.path).into_owned();
                if !paths.iter().any(|(p, _)| *p == path) {
                    paths.push((path, entry.mode));
                }
            }
        }
        Ok(paths)
    }

    /// First line of `MERGE_MSG`, e.g. `Merge branch 'feature'`.
    fn merge_label(&self) -> Option<String> {
        let message = self.repo.message().ok()?;
        message
            .lines()
            .next()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
    }

    /// Stage every resolved file in `index` (memory only) and create the commit.
    fn stage_and_commit(
        &self,
        index: &mut Index,
        merge: &CompletedMerge,
        signature: &Signature<'_>,
        parents: &[&Commit<'_>],
    ) -> Result<Oid, BackendError> {
        for file in &merge.files {
            let mode = self.loaded.get(&file.path).map_or(0o100644, |l| l.mode);
            let entry = staged_entry(&file.path, mode, file.content.as_bytes());
            index
                .add_frombuffer(&entry, file.content.as_bytes())
                .map_err(|e| rejected("stage", e))?;
            debug!(path = %file.path, "staged resolved file");
        }

        let tree_oid = index.write_tree().map_err(|e| rejected("write_tree", e))?;
        let tree = self.repo.find_tree(tree_oid).map_err(GitError::from)?;
        let oid = self
            .repo
            .commit(Some("HEAD"), signature, signature, &merge.message, &tree, parents)
            .map_err(|e| rejected("commit", e))?;
        Ok(oid)
    }

    fn read_text(&self, path: &str) -> Result<Option<String>, BackendError> {
        let full = self.workdir.join(path);
        if !full.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&full)?;
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| BackendError::NotText(path.to_string()))
    }
}

fn digest(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Index entry for staging `content` at `path`; stat fields are left zeroed.
fn staged_entry(path: &str, mode: u32, content: &[u8]) -> IndexEntry {
    IndexEntry {
        ctime: IndexTime::new(0, 0),
        mtime: IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode,
        uid: 0,
        gid: 0,
        file_size: content.len() as u32,
        id: Oid::zero(),
        flags: 0,
        flags_extended: 0,
        path: path.as_bytes().to_vec(),
    }
}

fn rejected(operation: &str, err: git2::Error) -> BackendError {
    BackendError::Rejected {
        operation: operation.to_string(),
        detail: err.message().to_string(),
    }
}

impl MergeBackend for GitBackend {
    #[instrument(skip(self), fields(workdir = %self.workdir.display()))]
    fn load_conflicts(&mut self) -> Result<ConflictSet, BackendError> {
        if !self.is_merging() {
            return Err(BackendError::NotMerging);
        }

        let paths = self.conflicted_paths()?;
        let mut files = Vec::with_capacity(paths.len());
        let mut loaded = HashMap::new();

        for (path, mode) in paths {
            let Some(text) = self.read_text(&path)? else {
                warn!(path = %path, "conflicted path missing from working tree, skipping");
                continue;
            };
            loaded.insert(
                path.clone(),
                LoadedFile {
                    digest: digest(&text),
                    mode,
                },
            );
            files.push(ConflictText { path, text });
        }

        self.loaded = loaded;
        let merge_source = self.merge_label();
        info!(files = files.len(), source = merge_source.as_deref().unwrap_or("-"), "loaded conflicts");
        Ok(ConflictSet { merge_source, files })
    }

    /// Stage and commit the resolved files, then write them to the working tree.
    ///
    /// Nothing on disk changes unless the commit is created, so a failed
    /// commit can be retried against the same loaded state.
    #[instrument(skip(self, merge), fields(files = merge.files.len()))]
    fn commit(&mut self, merge: &CompletedMerge) -> Result<String, BackendError> {
        if !self.is_merging() {
            return Err(BackendError::NotMerging);
        }

        for file in &merge.files {
            if let Some(loaded) = self.loaded.get(&file.path) {
                let current = self.read_text(&file.path)?.unwrap_or_default();
                if digest(&current) != loaded.digest {
                    return Err(BackendError::Stale(file.path.clone()));
                }
            }
        }

        let signature = self.signature()?;
        let head = self
            .repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|e| rejected("resolve HEAD", e))?;
        let their = self
            .repo
            .find_reference("MERGE_HEAD")
            .and_then(|r| r.peel_to_commit())
            .map_err(|e| rejected("resolve MERGE_HEAD", e))?;

        let mut index = self.repo.index().map_err(GitError::from)?;
        let staged = self.stage_and_commit(&mut index, merge, &signature, &[&head, &their]);

        let oid = match staged {
            Ok(oid) => oid,
            Err(e) => {
                // Drop the in-memory staging so the on-disk index stays conflicted.
                if let Err(reload) = index.read(true) {
                    warn!(error = %reload, "failed to reload index after rejected commit");
                }
                return Err(e);
            }
        };

        for file in &merge.files {
            std::fs::write(self.workdir.join(&file.path), &file.content)?;
        }
        index.write().map_err(GitError::from)?;
        self.repo.cleanup_state().map_err(GitError::from)?;
        self.loaded.clear();

        info!(sha = %oid, "created merge commit");
        Ok(oid.to_string())
    }

    #[instrument(skip(self), fields(workdir = %self.workdir.display()))]
    fn abort(&mut self) -> Result<(), BackendError> {
        if !self.is_merging() {
            return Err(BackendError::NotMerging);
        }

        let head = self
            .repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|e| rejected("resolve HEAD", e))?;
        self.repo
            .reset(head.as_object(), ResetType::Hard, None)
            .map_err(|e| rejected("reset", e))?;
        self.repo.cleanup_state().map_err(GitError::from)?;
        self.loaded.clear();

        info!(head = %head.id(), "merge aborted");
        Ok(())
    }
}
