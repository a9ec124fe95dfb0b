//! End-to-end tests for merge sessions over a real Git working tree.
//!
//! Each test builds a local repository in a temp dir, creates two branches
//! that edit the same line, and runs `git merge` through `git2` so the index
//! carries real conflict entries and the working tree real markers.

use std::path::Path;

use git2::{build::CheckoutBuilder, Oid, Repository, RepositoryState, Signature};
use tempfile::TempDir;

use hunkmerge_core::backend::MergeBackend;
use hunkmerge_core::errors::{BackendError, SessionError};
use hunkmerge_core::git::{CommitAuthor, GitBackend};
use hunkmerge_core::{ConflictParser, MergeDriver, ParseMode, Resolution};

// ===========================================================================
// Helpers
// ===========================================================================

const BASE: &str = "line1\nvalue = 0\nline3\n";
const OURS: &str = "line1\nvalue = 1\nline3\n";
const THEIRS: &str = "line1\nvalue = 2\nline3\n";

fn signature() -> Signature<'static> {
    Signature::now("Test User", "test@example.com").unwrap()
}

fn init_repo(dir: &Path) -> Repository {
    let repo = Repository::init(dir).unwrap();
    {
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();
    }
    repo
}

/// Write `content` to the working tree, stage it, and commit on HEAD.
fn commit_on_head(repo: &Repository, path: &str, content: &str, message: &str) -> Oid {
    let workdir = repo.workdir().unwrap();
    std::fs::write(workdir.join(path), content).unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(Path::new(path)).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();

    let parent = repo.head().ok().map(|h| h.peel_to_commit().unwrap());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    let sig = signature();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap()
}

/// Commit `content` onto `branch` without touching the working tree.
fn commit_on_branch(repo: &Repository, branch: &str, path: &str, content: &str) -> Oid {
    let refname = format!("refs/heads/{}", branch);
    let parent = repo.find_reference(&refname).unwrap().peel_to_commit().unwrap();

    let blob = repo.blob(content.as_bytes()).unwrap();
    let mut builder = repo.treebuilder(Some(&parent.tree().unwrap())).unwrap();
    builder.insert(path, blob, 0o100644).unwrap();
    let tree = repo.find_tree(builder.write().unwrap()).unwrap();

    let sig = signature();
    repo.commit(Some(&refname), &sig, &sig, "feature change", &tree, &[&parent])
        .unwrap()
}

/// Repository left mid-merge with one conflicted file, `app.txt`.
fn conflicted_repo() -> (TempDir, Repository) {
    let dir = TempDir::new().unwrap();
    let repo = init_repo(dir.path());

    let base = commit_on_head(&repo, "app.txt", BASE, "base");
    repo.branch("feature", &repo.find_commit(base).unwrap(), false)
        .unwrap();
    commit_on_head(&repo, "app.txt", OURS, "ours");
    commit_on_branch(&repo, "feature", "app.txt", THEIRS);

    {
        let feature = repo.find_reference("refs/heads/feature").unwrap();
        let annotated = repo.reference_to_annotated_commit(&feature).unwrap();
        let mut checkout = CheckoutBuilder::new();
        checkout.allow_conflicts(true).conflict_style_merge(true);
        repo.merge(&[&annotated], None, Some(&mut checkout)).unwrap();
    }

    assert_eq!(repo.state(), RepositoryState::Merge);
    assert!(repo.index().unwrap().has_conflicts());
    (dir, repo)
}

/// A fresh handle, so index state is re-read from disk.
fn reopen(dir: &TempDir) -> Repository {
    Repository::open(dir.path()).unwrap()
}

fn read(dir: &TempDir, path: &str) -> String {
    std::fs::read_to_string(dir.path().join(path)).unwrap()
}

// ===========================================================================
// Tests
// ===========================================================================

#[test]
fn test_load_conflicts_reads_marked_files() {
    let (dir, _repo) = conflicted_repo();
    let mut backend = GitBackend::open(dir.path()).unwrap();
    assert!(backend.is_merging());

    let set = backend.load_conflicts().unwrap();
    assert_eq!(set.files.len(), 1);
    assert_eq!(set.files[0].path, "app.txt");
    assert!(set.files[0].text.contains("<<<<<<<"));
    assert!(set.files[0].text.contains(">>>>>>>"));
    assert!(set.merge_source.unwrap_or_default().contains("feature"));
}

#[tokio::test]
async fn test_resolve_and_commit_merge() {
    let (dir, repo) = conflicted_repo();
    let backend = GitBackend::open(dir.path()).unwrap().with_author(Some(CommitAuthor {
        name: "Merge Bot".into(),
        email: "bot@example.com".into(),
    }));
    let mut driver = MergeDriver::new(backend, ConflictParser::new(ParseMode::Strict));

    let session = driver.start().await.unwrap();
    assert_eq!(session.conflict_count(), 1);
    let hunk = &session.file("app.txt").unwrap().hunks()[0];
    assert_eq!(hunk.our_content, vec!["value = 1"]);
    assert_eq!(hunk.their_content, vec!["value = 2"]);

    driver
        .session_mut()
        .resolve_hunk("app.txt", "hunk-1", Resolution::Theirs)
        .unwrap();
    let outcome = driver.complete("Merge branch 'feature'").await.unwrap();

    assert!(!driver.session().is_in_merge());
    assert_eq!(repo.state(), RepositoryState::Clean);
    // Only hunk content is reconstructed; surrounding lines are not kept.
    assert_eq!(read(&dir, "app.txt"), "value = 2");

    let head = repo.head().unwrap().peel_to_commit().unwrap();
    assert_eq!(head.id().to_string(), outcome.commit_id);
    assert_eq!(head.parent_count(), 2);
    assert_eq!(head.message(), Some("Merge branch 'feature'"));
    assert_eq!(head.author().name(), Some("Merge Bot"));
    assert!(!reopen(&dir).index().unwrap().has_conflicts());
}

#[tokio::test]
async fn test_premature_complete_touches_nothing() {
    let (dir, repo) = conflicted_repo();
    let before = read(&dir, "app.txt");
    let mut driver = MergeDriver::new(GitBackend::open(dir.path()).unwrap(), ConflictParser::default());
    driver.start().await.unwrap();

    let err = driver.complete("Merge").await.unwrap_err();
    assert!(matches!(err, SessionError::UnresolvedConflicts { remaining: 1 }));
    assert!(driver.session().is_in_merge());
    assert_eq!(repo.state(), RepositoryState::Merge);
    assert_eq!(read(&dir, "app.txt"), before);
}

#[tokio::test]
async fn test_commit_refuses_stale_file() {
    let (dir, repo) = conflicted_repo();
    let mut driver = MergeDriver::new(GitBackend::open(dir.path()).unwrap(), ConflictParser::default());
    driver.start().await.unwrap();
    driver.session_mut().resolve_file("app.txt", Resolution::Ours).unwrap();

    std::fs::write(dir.path().join("app.txt"), "edited elsewhere\n").unwrap();

    let err = driver.complete("Merge").await.unwrap_err();
    assert!(matches!(err, SessionError::CommitFailed(BackendError::Stale(ref p)) if p == "app.txt"));
    assert!(driver.session().can_complete_merge());
    assert_eq!(repo.state(), RepositoryState::Merge);
}

#[tokio::test]
async fn test_rejected_commit_leaves_tree_untouched() {
    let (dir, repo) = conflicted_repo();
    let before = read(&dir, "app.txt");
    // libgit2 refuses signatures containing angle brackets.
    let backend = GitBackend::open(dir.path()).unwrap().with_author(Some(CommitAuthor {
        name: "<bot>".into(),
        email: "bot@example.com".into(),
    }));
    let mut driver = MergeDriver::new(backend, ConflictParser::default());
    driver.start().await.unwrap();
    driver.session_mut().resolve_file("app.txt", Resolution::Theirs).unwrap();

    for _ in 0..2 {
        let err = driver.complete("Merge").await.unwrap_err();
        assert!(
            matches!(err, SessionError::CommitFailed(BackendError::Git(_))),
            "unexpected error: {:?}",
            err
        );
    }
    assert!(driver.session().can_complete_merge());
    assert_eq!(read(&dir, "app.txt"), before);
    assert_eq!(repo.state(), RepositoryState::Merge);
    assert!(reopen(&dir).index().unwrap().has_conflicts());

    let backend = GitBackend::open(dir.path()).unwrap().with_author(Some(CommitAuthor {
        name: "Merge Bot".into(),
        email: "bot@example.com".into(),
    }));
    let mut driver = MergeDriver::new(backend, ConflictParser::default());
    driver.start().await.unwrap();
    driver.session_mut().resolve_file("app.txt", Resolution::Theirs).unwrap();
    driver.complete("Merge").await.unwrap();
    assert_eq!(read(&dir, "app.txt"), "value = 2");
    assert_eq!(repo.state(), RepositoryState::Clean);
}

#[tokio::test]
async fn test_abort_restores_head() {
    let (dir, repo) = conflicted_repo();
    let mut driver = MergeDriver::new(GitBackend::open(dir.path()).unwrap(), ConflictParser::default());
    driver.start().await.unwrap();
    driver.session_mut().resolve_file("app.txt", Resolution::Both).unwrap();

    assert_eq!(driver.abort().await.unwrap(), 1);
    assert!(!driver.session().is_in_merge());
    assert!(!driver.session().has_conflicts());
    assert_eq!(repo.state(), RepositoryState::Clean);
    assert_eq!(read(&dir, "app.txt"), OURS);
    assert!(!reopen(&dir).index().unwrap().has_conflicts());
}
