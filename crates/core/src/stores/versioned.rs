//! Versioned file operations backed by a local Git repository.
//!
//! [`GitStore`](super::git::GitStore) keeps every concept, tracking record, translation and
//! refset as a JSON file and commits each write. This module owns the Git side of that:
//!
//! - **Atomic multi-file changes**: write or remove files and commit them in one commit,
//!   restoring the previous on-disk state if anything fails
//! - **Structured commit messages**: `<domain>:<action>: <summary>` plus sorted trailers
//! - **History access**: the linear list of commits (oldest first) and file contents at
//!   any commit, which is what concept revisions are built on
//!
//! ## Branch policy
//!
//! Stores standardise on `refs/heads/main`.

use crate::{WorkflowError, WorkflowResult};
use refset_types::NonEmptyText;
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

const MAIN_REF: &str = "refs/heads/main";

/// Which kind of document a commit changes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub(crate) enum CommitDomain {
    Concept,
    TrackingRecord,
    Translation,
    Refset,
}

impl CommitDomain {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Concept => "concept",
            Self::TrackingRecord => "tracking",
            Self::Translation => "translation",
            Self::Refset => "refset",
        }
    }
}

impl fmt::Display for CommitDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a commit does to its document.
///
/// `Restore` marks a concept being rolled back to an earlier revision; the rolled-back
/// content stays reachable in history like everything else.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub(crate) enum CommitAction {
    Create,
    Update,
    Delete,
    Restore,
}

impl CommitAction {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Restore => "restore",
        }
    }
}

impl fmt::Display for CommitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `Key: Value` Git trailer.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct CommitTrailer {
    key: String,
    value: String,
}

impl CommitTrailer {
    fn new(key: impl Into<String>, value: impl Into<String>) -> WorkflowResult<Self> {
        let key = key.into().trim().to_string();
        let value = value.into().trim().to_string();

        if key.is_empty()
            || key.contains(['\n', '\r'])
            || key.contains(':')
            || value.is_empty()
            || value.contains(['\n', '\r'])
        {
            return Err(WorkflowError::InvalidInput(
                "commit trailer key/value must be non-empty and single-line (key cannot contain ':')"
                    .into(),
            ));
        }

        Ok(Self { key, value })
    }
}

/// A structured, predictable commit message.
///
/// Rendering rules:
///
/// - Subject line: `<domain>:<action>: <summary>`
/// - Trailers (optional), sorted, separated from the subject by one blank line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct CommitMessage {
    domain: CommitDomain,
    action: CommitAction,
    summary: NonEmptyText,
    trailers: Vec<CommitTrailer>,
}

impl CommitMessage {
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidInput`] if `summary` is empty or multi-line.
    pub(crate) fn new(
        domain: CommitDomain,
        action: CommitAction,
        summary: impl AsRef<str>,
    ) -> WorkflowResult<Self> {
        let summary = NonEmptyText::new(summary.as_ref()).map_err(|e| {
            WorkflowError::InvalidInput(format!("commit summary is not valid: {e}"))
        })?;
        Ok(Self {
            domain,
            action,
            summary,
            trailers: Vec::new(),
        })
    }

    pub(crate) fn with_trailer(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> WorkflowResult<Self> {
        self.trailers.push(CommitTrailer::new(key, value)?);
        Ok(self)
    }

    pub(crate) fn render(&self) -> String {
        let mut rendered = format!("{}:{}: {}", self.domain, self.action, self.summary);

        if self.trailers.is_empty() {
            return rendered;
        }

        let mut trailers = self.trailers.clone();
        trailers.sort_by(|a, b| (&a.key, &a.value).cmp(&(&b.key, &b.value)));

        rendered.push('\n');
        for trailer in trailers {
            rendered.push('\n');
            rendered.push_str(&trailer.key);
            rendered.push_str(": ");
            rendered.push_str(&trailer.value);
        }
        rendered
    }
}

/// Name and email recorded as a commit's author and committer.
#[derive(Clone, Debug)]
pub(crate) struct Committer {
    pub name: String,
    pub email: String,
}

/// A single file change inside one commit.
#[derive(Debug, Clone)]
pub(crate) enum FileChange<'a> {
    /// Write `content`; `old_content` is `None` for a file that must not exist yet.
    Write {
        relative_path: &'a Path,
        content: &'a str,
        old_content: Option<&'a str>,
    },
    /// Remove a file whose current content is `old_content`.
    Remove {
        relative_path: &'a Path,
        old_content: &'a str,
    },
}

impl FileChange<'_> {
    fn relative_path(&self) -> &Path {
        match self {
            Self::Write { relative_path, .. } | Self::Remove { relative_path, .. } => {
                relative_path
            }
        }
    }
}

/// Git operations on a repository rooted at `workdir`.
pub(crate) struct VersionedFileService {
    repo: git2::Repository,
    workdir: PathBuf,
}

impl VersionedFileService {
    /// Initialise a repository at `workdir`, or open the one already there.
    pub(crate) fn init_or_open(workdir: &Path) -> WorkflowResult<Self> {
        if workdir.join(".git").is_dir() {
            return Self::open(workdir);
        }
        std::fs::create_dir_all(workdir).map_err(WorkflowError::StorageDirCreation)?;
        let repo = git2::Repository::init(workdir).map_err(WorkflowError::GitInit)?;
        let service = Self::from_repo(repo, WorkflowError::GitInit)?;
        service.ensure_main_head()?;
        Ok(service)
    }

    /// Open an existing repository without searching parent directories.
    pub(crate) fn open(workdir: &Path) -> WorkflowResult<Self> {
        let repo = git2::Repository::open_ext(
            workdir,
            git2::RepositoryOpenFlags::NO_SEARCH,
            std::iter::empty::<&std::ffi::OsStr>(),
        )
        .map_err(WorkflowError::GitOpen)?;
        Self::from_repo(repo, WorkflowError::GitOpen)
    }

    fn from_repo(
        repo: git2::Repository,
        on_bare: fn(git2::Error) -> WorkflowError,
    ) -> WorkflowResult<Self> {
        // git2 may canonicalise the path; strip against what it reports.
        let workdir = repo
            .workdir()
            .ok_or_else(|| on_bare(git2::Error::from_str("repository has no working directory")))?
            .to_path_buf();
        Ok(Self { repo, workdir })
    }

    pub(crate) fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn ensure_main_head(&self) -> WorkflowResult<()> {
        self.repo
            .set_head(MAIN_REF)
            .map_err(WorkflowError::GitSetHead)
    }

    /// Apply `changes` to the working tree and commit them together.
    ///
    /// On error every written file is put back to its previous content, new files are
    /// removed, removed files are rewritten and directories created here are removed
    /// again.
    pub(crate) fn commit_changes(
        &self,
        committer: &Committer,
        message: &CommitMessage,
        changes: &[FileChange<'_>],
    ) -> WorkflowResult<git2::Oid> {
        let mut created_dirs: Vec<PathBuf> = Vec::new();
        let mut applied: Vec<(PathBuf, Option<String>)> = Vec::new();

        let result: WorkflowResult<git2::Oid> = (|| {
            for change in changes {
                check_relative(change.relative_path())?;
            }

            let mut dirs_needed = HashSet::new();
            for change in changes {
                if let FileChange::Write { relative_path, .. } = change {
                    let full_path = self.workdir.join(relative_path);
                    let mut current = full_path.parent();
                    while let Some(dir) = current {
                        if dir == self.workdir || dir.exists() {
                            break;
                        }
                        dirs_needed.insert(dir.to_path_buf());
                        current = dir.parent();
                    }
                }
            }

            let mut dirs_to_create: Vec<PathBuf> = dirs_needed.into_iter().collect();
            dirs_to_create.sort_by_key(|p| p.components().count());
            for dir in &dirs_to_create {
                std::fs::create_dir(dir).map_err(WorkflowError::StorageDirCreation)?;
                created_dirs.push(dir.clone());
            }

            for change in changes {
                let full_path = self.workdir.join(change.relative_path());
                match change {
                    FileChange::Write {
                        content,
                        old_content: None,
                        ..
                    } => {
                        write_new_file(&full_path, content)?;
                        applied.push((full_path, None));
                    }
                    FileChange::Write {
                        content,
                        old_content: Some(old),
                        ..
                    } => {
                        std::fs::write(&full_path, content).map_err(WorkflowError::FileWrite)?;
                        applied.push((full_path, Some(old.to_string())));
                    }
                    FileChange::Remove { old_content, .. } => {
                        std::fs::remove_file(&full_path).map_err(WorkflowError::FileRemove)?;
                        applied.push((full_path, Some(old_content.to_string())));
                    }
                }
            }

            self.commit_paths(committer, message, changes)
        })();

        match result {
            Ok(oid) => Ok(oid),
            Err(error) => {
                for (full_path, old_content) in applied.iter().rev() {
                    match old_content {
                        Some(contents) => {
                            if let Some(parent) = full_path.parent() {
                                let _ = std::fs::create_dir_all(parent);
                            }
                            let _ = std::fs::write(full_path, contents);
                        }
                        None => {
                            let _ = std::fs::remove_file(full_path);
                        }
                    }
                }
                for dir in created_dirs.iter().rev() {
                    let _ = std::fs::remove_dir(dir);
                }
                tracing::warn!(error = %error, "rolled back uncommitted store changes");
                Err(error)
            }
        }
    }

    fn commit_paths(
        &self,
        committer: &Committer,
        message: &CommitMessage,
        changes: &[FileChange<'_>],
    ) -> WorkflowResult<git2::Oid> {
        self.ensure_main_head()?;
        let mut index = self.repo.index().map_err(WorkflowError::GitIndex)?;

        for change in changes {
            match change {
                FileChange::Write { relative_path, .. } => {
                    index.add_path(relative_path).map_err(WorkflowError::GitAdd)?;
                }
                FileChange::Remove { relative_path, .. } => {
                    index
                        .remove_path(relative_path)
                        .map_err(WorkflowError::GitRemove)?;
                }
            }
        }

        let tree_id = index.write_tree().map_err(WorkflowError::GitWriteTree)?;
        let tree = self
            .repo
            .find_tree(tree_id)
            .map_err(WorkflowError::GitFindTree)?;
        let sig = git2::Signature::now(&committer.name, &committer.email)
            .map_err(WorkflowError::GitSignature)?;

        let parents = self.resolve_head_parents()?;
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        let oid = self
            .repo
            .commit(
                Some("HEAD"),
                &sig,
                &sig,
                &message.render(),
                &tree,
                &parent_refs,
            )
            .map_err(WorkflowError::GitCommit)?;

        index.write().map_err(WorkflowError::GitIndex)?;
        Ok(oid)
    }

    /// The parent list for a new commit: HEAD, or nothing on an unborn branch.
    fn resolve_head_parents(&self) -> WorkflowResult<Vec<git2::Commit<'_>>> {
        match self.repo.head() {
            Ok(head) => {
                let commit = head.peel_to_commit().map_err(WorkflowError::GitPeel)?;
                Ok(vec![commit])
            }
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => Ok(vec![]),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(vec![]),
            Err(e) => Err(WorkflowError::GitHead(e)),
        }
    }

    /// Commit ids from the first commit to HEAD.
    pub(crate) fn history(&self) -> WorkflowResult<Vec<git2::Oid>> {
        if self.resolve_head_parents()?.is_empty() {
            return Ok(Vec::new());
        }
        let mut walk = self.repo.revwalk().map_err(WorkflowError::GitRevwalk)?;
        walk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::REVERSE)
            .map_err(WorkflowError::GitRevwalk)?;
        walk.push_head().map_err(WorkflowError::GitRevwalk)?;
        walk.collect::<Result<Vec<_>, _>>()
            .map_err(WorkflowError::GitRevwalk)
    }

    /// Id of the blob at `relative_path` in commit `oid`, if the file existed there.
    pub(crate) fn blob_id_at(
        &self,
        oid: git2::Oid,
        relative_path: &Path,
    ) -> WorkflowResult<Option<git2::Oid>> {
        let commit = self.repo.find_commit(oid).map_err(WorkflowError::GitPeel)?;
        let tree = commit.tree().map_err(WorkflowError::GitFindTree)?;
        match tree.get_path(relative_path) {
            Ok(entry) => Ok(Some(entry.id())),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(WorkflowError::GitFindTree(e)),
        }
    }

    /// Text of the file at `relative_path` in commit `oid`, if it existed there.
    pub(crate) fn read_at(
        &self,
        oid: git2::Oid,
        relative_path: &Path,
    ) -> WorkflowResult<Option<String>> {
        let Some(blob_id) = self.blob_id_at(oid, relative_path)? else {
            return Ok(None);
        };
        let blob = self.repo.find_blob(blob_id).map_err(WorkflowError::GitBlob)?;
        let text = std::str::from_utf8(blob.content()).map_err(|e| {
            WorkflowError::InvalidInput(format!(
                "{} is not UTF-8 at commit {oid}: {e}",
                relative_path.display()
            ))
        })?;
        Ok(Some(text.to_string()))
    }
}

fn check_relative(path: &Path) -> WorkflowResult<()> {
    if path.is_absolute() || path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(WorkflowError::InvalidInput(
            "store paths must be relative and must not contain '..'".into(),
        ));
    }
    Ok(())
}

fn write_new_file(path: &Path, content: &str) -> WorkflowResult<()> {
    use std::io::Write;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(WorkflowError::FileWrite)?;
    file.write_all(content.as_bytes())
        .map_err(WorkflowError::FileWrite)
}
