//! Accessor backed by libgit2, no external process involved.

use std::path::{Path, PathBuf};

use git2::{Commit, Delta, DiffFile, DiffOptions, ErrorCode, Oid, Repository};
use kgu_utils::prepend_to_each_path;

use crate::accessor::{GitAccessor, is_full_hash, repo_root};
use crate::commit_log::{self, CommitMetadata};
use crate::deadline::Deadline;
use crate::diff::{DiffMode, RawDelta, RawStatus, classify};
use crate::error::{GitUtilError, Result};

pub struct LibGitAccessor {
    repo: Repository,
    root: PathBuf,
    deadline: Deadline,
}

impl LibGitAccessor {
    /// Open the repository whose working directory is `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let root = repo_root(path)?;
        let repo = Repository::open(&root).map_err(|e| {
            GitUtilError::repository(format!("open({})", root.display()), e.message())
        })?;
        Ok(Self {
            repo,
            root,
            deadline: Deadline::none(),
        })
    }

    /// libgit2 calls cannot be interrupted, so the deadline is only checked
    /// before each operation starts.
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn find_commit(&self, context: &str, hash: &str) -> Result<Commit<'_>> {
        if !is_full_hash(hash) {
            return Err(GitUtilError::not_found(context, hash));
        }
        let oid = Oid::from_str(hash).map_err(|_| GitUtilError::not_found(context, hash))?;

        // A lookup of a non-commit object also reports NotFound.
        self.repo.find_commit(oid).map_err(|e| match e.code() {
            ErrorCode::NotFound | ErrorCode::InvalidSpec | ErrorCode::Ambiguous => {
                GitUtilError::not_found(context, hash)
            }
            _ => GitUtilError::repository(context, e.message()),
        })
    }

    fn tree_deltas(&self, old: &Commit<'_>, new: &Commit<'_>) -> std::result::Result<Vec<RawDelta>, git2::Error> {
        let old_tree = old.tree()?;
        let new_tree = new.tree()?;

        // Without this a file <-> symlink change comes back as Deleted + Added.
        let mut opts = DiffOptions::new();
        opts.include_typechange(true);

        let diff = self
            .repo
            .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut opts))?;

        Ok(diff
            .deltas()
            .map(|delta| {
                let old_path = file_path(delta.old_file());
                let new_path = file_path(delta.new_file());
                RawDelta::new(
                    raw_status(delta.status()),
                    old_path.as_deref(),
                    new_path.as_deref(),
                )
            })
            .collect())
    }
}

impl GitAccessor for LibGitAccessor {
    fn head_hash(&self) -> Result<String> {
        let context = "head_hash";
        self.deadline.check(context)?;
        log::debug!("{context} in {}", self.root.display());

        let commit = self
            .repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .map_err(|e| {
                GitUtilError::repository(context, format!("HEAD cannot be resolved: {}", e.message()))
            })?;

        Ok(commit.id().to_string())
    }

    fn list_all_files(&self) -> Result<Vec<PathBuf>> {
        let context = "list_all_files";
        self.deadline.check(context)?;
        log::debug!("{context} in {}", self.root.display());

        let mut index = self
            .repo
            .index()
            .map_err(|e| GitUtilError::repository(context, e.message()))?;
        // Pick up changes written by other processes since the last call.
        index
            .read(false)
            .map_err(|e| GitUtilError::repository(context, e.message()))?;

        let mut files: Vec<String> = index
            .iter()
            .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
            .collect();
        files.dedup();

        Ok(prepend_to_each_path(&self.root, files))
    }

    fn commit_log(&self, hash: &str) -> Result<String> {
        let context = format!("commit_log({hash})");
        self.deadline.check(&context)?;
        log::debug!("{context} in {}", self.root.display());

        let commit = self.find_commit(&context, hash)?;
        let commit_id = commit.id().to_string();

        if commit.parent_count() == 0 {
            return Err(GitUtilError::NoParent { hash: commit_id });
        }
        let parent = commit
            .parent(0)
            .map_err(|e| GitUtilError::repository(&context, e.message()))?;

        let deltas = self
            .tree_deltas(&parent, &commit)
            .map_err(|e| GitUtilError::repository(&context, e.message()))?;
        let changes = classify(&deltas, DiffMode::FullLog).map_err(|source| GitUtilError::Diff {
            context: context.clone(),
            source,
        })?;

        let author = commit.author();
        let when = author.when();

        commit_log::render(&CommitMetadata {
            commit_id,
            author_name: author.name().map(str::to_string),
            author_email: author.email().map(str::to_string),
            author_date: commit_log::author_date(when.seconds(), when.offset_minutes()),
            message: commit.message().map(str::to_string),
            changes,
        })
    }

    fn list_diff_files(&self, old_hash: &str, new_hash: &str) -> Result<Vec<PathBuf>> {
        let context = format!("list_diff_files({old_hash}..{new_hash})");
        self.deadline.check(&context)?;
        log::debug!("{context} in {}", self.root.display());

        let old = self.find_commit(&context, old_hash)?;
        let new = self.find_commit(&context, new_hash)?;

        let deltas = self
            .tree_deltas(&old, &new)
            .map_err(|e| GitUtilError::repository(&context, e.message()))?;
        let changes = classify(&deltas, DiffMode::ChangedFilesOnly)
            .map_err(|source| GitUtilError::Diff { context, source })?;

        Ok(prepend_to_each_path(&self.root, changes.applicable_paths()))
    }
}

fn file_path(file: DiffFile<'_>) -> Option<String> {
    file.path().map(|p| p.to_string_lossy().into_owned())
}

fn raw_status(status: Delta) -> RawStatus {
    match status {
        Delta::Unmodified => RawStatus::Unmodified,
        Delta::Added => RawStatus::Added,
        Delta::Untracked => RawStatus::Untracked,
        Delta::Deleted => RawStatus::Deleted,
        Delta::Copied => RawStatus::Copied,
        Delta::Renamed => RawStatus::Renamed,
        Delta::Modified => RawStatus::Modified,
        Delta::Typechange => RawStatus::TypeChanged,
        Delta::Ignored => RawStatus::Other("ignored".into()),
        Delta::Unreadable => RawStatus::Other("unreadable".into()),
        Delta::Conflicted => RawStatus::Other("conflicted".into()),
    }
}
