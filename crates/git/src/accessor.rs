use std::path::{Path, PathBuf};

use crate::cli::CliGitAccessor;
use crate::config::{AccessorConfig, BackendKind};
use crate::error::{GitUtilError, Result};
use crate::runner::ProcessRunner;

/// Read-only view of a repository, as needed by the apply loop.
///
/// Implementations are not required to be `Sync`; share one instance
/// between threads behind a mutex.
pub trait GitAccessor: Send {
    /// Full lower-case hex id of the HEAD commit.
    fn head_hash(&self) -> Result<String>;

    /// Every tracked path, prefixed with the repository root.
    fn list_all_files(&self) -> Result<Vec<PathBuf>>;

    /// Commit header plus its file changes against the first parent.
    fn commit_log(&self, hash: &str) -> Result<String>;

    /// Added, modified, copied and renamed-to paths between two commits.
    /// Deleted paths are never returned.
    fn list_diff_files(&self, old_hash: &str, new_hash: &str) -> Result<Vec<PathBuf>>;
}

/// Open the backend selected in `config`. The choice is made once here.
pub fn open_accessor(config: &AccessorConfig) -> Result<Box<dyn GitAccessor>> {
    log::debug!(
        "opening {} accessor for {}",
        config.backend,
        config.repo_path.display()
    );

    match config.backend {
        BackendKind::Library => open_library(&config.repo_path),
        BackendKind::Process => {
            let runner =
                ProcessRunner::new(&config.git_program).with_timeout(config.command_timeout);
            Ok(Box::new(CliGitAccessor::with_runner(
                &config.repo_path,
                runner,
            )?))
        }
    }
}

#[cfg(feature = "libgit2")]
fn open_library(path: &Path) -> Result<Box<dyn GitAccessor>> {
    Ok(Box::new(crate::repo::LibGitAccessor::open(path)?))
}

#[cfg(not(feature = "libgit2"))]
fn open_library(_path: &Path) -> Result<Box<dyn GitAccessor>> {
    Err(GitUtilError::BackendUnavailable {
        backend: BackendKind::Library.to_string(),
    })
}

/// Absolute form of the configured repository root. Symlinks are left
/// alone so both backends prefix paths identically.
pub(crate) fn repo_root(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| {
        GitUtilError::repository(format!("open({})", path.display()), e)
    })
}

/// Hashes are exact object ids (SHA-1 or SHA-256 hex), never revision
/// expressions such as `HEAD~1`, branch names or abbreviations.
pub(crate) fn is_full_hash(hash: &str) -> bool {
    matches!(hash.len(), 40 | 64) && hash.bytes().all(|b| b.is_ascii_hexdigit())
}
