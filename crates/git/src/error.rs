use thiserror::Error;

use crate::diff::DiffError;

/// Everything an accessor can fail with.
///
/// `context` fields carry the operation name and the hash(es) involved,
/// e.g. `list_diff_files(4f1c..9a0e)`.
#[derive(Debug, Error)]
pub enum GitUtilError {
    /// Open/read failure, unresolvable HEAD, unreadable index.
    #[error("{context}: {message}")]
    Repository { context: String, message: String },

    #[error("{context}: commit {hash} not found")]
    CommitNotFound { context: String, hash: String },

    /// A commit log was requested for a root commit.
    #[error("commit_log({hash}): commit has no parent to diff against")]
    NoParent { hash: String },

    #[error("{context}: {source}")]
    Diff {
        context: String,
        #[source]
        source: DiffError,
    },

    /// Non-zero exit (or spawn failure) of the external tool. `output` is the
    /// tool's combined stdout/stderr, untouched.
    #[error("error running command {command}: {status}: {output}")]
    ExternalTool {
        command: String,
        status: String,
        output: String,
    },

    #[error("failed to render commit log for {hash}: {message}")]
    TemplateRender { hash: String, message: String },

    #[error("{context}: deadline exceeded")]
    DeadlineExceeded { context: String },

    #[error("{backend} backend is not compiled into this build")]
    BackendUnavailable { backend: String },
}

impl GitUtilError {
    pub(crate) fn repository(context: impl Into<String>, message: impl ToString) -> Self {
        Self::Repository {
            context: context.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn not_found(context: impl Into<String>, hash: &str) -> Self {
        Self::CommitNotFound {
            context: context.into(),
            hash: hash.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::CommitNotFound { .. })
    }

    pub fn is_no_parent(&self) -> bool {
        matches!(self, Self::NoParent { .. })
    }
}

pub type Result<T> = std::result::Result<T, GitUtilError>;
