//! Read-only repository queries for the apply loop, backed either by
//! libgit2 or by the `git` executable with identical observable output.

mod accessor;
mod cli;
pub mod commit_log;
mod config;
mod deadline;
pub mod diff;
mod error;
#[cfg(feature = "libgit2")]
mod repo;
mod runner;

pub use accessor::{GitAccessor, open_accessor};
pub use cli::CliGitAccessor;
pub use commit_log::CommitMetadata;
pub use config::{AccessorConfig, AccessorSettings, BackendKind, Mergeable, load_settings_from_paths};
pub use deadline::Deadline;
pub use diff::{ChangeKind, ChangeRecord, DiffError, DiffMode, RawDelta, RawStatus, classify};
pub use error::{GitUtilError, Result};
#[cfg(feature = "libgit2")]
pub use repo::LibGitAccessor;
pub use runner::{CommandOutput, CommandRunner, ProcessRunner};
