use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// Which accessor implementation to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process libgit2.
    Library,
    /// External `git` executable.
    Process,
}

impl Default for BackendKind {
    fn default() -> Self {
        if cfg!(feature = "libgit2") {
            Self::Library
        } else {
            Self::Process
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Library => write!(f, "library"),
            Self::Process => write!(f, "process"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "library" | "libgit2" => Ok(Self::Library),
            "process" | "cli" => Ok(Self::Process),
            other => bail!("unknown backend {other:?} (expected \"library\" or \"process\")"),
        }
    }
}

/// Fully resolved settings for [`crate::open_accessor`].
#[derive(Debug, Clone, PartialEq)]
pub struct AccessorConfig {
    pub repo_path: PathBuf,
    pub backend: BackendKind,
    pub git_program: PathBuf,
    pub command_timeout: Option<Duration>,
}

impl AccessorConfig {
    /// Defaults for everything except the repository location.
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
            backend: BackendKind::default(),
            git_program: PathBuf::from("git"),
            command_timeout: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Layered settings
// ---------------------------------------------------------------------------

/// Composable merge for layered configuration.
pub trait Mergeable {
    fn merge(self, other: Self) -> Self;
}

/// One configuration layer; unset fields fall through to earlier layers.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct AccessorSettings {
    pub repo_path: Option<PathBuf>,
    pub backend: Option<BackendKind>,
    pub git_program: Option<PathBuf>,
    pub command_timeout_secs: Option<u64>,
}

impl Mergeable for AccessorSettings {
    fn merge(self, other: Self) -> Self {
        Self {
            repo_path: other.repo_path.or(self.repo_path),
            backend: other.backend.or(self.backend),
            git_program: other.git_program.or(self.git_program),
            command_timeout_secs: other.command_timeout_secs.or(self.command_timeout_secs),
        }
    }
}

impl AccessorSettings {
    /// Overrides from `KGU_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let backend = get("KGU_BACKEND")
            .map(|v| v.parse::<BackendKind>())
            .transpose()
            .context("invalid KGU_BACKEND")?;
        let command_timeout_secs = get("KGU_COMMAND_TIMEOUT_SECS")
            .map(|v| v.trim().parse::<u64>())
            .transpose()
            .context("invalid KGU_COMMAND_TIMEOUT_SECS")?;

        Ok(Self {
            repo_path: get("KGU_REPO_PATH").map(PathBuf::from),
            backend,
            git_program: get("KGU_GIT_PROGRAM").map(PathBuf::from),
            command_timeout_secs,
        })
    }

    pub fn resolve(self) -> Result<AccessorConfig> {
        let repo_path = self
            .repo_path
            .context("repo_path is not configured")?;

        let mut config = AccessorConfig::new(repo_path);
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(program) = self.git_program {
            config.git_program = program;
        }
        // Zero means "no limit".
        config.command_timeout = self
            .command_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Ok(config)
    }
}

/// Load and merge settings from an explicit list of file paths (in order).
/// Missing files are skipped; malformed ones are logged and skipped.
pub fn load_settings_from_paths(paths: &[PathBuf]) -> AccessorSettings {
    paths
        .iter()
        .filter_map(|p| load_settings_file(p))
        .reduce(Mergeable::merge)
        .unwrap_or_default()
}

fn load_settings_file(path: &Path) -> Option<AccessorSettings> {
    let contents = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(settings) => Some(settings),
        Err(e) => {
            log::warn!("ignoring malformed settings file {}: {e}", path.display());
            None
        }
    }
}
