//! Backend-independent diff classification.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Raw per-path status as reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawStatus {
    Unmodified,
    Added,
    Untracked,
    Deleted,
    Copied,
    Renamed,
    Modified,
    TypeChanged,
    /// Anything the classifier does not know how to fold.
    Other(String),
}

impl fmt::Display for RawStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unmodified => write!(f, "unmodified"),
            Self::Added => write!(f, "added"),
            Self::Untracked => write!(f, "untracked"),
            Self::Deleted => write!(f, "deleted"),
            Self::Copied => write!(f, "copied"),
            Self::Renamed => write!(f, "renamed"),
            Self::Modified => write!(f, "modified"),
            Self::TypeChanged => write!(f, "type-changed"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// A single file-level change between two trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDelta {
    pub status: RawStatus,
    pub old_path: Option<String>,
    pub new_path: Option<String>,
}

impl RawDelta {
    pub fn new(status: RawStatus, old_path: Option<&str>, new_path: Option<&str>) -> Self {
        Self {
            status,
            old_path: old_path.filter(|p| !p.is_empty()).map(str::to_string),
            new_path: new_path.filter(|p| !p.is_empty()).map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "A"),
            Self::Modified => write!(f, "M"),
            Self::Removed => write!(f, "R"),
        }
    }
}

/// Path → change kind, kept sorted by path so every backend renders the
/// same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeRecord(BTreeMap<String, ChangeKind>);

impl ChangeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, kind: ChangeKind) {
        self.0.insert(path.into(), kind);
    }

    pub fn get(&self, path: &str) -> Option<ChangeKind> {
        self.0.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ChangeKind)> {
        self.0.iter().map(|(p, k)| (p.as_str(), *k))
    }

    /// Paths worth re-applying: everything added or modified.
    pub fn applicable_paths(&self) -> impl Iterator<Item = &str> {
        self.iter()
            .filter(|(_, kind)| *kind != ChangeKind::Removed)
            .map(|(path, _)| path)
    }

    /// One `<letter>\t<path>` line per entry.
    pub fn to_lines(&self) -> String {
        self.iter()
            .map(|(path, kind)| format!("{kind}\t{path}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Whether deletions are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffMode {
    /// Commit log: removals are shown.
    FullLog,
    /// Changed-files listing: a deleted file must never be re-applied, so
    /// plain deletions are dropped.
    ChangedFilesOnly,
}

impl DiffMode {
    fn include_removals(self) -> bool {
        matches!(self, Self::FullLog)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
    #[error("unhandled diff status {status}")]
    UnhandledStatus { status: String },

    #[error("{status} delta is missing its path")]
    MissingPath { status: String },
}

/// Fold `deltas` into a [`ChangeRecord`].
///
/// Later deltas overwrite earlier ones for the same path.
pub fn classify<'a, I>(deltas: I, mode: DiffMode) -> Result<ChangeRecord, DiffError>
where
    I: IntoIterator<Item = &'a RawDelta>,
{
    let mut record = ChangeRecord::new();

    for delta in deltas {
        log::trace!(
            "classify {} {:?} -> {:?}",
            delta.status,
            delta.old_path,
            delta.new_path
        );

        match &delta.status {
            RawStatus::Unmodified => continue,
            RawStatus::Added | RawStatus::Untracked | RawStatus::Copied => {
                record.insert(new_path(delta)?, ChangeKind::Added);
            }
            RawStatus::Deleted => {
                if mode.include_removals() {
                    record.insert(old_path(delta)?, ChangeKind::Removed);
                }
            }
            RawStatus::Renamed => {
                record.insert(new_path(delta)?, ChangeKind::Added);
                record.insert(old_path(delta)?, ChangeKind::Removed);
            }
            RawStatus::Modified | RawStatus::TypeChanged => {
                if delta.old_path.is_none() && delta.new_path.is_none() {
                    return Err(missing(delta));
                }
                if let Some(old) = &delta.old_path {
                    record.insert(old.as_str(), ChangeKind::Modified);
                }
                if let Some(new) = &delta.new_path {
                    record.insert(new.as_str(), ChangeKind::Modified);
                }
            }
            RawStatus::Other(status) => {
                return Err(DiffError::UnhandledStatus {
                    status: status.clone(),
                });
            }
        }
    }

    Ok(record)
}

fn new_path(delta: &RawDelta) -> Result<&str, DiffError> {
    delta.new_path.as_deref().ok_or_else(|| missing(delta))
}

fn old_path(delta: &RawDelta) -> Result<&str, DiffError> {
    delta.old_path.as_deref().ok_or_else(|| missing(delta))
}

fn missing(delta: &RawDelta) -> DiffError {
    DiffError::MissingPath {
        status: delta.status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(status: RawStatus, old: &str, new: &str) -> RawDelta {
        RawDelta::new(status, Some(old), Some(new))
    }

    #[test]
    fn test_unmodified_is_ignored() {
        let deltas = [delta(RawStatus::Unmodified, "a", "a")];
        let record = classify(&deltas, DiffMode::FullLog).unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn test_added_untracked_and_copied_are_added() {
        let deltas = [
            delta(RawStatus::Added, "", "a"),
            delta(RawStatus::Untracked, "", "b"),
            delta(RawStatus::Copied, "a", "c"),
        ];
        let record = classify(&deltas, DiffMode::ChangedFilesOnly).unwrap();
        assert_eq!(record.get("a"), Some(ChangeKind::Added));
        assert_eq!(record.get("b"), Some(ChangeKind::Added));
        assert_eq!(record.get("c"), Some(ChangeKind::Added));
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn test_deletion_depends_on_mode() {
        let deltas = [delta(RawStatus::Deleted, "gone.yaml", "")];

        let full = classify(&deltas, DiffMode::FullLog).unwrap();
        assert_eq!(full.get("gone.yaml"), Some(ChangeKind::Removed));

        let changed = classify(&deltas, DiffMode::ChangedFilesOnly).unwrap();
        assert!(changed.is_empty());
    }

    #[test]
    fn test_rename_is_add_plus_remove_in_both_modes() {
        let deltas = [delta(RawStatus::Renamed, "x.yaml", "y.yaml")];

        for mode in [DiffMode::FullLog, DiffMode::ChangedFilesOnly] {
            let record = classify(&deltas, mode).unwrap();
            assert_eq!(record.get("y.yaml"), Some(ChangeKind::Added));
            assert_eq!(record.get("x.yaml"), Some(ChangeKind::Removed));
            assert_eq!(record.applicable_paths().collect::<Vec<_>>(), ["y.yaml"]);
        }
    }

    #[test]
    fn test_modified_writes_both_paths_when_they_differ() {
        let deltas = [
            delta(RawStatus::Modified, "old", "new"),
            delta(RawStatus::TypeChanged, "link", "link"),
            RawDelta::new(RawStatus::Modified, None, Some("only-new")),
        ];
        let record = classify(&deltas, DiffMode::FullLog).unwrap();
        assert_eq!(record.get("old"), Some(ChangeKind::Modified));
        assert_eq!(record.get("new"), Some(ChangeKind::Modified));
        assert_eq!(record.get("link"), Some(ChangeKind::Modified));
        assert_eq!(record.get("only-new"), Some(ChangeKind::Modified));
        assert_eq!(record.len(), 4);
    }

    #[test]
    fn test_unknown_status_fails_with_its_name() {
        let deltas = [
            delta(RawStatus::Added, "", "a"),
            delta(RawStatus::Other("conflicted".into()), "b", "b"),
        ];
        let err = classify(&deltas, DiffMode::ChangedFilesOnly).unwrap_err();
        assert_eq!(
            err,
            DiffError::UnhandledStatus {
                status: "conflicted".into()
            }
        );
        assert_eq!(err.to_string(), "unhandled diff status conflicted");
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let deltas = [RawDelta::new(RawStatus::Added, Some("a"), None)];
        let err = classify(&deltas, DiffMode::FullLog).unwrap_err();
        assert!(matches!(err, DiffError::MissingPath { .. }));
    }

    #[test]
    fn test_later_delta_wins() {
        let deltas = [
            delta(RawStatus::Deleted, "a", ""),
            delta(RawStatus::Added, "", "a"),
        ];
        let record = classify(&deltas, DiffMode::FullLog).unwrap();
        assert_eq!(record.get("a"), Some(ChangeKind::Added));
    }

    #[test]
    fn test_lines_are_sorted_by_path() {
        let deltas = [
            delta(RawStatus::Added, "", "b.txt"),
            delta(RawStatus::Modified, "a.txt", "a.txt"),
            delta(RawStatus::Deleted, "c.txt", ""),
        ];
        let record = classify(&deltas, DiffMode::FullLog).unwrap();
        assert_eq!(record.to_lines(), "M\ta.txt\nA\tb.txt\nR\tc.txt");
    }
}
