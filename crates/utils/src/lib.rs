use std::path::{Path, PathBuf};

/// Join every repository-relative path onto `root`.
///
/// Empty entries (e.g. from a trailing newline in tool output) are dropped,
/// so an empty input always yields an empty output.
pub fn prepend_to_each_path<I, S>(root: &Path, relative_paths: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    relative_paths
        .into_iter()
        .filter(|p| !p.as_ref().is_empty())
        .map(|p| root.join(p.as_ref()))
        .collect()
}
