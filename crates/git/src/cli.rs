//! Accessor backed by the `git` executable.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use kgu_utils::prepend_to_each_path;

use crate::accessor::{GitAccessor, is_full_hash, repo_root};
use crate::commit_log::{self, CommitMetadata};
use crate::deadline::Deadline;
use crate::diff::{DiffMode, RawDelta, RawStatus, classify};
use crate::error::{GitUtilError, Result};
use crate::runner::{CommandOutput, CommandRunner, ProcessRunner};

/// Only the file-status letters that can never mean a deletion.
const APPLICABLE_FILTER: &str = "--diff-filter=AMCRT";

const SHOW_FORMAT: &str = "--format=%H%x00%P%x00%an%x00%ae%x00%ad%x00%B";

pub struct CliGitAccessor<R: CommandRunner = ProcessRunner> {
    root: PathBuf,
    runner: R,
    deadline: Deadline,
}

impl CliGitAccessor<ProcessRunner> {
    pub fn open(path: &Path) -> Result<Self> {
        Self::with_runner(path, ProcessRunner::default())
    }
}

impl<R: CommandRunner> CliGitAccessor<R> {
    pub fn with_runner(path: &Path, runner: R) -> Result<Self> {
        let root = repo_root(path)?;
        if !root.is_dir() {
            return Err(GitUtilError::repository(
                format!("open({})", root.display()),
                "repository directory does not exist",
            ));
        }
        Ok(Self {
            root,
            runner,
            deadline: Deadline::none(),
        })
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run(&self, context: &str, args: &[&str]) -> Result<CommandOutput> {
        self.deadline.check(context)?;
        self.runner.run(&self.root, args, self.deadline)
    }

    /// Like [`Self::run`], but any non-zero exit is an error.
    fn run_checked(&self, context: &str, args: &[&str]) -> Result<CommandOutput> {
        let out = self.run(context, args)?;
        if !out.success() {
            return Err(self.tool_error(args, &out));
        }
        Ok(out)
    }

    fn tool_error(&self, args: &[&str], out: &CommandOutput) -> GitUtilError {
        GitUtilError::ExternalTool {
            command: self.runner.command_line(args),
            status: out.status_text(),
            output: out.combined(),
        }
    }

    /// `rev-parse --verify --quiet` exits 1, silently, for anything that is
    /// not a valid object name.
    fn rev_parse(&self, context: &str, spec: &str) -> Result<Option<String>> {
        let args = ["rev-parse", "--verify", "--quiet", spec];
        let out = self.run(context, &args)?;
        match out.status {
            Some(0) => Ok(Some(out.stdout_lossy().trim().to_string())),
            Some(1) => Ok(None),
            _ => Err(self.tool_error(&args, &out)),
        }
    }

    /// The id must name a commit itself; a tag that peels to one is not a match.
    fn resolve_commit(&self, context: &str, hash: &str) -> Result<String> {
        if !is_full_hash(hash) {
            return Err(GitUtilError::not_found(context, hash));
        }
        self.rev_parse(context, &format!("{hash}^{{commit}}"))?
            .filter(|id| id.eq_ignore_ascii_case(hash))
            .ok_or_else(|| GitUtilError::not_found(context, hash))
    }

    fn name_status(
        &self,
        context: &str,
        old: &str,
        new: &str,
        filter: Option<&str>,
    ) -> Result<Vec<RawDelta>> {
        // `--relative` keeps paths rooted where `ls-files` roots them when the
        // accessor was opened on a subdirectory of the work tree.
        let mut args = vec![
            "diff",
            "--no-color",
            "--no-ext-diff",
            "--relative",
            "--name-status",
            "-z",
        ];
        args.extend(filter);
        args.extend([old, new]);

        let out = self.run_checked(context, &args)?;
        parse_name_status(&out.stdout_lossy())
            .map_err(|message| GitUtilError::repository(context, message))
    }
}

impl<R: CommandRunner> GitAccessor for CliGitAccessor<R> {
    fn head_hash(&self) -> Result<String> {
        let context = "head_hash";
        log::debug!("{context} in {}", self.root.display());

        self.rev_parse(context, "HEAD^{commit}")?
            .ok_or_else(|| GitUtilError::repository(context, "HEAD cannot be resolved"))
    }

    fn list_all_files(&self) -> Result<Vec<PathBuf>> {
        let context = "list_all_files";
        log::debug!("{context} in {}", self.root.display());

        let out = self.run_checked(context, &["ls-files", "-z"])?;
        let raw = out.stdout_lossy();
        let mut files: Vec<&str> = raw.split('\0').filter(|p| !p.is_empty()).collect();
        files.dedup();

        Ok(prepend_to_each_path(&self.root, files))
    }

    fn commit_log(&self, hash: &str) -> Result<String> {
        let context = format!("commit_log({hash})");
        log::debug!("{context} in {}", self.root.display());

        let id = self.resolve_commit(&context, hash)?;
        let out = self.run_checked(
            &context,
            &["show", "-s", "--no-color", "--no-show-signature", "--date=raw", SHOW_FORMAT, id.as_str()],
        )?;
        let header = parse_show(&out.stdout_lossy())
            .map_err(|message| GitUtilError::repository(&context, message))?;

        let parent = header
            .first_parent
            .ok_or_else(|| GitUtilError::NoParent { hash: id.clone() })?;

        let deltas = self.name_status(&context, &parent, &id, None)?;
        let changes = classify(&deltas, DiffMode::FullLog).map_err(|source| GitUtilError::Diff {
            context: context.clone(),
            source,
        })?;

        commit_log::render(&CommitMetadata {
            commit_id: header.commit_id,
            author_name: Some(header.author_name),
            author_email: Some(header.author_email),
            author_date: header.author_date,
            message: Some(header.message),
            changes,
        })
    }

    fn list_diff_files(&self, old_hash: &str, new_hash: &str) -> Result<Vec<PathBuf>> {
        let context = format!("list_diff_files({old_hash}..{new_hash})");
        log::debug!("{context} in {}", self.root.display());

        let old = self.resolve_commit(&context, old_hash)?;
        let new = self.resolve_commit(&context, new_hash)?;

        let deltas = self.name_status(&context, &old, &new, Some(APPLICABLE_FILTER))?;
        let changes = classify(&deltas, DiffMode::ChangedFilesOnly)
            .map_err(|source| GitUtilError::Diff { context, source })?;

        Ok(prepend_to_each_path(&self.root, changes.applicable_paths()))
    }
}

#[derive(Debug)]
struct ShowHeader {
    commit_id: String,
    first_parent: Option<String>,
    author_name: String,
    author_email: String,
    author_date: Option<DateTime<FixedOffset>>,
    message: String,
}

fn parse_show(raw: &str) -> std::result::Result<ShowHeader, String> {
    let fields: Vec<&str> = raw.splitn(6, '\0').collect();
    let &[id, parents, name, email, date, message] = fields.as_slice() else {
        return Err(format!("unexpected `git show` output: {raw:?}"));
    };

    Ok(ShowHeader {
        commit_id: id.trim().to_string(),
        first_parent: parents.split_whitespace().next().map(str::to_string),
        author_name: name.to_string(),
        author_email: email.to_string(),
        author_date: parse_raw_date(date),
        message: message.to_string(),
    })
}

/// `--date=raw` prints `<epoch seconds> <+|-><hh><mm>`.
fn parse_raw_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let (seconds, zone) = raw.trim().split_once(' ')?;
    let seconds: i64 = seconds.parse().ok()?;

    let (sign, digits) = match zone.split_at_checked(1)? {
        ("+", d) => (1, d),
        ("-", d) => (-1, d),
        _ => return None,
    };
    if digits.len() != 4 || !digits.is_ascii() {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;

    commit_log::author_date(seconds, sign * (hours * 60 + minutes))
}

/// Parse `--name-status -z` output: a status token followed by one path, or
/// two (source, destination) for renames and copies.
fn parse_name_status(raw: &str) -> std::result::Result<Vec<RawDelta>, String> {
    let mut tokens = raw.split('\0').filter(|t| !t.is_empty());
    let mut deltas = Vec::new();

    while let Some(status) = tokens.next() {
        let mut path = || {
            tokens
                .next()
                .ok_or_else(|| format!("missing path after status {status:?}"))
        };

        let delta = match status.chars().next() {
            Some('A') => RawDelta::new(RawStatus::Added, None, Some(path()?)),
            Some('D') => RawDelta::new(RawStatus::Deleted, Some(path()?), None),
            Some('M') => {
                let p = path()?;
                RawDelta::new(RawStatus::Modified, Some(p), Some(p))
            }
            Some('T') => {
                let p = path()?;
                RawDelta::new(RawStatus::TypeChanged, Some(p), Some(p))
            }
            Some('R') => {
                let (old, new) = (path()?, path()?);
                RawDelta::new(RawStatus::Renamed, Some(old), Some(new))
            }
            Some('C') => {
                let (old, new) = (path()?, path()?);
                RawDelta::new(RawStatus::Copied, Some(old), Some(new))
            }
            Some('U') => {
                let p = path()?;
                RawDelta::new(RawStatus::Other("unmerged".into()), Some(p), Some(p))
            }
            Some('X') => {
                let p = path()?;
                RawDelta::new(RawStatus::Other("unknown".into()), Some(p), Some(p))
            }
            _ => {
                let p = path()?;
                RawDelta::new(RawStatus::Other(status.to_string()), Some(p), Some(p))
            }
        };
        deltas.push(delta);
    }

    Ok(deltas)
}
