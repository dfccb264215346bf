use std::error::Error;

use chrono::{DateTime, FixedOffset, TimeZone};
use tera::{Context, Tera};

use crate::diff::ChangeRecord;
use crate::error::{GitUtilError, Result};

const COMMIT_LOG_TEMPLATE: &str = "commit {{ commit_id }}
Author: {{ author_name }} <{{ author_email }}>
Date:   {{ author_date }}

        {{ message }}

{{ changes }}";

/// Same shape as git's default log date.
const DATE_FORMAT: &str = "%a %b %e %H:%M:%S %Y %z";

/// Everything needed to render one commit. Optional fields are the ones a
/// backend may fail to read (e.g. a non-UTF-8 author name); rendering
/// refuses to run with any of them missing.
#[derive(Debug, Clone, Default)]
pub struct CommitMetadata {
    pub commit_id: String,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub author_date: Option<DateTime<FixedOffset>>,
    pub message: Option<String>,
    pub changes: ChangeRecord,
}

impl CommitMetadata {
    fn to_tera_context(&self) -> Context {
        let mut ctx = Context::new();

        if !self.commit_id.is_empty() {
            ctx.insert("commit_id", &self.commit_id);
        }
        if let Some(name) = &self.author_name {
            ctx.insert("author_name", name);
        }
        if let Some(email) = &self.author_email {
            ctx.insert("author_email", email);
        }
        if let Some(date) = &self.author_date {
            ctx.insert("author_date", &date.format(DATE_FORMAT).to_string());
        }
        if let Some(message) = &self.message {
            ctx.insert("message", normalize_message(message));
        }
        ctx.insert("changes", &self.changes.to_lines());

        ctx
    }
}

/// Blank lines around the message are dropped; libgit2 already strips the
/// leading ones, `git show --format=%B` does not.
fn normalize_message(message: &str) -> &str {
    message
        .trim_start_matches('\n')
        .trim_end_matches(['\n', '\r'])
}

/// Render `meta` into the fixed commit log template.
pub fn render(meta: &CommitMetadata) -> Result<String> {
    Tera::one_off(COMMIT_LOG_TEMPLATE, &meta.to_tera_context(), false).map_err(|e| {
        GitUtilError::TemplateRender {
            hash: meta.commit_id.clone(),
            message: error_chain(&e),
        }
    })
}

/// Build a timestamp from epoch seconds and a UTC offset in minutes, the
/// form both libgit2 and `git --date=raw` report.
pub fn author_date(seconds: i64, offset_minutes: i32) -> Option<DateTime<FixedOffset>> {
    let offset = FixedOffset::east_opt(offset_minutes.checked_mul(60)?)?;
    offset.timestamp_opt(seconds, 0).single()
}

// Tera keeps the useful part ("Variable `x` not found") in the source chain.
fn error_chain(err: &tera::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        msg.push_str(": ");
        msg.push_str(&inner.to_string());
        source = inner.source();
    }
    msg
}
