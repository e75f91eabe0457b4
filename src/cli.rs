//! Command handler functions for the covup CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::fmt::Write;

use anyhow::{bail, Result};

use crate::coveralls::{Client, Job};
use crate::model::{rate, SourceFile};

/// One-line totals for a set of source files.
#[must_use]
pub fn summarize(files: &[SourceFile]) -> String {
    let (total, covered) = files.iter().map(SourceFile::line_totals).fold(
        (0, 0),
        |(total, covered), (t, c)| (total + t, covered + c),
    );
    format!(
        "{} files, {}/{} lines covered ({:.1}%)",
        files.len(),
        covered,
        total,
        rate(covered, total) * 100.0
    )
}

/// Print the job instead of sending it.
pub fn cmd_dry_run(job: &Job) -> Result<String> {
    let mut out = serde_json::to_string_pretty(job)?;
    out.push('\n');
    Ok(out)
}

pub fn cmd_upload(client: &Client, job: &Job) -> Result<String> {
    let resp = client.upload(job)?;

    let mut out = String::new();
    writeln!(out, "Uploaded {}", summarize(&job.source_files))?;
    if !resp.message.is_empty() {
        writeln!(out, "{}", resp.message)?;
    }
    if !resp.url.is_empty() {
        writeln!(out, "{}", resp.url)?;
    }
    Ok(out)
}

pub fn cmd_parallel_finish(
    client: &Client,
    repo_token: Option<&str>,
    build_num: Option<&str>,
) -> Result<String> {
    let Some(token) = repo_token.filter(|t| !t.is_empty()) else {
        bail!("--parallel-finish requires a repo token");
    };
    client.finish_parallel(token, build_num)?;
    Ok(format!(
        "Marked build {} as done\n",
        build_num.unwrap_or("(unknown)")
    ))
}
