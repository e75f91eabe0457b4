/// Parser for Go's `-coverprofile` format.
///
/// Reference: https://go.dev/blog/cover
///
/// Format:
///   mode: set|count|atomic
///   <file>:<startLine>.<startCol>,<endLine>.<endCol> <numStatements> <count>
///
/// Blocks are grouped per file and kept as blocks: merging reports relies on
/// block-for-block alignment, so nothing is expanded to lines here.
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{CovupError, Result};
use crate::model::{CoverageReport, Profile, ProfileBlock};

/// `<file>:<startLine>.<startCol>,<endLine>.<endCol> <numStmt> <count>`
static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+):([0-9]+)\.([0-9]+),([0-9]+)\.([0-9]+) ([0-9]+) ([0-9]+)$").unwrap()
});

/// Read and parse a coverage profile from disk.
pub fn parse_file(path: &Path) -> Result<CoverageReport> {
    let content = std::fs::read(path)?;
    parse(&content)
}

/// Parse a Go coverage profile from raw bytes.
///
/// Profiles come back sorted by file name, and each profile's blocks sorted
/// by start position. Identical blocks (the same range reported twice, as
/// happens when profiles are concatenated) are collapsed into one.
pub fn parse(input: &[u8]) -> Result<CoverageReport> {
    let text = std::str::from_utf8(input)
        .map_err(|e| CovupError::Parse(format!("Invalid UTF-8 in Go coverage data: {}", e)))?;

    let mut mode: Option<&str> = None;
    let mut files: BTreeMap<&str, Vec<ProfileBlock>> = BTreeMap::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("mode: ") {
            if rest.trim().is_empty() {
                return Err(CovupError::Parse(format!("bad mode line: {:?}", line)));
            }
            match mode {
                None => mode = Some(rest),
                Some(m) if m == rest => {}
                Some(m) => {
                    return Err(CovupError::Parse(format!(
                        "line {}: mode '{}' conflicts with earlier mode '{}'",
                        idx + 1,
                        rest,
                        m
                    )))
                }
            }
            continue;
        }

        if mode.is_none() {
            return Err(CovupError::Parse(format!(
                "bad mode line: {:?}",
                line
            )));
        }

        let (file, block) = parse_block_line(line).ok_or_else(|| {
            CovupError::Parse(format!(
                "line {}: {:?} doesn't match expected format",
                idx + 1,
                line
            ))
        })?;
        files.entry(file).or_default().push(block);
    }

    let Some(mode) = mode else {
        // An empty file is what `go test` writes for packages with no tests.
        return Ok(Vec::new());
    };

    files
        .into_iter()
        .map(|(file, blocks)| -> Result<Profile> {
            let mut profile = Profile::new(file.to_string(), mode.to_string());
            profile.blocks = collapse_duplicates(file, mode, blocks)?;
            Ok(profile)
        })
        .collect()
}

/// Parse a single block line, returning (file_path, block).
fn parse_block_line(line: &str) -> Option<(&str, ProfileBlock)> {
    let caps = BLOCK_RE.captures(line)?;
    let num = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();

    let block = ProfileBlock {
        start_line: num(2)?,
        start_col: num(3)?,
        end_line: num(4)?,
        end_col: num(5)?,
        num_stmt: num(6)?,
        count: caps.get(7)?.as_str().parse().ok()?,
    };
    Some((caps.get(1)?.as_str(), block))
}

/// Sort blocks by start position and fold repeated ranges together. Two
/// blocks starting at the same position must cover the same range.
fn collapse_duplicates(
    file: &str,
    mode: &str,
    mut blocks: Vec<ProfileBlock>,
) -> Result<Vec<ProfileBlock>> {
    blocks.sort_by_key(|b| b.start());

    let mut out: Vec<ProfileBlock> = Vec::with_capacity(blocks.len());
    for block in blocks {
        match out.last_mut() {
            Some(last) if last.start() == block.start() => {
                if !last.same_range(&block) {
                    return Err(CovupError::Parse(format!(
                        "inconsistent block in {} at {}.{}: ends at {}.{} and {}.{}",
                        file,
                        block.start_line,
                        block.start_col,
                        last.end_line,
                        last.end_col,
                        block.end_line,
                        block.end_col
                    )));
                }
                if last.num_stmt != block.num_stmt {
                    return Err(CovupError::Parse(format!(
                        "inconsistent NumStmt in {} at {}.{}: {} vs {}",
                        file, block.start_line, block.start_col, last.num_stmt, block.num_stmt
                    )));
                }
                if mode == "set" {
                    last.count = u64::from(last.count != 0 || block.count != 0);
                } else {
                    last.count = last.count.saturating_add(block.count);
                }
            }
            _ => out.push(block),
        }
    }
    Ok(out)
}
