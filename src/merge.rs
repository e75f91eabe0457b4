//! Combine coverage reports from several test runs into one.
//!
//! Reports are matched positionally: the profile at index `i` of the first
//! non-empty report is merged with the profile at index `i` of every other
//! report, provided both name the same file. This holds because every run
//! profiles the same code base and the parser emits files and blocks in a
//! stable sorted order.

use crate::error::{CovupError, Result};
use crate::model::{CoverageReport, ProfileBlock};

/// Merge reports, summing block counts for matching profiles.
///
/// Leading empty reports (packages without test files) are skipped. A single
/// remaining report is returned as-is.
pub fn merge_profiles(reports: Vec<CoverageReport>) -> Result<CoverageReport> {
    let mut reports = reports.into_iter().skip_while(|r| r.is_empty());

    let Some(mut head) = reports.next() else {
        return Ok(Vec::new());
    };
    let rest: Vec<CoverageReport> = reports.collect();

    for (i, profile) in head.iter_mut().enumerate() {
        for other in &rest {
            let Some(candidate) = other.get(i) else {
                continue;
            };
            if candidate.file_name != profile.file_name {
                continue;
            }
            merge_blocks(&profile.file_name, &mut profile.blocks, &candidate.blocks)?;
        }
    }

    Ok(head)
}

/// Add the counts of `other` into `blocks`, block for block.
///
/// Both lists must have the same length and agree on every block's start
/// position; anything else means the reports came from different code.
pub fn merge_blocks(
    file: &str,
    blocks: &mut [ProfileBlock],
    other: &[ProfileBlock],
) -> Result<()> {
    if blocks.len() != other.len() {
        return Err(CovupError::BlockCountMismatch {
            file: file.to_string(),
            left: blocks.len(),
            right: other.len(),
        });
    }

    // Validate everything before touching counts so a failed merge leaves
    // `blocks` as it was.
    if let Some((index, (a, b))) = blocks
        .iter()
        .zip(other)
        .enumerate()
        .find(|(_, (a, b))| a.start() != b.start())
    {
        return Err(CovupError::BlockOrderMismatch {
            file: file.to_string(),
            index,
            left_line: a.start_line,
            left_col: a.start_col,
            right_line: b.start_line,
            right_col: b.start_col,
        });
    }

    for (a, b) in blocks.iter_mut().zip(other) {
        a.count = a.count.saturating_add(b.count);
    }
    Ok(())
}
