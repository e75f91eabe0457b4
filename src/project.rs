//! Expand block profiles into per-line coverage for each source file.

use std::path::{Path, PathBuf};

use log::warn;

use crate::error::{CovupError, Result};
use crate::model::{LineCoverage, Profile, ProfileBlock, SourceFile};
use crate::resolve::{FileResolver, PackageLocator};

/// Derives the name a file is reported under.
#[derive(Debug, Clone, Default)]
pub struct SourceNamer {
    base_dir: PathBuf,
    prefix: Option<String>,
}

impl SourceNamer {
    /// Paths under `base_dir` are reported relative to it; `prefix`, if
    /// set, is prepended to every name.
    pub fn new(base_dir: PathBuf, prefix: Option<String>) -> Self {
        Self { base_dir, prefix }
    }

    pub fn name(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.base_dir).unwrap_or(path);
        let name = relative.to_string_lossy().replace('\\', "/");
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), name),
            None => name,
        }
    }
}

/// Build one `SourceFile` per profile, in profile order.
pub fn to_source_files<L: PackageLocator>(
    profiles: &[Profile],
    resolver: &FileResolver<L>,
    namer: &SourceNamer,
) -> Result<Vec<SourceFile>> {
    profiles
        .iter()
        .map(|profile| -> Result<SourceFile> {
            let path = resolver.resolve(&profile.file_name)?;
            let source = std::fs::read_to_string(&path).map_err(|source| {
                CovupError::ReadSource {
                    path: path.clone(),
                    source,
                }
            })?;
            let coverage = line_coverage(&profile.file_name, &source, &profile.blocks);
            Ok(SourceFile {
                name: namer.name(&path),
                source,
                coverage,
            })
        })
        .collect()
}

/// Per-line hit counts for `source`. Every line touched by a block gets the
/// block's count added; lines no block touches stay `NotExecutable`.
pub fn line_coverage(file: &str, source: &str, blocks: &[ProfileBlock]) -> Vec<LineCoverage> {
    let line_count = 1 + source.bytes().filter(|&b| b == b'\n').count();
    let mut coverage = vec![LineCoverage::NotExecutable; line_count];

    for block in blocks {
        // Go lines are 1-based; line 0 does not exist.
        for line in block.start_line.max(1)..=block.end_line {
            match coverage.get_mut(line as usize - 1) {
                Some(slot) => slot.add(block.count),
                None => {
                    warn!(
                        "{}: block {}.{},{}.{} reaches line {} but the file has {} lines",
                        file,
                        block.start_line,
                        block.start_col,
                        block.end_line,
                        block.end_col,
                        line,
                        line_count
                    );
                    break;
                }
            }
        }
    }

    coverage
}
