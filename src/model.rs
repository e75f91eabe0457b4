//! In-memory representation of Go coverage profiles and of the per-line
//! coverage records that are uploaded to Coveralls. Parsers produce
//! `Profile`s, the merger combines them, and the projector turns them into
//! `SourceFile`s.

use serde::{Serialize, Serializer};

/// A contiguous range of source treated as one coverage unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileBlock {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
    pub num_stmt: u32,
    pub count: u64,
}

impl ProfileBlock {
    /// The `(line, column)` position the block starts at. Blocks within a
    /// profile are ordered by this key.
    #[must_use]
    pub fn start(&self) -> (u32, u32) {
        (self.start_line, self.start_col)
    }

    fn end(&self) -> (u32, u32) {
        (self.end_line, self.end_col)
    }

    /// Whether `other` describes exactly the same source range.
    #[must_use]
    pub fn same_range(&self, other: &ProfileBlock) -> bool {
        self.start() == other.start() && self.end() == other.end()
    }
}

/// All blocks recorded for one source file within a single report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Logical file name as written by `go test`, e.g.
    /// `github.com/user/repo/pkg/file.go`.
    pub file_name: String,
    /// Counter mode: `set`, `count` or `atomic`.
    pub mode: String,
    pub blocks: Vec<ProfileBlock>,
}

impl Profile {
    pub fn new(file_name: String, mode: String) -> Self {
        Self {
            file_name,
            mode,
            blocks: Vec::new(),
        }
    }
}

/// The profiles produced by one test run, in file-name order.
pub type CoverageReport = Vec<Profile>;

/// Coverage state of a single source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCoverage {
    /// No block covers this line.
    #[default]
    NotExecutable,
    /// At least one block covers this line; the sum of their counts.
    Count(u64),
}

impl LineCoverage {
    /// Add `hits` to this line, turning an untouched line into a counted one.
    pub fn add(&mut self, hits: u64) {
        *self = match *self {
            LineCoverage::NotExecutable => LineCoverage::Count(hits),
            LineCoverage::Count(n) => LineCoverage::Count(n.saturating_add(hits)),
        };
    }

    #[must_use]
    pub fn hits(&self) -> Option<u64> {
        match self {
            LineCoverage::NotExecutable => None,
            LineCoverage::Count(n) => Some(*n),
        }
    }
}

// Coveralls expects `null` for lines that are not relevant.
impl Serialize for LineCoverage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            LineCoverage::NotExecutable => serializer.serialize_none(),
            LineCoverage::Count(n) => serializer.serialize_u64(*n),
        }
    }
}

/// One source file ready for upload.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFile {
    /// Display name, relative to the repository where possible.
    pub name: String,
    /// Full file contents.
    pub source: String,
    /// One entry per line of `source`.
    pub coverage: Vec<LineCoverage>,
}

impl SourceFile {
    /// Number of lines with at least one block, and how many of those ran.
    #[must_use]
    pub fn line_totals(&self) -> (u64, u64) {
        self.coverage
            .iter()
            .filter_map(LineCoverage::hits)
            .fold((0, 0), |(total, covered), hits| {
                (total + 1, covered + u64::from(hits > 0))
            })
    }
}

/// Compute a coverage rate, returning 0.0 when the total is zero.
#[must_use]
pub fn rate(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64
    }
}
