use std::path::Path;

use log::{debug, info};

use crate::error::{CovupError, Result};
use crate::merge::merge_profiles;
use crate::model::{CoverageReport, SourceFile};
use crate::parsers::gocover;
use crate::project::{to_source_files, SourceNamer};
use crate::resolve::{FileResolver, PackageLocator};

/// Parse every profile in a comma-separated list, in order.
///
/// Blank entries (e.g. from a trailing comma) are ignored. A profile that
/// fails to parse is reported with its path.
pub fn read_reports(list: &str) -> Result<Vec<CoverageReport>> {
    list.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| -> Result<CoverageReport> {
            let report = gocover::parse_file(Path::new(p)).map_err(|e| {
                CovupError::Parse(format!("Error parsing coverage {}: {}", p, e))
            })?;
            debug!("{}: {} files", p, report.len());
            Ok(report)
        })
        .collect()
}

/// Parse, merge and project a comma-separated list of profiles.
pub fn load_source_files<L: PackageLocator>(
    list: &str,
    resolver: &FileResolver<L>,
    namer: &SourceNamer,
) -> Result<Vec<SourceFile>> {
    let reports = read_reports(list)?;
    info!("Parsed {} profiles", reports.len());

    let merged = merge_profiles(reports)?;
    info!("Merged profiles covering {} files", merged.len());

    let files = to_source_files(&merged, resolver, namer)?;
    info!("Converted merged profiles to {} source files", files.len());
    Ok(files)
}
