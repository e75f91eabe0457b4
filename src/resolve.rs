//! Locate the source file a coverage profile refers to.
//!
//! Go profiles name files by import path (`example.com/mod/pkg/file.go`).
//! The fast path finds the enclosing `go.mod`, strips the module name and
//! joins the rest onto the module root. When that fails the package
//! directory is looked up through a [`PackageLocator`], by default the `go`
//! tool itself.

use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;

use crate::error::{CovupError, Result};

/// Finds the directory holding a Go package, given its import path.
pub trait PackageLocator {
    fn package_dir(&self, import_path: &str) -> Result<PathBuf>;
}

/// Asks `go list` where a package lives.
pub struct GoListLocator;

impl PackageLocator for GoListLocator {
    fn package_dir(&self, import_path: &str) -> Result<PathBuf> {
        let output = Command::new("go")
            .args(["list", "-f", "{{.Dir}}", import_path])
            .output()
            .map_err(|e| CovupError::FileNotFound {
                file: import_path.to_string(),
                reason: format!("failed to run go list: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CovupError::FileNotFound {
                file: import_path.to_string(),
                reason: stderr.trim().to_string(),
            });
        }

        let dir = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if dir.is_empty() {
            return Err(CovupError::FileNotFound {
                file: import_path.to_string(),
                reason: "go list returned no directory".to_string(),
            });
        }
        Ok(PathBuf::from(dir))
    }
}

/// Maps profile file names to paths on disk.
pub struct FileResolver<L = GoListLocator> {
    work_dir: PathBuf,
    locator: L,
}

impl FileResolver<GoListLocator> {
    /// Resolve relative to the current directory, falling back to `go list`.
    pub fn from_current_dir() -> Result<Self> {
        let work_dir = std::env::current_dir()?;
        Ok(Self::new(work_dir, GoListLocator))
    }
}

impl<L: PackageLocator> FileResolver<L> {
    pub fn new(work_dir: PathBuf, locator: L) -> Self {
        Self { work_dir, locator }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Return the on-disk path for a profile's file name.
    pub fn resolve(&self, file: &str) -> Result<PathBuf> {
        if let Some(path) = self.find_in_module(file) {
            return Ok(path);
        }
        debug!("Couldn't find fast path for file {}", file);

        let (dir, base) = match file.rsplit_once('/') {
            Some((dir, base)) => (dir, base),
            None => (".", file),
        };
        let pkg_dir = self
            .locator
            .package_dir(dir)
            .map_err(|e| match e {
                CovupError::FileNotFound { reason, .. } => CovupError::FileNotFound {
                    file: file.to_string(),
                    reason,
                },
                other => other,
            })?;
        Ok(pkg_dir.join(base))
    }

    /// Fast path: strip the enclosing module's name from `file` and look for
    /// the remainder under the module root.
    fn find_in_module(&self, file: &str) -> Option<PathBuf> {
        let Some((root, go_mod)) = find_go_mod(&self.work_dir) else {
            debug!("No go.mod above {}", self.work_dir.display());
            return None;
        };

        let contents = match std::fs::read_to_string(&go_mod) {
            Ok(c) => c,
            Err(e) => {
                debug!("Couldn't read {}: {}", go_mod.display(), e);
                return None;
            }
        };
        let Some(module) = module_name(&contents) else {
            debug!("No module name in {}", go_mod.display());
            return None;
        };

        let relative = file
            .strip_prefix(module)
            .unwrap_or(file)
            .trim_start_matches('/');
        let joined = root.join(relative);
        if joined.is_file() {
            Some(joined)
        } else {
            None
        }
    }
}

/// Walk upward from `start` to the first directory containing a `go.mod`
/// file. Returns the directory and the file path.
fn find_go_mod(start: &Path) -> Option<(PathBuf, PathBuf)> {
    start.ancestors().find_map(|dir| {
        let candidate = dir.join("go.mod");
        candidate
            .is_file()
            .then(|| (dir.to_path_buf(), candidate))
    })
}

/// Module path from the first `module` directive of a go.mod file.
fn module_name(go_mod: &str) -> Option<&str> {
    go_mod
        .lines()
        .find(|l| l.starts_with("module"))
        .and_then(|l| l.split_whitespace().nth(1))
        .map(|m| m.trim_matches('"'))
        .filter(|m| !m.is_empty())
}
