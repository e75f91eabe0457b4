#![allow(dead_code)]

use std::path::{Path, PathBuf};

use covup::error::{CovupError, Result};
use covup::resolve::{FileResolver, PackageLocator};
use tempfile::TempDir;

pub const MODULE: &str = "example.com/shop";

/// A locator that never finds anything, so tests only pass through go.mod.
pub struct NoLocator;

impl PackageLocator for NoLocator {
    fn package_dir(&self, import_path: &str) -> Result<PathBuf> {
        Err(CovupError::FileNotFound {
            file: import_path.to_string(),
            reason: "no locator in tests".to_string(),
        })
    }
}

/// Create a temporary Go module with the given files, returning the dir
/// handle and a resolver rooted at it.
/// The caller must hold onto `TempDir` to keep the temp directory alive.
pub fn setup_module(files: &[(&str, &str)]) -> (TempDir, FileResolver<NoLocator>) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("go.mod"),
        format!("module {}\n\ngo 1.21\n", MODULE),
    )
    .unwrap();
    for (rel, contents) in files {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }
    let resolver = FileResolver::new(dir.path().to_path_buf(), NoLocator);
    (dir, resolver)
}

/// Write a coverage profile into `dir` and return its path as a string.
pub fn write_profile(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path.to_str().unwrap().to_string()
}
