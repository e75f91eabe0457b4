use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CovupError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("{file}: block lists differ in length ({left} vs {right})")]
    BlockCountMismatch {
        file: String,
        left: usize,
        right: usize,
    },

    #[error(
        "{file}: block {index} starts at {left_line}.{left_col} in one profile and {right_line}.{right_col} in another"
    )]
    BlockOrderMismatch {
        file: String,
        index: usize,
        left_line: u32,
        left_col: u32,
        right_line: u32,
        right_col: u32,
    },

    #[error("Can't find {file}: {reason}")]
    FileNotFound { file: String, reason: String },

    #[error("Error reading {}: {source}", .path.display())]
    ReadSource {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Coveralls API error (HTTP {status}): {body}")]
    Http { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CovupError>;
