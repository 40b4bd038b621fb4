//! Error types for mediamend-analysis.

use std::path::PathBuf;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during file analysis.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input file does not exist or is not a regular file.
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// The input file contains no bytes at all.
    #[error("file is empty: {}", path.display())]
    EmptyFile { path: PathBuf },

    /// An I/O error occurred while reading the input.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create an empty file error.
    pub fn empty_file(path: impl Into<PathBuf>) -> Self {
        Self::EmptyFile { path: path.into() }
    }
}
