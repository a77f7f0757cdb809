//! Error types for URL list parsing.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading a URL list.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The URL list file could not be read.
    #[error("failed to read URL list {path}: {source}\n  Suggestion: {suggestion}")]
    Read {
        /// The file that failed to read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
        /// How to fix the issue.
        suggestion: &'static str,
    },
}

impl ParseError {
    /// Creates a read error, choosing a suggestion from the IO error kind.
    #[must_use]
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let suggestion = match source.kind() {
            std::io::ErrorKind::NotFound => "Check the path of the URL list file",
            std::io::ErrorKind::InvalidData => "The URL list must be UTF-8 text, one URL per line",
            std::io::ErrorKind::PermissionDenied => "Check read permissions on the URL list file",
            _ => "Make sure the URL list file is readable",
        };
        Self::Read {
            path: path.into(),
            source,
            suggestion,
        }
    }
}
