//! Error taxonomy for batch runs.
//!
//! Configuration errors abort a batch before it runs. Everything that can go
//! wrong with a single item ends up as an [`ItemError`], which the orchestrator
//! converts into a user-visible message and an error tally entry. Cleanup
//! failures are never surfaced; see [`crate::lifecycle`].

use std::path::PathBuf;

use thiserror::Error;

use crate::audio::AudioError;
use crate::chat::ChatError;
use crate::document::DocumentError;
use crate::fetch::PlatformTag;
use crate::parser::ParseError;

/// Invalid or missing batch parameters collected during configuration.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The actor already has a running batch.
    #[error("actor {actor} already has a batch in progress")]
    AlreadyRunning {
        /// The actor that was rejected.
        actor: u64,
    },

    /// The URL list file could not be read or parsed.
    #[error("invalid input file: {0}")]
    Input(#[from] ParseError),

    /// The URL list contained no usable lines.
    #[error("no valid links found in {path}")]
    EmptyInput {
        /// The file that was read.
        path: PathBuf,
    },

    /// The media kind answer was not one of the supported kinds.
    #[error("unsupported media kind '{value}': expected video, audio, or pdf")]
    InvalidKind {
        /// The rejected answer.
        value: String,
    },

    /// The job was requested before every field was answered.
    #[error("configuration is incomplete: {field} has not been answered")]
    Incomplete {
        /// The next unanswered field.
        field: &'static str,
    },

    /// An answer was requested after the configuration was already complete.
    #[error("configuration is already complete")]
    AlreadyComplete,

    /// The chat layer failed while collecting an answer.
    #[error("failed to collect {field}: {source}")]
    Prompt {
        /// The field being collected.
        field: &'static str,
        /// The underlying chat failure.
        #[source]
        source: ChatError,
    },
}

impl ConfigurationError {
    /// Creates an invalid kind error.
    pub fn invalid_kind(value: impl Into<String>) -> Self {
        Self::InvalidKind {
            value: value.into(),
        }
    }

    /// Creates a prompt error for the given field.
    pub fn prompt(field: &'static str, source: ChatError) -> Self {
        Self::Prompt { field, source }
    }
}

/// Failures of the retry-governed fetch executor.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The fetch engine kept failing until the platform's retry budget ran out.
    #[error("fetch of {url} failed after {retries} retries (exit status {status}, platform {tag})")]
    RetriesExhausted {
        /// The URL that was fetched.
        url: String,
        /// Platform tag whose budget was used.
        tag: PlatformTag,
        /// Number of retries performed before giving up.
        retries: u32,
        /// Exit status of the final attempt.
        status: i32,
    },

    /// The fetch engine exited non-zero for a platform without a retry budget.
    #[error("fetch of {url} failed with exit status {status}")]
    Failed {
        /// The URL that was fetched.
        url: String,
        /// Exit status reported by the engine.
        status: i32,
    },

    /// The fetch engine could not be started at all.
    #[error("failed to launch fetch engine '{program}': {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The engine reported success but the expected output never appeared.
    #[error("file not found after download: {path}")]
    MissingOutput {
        /// The best-effort path the executor returned.
        path: PathBuf,
    },

    /// Stream page extraction failed before the fetch could start.
    #[error("failed to extract stream URL from {url}: {reason}")]
    Extraction {
        /// The page URL.
        url: String,
        /// Human-readable reason.
        reason: String,
    },
}

impl FetchError {
    /// Creates a stream extraction error.
    pub fn extraction(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Extraction {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Delivery of a finished artifact failed.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The upload was rate-limited twice in a row.
    #[error("upload of {path} still rate-limited after one retry")]
    StillRateLimited {
        /// The artifact being uploaded.
        path: PathBuf,
    },

    /// The chat layer rejected the upload.
    #[error("upload of {path} failed: {source}")]
    Rejected {
        /// The artifact being uploaded.
        path: PathBuf,
        /// The underlying chat failure.
        #[source]
        source: ChatError,
    },
}

/// Everything that can fail while processing one item.
#[derive(Debug, Error)]
pub enum ItemError {
    /// Fetching the media failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Delivering the artifact failed.
    #[error(transparent)]
    Upload(#[from] UploadError),

    /// Downloading a document failed.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// The audio pipeline failed.
    #[error(transparent)]
    Audio(#[from] AudioError),

    /// A local file operation failed.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ItemError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_exhausted_display_names_platform_and_status() {
        let error = FetchError::RetriesExhausted {
            url: "https://d1.cloudfront.net/v/master.m3u8".to_string(),
            tag: PlatformTag::CloudFront,
            retries: 15,
            status: 1,
        };
        let msg = error.to_string();
        assert!(msg.contains("15 retries"));
        assert!(msg.contains("cloudfront"));
        assert!(msg.contains("exit status 1"));
    }

    #[test]
    fn test_item_error_is_transparent_for_fetch_errors() {
        let error: ItemError = FetchError::Failed {
            url: "https://example.com/a".to_string(),
            status: 2,
        }
        .into();
        assert_eq!(
            error.to_string(),
            "fetch of https://example.com/a failed with exit status 2"
        );
    }

    #[test]
    fn test_document_status_display() {
        let error: ItemError = DocumentError::Status { status: 404 }.into();
        assert_eq!(error.to_string(), "failed to download document: HTTP 404");
    }
}
