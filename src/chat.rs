//! The chat interaction layer.
//!
//! Batches are configured and reported through a conversational session: the
//! orchestrator asks questions, posts status messages it later edits, and
//! delivers finished artifacts. [`ChatSession`] is that seam; the binary
//! provides a terminal implementation and tests provide scripted ones.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Failures reported by a chat session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// The service asked the caller to back off.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// How long the service asked to wait.
        retry_after: Duration,
    },

    /// The conversation ended before an answer arrived.
    #[error("chat session closed")]
    Closed,

    /// Any other delivery failure.
    #[error("chat request failed: {reason}")]
    Failed {
        /// Human-readable reason.
        reason: String,
    },
}

impl ChatError {
    /// Creates a generic failure.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Returns the requested wait if this is a rate-limit signal.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Identifies an editable status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusHandle(pub u64);

/// A finished artifact to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Local file to upload.
    pub path: PathBuf,
    /// Caption shown alongside the file.
    pub caption: String,
    /// Preview image, if one was produced.
    pub thumbnail: Option<PathBuf>,
    /// Media duration in whole seconds, if known.
    pub duration_secs: Option<u64>,
}

impl UploadRequest {
    /// Creates a request with no thumbnail or duration.
    pub fn new(path: impl Into<PathBuf>, caption: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            caption: caption.into(),
            thumbnail: None,
            duration_secs: None,
        }
    }

    /// Sets the preview image.
    #[must_use]
    pub fn with_thumbnail(mut self, thumbnail: Option<PathBuf>) -> Self {
        self.thumbnail = thumbnail;
        self
    }

    /// Sets the media duration.
    #[must_use]
    pub fn with_duration(mut self, duration_secs: Option<u64>) -> Self {
        self.duration_secs = duration_secs;
        self
    }
}

/// Receives byte counts while an upload is in flight.
#[async_trait]
pub trait UploadProgress: Send + Sync {
    /// Called with the bytes sent so far and the total size.
    async fn on_progress(&self, current: u64, total: u64);
}

/// A conversation with the user who started a batch.
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Asks a question and waits for the answer.
    async fn request_input(&self, prompt: &str) -> Result<String, ChatError>;

    /// Posts a status message that can be edited later.
    async fn send_status(&self, text: &str) -> Result<StatusHandle, ChatError>;

    /// Replaces the text of a status message.
    async fn edit_status(&self, handle: StatusHandle, text: &str) -> Result<(), ChatError>;

    /// Removes a status message.
    async fn delete_status(&self, handle: StatusHandle) -> Result<(), ChatError>;

    /// Posts a plain message.
    async fn send_message(&self, text: &str) -> Result<(), ChatError>;

    /// Delivers a file, reporting byte progress to `progress` if given.
    async fn send_file(
        &self,
        request: &UploadRequest,
        progress: Option<&dyn UploadProgress>,
    ) -> Result<(), ChatError>;
}
