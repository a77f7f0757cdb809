//! Media toolchain collaborator: preview stills and duration probing.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Default ffmpeg executable.
pub const DEFAULT_FFMPEG_BINARY: &str = "ffmpeg";

/// Default ffprobe executable.
pub const DEFAULT_FFPROBE_BINARY: &str = "ffprobe";

/// Offset of the preview still taken from each video.
pub const THUMBNAIL_OFFSET: &str = "00:01:00";

/// Errors from the media toolchain.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The tool could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The tool ran but did not produce what was asked for.
    #[error("{program} produced no usable output for {path}")]
    NoOutput {
        /// Program that was run.
        program: String,
        /// The input file.
        path: PathBuf,
    },
}

/// Thumbnail extraction and duration probing for fetched videos.
#[async_trait]
pub trait MediaToolchain: Send + Sync {
    /// Writes a still from `video` to `<video>.jpg` and returns its path.
    async fn extract_thumbnail(&self, video: &Path) -> Result<PathBuf, MediaError>;

    /// Returns the duration of `video` in whole seconds.
    async fn probe_duration(&self, video: &Path) -> Result<u64, MediaError>;
}

/// Returns `<video>.jpg`, the conventional still path for a video.
#[must_use]
pub fn thumbnail_path(video: &Path) -> PathBuf {
    let mut raw: OsString = video.as_os_str().to_os_string();
    raw.push(".jpg");
    PathBuf::from(raw)
}

/// Parses ffprobe's bare `format=duration` output.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn parse_duration(output: &str) -> Option<u64> {
    let seconds: f64 = output.trim().parse().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then(|| seconds as u64)
}

/// Toolchain backed by the ffmpeg and ffprobe executables.
#[derive(Debug, Clone)]
pub struct FfmpegToolchain {
    ffmpeg: String,
    ffprobe: String,
}

impl Default for FfmpegToolchain {
    fn default() -> Self {
        Self::new(DEFAULT_FFMPEG_BINARY, DEFAULT_FFPROBE_BINARY)
    }
}

impl FfmpegToolchain {
    /// Creates a toolchain using the given executables.
    #[must_use]
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }
}

#[async_trait]
impl MediaToolchain for FfmpegToolchain {
    #[instrument(skip(self), fields(video = %video.display()))]
    async fn extract_thumbnail(&self, video: &Path) -> Result<PathBuf, MediaError> {
        let still = thumbnail_path(video);
        let status = Command::new(&self.ffmpeg)
            .arg("-y")
            .arg("-i")
            .arg(video)
            .args(["-ss", THUMBNAIL_OFFSET, "-vframes", "1"])
            .arg(&still)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|source| MediaError::Spawn {
                program: self.ffmpeg.clone(),
                source,
            })?;

        if status.success() && tokio::fs::try_exists(&still).await.unwrap_or(false) {
            debug!(still = %still.display(), "extracted thumbnail");
            Ok(still)
        } else {
            Err(MediaError::NoOutput {
                program: self.ffmpeg.clone(),
                path: video.to_path_buf(),
            })
        }
    }

    #[instrument(skip(self), fields(video = %video.display()))]
    async fn probe_duration(&self, video: &Path) -> Result<u64, MediaError> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(video)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                program: self.ffprobe.clone(),
                source,
            })?;

        parse_duration(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            MediaError::NoOutput {
                program: self.ffprobe.clone(),
                path: video.to_path_buf(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_path_appends_jpg() {
        assert_eq!(
            thumbnail_path(Path::new("/w/001) Intro.mp4")),
            PathBuf::from("/w/001) Intro.mp4.jpg")
        );
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("125.480000\n"), Some(125));
        assert_eq!(parse_duration("0"), Some(0));
        assert_eq!(parse_duration("N/A"), None);
        assert_eq!(parse_duration("-3"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let toolchain = FfmpegToolchain::new("mediabatch-no-ffmpeg", "mediabatch-no-ffprobe");
        let video = Path::new("/nonexistent/v.mp4");
        assert!(matches!(
            toolchain.extract_thumbnail(video).await,
            Err(MediaError::Spawn { .. })
        ));
        assert!(matches!(
            toolchain.probe_duration(video).await,
            Err(MediaError::Spawn { .. })
        ));
    }
}
