//! Audio extraction pipeline collaborator.
//!
//! Audio items are handed off whole: the pipeline extracts the audio track,
//! writes its tags, and delivers the result through the chat session. The
//! orchestrator only observes success or failure.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::chat::{ChatError, ChatSession, UploadRequest};
use crate::fetch::DEFAULT_FETCH_BINARY;
use crate::lifecycle::remove_quietly;

/// Title used when the source reports none.
pub const FALLBACK_AUDIO_TITLE: &str = "Extracted Audio";

/// Errors from the audio pipeline.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The extractor could not be started.
    #[error("failed to launch audio extractor '{program}': {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The extractor exited non-zero.
    #[error("failed to extract audio from {url} (exit status {status})")]
    Extraction {
        /// The source URL.
        url: String,
        /// Exit status reported by the extractor.
        status: i32,
    },

    /// The extractor succeeded but produced no file.
    #[error("audio file not found after extraction: {path}")]
    MissingOutput {
        /// The expected file.
        path: PathBuf,
    },

    /// Delivering the audio file failed.
    #[error("failed to deliver audio {path}: {source}")]
    Upload {
        /// The audio file.
        path: PathBuf,
        /// The underlying chat failure.
        #[source]
        source: ChatError,
    },
}

/// One audio item handed to the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct AudioJob<'a> {
    /// Source URL.
    pub url: &'a str,
    /// File stem for the extracted audio.
    pub name: &'a str,
    /// Netscape cookie file for the source, if any.
    pub cookie_file: Option<&'a Path>,
}

/// Extracts, tags, and delivers the audio of one item.
#[async_trait]
pub trait AudioPipeline: Send + Sync {
    /// Processes one item end to end.
    async fn process(&self, job: AudioJob<'_>, chat: &dyn ChatSession) -> Result<(), AudioError>;
}

/// Audio pipeline backed by a yt-dlp compatible executable.
///
/// Tags and cover art are embedded by the extractor itself.
#[derive(Debug, Clone)]
pub struct YtDlpAudioPipeline {
    program: String,
    work_dir: PathBuf,
}

impl YtDlpAudioPipeline {
    /// Creates a pipeline writing into `work_dir`.
    pub fn new(program: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            work_dir: work_dir.into(),
        }
    }

    /// Creates a pipeline using the default extractor.
    pub fn with_work_dir(work_dir: impl Into<PathBuf>) -> Self {
        Self::new(DEFAULT_FETCH_BINARY, work_dir)
    }

    /// Builds the extractor arguments for a job.
    #[must_use]
    pub fn args(job: &AudioJob<'_>) -> Vec<String> {
        let mut args: Vec<String> = [
            "-f",
            "bestaudio/best",
            "-x",
            "--audio-format",
            "mp3",
            "--audio-quality",
            "192K",
            "--no-playlist",
            "--embed-metadata",
            "--embed-thumbnail",
            "--no-simulate",
            "--print",
            "after_move:title",
            "-o",
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        args.push(format!("{}.%(ext)s", job.name));
        if let Some(cookie_file) = job.cookie_file {
            args.push("--cookies".to_string());
            args.push(cookie_file.to_string_lossy().into_owned());
        }
        args.push(job.url.to_string());
        args
    }

    async fn deliver(
        &self,
        path: &Path,
        title: &str,
        chat: &dyn ChatSession,
    ) -> Result<(), AudioError> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(AudioError::MissingOutput {
                path: path.to_path_buf(),
            });
        }
        let request = UploadRequest::new(path, format!("{title}\n\nExtracted audio"));
        chat.send_file(&request, None)
            .await
            .map_err(|source| AudioError::Upload {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Picks the title from the extractor's printed output.
fn title_from_output(stdout: &str) -> String {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != "NA")
        .next_back()
        .map_or_else(|| FALLBACK_AUDIO_TITLE.to_string(), ToString::to_string)
}

#[async_trait]
impl AudioPipeline for YtDlpAudioPipeline {
    #[instrument(skip(self, job, chat), fields(url = job.url, name = job.name))]
    async fn process(&self, job: AudioJob<'_>, chat: &dyn ChatSession) -> Result<(), AudioError> {
        let status_handle = chat.send_status("Starting audio extraction...").await.ok();

        let output = Command::new(&self.program)
            .args(Self::args(&job))
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .await;

        let path = self.work_dir.join(format!("{}.mp3", job.name));
        let result = match output {
            Err(source) => Err(AudioError::Spawn {
                program: self.program.clone(),
                source,
            }),
            Ok(output) if !output.status.success() => Err(AudioError::Extraction {
                url: job.url.to_string(),
                status: output.status.code().unwrap_or(-1),
            }),
            Ok(output) => {
                let title = title_from_output(&String::from_utf8_lossy(&output.stdout));
                debug!(%title, "audio extracted");
                self.deliver(&path, &title, chat).await
            }
        };

        if let Some(handle) = status_handle {
            if let Err(error) = chat.delete_status(handle).await {
                debug!(%error, "failed to delete audio status");
            }
        }
        remove_quietly(&path).await;

        match &result {
            Ok(()) => info!("audio delivered"),
            Err(error) => warn!(%error, "audio pipeline failed"),
        }
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_args_include_cookie_file_and_output_template() {
        let cookie = PathBuf::from("/tmp/c.txt");
        let job = AudioJob {
            url: "https://youtu.be/abc",
            name: "001) abc",
            cookie_file: Some(&cookie),
        };
        let args = YtDlpAudioPipeline::args(&job);

        let o = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(args[o + 1], "001) abc.%(ext)s");
        let c = args.iter().position(|a| a == "--cookies").unwrap();
        assert_eq!(args[c + 1], "/tmp/c.txt");
        assert_eq!(args.last().unwrap(), "https://youtu.be/abc");
        assert!(args.iter().any(|a| a == "--embed-metadata"));
    }

    #[test]
    fn test_args_without_cookies() {
        let job = AudioJob {
            url: "https://soundcloud.com/x",
            name: "002) x",
            cookie_file: None,
        };
        assert!(!YtDlpAudioPipeline::args(&job).iter().any(|a| a == "--cookies"));
    }

    #[test]
    fn test_title_from_output() {
        assert_eq!(title_from_output("My Song\n"), "My Song");
        assert_eq!(title_from_output("\n  \n"), FALLBACK_AUDIO_TITLE);
        assert_eq!(title_from_output("NA\n"), FALLBACK_AUDIO_TITLE);
    }
}
