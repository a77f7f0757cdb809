//! The external fetch engine seam.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::FetchCommand;
use crate::error::FetchError;

/// Program name of the default engine.
pub const DEFAULT_FETCH_BINARY: &str = "yt-dlp";

/// Runs one fetch attempt and reports the engine's exit status.
///
/// Implementations must not retry; the executor owns retry policy.
#[async_trait]
pub trait FetchEngine: Send + Sync {
    /// Program name used in command lines and platform classification.
    fn program(&self) -> &str;

    /// Runs the command with `work_dir` as the working directory.
    ///
    /// Returns the exit status; a process killed by a signal reports `-1`.
    async fn run(&self, command: &FetchCommand, work_dir: &Path) -> Result<i32, FetchError>;
}

/// Fetch engine backed by a yt-dlp compatible executable.
#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    program: String,
}

impl Default for YtDlpEngine {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_BINARY)
    }
}

impl YtDlpEngine {
    /// Creates an engine invoking the given program.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl FetchEngine for YtDlpEngine {
    fn program(&self) -> &str {
        &self.program
    }

    #[instrument(skip(self, command), fields(url = %command.url))]
    async fn run(&self, command: &FetchCommand, work_dir: &Path) -> Result<i32, FetchError> {
        debug!(command = %command.display_line(&self.program), "spawning fetch engine");

        let status = Command::new(&self.program)
            .args(command.args())
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| FetchError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        Ok(status.code().unwrap_or(-1))
    }
}
