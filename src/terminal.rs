//! Terminal implementation of the chat layer.
//!
//! Questions are asked on stderr and answered on stdin, status messages are
//! spinners, and "delivering" a file copies it into the output directory.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use indicatif::{ProgressBar, ProgressStyle};
use mediabatch_core::{ChatError, ChatSession, StatusHandle, UploadProgress, UploadRequest};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

/// Chunk size used when copying delivered files.
const COPY_CHUNK_BYTES: usize = 256 * 1024;

pub(crate) fn no_color_env_requested() -> bool {
    std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty())
}

pub(crate) fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

pub(crate) fn should_disable_color(
    no_color_flag: bool,
    no_color_env: bool,
    dumb_terminal: bool,
) -> bool {
    no_color_flag || no_color_env || dumb_terminal
}

pub(crate) fn should_use_spinner(
    stderr_is_terminal: bool,
    quiet: bool,
    dumb_terminal: bool,
) -> bool {
    stderr_is_terminal && !quiet && !dumb_terminal
}

pub(crate) fn init_tracing(default_level: &str, no_color: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_env_filter(filter)
        .try_init();
}

/// Chat session bound to the controlling terminal.
pub(crate) struct TerminalChat {
    output_dir: PathBuf,
    use_spinner: bool,
    quiet: bool,
    next_handle: AtomicU64,
    statuses: DashMap<u64, ProgressBar>,
}

impl TerminalChat {
    pub(crate) fn new(output_dir: impl Into<PathBuf>, quiet: bool) -> Self {
        let use_spinner = should_use_spinner(io::stderr().is_terminal(), quiet, is_dumb_terminal());
        Self {
            output_dir: output_dir.into(),
            use_spinner,
            quiet,
            next_handle: AtomicU64::new(1),
            statuses: DashMap::new(),
        }
    }

    fn spinner(&self, text: &str) -> ProgressBar {
        if !self.use_spinner {
            return ProgressBar::hidden();
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message(text.replace('\n', " "));
        spinner
    }

    fn destination(&self, source: &Path) -> Result<PathBuf, ChatError> {
        let name = source
            .file_name()
            .ok_or_else(|| ChatError::failed(format!("{} has no file name", source.display())))?;
        Ok(self.output_dir.join(name))
    }
}

#[async_trait]
impl ChatSession for TerminalChat {
    async fn request_input(&self, prompt: &str) -> Result<String, ChatError> {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || {
            let mut stderr = io::stderr();
            let _ = writeln!(stderr, "{prompt}");
            let _ = write!(stderr, "> ");
            let _ = stderr.flush();

            let mut line = String::new();
            match io::stdin().lock().read_line(&mut line) {
                Ok(0) => Err(ChatError::Closed),
                Ok(_) => Ok(line.trim_end_matches(['\r', '\n']).to_string()),
                Err(e) => Err(ChatError::failed(e.to_string())),
            }
        })
        .await
        .map_err(|e| ChatError::failed(e.to_string()))?
    }

    async fn send_status(&self, text: &str) -> Result<StatusHandle, ChatError> {
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.statuses.insert(id, self.spinner(text));
        debug!(status = id, text, "status posted");
        Ok(StatusHandle(id))
    }

    async fn edit_status(&self, handle: StatusHandle, text: &str) -> Result<(), ChatError> {
        let status = self
            .statuses
            .get(&handle.0)
            .ok_or_else(|| ChatError::failed(format!("unknown status {}", handle.0)))?;
        status.set_message(text.replace('\n', " "));
        Ok(())
    }

    async fn delete_status(&self, handle: StatusHandle) -> Result<(), ChatError> {
        if let Some((_, status)) = self.statuses.remove(&handle.0) {
            status.finish_and_clear();
        }
        Ok(())
    }

    async fn send_message(&self, text: &str) -> Result<(), ChatError> {
        if !self.quiet {
            eprintln!("{text}");
        }
        Ok(())
    }

    async fn send_file(
        &self,
        request: &UploadRequest,
        progress: Option<&dyn UploadProgress>,
    ) -> Result<(), ChatError> {
        let dest = self.destination(&request.path)?;
        let io_failure = |e: io::Error| ChatError::failed(format!("{}: {e}", dest.display()));

        let same_file = match (
            tokio::fs::canonicalize(&request.path).await,
            tokio::fs::canonicalize(&dest).await,
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if same_file {
            return Err(ChatError::failed(format!(
                "{} is already in the output directory",
                dest.display()
            )));
        }

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(io_failure)?;
        let mut source = tokio::fs::File::open(&request.path)
            .await
            .map_err(io_failure)?;
        let total = source.metadata().await.map_err(io_failure)?.len();
        let mut target = tokio::fs::File::create(&dest).await.map_err(io_failure)?;

        let mut buffer = vec![0u8; COPY_CHUNK_BYTES];
        let mut copied: u64 = 0;
        loop {
            let read = source.read(&mut buffer).await.map_err(io_failure)?;
            if read == 0 {
                break;
            }
            target
                .write_all(&buffer[..read])
                .await
                .map_err(io_failure)?;
            copied += read as u64;
            if let Some(observer) = progress {
                observer.on_progress(copied, total).await;
            }
        }
        target.flush().await.map_err(io_failure)?;

        info!(dest = %dest.display(), bytes = copied, "delivered");
        if !self.quiet {
            eprintln!("Delivered {}\n{}", dest.display(), request.caption);
        }
        Ok(())
    }
}
