//! The retry-governed fetch executor.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::output::locate_output;
use super::retry::{PlatformTag, RetryContext, RetryDecision, RetryTable};
use super::{FetchCommand, FetchEngine};
use crate::error::FetchError;

/// Result of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    /// Where the artifact is, or the best-effort path if it was not found.
    pub path: PathBuf,
    /// Whether `path` exists on disk.
    pub located: bool,
    /// Retries spent before the successful attempt.
    pub retries: u32,
}

/// Runs fetch commands under the platform retry table.
pub struct FetchExecutor {
    engine: Arc<dyn FetchEngine>,
    table: RetryTable,
    work_dir: PathBuf,
}

impl std::fmt::Debug for FetchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchExecutor")
            .field("program", &self.engine.program())
            .field("table", &self.table)
            .field("work_dir", &self.work_dir)
            .finish()
    }
}

impl FetchExecutor {
    /// Creates an executor.
    pub fn new(engine: Arc<dyn FetchEngine>, table: RetryTable, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            table,
            work_dir: work_dir.into(),
        }
    }

    /// Directory the engine runs in and writes to.
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// The retry table in use.
    #[must_use]
    pub fn table(&self) -> &RetryTable {
        &self.table
    }

    /// Fetches one artifact, retrying tagged platforms with a fixed backoff.
    ///
    /// Commands that match no platform tag are attempted exactly once. The
    /// tag's counter in `retries` is cleared on every terminal outcome.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Spawn`] if the engine cannot be launched
    /// - [`FetchError::Failed`] for a non-zero exit without a retry budget
    /// - [`FetchError::RetriesExhausted`] once the platform budget is spent
    #[instrument(skip(self, command, retries), fields(url = %command.url, batch_id = retries.batch_id()))]
    pub async fn fetch(
        &self,
        command: &FetchCommand,
        retries: &mut RetryContext,
    ) -> Result<FetchOutput, FetchError> {
        let command_line = command.display_line(self.engine.program());
        let classification = self.table.classify(command, &command_line);
        let tag = classification.map(|(tag, _)| tag);

        loop {
            let status = match self.engine.run(command, &self.work_dir).await {
                Ok(status) => status,
                Err(error) => {
                    clear(retries, tag);
                    return Err(error);
                }
            };

            if status == 0 {
                let spent = tag.map_or(0, |t| retries.failures(t));
                clear(retries, tag);
                return Ok(self.finish(command, spent).await);
            }

            let Some((tag, rule)) = classification else {
                warn!(status, "fetch failed with no retry budget");
                return Err(FetchError::Failed {
                    url: command.url.clone(),
                    status,
                });
            };

            match retries.should_retry(tag, rule) {
                RetryDecision::Retry { delay, attempt } => {
                    warn!(
                        status,
                        platform = %tag,
                        attempt,
                        max_retries = rule.max_retries,
                        delay_ms = delay.as_millis(),
                        "fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    let spent = retries.failures(tag);
                    retries.reset(tag);
                    warn!(status, platform = %tag, %reason, "giving up on fetch");
                    return Err(FetchError::RetriesExhausted {
                        url: command.url.clone(),
                        tag,
                        retries: spent,
                        status,
                    });
                }
            }
        }
    }

    async fn finish(&self, command: &FetchCommand, retries: u32) -> FetchOutput {
        let (path, located) = locate_output(&self.work_dir, &command.output).await;
        if located {
            info!(path = %path.display(), retries, "fetch complete");
        } else {
            warn!(
                requested = %command.output.display(),
                "engine exited cleanly but no output file was found"
            );
        }
        FetchOutput {
            path,
            located,
            retries,
        }
    }
}

fn clear(retries: &mut RetryContext, tag: Option<PlatformTag>) {
    if let Some(tag) = tag {
        retries.reset(tag);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::fetch::RetryRule;

    /// Engine that replays scripted exit statuses and optionally writes output.
    struct ScriptedEngine {
        statuses: Mutex<VecDeque<i32>>,
        calls: Mutex<u32>,
        write_output: bool,
    }

    impl ScriptedEngine {
        fn new(statuses: &[i32], write_output: bool) -> Self {
            Self {
                statuses: Mutex::new(statuses.iter().copied().collect()),
                calls: Mutex::new(0),
                write_output,
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl FetchEngine for ScriptedEngine {
        fn program(&self) -> &str {
            "yt-dlp"
        }

        async fn run(&self, command: &FetchCommand, work_dir: &Path) -> Result<i32, FetchError> {
            *self.calls.lock().unwrap() += 1;
            let status = self.statuses.lock().unwrap().pop_front().unwrap_or(0);
            if status == 0 && self.write_output {
                std::fs::write(work_dir.join(&command.output), b"media").unwrap();
            }
            Ok(status)
        }
    }

    fn cloudfront_table(max_retries: u32) -> RetryTable {
        RetryTable::empty().with_rule(
            PlatformTag::CloudFront,
            RetryRule::new(max_retries, Duration::from_secs(5)),
        )
    }

    const CLOUDFRONT_URL: &str = "https://d1.cloudfront.net/abc/master.m3u8";

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds_and_resets_counter() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(ScriptedEngine::new(&[1, 1, 1, 0], true));
        let executor = FetchExecutor::new(engine.clone(), cloudfront_table(10), dir.path());
        let mut ctx = RetryContext::new(1);

        let started = tokio::time::Instant::now();
        let output = executor
            .fetch(&FetchCommand::new(CLOUDFRONT_URL, "001) v.mp4"), &mut ctx)
            .await
            .unwrap();

        assert_eq!(started.elapsed(), Duration::from_secs(15));
        assert_eq!(output.retries, 3);
        assert!(output.located);
        assert_eq!(output.path, dir.path().join("001) v.mp4"));
        assert_eq!(engine.calls(), 4);
        assert_eq!(ctx.failures(PlatformTag::CloudFront), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_exactly_threshold_retries() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(ScriptedEngine::new(&[1; 10], false));
        let executor = FetchExecutor::new(engine.clone(), cloudfront_table(3), dir.path());
        let mut ctx = RetryContext::new(1);

        let result = executor
            .fetch(&FetchCommand::new(CLOUDFRONT_URL, "v.mp4"), &mut ctx)
            .await;

        match result {
            Err(FetchError::RetriesExhausted {
                tag,
                retries,
                status,
                ..
            }) => {
                assert_eq!(tag, PlatformTag::CloudFront);
                assert_eq!(retries, 3);
                assert_eq!(status, 1);
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        assert_eq!(engine.calls(), 4);
        assert_eq!(ctx.failures(PlatformTag::CloudFront), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_untagged_failure_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(ScriptedEngine::new(&[2, 0], false));
        let executor = FetchExecutor::new(engine.clone(), RetryTable::default(), dir.path());
        let mut ctx = RetryContext::new(1);

        let result = executor
            .fetch(&FetchCommand::new("https://example.com/v.mp4", "v.mp4"), &mut ctx)
            .await;

        assert!(matches!(result, Err(FetchError::Failed { status: 2, .. })));
        assert_eq!(engine.calls(), 1);
    }

    #[tokio::test]
    async fn test_clean_exit_without_output_is_best_effort() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(ScriptedEngine::new(&[0], false));
        let executor = FetchExecutor::new(engine, RetryTable::default(), dir.path());
        let mut ctx = RetryContext::new(1);

        let output = executor
            .fetch(&FetchCommand::new("https://example.com/v.mp4", "v.mp4"), &mut ctx)
            .await
            .unwrap();

        assert!(!output.located);
        assert_eq!(output.path, dir.path().join("v.mp4"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_carries_no_state_into_next_item() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(ScriptedEngine::new(&[1, 1, 0, 1, 0], true));
        let executor = FetchExecutor::new(engine, cloudfront_table(2), dir.path());
        let mut ctx = RetryContext::new(1);

        let first = executor
            .fetch(&FetchCommand::new(CLOUDFRONT_URL, "a.mp4"), &mut ctx)
            .await
            .unwrap();
        let second = executor
            .fetch(&FetchCommand::new(CLOUDFRONT_URL, "b.mp4"), &mut ctx)
            .await
            .unwrap();

        assert_eq!(first.retries, 2);
        assert_eq!(second.retries, 1);
    }
}
