//! Rate-gated transfer progress reporting.
//!
//! The [`ProgressReporter`] turns byte counts into a status message and edits
//! it through the chat layer, at most once per interval per transfer. The
//! final update (`current == total`) always passes the gate.
//!
//! Delivery is best effort: rate-limited edits are retried a few times after
//! the hinted cooldown, and anything else is dropped. A dropped update never
//! fails the transfer it describes.

mod format;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::chat::{ChatError, ChatSession, StatusHandle, UploadProgress};

pub use format::{ProgressSnapshot, human_duration, human_size, render_bar};

/// Default minimum time between two updates of the same status message.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// Number of segments in the rendered bar.
pub const BAR_SEGMENTS: u32 = 20;

/// Edit attempts made for one update before it is dropped.
pub const MAX_EDIT_ATTEMPTS: u32 = 3;

/// Per-transfer progress bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressState {
    start: Instant,
    last_emit: Instant,
    current: u64,
    total: u64,
}

impl ProgressState {
    /// Starts tracking a transfer now.
    #[must_use]
    pub fn start() -> Self {
        Self::started_at(Instant::now())
    }

    /// Starts tracking a transfer that began at `start`.
    #[must_use]
    pub fn started_at(start: Instant) -> Self {
        Self {
            start,
            last_emit: start,
            current: 0,
            total: 0,
        }
    }

    /// Bytes reported so far.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.current
    }

    /// Total bytes reported.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }
}

/// What happened to one progress report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressDelivery {
    /// The rate gate suppressed the update.
    Gated,
    /// The update was not meaningful (unknown total).
    Skipped,
    /// The status message was edited.
    Delivered {
        /// Edit attempts used, including the successful one.
        attempts: u32,
    },
    /// Every attempt was rate-limited; the update was dropped.
    RateLimited,
    /// The edit failed for another reason; the update was dropped.
    Failed,
}

/// Computes, renders, and delivers progress updates.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    interval: Duration,
    segments: u32,
    max_edit_attempts: u32,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_INTERVAL)
    }
}

impl ProgressReporter {
    /// Creates a reporter with the given rate-gate interval.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            segments: BAR_SEGMENTS,
            max_edit_attempts: MAX_EDIT_ATTEMPTS,
        }
    }

    /// The rate-gate interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true if an update at `now` passes the rate gate.
    #[must_use]
    pub fn should_emit(&self, state: &ProgressState, current: u64, total: u64, now: Instant) -> bool {
        current == total || now.saturating_duration_since(state.last_emit) > self.interval
    }

    /// Renders the status text for the given counts.
    #[must_use]
    pub fn render(&self, state: &ProgressState, current: u64, total: u64, now: Instant) -> String {
        let elapsed = now.saturating_duration_since(state.start).as_secs_f64();
        ProgressSnapshot::compute(current, total, elapsed).render(self.segments)
    }

    /// Records a progress callback and edits `handle` if the gate allows it.
    pub async fn report(
        &self,
        state: &mut ProgressState,
        current: u64,
        total: u64,
        sink: &dyn ChatSession,
        handle: StatusHandle,
    ) -> ProgressDelivery {
        state.current = current;
        state.total = total;

        if total == 0 {
            return ProgressDelivery::Skipped;
        }

        let now = Instant::now();
        if !self.should_emit(state, current, total, now) {
            return ProgressDelivery::Gated;
        }
        state.last_emit = now;

        let text = self.render(state, current, total, now);
        self.deliver(sink, handle, &text).await
    }

    async fn deliver(&self, sink: &dyn ChatSession, handle: StatusHandle, text: &str) -> ProgressDelivery {
        for attempt in 1..=self.max_edit_attempts {
            match sink.edit_status(handle, text).await {
                Ok(()) => return ProgressDelivery::Delivered { attempts: attempt },
                Err(ChatError::RateLimited { retry_after }) => {
                    warn!(
                        attempt,
                        wait_ms = retry_after.as_millis(),
                        "progress edit rate-limited"
                    );
                    if attempt < self.max_edit_attempts {
                        tokio::time::sleep(retry_after).await;
                    }
                }
                Err(error) => {
                    debug!(%error, "dropping progress update");
                    return ProgressDelivery::Failed;
                }
            }
        }
        ProgressDelivery::RateLimited
    }
}

/// Routes upload byte counts from the chat layer into a status message.
pub struct StatusProgress<'a> {
    reporter: &'a ProgressReporter,
    sink: &'a dyn ChatSession,
    handle: StatusHandle,
    state: Mutex<ProgressState>,
}

impl<'a> StatusProgress<'a> {
    /// Starts observing an upload that begins now.
    pub fn new(reporter: &'a ProgressReporter, sink: &'a dyn ChatSession, handle: StatusHandle) -> Self {
        Self {
            reporter,
            sink,
            handle,
            state: Mutex::new(ProgressState::start()),
        }
    }
}

#[async_trait]
impl UploadProgress for StatusProgress<'_> {
    async fn on_progress(&self, current: u64, total: u64) {
        let mut state = self.state.lock().await;
        self.reporter
            .report(&mut state, current, total, self.sink, self.handle)
            .await;
    }
}
