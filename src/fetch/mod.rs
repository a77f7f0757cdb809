//! Retry-governed invocation of the external fetch engine.
//!
//! This module wraps the external media fetcher (yt-dlp by default) with a
//! bounded, platform-aware retry policy.
//!
//! # Overview
//!
//! - [`FetchCommand`] - What to fetch, where to put it, and with which flags
//! - [`FetchEngine`] - The external process seam, [`YtDlpEngine`] in production
//! - [`RetryTable`] - Per-platform retry thresholds and fixed backoffs
//! - [`RetryContext`] - Consecutive-failure counters scoped to one batch
//! - [`FetchExecutor`] - Runs the engine, retries, and locates the output file
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mediabatch_core::fetch::{FetchCommand, FetchExecutor, RetryContext, RetryTable, YtDlpEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = FetchExecutor::new(Arc::new(YtDlpEngine::default()), RetryTable::default(), ".");
//! let mut retries = RetryContext::new(1);
//! let command = FetchCommand::new("https://example.com/v.m3u8", "001) v.mp4").accelerated();
//! let output = executor.fetch(&command, &mut retries).await?;
//! println!("Fetched: {}", output.path.display());
//! # Ok(())
//! # }
//! ```

mod command;
mod engine;
mod executor;
mod output;
mod retry;

pub use command::{
    ACCELERATION_ARGS, FetchCommand, UNCONSTRAINED_FORMAT, YOUTUBE_FORMAT, format_selector,
};
pub use engine::{DEFAULT_FETCH_BINARY, FetchEngine, YtDlpEngine};
pub use executor::{FetchExecutor, FetchOutput};
pub use output::{locate_output, remove_outputs};
pub use retry::{PlatformTag, RetryContext, RetryDecision, RetryRule, RetryTable};
