//! Platform-keyed retry policy with fixed backoff.
//!
//! Some hosting platforms fail intermittently and succeed when simply asked
//! again after a short pause. Each such platform gets a [`PlatformTag`] and a
//! [`RetryRule`] (threshold plus fixed delay) in the [`RetryTable`]. Fetches
//! from any other source get no retries at all.
//!
//! Consecutive failures are counted in a [`RetryContext`] owned by one batch
//! run, so two batches hitting the same flaky platform do not share a budget.
//!
//! # Threshold semantics
//!
//! A rule with `max_retries = N` permits exactly N retries, i.e. N + 1
//! attempts. The counter is cleared whenever a fetch reaches a terminal
//! outcome.
//!
//! # Example
//!
//! ```
//! use mediabatch_core::fetch::{PlatformTag, RetryContext, RetryDecision, RetryTable};
//!
//! let table = RetryTable::default();
//! let rule = table.rule(PlatformTag::CloudFront).unwrap();
//! let mut ctx = RetryContext::new(7);
//!
//! match ctx.should_retry(PlatformTag::CloudFront, rule) {
//!     RetryDecision::Retry { delay, attempt } => println!("retry #{attempt} in {delay:?}"),
//!     RetryDecision::DoNotRetry { reason } => println!("giving up: {reason}"),
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, instrument};

use super::FetchCommand;

/// A platform with a dedicated retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformTag {
    /// visionias streams (matched anywhere in the command line).
    VisionIas,
    /// PenPencil VOD streams (matched anywhere in the command line).
    PenPencil,
    /// CloudFront-hosted streams (matched in the URL).
    CloudFront,
}

impl PlatformTag {
    /// All tags in classification order.
    pub const ALL: [Self; 3] = [Self::VisionIas, Self::PenPencil, Self::CloudFront];

    /// Returns the stable config/log label for the tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VisionIas => "visionias",
            Self::PenPencil => "penpencil",
            Self::CloudFront => "cloudfront",
        }
    }

    /// Returns true if the command belongs to this platform.
    #[must_use]
    pub fn matches(self, command: &FetchCommand, command_line: &str) -> bool {
        match self {
            Self::VisionIas => command_line.contains("visionias"),
            Self::PenPencil => command_line.contains("penpencilvod"),
            Self::CloudFront => command.url.contains("cloudfront"),
        }
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformTag {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str() == value)
            .ok_or_else(|| format!("unknown platform tag '{value}'"))
    }
}

/// Retry threshold and fixed backoff for one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryRule {
    /// Retries permitted before giving up.
    pub max_retries: u32,
    /// Fixed delay before each retry.
    pub backoff: Duration,
}

impl RetryRule {
    /// Creates a rule.
    #[must_use]
    pub const fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }
}

/// Decision on whether to retry a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the fetch after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which retry this will be (1-indexed).
        attempt: u32,
    },

    /// Do not retry the fetch.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Retry rules keyed by platform tag.
#[derive(Debug, Clone)]
pub struct RetryTable {
    rules: HashMap<PlatformTag, RetryRule>,
}

impl Default for RetryTable {
    fn default() -> Self {
        let mut rules = HashMap::new();
        rules.insert(
            PlatformTag::VisionIas,
            RetryRule::new(10, Duration::from_secs(5)),
        );
        rules.insert(
            PlatformTag::PenPencil,
            RetryRule::new(10, Duration::from_secs(5)),
        );
        rules.insert(
            PlatformTag::CloudFront,
            RetryRule::new(15, Duration::from_secs(3)),
        );
        Self { rules }
    }
}

impl RetryTable {
    /// Creates a table with no rules; nothing is retried.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Sets or replaces the rule for a tag.
    pub fn set(&mut self, tag: PlatformTag, rule: RetryRule) {
        self.rules.insert(tag, rule);
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with_rule(mut self, tag: PlatformTag, rule: RetryRule) -> Self {
        self.set(tag, rule);
        self
    }

    /// Returns the rule for a tag.
    #[must_use]
    pub fn rule(&self, tag: PlatformTag) -> Option<RetryRule> {
        self.rules.get(&tag).copied()
    }

    /// Classifies a command into the first platform tag that has a rule.
    #[must_use]
    pub fn classify(&self, command: &FetchCommand, command_line: &str) -> Option<(PlatformTag, RetryRule)> {
        PlatformTag::ALL
            .into_iter()
            .filter(|tag| tag.matches(command, command_line))
            .find_map(|tag| self.rule(tag).map(|rule| (tag, rule)))
    }
}

/// Consecutive-failure counters for one batch run.
#[derive(Debug, Default)]
pub struct RetryContext {
    batch_id: u64,
    failures: HashMap<PlatformTag, u32>,
}

impl RetryContext {
    /// Creates an empty context for a batch.
    #[must_use]
    pub fn new(batch_id: u64) -> Self {
        Self {
            batch_id,
            failures: HashMap::new(),
        }
    }

    /// Returns the batch this context belongs to.
    #[must_use]
    pub fn batch_id(&self) -> u64 {
        self.batch_id
    }

    /// Returns the current consecutive-failure count for a tag.
    #[must_use]
    pub fn failures(&self, tag: PlatformTag) -> u32 {
        self.failures.get(&tag).copied().unwrap_or(0)
    }

    /// Clears the counter for a tag.
    pub fn reset(&mut self, tag: PlatformTag) {
        self.failures.remove(&tag);
    }

    /// Records a failure and decides whether to retry.
    ///
    /// The counter is incremented only when a retry is granted.
    #[instrument(skip(self, rule), fields(batch_id = self.batch_id, max_retries = rule.max_retries))]
    pub fn should_retry(&mut self, tag: PlatformTag, rule: RetryRule) -> RetryDecision {
        let counter = self.failures.entry(tag).or_insert(0);
        if *counter >= rule.max_retries {
            debug!(failures = *counter, "retry budget exhausted");
            return RetryDecision::DoNotRetry {
                reason: format!("max retries ({}) exhausted for {tag}", rule.max_retries),
            };
        }

        *counter += 1;
        debug!(attempt = *counter, delay_ms = rule.backoff.as_millis(), "will retry");
        RetryDecision::Retry {
            delay: rule.backoff,
            attempt: *counter,
        }
    }
}
