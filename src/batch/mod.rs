//! Batch model and orchestration.
//!
//! A batch is one run over an ordered URL list with shared parameters. It is
//! configured through the [`ConfigMachine`], admitted by the
//! [`ActorRegistry`] (one running batch per actor), and executed item by item
//! by the [`BatchOrchestrator`].

mod config_machine;
mod orchestrator;
mod registry;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

pub use config_machine::{ConfigField, ConfigMachine, DEFAULT_CREDIT, PresetAnswers};
pub use orchestrator::{BatchOrchestrator, Collaborators, OrchestratorSettings};
pub use registry::{ActorGuard, ActorId, ActorRegistry};

use crate::error::ConfigurationError;

/// Maximum characters of the URL tail kept in an item's display name.
const NAME_TAIL_CHARS: usize = 60;

/// What a batch fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Video streams fetched through the fetch engine.
    Video,
    /// Audio tracks handled by the audio pipeline.
    Audio,
    /// Documents fetched over HTTP.
    Document,
}

impl MediaKind {
    /// Stable label for logs and summaries.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
        }
    }

    /// Short tag used in captions.
    #[must_use]
    pub fn caption_label(self) -> &'static str {
        match self {
            Self::Video => "VID",
            Self::Audio => "AUD",
            Self::Document => "PDF",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "pdf" | "document" => Ok(Self::Document),
            _ => Err(ConfigurationError::invalid_kind(value.trim())),
        }
    }
}

/// Requested video resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A specific height, with the matching 16:9 width.
    Constrained {
        /// Pixel height.
        height: u32,
        /// Pixel width.
        width: u32,
    },
    /// Whatever the source offers.
    Unconstrained,
}

impl Resolution {
    /// Supported heights and their widths.
    pub const TABLE: [(u32, u32); 6] = [
        (144, 256),
        (240, 426),
        (360, 640),
        (480, 854),
        (720, 1280),
        (1080, 1920),
    ];

    /// Maps a user answer such as `"480"` to a resolution.
    ///
    /// Anything outside the table is unconstrained.
    #[must_use]
    pub fn from_answer(answer: &str) -> Self {
        answer
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(|h| Self::TABLE.iter().find(|(height, _)| *height == h))
            .map_or(Self::Unconstrained, |&(height, width)| Self::Constrained {
                height,
                width,
            })
    }

    /// The requested height, if constrained.
    #[must_use]
    pub fn height(self) -> Option<u32> {
        match self {
            Self::Constrained { height, .. } => Some(height),
            Self::Unconstrained => None,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constrained { height, width } => write!(f, "{height}x{width}"),
            Self::Unconstrained => f.write_str("UN"),
        }
    }
}

/// A fully configured batch. Immutable once running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    /// Source URLs in input order.
    pub items: Vec<String>,
    /// 1-based position of the first item to process.
    pub start_index: usize,
    /// What the batch fetches.
    pub kind: MediaKind,
    /// Requested resolution; only meaningful for video.
    pub resolution: Resolution,
    /// Batch name used in captions.
    pub name: String,
    /// Credit label used in captions.
    pub credit: String,
    /// Access token for relay templates.
    pub token: String,
    /// Batch-level thumbnail URL.
    pub thumbnail: Option<String>,
}

impl BatchJob {
    /// Items from `start_index` to the end, in order.
    pub fn pending_items(&self) -> impl Iterator<Item = Item> + '_ {
        self.items
            .iter()
            .enumerate()
            .skip(self.start_index.saturating_sub(1))
            .map(|(index, url)| Item::new(index + 1, url, self))
    }

    /// Number of items the run will iterate.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.items
            .len()
            .saturating_sub(self.start_index.saturating_sub(1))
    }
}

/// One position of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// 1-based position.
    pub position: usize,
    /// Source URL as given.
    pub url: String,
    /// Display name, also the output file stem.
    pub name: String,
    /// Caption sent with the artifact.
    pub caption: String,
}

impl Item {
    /// Derives the item at `position` of `job`.
    #[must_use]
    pub fn new(position: usize, url: &str, job: &BatchJob) -> Self {
        let name = display_name(position, url);
        let caption = format!(
            "{}_ID: {position:03}.\n\nTITLE: {name}\n\nBATCH: {}\n\nEXTRACTED BY: {}",
            job.kind.caption_label(),
            job.name,
            job.credit
        );
        Self {
            position,
            url: url.to_string(),
            name,
            caption,
        }
    }

    /// True if the URL points at a PDF.
    #[must_use]
    pub fn is_pdf(&self) -> bool {
        self.url.to_ascii_lowercase().contains(".pdf")
    }
}

/// Builds `NNN) <tail>` from the position and the URL's last path segment.
#[must_use]
pub fn display_name(position: usize, url: &str) -> String {
    let tail = url.rsplit('/').next().unwrap_or(url);
    let truncated: String = tail.chars().take(NAME_TAIL_CHARS).collect();
    format!("{position:03}) {}", truncated.replace(".pdf", ""))
}

/// Success and error tallies of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchCounters {
    succeeded: usize,
    failed: usize,
}

impl BatchCounters {
    /// Counts a successful item.
    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    /// Counts a failed item.
    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// Items that succeeded.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    /// Items that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Items processed so far.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Final report of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Identifier assigned when the batch started running.
    pub batch_id: u64,
    /// Batch name.
    pub name: String,
    /// Media kind.
    pub kind: MediaKind,
    /// Items iterated.
    pub processed: usize,
    /// Items that succeeded.
    pub succeeded: usize,
    /// Items that failed.
    pub failed: usize,
}

impl BatchSummary {
    /// Builds the summary from the job and its counters.
    #[must_use]
    pub fn new(batch_id: u64, job: &BatchJob, counters: BatchCounters) -> Self {
        Self {
            batch_id,
            name: job.name.clone(),
            kind: job.kind,
            processed: counters.processed(),
            succeeded: counters.succeeded(),
            failed: counters.failed(),
        }
    }

    /// The tally line sent to the initiator.
    #[must_use]
    pub fn tally_message(&self) -> String {
        format!(
            "Done — processed: {}, succeeded: {}, errors: {}",
            self.processed, self.succeeded, self.failed
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn job(items: &[&str], start_index: usize) -> BatchJob {
        BatchJob {
            items: items.iter().map(ToString::to_string).collect(),
            start_index,
            kind: MediaKind::Video,
            resolution: Resolution::Unconstrained,
            name: "Physics".to_string(),
            credit: "Ops".to_string(),
            token: "unknown".to_string(),
            thumbnail: None,
        }
    }

    #[test]
    fn test_media_kind_parsing() {
        assert_eq!("Video".parse::<MediaKind>().unwrap(), MediaKind::Video);
        assert_eq!(" audio ".parse::<MediaKind>().unwrap(), MediaKind::Audio);
        assert_eq!("pdf".parse::<MediaKind>().unwrap(), MediaKind::Document);
        assert_eq!("document".parse::<MediaKind>().unwrap(), MediaKind::Document);
        assert!(matches!(
            "gif".parse::<MediaKind>(),
            Err(ConfigurationError::InvalidKind { ref value }) if value == "gif"
        ));
    }

    #[test]
    fn test_resolution_table() {
        assert_eq!(
            Resolution::from_answer("480"),
            Resolution::Constrained {
                height: 480,
                width: 854
            }
        );
        assert_eq!(Resolution::from_answer("1080").to_string(), "1080x1920");
        assert_eq!(Resolution::from_answer("144").height(), Some(144));
        assert_eq!(Resolution::from_answer("999"), Resolution::Unconstrained);
        assert_eq!(Resolution::from_answer("best"), Resolution::Unconstrained);
        assert_eq!(Resolution::Unconstrained.to_string(), "UN");
    }

    #[test]
    fn test_display_name_pads_position_and_strips_pdf() {
        assert_eq!(
            display_name(7, "https://cdn.test/docs/Lecture-Notes.pdf"),
            "007) Lecture-Notes"
        );
        assert_eq!(display_name(123, "https://cdn.test/v/"), "123) ");
    }

    #[test]
    fn test_display_name_truncates_tail_to_sixty_chars() {
        let tail = "a".repeat(80);
        let name = display_name(1, &format!("https://cdn.test/{tail}"));
        assert_eq!(name, format!("001) {}", "a".repeat(60)));
    }

    #[test]
    fn test_item_caption_mentions_kind_position_batch_and_credit() {
        let job = job(&["https://cdn.test/a.m3u8"], 1);
        let item = job.pending_items().next().unwrap();
        assert!(item.caption.starts_with("VID_ID: 001."));
        assert!(item.caption.contains("TITLE: 001) a.m3u8"));
        assert!(item.caption.contains("BATCH: Physics"));
        assert!(item.caption.contains("EXTRACTED BY: Ops"));
    }

    #[test]
    fn test_pending_items_start_at_start_index() {
        let job = job(&["https://x/1", "https://x/2", "https://x/3"], 2);
        let positions: Vec<usize> = job.pending_items().map(|i| i.position).collect();
        assert_eq!(positions, vec![2, 3]);
        assert_eq!(job.pending_count(), 2);
    }

    #[test]
    fn test_is_pdf_is_case_insensitive() {
        let job = job(&["https://x/Notes.PDF", "https://x/v.m3u8"], 1);
        let items: Vec<Item> = job.pending_items().collect();
        assert!(items[0].is_pdf());
        assert!(!items[1].is_pdf());
    }

    #[test]
    fn test_counters_and_summary() {
        let mut counters = BatchCounters::default();
        counters.record_success();
        counters.record_success();
        counters.record_failure();
        let summary = BatchSummary::new(4, &job(&["https://x/1"], 1), counters);
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.tally_message(), "Done — processed: 3, succeeded: 2, errors: 1");

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["kind"], "video");
        assert_eq!(json["batch_id"], 4);
    }
}
