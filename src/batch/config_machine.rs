//! Interactive batch configuration as a state machine.
//!
//! Each answer advances the machine by one field; the transport that
//! collects answers is not its concern. The URL list is loaded up front, so
//! the machine starts at the start index question.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use super::{BatchJob, MediaKind, Resolution};
use crate::error::ConfigurationError;
use crate::parser::load_url_list;
use crate::resolver::UNKNOWN_TOKEN;

/// Credit used when the initiator answers `de`.
pub const DEFAULT_CREDIT: &str = "mediabatch";

/// The field the machine is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigField {
    /// 1-based position to start from.
    StartIndex,
    /// Batch name, or `d` for the input file's stem.
    BatchName,
    /// `video`, `audio`, or `pdf`.
    Kind,
    /// Target height; only asked for video batches.
    Resolution,
    /// Credit label, or `de` for the default.
    Credit,
    /// Relay access token, or `unknown`.
    Token,
    /// Thumbnail URL, or anything not starting with `http` for none.
    Thumbnail,
}

impl ConfigField {
    /// Every field, in the order they are asked.
    pub const ALL: [Self; 7] = [
        Self::StartIndex,
        Self::BatchName,
        Self::Kind,
        Self::Resolution,
        Self::Credit,
        Self::Token,
        Self::Thumbnail,
    ];

    /// Stable field name for errors and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StartIndex => "start index",
            Self::BatchName => "batch name",
            Self::Kind => "media kind",
            Self::Resolution => "resolution",
            Self::Credit => "credit",
            Self::Token => "token",
            Self::Thumbnail => "thumbnail",
        }
    }
}

/// Answers known before configuration starts; they are used instead of asking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresetAnswers {
    answers: HashMap<ConfigField, String>,
}

impl PresetAnswers {
    /// Creates an empty set; every field will be asked.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Presets the answer for `field`.
    pub fn set(&mut self, field: ConfigField, answer: impl Into<String>) {
        self.answers.insert(field, answer.into());
    }

    /// Presets the answer for `field`, builder style.
    #[must_use]
    pub fn with(mut self, field: ConfigField, answer: impl Into<String>) -> Self {
        self.set(field, answer);
        self
    }

    /// The preset answer for `field`, if any.
    #[must_use]
    pub fn get(&self, field: ConfigField) -> Option<&str> {
        self.answers.get(&field).map(String::as_str)
    }

    /// Number of preset fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    /// True if nothing is preset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

/// Collects batch parameters one answer at a time.
#[derive(Debug, Clone)]
pub struct ConfigMachine {
    items: Vec<String>,
    default_name: String,
    default_credit: String,
    current: Option<ConfigField>,
    start_index: usize,
    name: Option<String>,
    kind: Option<MediaKind>,
    resolution: Resolution,
    credit: Option<String>,
    token: Option<String>,
    thumbnail: Option<String>,
}

impl ConfigMachine {
    /// Starts configuring a batch over `items`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::EmptyInput`] if `items` is empty.
    pub fn new(
        items: Vec<String>,
        source: &Path,
        default_credit: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        if items.is_empty() {
            return Err(ConfigurationError::EmptyInput {
                path: source.to_path_buf(),
            });
        }
        let default_name = source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            items,
            default_name,
            default_credit: default_credit.into(),
            current: Some(ConfigField::StartIndex),
            start_index: 1,
            name: None,
            kind: None,
            resolution: Resolution::Unconstrained,
            credit: None,
            token: None,
            thumbnail: None,
        })
    }

    /// Loads the URL list at `path` and starts configuring.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Input`] if the file cannot be read and
    /// [`ConfigurationError::EmptyInput`] if it has no URLs.
    pub fn from_file(path: &Path, default_credit: impl Into<String>) -> Result<Self, ConfigurationError> {
        let items = load_url_list(path)?;
        Self::new(items, path, default_credit)
    }

    /// The field awaiting an answer, or `None` once complete.
    #[must_use]
    pub fn current(&self) -> Option<ConfigField> {
        self.current
    }

    /// True once every field has been answered.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current.is_none()
    }

    /// Number of URLs loaded.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Question text for the current field.
    #[must_use]
    pub fn prompt(&self) -> Option<String> {
        let text = match self.current? {
            ConfigField::StartIndex => format!(
                "Total links found: {}\n\nSend starting index (default is 1)",
                self.items.len()
            ),
            ConfigField::BatchName => "Enter batch name or 'd' for default (filename).".to_string(),
            ConfigField::Kind => "Enter type: 'video', 'audio', or 'pdf'.".to_string(),
            ConfigField::Resolution => "Enter resolution (e.g., 480, 720, 1080).".to_string(),
            ConfigField::Credit => "Enter your name or 'de' for default.".to_string(),
            ConfigField::Token => "Enter token for MPD URLs or 'unknown'.".to_string(),
            ConfigField::Thumbnail => "Send thumbnail URL or 'no'.".to_string(),
        };
        Some(text)
    }

    /// Applies an answer to the current field and moves to the next one.
    ///
    /// Returns the next field, or `None` when configuration is complete.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::InvalidKind`] for an unsupported media kind
    /// - [`ConfigurationError::AlreadyComplete`] if nothing is pending
    pub fn advance(&mut self, answer: &str) -> Result<Option<ConfigField>, ConfigurationError> {
        let field = self.current.ok_or(ConfigurationError::AlreadyComplete)?;
        let answer = answer.trim();

        let next = match field {
            ConfigField::StartIndex => {
                self.start_index = parse_start_index(answer, self.items.len());
                Some(ConfigField::BatchName)
            }
            ConfigField::BatchName => {
                self.name = Some(if answer == "d" {
                    self.default_name.clone()
                } else {
                    answer.to_string()
                });
                Some(ConfigField::Kind)
            }
            ConfigField::Kind => {
                let kind: MediaKind = answer.parse()?;
                self.kind = Some(kind);
                if kind == MediaKind::Video {
                    Some(ConfigField::Resolution)
                } else {
                    Some(ConfigField::Credit)
                }
            }
            ConfigField::Resolution => {
                self.resolution = Resolution::from_answer(answer);
                Some(ConfigField::Credit)
            }
            ConfigField::Credit => {
                self.credit = Some(if answer == "de" || answer.is_empty() {
                    self.default_credit.clone()
                } else {
                    answer.to_string()
                });
                Some(ConfigField::Token)
            }
            ConfigField::Token => {
                self.token = Some(if answer.is_empty() {
                    UNKNOWN_TOKEN.to_string()
                } else {
                    answer.to_string()
                });
                Some(ConfigField::Thumbnail)
            }
            ConfigField::Thumbnail => {
                self.thumbnail = answer.starts_with("http").then(|| answer.to_string());
                None
            }
        };

        debug!(field = field.as_str(), next = next.map(ConfigField::as_str), "configuration advanced");
        self.current = next;
        Ok(next)
    }

    /// Produces the configured job.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Incomplete`] if a field is still pending.
    pub fn into_job(self) -> Result<BatchJob, ConfigurationError> {
        if let Some(field) = self.current {
            return Err(ConfigurationError::Incomplete {
                field: field.as_str(),
            });
        }
        Ok(BatchJob {
            items: self.items,
            start_index: self.start_index,
            kind: self.kind.unwrap_or(MediaKind::Video),
            resolution: self.resolution,
            name: self.name.unwrap_or(self.default_name),
            credit: self.credit.unwrap_or(self.default_credit),
            token: self.token.unwrap_or_else(|| UNKNOWN_TOKEN.to_string()),
            thumbnail: self.thumbnail,
        })
    }
}

/// Parses a 1-based start index, falling back to 1 when invalid or out of range.
fn parse_start_index(answer: &str, len: usize) -> usize {
    match answer.parse::<usize>() {
        Ok(index) if (1..=len).contains(&index) => index,
        _ => 1,
    }
}
