//! Mediabatch Core Library
//!
//! This library drives batch media acquisition: an ordered list of resource
//! URLs is resolved to fetchable sources, fetched through an external engine
//! under a platform-aware retry policy, and handed to an upload collaborator
//! while transient files are cleaned up regardless of outcome.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`resolver`] - First-match-wins platform rules that canonicalize URLs
//! - [`fetch`] - Fetch command building, retry table, and the fetch executor
//! - [`progress`] - Rate-gated transfer progress rendering and delivery
//! - [`batch`] - Batch model, configuration machine, actor registry, orchestrator
//! - [`chat`] - The chat interaction layer the orchestrator talks to
//! - [`document`], [`audio`], [`media`] - External collaborators
//! - [`lifecycle`] - Temporary credential files and best-effort cleanup
//! - [`parser`] - URL list input parsing
//! - [`config`] - File configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod audio;
pub mod batch;
pub mod chat;
pub mod config;
pub mod document;
pub mod error;
pub mod fetch;
pub mod http;
pub mod lifecycle;
pub mod media;
pub mod parser;
pub mod progress;
pub mod resolver;

// Re-export commonly used types
pub use batch::{
    ActorId, ActorRegistry, BatchJob, BatchOrchestrator, BatchSummary, Collaborators, ConfigField,
    ConfigMachine, Item, MediaKind, OrchestratorSettings, PresetAnswers, Resolution,
};
pub use chat::{ChatError, ChatSession, StatusHandle, UploadProgress, UploadRequest};
pub use config::FileConfig;
pub use error::{ConfigurationError, FetchError, ItemError, UploadError};
pub use fetch::{
    FetchCommand, FetchEngine, FetchExecutor, FetchOutput, PlatformTag, RetryContext, RetryRule,
    RetryTable, YtDlpEngine,
};
pub use parser::{ParseError, parse_url_list};
pub use progress::{ProgressDelivery, ProgressReporter, ProgressState};
pub use resolver::{ResolveContext, RuleTable, resolve};
