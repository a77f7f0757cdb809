//! The sequential batch loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

use super::{
    ActorId, ActorRegistry, BatchCounters, BatchJob, BatchSummary, ConfigMachine, Item, MediaKind,
    PresetAnswers,
};
use crate::audio::{AudioJob, AudioPipeline};
use crate::chat::{ChatError, ChatSession, UploadRequest};
use crate::document::DocumentClient;
use crate::error::{ConfigurationError, FetchError, ItemError, UploadError};
use crate::fetch::{FetchCommand, FetchExecutor, RetryContext, format_selector, remove_outputs};
use crate::lifecycle::{CookieSources, TempCookieFile, remove_quietly};
use crate::media::MediaToolchain;
use crate::progress::{DEFAULT_PROGRESS_INTERVAL, ProgressReporter, StatusProgress};
use crate::resolver::extract::ExtractorChain;
use crate::resolver::{DEFAULT_RELAY_HOST, ResolveContext, RuleTable};

/// File name of the batch-level thumbnail inside the working directory.
pub const BATCH_THUMBNAIL_NAME: &str = "thumb.jpg";

/// Sent to an actor who starts a batch while another one is running.
const BUSY_MESSAGE: &str = "A batch is already in progress. Wait for it to finish.";

/// Default pause between items.
pub const DEFAULT_INTER_ITEM_DELAY: Duration = Duration::from_secs(1);

/// External collaborators the orchestrator drives.
pub struct Collaborators {
    /// Runs the fetch engine under the retry table.
    pub fetch: FetchExecutor,
    /// Stream-page extractors applied before resolution.
    pub extractors: ExtractorChain,
    /// Platform rules for URL resolution.
    pub rules: RuleTable,
    /// HTTP client for documents and thumbnails.
    pub documents: Arc<dyn DocumentClient>,
    /// Audio extraction pipeline.
    pub audio: Arc<dyn AudioPipeline>,
    /// Thumbnail extraction and duration probing.
    pub media: Arc<dyn MediaToolchain>,
}

/// Tunables for a batch run.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Pause after every item.
    pub inter_item_delay: Duration,
    /// Minimum time between upload progress edits.
    pub progress_interval: Duration,
    /// Host of the stream relay.
    pub relay_host: String,
    /// Credit used when the batch asks for the default.
    pub default_credit: String,
    /// Cookie environment variables per platform family.
    pub cookies: CookieSources,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            inter_item_delay: DEFAULT_INTER_ITEM_DELAY,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            relay_host: DEFAULT_RELAY_HOST.to_string(),
            default_credit: super::DEFAULT_CREDIT.to_string(),
            cookies: CookieSources::default(),
        }
    }
}

/// How an item is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Audio,
    Document,
    Video,
}

fn route(kind: MediaKind, item: &Item) -> Route {
    match kind {
        MediaKind::Audio => Route::Audio,
        MediaKind::Document => Route::Document,
        MediaKind::Video if item.is_pdf() => Route::Document,
        MediaKind::Video => Route::Video,
    }
}

/// Drives batches from configuration to the final tally.
pub struct BatchOrchestrator {
    collaborators: Collaborators,
    settings: OrchestratorSettings,
    registry: ActorRegistry,
    reporter: ProgressReporter,
}

impl BatchOrchestrator {
    /// Creates an orchestrator with its own actor registry.
    pub fn new(collaborators: Collaborators, settings: OrchestratorSettings) -> Self {
        Self::with_registry(collaborators, settings, ActorRegistry::new())
    }

    /// Creates an orchestrator sharing `registry` with other orchestrators.
    pub fn with_registry(
        collaborators: Collaborators,
        settings: OrchestratorSettings,
        registry: ActorRegistry,
    ) -> Self {
        let reporter = ProgressReporter::new(settings.progress_interval);
        Self {
            collaborators,
            settings,
            registry,
            reporter,
        }
    }

    /// The actor registry.
    #[must_use]
    pub fn registry(&self) -> &ActorRegistry {
        &self.registry
    }

    fn work_dir(&self) -> &Path {
        self.collaborators.fetch.work_dir()
    }

    /// Configures and runs one batch for `actor` over the URL list at `input`.
    ///
    /// Fields answered in `presets` are not asked through `chat`.
    ///
    /// Per-item failures are counted and reported to the initiator; they never
    /// end the batch.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the actor already has a running
    /// batch or configuration fails. Nothing has been fetched in that case.
    #[instrument(skip(self, input, chat, presets), fields(actor = %actor, input = %input.display()))]
    pub async fn run_batch(
        &self,
        actor: ActorId,
        input: &Path,
        chat: &dyn ChatSession,
        presets: &PresetAnswers,
    ) -> Result<BatchSummary, ConfigurationError> {
        if let Err(error) = self.registry.ensure_idle(actor) {
            warn!("rejecting batch, actor already running");
            notify(chat, BUSY_MESSAGE).await;
            return Err(error);
        }

        let job = match self.configure(input, chat, presets).await {
            Ok(job) => job,
            Err(error) => {
                warn!(%error, "batch configuration failed");
                notify(chat, &format!("Invalid batch configuration: {error}")).await;
                return Err(error);
            }
        };

        self.run_prepared(actor, &job, chat).await
    }

    /// Runs an already configured job for `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::AlreadyRunning`] if the actor is busy.
    pub async fn run_prepared(
        &self,
        actor: ActorId,
        job: &BatchJob,
        chat: &dyn ChatSession,
    ) -> Result<BatchSummary, ConfigurationError> {
        let guard = match self.registry.try_acquire(actor) {
            Ok(guard) => guard,
            Err(error) => {
                notify(chat, BUSY_MESSAGE).await;
                return Err(error);
            }
        };
        let summary = self.run_job(job, guard.batch_id(), chat).await;
        drop(guard);
        Ok(summary)
    }

    /// Collects batch parameters, asking through the chat session for every
    /// field not in `presets`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the list is unreadable or empty,
    /// an answer is invalid, or the session fails.
    pub async fn configure(
        &self,
        input: &Path,
        chat: &dyn ChatSession,
        presets: &PresetAnswers,
    ) -> Result<BatchJob, ConfigurationError> {
        let mut machine = ConfigMachine::from_file(input, self.settings.default_credit.clone())?;
        info!(items = machine.item_count(), presets = presets.len(), "URL list loaded");
        while let (Some(field), Some(prompt)) = (machine.current(), machine.prompt()) {
            let answer = match presets.get(field) {
                Some(preset) => preset.to_string(),
                None => chat
                    .request_input(&prompt)
                    .await
                    .map_err(|source| ConfigurationError::prompt(field.as_str(), source))?,
            };
            machine.advance(&answer)?;
        }
        machine.into_job()
    }

    /// Runs a configured job to completion and sends the final tally.
    pub async fn run_job(&self, job: &BatchJob, batch_id: u64, chat: &dyn ChatSession) -> BatchSummary {
        info!(
            batch_id,
            name = %job.name,
            kind = %job.kind,
            items = job.pending_count(),
            "batch running"
        );

        let batch_thumbnail = self.fetch_batch_thumbnail(job).await;
        let mut retries = RetryContext::new(batch_id);
        let mut counters = BatchCounters::default();

        for item in job.pending_items() {
            let span = info_span!("item", batch_id, position = item.position, url = %item.url);
            let result = self
                .process_item(job, &item, batch_thumbnail.as_deref(), &mut retries, chat)
                .instrument(span)
                .await;

            match result {
                Ok(()) => {
                    counters.record_success();
                    info!(position = item.position, name = %item.name, "item complete");
                }
                Err(error) => {
                    counters.record_failure();
                    error!(position = item.position, url = %item.url, %error, "item failed");
                    notify(chat, &format!("Error processing {}: {error}", item.name)).await;
                }
            }

            tokio::time::sleep(self.settings.inter_item_delay).await;
        }

        if let Some(thumb) = &batch_thumbnail {
            remove_quietly(thumb).await;
        }

        let summary = BatchSummary::new(batch_id, job, counters);
        info!(
            batch_id,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "batch done"
        );
        notify(chat, &summary.tally_message()).await;
        summary
    }

    async fn fetch_batch_thumbnail(&self, job: &BatchJob) -> Option<PathBuf> {
        let url = job.thumbnail.as_deref()?;
        let dest = self.work_dir().join(BATCH_THUMBNAIL_NAME);
        match self.collaborators.documents.download(url, &dest).await {
            Ok(_) => Some(dest),
            Err(error) => {
                warn!(%url, %error, "batch thumbnail unavailable, extracting per item");
                None
            }
        }
    }

    async fn process_item(
        &self,
        job: &BatchJob,
        item: &Item,
        batch_thumbnail: Option<&Path>,
        retries: &mut RetryContext,
        chat: &dyn ChatSession,
    ) -> Result<(), ItemError> {
        match route(job.kind, item) {
            Route::Audio => self.process_audio(item, chat).await,
            Route::Document => self.process_document(item, chat).await,
            Route::Video => {
                self.process_video(job, item, batch_thumbnail, retries, chat)
                    .await
            }
        }
    }

    fn cookie_file(&self, url: &str) -> Result<Option<TempCookieFile>, ItemError> {
        self.settings
            .cookies
            .cookie_file_for(url)
            .map_err(|e| ItemError::io(std::env::temp_dir(), e))
    }

    async fn process_audio(&self, item: &Item, chat: &dyn ChatSession) -> Result<(), ItemError> {
        let cookie = self.cookie_file(&item.url)?;
        let job = AudioJob {
            url: &item.url,
            name: &item.name,
            cookie_file: cookie.as_ref().map(TempCookieFile::path),
        };
        self.collaborators.audio.process(job, chat).await?;
        Ok(())
    }

    async fn process_document(&self, item: &Item, chat: &dyn ChatSession) -> Result<(), ItemError> {
        let dest = self.work_dir().join(format!("{}.pdf", item.name));
        let result: Result<(), ItemError> = async {
            self.collaborators.documents.download(&item.url, &dest).await?;
            let request = UploadRequest::new(&dest, &item.caption);
            self.upload(&request, chat).await?;
            Ok(())
        }
        .await;
        remove_quietly(&dest).await;
        result
    }

    async fn process_video(
        &self,
        job: &BatchJob,
        item: &Item,
        batch_thumbnail: Option<&Path>,
        retries: &mut RetryContext,
        chat: &dyn ChatSession,
    ) -> Result<(), ItemError> {
        let cookie = self.cookie_file(&item.url)?;
        let source = self.collaborators.extractors.extract(&item.url).await?;

        let height = job.resolution.height();
        let ctx = ResolveContext::new(job.token.as_str())
            .with_quality(height)
            .with_relay_host(self.settings.relay_host.as_str());
        let resolved = self.collaborators.rules.resolve(&source, &ctx);
        debug!(%resolved, "resolved source");

        let command = FetchCommand::new(resolved.as_str(), format!("{}.mp4", item.name))
            .with_format(format_selector(&resolved, height))
            .with_cookie_file(cookie.as_ref().map(TempCookieFile::path))
            .accelerated();

        let status = chat
            .send_status(&format!("Downloading: {}\n\nURL: {resolved}", item.name))
            .await
            .ok();
        let result = self
            .fetch_and_deliver(&command, item, batch_thumbnail, retries, chat)
            .await;
        if let Some(handle) = status {
            if let Err(error) = chat.delete_status(handle).await {
                debug!(%error, "failed to delete download status");
            }
        }
        drop(cookie);
        result
    }

    async fn fetch_and_deliver(
        &self,
        command: &FetchCommand,
        item: &Item,
        batch_thumbnail: Option<&Path>,
        retries: &mut RetryContext,
        chat: &dyn ChatSession,
    ) -> Result<(), ItemError> {
        let result = match self.collaborators.fetch.fetch(command, retries).await {
            Ok(output) if output.located => {
                self.deliver_video(&output.path, item, batch_thumbnail, chat)
                    .await
            }
            Ok(output) => Err(FetchError::MissingOutput { path: output.path }.into()),
            Err(error) => Err(error.into()),
        };
        remove_outputs(self.work_dir(), &command.output).await;
        result
    }

    async fn deliver_video(
        &self,
        path: &Path,
        item: &Item,
        batch_thumbnail: Option<&Path>,
        chat: &dyn ChatSession,
    ) -> Result<(), ItemError> {
        let media = &self.collaborators.media;
        let item_thumbnail = match batch_thumbnail {
            Some(_) => None,
            None => match media.extract_thumbnail(path).await {
                Ok(still) => Some(still),
                Err(error) => {
                    debug!(%error, "no thumbnail for item");
                    None
                }
            },
        };
        let duration = match media.probe_duration(path).await {
            Ok(secs) => Some(secs),
            Err(error) => {
                debug!(%error, "duration unavailable");
                None
            }
        };

        let request = UploadRequest::new(path, &item.caption)
            .with_thumbnail(
                batch_thumbnail
                    .map(Path::to_path_buf)
                    .or_else(|| item_thumbnail.clone()),
            )
            .with_duration(duration);
        let result = self.upload(&request, chat).await;

        if let Some(still) = &item_thumbnail {
            remove_quietly(still).await;
        }
        result.map_err(ItemError::from)
    }

    /// Uploads with progress; on a rate limit, waits and retries once without progress.
    async fn upload(&self, request: &UploadRequest, chat: &dyn ChatSession) -> Result<(), UploadError> {
        let status = chat.send_status("Starting upload...").await.ok();
        let first = match status {
            Some(handle) => {
                let observer = StatusProgress::new(&self.reporter, chat, handle);
                chat.send_file(request, Some(&observer)).await
            }
            None => chat.send_file(request, None).await,
        };

        let result = match first {
            Ok(()) => Ok(()),
            Err(ChatError::RateLimited { retry_after }) => {
                warn!(
                    path = %request.path.display(),
                    wait_ms = retry_after.as_millis(),
                    "upload rate-limited, retrying once"
                );
                tokio::time::sleep(retry_after).await;
                match chat.send_file(request, None).await {
                    Ok(()) => Ok(()),
                    Err(ChatError::RateLimited { .. }) => Err(UploadError::StillRateLimited {
                        path: request.path.clone(),
                    }),
                    Err(source) => Err(UploadError::Rejected {
                        path: request.path.clone(),
                        source,
                    }),
                }
            }
            Err(source) => Err(UploadError::Rejected {
                path: request.path.clone(),
                source,
            }),
        };

        if let Some(handle) = status {
            if let Err(error) = chat.delete_status(handle).await {
                debug!(%error, "failed to delete upload status");
            }
        }
        result
    }
}

/// Sends a message to the initiator, logging instead of failing.
async fn notify(chat: &dyn ChatSession, text: &str) {
    if let Err(error) = chat.send_message(text).await {
        warn!(%error, "failed to notify initiator");
    }
}
