//! Scripted collaborators for orchestrator integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mediabatch_core::audio::{AudioError, AudioJob, AudioPipeline};
use mediabatch_core::document::{DocumentClient, DocumentError};
use mediabatch_core::lifecycle::CookieSources;
use mediabatch_core::media::{MediaError, MediaToolchain};
use mediabatch_core::resolver::ExtractorChain;
use mediabatch_core::{
    BatchOrchestrator, ChatError, ChatSession, Collaborators, FetchCommand, FetchEngine,
    FetchError, FetchExecutor, OrchestratorSettings, RetryTable, RuleTable, StatusHandle,
    UploadProgress, UploadRequest,
};

/// One `send_file` call as the chat layer saw it.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub path: PathBuf,
    pub caption: String,
    pub thumbnail: Option<PathBuf>,
    pub existed: bool,
    pub with_progress: bool,
}

/// Chat session that answers prompts from a queue and records everything else.
#[derive(Default)]
pub struct ScriptedChat {
    answers: Mutex<VecDeque<String>>,
    upload_failures: Mutex<VecDeque<ChatError>>,
    next_status: AtomicU64,
    pub prompts: Mutex<Vec<String>>,
    pub messages: Mutex<Vec<String>>,
    pub uploads: Mutex<Vec<RecordedUpload>>,
}

impl ScriptedChat {
    pub fn with_answers(answers: &[&str]) -> Self {
        let chat = Self::default();
        chat.answers
            .lock()
            .unwrap()
            .extend(answers.iter().map(ToString::to_string));
        chat
    }

    /// Makes the next `send_file` calls fail with these errors, in order.
    pub fn fail_uploads(&self, errors: impl IntoIterator<Item = ChatError>) {
        self.upload_failures.lock().unwrap().extend(errors);
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatSession for ScriptedChat {
    async fn request_input(&self, prompt: &str) -> Result<String, ChatError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(ChatError::Closed)
    }

    async fn send_status(&self, _text: &str) -> Result<StatusHandle, ChatError> {
        Ok(StatusHandle(self.next_status.fetch_add(1, Ordering::Relaxed)))
    }

    async fn edit_status(&self, _handle: StatusHandle, _text: &str) -> Result<(), ChatError> {
        Ok(())
    }

    async fn delete_status(&self, _handle: StatusHandle) -> Result<(), ChatError> {
        Ok(())
    }

    async fn send_message(&self, text: &str) -> Result<(), ChatError> {
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn send_file(
        &self,
        request: &UploadRequest,
        progress: Option<&dyn UploadProgress>,
    ) -> Result<(), ChatError> {
        self.uploads.lock().unwrap().push(RecordedUpload {
            path: request.path.clone(),
            caption: request.caption.clone(),
            thumbnail: request.thumbnail.clone(),
            existed: request.path.exists(),
            with_progress: progress.is_some(),
        });
        let failure = self.upload_failures.lock().unwrap().pop_front();
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// One engine invocation as the engine saw it.
#[derive(Debug, Clone)]
pub struct RecordedFetch {
    pub args: Vec<String>,
    pub cookie_file: Option<PathBuf>,
    pub cookie_contents: Option<String>,
}

/// Fetch engine that replays exit codes and writes the output on success.
#[derive(Default)]
pub struct ScriptedEngine {
    exits: Mutex<VecDeque<i32>>,
    calls: AtomicUsize,
    write_on_failure: bool,
    fetches: Mutex<Vec<RecordedFetch>>,
}

impl ScriptedEngine {
    pub fn with_exits(exits: &[i32]) -> Arc<Self> {
        let engine = Self::default();
        engine.exits.lock().unwrap().extend(exits.iter().copied());
        Arc::new(engine)
    }

    /// Like [`ScriptedEngine::with_exits`], but a partial output is written
    /// before every non-zero exit too.
    pub fn writing_on_failure(exits: &[i32]) -> Arc<Self> {
        let engine = Self {
            write_on_failure: true,
            ..Self::default()
        };
        engine.exits.lock().unwrap().extend(exits.iter().copied());
        Arc::new(engine)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> Vec<RecordedFetch> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl FetchEngine for ScriptedEngine {
    fn program(&self) -> &str {
        "yt-dlp"
    }

    async fn run(&self, command: &FetchCommand, work_dir: &Path) -> Result<i32, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.fetches.lock().unwrap().push(RecordedFetch {
            args: command.args(),
            cookie_file: command.cookie_file.clone(),
            cookie_contents: command
                .cookie_file
                .as_ref()
                .and_then(|path| std::fs::read_to_string(path).ok()),
        });
        let status = self.exits.lock().unwrap().pop_front().unwrap_or(0);
        if status == 0 || self.write_on_failure {
            std::fs::write(work_dir.join(&command.output), b"video").unwrap();
        }
        Ok(status)
    }
}

/// Document client serving bodies or statuses from a map; unknown URLs are 404.
#[derive(Default)]
pub struct MemoryDocuments {
    responses: HashMap<String, Result<Vec<u8>, u16>>,
    calls: AtomicUsize,
}

impl MemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(mut self, url: &str, body: &[u8]) -> Self {
        self.responses.insert(url.to_string(), Ok(body.to_vec()));
        self
    }

    pub fn status(mut self, url: &str, status: u16) -> Self {
        self.responses.insert(url.to_string(), Err(status));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentClient for MemoryDocuments {
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, DocumentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.get(url) {
            Some(Ok(body)) => {
                std::fs::write(dest, body).map_err(|e| DocumentError::io(dest, e))?;
                Ok(body.len() as u64)
            }
            Some(Err(status)) => Err(DocumentError::Status { status: *status }),
            None => Err(DocumentError::Status { status: 404 }),
        }
    }
}

/// Audio pipeline that records which items it was given.
#[derive(Default)]
pub struct RecordingAudio {
    pub names: Mutex<Vec<String>>,
}

#[async_trait]
impl AudioPipeline for RecordingAudio {
    async fn process(&self, job: AudioJob<'_>, _chat: &dyn ChatSession) -> Result<(), AudioError> {
        self.names.lock().unwrap().push(job.name.to_string());
        Ok(())
    }
}

/// Media toolchain where neither ffmpeg nor ffprobe produce anything.
pub struct NoMedia;

#[async_trait]
impl MediaToolchain for NoMedia {
    async fn extract_thumbnail(&self, video: &Path) -> Result<PathBuf, MediaError> {
        Err(MediaError::NoOutput {
            program: "ffmpeg".to_string(),
            path: video.to_path_buf(),
        })
    }

    async fn probe_duration(&self, video: &Path) -> Result<u64, MediaError> {
        Err(MediaError::NoOutput {
            program: "ffprobe".to_string(),
            path: video.to_path_buf(),
        })
    }
}

/// Everything a test orchestrator is built from.
pub struct Harness {
    pub engine: Arc<ScriptedEngine>,
    pub documents: Arc<MemoryDocuments>,
    pub audio: Arc<RecordingAudio>,
    pub table: RetryTable,
    pub rewrite_urls: bool,
    pub cookies: CookieSources,
}

impl Harness {
    pub fn new(engine: Arc<ScriptedEngine>, documents: MemoryDocuments) -> Self {
        Self {
            engine,
            documents: Arc::new(documents),
            audio: Arc::new(RecordingAudio::default()),
            table: RetryTable::default(),
            rewrite_urls: false,
            cookies: CookieSources::default(),
        }
    }

    /// Resolves URLs through the default platform rules.
    pub fn with_default_rules(mut self) -> Self {
        self.rewrite_urls = true;
        self
    }

    pub fn with_cookies(mut self, cookies: CookieSources) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_table(mut self, table: RetryTable) -> Self {
        self.table = table;
        self
    }

    /// Builds an orchestrator with no pause between items. URLs are passed
    /// through unchanged unless [`Harness::with_default_rules`] was used.
    pub fn orchestrator(&self, work_dir: &Path) -> BatchOrchestrator {
        let rules = if self.rewrite_urls {
            RuleTable::default()
        } else {
            RuleTable::new(Vec::new())
        };
        let collaborators = Collaborators {
            fetch: FetchExecutor::new(self.engine.clone(), self.table.clone(), work_dir),
            extractors: ExtractorChain::new(),
            rules,
            documents: self.documents.clone(),
            audio: self.audio.clone(),
            media: Arc::new(NoMedia),
        };
        let settings = OrchestratorSettings {
            inter_item_delay: Duration::ZERO,
            cookies: self.cookies.clone(),
            ..OrchestratorSettings::default()
        };
        BatchOrchestrator::new(collaborators, settings)
    }
}

/// Writes a URL list into `dir` and returns its path.
pub fn write_url_list(dir: &Path, name: &str, urls: &[&str]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, urls.join("\n")).unwrap();
    path
}

/// File names left in `dir`, sorted.
pub fn leftover_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
