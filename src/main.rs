//! CLI entry point for the batch media acquisition tool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use mediabatch_core::audio::YtDlpAudioPipeline;
use mediabatch_core::config::{LoadedConfig, load_config};
use mediabatch_core::document::HttpDocumentClient;
use mediabatch_core::fetch::DEFAULT_FETCH_BINARY;
use mediabatch_core::lifecycle::CookieSources;
use mediabatch_core::media::{DEFAULT_FFMPEG_BINARY, DEFAULT_FFPROBE_BINARY, FfmpegToolchain};
use mediabatch_core::resolver::ExtractorChain;
use mediabatch_core::{
    ActorId, BatchOrchestrator, Collaborators, FetchExecutor, OrchestratorSettings, RuleTable,
    YtDlpEngine,
};
use tracing::{debug, info};

mod cli;
mod terminal;

use cli::Args;
use terminal::{
    TerminalChat, init_tracing, is_dumb_terminal, no_color_env_requested, should_disable_color,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let no_color = should_disable_color(
        args.no_color,
        no_color_env_requested(),
        is_dumb_terminal(),
    );
    init_tracing(args.default_log_level(), no_color);
    debug!(?args, "CLI arguments parsed");

    let loaded = load_config(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(path) = &loaded.path {
        debug!(path = %path.display(), from_file = loaded.loaded_from_file, "configuration resolved");
    }

    // Scratch space lives in a temporary directory unless one is configured.
    let scratch = tempfile::Builder::new()
        .prefix("mediabatch-")
        .tempdir()
        .context("failed to create a scratch directory")?;
    let work_dir = args
        .work_dir
        .clone()
        .or_else(|| loaded.config.work_dir.clone())
        .unwrap_or_else(|| scratch.path().to_path_buf());
    let output_dir = args
        .output_dir
        .clone()
        .or_else(|| loaded.config.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    ensure_dir(&work_dir)?;
    ensure_dir(&output_dir)?;

    let orchestrator = build_orchestrator(&loaded, &work_dir)?;
    let chat = TerminalChat::new(&output_dir, args.quiet);

    info!(input = %args.input.display(), work_dir = %work_dir.display(), "mediabatch starting");

    let summary = orchestrator
        .run_batch(ActorId(args.actor), &args.input, &chat, &args.presets())
        .await
        .context("invalid batch configuration")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("failed to serialize summary")?
        );
    } else {
        println!("{}", summary.tally_message());
    }

    Ok(())
}

fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory {}", path.display()))
}

fn build_orchestrator(loaded: &LoadedConfig, work_dir: &Path) -> Result<BatchOrchestrator> {
    let config = &loaded.config;
    let fetch_binary = config
        .fetch_binary
        .clone()
        .unwrap_or_else(|| DEFAULT_FETCH_BINARY.to_string());

    let collaborators = Collaborators {
        fetch: FetchExecutor::new(
            Arc::new(YtDlpEngine::new(fetch_binary.clone())),
            config.retry_table(),
            work_dir,
        ),
        extractors: ExtractorChain::with_defaults(config.classplus_token.as_deref()),
        rules: RuleTable::default(),
        documents: Arc::new(
            HttpDocumentClient::new().context("failed to build the HTTP client")?,
        ),
        audio: Arc::new(YtDlpAudioPipeline::new(fetch_binary, work_dir)),
        media: Arc::new(FfmpegToolchain::new(
            config
                .ffmpeg_binary
                .clone()
                .unwrap_or_else(|| DEFAULT_FFMPEG_BINARY.to_string()),
            config
                .ffprobe_binary
                .clone()
                .unwrap_or_else(|| DEFAULT_FFPROBE_BINARY.to_string()),
        )),
    };

    let mut settings = OrchestratorSettings::default();
    if let Some(ms) = config.inter_item_delay_ms {
        settings.inter_item_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = config.progress_interval_ms {
        settings.progress_interval = Duration::from_millis(ms);
    }
    if let Some(host) = &config.relay_host {
        settings.relay_host.clone_from(host);
    }
    if let Some(credit) = &config.default_credit {
        settings.default_credit.clone_from(credit);
    }
    let defaults = CookieSources::default();
    settings.cookies = CookieSources {
        instagram_env: config
            .instagram_cookies_env
            .clone()
            .unwrap_or(defaults.instagram_env),
        youtube_env: config
            .youtube_cookies_env
            .clone()
            .unwrap_or(defaults.youtube_env),
    };

    Ok(BatchOrchestrator::new(collaborators, settings))
}
