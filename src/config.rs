//! File configuration for batch defaults.
//!
//! The file is a flat `key = value` list with `#` comments and double-quoted
//! strings. Per-platform retry overrides use dotted keys such as
//! `retry.cloudfront.max_retries`.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::fetch::{PlatformTag, RetryRule, RetryTable};

/// Retry overrides for one platform tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryOverride {
    /// Replacement retry threshold.
    pub max_retries: Option<u32>,
    /// Replacement backoff in milliseconds.
    pub backoff_ms: Option<u64>,
}

/// Values loaded from the config file. Every field is optional.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    /// Directory the fetch engine writes into.
    pub work_dir: Option<PathBuf>,
    /// Directory delivered artifacts are copied to.
    pub output_dir: Option<PathBuf>,
    /// Pause between items in milliseconds.
    pub inter_item_delay_ms: Option<u64>,
    /// Minimum time between progress edits in milliseconds.
    pub progress_interval_ms: Option<u64>,
    /// Host of the stream relay.
    pub relay_host: Option<String>,
    /// Credit used when the batch asks for the default.
    pub default_credit: Option<String>,
    /// Fetch engine executable.
    pub fetch_binary: Option<String>,
    /// ffmpeg executable.
    pub ffmpeg_binary: Option<String>,
    /// ffprobe executable.
    pub ffprobe_binary: Option<String>,
    /// Environment variable with Instagram cookies.
    pub instagram_cookies_env: Option<String>,
    /// Environment variable with YouTube cookies.
    pub youtube_cookies_env: Option<String>,
    /// Access token for the classplus signing endpoint.
    pub classplus_token: Option<String>,
    /// Per-platform retry overrides.
    pub retry: HashMap<PlatformTag, RetryOverride>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        validate_range("inter_item_delay_ms", self.inter_item_delay_ms, 0, 60_000)?;
        validate_range("progress_interval_ms", self.progress_interval_ms, 100, 600_000)?;

        for (field, value) in [
            ("relay_host", &self.relay_host),
            ("fetch_binary", &self.fetch_binary),
            ("ffmpeg_binary", &self.ffmpeg_binary),
            ("ffprobe_binary", &self.ffprobe_binary),
            ("instagram_cookies_env", &self.instagram_cookies_env),
            ("youtube_cookies_env", &self.youtube_cookies_env),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                bail!("Invalid config value for `{field}`: must not be empty");
            }
        }
        if let Some(host) = &self.relay_host
            && (host.contains('/') || host.contains(' '))
        {
            bail!("Invalid config value for `relay_host`: '{host}'. Expected a bare host name");
        }

        for (tag, overrides) in &self.retry {
            validate_range(
                &format!("retry.{tag}.max_retries"),
                overrides.max_retries.map(u64::from),
                0,
                100,
            )?;
            validate_range(
                &format!("retry.{tag}.backoff_ms"),
                overrides.backoff_ms,
                0,
                600_000,
            )?;
        }
        Ok(())
    }

    /// Applies the retry overrides on top of `table`.
    pub fn apply_retry_overrides(&self, table: &mut RetryTable) {
        for (tag, overrides) in &self.retry {
            let base = table
                .rule(*tag)
                .unwrap_or(RetryRule::new(0, Duration::ZERO));
            let rule = RetryRule::new(
                overrides.max_retries.unwrap_or(base.max_retries),
                overrides
                    .backoff_ms
                    .map_or(base.backoff, Duration::from_millis),
            );
            table.set(*tag, rule);
        }
    }

    /// Returns the default retry table with this file's overrides applied.
    #[must_use]
    pub fn retry_table(&self) -> RetryTable {
        let mut table = RetryTable::default();
        self.apply_retry_overrides(&mut table);
        table
    }
}

fn validate_range(field: &str, value: Option<u64>, min: u64, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Path that was consulted, if any.
    pub path: Option<PathBuf>,
    /// Parsed config, or defaults when no file was present.
    pub config: FileConfig,
    /// Whether a file was actually read.
    pub loaded_from_file: bool,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/mediabatch/config.toml`
/// 2. `$HOME/.config/mediabatch/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("mediabatch")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("mediabatch")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads an explicitly named config file, or the default one if present.
///
/// An explicit path must exist; a missing default file yields defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config,
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_file_config(path_ref)?;
            Ok(LoadedConfig {
                path,
                config,
                loaded_from_file: true,
            })
        }
        _ => Ok(LoadedConfig {
            path,
            config: FileConfig::default(),
            loaded_from_file: false,
        }),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// Parses config text.
pub fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let line_no = line_index + 1;
        let string = || {
            parse_string_literal(value)
                .with_context(|| format!("Invalid `{key}` value on line {line_no}"))
        };
        let integer = || {
            parse_integer_u64(value)
                .with_context(|| format!("Invalid `{key}` value on line {line_no}"))
        };

        match key {
            "work_dir" => cfg.work_dir = Some(PathBuf::from(string()?)),
            "output_dir" => cfg.output_dir = Some(PathBuf::from(string()?)),
            "inter_item_delay_ms" => cfg.inter_item_delay_ms = Some(integer()?),
            "progress_interval_ms" => cfg.progress_interval_ms = Some(integer()?),
            "relay_host" => cfg.relay_host = Some(string()?),
            "default_credit" => cfg.default_credit = Some(string()?),
            "fetch_binary" => cfg.fetch_binary = Some(string()?),
            "ffmpeg_binary" => cfg.ffmpeg_binary = Some(string()?),
            "ffprobe_binary" => cfg.ffprobe_binary = Some(string()?),
            "instagram_cookies_env" => cfg.instagram_cookies_env = Some(string()?),
            "youtube_cookies_env" => cfg.youtube_cookies_env = Some(string()?),
            "classplus_token" => cfg.classplus_token = Some(string()?),
            dotted if dotted.starts_with("retry.") => {
                let (tag, field) = parse_retry_key(dotted).with_context(|| {
                    format!("Unknown configuration key: '{dotted}' on line {line_no}")
                })?;
                let entry = cfg.retry.entry(tag).or_default();
                match field {
                    RetryField::MaxRetries => {
                        let parsed = integer()?;
                        let n = u32::try_from(parsed).map_err(|_| {
                            anyhow::anyhow!("{dotted} out of range for u32")
                        })?;
                        entry.max_retries = Some(n);
                    }
                    RetryField::BackoffMs => entry.backoff_ms = Some(integer()?),
                }
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

enum RetryField {
    MaxRetries,
    BackoffMs,
}

fn parse_retry_key(key: &str) -> Result<(PlatformTag, RetryField)> {
    let mut parts = key.splitn(3, '.');
    let (Some("retry"), Some(tag), Some(field)) = (parts.next(), parts.next(), parts.next()) else {
        bail!("Expected retry.<platform>.<field>");
    };
    let tag = tag.parse::<PlatformTag>().map_err(|e| anyhow::anyhow!(e))?;
    let field = match field {
        "max_retries" => RetryField::MaxRetries,
        "backoff_ms" => RetryField::BackoffMs,
        other => bail!("Unknown retry field '{other}'"),
    };
    Ok((tag, field))
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}
