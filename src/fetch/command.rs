//! Fetch command construction and format selection.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Flags that let the engine pull stream segments in parallel.
pub const ACCELERATION_ARGS: [&str; 8] = [
    "-R",
    "25",
    "--fragment-retries",
    "25",
    "--external-downloader",
    "aria2c",
    "--downloader-args",
    "aria2c: -x 16 -j 32",
];

/// Selector used for YouTube sources, which are always fetched at up to 1080p mp4.
pub const YOUTUBE_FORMAT: &str =
    "b[height<=1080][ext=mp4]/bv[height<=1080][ext=mp4]+ba[ext=m4a]/b[ext=mp4]";

/// Selector used when the batch did not ask for a specific resolution.
pub const UNCONSTRAINED_FORMAT: &str = "b/bv+ba";

/// Builds the format selector for a source URL and requested height.
///
/// YouTube sources ignore the requested height.
#[must_use]
pub fn format_selector(url: &str, height: Option<u32>) -> String {
    if url.contains("youtu") {
        return YOUTUBE_FORMAT.to_string();
    }
    match height {
        Some(h) => format!("b[height<={h}]/bv[height<={h}]+ba/b/bv+ba"),
        None => UNCONSTRAINED_FORMAT.to_string(),
    }
}

/// One invocation of the fetch engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCommand {
    /// Source URL, already resolved.
    pub url: String,
    /// Output file name, relative to the working directory.
    pub output: PathBuf,
    /// Format selector, if any.
    pub format: Option<String>,
    /// Netscape cookie file handed to the engine.
    pub cookie_file: Option<PathBuf>,
    /// Additional engine arguments.
    pub extra_args: Vec<String>,
}

impl FetchCommand {
    /// Creates a command with no format, cookies, or extra flags.
    #[must_use]
    pub fn new(url: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            output: output.into(),
            format: None,
            cookie_file: None,
            extra_args: Vec::new(),
        }
    }

    /// Sets the format selector.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Sets the cookie file, if there is one.
    #[must_use]
    pub fn with_cookie_file(mut self, cookie_file: Option<&Path>) -> Self {
        self.cookie_file = cookie_file.map(Path::to_path_buf);
        self
    }

    /// Adds the parallel segment fetching flags.
    #[must_use]
    pub fn accelerated(mut self) -> Self {
        self.extra_args
            .extend(ACCELERATION_ARGS.iter().map(ToString::to_string));
        self
    }

    /// Returns the engine arguments in invocation order.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(8 + self.extra_args.len());
        if let Some(format) = &self.format {
            args.push("-f".to_string());
            args.push(format.clone());
        }
        args.push(self.url.clone());
        args.push("-o".to_string());
        args.push(self.output.to_string_lossy().into_owned());
        if let Some(cookie_file) = &self.cookie_file {
            args.push("--cookies".to_string());
            args.push(cookie_file.to_string_lossy().into_owned());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Renders the command line for logs and platform classification.
    #[must_use]
    pub fn display_line(&self, program: &str) -> String {
        let mut line = program.to_string();
        for arg in self.args() {
            if arg.contains(' ') {
                let _ = write!(line, " \"{arg}\"");
            } else {
                let _ = write!(line, " {arg}");
            }
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_selector_constrained_height() {
        assert_eq!(
            format_selector("https://cdn.test/v.m3u8", Some(480)),
            "b[height<=480]/bv[height<=480]+ba/b/bv+ba"
        );
    }

    #[test]
    fn test_format_selector_unconstrained() {
        assert_eq!(format_selector("https://cdn.test/v.m3u8", None), "b/bv+ba");
    }

    #[test]
    fn test_format_selector_youtube_ignores_height() {
        assert_eq!(format_selector("https://youtu.be/abc", Some(144)), YOUTUBE_FORMAT);
        assert_eq!(
            format_selector("https://www.youtube.com/watch?v=abc", None),
            YOUTUBE_FORMAT
        );
    }

    #[test]
    fn test_args_order_with_everything() {
        let cmd = FetchCommand::new("https://cdn.test/v.m3u8", "001) v.mp4")
            .with_format("b/bv+ba")
            .with_cookie_file(Some(Path::new("/tmp/c.txt")))
            .accelerated();
        let args = cmd.args();
        assert_eq!(
            &args[..7],
            &[
                "-f",
                "b/bv+ba",
                "https://cdn.test/v.m3u8",
                "-o",
                "001) v.mp4",
                "--cookies",
                "/tmp/c.txt"
            ]
        );
        assert_eq!(args.len(), 7 + ACCELERATION_ARGS.len());
        assert_eq!(args.last().map(String::as_str), Some("aria2c: -x 16 -j 32"));
    }

    #[test]
    fn test_args_minimal() {
        let cmd = FetchCommand::new("https://x.test/a", "a.mp4");
        assert_eq!(cmd.args(), vec!["https://x.test/a", "-o", "a.mp4"]);
    }

    #[test]
    fn test_display_line_quotes_arguments_with_spaces() {
        let cmd = FetchCommand::new("https://x.test/a", "001) a.mp4");
        assert_eq!(
            cmd.display_line("yt-dlp"),
            "yt-dlp https://x.test/a -o \"001) a.mp4\""
        );
    }
}
