//! Transient resource handling.
//!
//! Per-item credentials live in temporary files that disappear when their
//! guard is dropped, and every other transient artifact is removed with
//! [`remove_quietly`]. Cleanup never fails an item: problems are logged and
//! swallowed.

use std::io::{self, Write as _};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, warn};
use url::Url;

/// Default environment variable holding Instagram cookies.
pub const DEFAULT_INSTAGRAM_COOKIES_ENV: &str = "INSTA_COOKIES";

/// Default environment variable holding YouTube cookies.
pub const DEFAULT_YOUTUBE_COOKIES_ENV: &str = "YT_COOKIES";

/// Environment variable names per cookie source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSources {
    /// Variable consulted for Instagram URLs.
    pub instagram_env: String,
    /// Variable consulted for YouTube URLs.
    pub youtube_env: String,
}

impl Default for CookieSources {
    fn default() -> Self {
        Self {
            instagram_env: DEFAULT_INSTAGRAM_COOKIES_ENV.to_string(),
            youtube_env: DEFAULT_YOUTUBE_COOKIES_ENV.to_string(),
        }
    }
}

impl CookieSources {
    /// Picks the environment variable for a URL by host, if any applies.
    #[must_use]
    pub fn env_for_url(&self, url: &str) -> Option<&str> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_ascii_lowercase();
        let is = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));

        if is("instagram.com") {
            Some(&self.instagram_env)
        } else if is("youtube.com") || is("youtu.be") {
            Some(&self.youtube_env)
        } else {
            None
        }
    }

    /// Materializes the cookie file for a URL from the environment.
    ///
    /// Returns `None` when no source applies or the variable is unset or empty.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the temporary file cannot be written.
    pub fn cookie_file_for(&self, url: &str) -> io::Result<Option<TempCookieFile>> {
        let Some(var) = self.env_for_url(url) else {
            return Ok(None);
        };
        match std::env::var(var) {
            Ok(contents) if !contents.trim().is_empty() => {
                debug!(env = var, "writing temporary cookie file");
                TempCookieFile::write(&contents).map(Some)
            }
            _ => {
                debug!(env = var, "cookie variable unset, fetching without cookies");
                Ok(None)
            }
        }
    }
}

/// A cookie file that is deleted when dropped.
#[derive(Debug)]
pub struct TempCookieFile {
    file: NamedTempFile,
}

impl TempCookieFile {
    /// Writes `contents` to a fresh temporary `.txt` file.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be created or written.
    pub fn write(contents: &str) -> io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("mediabatch-cookies-")
            .suffix(".txt")
            .tempfile()?;
        file.write_all(contents.as_bytes())?;
        file.flush()?;
        Ok(Self { file })
    }

    /// Location of the cookie file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Deletes a file if it exists, logging instead of failing.
pub async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed transient file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove transient file"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_env_for_url_by_host() {
        let sources = CookieSources::default();
        assert_eq!(
            sources.env_for_url("https://www.instagram.com/reel/abc/"),
            Some("INSTA_COOKIES")
        );
        assert_eq!(
            sources.env_for_url("https://youtu.be/dQw4w9WgXcQ"),
            Some("YT_COOKIES")
        );
        assert_eq!(
            sources.env_for_url("https://m.youtube.com/watch?v=x"),
            Some("YT_COOKIES")
        );
        assert_eq!(sources.env_for_url("https://notyoutube.com/v"), None);
        assert_eq!(sources.env_for_url("not a url"), None);
    }

    #[test]
    fn test_unset_variable_yields_no_file() {
        let sources = CookieSources {
            instagram_env: "MEDIABATCH_TEST_COOKIES_SURELY_UNSET".to_string(),
            youtube_env: "MEDIABATCH_TEST_COOKIES_SURELY_UNSET".to_string(),
        };
        assert!(
            sources
                .cookie_file_for("https://instagram.com/p/1")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_non_cookie_host_yields_no_file() {
        let sources = CookieSources::default();
        assert!(
            sources
                .cookie_file_for("https://cdn.example.com/v.m3u8")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_temp_cookie_file_removed_on_drop() {
        let cookie = TempCookieFile::write("# Netscape HTTP Cookie File\n").unwrap();
        let path = cookie.path().to_path_buf();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "# Netscape HTTP Cookie File\n"
        );
        assert!(path.extension().is_some_and(|e| e == "txt"));
        drop(cookie);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_remove_quietly_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.mp4");
        std::fs::write(&present, b"x").unwrap();

        remove_quietly(&present).await;
        remove_quietly(&dir.path().join("never-existed.jpg")).await;

        assert!(!present.exists());
    }
}
