//! Stream-page extraction for providers that need a network round trip.
//!
//! Unlike the pure [`RuleTable`](super::RuleTable), these extractors fetch a
//! page or a signing endpoint before the fetch engine can be pointed at a
//! stream. A failed extraction is a per-item error: the item is counted as
//! failed and the batch moves on.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::error::FetchError;
use crate::http::{MOBILE_USER_AGENT, build_http_client};

/// Default classplus signing endpoint.
pub const CLASSPLUS_SIGNING_ENDPOINT: &str =
    "https://api.classplusapp.com/cams/uploader/video/jw-signed-url";

const EXTRACT_CONNECT_TIMEOUT_SECS: u64 = 10;
const EXTRACT_READ_TIMEOUT_SECS: u64 = 30;

/// First quoted https URL containing `playlist.m3u8`.
#[allow(clippy::expect_used)]
static PLAYLIST_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(https://.*?playlist\.m3u8.*?)""#).expect("playlist regex is valid") // Static pattern, safe to panic
});

/// A provider-specific extractor that turns a page URL into a stream URL.
///
/// Uses `async_trait` so extractors can be stored as `Box<dyn StreamExtractor>`.
#[async_trait]
pub trait StreamExtractor: Send + Sync {
    /// Returns the extractor's name, used in logs.
    fn name(&self) -> &'static str;

    /// Returns true if this extractor handles the URL.
    fn can_handle(&self, url: &str) -> bool;

    /// Fetches whatever is needed and returns the stream URL.
    async fn extract(&self, url: &str) -> Result<String, FetchError>;
}

/// Ordered extractors; the first one that handles a URL is used.
#[derive(Default)]
pub struct ExtractorChain {
    extractors: Vec<Box<dyn StreamExtractor>>,
}

impl ExtractorChain {
    /// Creates an empty chain that passes every URL through.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the default chain: visionias pages, then classplus when a token is configured.
    #[must_use]
    pub fn with_defaults(classplus_token: Option<&str>) -> Self {
        let mut chain = Self::new();
        match VisionIasExtractor::new() {
            Ok(extractor) => chain.register(Box::new(extractor)),
            Err(error) => warn!(error = %error, "visionias extractor unavailable"),
        }
        if let Some(token) = classplus_token {
            match ClassplusExtractor::new(CLASSPLUS_SIGNING_ENDPOINT, token) {
                Ok(extractor) => chain.register(Box::new(extractor)),
                Err(error) => warn!(error = %error, "classplus extractor unavailable"),
            }
        }
        chain
    }

    /// Appends an extractor.
    pub fn register(&mut self, extractor: Box<dyn StreamExtractor>) {
        debug!(name = extractor.name(), "registering stream extractor");
        self.extractors.push(extractor);
    }

    /// Returns the number of registered extractors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    /// Returns true if no extractors are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Extracts a stream URL, or returns the input when no extractor handles it.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Extraction`] when the handling extractor fails.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn extract(&self, url: &str) -> Result<String, FetchError> {
        match self.extractors.iter().find(|e| e.can_handle(url)) {
            Some(extractor) => {
                let stream = extractor.extract(url).await?;
                debug!(extractor = extractor.name(), stream = %stream, "extracted stream URL");
                Ok(stream)
            }
            None => Ok(url.to_string()),
        }
    }
}

/// Scrapes the playlist URL out of a visionias player page.
#[derive(Debug, Clone)]
pub struct VisionIasExtractor {
    client: Client,
}

impl VisionIasExtractor {
    /// Creates the extractor with a mobile browser client.
    ///
    /// # Errors
    ///
    /// Returns the client construction error.
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(
                MOBILE_USER_AGENT,
                EXTRACT_CONNECT_TIMEOUT_SECS,
                EXTRACT_READ_TIMEOUT_SECS,
            )?,
        })
    }
}

/// Returns the first quoted `playlist.m3u8` URL in a page body.
#[must_use]
pub fn find_playlist_url(body: &str) -> Option<String> {
    PLAYLIST_PATTERN
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[async_trait]
impl StreamExtractor for VisionIasExtractor {
    fn name(&self) -> &'static str {
        "visionias"
    }

    fn can_handle(&self, url: &str) -> bool {
        url.contains("visionias")
    }

    async fn extract(&self, url: &str) -> Result<String, FetchError> {
        let body = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::extraction(url, e.to_string()))?
            .text()
            .await
            .map_err(|e| FetchError::extraction(url, e.to_string()))?;

        find_playlist_url(&body)
            .ok_or_else(|| FetchError::extraction(url, "no playlist.m3u8 URL on page"))
    }
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    url: String,
}

/// Exchanges a classplus URL for a signed stream URL.
#[derive(Debug, Clone)]
pub struct ClassplusExtractor {
    client: Client,
    endpoint: String,
    access_token: String,
}

impl ClassplusExtractor {
    /// Creates the extractor for a signing endpoint and access token.
    ///
    /// # Errors
    ///
    /// Returns the client construction error.
    pub fn new(endpoint: impl Into<String>, access_token: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(
                MOBILE_USER_AGENT,
                EXTRACT_CONNECT_TIMEOUT_SECS,
                EXTRACT_READ_TIMEOUT_SECS,
            )?,
            endpoint: endpoint.into(),
            access_token: access_token.into(),
        })
    }
}

#[async_trait]
impl StreamExtractor for ClassplusExtractor {
    fn name(&self) -> &'static str {
        "classplus"
    }

    fn can_handle(&self, url: &str) -> bool {
        url.contains("classplusapp")
    }

    async fn extract(&self, url: &str) -> Result<String, FetchError> {
        let request_url = format!("{}?url={}", self.endpoint, urlencoding::encode(url));
        let response = self
            .client
            .get(&request_url)
            .header("x-access-token", &self.access_token)
            .send()
            .await
            .map_err(|e| FetchError::extraction(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::extraction(
                url,
                format!("signing endpoint returned HTTP {}", status.as_u16()),
            ));
        }

        let signed: SignedUrlResponse = response
            .json()
            .await
            .map_err(|e| FetchError::extraction(url, e.to_string()))?;
        Ok(signed.url)
    }
}
