//! URL resolution for provider-specific stream URLs.
//!
//! Some hosting providers hand out URLs that the fetch engine cannot use
//! directly. The [`RuleTable`] maps those URLs to a canonical fetchable URL
//! using an ordered list of [`PlatformRule`]s: the first rule whose predicate
//! matches is applied and the remaining rules are not evaluated. Resolution
//! never fails; when no rule matches, or the matched rule cannot extract what
//! it needs, the input URL comes back unchanged.
//!
//! Pages that need a network round trip before they yield a stream URL are
//! handled separately by the [`StreamExtractor`] chain in [`extract`].
//!
//! # Example
//!
//! ```
//! use mediabatch_core::resolver::resolve;
//!
//! let url = "https://d1d34p8vz63oiq.cloudfront.net/6f0a9c2e/master.mpd";
//! assert_eq!(
//!     resolve(url, "tok"),
//!     "https://madxapi-d0cbf6ac738c.herokuapp.com/6f0a9c2e/master.m3u8?token=tok"
//! );
//! assert_eq!(resolve("https://example.com/a.mp4", "tok"), "https://example.com/a.mp4");
//! ```

pub mod extract;
mod rules;

pub use extract::{ClassplusExtractor, ExtractorChain, StreamExtractor, VisionIasExtractor};
pub use rules::{PlatformRule, default_rules};

use tracing::{debug, instrument};

/// Relay host used for tokenized stream URLs.
pub const DEFAULT_RELAY_HOST: &str = "madxapi-d0cbf6ac738c.herokuapp.com";

/// Quality segment used by CDN templates when the batch has no resolution.
pub const DEFAULT_QUALITY_HEIGHT: u32 = 720;

/// Token substituted when the batch has no access token.
pub const UNKNOWN_TOKEN: &str = "unknown";

/// Inputs a platform rule may template into its result besides the URL.
#[derive(Debug, Clone)]
pub struct ResolveContext {
    /// Access token for relay templates.
    pub token: String,
    /// Target video height for CDN quality segments.
    pub quality_height: u32,
    /// Relay host for tokenized stream URLs.
    pub relay_host: String,
}

impl ResolveContext {
    /// Creates a context with the given token and default quality and relay host.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            token: if token.trim().is_empty() {
                UNKNOWN_TOKEN.to_string()
            } else {
                token
            },
            quality_height: DEFAULT_QUALITY_HEIGHT,
            relay_host: DEFAULT_RELAY_HOST.to_string(),
        }
    }

    /// Sets the quality height, keeping the default when `None`.
    #[must_use]
    pub fn with_quality(mut self, height: Option<u32>) -> Self {
        if let Some(height) = height {
            self.quality_height = height;
        }
        self
    }

    /// Overrides the relay host.
    #[must_use]
    pub fn with_relay_host(mut self, relay_host: impl Into<String>) -> Self {
        self.relay_host = relay_host.into();
        self
    }

    /// Renders the relay template for a video id.
    pub(crate) fn relay_url(&self, video_id: &str) -> String {
        format!(
            "https://{}/{video_id}/master.m3u8?token={}",
            self.relay_host, self.token
        )
    }
}

impl Default for ResolveContext {
    fn default() -> Self {
        Self::new(UNKNOWN_TOKEN)
    }
}

/// An ordered, first-match-wins collection of platform rules.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<PlatformRule>,
}

impl RuleTable {
    /// Creates a table from rules in evaluation order.
    #[must_use]
    pub fn new(rules: Vec<PlatformRule>) -> Self {
        Self { rules }
    }

    /// Returns the rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[PlatformRule] {
        &self.rules
    }

    /// Returns the first rule whose predicate matches the URL.
    #[must_use]
    pub fn find(&self, url: &str) -> Option<&PlatformRule> {
        self.rules.iter().find(|rule| rule.matches(url))
    }

    /// Resolves a URL to its canonical fetchable form.
    ///
    /// Returns the input unchanged when no rule matches or the matching rule
    /// cannot extract its segments.
    #[must_use]
    #[instrument(skip(self, ctx), fields(url = %url))]
    pub fn resolve(&self, url: &str, ctx: &ResolveContext) -> String {
        let Some(rule) = self.find(url) else {
            return url.to_string();
        };

        match rule.apply(url, ctx) {
            Some(resolved) => {
                debug!(rule = rule.name(), resolved = %resolved, "resolved URL");
                resolved
            }
            None => {
                debug!(rule = rule.name(), "rule matched but extraction failed; keeping URL");
                url.to_string()
            }
        }
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

/// Resolves a URL with the default rule table, default quality, and relay host.
#[must_use]
pub fn resolve(url: &str, token: &str) -> String {
    RuleTable::default().resolve(url, &ResolveContext::new(token))
}
