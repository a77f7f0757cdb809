//! The built-in platform rule table.
//!
//! Predicates are plain substring checks and overlap, so declaration order
//! is significant: `workers.dev` proxies of CloudFront streams must be seen
//! before any broader rule could claim them.

use super::ResolveContext;

/// Host serving the re-transcoded onlineagriculture streams.
const AGRICULTURE_CDN: &str = "https://appx-transcoded-videos.akamai.net.in/videos/onlineagriculture-data";

/// Host serving the re-transcoded livelearn / englishjaisir streams.
const LIVELEARN_CDN: &str = "https://appx-transcoded-videos.livelearn.in/videos/englishjaisir-data";

/// A predicate/transform pair that canonicalizes one provider's URLs.
#[derive(Debug, Clone, Copy)]
pub struct PlatformRule {
    name: &'static str,
    predicate: fn(&str) -> bool,
    transform: fn(&str, &ResolveContext) -> Option<String>,
}

impl PlatformRule {
    /// Creates a rule from a predicate and a transform.
    #[must_use]
    pub const fn new(
        name: &'static str,
        predicate: fn(&str) -> bool,
        transform: fn(&str, &ResolveContext) -> Option<String>,
    ) -> Self {
        Self {
            name,
            predicate,
            transform,
        }
    }

    /// Returns the rule's name, used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true if the rule's predicate matches the URL.
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        (self.predicate)(url)
    }

    /// Applies the transform, returning `None` when extraction fails.
    #[must_use]
    pub fn apply(&self, url: &str, ctx: &ResolveContext) -> Option<String> {
        (self.transform)(url, ctx)
    }
}

/// Returns the built-in rules in evaluation order.
#[must_use]
pub fn default_rules() -> Vec<PlatformRule> {
    vec![
        PlatformRule::new("master_mpd", |url| url.contains("master.mpd"), master_mpd),
        PlatformRule::new(
            "workers_cloudfront",
            |url| url.contains("workers.dev") && url.contains("cloudfront.net/"),
            workers_cloudfront,
        ),
        PlatformRule::new(
            "onlineagriculture",
            |url| url.contains("onlineagriculture"),
            |url, ctx| transcoded_cdn(url, ctx, AGRICULTURE_CDN),
        ),
        PlatformRule::new(
            "livelearn",
            |url| url.contains("livelearn.in") || url.contains("englishjaisir"),
            |url, ctx| transcoded_cdn(url, ctx, LIVELEARN_CDN),
        ),
        PlatformRule::new("psitoffers", |url| url.contains("psitoffers.store"), psitoffers),
    ]
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

/// `…/{video_id}/master.mpd` → relay template.
fn master_mpd(url: &str, ctx: &ResolveContext) -> Option<String> {
    let mut segments = url.rsplit('/');
    segments.next()?;
    let video_id = non_empty(segments.next()?)?;
    Some(ctx.relay_url(video_id))
}

/// `…cloudfront.net/{video_id}/…` behind a workers.dev proxy → relay template.
fn workers_cloudfront(url: &str, ctx: &ResolveContext) -> Option<String> {
    let (_, after) = url.split_once("cloudfront.net/")?;
    let video_id = non_empty(after.split('/').next()?)?;
    Some(ctx.relay_url(video_id))
}

/// Last four segments `{video_id}/{hls}/{quality}/{master}` → CDN template at the batch quality.
fn transcoded_cdn(url: &str, ctx: &ResolveContext, cdn: &str) -> Option<String> {
    let segments: Vec<&str> = url.split('/').collect();
    if segments.len() < 4 {
        return None;
    }
    let tail = &segments[segments.len() - 4..];
    let (video_id, hls, master) = (tail[0], tail[1], tail[3]);
    Some(format!(
        "{cdn}/{video_id}/{hls}/{}p/{master}",
        ctx.quality_height
    ))
}

/// `…vid={video_id}&…` → relay template.
fn psitoffers(url: &str, ctx: &ResolveContext) -> Option<String> {
    let (_, after) = url.split_once("vid=")?;
    let video_id = non_empty(after.split('&').next()?)?;
    Some(ctx.relay_url(video_id))
}
