//! Shared HTTP client construction policy.
//!
//! Document downloads and stream-page extraction both talk to sites that
//! reject obvious bots, so every client sends a browser User-Agent and uses
//! the same timeout defaults.

use std::time::Duration;

use reqwest::Client;

/// Desktop browser User-Agent sent with document downloads.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Mobile browser User-Agent expected by some stream pages.
pub const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 12; RMX2121) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/107.0.0.0 Mobile Safari/537.36";

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large documents).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Builds a client with the given User-Agent and timeouts.
///
/// # Errors
///
/// Returns the underlying [`reqwest::Error`] if the TLS backend or system
/// proxy configuration cannot be initialized.
pub fn build_http_client(
    user_agent: &str,
    connect_timeout_secs: u64,
    read_timeout_secs: u64,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .timeout(Duration::from_secs(read_timeout_secs))
        .gzip(true)
        .cookie_store(true)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agents_look_like_browsers() {
        assert!(BROWSER_USER_AGENT.starts_with("Mozilla/5.0"));
        assert!(MOBILE_USER_AGENT.contains("Mobile Safari"));
    }

    #[test]
    fn test_build_http_client_with_defaults_succeeds() {
        assert!(build_http_client(BROWSER_USER_AGENT, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS).is_ok());
    }
}
