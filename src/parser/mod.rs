//! URL list parsing.
//!
//! A URL list is plain text with one URL per line. Lines are trimmed and
//! blank lines are ignored; there is no escaping and no comment syntax, so
//! every non-blank line becomes exactly one item, in file order.
//!
//! # Example
//!
//! ```
//! use mediabatch_core::parser::parse_url_list;
//!
//! let links = parse_url_list("https://a.example/1.mp4\n\n  https://b.example/2.pdf  \n");
//! assert_eq!(links, vec!["https://a.example/1.mp4", "https://b.example/2.pdf"]);
//! ```

mod error;

pub use error::ParseError;

use std::path::Path;

use tracing::{debug, instrument};

/// Splits URL list text into its non-blank, trimmed lines.
#[must_use]
pub fn parse_url_list(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Reads a URL list file from disk and parses it.
///
/// # Errors
///
/// Returns [`ParseError::Read`] if the file cannot be read as UTF-8 text.
#[instrument(fields(path = %path.display()))]
pub fn load_url_list(path: &Path) -> Result<Vec<String>, ParseError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ParseError::read(path, e))?;
    let links = parse_url_list(&raw);
    debug!(links = links.len(), "parsed URL list");
    Ok(links)
}
