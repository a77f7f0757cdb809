//! Challenge-tolerant document downloads.
//!
//! Document hosts commonly sit behind bot filters, so requests carry a browser
//! User-Agent and keep cookies across redirects. The body is streamed straight
//! to disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};

use crate::http::{BROWSER_USER_AGENT, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS, build_http_client};

/// Errors that can occur while downloading a document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The server answered with a non-success status.
    #[error("failed to download document: HTTP {status}")]
    Status {
        /// The HTTP status code.
        status: u16,
    },

    /// Network-level error (DNS, connection refused, TLS, body stream).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Writing the document to disk failed.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl DocumentError {
    /// Creates a network error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Downloads a URL to a local file.
#[async_trait]
pub trait DocumentClient: Send + Sync {
    /// Downloads `url` into `dest`, returning the number of bytes written.
    ///
    /// A non-success status must not leave a file behind.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, DocumentError>;
}

/// Encodes spaces, which document links frequently carry unescaped.
#[must_use]
pub fn normalize_document_url(url: &str) -> String {
    url.trim().replace(' ', "%20")
}

/// [`DocumentClient`] over reqwest with a browser User-Agent.
#[derive(Debug, Clone)]
pub struct HttpDocumentClient {
    client: Client,
}

impl HttpDocumentClient {
    /// Creates a client with the default timeouts.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`reqwest::Error`] if the client cannot be built.
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(BROWSER_USER_AGENT, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)?,
        })
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DocumentClient for HttpDocumentClient {
    #[instrument(skip(self), fields(dest = %dest.display()))]
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, DocumentError> {
        let url = normalize_document_url(url);
        debug!(%url, "requesting document");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DocumentError::network(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DocumentError::Status {
                status: status.as_u16(),
            });
        }

        let file = File::create(dest)
            .await
            .map_err(|e| DocumentError::io(dest, e))?;
        match stream_to_file(file, response, &url, dest).await {
            Ok(bytes) => {
                info!(bytes, "document downloaded");
                Ok(bytes)
            }
            Err(error) => {
                crate::lifecycle::remove_quietly(dest).await;
                Err(error)
            }
        }
    }
}

async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    dest: &Path,
) -> Result<u64, DocumentError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DocumentError::network(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DocumentError::io(dest, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DocumentError::io(dest, e))?;
    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn test_normalize_document_url_encodes_spaces() {
        assert_eq!(
            normalize_document_url(" https://cdn.test/notes/Chapter 1 Notes.pdf "),
            "https://cdn.test/notes/Chapter%201%20Notes.pdf"
        );
    }

    #[tokio::test]
    async fn test_download_writes_body_and_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/notes/Chapter%201.pdf"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7 body".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("001) Chapter 1.pdf");
        let client = HttpDocumentClient::new().unwrap();

        let bytes = client
            .download(&format!("{}/notes/Chapter 1.pdf", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(bytes, 13);
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.7 body");
    }

    #[tokio::test]
    async fn test_non_success_status_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("doc.pdf");
        let client = HttpDocumentClient::new().unwrap();

        let result = client
            .download(&format!("{}/doc.pdf", server.uri()), &dest)
            .await;

        assert!(matches!(result, Err(DocumentError::Status { status: 403 })));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_connection_failure_is_network_error() {
        let dir = tempfile::tempdir().unwrap();
        let client = HttpDocumentClient::new().unwrap();
        let result = client
            .download("http://127.0.0.1:9/doc.pdf", &dir.path().join("d.pdf"))
            .await;
        assert!(matches!(result, Err(DocumentError::Network { .. })));
    }
}
