//! Error types for the crawler module

use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    /// HTTP client error (timeout, connection failure, too many redirects)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with something other than 200 OK
    #[error("Unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    /// Page has no `<title>` and is treated as non-HTML content
    #[error("No title found, not an HTML page: {0}")]
    NotHtml(String),

    /// HTML parsing error
    #[error("HTML parsing error: {0}")]
    HtmlParse(String),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Artifact storage error
    #[error("Storage error: {0}")]
    Storage(#[from] super::storage::StorageError),
}

impl From<CrawlError> for CrateError {
    fn from(err: CrawlError) -> Self {
        match err {
            CrawlError::Http(e) => CrateError::Http(e),
            _ => CrateError::Crawl(err.to_string()),
        }
    }
}

impl From<super::storage::StorageError> for CrateError {
    fn from(err: super::storage::StorageError) -> Self {
        CrateError::Storage(err.to_string())
    }
}
