//! Error types for the campus-rag crate

use thiserror::Error;

/// Result type for campus-rag operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for campus-rag operations
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Web crawling error
    #[error("Crawl error: {0}")]
    Crawl(String),

    /// Crawl artifact storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Indexing (summarize/embed) error
    #[error("Process error: {0}")]
    Process(String),

    /// Document store error
    #[error("Database error: {0}")]
    Database(String),

    /// Search error
    #[error("Search error: {0}")]
    Search(String),

    /// Reply generation error
    #[error("Assistant error: {0}")]
    Assistant(String),

    /// Missing credentials or other setup errors
    #[error("{0}")]
    Other(String),
}
