//! # Institutional Site Crawler
//!
//! This module harvests pages from an institution's website and turns each one
//! into a [`CrawledDocument`], the intermediate artifact consumed by the
//! indexing job. It is the first stage of the retrieval pipeline.
//!
//! ## Key Components
//!
//! - `normalize`: URL canonicalization, same-origin checks and relative resolution
//! - `content_extraction`: main-content detection and plain-text/metadata extraction
//! - `Crawler`: depth-bounded, same-origin traversal driven by an explicit worklist
//! - `Storage`: one JSON artifact per crawled page
//!
//! ## Features
//!
//! - Canonical link preference and redirect-aware deduplication
//! - Header/footer pruning before main-content detection
//! - Per-branch failure isolation: a dead link never stops the crawl
//! - Bounded fetch timeout and browser-like user agent

mod config;
mod content_extraction;
mod error;
pub mod normalize;
mod site_crawler;
pub mod storage;

pub use config::CrawlerConfig;
pub use content_extraction::{ExtractedPage, MainContent, extract_page};
pub use error::CrawlError;
pub use site_crawler::{CrawlReport, CrawlState, Crawler};
pub use storage::{Storage, StorageConfig, StorageError};

use serde::{Deserialize, Serialize};

/// Whether a document belongs to a specific institution or is shared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    /// Institution-specific page
    School,
    /// Page visible to every institution
    General,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::School => "school",
            DocumentType::General => "general",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "school" => Some(DocumentType::School),
            "general" => Some(DocumentType::General),
            _ => None,
        }
    }
}

/// A `<meta name=.. content=..>` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaTag {
    pub name: String,
    pub content: Option<String>,
}

/// An image found in the main content region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Absolute URL of the image
    pub src: String,

    /// Alternative text, if any
    pub alt: Option<String>,
}

/// A crawled page, as written to the documents directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawledDocument {
    /// Canonical URL of the page
    pub url: String,

    /// Contents of the `<title>` element
    pub title: String,

    /// Document type; the store re-derives it from the institution registry
    #[serde(rename = "type")]
    pub doc_type: DocumentType,

    /// Named meta tags, in document order
    pub metadata: Vec<MetaTag>,

    /// Images from the main content region
    pub image_metadata: Vec<ImageMetadata>,

    /// Plain text of the main content region
    pub content: String,
}
