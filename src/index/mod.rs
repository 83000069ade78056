//! Document store module
//!
//! This module persists crawled documents together with their generated
//! summaries and embedding vectors, and hydrates them back into the read
//! model used by the search engine.

mod database;
pub mod error;
pub mod registry;
mod schema;

pub use database::Database;
pub use error::DbError;
pub use registry::{Institution, InstitutionRegistry};

use crate::crawler::{DocumentType, ImageMetadata, MetaTag};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    /// Generated unique identifier
    pub id: String,

    /// Canonical URL
    pub url: String,

    /// Page title
    pub title: String,

    /// Owning institution, if the URL matched a registered prefix
    pub school_id: Option<i64>,

    /// `school` when `school_id` is set, `general` otherwise
    #[serde(rename = "type")]
    pub doc_type: DocumentType,

    /// Named meta tags
    pub metadata: Vec<MetaTag>,

    /// Images from the main content
    pub image_metadata: Vec<ImageMetadata>,

    /// Plain text of the main content
    pub content: String,

    /// When the document was inserted
    pub indexed_at: DateTime<Utc>,
}

/// A summary owned by one document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub id: String,
    pub document_id: String,
    pub summary: String,
}

/// An embedding owned by one summary
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEmbedding {
    pub id: String,
    pub summary_id: String,

    /// Identifier of the model that produced the vector
    pub model: String,

    pub vector: Vec<f64>,
}

/// Document joined with its summary and embedding
///
/// Only documents that have both a summary and an embedding are ever
/// hydrated into this view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedDocument {
    #[serde(flatten)]
    pub document: Document,

    pub summary: String,

    #[serde(skip)]
    pub model: String,

    #[serde(skip)]
    pub embedding: Vec<f64>,
}
