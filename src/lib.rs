//! # campus-rag - Content Acquisition and Semantic Retrieval for a Campus Assistant
//!
//! This crate harvests institutional web pages, distills each one into a short
//! summary with an embedding, and decides per conversation turn whether any of
//! that content is relevant enough to ground an assistant's reply.
//!
//! ## Features
//!
//! - Same-origin, depth-bounded site crawling with canonical-URL deduplication
//! - Main-content detection that ignores headers, footers and navigation
//! - Summaries and embeddings from rate-limited, time-bounded model services
//! - A local LibSQL document store partitioned by institution
//! - Two-stage retrieval: a cheap lexical gate, then embedding similarity
//! - Async API with Tokio
//!
//! ## Example
//!
//! ```rust,no_run
//! use campus_rag::assistant::{Assistant, ChatMessage};
//! use campus_rag::index::Database;
//! use campus_rag::model::Client;
//! use campus_rag::search::{SearchEngine, SearchOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new_openai_from_env()?;
//!     let db = Database::new_from_path("index.db").await?;
//!
//!     let engine = SearchEngine::load(&db, client.embedding().clone(), SearchOptions::default()).await?;
//!     let assistant = Assistant::new(client.completion().clone(), engine);
//!
//!     let reply = assistant
//!         .reply(&[ChatMessage::user("When is the admissions deadline?")], Some(1))
//!         .await?;
//!
//!     println!("{}", reply.message);
//!     Ok(())
//! }
//! ```

mod error;
pub mod model;

// Retrieval pipeline modules
pub mod assistant;
pub mod crawler;
pub mod index;
pub mod processor;
pub mod search;

pub use error::Error;

/// Re-export of types module for public use
pub mod prelude {
    pub use crate::error::Error;
    pub use crate::error::Result;
}
