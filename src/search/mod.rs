//! # Search Module
//!
//! Holds the indexed corpus in memory and answers two questions per query:
//! is anything in the corpus plausibly relevant, and if so, which documents
//! are closest in embedding space.
//!
//! ## Key Components
//!
//! - `SearchEngine`: read-only corpus plus the embedding model used for queries
//! - `SearchOptions`: thresholds and result limit
//! - `SearchDocument`: a document paired with its similarity score
//!
//! ## Search Process
//!
//! 1. Compare the query's word frequencies with every eligible summary (cheap, local)
//! 2. If the best match clears the lexical threshold, embed the query texts
//! 3. Score eligible documents by cosine similarity to each query vector
//! 4. Keep scores above the similarity threshold, sorted highest first
//!
//! The corpus is immutable after loading, so concurrent queries need no locking.

mod engine;
mod error;
pub mod lexical;
pub mod similarity;

pub use engine::{SearchDocument, SearchEngine, SearchOptions};
pub use error::SearchError;
