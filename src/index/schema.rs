//! # Database Schema Module
//!
//! Three tables, each owned by the previous one:
//! 1. `documents` - crawled pages, looked up by `url`
//! 2. `summaries` - one generated summary per document
//! 3. `embeddings` - one vector per summary, tagged with the model that produced it
//!
//! URL uniqueness is not enforced here; the indexing job checks for an
//! existing document before inserting.

use crate::index::error::DbError;
use libsql::{Connection, params};

const STATEMENTS: [(&str, &str); 6] = [
    (
        "documents table",
        "CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            url TEXT NOT NULL,
            title TEXT NOT NULL,
            school_id INTEGER,
            type TEXT NOT NULL,
            metadata TEXT NOT NULL,
            image_metadata TEXT NOT NULL,
            content TEXT NOT NULL,
            indexed_at TEXT NOT NULL
        )",
    ),
    (
        "index on documents url",
        "CREATE INDEX IF NOT EXISTS idx_documents_url ON documents(url)",
    ),
    (
        "summaries table",
        "CREATE TABLE IF NOT EXISTS summaries (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            summary TEXT NOT NULL,
            FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
        )",
    ),
    (
        "index on summaries document_id",
        "CREATE INDEX IF NOT EXISTS idx_summaries_document_id ON summaries(document_id)",
    ),
    (
        "embeddings table",
        "CREATE TABLE IF NOT EXISTS embeddings (
            id TEXT PRIMARY KEY,
            summary_id TEXT NOT NULL,
            model TEXT NOT NULL,
            embedding BLOB NOT NULL,
            FOREIGN KEY (summary_id) REFERENCES summaries(id) ON DELETE CASCADE
        )",
    ),
    (
        "index on embeddings summary_id",
        "CREATE INDEX IF NOT EXISTS idx_embeddings_summary_id ON embeddings(summary_id)",
    ),
];

/// Initialize the database schema
pub async fn initialize_schema(conn: &Connection) -> Result<(), DbError> {
    for (what, sql) in STATEMENTS {
        conn.execute(sql, params![])
            .await
            .map_err(|e| DbError::Schema(format!("Failed to create {}: {}", what, e)))?;
    }
    Ok(())
}
