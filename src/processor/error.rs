//! Error types for the processor module

use crate::crawler::StorageError;
use crate::error::Error as CrateError;
use crate::index::DbError;
use thiserror::Error;

/// Error type for processor operations
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Artifact could not be listed, read or validated
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Document store error
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Embedding generation error
    #[error("Embedding generation error: {0}")]
    EmbeddingGeneration(String),

    /// LLM error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Error during semaphore acquisition
    #[error("Semaphore acquisition error: {0}")]
    Semaphore(String),

    /// Error during task joining
    #[error("Task join error: {0}")]
    TaskJoin(String),
}

impl From<ProcessError> for CrateError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Database(e) => e.into(),
            ProcessError::Storage(e) => e.into(),
            _ => CrateError::Process(err.to_string()),
        }
    }
}

impl From<tokio::sync::AcquireError> for ProcessError {
    fn from(err: tokio::sync::AcquireError) -> Self {
        Self::Semaphore(format!("Failed to acquire semaphore: {}", err))
    }
}

impl From<tokio::task::JoinError> for ProcessError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(format!("Failed to join task: {}", err))
    }
}
