//! Indexing job for the document store
//!
//! Each crawl artifact is summarized by the text-generation service, the
//! summary is embedded, and the document, summary and vector are written to
//! the store together. Documents are independent of each other, so they are
//! processed concurrently; only the check-then-insert against the store is
//! serialized.

mod config;
mod error;
mod llm_integration;

pub use config::{ProcessorConfig, ProcessorConfigBuilder};
pub use error::ProcessError;
pub use llm_integration::{generate_embedding, generate_summary, summary_preamble, truncate_content};

use crate::crawler::{CrawledDocument, Storage};
use crate::index::Database;
use crate::model::Client;
use futures::future;
use rig::{completion::CompletionModel, embeddings::EmbeddingModel};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore, mpsc};
use tracing::{debug, info, instrument, warn};

/// What happened to one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// Stored under the given document id
    Indexed(String),

    /// A document with the same URL is already stored
    AlreadyIndexed,

    /// The document has no content to summarize
    EmptyContent,
}

/// Progress event for one artifact
#[derive(Debug, Clone)]
pub struct IndexProgress {
    pub path: PathBuf,

    /// Outcome, or the error message if indexing failed
    pub result: Result<IndexOutcome, String>,
}

/// Totals for one indexing run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl IndexReport {
    fn record(&mut self, result: &Result<IndexOutcome, ProcessError>) {
        match result {
            Ok(IndexOutcome::Indexed(_)) => self.indexed += 1,
            Ok(_) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Summarizes, embeds and stores crawled documents
pub struct Indexer<C, E>
where
    C: CompletionModel,
    E: EmbeddingModel,
{
    client: Client<C, E>,
    db: Database,
    config: ProcessorConfig,
    write_lock: Arc<Mutex<()>>,
}

impl<C, E> Clone for Indexer<C, E>
where
    C: CompletionModel,
    E: EmbeddingModel,
{
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            db: self.db.clone(),
            config: self.config.clone(),
            write_lock: self.write_lock.clone(),
        }
    }
}

impl<C, E> Indexer<C, E>
where
    C: CompletionModel + 'static,
    E: EmbeddingModel + 'static,
{
    pub fn new(client: Client<C, E>, db: Database, config: ProcessorConfig) -> Self {
        Self {
            client,
            db,
            config,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Index a single document unless its URL is already stored
    ///
    /// Service failures leave the store untouched, so the document can be
    /// retried by a later run.
    #[instrument(skip(self, document), fields(url = %document.url))]
    pub async fn index_document(
        &self,
        document: &CrawledDocument,
    ) -> Result<IndexOutcome, ProcessError> {
        if document.content.trim().is_empty() {
            debug!("Skipping document without content");
            return Ok(IndexOutcome::EmptyContent);
        }
        if self.db.document_exists(&document.url).await? {
            debug!("Document already indexed");
            return Ok(IndexOutcome::AlreadyIndexed);
        }

        let summary = generate_summary(&self.client, &document.content, &self.config).await?;
        let embedding = generate_embedding(&self.client, &summary).await?;

        // Another worker may have stored the same URL while we were summarizing.
        let _guard = self.write_lock.lock().await;
        if self.db.document_exists(&document.url).await? {
            return Ok(IndexOutcome::AlreadyIndexed);
        }
        let indexed = self
            .db
            .index_document(document, &summary, &self.config.embedding_model, &embedding)
            .await?;

        info!("Indexed {}", document.url);
        Ok(IndexOutcome::Indexed(indexed.document.id))
    }

    /// Load one artifact and index it, pruning it afterwards if configured
    async fn index_artifact(
        &self,
        storage: &Storage,
        path: &Path,
    ) -> Result<IndexOutcome, ProcessError> {
        let document = storage.load(path).await?;
        let outcome = self.index_document(&document).await?;

        if self.config.prune_artifacts && outcome != IndexOutcome::EmptyContent {
            storage.remove(path).await?;
            debug!("Removed artifact {}", path.display());
        }
        Ok(outcome)
    }

    /// Index every artifact in `storage`
    ///
    /// Failures are counted per artifact and never stop the batch. Only a
    /// failure to list the directory is returned as an error.
    #[instrument(skip(self, storage, progress), fields(dir = %storage.base_path().display()))]
    pub async fn index_storage(
        &self,
        storage: &Storage,
        progress: Option<mpsc::Sender<IndexProgress>>,
    ) -> Result<IndexReport, ProcessError> {
        let paths = storage.list().await?;
        info!("Found {} artifacts to index", paths.len());

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks = Vec::with_capacity(paths.len());

        for path in paths {
            let permit = semaphore.clone().acquire_owned();
            let indexer = self.clone();
            let storage = storage.clone();
            let progress = progress.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = permit.await?;

                let result = indexer.index_artifact(&storage, &path).await;
                if let Err(e) = &result {
                    warn!("Failed to index {}: {}", path.display(), e);
                }

                // Ignore errors from sending (e.g., if receiver is dropped)
                if let Some(sender) = progress {
                    let event = IndexProgress {
                        path,
                        result: result.as_ref().map(Clone::clone).map_err(ToString::to_string),
                    };
                    let _ = sender.send(event).await;
                }

                Ok::<_, ProcessError>(result)
            }));
        }

        let mut report = IndexReport::default();
        for task in future::join_all(tasks).await {
            match task {
                Ok(Ok(result)) => report.record(&result),
                Ok(Err(e)) => {
                    warn!("Indexing task failed: {}", e);
                    report.failed += 1;
                }
                Err(e) => {
                    warn!("Indexing task panicked: {}", ProcessError::from(e));
                    report.failed += 1;
                }
            }
        }

        info!(
            "Indexed {}, skipped {}, failed {}",
            report.indexed, report.skipped, report.failed
        );
        Ok(report)
    }
}
