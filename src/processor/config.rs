//! # Processor Configuration Module
//!
//! Configuration for the indexing job: how many documents are summarized and
//! embedded at once, how long summaries should be, how much page text fits
//! in the summarization prompt, and which models are used.

use std::time::Duration;

use crate::model::{DEFAULT_COMPLETION_MODEL, DEFAULT_EMBEDDING_MODEL};

/// Configuration for the processor
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Documents processed concurrently
    pub concurrency: usize,

    /// Target summary length in words
    pub summary_words: usize,

    /// Context window of the summarization model, in tokens
    pub context_window: usize,

    /// Tokens per word, as a ratio `(tokens, words)`
    pub tokens_per_word: (usize, usize),

    /// Model used to summarize
    pub completion_model: String,

    /// Model used to embed; recorded next to every stored vector
    pub embedding_model: String,

    /// Timeout applied to each external call, in seconds
    pub timeout_secs: u64,

    /// Delete each artifact once its document is in the store
    pub prune_artifacts: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            summary_words: 100,
            context_window: 4097,
            tokens_per_word: (100, 75),
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            timeout_secs: 60,
            prune_artifacts: false,
        }
    }
}

/// Builder for ProcessorConfig
#[derive(Debug, Default)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: ProcessorConfig::default(),
        }
    }

    /// Set the number of concurrent workers (at least one)
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency.max(1);
        self
    }

    /// Set the target summary length
    pub fn summary_words(mut self, summary_words: usize) -> Self {
        self.config.summary_words = summary_words;
        self
    }

    /// Set the model context window
    pub fn context_window(mut self, context_window: usize) -> Self {
        self.config.context_window = context_window;
        self
    }

    /// Set the completion model
    pub fn completion_model(mut self, model: impl Into<String>) -> Self {
        self.config.completion_model = model.into();
        self
    }

    /// Set the embedding model
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the per-call timeout
    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.config.timeout_secs = timeout_secs;
        self
    }

    /// Enable or disable artifact pruning
    pub fn prune_artifacts(mut self, prune: bool) -> Self {
        self.config.prune_artifacts = prune;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ProcessorConfig {
        self.config
    }
}

impl ProcessorConfig {
    /// Create a new builder
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder::new()
    }

    /// Tokens reserved for the generated summary
    pub fn summary_tokens(&self) -> usize {
        let (tokens, words) = self.tokens_per_word;
        self.summary_words * tokens / words.max(1)
    }

    /// Characters of page content sent to the summarizer
    pub fn max_input_chars(&self) -> usize {
        self.context_window.saturating_sub(self.summary_tokens())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
