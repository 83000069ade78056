//! # Model Client Module
//!
//! A unified client for the two external services the pipeline depends on:
//! text generation (summaries and assistant replies) and embeddings.
//!
//! ## Key Components
//!
//! - `Client`: bundles one completion model and one embedding model
//! - `RateLimitedCompletionModel`: adds rate limiting and a per-call timeout to any completion model
//! - `RateLimitedEmbeddingModel`: adds rate limiting and a per-call timeout to any embedding model
//! - `EmbeddingConversion`: conversion between vectors and their stored blob form
//! - `mock_model`: in-process test doubles for both services

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{Quota, RateLimiter};
use ratelimited_completion::RateLimitedCompletionModel;
use ratelimited_embedding::RateLimitedEmbeddingModel;
use rig::{completion::CompletionModel, embeddings::EmbeddingModel, providers::openai};

use crate::error::Error;

pub mod embedding;
pub mod mock_model;
pub mod ratelimited_completion;
pub mod ratelimited_embedding;

pub use embedding::EmbeddingConversion;

/// Model used for summaries and replies
pub const DEFAULT_COMPLETION_MODEL: &str = openai::GPT_35_TURBO;

/// Model used for summary and query embeddings
pub const DEFAULT_EMBEDDING_MODEL: &str = openai::TEXT_EMBEDDING_ADA_002;

/// Upper bound on a single external call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct Client<C, E>
where
    C: CompletionModel,
    E: EmbeddingModel,
{
    completion_model: C,
    embedding_model: E,
}

pub struct RateLimitResponse<T> {
    #[allow(dead_code)]
    response: T,
}

pub type OpenAiClient = Client<
    RateLimitedCompletionModel<openai::CompletionModel>,
    RateLimitedEmbeddingModel<openai::EmbeddingModel>,
>;

impl OpenAiClient {
    /// Build an OpenAI-backed client from `OPENAI_API_KEY` with default models
    pub fn new_openai_from_env() -> Result<Self, Error> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::Other("OPENAI_API_KEY environment variable must be set".into()))?;
        Ok(Self::new_openai(
            openai::Client::new(&api_key),
            DEFAULT_COMPLETION_MODEL,
            DEFAULT_EMBEDDING_MODEL,
            DEFAULT_TIMEOUT,
        ))
    }

    pub fn new_openai(
        openai_client: openai::Client,
        completion_model: &str,
        embedding_model: &str,
        timeout: Duration,
    ) -> Self {
        let completion_limiter = RateLimiter::direct(Quota::per_minute(
            NonZeroU32::new(3500).expect("must create rate limit"),
        ));
        let embedding_limiter = RateLimiter::direct(Quota::per_minute(
            NonZeroU32::new(3000).expect("must create rate limit"),
        ));
        let completion_model = RateLimitedCompletionModel::new(
            openai_client.completion_model(completion_model),
            completion_limiter,
            timeout,
        );
        let embedding_model = RateLimitedEmbeddingModel::new(
            openai_client.embedding_model(embedding_model),
            embedding_limiter,
            timeout,
        );
        Self {
            completion_model,
            embedding_model,
        }
    }
}

impl<C, E> Client<C, E>
where
    C: CompletionModel,
    E: EmbeddingModel,
{
    pub fn new(completion_model: C, embedding_model: E) -> Self {
        Self {
            completion_model,
            embedding_model,
        }
    }

    pub fn completion(&self) -> &C {
        &self.completion_model
    }

    pub fn embedding(&self) -> &E {
        &self.embedding_model
    }
}
