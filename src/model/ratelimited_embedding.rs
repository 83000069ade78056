use std::sync::Arc;
use std::time::Duration;

use governor::DefaultDirectRateLimiter;
use rig::embeddings::{Embedding, EmbeddingError, EmbeddingModel};
use tracing::{Instrument, debug_span, info_span};

#[derive(Clone)]
pub struct RateLimitedEmbeddingModel<M: EmbeddingModel> {
    model: M,
    limiter: Arc<DefaultDirectRateLimiter>,
    timeout: Duration,
}

impl<M> RateLimitedEmbeddingModel<M>
where
    M: EmbeddingModel,
{
    pub fn new(model: M, limiter: DefaultDirectRateLimiter, timeout: Duration) -> Self {
        Self {
            model,
            limiter: Arc::new(limiter),
            timeout,
        }
    }
}

impl<M: EmbeddingModel> EmbeddingModel for RateLimitedEmbeddingModel<M> {
    const MAX_DOCUMENTS: usize = M::MAX_DOCUMENTS;

    fn ndims(&self) -> usize {
        self.model.ndims()
    }

    async fn embed_texts(
        &self,
        texts: impl IntoIterator<Item = String> + Send,
    ) -> Result<Vec<Embedding>, EmbeddingError> {
        self.limiter.until_ready().instrument(debug_span!("limiter")).await;
        tokio::time::timeout(self.timeout, self.model.embed_texts(texts))
            .instrument(info_span!("embed_texts"))
            .await
            .map_err(|_| {
                EmbeddingError::ProviderError(format!(
                    "embedding timed out after {}s",
                    self.timeout.as_secs_f32()
                ))
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mock_model::MockEmbeddingModel;
    use governor::{Quota, RateLimiter};
    use std::num::NonZeroU32;

    fn limiter() -> DefaultDirectRateLimiter {
        RateLimiter::direct(Quota::per_second(NonZeroU32::new(100).unwrap()))
    }

    #[tokio::test]
    async fn test_embeds_through_limiter() {
        let mock = MockEmbeddingModel::new(2);
        mock.set_vector("tuition", vec![0.0, 1.0]).await;
        let model = RateLimitedEmbeddingModel::new(mock, limiter(), Duration::from_secs(5));

        assert_eq!(model.ndims(), 2);
        let embeddings = model
            .embed_texts(vec!["tuition fees".to_string()])
            .await
            .unwrap();
        assert_eq!(embeddings[0].vec, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_slow_model_times_out() {
        let mock = MockEmbeddingModel::new(2);
        mock.set_delay(Duration::from_millis(500)).await;
        let model = RateLimitedEmbeddingModel::new(mock, limiter(), Duration::from_millis(20));

        let error = model.embed_texts(vec!["x".to_string()]).await.unwrap_err();
        assert!(error.to_string().contains("timed out"));
    }
}
