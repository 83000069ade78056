//! # Mock Models for Testing
//!
//! `MockCompletionModel` and `MockEmbeddingModel` implement the `rig` model
//! traits without network access. Responses are chosen by keyword: the first
//! registered keyword found in the request wins, otherwise a default is used.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rig::{
    completion::{
        AssistantContent, CompletionError, CompletionModel, CompletionRequest, CompletionResponse,
    },
    embeddings::{Embedding, EmbeddingError, EmbeddingModel},
    one_or_many::OneOrMany,
};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct CompletionState {
    response: Option<OneOrMany<AssistantContent>>,
    keyword_responses: Vec<(String, String)>,
    error: Option<String>,
    delay: Option<Duration>,
    requests: Vec<String>,
}

/// A mock completion model for testing purposes.
#[derive(Debug, Clone, Default)]
pub struct MockCompletionModel {
    state: Arc<Mutex<CompletionState>>,
}

impl MockCompletionModel {
    /// Creates a new mock model that will return a default empty success response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the response that the mock model should return.
    pub async fn set_response(&self, response: OneOrMany<AssistantContent>) {
        self.state.lock().await.response = Some(response);
    }

    /// Helper to create a simple text response.
    pub async fn set_text_response(&self, text: &str) {
        self.set_response(OneOrMany::one(AssistantContent::text(text)))
            .await;
    }

    /// Answer with `text` whenever the request mentions `keyword`
    pub async fn respond_to(&self, keyword: &str, text: &str) {
        self.state
            .lock()
            .await
            .keyword_responses
            .push((keyword.to_string(), text.to_string()));
    }

    /// Fail every request with a provider error
    pub async fn set_error(&self, message: Option<&str>) {
        self.state.lock().await.error = message.map(str::to_string);
    }

    /// Sleep before answering
    pub async fn set_delay(&self, delay: Duration) {
        self.state.lock().await.delay = Some(delay);
    }

    /// Preamble, history and prompt of every request received so far
    pub async fn requests(&self) -> Vec<String> {
        self.state.lock().await.requests.clone()
    }
}

impl CompletionModel for MockCompletionModel {
    type Response = String;

    async fn completion(
        &self,
        completion_request: CompletionRequest,
    ) -> Result<CompletionResponse<Self::Response>, CompletionError> {
        let rendered = format!(
            "{:?} {:?} {:?}",
            completion_request.preamble,
            completion_request.chat_history,
            completion_request.prompt
        );
        let (choice, error, delay) = {
            let mut state = self.state.lock().await;
            state.requests.push(rendered.clone());
            let choice = state
                .keyword_responses
                .iter()
                .find(|(keyword, _)| rendered.contains(keyword.as_str()))
                .map(|(_, text)| OneOrMany::one(AssistantContent::text(text)))
                .or_else(|| state.response.clone())
                .unwrap_or_else(|| OneOrMany::one(AssistantContent::text("")));
            (choice, state.error.clone(), state.delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = error {
            return Err(CompletionError::ProviderError(message));
        }
        Ok(CompletionResponse {
            choice,
            raw_response: "".to_string(),
        })
    }
}

#[derive(Debug)]
struct EmbeddingState {
    keyword_vectors: Vec<(String, Vec<f64>)>,
    default_vector: Vec<f64>,
    failing: bool,
    delay: Option<Duration>,
    calls: HashMap<String, usize>,
}

/// A mock embedding model for testing purposes.
#[derive(Debug, Clone)]
pub struct MockEmbeddingModel {
    ndims: usize,
    state: Arc<Mutex<EmbeddingState>>,
}

impl MockEmbeddingModel {
    /// Unmatched texts embed to the first unit vector of `ndims` dimensions
    pub fn new(ndims: usize) -> Self {
        let mut default_vector = vec![0.0; ndims];
        if let Some(first) = default_vector.first_mut() {
            *first = 1.0;
        }
        Self {
            ndims,
            state: Arc::new(Mutex::new(EmbeddingState {
                keyword_vectors: Vec::new(),
                default_vector,
                failing: false,
                delay: None,
                calls: HashMap::new(),
            })),
        }
    }

    /// Texts containing `keyword` embed to `vector`
    pub async fn set_vector(&self, keyword: &str, vector: Vec<f64>) {
        self.state
            .lock()
            .await
            .keyword_vectors
            .push((keyword.to_string(), vector));
    }

    pub async fn set_default_vector(&self, vector: Vec<f64>) {
        self.state.lock().await.default_vector = vector;
    }

    pub async fn set_failing(&self, failing: bool) {
        self.state.lock().await.failing = failing;
    }

    pub async fn set_delay(&self, delay: Duration) {
        self.state.lock().await.delay = Some(delay);
    }

    /// Number of times `text` has been embedded
    pub async fn calls(&self, text: &str) -> usize {
        self.state.lock().await.calls.get(text).copied().unwrap_or(0)
    }

    /// Total number of texts embedded
    pub async fn total_calls(&self) -> usize {
        self.state.lock().await.calls.values().sum()
    }
}

impl EmbeddingModel for MockEmbeddingModel {
    const MAX_DOCUMENTS: usize = 1024;

    fn ndims(&self) -> usize {
        self.ndims
    }

    async fn embed_texts(
        &self,
        texts: impl IntoIterator<Item = String> + Send,
    ) -> Result<Vec<Embedding>, EmbeddingError> {
        let texts: Vec<String> = texts.into_iter().collect();
        let (embeddings, failing, delay) = {
            let mut state = self.state.lock().await;
            for text in &texts {
                *state.calls.entry(text.clone()).or_default() += 1;
            }
            let embeddings: Vec<Embedding> = texts
                .into_iter()
                .map(|text| {
                    let vec = state
                        .keyword_vectors
                        .iter()
                        .find(|(keyword, _)| text.contains(keyword.as_str()))
                        .map(|(_, vector)| vector.clone())
                        .unwrap_or_else(|| state.default_vector.clone());
                    Embedding { document: text, vec }
                })
                .collect();
            (embeddings, state.failing, state.delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(EmbeddingError::ProviderError(
                "mock embedding failure".to_string(),
            ));
        }
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rig::{
        agent::AgentBuilder,
        completion::{Chat, Prompt},
        message::Message,
    };

    #[tokio::test]
    async fn test_keyword_responses() {
        let mock = MockCompletionModel::new();
        mock.set_text_response("default").await;
        mock.respond_to("library", "Library summary").await;

        let agent = AgentBuilder::new(mock.clone()).build();
        assert_eq!(agent.prompt("about the library").await.unwrap(), "Library summary");
        assert_eq!(agent.prompt("about fees").await.unwrap(), "default");
        assert_eq!(mock.requests().await.len(), 2);
    }

    #[tokio::test]
    async fn test_requests_record_preamble_history_and_prompt() {
        let mock = MockCompletionModel::new();
        mock.respond_to("campus guide", "guided").await;

        let agent = AgentBuilder::new(mock.clone())
            .preamble("You are a campus guide")
            .build();
        let reply = agent
            .chat(
                "where is the gym",
                vec![Message::user("hello"), Message::assistant("hi there")],
            )
            .await
            .unwrap();

        assert_eq!(reply, "guided");
        let requests = mock.requests().await;
        assert_eq!(requests.len(), 1);
        assert!(requests[0].contains("You are a campus guide"));
        assert!(requests[0].contains("hello"));
        assert!(requests[0].contains("hi there"));
        assert!(requests[0].contains("where is the gym"));
    }

    #[tokio::test]
    async fn test_completion_error() {
        let mock = MockCompletionModel::new();
        mock.set_error(Some("quota exceeded")).await;

        let agent = AgentBuilder::new(mock).build();
        assert!(agent.prompt("hi").await.is_err());
    }

    #[tokio::test]
    async fn test_embedding_vectors_and_calls() {
        let mock = MockEmbeddingModel::new(3);
        mock.set_vector("housing", vec![0.0, 0.0, 1.0]).await;

        let embeddings = mock
            .embed_texts(vec!["student housing".to_string(), "parking".to_string()])
            .await
            .unwrap();
        assert_eq!(embeddings[0].vec, vec![0.0, 0.0, 1.0]);
        assert_eq!(embeddings[1].vec, vec![1.0, 0.0, 0.0]);
        assert_eq!(mock.calls("parking").await, 1);
        assert_eq!(mock.total_calls().await, 2);

        mock.set_failing(true).await;
        assert!(mock.embed_texts(vec!["parking".to_string()]).await.is_err());
        assert_eq!(mock.calls("parking").await, 2);
    }
}
