//! # Assistant Module
//!
//! Decides, per conversation turn, whether an indexed document is relevant
//! enough to be handed to the text-generation service as context, and
//! assembles the reply.
//!
//! The retrieval gate runs in two stages. The latest message is first compared
//! lexically with every eligible summary; only when that clears the lexical
//! threshold is the whole conversation embedded and ranked. Most turns that
//! have nothing to do with the corpus never reach the embedding service.

use rig::{
    agent::AgentBuilder,
    completion::{Chat, CompletionModel},
    embeddings::EmbeddingModel,
    message::Message,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::error::Error as CrateError;
use crate::index::IndexedDocument;
use crate::search::{SearchDocument, SearchEngine, SearchError};

/// System prompt placed at the start of every conversation
pub const DEFAULT_ASSISTANT_PROMPT: &str = "You are a study assistant helping students with \
questions about their studies, admissions and campus life. Answer briefly and in the language \
of the question. If you do not know the answer, say so.";

pub const DEFAULT_TEMPERATURE: f64 = 0.8;
pub const DEFAULT_MAX_TOKENS: u64 = 400;

/// Errors that can occur while answering a conversation
#[derive(Debug, Error)]
pub enum AssistantError {
    /// The conversation has no messages to answer
    #[error("Conversation has no messages")]
    EmptyConversation,

    /// Error occurred while retrieving context
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Error occurred in the text-generation service
    #[error("Completion error: {0}")]
    Completion(String),
}

impl From<AssistantError> for CrateError {
    fn from(err: AssistantError) -> Self {
        match err {
            AssistantError::Search(e) => e.into(),
            _ => CrateError::Assistant(err.to_string()),
        }
    }
}

/// Who wrote a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    fn to_message(&self) -> Message {
        match self.role {
            Role::User => Message::user(&self.content),
            Role::Assistant => Message::assistant(&self.content),
        }
    }
}

/// The document shown to the user next to a reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub url: String,
    /// Source of the first image on the page
    pub image: Option<String>,
}

impl Attachment {
    pub fn from_document(document: &IndexedDocument) -> Self {
        Self {
            id: document.document.id.clone(),
            title: document.document.title.clone(),
            summary: document.summary.clone(),
            url: document.document.url.clone(),
            image: document
                .document
                .image_metadata
                .first()
                .map(|image| image.src.clone()),
        }
    }
}

/// An assistant reply with the document it was grounded on, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub message: String,
    pub attachment: Option<Attachment>,
}

/// The context passage handed to the text-generation service
pub fn context_preamble(document: &IndexedDocument) -> String {
    format!("Answer for User question Using this summary:{}", document.summary)
}

/// Best document to ground the next reply on, or `None`
///
/// Only the latest message goes through the lexical gate. When it passes,
/// every message of the conversation is embedded and ranked against the
/// documents of `school_id` plus the general ones.
#[instrument(skip_all, fields(turns = messages.len(), school_id = ?school_id))]
pub async fn retrieve_context<'a, E: EmbeddingModel>(
    engine: &'a SearchEngine<E>,
    messages: &[ChatMessage],
    school_id: Option<i64>,
) -> Result<Option<SearchDocument<'a>>, SearchError> {
    let Some(latest) = messages.last() else {
        return Ok(None);
    };

    if !engine.lexical_relevance_gate(&latest.content, school_id) {
        debug!("Lexical gate rejected the latest message");
        return Ok(None);
    }

    let texts: Vec<String> = messages.iter().map(|m| m.content.clone()).collect();
    let vectors = engine.embed(&texts).await?;
    let best = engine
        .rank_by_similarity(&vectors, school_id)
        .into_iter()
        .next();

    if let Some(best) = &best {
        info!(
            document = %best.document.document.url,
            score = best.score,
            "Retrieved context"
        );
    }
    Ok(best)
}

/// Answers conversations, grounding replies on the indexed corpus
pub struct Assistant<C: CompletionModel, E: EmbeddingModel> {
    completion_model: C,
    engine: SearchEngine<E>,
    prompt: String,
    temperature: f64,
    max_tokens: u64,
}

impl<C: CompletionModel, E: EmbeddingModel> Assistant<C, E> {
    pub fn new(completion_model: C, engine: SearchEngine<E>) -> Self {
        Self {
            completion_model,
            engine,
            prompt: DEFAULT_ASSISTANT_PROMPT.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn engine(&self) -> &SearchEngine<E> {
        &self.engine
    }

    /// Answer the latest message of `messages`
    ///
    /// Earlier messages are sent as chat history. When a document passes the
    /// retrieval gate its summary is added to the system prompt and the
    /// document is returned as the reply's attachment.
    #[instrument(skip(self, messages), fields(turns = messages.len()))]
    pub async fn reply(
        &self,
        messages: &[ChatMessage],
        school_id: Option<i64>,
    ) -> Result<Reply, AssistantError> {
        let (latest, history) = messages
            .split_last()
            .ok_or(AssistantError::EmptyConversation)?;

        let context = retrieve_context(&self.engine, messages, school_id).await?;

        let mut preamble = self.prompt.clone();
        if let Some(context) = &context {
            preamble.push_str("\n\n");
            preamble.push_str(&context_preamble(context.document));
        }

        let agent = AgentBuilder::new(self.completion_model.clone())
            .preamble(&preamble)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build();

        let history: Vec<Message> = history.iter().map(ChatMessage::to_message).collect();
        let message = agent
            .chat(latest.content.as_str(), history)
            .await
            .map_err(|e| AssistantError::Completion(format!("Failed to generate reply: {}", e)))?;

        Ok(Reply {
            message,
            attachment: context.map(|context| Attachment::from_document(context.document)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{DocumentType, ImageMetadata};
    use crate::index::Document;
    use crate::model::mock_model::{MockCompletionModel, MockEmbeddingModel};
    use crate::search::SearchOptions;
    use chrono::Utc;

    fn indexed(id: &str, school_id: Option<i64>, summary: &str, embedding: Vec<f64>) -> IndexedDocument {
        IndexedDocument {
            document: Document {
                id: id.to_string(),
                url: format!("https://uni.example.edu/{}", id),
                title: format!("{} page", id),
                school_id,
                doc_type: if school_id.is_some() {
                    DocumentType::School
                } else {
                    DocumentType::General
                },
                metadata: vec![],
                image_metadata: vec![
                    ImageMetadata {
                        src: format!("https://uni.example.edu/{}.jpg", id),
                        alt: None,
                    },
                    ImageMetadata {
                        src: "https://uni.example.edu/second.jpg".to_string(),
                        alt: None,
                    },
                ],
                content: summary.to_string(),
                indexed_at: Utc::now(),
            },
            summary: summary.to_string(),
            model: "test".to_string(),
            embedding,
        }
    }

    fn corpus() -> Vec<IndexedDocument> {
        vec![
            indexed("admissions", Some(1), "The admissions deadline is March 1", vec![1.0, 0.0]),
            indexed("library", Some(2), "The library opens at 8", vec![1.0, 0.0]),
        ]
    }

    #[tokio::test]
    async fn test_gate_rejection_skips_embedding() {
        let embedding = MockEmbeddingModel::new(2);
        let engine = SearchEngine::new(corpus(), embedding.clone(), SearchOptions::default());

        let messages = vec![ChatMessage::user("Where can I park my bike")];
        let context = retrieve_context(&engine, &messages, Some(1)).await.unwrap();

        assert!(context.is_none());
        assert_eq!(embedding.total_calls().await, 0);
    }

    #[tokio::test]
    async fn test_gate_checks_latest_message_and_embeds_all() {
        let embedding = MockEmbeddingModel::new(2);
        let engine = SearchEngine::new(corpus(), embedding.clone(), SearchOptions::default());

        let messages = vec![
            ChatMessage::user("Hi"),
            ChatMessage::assistant("Hello, how can I help?"),
            ChatMessage::user("When is the admissions deadline"),
        ];
        let context = retrieve_context(&engine, &messages, Some(1))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(context.document.document.id, "admissions");
        assert_eq!(embedding.calls("Hi").await, 1);
        assert_eq!(embedding.calls("Hello, how can I help?").await, 1);
        assert_eq!(embedding.calls("When is the admissions deadline").await, 1);

        let earlier_only = vec![
            ChatMessage::user("When is the admissions deadline"),
            ChatMessage::user("Where can I park my bike"),
        ];
        assert!(
            retrieve_context(&engine, &earlier_only, Some(1))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_context_is_restricted_to_school() {
        let embedding = MockEmbeddingModel::new(2);
        let engine = SearchEngine::new(corpus(), embedding, SearchOptions::default());

        let messages = vec![ChatMessage::user("When does the library open")];
        assert!(
            retrieve_context(&engine, &messages, Some(1))
                .await
                .unwrap()
                .is_none()
        );
        let context = retrieve_context(&engine, &messages, Some(2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(context.document.document.id, "library");
    }

    #[tokio::test]
    async fn test_no_context_below_similarity_threshold() {
        let embedding = MockEmbeddingModel::new(2);
        embedding.set_default_vector(vec![0.0, 1.0]).await;
        let engine = SearchEngine::new(corpus(), embedding, SearchOptions::default());

        let messages = vec![ChatMessage::user("When is the admissions deadline")];
        assert!(
            retrieve_context(&engine, &messages, Some(1))
                .await
                .unwrap()
                .is_none()
        );
        assert!(retrieve_context(&engine, &[], Some(1)).await.unwrap().is_none());
    }

    #[test]
    fn test_attachment_and_context_preamble() {
        let document = indexed("admissions", Some(1), "Apply by March", vec![1.0]);
        let attachment = Attachment::from_document(&document);

        assert_eq!(attachment.id, "admissions");
        assert_eq!(attachment.title, "admissions page");
        assert_eq!(attachment.url, "https://uni.example.edu/admissions");
        assert_eq!(attachment.summary, "Apply by March");
        assert_eq!(attachment.image.as_deref(), Some("https://uni.example.edu/admissions.jpg"));
        assert_eq!(
            context_preamble(&document),
            "Answer for User question Using this summary:Apply by March"
        );

        let mut bare = document;
        bare.document.image_metadata.clear();
        assert_eq!(Attachment::from_document(&bare).image, None);
    }

    #[tokio::test]
    async fn test_reply_with_context() {
        let completion = MockCompletionModel::new();
        completion.set_text_response("The deadline is March 1.").await;
        let engine = SearchEngine::new(corpus(), MockEmbeddingModel::new(2), SearchOptions::default());
        let assistant = Assistant::new(completion.clone(), engine);

        let reply = assistant
            .reply(&[ChatMessage::user("When is the admissions deadline")], Some(1))
            .await
            .unwrap();

        assert_eq!(reply.message, "The deadline is March 1.");
        assert_eq!(reply.attachment.unwrap().id, "admissions");

        let requests = completion.requests().await;
        assert_eq!(requests.len(), 1);
        assert!(requests[0].contains("Answer for User question Using this summary:The admissions deadline is March 1"));
        assert!(requests[0].contains("study assistant"));
    }

    #[tokio::test]
    async fn test_reply_without_context_sends_history() {
        let completion = MockCompletionModel::new();
        completion.set_text_response("Sure.").await;
        let engine = SearchEngine::new(corpus(), MockEmbeddingModel::new(2), SearchOptions::default());
        let assistant = Assistant::new(completion.clone(), engine).with_prompt("Be nice");

        let reply = assistant
            .reply(
                &[
                    ChatMessage::user("My name is Alex"),
                    ChatMessage::assistant("Nice to meet you"),
                    ChatMessage::user("Tell me a joke"),
                ],
                Some(1),
            )
            .await
            .unwrap();

        assert_eq!(reply.message, "Sure.");
        assert!(reply.attachment.is_none());

        let requests = completion.requests().await;
        assert!(!requests[0].contains("Answer for User question"));
        assert!(requests[0].contains("My name is Alex"));
        assert!(requests[0].contains("Nice to meet you"));
        assert!(requests[0].contains("Tell me a joke"));
    }

    #[tokio::test]
    async fn test_reply_errors() {
        let completion = MockCompletionModel::new();
        completion.set_error(Some("service unavailable")).await;
        let engine = SearchEngine::new(corpus(), MockEmbeddingModel::new(2), SearchOptions::default());
        let assistant = Assistant::new(completion, engine);

        assert!(matches!(
            assistant.reply(&[], None).await,
            Err(AssistantError::EmptyConversation)
        ));
        assert!(matches!(
            assistant.reply(&[ChatMessage::user("Hello")], None).await,
            Err(AssistantError::Completion(_))
        ));
    }

    #[test]
    fn test_chat_message_json() {
        let messages: Vec<ChatMessage> = serde_json::from_str(
            r#"[{"role": "user", "content": "Hi"}, {"role": "assistant", "content": "Hello"}]"#,
        )
        .unwrap();
        assert_eq!(messages, vec![ChatMessage::user("Hi"), ChatMessage::assistant("Hello")]);
    }
}
