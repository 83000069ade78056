//! LLM integration functionality for the processor module

use crate::model::Client;
use crate::processor::config::ProcessorConfig;
use crate::processor::error::ProcessError;
use rig::{
    agent::AgentBuilder,
    completion::{CompletionModel, Prompt},
    embeddings::EmbeddingModel,
};
use tracing::{debug, instrument, trace};

/// System prompt for summarization
pub fn summary_preamble(summary_words: usize) -> String {
    format!(
        "Summarize the following content as concisely as possible. Max word count is {}.",
        summary_words
    )
}

/// Longest prefix of `text` holding at most `max_chars` characters
pub fn truncate_content(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Generate a summary for a document's content
///
/// # Arguments
///
/// * `client` - The client to use
/// * `content` - The page text; truncated to fit the model's context window
/// * `config` - The processor configuration
///
/// # Returns
///
/// A summary of the text
#[instrument(skip_all)]
pub async fn generate_summary<C, E>(
    client: &Client<C, E>,
    content: &str,
    config: &ProcessorConfig,
) -> Result<String, ProcessError>
where
    C: CompletionModel,
    E: EmbeddingModel,
{
    let input = truncate_content(content, config.max_input_chars());
    debug!(
        "Generating summary for text of length {} (sent {})",
        content.len(),
        input.len()
    );

    let agent = AgentBuilder::new(client.completion().clone())
        .preamble(&summary_preamble(config.summary_words))
        .build();

    let summary = agent
        .prompt(input)
        .await
        .map_err(|e| ProcessError::Llm(format!("Failed to generate summary: {}", e)))?;

    let summary = summary.trim().to_string();
    if summary.is_empty() {
        return Err(ProcessError::Llm("Model returned an empty summary".to_string()));
    }

    trace!("Generated summary of length {}", summary.len());
    Ok(summary)
}

/// Generate an embedding for a summary
#[instrument(skip_all)]
pub async fn generate_embedding<C, E>(
    client: &Client<C, E>,
    text: &str,
) -> Result<Vec<f64>, ProcessError>
where
    C: CompletionModel,
    E: EmbeddingModel,
{
    let embedding = client
        .embedding()
        .embed_texts(vec![text.to_string()])
        .await
        .map_err(|e| {
            ProcessError::EmbeddingGeneration(format!("Failed to generate embedding: {}", e))
        })?
        .into_iter()
        .next()
        .ok_or_else(|| {
            ProcessError::EmbeddingGeneration("failed to extract embedding".to_string())
        })?;

    trace!("Generated embedding with {} dimensions", embedding.vec.len());
    Ok(embedding.vec)
}
