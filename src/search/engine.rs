//! In-memory search engine over the indexed corpus

use rig::embeddings::EmbeddingModel;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::error::SearchError;
use super::lexical::{self, WordVector};
use super::similarity::cosine_distance;
use crate::crawler::DocumentType;
use crate::index::{Database, IndexedDocument};

/// Options for search queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Minimum bag-of-words similarity for the relevance gate to pass
    pub lexical_threshold: f64,

    /// Minimum embedding similarity for a document to be ranked
    pub similarity_threshold: f64,

    /// Maximum number of results to return
    pub limit: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            lexical_threshold: 0.155,
            similarity_threshold: 0.815,
            limit: 10,
        }
    }
}

/// A document paired with its similarity to a query
#[derive(Debug, Clone, Serialize)]
pub struct SearchDocument<'a> {
    #[serde(flatten)]
    pub document: &'a IndexedDocument,
    pub score: f64,
}

#[derive(Debug)]
struct CorpusEntry {
    document: IndexedDocument,
    summary_words: WordVector,
}

/// Read-only corpus of indexed documents with the embedding model used to query it
#[derive(Debug)]
pub struct SearchEngine<E: EmbeddingModel> {
    corpus: Vec<CorpusEntry>,
    embedding_model: E,
    options: SearchOptions,
}

impl<E: EmbeddingModel> SearchEngine<E> {
    pub fn new(documents: Vec<IndexedDocument>, embedding_model: E, options: SearchOptions) -> Self {
        let corpus = documents
            .into_iter()
            .map(|document| CorpusEntry {
                summary_words: lexical::text_to_vector(&document.summary),
                document,
            })
            .collect();

        Self {
            corpus,
            embedding_model,
            options,
        }
    }

    /// Load every indexed document from the store
    #[instrument(skip_all)]
    pub async fn load(
        db: &Database,
        embedding_model: E,
        options: SearchOptions,
    ) -> Result<Self, SearchError> {
        let documents = db.get_all_documents().await?;
        info!("Loaded {} documents into the search engine", documents.len());
        Ok(Self::new(documents, embedding_model, options))
    }

    pub fn len(&self) -> usize {
        self.corpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corpus.is_empty()
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Documents of the given institution plus every general document
    fn eligible(&self, school_id: Option<i64>) -> impl Iterator<Item = &CorpusEntry> {
        self.corpus.iter().filter(move |entry| {
            entry.document.document.school_id == school_id
                || entry.document.document.doc_type == DocumentType::General
        })
    }

    /// Eligible document whose summary shares the most words with `query`
    pub fn best_lexical_match(
        &self,
        query: &str,
        school_id: Option<i64>,
    ) -> Option<SearchDocument<'_>> {
        let query_words = lexical::text_to_vector(query);
        if query_words.is_empty() {
            return None;
        }

        self.eligible(school_id)
            .filter_map(|entry| {
                lexical::cosine(&query_words, &entry.summary_words).map(|score| SearchDocument {
                    document: &entry.document,
                    score,
                })
            })
            .fold(None, |best: Option<SearchDocument<'_>>, candidate| match best {
                Some(best) if best.score >= candidate.score => Some(best),
                _ => Some(candidate),
            })
    }

    /// Whether any eligible document is plausibly relevant to `query`
    ///
    /// An empty or wordless query is never relevant.
    pub fn lexical_relevance_gate(&self, query: &str, school_id: Option<i64>) -> bool {
        let best = self.best_lexical_match(query, school_id);
        debug!(
            score = best.as_ref().map(|b| b.score),
            "Lexical relevance for {:?}", query
        );
        best.is_some_and(|best| best.score > self.options.lexical_threshold)
    }

    /// Embed each text with its own service call, preserving order
    #[instrument(skip_all, fields(count = texts.len()))]
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, SearchError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            let embedding = self
                .embedding_model
                .embed_texts(vec![text.clone()])
                .await
                .map_err(|e| SearchError::Embedding(format!("Failed to embed query: {}", e)))?
                .into_iter()
                .next()
                .ok_or_else(|| SearchError::Embedding("No embedding returned".to_string()))?;
            vectors.push(embedding.vec);
        }
        Ok(vectors)
    }

    /// Every (eligible document, query vector) pair above the similarity threshold
    ///
    /// A pair qualifies when its cosine distance is below `1 - similarity_threshold`
    /// and is scored `1 - distance`. Sorted by score, highest first; equal scores
    /// keep corpus order. A document may appear once per query vector.
    pub fn rank_by_similarity(
        &self,
        query_vectors: &[Vec<f64>],
        school_id: Option<i64>,
    ) -> Vec<SearchDocument<'_>> {
        let max_distance = 1.0 - self.options.similarity_threshold;
        let mut ranked: Vec<SearchDocument<'_>> = query_vectors
            .iter()
            .flat_map(|query| {
                self.eligible(school_id).filter_map(move |entry| {
                    let distance = cosine_distance(query, &entry.document.embedding);
                    (distance < max_distance).then(|| SearchDocument {
                        document: &entry.document,
                        score: 1.0 - distance,
                    })
                })
            })
            .collect();

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }

    /// Embed `texts`, rank the corpus against them and keep the top results
    #[instrument(skip(self, texts))]
    pub async fn search(
        &self,
        texts: &[String],
        school_id: Option<i64>,
    ) -> Result<Vec<SearchDocument<'_>>, SearchError> {
        if texts.is_empty() {
            return Err(SearchError::InvalidParameters(
                "at least one query text is required".to_string(),
            ));
        }

        let vectors = self.embed(texts).await?;
        let mut ranked = self.rank_by_similarity(&vectors, school_id);
        ranked.truncate(self.options.limit);
        debug!("Search returned {} documents", ranked.len());
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Document;
    use crate::model::mock_model::MockEmbeddingModel;
    use chrono::Utc;

    fn indexed(id: &str, school_id: Option<i64>, summary: &str, embedding: Vec<f64>) -> IndexedDocument {
        IndexedDocument {
            document: Document {
                id: id.to_string(),
                url: format!("https://uni.example.edu/{}", id),
                title: id.to_string(),
                school_id,
                doc_type: if school_id.is_some() {
                    DocumentType::School
                } else {
                    DocumentType::General
                },
                metadata: vec![],
                image_metadata: vec![],
                content: summary.to_string(),
                indexed_at: Utc::now(),
            },
            summary: summary.to_string(),
            model: "test".to_string(),
            embedding,
        }
    }

    /// Unit vector whose cosine with [1, 0] is `score`
    fn at(score: f64) -> Vec<f64> {
        vec![score, (1.0 - score * score).sqrt()]
    }

    fn engine(documents: Vec<IndexedDocument>) -> SearchEngine<MockEmbeddingModel> {
        SearchEngine::new(documents, MockEmbeddingModel::new(2), SearchOptions::default())
    }

    fn ids(results: &[SearchDocument<'_>]) -> Vec<String> {
        results.iter().map(|r| r.document.document.id.clone()).collect()
    }

    #[test]
    fn test_ranking_is_stable_and_descending() {
        let engine = engine(vec![
            indexed("first", Some(1), "a", at(0.9)),
            indexed("second", Some(1), "b", at(0.9)),
            indexed("best", Some(1), "c", at(0.95)),
        ]);

        let ranked = engine.rank_by_similarity(&[vec![1.0, 0.0]], Some(1));
        assert_eq!(ids(&ranked), vec!["best", "first", "second"]);
        assert!((ranked[0].score - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_ranking_threshold_and_school_filter() {
        let engine = engine(vec![
            indexed("low", Some(1), "a", at(0.8)),
            indexed("other-school", Some(2), "b", at(0.99)),
            indexed("general", None, "c", at(0.85)),
            indexed("own", Some(1), "d", at(0.82)),
        ]);

        let ranked = engine.rank_by_similarity(&[vec![1.0, 0.0]], Some(1));
        assert_eq!(ids(&ranked), vec!["general", "own"]);

        let general_only = engine.rank_by_similarity(&[vec![1.0, 0.0]], None);
        assert_eq!(ids(&general_only), vec!["general"]);
    }

    #[test]
    fn test_scores_are_one_minus_distance() {
        let engine = engine(vec![
            indexed("exact", None, "a", vec![3.0, 0.0]),
            indexed("near", None, "b", at(0.86)),
            indexed("far", None, "c", at(0.18)),
        ]);

        let ranked = engine.rank_by_similarity(&[vec![1.0, 0.0]], None);
        assert_eq!(ids(&ranked), vec!["exact", "near"]);
        assert!((ranked[0].score - 1.0).abs() < 1e-12);
        assert!((ranked[1].score - 0.86).abs() < 1e-9);
        assert!(ranked.iter().all(|r| 1.0 - r.score < 0.185));
    }

    #[test]
    fn test_each_query_vector_ranks_independently() {
        let engine = engine(vec![indexed("doc", None, "a", vec![1.0, 0.0])]);

        let ranked = engine.rank_by_similarity(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![2.0, 0.1]], None);
        assert_eq!(ids(&ranked), vec!["doc", "doc"]);
    }

    #[test]
    fn test_lexical_gate() {
        let engine = engine(vec![
            indexed("admissions", None, "General admissions deadline information", vec![1.0, 0.0]),
            indexed("cafeteria", None, "Cafeteria menu", vec![1.0, 0.0]),
        ]);

        let best = engine.best_lexical_match("admissions deadline", None).unwrap();
        assert_eq!(best.document.document.id, "admissions");
        assert!(engine.lexical_relevance_gate("admissions deadline", None));
        assert!(!engine.lexical_relevance_gate("parking permits", None));
    }

    #[test]
    fn test_lexical_gate_guards_empty_queries() {
        let engine = engine(vec![indexed("doc", None, "Library hours", vec![1.0, 0.0])]);
        assert!(!engine.lexical_relevance_gate("", None));
        assert!(!engine.lexical_relevance_gate(" ?! ", None));
        assert!(!SearchEngine::new(vec![], MockEmbeddingModel::new(2), SearchOptions::default())
            .lexical_relevance_gate("Library", None));
    }

    #[test]
    fn test_lexical_gate_respects_school() {
        let engine = engine(vec![indexed("doc", Some(2), "Library hours", vec![1.0, 0.0])]);
        assert!(engine.lexical_relevance_gate("Library hours", Some(2)));
        assert!(!engine.lexical_relevance_gate("Library hours", Some(1)));
    }

    #[tokio::test]
    async fn test_search_embeds_each_text_and_truncates() {
        let embedding = MockEmbeddingModel::new(2);
        embedding.set_vector("housing", vec![0.0, 1.0]).await;
        let documents = (0..15)
            .map(|i| indexed(&format!("d{}", i), None, "Housing", vec![0.0, 1.0]))
            .collect();
        let engine = SearchEngine::new(documents, embedding.clone(), SearchOptions::default());

        let results = engine
            .search(&["student housing".to_string(), "dorm housing".to_string()], None)
            .await
            .unwrap();

        assert_eq!(results.len(), 10);
        assert_eq!(embedding.calls("student housing").await, 1);
        assert_eq!(embedding.calls("dorm housing").await, 1);
        assert_eq!(engine.len(), 15);
    }

    #[tokio::test]
    async fn test_search_propagates_embedding_failure() {
        let embedding = MockEmbeddingModel::new(2);
        embedding.set_failing(true).await;
        let engine = SearchEngine::new(vec![], embedding, SearchOptions::default());

        assert!(matches!(
            engine.search(&["x".to_string()], None).await,
            Err(SearchError::Embedding(_))
        ));
        assert!(matches!(
            engine.search(&[], None).await,
            Err(SearchError::InvalidParameters(_))
        ));
    }
}
