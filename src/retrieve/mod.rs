//! Similarity retrieval over the vector index

mod rank;

pub use rank::*;

use crate::config::QueryConfig;
use crate::embed::Embedder;
use crate::error::{Error, Result};
use crate::index::{IndexMetadata, SearchHit, VectorIndex};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-query options
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Minimum score threshold (falls back to `query.min_score`)
    pub min_score: Option<f32>,
    /// Keep only the best chunk of each document
    pub dedupe: bool,
}

/// One retrieved chunk with provenance
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub rank: usize,
    pub score: f32,
    pub relevance_pct: f32,
    pub doc_id: String,
    pub path: String,
    pub title: Option<String>,
    pub format: String,
    pub label: String,
    pub chunk_index: usize,
    pub char_start: usize,
    pub char_end: usize,
    pub text: String,
    /// Insertion sequence of the entry
    pub seq: i64,
}

impl QueryResult {
    fn from_hit(rank: usize, hit: SearchHit) -> Self {
        Self {
            rank,
            score: hit.score,
            relevance_pct: relevance_pct(hit.score),
            doc_id: hit.doc_id,
            path: hit.path,
            title: hit.title,
            format: hit.format,
            label: hit.label,
            chunk_index: hit.chunk_index.max(0) as usize,
            char_start: hit.char_start.max(0) as usize,
            char_end: hit.char_end.max(0) as usize,
            text: hit.chunk_text,
            seq: hit.seq,
        }
    }
}

/// Results of one query
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub query: String,
    pub k: usize,
    pub model: String,
    /// Number of index entries compared against the query
    pub entries_searched: usize,
    pub results: Vec<QueryResult>,
}

impl QueryResponse {
    /// True when nothing has been indexed yet
    pub fn is_index_empty(&self) -> bool {
        self.entries_searched == 0
    }
}

/// Embeds queries and ranks index entries against them
pub struct Retriever {
    index: VectorIndex,
    embedder: Arc<dyn Embedder>,
    max_results: usize,
    min_score: f32,
}

impl Retriever {
    pub fn new(index: VectorIndex, embedder: Arc<dyn Embedder>) -> Self {
        Self::from_config(index, embedder, &QueryConfig::default())
    }

    pub fn from_config(
        index: VectorIndex,
        embedder: Arc<dyn Embedder>,
        config: &QueryConfig,
    ) -> Self {
        Self {
            index,
            embedder,
            max_results: config.max_results.max(1),
            min_score: config.min_score,
        }
    }

    /// Return the `k` entries most similar to `text`
    pub async fn query(&self, text: &str, k: usize) -> Result<QueryResponse> {
        self.query_with(text, k, &QueryOptions::default()).await
    }

    pub async fn query_with(
        &self,
        text: &str,
        k: usize,
        options: &QueryOptions,
    ) -> Result<QueryResponse> {
        if k == 0 {
            return Err(Error::Config("k must be at least 1".to_string()));
        }
        let k = k.min(self.max_results);
        info!("Querying: {}", text);

        if let Some(stored) = self.index.metadata().await? {
            stored.check_model(&IndexMetadata {
                model: self.embedder.model_name().to_string(),
                dimension: self.embedder.dimension(),
                ..stored.clone()
            })?;
        }

        let query_vector = self
            .embedder
            .embed(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("No embedding returned".to_string()))?;
        if query_vector.len() != self.embedder.dimension() {
            return Err(Error::EmbeddingDimension {
                model: self.embedder.model_name().to_string(),
                expected: self.embedder.dimension(),
                actual: query_vector.len(),
            });
        }

        let outcome = if options.dedupe {
            self.index.search_distinct(&query_vector, k).await?
        } else {
            self.index.search(&query_vector, k).await?
        };
        debug!(
            "Compared {} entries, {} candidates",
            outcome.entries_searched,
            outcome.hits.len()
        );

        let mut hits = filter_by_score(outcome.hits, options.min_score.unwrap_or(self.min_score));
        hits.truncate(k);

        let results = hits
            .into_iter()
            .enumerate()
            .map(|(i, hit)| QueryResult::from_hit(i + 1, hit))
            .collect::<Vec<_>>();
        info!("Returning {} results", results.len());

        Ok(QueryResponse {
            query: text.to_string(),
            k,
            model: self.embedder.model_name().to_string(),
            entries_searched: outcome.entries_searched,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkParams;
    use crate::embed::HashEmbedder;
    use crate::ingest::{CancelToken, Indexer};
    use crate::load::{Document, DocumentFormat};
    use chrono::Utc;
    use std::path::PathBuf;

    fn document(path: &str, text: &str) -> Document {
        let path = PathBuf::from(path);
        Document {
            id: Document::id_for_path(&path),
            path,
            text: text.to_string(),
            format: DocumentFormat::Text,
            label: "Text File".to_string(),
            title: None,
            timestamp: Utc::now(),
            content_hash: crate::chunk::compute_text_hash(text),
            byte_size: text.len() as u64,
        }
    }

    async fn setup(docs: &[(&str, &str)]) -> (VectorIndex, Arc<dyn Embedder>) {
        let index = VectorIndex::open_in_memory().await.unwrap();
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new("test-hash", 256));
        let indexer = Indexer::new(
            index.clone(),
            embedder.clone(),
            ChunkParams::new(200, 40).unwrap(),
        );
        index.write_metadata(&indexer.metadata()).await.unwrap();
        for (path, text) in docs {
            indexer
                .index_document(&document(path, text), &CancelToken::new())
                .await
                .unwrap();
        }
        (index, embedder)
    }

    #[tokio::test]
    async fn test_zero_k_rejected() {
        let (index, embedder) = setup(&[]).await;
        let retriever = Retriever::new(index, embedder);
        assert!(matches!(
            retriever.query("anything", 0).await,
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_index_returns_no_results() {
        let (index, embedder) = setup(&[]).await;
        let response = Retriever::new(index, embedder)
            .query("servo wiring", 3)
            .await
            .unwrap();

        assert!(response.results.is_empty());
        assert!(response.is_index_empty());
    }

    #[tokio::test]
    async fn test_most_relevant_document_first() {
        let (index, embedder) = setup(&[
            ("/kb/servo.txt", "Connect the servo signal wire to pin 9 and power it from 5V."),
            ("/kb/bread.txt", "Knead the dough for ten minutes and bake it at 220 degrees."),
            ("/kb/led.txt", "An LED needs a current limiting resistor of about 220 ohms."),
        ])
        .await;

        let response = Retriever::new(index, embedder)
            .query("which pin does the servo signal wire use", 3)
            .await
            .unwrap();

        assert_eq!(response.results.len(), 3);
        assert_eq!(response.entries_searched, 3);
        assert_eq!(response.results[0].path, "/kb/servo.txt");
        assert_eq!(response.results[0].rank, 1);
        assert!(response
            .results
            .windows(2)
            .all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_k_larger_than_index() {
        let (index, embedder) = setup(&[("/kb/a.txt", "Only one short document here.")]).await;
        let response = Retriever::new(index, embedder).query("document", 10).await.unwrap();
        assert_eq!(response.results.len(), 1);
    }

    #[tokio::test]
    async fn test_model_mismatch_detected() {
        let (index, _) = setup(&[("/kb/a.txt", "Some indexed text for the test.")]).await;
        let other: Arc<dyn Embedder> = Arc::new(HashEmbedder::new("other-model", 128));

        let err = Retriever::new(index, other).query("text", 3).await.unwrap_err();
        assert!(matches!(err, Error::ModelMismatch { .. }));
    }

    #[tokio::test]
    async fn test_dedupe_and_min_score() {
        let long = "Servo motors rotate to a commanded angle. ".repeat(20);
        let (index, embedder) = setup(&[
            ("/kb/servo.txt", long.as_str()),
            ("/kb/other.txt", "Servo motors are handy for robot arms."),
        ])
        .await;
        let retriever = Retriever::new(index, embedder);

        let deduped = retriever
            .query_with(
                "servo motors",
                5,
                &QueryOptions {
                    dedupe: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(deduped.results.len(), 2);
        assert_ne!(deduped.results[0].doc_id, deduped.results[1].doc_id);

        let strict = retriever
            .query_with(
                "servo motors",
                5,
                &QueryOptions {
                    min_score: Some(1.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(strict.results.is_empty());
        assert!(!strict.is_index_empty());
    }

    #[tokio::test]
    async fn test_dedupe_fills_k_when_one_document_dominates() {
        let big = "servo ".repeat(400);
        let (index, embedder) = setup(&[
            ("/kb/big.txt", big.as_str()),
            ("/kb/small.txt", "A servo holds its angle against a load."),
        ])
        .await;
        let retriever = Retriever::new(index, embedder);

        let response = retriever
            .query_with(
                "servo",
                2,
                &QueryOptions {
                    dedupe: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(response.entries_searched > 8);
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].path, "/kb/big.txt");
        assert_eq!(response.results[1].path, "/kb/small.txt");
    }
}
