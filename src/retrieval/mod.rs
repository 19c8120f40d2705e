//! Passage retrieval over the chunked corpus.
//!
//! A [`Retriever`] maps a query to the top-K most relevant passages. Three
//! strategies are available and picked once, at construction, through
//! [`RetrieverFactory`]:
//!
//! - `keyword`: BM25 over word tokens and Hangul bigrams
//! - `vector`: cosine similarity over MiniLM embeddings (feature `embeddings`)
//! - `hybrid`: reciprocal-rank fusion of the two
//!
//! Asking for a mode that cannot be served is a configuration error.

mod chunker;
mod hybrid;
mod index;
mod keyword;

#[cfg(feature = "embeddings")]
mod embeddings;
#[cfg(feature = "embeddings")]
mod vector;

pub use chunker::{ChunkConfig, TextSpan, chunk_text};
pub use hybrid::HybridRetriever;
pub use index::{Chunk, ChunkIndex};
pub use keyword::KeywordRetriever;

#[cfg(feature = "embeddings")]
pub use embeddings::{DEFAULT_EMBEDDING_MODEL, EmbeddingModel, cosine_similarity};
#[cfg(feature = "embeddings")]
pub use vector::VectorRetriever;

use crate::config::RetrievalMode;
use crate::error::{Result, RfpError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

/// Where a passage came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageMetadata {
    /// File identifier of the source document.
    pub source: String,
    pub title: String,
    pub chunk_id: usize,
}

/// A retrieved chunk of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub metadata: PassageMetadata,
    /// Retriever-specific relevance; only comparable within one result list.
    pub score: f32,
}

impl Passage {
    fn from_chunk(chunk: &Chunk, score: f32) -> Self {
        Self {
            text: chunk.text.clone(),
            metadata: PassageMetadata {
                source: chunk.source.clone(),
                title: chunk.title.clone(),
                chunk_id: chunk.id,
            },
            score,
        }
    }
}

/// Query-to-passages capability.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return at most `top_k` passages, most relevant first.
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Passage>>;
}

/// Sort `(chunk id, score)` pairs by score descending, ties by chunk id, and
/// keep the first `top_k`.
pub(crate) fn rank(
    index: &ChunkIndex,
    scored: impl Iterator<Item = (usize, f32)>,
    top_k: usize,
) -> Vec<Passage> {
    let mut scored: Vec<(usize, f32)> = scored.filter(|(_, s)| s.is_finite()).collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored
        .into_iter()
        .filter_map(|(id, score)| index.chunks.get(id).map(|c| Passage::from_chunk(c, score)))
        .take(top_k)
        .collect()
}

/// Builds retrievers over one shared index.
pub struct RetrieverFactory {
    index: Arc<ChunkIndex>,
    keyword: Arc<KeywordRetriever>,
    #[cfg(feature = "embeddings")]
    model: Option<Arc<EmbeddingModel>>,
}

impl RetrieverFactory {
    pub fn new(index: ChunkIndex) -> Self {
        let index = Arc::new(index);
        let keyword = Arc::new(KeywordRetriever::new(Arc::clone(&index)));
        Self {
            index,
            keyword,
            #[cfg(feature = "embeddings")]
            model: None,
        }
    }

    /// Attach the embedding model used by `vector` and `hybrid`.
    #[cfg(feature = "embeddings")]
    pub fn with_model(mut self, model: Arc<EmbeddingModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn index(&self) -> &ChunkIndex {
        &self.index
    }

    /// Build the retriever for `mode`.
    pub fn build(&self, mode: RetrievalMode) -> Result<Arc<dyn Retriever>> {
        match mode {
            RetrievalMode::Keyword => Ok(self.keyword.clone()),
            RetrievalMode::Vector => Ok(self.vector()?),
            RetrievalMode::Hybrid => {
                let vector = self.vector()?;
                Ok(Arc::new(HybridRetriever::new(self.keyword.clone(), vector)))
            }
        }
    }

    #[cfg(feature = "embeddings")]
    fn vector(&self) -> Result<Arc<dyn Retriever>> {
        let model = self.model.clone().ok_or_else(|| {
            RfpError::Config("Vector retrieval needs a loaded embedding model".to_string())
        })?;
        Ok(Arc::new(VectorRetriever::new(Arc::clone(&self.index), model)?))
    }

    #[cfg(not(feature = "embeddings"))]
    fn vector(&self) -> Result<Arc<dyn Retriever>> {
        Err(RfpError::Config(
            "Vector retrieval requires building with the `embeddings` feature".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::build_corpus;
    use crate::records::SourceRecord;

    fn factory() -> RetrieverFactory {
        let docs = build_corpus(&[
            SourceRecord::new("도서관 리모델링", "서울시", "1000", "lib.hwp", "열람실 개선"),
            SourceRecord::new("교통 정보 시스템", "서울교통공사", "2000", "metro.pdf", "신호 개량"),
        ]);
        RetrieverFactory::new(ChunkIndex::build(&docs, &ChunkConfig::default()))
    }

    #[tokio::test]
    async fn test_keyword_mode_builds() {
        let retriever = factory().build(RetrievalMode::Keyword).unwrap();
        let passages = retriever.retrieve("교통 정보 시스템 예산", 3).await.unwrap();
        assert_eq!(passages[0].metadata.source, "metro.pdf");
    }

    #[cfg(not(feature = "embeddings"))]
    #[test]
    fn test_vector_modes_need_feature() {
        let factory = factory();
        for mode in [RetrievalMode::Vector, RetrievalMode::Hybrid] {
            assert!(matches!(factory.build(mode), Err(RfpError::Config(_))));
        }
    }

    #[cfg(feature = "embeddings")]
    #[test]
    fn test_vector_modes_need_model() {
        let factory = factory();
        assert!(matches!(
            factory.build(RetrievalMode::Vector),
            Err(RfpError::Config(_))
        ));
    }

    #[test]
    fn test_rank_breaks_ties_by_chunk_id() {
        let factory = factory();
        let ranked = rank(
            factory.index(),
            vec![(1, 0.5), (0, 0.5), (2, f32::NAN)].into_iter(),
            5,
        );
        let ids: Vec<usize> = ranked.iter().map(|p| p.metadata.chunk_id).collect();
        assert_eq!(ids, vec![0, 1]);
    }
}
