//! Dense retrieval over the stored chunk embeddings.

use super::embeddings::{EmbeddingModel, cosine_similarity};
use super::index::ChunkIndex;
use super::{Passage, Retriever, rank};
use crate::error::{Result, RfpError};
use async_trait::async_trait;
use std::sync::Arc;

/// Ranks chunks by cosine similarity to the embedded query.
pub struct VectorRetriever {
    index: Arc<ChunkIndex>,
    model: Arc<EmbeddingModel>,
}

impl VectorRetriever {
    /// Fails when the index has no embeddings or they came from another model.
    pub fn new(index: Arc<ChunkIndex>, model: Arc<EmbeddingModel>) -> Result<Self> {
        if !index.has_embeddings() {
            return Err(RfpError::Config(
                "Index has no embeddings; rebuild it with the embeddings feature".to_string(),
            ));
        }
        if let Some(indexed_with) = &index.embedding_model {
            if indexed_with != model.model_id() {
                return Err(RfpError::Config(format!(
                    "Index was embedded with '{}' but '{}' is loaded",
                    indexed_with,
                    model.model_id()
                )));
            }
        }
        Ok(Self { index, model })
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Passage>> {
        let index = Arc::clone(&self.index);
        let model = Arc::clone(&self.model);
        let query = query.to_string();

        tokio::task::spawn_blocking(move || {
            let query_embedding = model.embed(&query)?;
            let embeddings = index.embeddings.as_deref().unwrap_or_default();
            let scored = embeddings
                .iter()
                .enumerate()
                .map(|(id, embedding)| (id, cosine_similarity(&query_embedding, embedding)));
            Ok(rank(&index, scored, top_k))
        })
        .await
        .map_err(|e| RfpError::Retrieval(format!("Embedding task failed: {}", e)))?
    }
}
