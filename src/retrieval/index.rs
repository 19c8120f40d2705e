//! Chunk index over the corpus.
//!
//! Holds every chunk with the metadata of its document and, when vector
//! retrieval is in use, one embedding per chunk in the same order.

use super::chunker::{chunk_text, ChunkConfig};
use crate::corpus::CorpusDocument;
use crate::error::{Result, RfpError};
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// A retrievable chunk of one corpus document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Chunk {
    /// Position in the index.
    pub id: usize,
    /// File identifier of the source document.
    pub source: String,
    pub title: String,
    /// Chunk number within its document.
    pub ordinal: usize,
    pub text: String,
}

/// All chunks of a corpus, plus optional embeddings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct ChunkIndex {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub chunks: Vec<Chunk>,
    /// One vector per chunk, in chunk order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embeddings: Option<Vec<Vec<f32>>>,
    /// Model that produced `embeddings`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
}

impl ChunkIndex {
    /// Chunk every document of the corpus.
    pub fn build(docs: &[CorpusDocument], config: &ChunkConfig) -> Self {
        let mut chunks = Vec::new();
        for doc in docs {
            for (ordinal, span) in chunk_text(&doc.render(), config).into_iter().enumerate() {
                chunks.push(Chunk {
                    id: chunks.len(),
                    source: doc.source.clone(),
                    title: doc.title.clone(),
                    ordinal,
                    text: span.text,
                });
            }
        }
        tracing::info!(documents = docs.len(), chunks = chunks.len(), "built chunk index");

        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            chunks,
            embeddings: None,
            embedding_model: None,
        }
    }

    /// Chunking settings this index was built with.
    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }

    /// Number of chunks in the index.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Check if index is empty.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Whether every chunk has an embedding.
    pub fn has_embeddings(&self) -> bool {
        self.embeddings
            .as_ref()
            .is_some_and(|e| e.len() == self.chunks.len())
    }

    /// Check that chunk ids are positions and embeddings line up with chunks.
    pub fn validate(&self) -> Result<()> {
        if let Some((pos, chunk)) = self
            .chunks
            .iter()
            .enumerate()
            .find(|(pos, chunk)| chunk.id != *pos)
        {
            return Err(RfpError::Serialization(format!(
                "chunk at position {} has id {}",
                pos, chunk.id
            )));
        }

        if let Some(embeddings) = &self.embeddings {
            if embeddings.len() != self.chunks.len() {
                return Err(RfpError::Serialization(format!(
                    "{} embeddings for {} chunks",
                    embeddings.len(),
                    self.chunks.len()
                )));
            }
            if let Some(first) = embeddings.first() {
                if embeddings.iter().any(|e| e.len() != first.len()) {
                    return Err(RfpError::Serialization(
                        "embeddings have mixed dimensions".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Attach embeddings for all chunks.
    #[cfg(feature = "embeddings")]
    pub fn embed_with(&mut self, model: &super::embeddings::EmbeddingModel) -> Result<()> {
        const BATCH_SIZE: usize = 32;

        let mut embeddings = Vec::with_capacity(self.chunks.len());
        for batch in self.chunks.chunks(BATCH_SIZE) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            embeddings.extend(model.embed_batch(&texts)?);
        }
        self.embeddings = Some(embeddings);
        self.embedding_model = Some(model.model_id().to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::build_corpus;
    use crate::records::SourceRecord;

    fn docs() -> Vec<CorpusDocument> {
        build_corpus(&[
            SourceRecord::new("도서관 리모델링", "서울시", "1000", "lib.hwp", "짧은 본문"),
            SourceRecord::new("교통 정보 시스템", "서울교통공사", "2000", "metro.pdf", "다".repeat(2500)),
        ])
    }

    #[test]
    fn test_build_assigns_sequential_ids() {
        let index = ChunkIndex::build(&docs(), &ChunkConfig::default());

        assert!(index.len() > 2);
        for (i, chunk) in index.chunks.iter().enumerate() {
            assert_eq!(chunk.id, i);
        }
        assert_eq!(index.chunks[0].source, "lib.hwp");
        assert_eq!(index.chunks[1].source, "metro.pdf");
        assert_eq!(index.chunks[1].ordinal, 0);
        assert_eq!(index.chunks[2].ordinal, 1);
        assert!(!index.has_embeddings());
    }

    #[test]
    fn test_first_chunk_carries_metadata() {
        let index = ChunkIndex::build(&docs(), &ChunkConfig::default());
        assert!(index.chunks[1].text.contains("- 기관: 서울교통공사"));
        assert_eq!(index.chunk_config(), ChunkConfig::default());
    }

    #[test]
    fn test_validate_rejects_gaps_and_misaligned_embeddings() {
        let mut index = ChunkIndex::build(&docs(), &ChunkConfig::default());
        assert!(index.validate().is_ok());

        index.embeddings = Some(vec![vec![1.0, 0.0]; index.len() - 1]);
        assert!(matches!(index.validate(), Err(RfpError::Serialization(_))));

        let mut mixed = vec![vec![1.0, 0.0]; index.len()];
        mixed[1] = vec![1.0];
        index.embeddings = Some(mixed);
        assert!(matches!(index.validate(), Err(RfpError::Serialization(_))));

        index.embeddings = None;
        index.chunks[1].id = 5;
        let err = index.validate().unwrap_err();
        assert!(err.to_string().contains("has id 5"));
    }
}
