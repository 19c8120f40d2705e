//! Reciprocal-rank fusion of two retrievers.

use super::{Passage, Retriever};
use crate::error::Result;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// Rank offset of the fusion formula `1 / (k + rank)`.
const RRF_K: f32 = 60.0;
/// Each side contributes this many candidates per requested passage.
const CANDIDATE_FACTOR: usize = 4;

/// Combines a keyword and a vector retriever.
pub struct HybridRetriever {
    keyword: Arc<dyn Retriever>,
    vector: Arc<dyn Retriever>,
}

impl HybridRetriever {
    pub fn new(keyword: Arc<dyn Retriever>, vector: Arc<dyn Retriever>) -> Self {
        Self { keyword, vector }
    }
}

/// Fuse ranked lists; a chunk found by several lists sums its contributions.
fn fuse(lists: &[Vec<Passage>], top_k: usize) -> Vec<Passage> {
    let mut fused: HashMap<usize, (f32, Passage)> = HashMap::new();
    for list in lists {
        for (rank, passage) in list.iter().enumerate() {
            let contribution = 1.0 / (RRF_K + rank as f32 + 1.0);
            fused
                .entry(passage.metadata.chunk_id)
                .and_modify(|(score, _)| *score += contribution)
                .or_insert_with(|| (contribution, passage.clone()));
        }
    }

    let mut ranked: Vec<Passage> = fused
        .into_values()
        .map(|(score, mut passage)| {
            passage.score = score;
            passage
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.metadata.chunk_id.cmp(&b.metadata.chunk_id))
    });
    ranked.truncate(top_k);
    ranked
}

#[async_trait]
impl Retriever for HybridRetriever {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Passage>> {
        let candidates = top_k.saturating_mul(CANDIDATE_FACTOR);
        let (keyword, vector) = tokio::try_join!(
            self.keyword.retrieve(query, candidates),
            self.vector.retrieve(query, candidates),
        )?;
        Ok(fuse(&[keyword, vector], top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RfpError;
    use crate::retrieval::PassageMetadata;

    struct Fixed(Vec<usize>);

    #[async_trait]
    impl Retriever for Fixed {
        async fn retrieve(&self, _query: &str, top_k: usize) -> Result<Vec<Passage>> {
            Ok(self
                .0
                .iter()
                .take(top_k)
                .map(|&id| Passage {
                    text: format!("chunk {}", id),
                    metadata: PassageMetadata {
                        source: format!("doc{}.hwp", id),
                        title: String::new(),
                        chunk_id: id,
                    },
                    score: 1.0,
                })
                .collect())
        }
    }

    struct Broken;

    #[async_trait]
    impl Retriever for Broken {
        async fn retrieve(&self, _query: &str, _top_k: usize) -> Result<Vec<Passage>> {
            Err(RfpError::Retrieval("index offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_chunks_found_by_both_rank_first() {
        let hybrid = HybridRetriever::new(Arc::new(Fixed(vec![1, 2, 3])), Arc::new(Fixed(vec![3, 4, 1])));
        let passages = hybrid.retrieve("q", 3).await.unwrap();
        let ids: Vec<usize> = passages.iter().map(|p| p.metadata.chunk_id).collect();

        // 1 and 3 appear in both lists with equal fused scores; ties go to the lower id.
        assert_eq!(ids, vec![1, 3, 2]);
    }

    #[tokio::test]
    async fn test_results_are_deduplicated() {
        let hybrid = HybridRetriever::new(Arc::new(Fixed(vec![7, 8])), Arc::new(Fixed(vec![7, 8])));
        let passages = hybrid.retrieve("q", 10).await.unwrap();
        assert_eq!(passages.len(), 2);
    }

    #[tokio::test]
    async fn test_side_failure_propagates() {
        let hybrid = HybridRetriever::new(Arc::new(Fixed(vec![1])), Arc::new(Broken));
        assert!(hybrid.retrieve("q", 3).await.is_err());
    }
}
