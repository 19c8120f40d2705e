//! BM25 keyword retrieval.
//!
//! Korean attaches particles to nouns ("서울교통공사의"), so whole-word
//! matching alone misses most hits. Every Hangul token longer than two
//! characters also contributes its character bigrams.

use super::index::ChunkIndex;
use super::{Passage, Retriever, rank};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

const K1: f32 = 1.5;
const B: f32 = 0.75;

fn is_hangul(c: char) -> bool {
    matches!(c, '\u{AC00}'..='\u{D7A3}' | '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}')
}

/// Lower-cased alphanumeric runs plus Hangul bigrams.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        let word = word.to_lowercase();
        let chars: Vec<char> = word.chars().collect();
        if chars.len() > 2 && chars.iter().any(|&c| is_hangul(c)) {
            tokens.extend(chars.windows(2).map(|pair| pair.iter().collect::<String>()));
        }
        tokens.push(word);
    }
    tokens
}

/// Okapi BM25 over the chunk index.
pub struct KeywordRetriever {
    index: Arc<ChunkIndex>,
    /// term -> (chunk position, term frequency), in chunk order.
    postings: HashMap<String, Vec<(usize, u32)>>,
    chunk_lengths: Vec<usize>,
    avg_length: f32,
}

impl KeywordRetriever {
    pub fn new(index: Arc<ChunkIndex>) -> Self {
        let mut postings: HashMap<String, Vec<(usize, u32)>> = HashMap::new();
        let mut chunk_lengths = Vec::with_capacity(index.len());

        for (pos, chunk) in index.chunks.iter().enumerate() {
            let tokens = tokenize(&chunk.text);
            chunk_lengths.push(tokens.len());

            let mut counts: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *counts.entry(token).or_default() += 1;
            }
            for (term, tf) in counts {
                postings.entry(term).or_default().push((pos, tf));
            }
        }

        let total: usize = chunk_lengths.iter().sum();
        let avg_length = if chunk_lengths.is_empty() {
            0.0
        } else {
            total as f32 / chunk_lengths.len() as f32
        };

        Self {
            index,
            postings,
            chunk_lengths,
            avg_length,
        }
    }

    /// BM25 score of every chunk for `query`, by position in the index.
    pub fn scores(&self, query: &str) -> Vec<f32> {
        let n = self.chunk_lengths.len();
        let mut scores = vec![0.0f32; n];
        if n == 0 || self.avg_length == 0.0 {
            return scores;
        }

        let terms: BTreeSet<String> = tokenize(query).into_iter().collect();
        for term in &terms {
            let Some(postings) = self.postings.get(term) else {
                continue;
            };
            let df = postings.len() as f32;
            let idf = ((n as f32 - df + 0.5) / (df + 0.5) + 1.0).ln();

            for &(pos, tf) in postings {
                let tf = tf as f32;
                let norm = 1.0 - B + B * self.chunk_lengths[pos] as f32 / self.avg_length;
                scores[pos] += idf * tf * (K1 + 1.0) / (tf + K1 * norm);
            }
        }
        scores
    }
}

#[async_trait]
impl Retriever for KeywordRetriever {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Passage>> {
        let scores = self.scores(query);
        let matched = scores
            .into_iter()
            .enumerate()
            .filter(|&(_, score)| score > 0.0);
        Ok(rank(&self.index, matched, top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::build_corpus;
    use crate::records::SourceRecord;
    use crate::retrieval::ChunkConfig;

    fn retriever() -> KeywordRetriever {
        let docs = build_corpus(&[
            SourceRecord::new("도서관 리모델링", "서울특별시", "1000", "lib.hwp", "열람실 좌석 교체"),
            SourceRecord::new("지하철 신호 개량", "서울교통공사", "2000", "metro.pdf", "신호 설비 교체"),
            SourceRecord::new("Smart Farm", "농촌진흥청", "3000", "farm.docx", "sensor network rollout"),
        ]);
        KeywordRetriever::new(Arc::new(ChunkIndex::build(&docs, &ChunkConfig::default())))
    }

    #[test]
    fn test_tokenize_adds_hangul_bigrams() {
        let tokens = tokenize("서울교통공사의 Budget, 2024");
        assert!(tokens.contains(&"서울교통공사의".to_string()));
        assert!(tokens.contains(&"교통".to_string()));
        assert!(tokens.contains(&"budget".to_string()));
        assert!(tokens.contains(&"2024".to_string()));
        assert!(!tokens.contains(&"bu".to_string()));
    }

    #[test]
    fn test_short_hangul_words_are_kept_whole() {
        assert_eq!(tokenize("예산"), vec!["예산".to_string()]);
    }

    #[tokio::test]
    async fn test_particle_attached_query_matches() {
        let passages = retriever()
            .retrieve("서울교통공사의 사업 금액은?", 3)
            .await
            .unwrap();
        assert_eq!(passages[0].metadata.source, "metro.pdf");
    }

    #[tokio::test]
    async fn test_case_insensitive_and_top_k() {
        let retriever = retriever();
        let passages = retriever.retrieve("SENSOR", 3).await.unwrap();
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].metadata.source, "farm.docx");

        let passages = retriever.retrieve("교체", 1).await.unwrap();
        assert_eq!(passages.len(), 1);
    }

    #[tokio::test]
    async fn test_no_match_returns_nothing() {
        let passages = retriever().retrieve("zzz", 3).await.unwrap();
        assert!(passages.is_empty());
    }

    #[test]
    fn test_scores_follow_positions_not_ids() {
        let docs = build_corpus(&[
            SourceRecord::new("도서관 리모델링", "서울특별시", "1000", "lib.hwp", "열람실 좌석 교체"),
            SourceRecord::new("지하철 신호 개량", "서울교통공사", "2000", "metro.pdf", "신호 설비 교체"),
        ]);
        let mut index = ChunkIndex::build(&docs, &ChunkConfig::default());
        index.chunks[1].id = 5;

        let scores = KeywordRetriever::new(Arc::new(index)).scores("서울교통공사");
        assert_eq!(scores.len(), 2);
        assert!(scores[1] > scores[0]);
    }
}
