//! Character-based chunking with overlap.

use serde::{Deserialize, Serialize};

/// Configuration for text chunking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// A span of a document's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub text: String,
    /// Start character position in the original text.
    pub start: usize,
    /// End character position (exclusive).
    pub end: usize,
}

/// Split text into overlapping spans, preferring to end a span right after a
/// sentence terminator or line break found in its last 100 characters.
///
/// A break is only taken when the span stays longer than the overlap, so the
/// next span always starts past the current one.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<TextSpan> {
    let mut spans = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let text_len = chars.len();

    if text_len == 0 || config.chunk_size == 0 {
        return spans;
    }

    let mut start = 0;

    while start < text_len {
        let end = (start + config.chunk_size).min(text_len);

        let adjusted_end = if end < text_len {
            let search_start = end.saturating_sub(100).max(start);
            chars[search_start..end]
                .iter()
                .rposition(|c| matches!(c, '.' | '!' | '?' | '\n'))
                .map(|pos| search_start + pos + 1)
                .filter(|&candidate| candidate > start + config.chunk_overlap)
                .unwrap_or(end)
        } else {
            end
        };

        let final_end = adjusted_end.max(start + 1).min(text_len);
        let span_text: String = chars[start..final_end].iter().collect();

        if !span_text.trim().is_empty() {
            spans.push(TextSpan {
                text: span_text.trim().to_string(),
                start,
                end: final_end,
            });
        }

        if final_end >= text_len {
            break;
        }

        let next_start = if config.chunk_overlap > 0 && final_end > config.chunk_overlap {
            final_end - config.chunk_overlap
        } else {
            final_end
        };

        // Always make progress.
        start = if next_start <= start { start + 1 } else { next_start };
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_text() {
        let text = "This is a test. Another sentence here. And one more.";
        let config = ChunkConfig {
            chunk_size: 20,
            chunk_overlap: 5,
        };

        let spans = chunk_text(text, &config);

        assert!(spans.len() > 1);
        for span in &spans {
            assert!(!span.text.is_empty());
            assert!(span.end - span.start <= 20);
        }
        assert_eq!(spans.last().unwrap().end, text.chars().count());
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let spans = chunk_text("사업 개요", &ChunkConfig::default());
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "사업 개요");
    }

    #[test]
    fn test_breaks_at_line_end() {
        let text = format!("{}\n{}", "가".repeat(50), "나".repeat(50));
        let config = ChunkConfig {
            chunk_size: 60,
            chunk_overlap: 0,
        };
        let spans = chunk_text(&text, &config);
        assert_eq!(spans[0].text, "가".repeat(50));
        assert_eq!(spans[1].text, "나".repeat(50));
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", &ChunkConfig::default()).is_empty());
    }

    #[test]
    fn test_chunk_config_default() {
        let config = ChunkConfig::default();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 200);
    }
}
