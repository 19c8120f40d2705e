//! Retrieval corpus built from source records.
//!
//! Each record with a text body becomes one [`CorpusDocument`]. The rendered
//! text starts with a metadata block (file kind, title, agency, budget) so
//! the facts the fixture asks about sit in the first chunk of every document.

use crate::llm::{Completion, Prompt, Prompts};
use crate::records::SourceRecord;
use serde::{Deserialize, Serialize};

/// Documents shorter than this are indexed as-is even in summary mode.
const MIN_SUMMARY_CHARS: usize = 100;
/// Characters of body text sent to the summarizer.
const SUMMARY_INPUT_CHARS: usize = 4000;
/// Characters kept when summarization fails.
const SUMMARY_FALLBACK_CHARS: usize = 500;

const SEPARATOR: &str = "================";

/// One document of the retrieval corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusDocument {
    /// File identifier of the originating record.
    pub source: String,
    pub title: String,
    pub agency: String,
    pub budget: String,
    pub file_kind: String,
    /// Raw text body.
    pub body: String,
    /// LLM summary, when the corpus was built in summary mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl CorpusDocument {
    /// Build a document from a record. Records without text are not indexed.
    pub fn from_record(record: &SourceRecord) -> Option<Self> {
        if !record.has_text() {
            return None;
        }
        Some(Self {
            source: record.file_name.clone(),
            title: display_or(&record.title, "무제"),
            agency: display_or(&record.agency, "알수없음"),
            budget: display_or(&record.budget, "0"),
            file_kind: record.file_kind.clone(),
            body: record.text.clone(),
            summary: None,
        })
    }

    /// Text handed to the chunker.
    pub fn render(&self) -> String {
        match &self.summary {
            Some(summary) => format!(
                "[[AI 요약 정보]]\n{}\n\n{}\n[[원본 상세 내용]]\n{}",
                summary, SEPARATOR, self.body
            ),
            None => format!(
                "[[문서 정보]]\n- 파일형식: {}\n- 사업명: {}\n- 기관: {}\n- 예산: {}\n{}\n{}",
                self.file_kind, self.title, self.agency, self.budget, SEPARATOR, self.body
            ),
        }
    }
}

fn display_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.trim().to_string()
    }
}

/// Build the corpus, skipping records with a blank text body.
pub fn build_corpus(records: &[SourceRecord]) -> Vec<CorpusDocument> {
    let docs: Vec<CorpusDocument> = records.iter().filter_map(CorpusDocument::from_record).collect();
    let skipped = records.len() - docs.len();
    if skipped > 0 {
        tracing::info!(skipped, "records without text excluded from corpus");
    }
    docs
}

/// Summarize every document in place.
///
/// A failed summary never aborts the build: the document keeps a shortened
/// copy of its body as summary instead.
pub async fn summarize_corpus(docs: &mut [CorpusDocument], completion: &dyn Completion) {
    let total = docs.len();
    for (idx, doc) in docs.iter_mut().enumerate() {
        if doc.body.chars().count() < MIN_SUMMARY_CHARS {
            continue;
        }
        let excerpt: String = doc.body.chars().take(SUMMARY_INPUT_CHARS).collect();
        let prompt = Prompts::document_summary()
            .replace("{file_kind}", &doc.file_kind)
            .replace("{title}", &doc.title)
            .replace("{agency}", &doc.agency)
            .replace("{text}", &excerpt);

        let summary = match completion.complete(&Prompt::user(prompt)).await {
            Ok(summary) => summary.trim().to_string(),
            Err(e) => {
                tracing::warn!(source = %doc.source, error = %e, "summary failed, keeping excerpt");
                let head: String = doc.body.chars().take(SUMMARY_FALLBACK_CHARS).collect();
                format!("{}...", head)
            }
        };
        doc.summary = Some(summary);
        tracing::debug!(done = idx + 1, total, "summarized document");
    }
}
