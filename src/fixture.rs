//! Evaluation fixtures derived from source records.
//!
//! Every record with a title yields three questions, always in the same
//! order: budget, issuing agency, file kind. The builder is a pure function of
//! its inputs, so the same record table and sample size always produce the
//! same fixture.

use crate::error::{Result, RfpError};
use crate::records::SourceRecord;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Questions generated per qualifying record.
pub const QUESTIONS_PER_RECORD: usize = 3;

/// Which record field a fixture question asks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Budget,
    Agency,
    FileKind,
}

impl QuestionKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Budget => "budget",
            Self::Agency => "agency",
            Self::FileKind => "file_kind",
        }
    }
}

/// A single evaluable question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureItem {
    pub question: String,
    pub expected_answer: String,
    /// File identifier of the record the question came from. Never graded.
    pub source_id: String,
    pub kind: QuestionKind,
}

/// Derives fixture items from source records.
pub struct FixtureBuilder;

impl FixtureBuilder {
    /// Build the fixture for `records`.
    ///
    /// With `sample_size`, only the first `ceil(sample_size / 3)` titled records
    /// are used and the result is cut to exactly `sample_size` items, so the
    /// last record's triple may be partial.
    pub fn build(records: &[SourceRecord], sample_size: Option<usize>) -> Vec<FixtureItem> {
        let qualifying = records.iter().filter(|r| r.has_title());

        let record_limit = sample_size
            .map(|n| n.div_ceil(QUESTIONS_PER_RECORD))
            .unwrap_or(usize::MAX);

        let mut items: Vec<FixtureItem> = qualifying
            .take(record_limit)
            .flat_map(Self::questions_for)
            .collect();

        if let Some(n) = sample_size {
            items.truncate(n);
        }
        items
    }

    fn questions_for(record: &SourceRecord) -> [FixtureItem; QUESTIONS_PER_RECORD] {
        let title = record.title.trim();
        let source_id = record.file_name.clone();
        [
            FixtureItem {
                question: format!("{}의 예산은 얼마인가?", title),
                expected_answer: record.budget.clone(),
                source_id: source_id.clone(),
                kind: QuestionKind::Budget,
            },
            FixtureItem {
                question: format!("{}의 발주 기관은 어디인가?", title),
                expected_answer: record.agency.clone(),
                source_id: source_id.clone(),
                kind: QuestionKind::Agency,
            },
            FixtureItem {
                question: format!("'{}' 문서의 파일 확장자는 무엇인가?", record.file_name),
                expected_answer: record.file_kind.clone(),
                source_id,
                kind: QuestionKind::FileKind,
            },
        ]
    }
}

/// Save a fixture as pretty JSON.
pub fn save_fixture(items: &[FixtureItem], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| RfpError::io(parent, e))?;
        }
    }
    let content =
        serde_json::to_string_pretty(items).map_err(|e| RfpError::Serialization(e.to_string()))?;
    fs::write(path, content).map_err(|e| RfpError::io(path, e))
}

/// Load a fixture saved by [`save_fixture`].
pub fn load_fixture(path: &Path) -> Result<Vec<FixtureItem>> {
    let content = fs::read_to_string(path).map_err(|e| RfpError::io(path, e))?;
    let items: Vec<FixtureItem> =
        serde_json::from_str(&content).map_err(|e| RfpError::Serialization(e.to_string()))?;
    if let Some(pos) = items.iter().position(|i| i.question.trim().is_empty()) {
        return Err(RfpError::Serialization(format!(
            "fixture item {} has an empty question",
            pos + 1
        )));
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(title: &str, n: usize) -> SourceRecord {
        SourceRecord::new(
            title,
            format!("기관{}", n),
            format!("{}000000", n),
            format!("doc_{}.hwp", n),
            "본문",
        )
    }

    fn records(n: usize) -> Vec<SourceRecord> {
        (1..=n).map(|i| record(&format!("사업{}", i), i)).collect()
    }

    #[test]
    fn test_blank_title_is_skipped() {
        let records = vec![
            SourceRecord::new("", "x", "1", "x.pdf", "..."),
            SourceRecord::new("Acme Rebuild", "City Hall", "100000", "plan.hwp", "..."),
        ];
        let items = FixtureBuilder::build(&records, None);

        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| i.source_id == "plan.hwp"));
        assert_eq!(items[0].expected_answer, "100000");
        assert_eq!(items[1].expected_answer, "City Hall");
        assert_eq!(items[2].expected_answer, "hwp");
        assert_eq!(
            items.iter().map(|i| i.kind).collect::<Vec<_>>(),
            vec![QuestionKind::Budget, QuestionKind::Agency, QuestionKind::FileKind]
        );
    }

    #[test]
    fn test_missing_extension_is_unknown() {
        let records = vec![SourceRecord::new("사업", "기관", "1", "공고문", "본문")];
        let items = FixtureBuilder::build(&records, None);
        assert_eq!(items[2].expected_answer, "unknown");
    }

    #[test]
    fn test_length_formula() {
        let mut recs = records(4);
        recs.insert(1, SourceRecord::new("  ", "", "", "", ""));
        let qualifying = 4;

        assert_eq!(FixtureBuilder::build(&recs, None).len(), 3 * qualifying);
        for n in 0..=15 {
            let items = FixtureBuilder::build(&recs, Some(n));
            assert_eq!(items.len(), n.min(3 * qualifying), "sample_size={}", n);
        }
    }

    #[test]
    fn test_partial_triple_when_not_multiple_of_three() {
        let items = FixtureBuilder::build(&records(5), Some(5));
        assert_eq!(items.len(), 5);
        assert_eq!(items[3].source_id, "doc_2.hwp");
        assert_eq!(items[4].kind, QuestionKind::Agency);
    }

    #[test]
    fn test_build_is_deterministic() {
        let recs = records(6);
        assert_eq!(
            FixtureBuilder::build(&recs, Some(10)),
            FixtureBuilder::build(&recs, Some(10))
        );
        assert_eq!(FixtureBuilder::build(&recs, None), FixtureBuilder::build(&recs, None));
    }

    #[test]
    fn test_questions_are_non_empty() {
        for item in FixtureBuilder::build(&records(3), None) {
            assert!(!item.question.trim().is_empty());
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fixtures/eval.json");

        let items = FixtureBuilder::build(&records(2), None);
        save_fixture(&items, &path).unwrap();
        assert_eq!(load_fixture(&path).unwrap(), items);
    }
}
