//! Tabular source records.
//!
//! The RFP list is a CSV file with one row per procurement document. Column
//! names follow the Korean export (`사업명`, `발주 기관`, `사업 금액`, `파일명`,
//! `텍스트`); English aliases are accepted as well. Missing columns and cells
//! resolve to empty strings here, once, so nothing downstream has to guess.

use crate::error::{Result, RfpError};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::io::Read;
use std::path::Path;

/// Value used when a file identifier carries no extension.
pub const UNKNOWN_FILE_KIND: &str = "unknown";

const TITLE_COLUMNS: &[&str] = &["사업명", "title"];
const AGENCY_COLUMNS: &[&str] = &["발주 기관", "발주기관", "agency"];
const BUDGET_COLUMNS: &[&str] = &["사업 금액", "사업금액", "budget"];
const FILE_COLUMNS: &[&str] = &["파일명", "file_name", "file_identifier"];
const TEXT_COLUMNS: &[&str] = &["텍스트", "text"];

/// One procurement document's metadata and raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Project title.
    pub title: String,
    /// Issuing agency.
    pub agency: String,
    /// Budget exactly as it appears in the source table.
    pub budget: String,
    /// File identifier (file name of the original document).
    pub file_name: String,
    /// Lower-cased extension of `file_name`, or [`UNKNOWN_FILE_KIND`].
    pub file_kind: String,
    /// Raw text body.
    pub text: String,
}

impl SourceRecord {
    /// Create a record; all fields are trimmed and the file kind is derived.
    pub fn new(
        title: impl Into<String>,
        agency: impl Into<String>,
        budget: impl Into<String>,
        file_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let file_name = file_name.into().trim().to_string();
        let file_kind = file_extension(&file_name).unwrap_or_else(|| UNKNOWN_FILE_KIND.to_string());
        Self {
            title: title.into().trim().to_string(),
            agency: agency.into().trim().to_string(),
            budget: budget.into().trim().to_string(),
            file_name,
            file_kind,
            text: text.into(),
        }
    }

    /// Whether the record has a usable title.
    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }

    /// Whether the record has a usable text body.
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Extension of a file name, lower-cased and without the leading dot.
///
/// Dot-files (".env") and trailing dots ("report.") have no extension.
pub fn file_extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_lowercase())
}

/// Load records from a CSV file.
pub fn load_records(path: &Path) -> Result<Vec<SourceRecord>> {
    if !path.exists() {
        return Err(RfpError::InvalidRecords(format!(
            "record file not found: {}",
            path.display()
        )));
    }
    let file = std::fs::File::open(path).map_err(|e| RfpError::io(path, e))?;
    let records = parse_records(file)?;
    tracing::info!(path = %path.display(), count = records.len(), "loaded source records");
    Ok(records)
}

/// Decode CSV bytes as UTF-8, falling back to CP949 (EUC-KR) for legacy
/// Korean exports.
fn decode_text(bytes: &[u8]) -> Result<Cow<'_, str>> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(Cow::Borrowed(text));
    }
    encoding_rs::EUC_KR
        .decode_without_bom_handling_and_without_replacement(bytes)
        .inspect(|_| tracing::debug!("record file decoded as CP949"))
        .ok_or_else(|| RfpError::InvalidRecords("record file is neither UTF-8 nor CP949".to_string()))
}

/// Parse records from any CSV reader (UTF-8 or CP949).
pub fn parse_records<R: Read>(mut reader: R) -> Result<Vec<SourceRecord>> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| RfpError::InvalidRecords(format!("failed to read records: {}", e)))?;
    let text = decode_text(&bytes)?;

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let find = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
    };

    let title_col = find(TITLE_COLUMNS).ok_or_else(|| {
        RfpError::InvalidRecords(format!(
            "missing title column (expected one of {:?}), found {:?}",
            TITLE_COLUMNS, headers
        ))
    })?;
    let agency_col = find(AGENCY_COLUMNS);
    let budget_col = find(BUDGET_COLUMNS);
    let file_col = find(FILE_COLUMNS);
    let text_col = find(TEXT_COLUMNS);

    let mut records = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| {
            RfpError::InvalidRecords(format!("CSV parse error at row {}: {}", row + 1, e))
        })?;
        let cell = |col: Option<usize>| col.and_then(|c| record.get(c)).unwrap_or("").to_string();

        records.push(SourceRecord::new(
            cell(Some(title_col)),
            cell(agency_col),
            cell(budget_col),
            cell(file_col),
            cell(text_col),
        ));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("plan.HWP").as_deref(), Some("hwp"));
        assert_eq!(file_extension("notice.final.pdf").as_deref(), Some("pdf"));
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension(".env"), None);
        assert_eq!(file_extension("report."), None);
    }

    #[test]
    fn test_record_defaults() {
        let record = SourceRecord::new("  Acme Rebuild ", "City Hall", "", "plan", "");
        assert_eq!(record.title, "Acme Rebuild");
        assert_eq!(record.file_kind, UNKNOWN_FILE_KIND);
        assert!(record.has_title());
        assert!(!record.has_text());
    }

    #[test]
    fn test_parse_korean_headers() {
        let csv = "\u{feff}공고 번호,사업명,사업 금액,발주 기관,파일명,텍스트\n\
                   1,통합 정보시스템 구축,130000000,한영대학교,rfp_01.hwp,사업 개요\n\
                   2,,50000000,서울교통공사,rfp_02.pdf,\n";
        let records = parse_records(csv.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "통합 정보시스템 구축");
        assert_eq!(records[0].agency, "한영대학교");
        assert_eq!(records[0].budget, "130000000");
        assert_eq!(records[0].file_kind, "hwp");
        assert!(records[0].has_text());
        assert!(!records[1].has_title());
    }

    #[test]
    fn test_parse_english_headers_with_missing_columns() {
        let csv = "title,file_name\nAcme Rebuild,plan.hwp\n";
        let records = parse_records(csv.as_bytes()).unwrap();
        assert_eq!(records[0].agency, "");
        assert_eq!(records[0].budget, "");
        assert_eq!(records[0].text, "");
    }

    #[test]
    fn test_missing_title_column_is_input_error() {
        let csv = "agency,budget\nCity Hall,100\n";
        let err = parse_records(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, RfpError::InvalidRecords(_)));
    }

    #[test]
    fn test_load_records_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "사업명,발주 기관,사업 금액,파일명,텍스트").unwrap();
        writeln!(file, "도서관 리모델링,서울시,\"1,000,000\",lib.docx,본문").unwrap();

        let records = load_records(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].budget, "1,000,000");
        assert_eq!(records[0].file_kind, "docx");
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_records(Path::new("/nonexistent/data_list.csv")).is_err());
    }

    #[test]
    fn test_parse_cp949_records() {
        // "사업명,텍스트\n가,나\n" in CP949.
        let bytes: &[u8] = &[
            0xbb, 0xe7, 0xbe, 0xf7, 0xb8, 0xed, b',', 0xc5, 0xd8, 0xbd, 0xba, 0xc6, 0xae, b'\n',
            0xb0, 0xa1, b',', 0xb3, 0xaa, b'\n',
        ];
        let records = parse_records(bytes).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "가");
        assert_eq!(records[0].text, "나");
    }

    #[test]
    fn test_load_cp949_file() {
        let (encoded, _, _) = encoding_rs::EUC_KR.encode("사업명,발주 기관,파일명\n도서관,서울시,a.hwp\n");
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&encoded).unwrap();

        let records = load_records(file.path()).unwrap();
        assert_eq!(records[0].agency, "서울시");
        assert_eq!(records[0].file_kind, "hwp");
    }

    #[test]
    fn test_undecodable_bytes_are_input_error() {
        let err = parse_records(&[0xff, 0xff, b'\n'][..]).unwrap_err();
        assert!(matches!(err, RfpError::InvalidRecords(_)));
    }
}
