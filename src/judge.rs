//! Answer grading.
//!
//! Both judges apply the same tolerance policy:
//!
//! - amounts are compared by value, so `1.3억원`, `130,000,000원` and
//!   `1억 3천만 원` are the same answer
//! - institution names are compared after dropping corporate markers and
//!   the `대학교`/`대학` suffix variation
//! - for file-kind questions, the literal extension or the document genre
//!   (제안요청서, RFP, 공고문, ...) both count
//! - an answer that says the information is missing is wrong whenever an
//!   expected answer exists
//!
//! [`LlmJudge`] asks a model with a rubric prompt and fails closed on any
//! reply that is not clearly affirmative. [`RuleJudge`] is the deterministic
//! local version.

use crate::error::{Result, RfpError};
use crate::llm::{Completion, Prompt, Prompts};
use crate::records::UNKNOWN_FILE_KIND;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Grades one produced answer against the expected answer.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(&self, question: &str, expected: &str, produced: &str) -> Result<bool>;
}

/// Interpretation of an oracle reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleVerdict {
    Correct,
    Incorrect,
    Ambiguous,
}

impl OracleVerdict {
    pub fn is_correct(self) -> bool {
        self == OracleVerdict::Correct
    }
}

const AFFIRMATIVE_WORDS: &[&str] = &["correct", "yes", "true", "pass"];
const NEGATIVE_WORDS: &[&str] = &["incorrect", "wrong", "no", "false", "fail"];
const NEGATED_CORRECT: &[&str] = &["정답이아", "정답아님", "정답은아니", "정답이라고할수없"];

/// Read a verdict out of a free-text reply.
///
/// Exactly one of the two signals must be present; mixed or missing signals
/// are ambiguous.
pub fn parse_verdict(reply: &str) -> OracleVerdict {
    let compact: String = reply.chars().filter(|c| !c.is_whitespace()).collect();
    let words: Vec<String> = reply
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_ascii_lowercase())
        .collect();
    let has_word = |list: &[&str]| words.iter().any(|w| list.contains(&w.as_str()));

    let negated = NEGATED_CORRECT.iter().any(|p| compact.contains(p));
    let affirmative = (compact.contains("정답") && !negated) || has_word(AFFIRMATIVE_WORDS);
    let negative = compact.contains("오답") || negated || has_word(NEGATIVE_WORDS);

    match (affirmative, negative) {
        (true, false) => OracleVerdict::Correct,
        (false, true) => OracleVerdict::Incorrect,
        _ => OracleVerdict::Ambiguous,
    }
}

/// Judge backed by a language model.
pub struct LlmJudge {
    completion: Arc<dyn Completion>,
}

impl LlmJudge {
    pub fn new(completion: Arc<dyn Completion>) -> Self {
        Self { completion }
    }
}

#[async_trait]
impl Judge for LlmJudge {
    async fn judge(&self, question: &str, expected: &str, produced: &str) -> Result<bool> {
        let prompt = Prompts::judge_answer()
            .replace("{question}", question)
            .replace("{expected}", expected)
            .replace("{produced}", produced);

        let reply = self.completion.complete(&Prompt::user(prompt)).await?;
        let verdict = parse_verdict(&reply);
        if verdict == OracleVerdict::Ambiguous {
            tracing::debug!(reply = %reply.trim(), "ambiguous judge reply counted as incorrect");
        } else {
            tracing::debug!(reply = %reply.trim(), ?verdict, "judge reply");
        }
        Ok(verdict.is_correct())
    }
}

/// Caps concurrent calls into a judge shared by several runs.
pub struct BoundedJudge<'a> {
    inner: &'a dyn Judge,
    permits: Semaphore,
}

impl<'a> BoundedJudge<'a> {
    pub fn new(inner: &'a dyn Judge, limit: usize) -> Self {
        Self {
            inner,
            permits: Semaphore::new(limit.max(1)),
        }
    }
}

#[async_trait]
impl<'a> Judge for BoundedJudge<'a> {
    async fn judge(&self, question: &str, expected: &str, produced: &str) -> Result<bool> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| RfpError::LlmApi(format!("judge limiter closed: {}", e)))?;
        self.inner.judge(question, expected, produced).await
    }
}

/// File extensions recognised as answers to file-kind questions.
const FILE_EXTENSIONS: &[&str] = &[
    "hwp", "hwpx", "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt",
];

/// Genre terms that satisfy a file-kind question.
const DOCUMENT_GENRES: &[&str] = &[
    "제안요청서",
    "rfp",
    "공고문",
    "입찰공고",
    "과업지시서",
    "제안서",
    "사업계획서",
];

/// Phrases saying the information is missing (compared without whitespace).
const ABSENCE_PHRASES: &[&str] = &[
    "찾을수없",
    "알수없",
    "확인할수없",
    "확인되지않",
    "정보가없",
    "나와있지않",
    "언급되어있지않",
    "명시되어있지않",
    "모르",
    "don'tknow",
    "donotknow",
    "notfound",
    "noinformation",
    "cannotfind",
    "can'tfind",
    "notmentioned",
];

/// Deterministic judge implementing the tolerance policy with string rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleJudge;

impl RuleJudge {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous grading; the [`Judge`] impl delegates here.
    pub fn grade(&self, question: &str, expected: &str, produced: &str) -> bool {
        let expected = expected.trim();
        let produced = produced.trim();

        if expected.is_empty() {
            return produced.is_empty() || signals_absence(produced);
        }
        if produced.is_empty() || signals_absence(produced) {
            return false;
        }

        let ext = expected.trim_start_matches('.').to_lowercase();
        if asks_file_kind(question) || FILE_EXTENSIONS.contains(&ext.as_str()) || is_genre(expected) {
            return file_kind_matches(&ext, produced);
        }

        if let Some(amount) = parse_amount(expected) {
            return find_amounts(produced)
                .into_iter()
                .any(|found| same_amount(found, amount));
        }

        let expected = normalize_name(expected);
        !expected.is_empty() && normalize_name(produced).contains(&expected)
    }
}

#[async_trait]
impl Judge for RuleJudge {
    async fn judge(&self, question: &str, expected: &str, produced: &str) -> Result<bool> {
        Ok(self.grade(question, expected, produced))
    }
}

fn signals_absence(text: &str) -> bool {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .map(|c| if c == '’' { '\'' } else { c })
        .collect();
    ABSENCE_PHRASES.iter().any(|p| compact.contains(p))
}

/// Markers of a question about the document's file kind.
const FILE_KIND_MARKERS: &[&str] = &[
    "확장자",
    "문서유형",
    "파일유형",
    "파일형식",
    "문서형식",
    "extension",
    "filetype",
];

fn asks_file_kind(question: &str) -> bool {
    let compact = compact_lower(question);
    FILE_KIND_MARKERS.iter().any(|m| compact.contains(m))
}

/// The expected extension, or a genre term when no other extension is named.
///
/// `expected` may be a literal extension (listed or not), a genre term or
/// `unknown`; the last two accept any genre term or known extension.
fn file_kind_matches(expected: &str, produced: &str) -> bool {
    let lowered = produced.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let names_genre = || {
        let compact = compact_lower(produced);
        DOCUMENT_GENRES.iter().any(|genre| compact.contains(genre))
    };

    if expected == UNKNOWN_FILE_KIND || is_genre(expected) {
        return names_genre() || words.iter().any(|w| FILE_EXTENSIONS.contains(w));
    }
    if words.contains(&expected) {
        return true;
    }
    if words.iter().any(|w| FILE_EXTENSIONS.contains(w)) {
        return false;
    }
    names_genre()
}

fn compact_lower(text: &str) -> String {
    text.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect()
}

/// Whether the whole text is a document genre term such as `제안요청서`.
fn is_genre(text: &str) -> bool {
    let compact = compact_lower(text);
    DOCUMENT_GENRES.contains(&compact.as_str())
}

/// Lower-case, drop corporate markers and punctuation, fold `대학교` to `대학`.
fn normalize_name(text: &str) -> String {
    let lowered = text
        .to_lowercase()
        .replace("주식회사", "")
        .replace("(주)", "")
        .replace('㈜', "")
        .replace("대학교", "대학");
    lowered.chars().filter(|c| c.is_alphanumeric()).collect()
}

fn same_amount(a: f64, b: f64) -> bool {
    (a - b).abs() < 0.5 + b.abs() * 1e-9
}

fn unit_value(c: char) -> Option<(f64, bool)> {
    match c {
        '십' => Some((10.0, false)),
        '백' => Some((100.0, false)),
        '천' => Some((1_000.0, false)),
        '만' => Some((1e4, true)),
        '억' => Some((1e8, true)),
        '조' => Some((1e12, true)),
        _ => None,
    }
}

/// Value of a compact amount expression such as `1억3천만` or `130,000,000`.
///
/// Small units (십, 백, 천) multiply the number before them; large units
/// (만, 억, 조) close a section.
fn amount_value(expr: &str) -> Option<f64> {
    let chars: Vec<char> = expr.chars().collect();
    let mut total = 0.0;
    let mut section = 0.0;
    let mut number: Option<f64> = None;
    let mut seen_digit = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() {
            let begin = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == ',' || chars[i] == '.') {
                i += 1;
            }
            let literal: String = chars[begin..i].iter().filter(|&&c| c != ',').collect();
            number = Some(literal.trim_end_matches('.').parse().ok()?);
            seen_digit = true;
            continue;
        }
        match unit_value(c)? {
            (unit, false) => section += number.take().unwrap_or(1.0) * unit,
            (unit, true) => {
                section += number.take().unwrap_or(0.0);
                if section == 0.0 {
                    section = 1.0;
                }
                total += section * unit;
                section = 0.0;
            }
        }
        i += 1;
    }

    seen_digit.then(|| total + section + number.unwrap_or(0.0))
}

/// Parse text that is nothing but an amount (`"1.3억원"`, `"130000000"`).
pub fn parse_amount(text: &str) -> Option<f64> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let compact = compact.trim_end_matches('원');
    if compact.is_empty() {
        return None;
    }
    amount_value(compact)
}

/// Every amount mentioned in free text, in order of appearance.
pub fn find_amounts(text: &str) -> Vec<f64> {
    let chars: Vec<char> = text.chars().collect();
    let is_digit = |i: usize| chars.get(i).is_some_and(|c| c.is_ascii_digit());
    let is_unit = |i: usize| chars.get(i).is_some_and(|&c| unit_value(c).is_some());

    let mut amounts = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if !is_digit(i) {
            i += 1;
            continue;
        }

        let mut expr = String::new();
        while i < chars.len() {
            let c = chars[i];
            let separator = (c == ',' || c == '.') && i > 0 && is_digit(i - 1) && is_digit(i + 1);
            if c.is_ascii_digit() || separator || is_unit(i) {
                expr.push(c);
                i += 1;
            } else if c.is_whitespace() && i > 0 && is_unit(i - 1) {
                // "1억 3천만": a space after a unit continues the amount.
                let mut next = i;
                while chars.get(next).is_some_and(|c| c.is_whitespace()) {
                    next += 1;
                }
                if is_digit(next) || is_unit(next) {
                    i = next;
                } else {
                    break;
                }
            } else {
                break;
            }
        }

        if let Some(value) = amount_value(&expr) {
            amounts.push(value);
        }
    }
    amounts
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::block_on;

    fn grade(expected: &str, produced: &str) -> bool {
        block_on(RuleJudge::new().judge("질문", expected, produced)).unwrap()
    }

    const FILE_KIND_QUESTION: &str = "'bundle.zip' 문서의 파일 확장자는 무엇인가?";

    #[test]
    fn test_amounts_match_across_formats() {
        assert!(grade("130,000,000원", "1.3억원"));
        assert!(grade("130000000", "사업 예산은 1억 3천만 원입니다."));
        assert!(grade("1.3억원", "130,000,000원 (VAT 포함)"));
        assert!(!grade("130,000,000원", "50,000,000원"));
        assert!(!grade("130000000", "예산은 공고문을 참고하세요."));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1억 3천만 원"), Some(130_000_000.0));
        assert_eq!(parse_amount("5천만원"), Some(50_000_000.0));
        assert_eq!(parse_amount("13억 5,000만원"), Some(1_350_000_000.0));
        assert_eq!(parse_amount("천만원"), None);
        assert_eq!(parse_amount("서울시"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn test_find_amounts_in_sentence() {
        let found = find_amounts("2024년 사업으로, 예산은 1억 3천만 원입니다.");
        assert_eq!(found, vec![2024.0, 130_000_000.0]);
    }

    #[test]
    fn test_institution_suffix_variation() {
        assert!(grade("한영대학", "발주 기관은 한영대학교입니다."));
        assert!(grade("한영대학교", "한영대학"));
        assert!(grade("(주)한국정보", "한국정보 주식회사"));
        assert!(!grade("서울교통공사", "부산교통공사"));
    }

    #[test]
    fn test_file_kind_either_or() {
        assert!(grade("hwp", "hwp"));
        assert!(grade("hwp", "이 문서는 제안요청서(RFP)입니다."));
        assert!(grade("pdf", "PDF 파일입니다."));
        assert!(grade("hwp", "공고문 입니다"));
        assert!(!grade("hwp", "pdf 형식의 제안요청서입니다."));
        assert!(!grade("hwp", "워드 문서입니다."));

        assert!(grade("hwp", "제안요청서"));
        assert!(grade("제안요청서", "hwp"));
        assert!(grade("RFP", "공고문 PDF 파일"));
        assert!(!grade("제안요청서", "서울시"));
    }

    #[test]
    fn test_file_kind_question_accepts_genre_for_any_extension() {
        let judge = RuleJudge::new();
        assert!(judge.grade(FILE_KIND_QUESTION, "zip", "제안요청서입니다"));
        assert!(judge.grade(FILE_KIND_QUESTION, "zip", "zip 압축 파일"));
        assert!(!judge.grade(FILE_KIND_QUESTION, "zip", "hwp 문서입니다"));
        assert!(judge.grade("'memo.odt' 문서의 파일 확장자는 무엇인가?", "odt", "공고문(RFP)"));
        assert!(!judge.grade(FILE_KIND_QUESTION, "zip", "서울교통공사"));
        assert!(judge.grade("이 공고의 문서 유형은?", "제안요청서", "RFP"));
    }

    #[test]
    fn test_unknown_file_kind_accepts_genre() {
        let judge = RuleJudge::new();
        let question = "'공고' 문서의 파일 확장자는 무엇인가?";
        assert!(judge.grade(question, "unknown", "제안요청서입니다"));
        assert!(judge.grade(question, "unknown", "hwp"));
        assert!(!judge.grade(question, "unknown", "서울시"));
        assert!(!judge.grade(question, "unknown", "확인할 수 없습니다"));
    }

    #[test]
    fn test_absence_is_incorrect() {
        assert!(!grade("서울시", "문서에서 정보를 찾을 수 없습니다"));
        assert!(!grade("hwp", "I don't know"));
        assert!(!grade("서울시", "   "));
    }

    #[test]
    fn test_blank_expected() {
        assert!(grade("", "정보를 확인할 수 없습니다."));
        assert!(!grade("", "서울시"));
    }

    #[test]
    fn test_parse_verdict() {
        assert_eq!(parse_verdict("정답"), OracleVerdict::Correct);
        assert_eq!(parse_verdict(" 오답\n"), OracleVerdict::Incorrect);
        assert_eq!(parse_verdict("Correct"), OracleVerdict::Correct);
        assert_eq!(parse_verdict("incorrect"), OracleVerdict::Incorrect);
        assert_eq!(parse_verdict("정답이 아닙니다"), OracleVerdict::Incorrect);
        assert_eq!(parse_verdict("오답입니다. 실제 정답은 서울시"), OracleVerdict::Ambiguous);
        assert_eq!(parse_verdict("음..."), OracleVerdict::Ambiguous);
    }

    struct Scripted(&'static str);

    #[async_trait]
    impl Completion for Scripted {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, prompt: &Prompt) -> Result<String> {
            assert!(prompt.user.contains("실제 정답: 서울시"));
            Ok(self.0.to_string())
        }
    }

    struct Down;

    #[async_trait]
    impl Completion for Down {
        fn model(&self) -> &str {
            "down"
        }

        async fn complete(&self, _prompt: &Prompt) -> Result<String> {
            Err(RfpError::LlmTransient("503".to_string()))
        }
    }

    #[test]
    fn test_llm_judge_fails_closed() {
        let judge = |reply| LlmJudge::new(Arc::new(Scripted(reply)));
        assert!(block_on(judge("정답").judge("q", "서울시", "서울특별시")).unwrap());
        assert!(!block_on(judge("오답").judge("q", "서울시", "부산시")).unwrap());
        assert!(!block_on(judge("잘 모르겠습니다").judge("q", "서울시", "서울")).unwrap());
    }

    #[test]
    fn test_llm_judge_error_propagates() {
        let judge = LlmJudge::new(Arc::new(Down));
        assert!(block_on(judge.judge("q", "서울시", "서울시")).is_err());
    }
}
