//! Prompt templates for answering, judging and summarizing RFP documents.
//!
//! Placeholders in braces (`{context}`, `{question}`, ...) are filled with
//! `str::replace` by the callers.

/// Collection of prompts used by backends, the judge and the corpus builder.
pub struct Prompts;

impl Prompts {
    /// System prompt for the remote (cloud model) backend.
    pub fn remote_system() -> &'static str {
        r#"당신은 공공 입찰 제안요청서(RFP) 분석 전문가입니다.
주어진 [Context]만을 근거로 질문에 명확하게 답변하세요.

[지침]
1. 정확성: [Context]에 있는 내용으로만 답변하세요. 정보가 없으면 "문서에서 정보를 찾을 수 없습니다"라고 답하세요.
2. 사업명 일치: 질문이 특정 사업을 지칭하면, 그 사업명과 일치하는 문서 정보를 우선하세요. 다른 사업의 정보는 무시하세요.
3. 문서 유형: 문서 유형이나 형식을 물으면 문서의 성격(제안요청서 등)과 파일 확장자(hwp, pdf 등)를 함께 말하세요. 예: "제안요청서(hwp)입니다."
4. 금액: 원 단위로 정확히 쓰고, 필요하면 괄호 안에 한글 금액을 덧붙이세요."#
    }

    /// User turn for the remote backend.
    pub fn remote_user() -> &'static str {
        r#"[Context]
{context}

[질문]
{question}

답변:"#
    }

    /// Single-turn template for the local backend.
    pub fn local_answer() -> &'static str {
        r#"당신은 공공 입찰 분석 전문가입니다. 아래 [문서 내용]을 바탕으로 질문에 답하세요.

[규칙]
1. 답변은 반드시 한국어로만 작성하세요.
2. [문서 내용] 상단의 문서 정보(예산, 발주 기관, 파일형식)를 가장 먼저 참고하세요.
3. 숫자는 단위(원)를 포함해 정확히 적고, 부연 설명 없이 핵심만 답하세요.
4. 문서에 없는 내용은 지어내지 마세요.

[문서 내용]
{context}

질문: {question}
답변:"#
    }

    /// Grading rubric for the LLM judge.
    pub fn judge_answer() -> &'static str {
        r#"당신은 입찰 문서 질의응답 시스템의 채점관입니다.
[AI 답변]이 [실제 정답]과 의미상 일치하면 "정답", 아니면 "오답"으로 판정하세요.

[채점 기준]
1. 숫자/금액: 표기 방식이 달라도 같은 값이면 정답입니다. 예: 1억 3천만 원 = 130,000,000원 = 1.3억원. 부가세 포함/별도 언급은 허용합니다.
2. 기관명: 같은 기관을 가리키면 정답입니다. 예: 한영대학 = 한영대학교.
3. 문서 유형과 확장자: 정답이 hwp, pdf 같은 확장자일 때 AI가 제안요청서, RFP, 공고문처럼 문서의 성격을 맞게 답해도 정답입니다. 확장자를 맞게 답해도 정답입니다.
4. 정보 부재: 정답이 있는데 AI가 모른다거나 찾을 수 없다고 하면 오답입니다.

[데이터]
- 질문: {question}
- 실제 정답: {expected}
- AI 답변: {produced}

판정 결과는 "정답" 또는 "오답" 한 단어로만 출력하세요.
판정:"#
    }

    /// Summarizes one document before indexing.
    pub fn document_summary() -> &'static str {
        r#"당신은 공공 입찰 문서 전처리 전문가입니다.
아래 문서를 검색에 쓰기 좋도록 핵심만 요약하세요.

[필수 포함 정보]
1. 문서 파일 형식: 원본 파일의 확장자가 {file_kind}임을 명시하세요. 예: "이 문서는 hwp 파일입니다."
2. 사업명: {title}
3. 예산: 금액이 있으면 숫자와 단위(원)를 정확히 적으세요.
4. 발주 기관: {agency}
5. 핵심 요약: 사업의 목적과 주요 과업을 3줄 내외로 요약하세요.

[원본 텍스트 일부]
{text}

[요약 결과]"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_are_not_empty() {
        assert!(!Prompts::remote_system().is_empty());
        assert!(!Prompts::document_summary().is_empty());
    }

    #[test]
    fn test_templates_have_placeholders() {
        for template in [Prompts::remote_user(), Prompts::local_answer()] {
            assert!(template.contains("{context}"));
            assert!(template.contains("{question}"));
        }
        let judge = Prompts::judge_answer();
        assert!(judge.contains("{question}"));
        assert!(judge.contains("{expected}"));
        assert!(judge.contains("{produced}"));
    }
}
