//! Prompt templates for stock analysis
//!
//! Placeholders are `{name}` tokens filled by `render`.

/// Prompt with retrieved historical cases
pub const RAG_TEMPLATE: &str = concat!(
    "당신은 전문 주식 분석가입니다. 아래 데이터를 종합하여 투자 가이드를 제시하세요.\n",
    "\n",
    "[현재 분석 대상]\n",
    "- 종목명: {stock_name}\n",
    "- 관련 산업군 종목: {related_stocks}\n",
    "- 뉴스 내용: {news_content}\n",
    "\n",
    "[시장 거시 지표 및 환경]\n",
    "- 지수: KOSPI {kospi}, NASDAQ {nasdaq} ({index_trend})\n",
    "- 통화: 원/달러 환율 {exchange_rate} ({currency_status})\n",
    "- 금리: 미 10년물 국채 금리 {us_10y_bond}, 한국 기준금리 {bok_rate}\n",
    "- 변동성: VIX 지수 {vix_index}\n",
    "- 주요 원자재: WTI 유가 {wti_oil}\n",
    "\n",
    "[참고할 과거 유사 사례 및 추세]\n",
    "{past_context}\n",
    "\n",
    "위 내용을 바탕으로 해당 뉴스의 종목이 어떤 추세로 갈지 분석하여\n",
    "[매수 / 매도 / 중립] 가이드를 결정하고 그 이유를 3줄 이내로 요약하세요.\n",
    "\n",
    "반드시 아래 형식을 유지하세요:\n",
    "결정: [값]\n",
    "이유: 1. ... 2. ...\n"
);

/// Prompt without the historical cases section
pub const NO_RAG_TEMPLATE: &str = concat!(
    "당신은 전문 주식 분석가입니다. 아래 데이터를 종합하여 투자 가이드를 제시하세요.\n",
    "\n",
    "[현재 분석 대상]\n",
    "- 종목명: {stock_name}\n",
    "- 관련 산업군 종목: {related_stocks}\n",
    "- 뉴스 내용: {news_content}\n",
    "\n",
    "[시장 거시 지표 및 환경]\n",
    "- 지수: KOSPI {kospi}, NASDAQ {nasdaq} ({index_trend})\n",
    "- 통화: 원/달러 환율 {exchange_rate} ({currency_status})\n",
    "- 금리: 미 10년물 국채 금리 {us_10y_bond}, 한국 기준금리 {bok_rate}\n",
    "- 변동성: VIX 지수 {vix_index}\n",
    "- 주요 원자재: WTI 유가 {wti_oil}\n",
    "\n",
    "위 내용을 바탕으로 해당 뉴스의 종목이 어떤 추세로 갈지 분석하여\n",
    "[매수 / 매도 / 중립] 가이드를 결정하고 그 이유를 3줄 이내로 요약하세요.\n",
    "\n",
    "반드시 아래 형식을 유지하세요:\n",
    "결정: [값]\n",
    "이유: 1. ... 2. ...\n"
);

/// Which template a prompt is rendered from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    Rag,
    NoRag,
}

impl PromptTemplate {
    pub fn text(&self) -> &'static str {
        match self {
            PromptTemplate::Rag => RAG_TEMPLATE,
            PromptTemplate::NoRag => NO_RAG_TEMPLATE,
        }
    }
}

/// Fill `{name}` placeholders in a single pass
///
/// Substituted values are never rescanned, so a news body containing
/// `{past_context}` stays literal. Unknown placeholders are left as-is.
pub fn render<'a, F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<&'a str>,
{
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match lookup(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}
