//! Prompt assembly
//!
//! Turns the request, peer list, retrieved records and market snapshot into
//! the final prompt text. Pure functions; no I/O.

use crate::market::MarketSnapshot;
use crate::retrieval::SearchResult;

use super::templates::{render, PromptTemplate};

/// Everything a prompt needs besides the retrieved context
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    pub stock_name: &'a str,
    pub related_stocks: &'a [&'a str],
    pub news_content: &'a str,
    pub snapshot: &'a MarketSnapshot,
}

/// Join retrieved record texts, best first, one per line
pub fn build_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|result| result.record.text.trim())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a prompt
///
/// `Some(context)` selects the retrieval template, even when the context is
/// empty; `None` selects the template without the historical cases section.
pub fn assemble_prompt(inputs: &PromptInputs<'_>, context: Option<&[SearchResult]>) -> String {
    let related = inputs.related_stocks.join(", ");
    let past_context = context.map(build_context).unwrap_or_default();
    let template = if context.is_some() {
        PromptTemplate::Rag
    } else {
        PromptTemplate::NoRag
    };

    let snapshot = inputs.snapshot;
    render(template.text(), |name| match name {
        "stock_name" => Some(inputs.stock_name),
        "related_stocks" => Some(related.as_str()),
        "news_content" => Some(inputs.news_content),
        "kospi" => Some(snapshot.kospi.as_str()),
        "nasdaq" => Some(snapshot.nasdaq.as_str()),
        "index_trend" => Some(snapshot.index_trend.as_str()),
        "exchange_rate" => Some(snapshot.exchange_rate.as_str()),
        "currency_status" => Some(snapshot.currency_status.as_str()),
        "us_10y_bond" => Some(snapshot.us_10y_bond.as_str()),
        "bok_rate" => Some(snapshot.bok_rate.as_str()),
        "vix_index" => Some(snapshot.vix_index.as_str()),
        "wti_oil" => Some(snapshot.wti_oil.as_str()),
        "past_context" => Some(past_context.as_str()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CorpusRecord;

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            kospi: "2550.50 (상승)".to_string(),
            nasdaq: "16900.00 (하락)".to_string(),
            index_trend: "상승".to_string(),
            exchange_rate: "1350.00".to_string(),
            currency_status: "보합".to_string(),
            us_10y_bond: "4.26%".to_string(),
            bok_rate: "2.50%".to_string(),
            bok_rate_source: "config".to_string(),
            vix_index: "14.20".to_string(),
            wti_oil: "N/A".to_string(),
            fetched_at: "2026-01-02T00:00:00+00:00".to_string(),
        }
    }

    fn make_search_result(record_id: usize, text: &str, score: f32) -> SearchResult {
        SearchResult {
            record_id,
            record: CorpusRecord::new(text),
            score,
            rank: record_id + 1,
        }
    }

    #[test]
    fn test_build_context_joins_by_newline() {
        let results = vec![
            make_search_result(0, "  첫 번째 기사  ", 0.9),
            make_search_result(1, "두 번째 기사", 0.8),
        ];

        assert_eq!(build_context(&results), "첫 번째 기사\n두 번째 기사");
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn test_rag_prompt() {
        let snapshot = snapshot();
        let inputs = PromptInputs {
            stock_name: "삼성전자",
            related_stocks: &["SK하이닉스", "한미반도체", "DB하이텍"],
            news_content: "반도체 수요 증가",
            snapshot: &snapshot,
        };
        let results = vec![make_search_result(3, "삼성전자, 반도체 수요 급증으로 분기 최대 실적 달성", 0.7)];

        let prompt = assemble_prompt(&inputs, Some(results.as_slice()));

        assert!(prompt.contains("- 종목명: 삼성전자"));
        assert!(prompt.contains("- 관련 산업군 종목: SK하이닉스, 한미반도체, DB하이텍"));
        assert!(prompt.contains("- 뉴스 내용: 반도체 수요 증가"));
        assert!(prompt.contains("KOSPI 2550.50 (상승), NASDAQ 16900.00 (하락) (상승)"));
        assert!(prompt.contains("원/달러 환율 1350.00 (보합)"));
        assert!(prompt.contains("미 10년물 국채 금리 4.26%, 한국 기준금리 2.50%"));
        assert!(prompt.contains("WTI 유가 N/A"));
        assert!(prompt.contains(
            "[참고할 과거 유사 사례 및 추세]\n삼성전자, 반도체 수요 급증으로 분기 최대 실적 달성\n"
        ));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn test_no_rag_prompt_omits_history() {
        let snapshot = snapshot();
        let inputs = PromptInputs {
            stock_name: "카카오뱅크",
            related_stocks: &["해당 산업군 전반"],
            news_content: "신규 서비스 출시",
            snapshot: &snapshot,
        };

        let prompt = assemble_prompt(&inputs, None);

        assert!(prompt.contains("- 관련 산업군 종목: 해당 산업군 전반"));
        assert!(!prompt.contains("과거 유사 사례"));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn test_request_text_is_not_reinterpreted() {
        let snapshot = snapshot();
        let inputs = PromptInputs {
            stock_name: "NAVER",
            related_stocks: &[],
            news_content: "{past_context} {bok_rate}",
            snapshot: &snapshot,
        };

        let prompt = assemble_prompt(&inputs, Some(&[][..]));
        assert!(prompt.contains("- 뉴스 내용: {past_context} {bok_rate}"));
    }
}
