//! Analysis request and response types
//!
//! Defines the HTTP payloads and the parsed decision report.

use crate::market::MarketSnapshot;
use serde::{Deserialize, Serialize};

/// Decision used when the model reply has no `결정:` line
pub const UNDECIDED: &str = "판단 불가";

/// Decision used when generation itself failed
pub const GENERATION_ERROR: &str = "오류";

const GENERATION_ERROR_REASON: &str = "LLM 응답을 처리하는 중 문제가 발생했습니다.";

/// Analysis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub stock_name: String,
    /// News text; also the retrieval query
    pub content: String,
    /// Overrides the live KOSPI field when present
    #[serde(default)]
    pub kospi_status: Option<String>,
    /// Overrides the live NASDAQ field when present
    #[serde(default)]
    pub nasdaq_status: Option<String>,
}

impl AnalyzeRequest {
    pub fn new(stock_name: &str, content: &str) -> Self {
        Self {
            stock_name: stock_name.to_string(),
            content: content.to_string(),
            kospi_status: None,
            nasdaq_status: None,
        }
    }

    /// Apply caller-supplied index levels to a fetched snapshot
    pub fn apply_overrides(&self, snapshot: &mut MarketSnapshot) {
        if let Some(kospi) = non_blank(&self.kospi_status) {
            snapshot.kospi = kospi.to_string();
        }
        if let Some(nasdaq) = non_blank(&self.nasdaq_status) {
            snapshot.nasdaq = nasdaq.to_string();
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Parsed model decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionReport {
    /// 매수 / 매도 / 중립, or a fallback marker
    pub decision: String,
    pub reason: Vec<String>,
    /// Unmodified model reply
    #[serde(default)]
    pub raw: String,
}

impl DecisionReport {
    /// Parse a `결정: ... / 이유: 1. ... 2. ...` reply
    ///
    /// Never fails: a reply without a decision line is reported as undecided
    /// with the raw text kept.
    pub fn parse(text: &str) -> Self {
        let mut decision = None;
        let mut reason_text: Option<String> = None;

        for line in text.lines() {
            let line = strip_markup(line);

            if decision.is_none() {
                if let Some(value) = after_label(line, "결정") {
                    let value = value.trim_matches(|c: char| c == '[' || c == ']' || c.is_whitespace());
                    if !value.is_empty() {
                        decision = Some(value.to_string());
                    }
                    continue;
                }
            }

            if let Some(reasons) = reason_text.as_mut() {
                reasons.push('\n');
                reasons.push_str(line);
            } else if let Some(value) = after_label(line, "이유") {
                reason_text = Some(value.to_string());
            }
        }

        let reason = reason_text
            .map(|text| split_numbered(&text))
            .unwrap_or_default();

        Self {
            decision: decision.unwrap_or_else(|| UNDECIDED.to_string()),
            reason,
            raw: text.to_string(),
        }
    }

    /// Substitute report for a failed generation
    pub fn generation_failed(error: &str) -> Self {
        Self {
            decision: GENERATION_ERROR.to_string(),
            reason: vec![GENERATION_ERROR_REASON.to_string(), error.to_string()],
            raw: String::new(),
        }
    }

    pub fn is_decided(&self) -> bool {
        self.decision != UNDECIDED && self.decision != GENERATION_ERROR
    }
}

/// Drop list bullets and bold markers models like to add
fn strip_markup(line: &str) -> &str {
    line.trim()
        .trim_start_matches(|c: char| c == '-' || c == '*' || c == '#' || c.is_whitespace())
        .trim_end_matches('*')
        .trim()
}

/// Text after `label:` (ASCII or full-width colon), if the line starts with it
fn after_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(label)?;
    let rest = rest.trim_start_matches('*').trim_start();
    rest.strip_prefix(':')
        .or_else(|| rest.strip_prefix('：'))
        .map(|value| value.trim_start_matches('*').trim())
}

/// Split "1. foo 2. bar" into ["foo", "bar"]
///
/// A marker is a run of digits followed by `.` and whitespace (or the end),
/// at the start of the text or after whitespace, so "2.5%" stays intact.
fn split_numbered(text: &str) -> Vec<String> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut items = Vec::new();
    let mut start = None;
    let mut i = 0;

    while i < chars.len() {
        let at_boundary = i == 0 || chars[i - 1].1.is_whitespace();
        if at_boundary && chars[i].1.is_ascii_digit() {
            let mut j = i;
            while j < chars.len() && chars[j].1.is_ascii_digit() {
                j += 1;
            }
            let is_marker = j < chars.len()
                && chars[j].1 == '.'
                && chars.get(j + 1).map_or(true, |&(_, c)| c.is_whitespace());

            if is_marker {
                if let Some(s) = start {
                    push_item(&mut items, &text[s..chars[i].0]);
                } else {
                    push_item(&mut items, &text[..chars[i].0]);
                }
                start = Some(chars.get(j + 1).map_or(text.len(), |&(pos, _)| pos));
                i = j + 1;
                continue;
            }
        }
        i += 1;
    }

    push_item(&mut items, &text[start.unwrap_or(0)..]);
    items
}

fn push_item(items: &mut Vec<String>, item: &str) {
    let item = item.split_whitespace().collect::<Vec<_>>().join(" ");
    if !item.is_empty() {
        items.push(item);
    }
}

/// Response for both analysis endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub stock: String,
    pub decision_report: DecisionReport,
    /// Texts of the retrieved records, best first
    pub referenced_cases: Vec<String>,
    pub market_data_used: MarketSnapshot,
}

/// Liveness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "RAG Server is Running".to_string(),
        }
    }
}

/// Outcome of rebuilding the retrievers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadResponse {
    /// Records in the new corpus
    pub records: usize,
    /// Whether a dense retriever is active
    pub dense: bool,
    /// Whether a sparse retriever is active
    pub sparse: bool,
}
