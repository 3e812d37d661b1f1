//! Yahoo Finance chart API source
//!
//! `GET {base_url}/v8/finance/chart/{symbol}?range=5d&interval=1d`, reading
//! the daily closes. Holidays and partial sessions show up as null closes
//! and are skipped.

use crate::market::MarketDataSource;
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; stock-rag)";

#[derive(Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct ChartResult {
    indicators: Indicators,
}

#[derive(Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Market data from the public Yahoo Finance chart endpoint
pub struct YahooChartSource {
    client: Client,
    base_url: String,
}

impl YahooChartSource {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build market data HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn chart_url(&self, symbol: &str) -> String {
        format!(
            "{}/v8/finance/chart/{}?range=5d&interval=1d",
            self.base_url,
            symbol.replace('^', "%5E")
        )
    }
}

/// Extract non-null closes from a chart response body
fn parse_closes(body: &str) -> Result<Vec<f64>> {
    let response: ChartResponse =
        serde_json::from_str(body).context("Malformed chart response")?;

    if let Some(error) = response.chart.error {
        anyhow::bail!("Chart API error {}: {}", error.code, error.description);
    }

    let closes = response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .and_then(|result| result.indicators.quote.into_iter().next())
        .map(|series| series.close.into_iter().flatten().collect())
        .unwrap_or_default();

    Ok(closes)
}

impl MarketDataSource for YahooChartSource {
    fn closes(&self, symbol: &str) -> Result<Vec<f64>> {
        let url = self.chart_url(symbol);

        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("Chart request failed for {}", symbol))?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            anyhow::bail!("Chart API returned {} for {}", status, symbol);
        }

        parse_closes(&body)
    }

    fn name(&self) -> &str {
        "yahoo"
    }
}
