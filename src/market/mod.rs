//! Market snapshot
//!
//! Fetches index levels, FX, bond yield, volatility and oil at request time.
//! Fetching never fails: any symbol the source cannot serve is reported with
//! the `N/A` sentinel and an unavailable trend.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub mod yahoo;

pub use yahoo::YahooChartSource;

/// Placeholder for values the source could not provide
pub const UNAVAILABLE: &str = "N/A";

pub const KOSPI: &str = "^KS11";
pub const NASDAQ: &str = "^IXIC";
pub const USD_KRW: &str = "KRW=X";
pub const US_10Y: &str = "^TNX";
pub const VIX: &str = "^VIX";
pub const WTI: &str = "CL=F";

/// Source of recent daily closing prices
pub trait MarketDataSource: Send + Sync {
    /// Recent closes for a symbol, oldest first
    fn closes(&self, symbol: &str) -> Result<Vec<f64>>;

    fn name(&self) -> &str;
}

/// Direction of the latest close relative to the one before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Up,
    Down,
    Flat,
    Unavailable,
}

impl Trend {
    pub fn label(&self) -> &'static str {
        match self {
            Trend::Up => "상승",
            Trend::Down => "하락",
            Trend::Flat => "보합",
            Trend::Unavailable => "정보 없음",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Latest value and trend for one symbol
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub latest: Option<f64>,
    pub trend: Trend,
}

impl Quote {
    /// Derive a quote from closes, oldest first
    ///
    /// Non-finite closes are ignored. Fewer than two observations leave the
    /// trend unavailable.
    pub fn from_closes(closes: &[f64]) -> Self {
        let finite: Vec<f64> = closes.iter().copied().filter(|c| c.is_finite()).collect();

        match finite.as_slice() {
            [] => Self {
                latest: None,
                trend: Trend::Unavailable,
            },
            [only] => Self {
                latest: Some(*only),
                trend: Trend::Unavailable,
            },
            [.., prior, latest] => {
                let trend = if latest > prior {
                    Trend::Up
                } else if latest < prior {
                    Trend::Down
                } else {
                    Trend::Flat
                };
                Self {
                    latest: Some(*latest),
                    trend,
                }
            }
        }
    }

    pub fn unavailable() -> Self {
        Self::from_closes(&[])
    }

    /// Value with two decimals, or the sentinel
    pub fn value(&self) -> String {
        match self.latest {
            Some(v) => format!("{:.2}", v),
            None => UNAVAILABLE.to_string(),
        }
    }

    /// "value (trend)"
    pub fn with_trend(&self) -> String {
        format!("{} ({})", self.value(), self.trend)
    }
}

/// Market indicators used to ground a decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub kospi: String,
    pub nasdaq: String,
    pub index_trend: String,
    pub exchange_rate: String,
    pub currency_status: String,
    pub us_10y_bond: String,
    pub bok_rate: String,
    /// Where `bok_rate` came from; always configuration
    pub bok_rate_source: String,
    pub vix_index: String,
    pub wti_oil: String,
    pub fetched_at: String,
}

/// Builds snapshots from a `MarketDataSource`
pub struct MarketFetcher {
    source: Arc<dyn MarketDataSource>,
    bok_rate: String,
}

impl MarketFetcher {
    pub fn new(source: Arc<dyn MarketDataSource>, bok_rate: impl Into<String>) -> Self {
        Self {
            source,
            bok_rate: bok_rate.into(),
        }
    }

    fn quote(&self, symbol: &str) -> Quote {
        match self.source.closes(symbol) {
            Ok(closes) => {
                let quote = Quote::from_closes(&closes);
                tracing::debug!("{} {}: {}", self.source.name(), symbol, quote.with_trend());
                quote
            }
            Err(e) => {
                tracing::warn!(
                    "Market source '{}' failed for {}: {:#}",
                    self.source.name(),
                    symbol,
                    e
                );
                Quote::unavailable()
            }
        }
    }

    /// Fetch a fresh snapshot; unavailable symbols become sentinels
    pub fn fetch(&self) -> MarketSnapshot {
        let kospi = self.quote(KOSPI);
        let nasdaq = self.quote(NASDAQ);
        let usd_krw = self.quote(USD_KRW);
        let us_10y = self.quote(US_10Y);
        let vix = self.quote(VIX);
        let wti = self.quote(WTI);

        let us_10y_bond = match us_10y.latest {
            Some(_) => format!("{}%", us_10y.value()),
            None => UNAVAILABLE.to_string(),
        };

        MarketSnapshot {
            kospi: kospi.with_trend(),
            nasdaq: nasdaq.with_trend(),
            index_trend: kospi.trend.to_string(),
            exchange_rate: usd_krw.value(),
            currency_status: usd_krw.trend.to_string(),
            us_10y_bond,
            bok_rate: self.bok_rate.clone(),
            bok_rate_source: "config".to_string(),
            vix_index: vix.value(),
            wti_oil: wti.value(),
            fetched_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
