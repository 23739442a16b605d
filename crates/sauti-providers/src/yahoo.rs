//! Yahoo Finance market data via the public chart endpoint.

use async_trait::async_trait;
use sauti_core::{error::SautiError, records::Quote, traits::MarketData};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::BROWSER_UA;

const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance quote source.
pub struct YahooFinance {
    client: reqwest::Client,
    timeout: Duration,
}

impl YahooFinance {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }
}

#[derive(Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
}

#[derive(Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    indicators: Option<Indicators>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    currency: Option<String>,
    regular_market_price: Option<f64>,
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

/// Latest non-null close, falling back to the regular market price.
fn read_quote(symbol: &str, parsed: ChartResponse) -> Option<Quote> {
    let result = parsed.chart.result?.into_iter().next()?;
    let close = result
        .indicators
        .as_ref()
        .and_then(|i| i.quote.first())
        .and_then(|q| q.close.iter().rev().find_map(|c| *c));
    let price = close.or(result.meta.regular_market_price)?;
    Some(Quote {
        symbol: symbol.to_string(),
        price,
        currency: result.meta.currency.unwrap_or_else(|| "USD".to_string()),
    })
}

#[async_trait]
impl MarketData for YahooFinance {
    async fn latest_close(&self, symbol: &str) -> Result<Option<Quote>, SautiError> {
        let url = format!(
            "{YAHOO_CHART_URL}/{}?range=1d&interval=1d",
            urlencoding::encode(symbol)
        );
        debug!("yahoo: chart {symbol}");

        let resp = self
            .client
            .get(&url)
            .header("User-Agent", BROWSER_UA)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SautiError::Timeout(format!("yahoo after {}s", self.timeout.as_secs()))
                } else {
                    SautiError::Tool(format!("yahoo request failed: {e}"))
                }
            })?;

        // Unknown symbols come back as 404 with an error body.
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(SautiError::Tool(format!("yahoo returned {}", resp.status())));
        }

        let parsed: ChartResponse = resp
            .json()
            .await
            .map_err(|e| SautiError::Tool(format!("yahoo: failed to parse response: {e}")))?;
        Ok(read_quote(symbol, parsed))
    }
}
