//! Yahoo Finance data provider.
//!
//! Fetches OHLCV bars from Yahoo's v8 chart API with a blocking client. There
//! is no retry: a failed request surfaces as a `DataError` and the download
//! driver moves on to the next ticker.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.

use super::provider::{DataError, DataProvider, FetchRequest, PriceBar};
use chrono::NaiveDate;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

const CHART_ENDPOINT: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds.
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
}

impl YahooProvider {
    /// Build a provider. `timeout` of `None` keeps reqwest's default.
    pub fn new(timeout: Option<Duration>) -> Result<Self, DataError> {
        let mut builder = reqwest::blocking::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Build the chart API URL for a request. The symbol is one encoded path segment.
    fn chart_url(request: &FetchRequest) -> Result<Url, DataError> {
        let mut url = Url::parse(CHART_ENDPOINT)
            .map_err(|e| DataError::Config(format!("invalid chart endpoint: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| DataError::Config("chart endpoint cannot take a path".into()))?
            .push(&request.symbol);
        url.query_pairs_mut()
            .append_pair("period1", &midnight_utc(request.start).to_string())
            .append_pair("period2", &midnight_utc(request.end).to_string())
            .append_pair("interval", request.interval.as_str())
            .append_pair("includeAdjustedClose", "true")
            .append_pair("events", "div,splits");
        Ok(url)
    }

    /// Parse the chart API response into bars.
    fn parse_response(request: &FetchRequest, resp: ChartResponse) -> Result<Vec<PriceBar>, DataError> {
        let symbol = request.symbol.as_str();
        let result = match resp.chart.result {
            Some(result) => result,
            None => {
                return match resp.chart.error {
                    Some(err) if err.code == "Not Found" => Err(DataError::SymbolNotFound {
                        symbol: symbol.to_string(),
                    }),
                    Some(err) => Err(DataError::ResponseFormatChanged(format!(
                        "{}: {}",
                        err.code, err.description
                    ))),
                    None => Err(DataError::ResponseFormatChanged(
                        "empty result with no error".into(),
                    )),
                };
            }
        };

        let Some(data) = result.into_iter().next() else {
            return Ok(Vec::new());
        };

        // A range with no trading periods comes back without timestamps.
        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };

        let quote = data.indicators.quote.into_iter().next().unwrap_or_default();
        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        // Bars are stamped at the session open; the trading day is the
        // exchange-local date, not the UTC one.
        let offset = data.meta.gmtoffset;
        let mut bars = Vec::with_capacity(timestamps.len());

        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts + offset, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();
            let adj_close = adj_closes
                .as_ref()
                .and_then(|v| v.get(i).copied().flatten());

            // Skip bars where all OHLCV are None (holidays/non-trading days)
            if open.is_none()
                && high.is_none()
                && low.is_none()
                && close.is_none()
                && volume.is_none()
            {
                continue;
            }

            let mut bar = PriceBar {
                date,
                open: open.unwrap_or(f64::NAN),
                high: high.unwrap_or(f64::NAN),
                low: low.unwrap_or(f64::NAN),
                close: close.unwrap_or(f64::NAN),
                volume: volume.unwrap_or(0),
            };
            if request.adjusted {
                if let Some(adj) = adj_close {
                    adjust_bar(&mut bar, adj);
                }
            }
            bars.push(bar);
        }

        Ok(bars)
    }
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, request: &FetchRequest) -> Result<Vec<PriceBar>, DataError> {
        let url = Self::chart_url(request)?;
        log::debug!("GET {url}");

        let resp = self.client.get(url).send().map_err(|e| {
            DataError::NetworkUnreachable(format!("{}: {e}", request.symbol))
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            // Yahoo answers unknown symbols with 404 and a chart error body.
            if let Ok(chart) = resp.json::<ChartResponse>() {
                return Self::parse_response(request, chart);
            }
            return Err(DataError::SymbolNotFound {
                symbol: request.symbol.clone(),
            });
        }
        if !status.is_success() {
            return Err(DataError::HttpStatus {
                symbol: request.symbol.clone(),
                status: status.as_u16(),
            });
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!(
                "failed to parse response for {}: {e}",
                request.symbol
            ))
        })?;

        let bars = Self::parse_response(request, chart)?;
        log::debug!("{}: {} bars from {}", request.symbol, bars.len(), self.name());
        Ok(bars)
    }
}

/// Scale OHLC by the adjusted/raw close ratio; volume is left as reported.
fn adjust_bar(bar: &mut PriceBar, adj_close: f64) {
    if bar.close.is_finite() && bar.close != 0.0 && adj_close.is_finite() {
        let ratio = adj_close / bar.close;
        bar.open *= ratio;
        bar.high *= ratio;
        bar.low *= ratio;
        bar.close = adj_close;
    }
}

fn midnight_utc(date: NaiveDate) -> i64 {
    date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp()
}
