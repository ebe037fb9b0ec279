//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over price sources so the download driver
//! can run against Yahoo Finance in production and a stub in tests.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One OHLCV period as returned by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Sampling interval of a price series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interval {
    #[default]
    #[serde(rename = "1d", alias = "daily")]
    Daily,
    #[serde(rename = "1wk", alias = "weekly")]
    Weekly,
    #[serde(rename = "1mo", alias = "monthly")]
    Monthly,
}

impl Interval {
    /// Query-string value understood by the Yahoo chart API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Daily => "1d",
            Interval::Weekly => "1wk",
            Interval::Monthly => "1mo",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1d" | "d" | "daily" => Ok(Interval::Daily),
            "1wk" | "w" | "weekly" => Ok(Interval::Weekly),
            "1mo" | "m" | "monthly" => Ok(Interval::Monthly),
            other => Err(DataError::Config(format!(
                "unknown interval '{other}' (expected 1d, 1wk or 1mo)"
            ))),
        }
    }
}

/// Everything a provider needs to answer one history query.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub symbol: String,
    /// First day of the range (inclusive).
    pub start: NaiveDate,
    /// Last day of the range (exclusive).
    pub end: NaiveDate,
    pub interval: Interval,
    /// Scale prices for splits and dividends.
    pub adjusted: bool,
}

/// Structured error types for data operations.
///
/// Payloads are plain strings so the error stays `Send + Sync` and prints
/// cleanly in the CLI.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("ticker file error: {0}")]
    TickerFile(String),

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("HTTP {status} for {symbol}")]
    HttpStatus { symbol: String, status: u16 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("workbook error: {0}")]
    Workbook(String),

    #[error("sheet '{sheet}' not found in {path}")]
    SheetNotFound { sheet: String, path: String },

    #[error("invalid sheet name '{0}'")]
    InvalidSheetName(String),

    #[error("sheet '{sheet}' has no '{column}' column")]
    MissingColumn { sheet: String, column: String },

    #[error("sheet '{sheet}' row {row}: cannot parse '{value}' as a date")]
    InvalidDate {
        sheet: String,
        row: usize,
        value: String,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Trait for price history providers.
///
/// Implementations return an empty vector when the provider has no rows for
/// the requested range; the driver decides what "empty" means for storage.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch OHLCV bars for one symbol.
    fn fetch(&self, request: &FetchRequest) -> Result<Vec<PriceBar>, DataError>;
}
