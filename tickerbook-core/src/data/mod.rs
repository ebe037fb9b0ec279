//! Data acquisition and storage

pub mod download;
pub mod provider;
pub mod series;
pub mod tickers;
pub mod workbook;
pub mod yahoo;

pub use download::{
    download_tickers, DownloadProgress, DownloadSummary, FetchSettings, StdoutProgress,
    TickerOutcome,
};
pub use provider::{DataError, DataProvider, FetchRequest, Interval, PriceBar};
pub use series::{load_closing_series, parse_date_cell, ClosePoint, ClosingSeries};
pub use tickers::{load_tickers, parse_tickers, read_tickers};
pub use workbook::{Cell, SheetWrite, Workbook};
pub use yahoo::YahooProvider;
